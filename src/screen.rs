//! The 3270 screen model: a fixed 1920-cell buffer, its field list, cursor,
//! and the outbound field-extraction operations (§3, §4.3).

use std::fmt;

use crate::codes::{Color, Highlight, ATTR_DISPLAY_HIDDEN, ATTR_DISPLAY_INTENSIFIED, ATTR_MDT, ATTR_NUMERIC, ATTR_PROTECTED};
use crate::ebcdic::is_non_printable;

pub const ROWS: usize = 24;
pub const COLS: usize = 80;
pub const SIZE: usize = ROWS * COLS;

/// One screen position: a display character plus the flags/colors it
/// either owns (as a field-start) or inherits from its governing field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub is_field_start: bool,
    pub is_protected: bool,
    pub is_numeric: bool,
    pub is_hidden: bool,
    pub is_intensified: bool,
    pub is_modified: bool,
    pub foreground: Color,
    pub highlight: Highlight,
    pub background: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            ch: ' ',
            is_field_start: false,
            is_protected: false,
            is_numeric: false,
            is_hidden: false,
            is_intensified: false,
            is_modified: false,
            foreground: Color::Default,
            highlight: Highlight::Normal,
            background: Color::Default,
        }
    }
}

/// A field-attribute entry: the cell at `start_pos` is the attribute cell
/// itself (displays blank); everything up to the next field-start belongs
/// to this field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub start_pos: usize,
    pub attribute: u8,
    pub is_protected: bool,
    pub is_numeric: bool,
    pub is_hidden: bool,
    pub is_intensified: bool,
    pub foreground: Color,
    pub highlight: Highlight,
    pub background: Color,
    pub is_modified: bool,
}

fn decode_attr(attr: u8) -> (bool, bool, bool, bool, bool) {
    let protected = attr & ATTR_PROTECTED != 0;
    let numeric = attr & ATTR_NUMERIC != 0;
    let hidden = attr & ATTR_DISPLAY_HIDDEN == ATTR_DISPLAY_HIDDEN;
    let intensified = !hidden && attr & ATTR_DISPLAY_INTENSIFIED == ATTR_DISPLAY_INTENSIFIED;
    let mdt = attr & ATTR_MDT != 0;
    (protected, numeric, hidden, intensified, mdt)
}

/// Default field color: a function of protected × intensified, with hidden
/// fields always treated as green (§4.3).
fn default_color_for_attribute(protected: bool, intensified: bool, hidden: bool) -> Color {
    if hidden {
        Color::Green
    } else if protected && intensified {
        Color::White
    } else if protected {
        Color::Blue
    } else if intensified {
        Color::Red
    } else {
        Color::Green
    }
}

/// A field's extracted content on outbound AID submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedField {
    pub start_pos: usize,
    pub data: String,
}

/// The screen buffer: 1920 cells, a field list, cursor, and the "current"
/// pen used for plain data characters outside any field (§3).
pub struct Screen {
    cells: Vec<Cell>,
    fields: Vec<Field>,
    cursor_pos: usize,
    current_foreground: Color,
    current_highlight: Highlight,
    current_background: Color,
    had_tn3270e_header: bool,
}

impl Screen {
    pub fn new() -> Self {
        Screen {
            cells: vec![Cell::default(); SIZE],
            fields: Vec::new(),
            cursor_pos: 0,
            current_foreground: Color::Default,
            current_highlight: Highlight::Normal,
            current_background: Color::Default,
            had_tn3270e_header: false,
        }
    }

    /// Reset all cells, empty the field list, home the cursor, and restore
    /// the default current color/highlight.
    pub fn clear(&mut self) {
        self.cells = vec![Cell::default(); SIZE];
        self.fields.clear();
        self.cursor_pos = 0;
        self.current_foreground = Color::Default;
        self.current_highlight = Highlight::Normal;
        self.current_background = Color::Default;
    }

    /// Parse `data` (one Telnet record) and mutate this screen. `tn3270e_hint`
    /// mirrors §4.4.1: `Some(true)`/`Some(false)` asserts the mode, `None`
    /// auto-detects.
    pub fn process(&mut self, data: &[u8], tn3270e_hint: Option<bool>) {
        crate::stream::process(self, data, tn3270e_hint);
    }

    pub fn cursor_pos(&self) -> usize {
        self.cursor_pos
    }

    pub fn set_cursor_pos(&mut self, pos: usize) {
        self.cursor_pos = pos % SIZE;
    }

    pub fn cell(&self, pos: usize) -> &Cell {
        &self.cells[pos % SIZE]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_unformatted(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn unformatted_data(&self) -> String {
        let s: String = self.cells.iter().map(|c| c.ch).collect();
        s.trim_end().to_string()
    }

    pub fn had_tn3270e_header(&self) -> bool {
        self.had_tn3270e_header
    }

    pub fn set_had_tn3270e_header(&mut self, value: bool) {
        self.had_tn3270e_header = value;
    }

    /// Locate the field owning `pos` and set its MDT.
    pub fn mark_modified(&mut self, pos: usize) {
        let pos = pos % SIZE;
        if let Some(field) = self.field_at_mut(pos) {
            field.is_modified = true;
        }
        self.cells[pos].is_modified = true;
    }

    /// The field whose `start_pos` is the greatest value ≤ `pos`, wrapping
    /// to the last field if `pos` precedes the first one.
    pub fn field_at(&self, pos: usize) -> Option<&Field> {
        let pos = pos % SIZE;
        match self.fields.iter().rev().find(|f| f.start_pos <= pos) {
            found @ Some(_) => found,
            None => self.fields.last(),
        }
    }

    fn field_at_mut(&mut self, pos: usize) -> Option<&mut Field> {
        let pos = pos % SIZE;
        let index = match self.fields.iter().rposition(|f| f.start_pos <= pos) {
            Some(i) => i,
            None if !self.fields.is_empty() => self.fields.len() - 1,
            None => return None,
        };
        self.fields.get_mut(index)
    }

    /// First cell inside the nearest unprotected field scanning circularly
    /// forward from `pos`; `pos` unchanged if no unprotected field exists.
    pub fn next_input(&self, pos: usize) -> usize {
        let pos = pos % SIZE;
        let n = self.fields.len();
        if n == 0 {
            return pos;
        }
        let start_idx = self.fields.iter().position(|f| f.start_pos > pos).unwrap_or(0);
        for i in 0..n {
            let f = &self.fields[(start_idx + i) % n];
            if !f.is_protected {
                return (f.start_pos + 1) % SIZE;
            }
        }
        pos
    }

    /// Same as `next_input` but scanning circularly backward.
    pub fn prev_input(&self, pos: usize) -> usize {
        let pos = pos % SIZE;
        let n = self.fields.len();
        if n == 0 {
            return pos;
        }
        let start_idx = match self.fields.iter().rposition(|f| f.start_pos < pos) {
            Some(i) => i,
            None => n - 1,
        };
        for i in 0..n {
            let idx = (start_idx + n - i) % n;
            let f = &self.fields[idx];
            if !f.is_protected {
                return (f.start_pos + 1) % SIZE;
            }
        }
        pos
    }

    pub fn first_input(&self) -> usize {
        self.next_input(SIZE - 1)
    }

    /// Every MDT-set, unprotected field's content, from just past the
    /// attribute cell up to (not including) the next field-start, with
    /// trailing spaces stripped and empty results omitted.
    pub fn modified_fields(&self) -> Vec<ModifiedField> {
        let n = self.fields.len();
        let mut out = Vec::new();
        for (i, f) in self.fields.iter().enumerate() {
            if !f.is_modified || f.is_protected {
                continue;
            }
            let next_start = self.fields[(i + 1) % n].start_pos;
            let first_content = (f.start_pos + 1) % SIZE;
            let mut raw = String::new();
            let mut idx = first_content;
            while idx != next_start {
                raw.push(self.cells[idx].ch);
                idx = (idx + 1) % SIZE;
            }
            let trimmed = raw.trim_end();
            if !trimmed.is_empty() {
                out.push(ModifiedField {
                    start_pos: first_content,
                    data: trimmed.to_string(),
                });
            }
        }
        out
    }

    pub fn clear_modified_flags(&mut self) {
        for field in &mut self.fields {
            field.is_modified = false;
        }
        for cell in &mut self.cells {
            cell.is_modified = false;
        }
    }

    pub fn current_foreground(&self) -> Color {
        self.current_foreground
    }

    pub fn set_current_foreground(&mut self, color: Color) {
        self.current_foreground = color;
    }

    pub fn current_highlight(&self) -> Highlight {
        self.current_highlight
    }

    pub fn set_current_highlight(&mut self, highlight: Highlight) {
        self.current_highlight = highlight;
    }

    pub fn current_background(&self) -> Color {
        self.current_background
    }

    pub fn set_current_background(&mut self, color: Color) {
        self.current_background = color;
    }

    /// Paint a field's attribute cell plus the inherited flags/colors onto
    /// every intermediate cell up to (not including) the next field-start
    /// (§4.4.3). Does not touch any cell's character beyond the attribute
    /// cell itself, which always displays blank.
    fn paint_field(&mut self, field: &Field) {
        let pos = field.start_pos;
        self.cells[pos] = Cell {
            ch: ' ',
            is_field_start: true,
            is_protected: field.is_protected,
            is_numeric: field.is_numeric,
            is_hidden: field.is_hidden,
            is_intensified: field.is_intensified,
            is_modified: field.is_modified,
            foreground: field.foreground,
            highlight: field.highlight,
            background: field.background,
        };
        let mut idx = (pos + 1) % SIZE;
        while idx != pos {
            if self.cells[idx].is_field_start {
                break;
            }
            let cell = &mut self.cells[idx];
            cell.is_protected = field.is_protected;
            cell.is_numeric = field.is_numeric;
            cell.is_hidden = field.is_hidden;
            cell.is_intensified = field.is_intensified;
            cell.foreground = field.foreground;
            cell.highlight = field.highlight;
            cell.background = field.background;
            idx = (idx + 1) % SIZE;
        }
    }

    fn insert_field(&mut self, field: Field) {
        self.fields.retain(|f| f.start_pos != field.start_pos);
        self.fields.push(field);
        self.fields.sort_by_key(|f| f.start_pos);
    }

    /// `SF`: install a field at `pos` with base attribute byte `attr`.
    pub fn start_field(&mut self, pos: usize, attr: u8) {
        let pos = pos % SIZE;
        let (protected, numeric, hidden, intensified, mdt) = decode_attr(attr);
        let color = default_color_for_attribute(protected, intensified, hidden);
        let field = Field {
            start_pos: pos,
            attribute: attr,
            is_protected: protected,
            is_numeric: numeric,
            is_hidden: hidden,
            is_intensified: intensified,
            foreground: color,
            highlight: Highlight::Normal,
            background: Color::Default,
            is_modified: mdt,
        };
        self.paint_field(&field);
        self.insert_field(field);
        self.current_foreground = color;
    }

    /// `SFE`: install a field with explicit color/highlight overrides,
    /// falling back to the default-for-attribute rule where absent.
    pub fn start_field_extended(
        &mut self,
        pos: usize,
        attr: u8,
        foreground: Option<Color>,
        highlight: Option<Highlight>,
        background: Option<Color>,
    ) {
        let pos = pos % SIZE;
        let (protected, numeric, hidden, intensified, mdt) = decode_attr(attr);
        let default_color = default_color_for_attribute(protected, intensified, hidden);
        let field = Field {
            start_pos: pos,
            attribute: attr,
            is_protected: protected,
            is_numeric: numeric,
            is_hidden: hidden,
            is_intensified: intensified,
            foreground: foreground.unwrap_or(default_color),
            highlight: highlight.unwrap_or(Highlight::Normal),
            background: background.unwrap_or(Color::Default),
            is_modified: mdt,
        };
        self.paint_field(&field);
        self.insert_field(field);
        self.current_foreground = default_color;
    }

    /// Write a translated display character at `pos`. Outside any field
    /// (unformatted screen) the current pen color/highlight/background is
    /// applied; inside a field the inherited attributes painted at
    /// install-time are left untouched.
    pub fn put_char(&mut self, pos: usize, ch: char) {
        let pos = pos % SIZE;
        let displayable = if is_non_printable(ch) { ' ' } else { ch };
        self.cells[pos].ch = displayable;
        if self.is_unformatted() {
            self.cells[pos].foreground = self.current_foreground;
            self.cells[pos].highlight = self.current_highlight;
            self.cells[pos].background = self.current_background;
        }
    }

    /// `RA`: fill cells from `start` up to (not including) `end`, wrapping,
    /// with `ch` and the current pen.
    pub fn repeat_char_to_address(&mut self, start: usize, end: usize, ch: char) {
        let mut pos = start % SIZE;
        let end = end % SIZE;
        while pos != end {
            self.cells[pos].ch = ch;
            self.cells[pos].foreground = self.current_foreground;
            self.cells[pos].highlight = self.current_highlight;
            self.cells[pos].background = self.current_background;
            pos = (pos + 1) % SIZE;
        }
    }

    /// `EUA`: space-fill unprotected, non-field-start cells from `start` up
    /// to (not including) `end`, wrapping.
    pub fn erase_unprotected_to_address(&mut self, start: usize, end: usize) {
        let mut pos = start % SIZE;
        let end = end % SIZE;
        while pos != end {
            if !self.cells[pos].is_field_start && !self.cells[pos].is_protected {
                self.cells[pos].ch = ' ';
            }
            pos = (pos + 1) % SIZE;
        }
    }

    /// Clears unprotected cells (space-filling, clearing MDT) while leaving
    /// field-start cells and protected fields untouched.
    pub fn erase_all_unprotected(&mut self) {
        if self.fields.is_empty() {
            self.cells = vec![Cell::default(); SIZE];
            return;
        }
        let n = self.fields.len();
        for field in &mut self.fields {
            if !field.is_protected {
                field.is_modified = false;
            }
        }
        for i in 0..n {
            if self.fields[i].is_protected {
                continue;
            }
            let start = (self.fields[i].start_pos + 1) % SIZE;
            let end = self.fields[(i + 1) % n].start_pos;
            let mut idx = start;
            while idx != end {
                self.cells[idx].ch = ' ';
                self.cells[idx].is_modified = false;
                idx = (idx + 1) % SIZE;
            }
        }
    }

    pub fn row_text(&self, row: usize) -> String {
        let start = row * COLS;
        self.cells[start..start + COLS].iter().map(|c| c.ch).collect()
    }
}

impl Default for Screen {
    fn default() -> Self {
        Screen::new()
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..ROWS {
            writeln!(f, "{}", self.row_text(row))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_resets_everything() {
        let mut screen = Screen::new();
        screen.start_field(5, 0x20);
        screen.set_cursor_pos(10);
        screen.clear();
        assert_eq!(screen.cells().len(), SIZE);
        assert!(screen.fields().is_empty());
        assert_eq!(screen.cursor_pos(), 0);
        assert!(screen.is_unformatted());
    }

    #[test]
    fn start_field_marks_attribute_cell_and_paints_span() {
        let mut screen = Screen::new();
        screen.start_field(0, 0xE0); // protected
        assert!(screen.cell(0).is_field_start);
        assert!(screen.cell(0).is_protected);
        assert!(screen.cell(1).is_protected);
        assert!(!screen.cell(1).is_field_start);
    }

    #[test]
    fn field_at_wraps_to_last_field_when_pos_precedes_all() {
        let mut screen = Screen::new();
        screen.start_field(100, 0x00);
        let field = screen.field_at(5).unwrap();
        assert_eq!(field.start_pos, 100);
    }

    #[test]
    fn modified_fields_only_reports_unprotected_mdt_set_fields() {
        let mut screen = Screen::new();
        screen.start_field(10, 0x00); // unprotected
        screen.put_char(11, 'H');
        screen.put_char(12, 'I');
        screen.mark_modified(11);
        let modified = screen.modified_fields();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].start_pos, 11);
        assert_eq!(modified[0].data, "HI");
    }

    #[test]
    fn modified_fields_skips_protected_even_if_marked() {
        let mut screen = Screen::new();
        screen.start_field(0, 0x20); // protected
        screen.mark_modified(1);
        assert!(screen.modified_fields().is_empty());
    }

    #[test]
    fn clear_modified_flags_empties_modified_fields() {
        let mut screen = Screen::new();
        screen.start_field(0, 0x00);
        screen.put_char(1, 'X');
        screen.mark_modified(1);
        assert_eq!(screen.modified_fields().len(), 1);
        screen.clear_modified_flags();
        assert!(screen.modified_fields().is_empty());
    }

    #[test]
    fn next_input_wraps_circularly() {
        let mut screen = Screen::new();
        screen.start_field(1900, 0x00); // unprotected, near end of buffer
        assert_eq!(screen.next_input(0), 1901);
        assert_eq!(screen.next_input(1905), 1901);
    }

    #[test]
    fn unformatted_data_is_right_trimmed() {
        let mut screen = Screen::new();
        screen.put_char(0, 'H');
        screen.put_char(1, 'I');
        assert_eq!(screen.unformatted_data(), "HI");
    }

    #[test]
    fn erase_all_unprotected_clears_content_and_mdt_but_keeps_field_starts() {
        let mut screen = Screen::new();
        screen.start_field(0, 0x00); // unprotected
        screen.put_char(1, 'X');
        screen.mark_modified(1);
        screen.erase_all_unprotected();
        assert!(screen.cell(0).is_field_start);
        assert_eq!(screen.cell(1).ch, ' ');
        assert!(screen.modified_fields().is_empty());
    }

    #[test]
    fn repeat_char_to_address_wraps_and_stops_before_end() {
        let mut screen = Screen::new();
        screen.repeat_char_to_address(0, 80, '*');
        assert_eq!(screen.row_text(0), "*".repeat(80));
        assert_eq!(screen.row_text(1), " ".repeat(80));
    }
}
