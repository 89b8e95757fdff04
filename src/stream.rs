//! Inbound 3270 record parser: framing-hint header strip, write-command
//! dispatch, and order interpretation (§4.4). Deliberately infallible —
//! truncated operands and unrecognized bytes are tolerated in place rather
//! than propagated as errors (§7).

use crate::address;
use crate::codes::{
    CommandCode, Color, EOR, Highlight, IAC, OrderCode, XA_BACKGROUND, XA_BASE, XA_FOREGROUND, XA_HIGHLIGHTING,
};
use crate::ebcdic::ebcdic_to_ascii;
use crate::screen::{Screen, SIZE};

/// Strip an optional 5-byte TN3270E header from `data` per the framing
/// hint (§4.4.1). Returns `(had_header, payload)`, or `None` if the record
/// should be dropped entirely (a TN3270E header whose DATA-TYPE isn't
/// 3270-DATA).
pub fn strip_tn3270e_header(data: &[u8], tn3270e_hint: Option<bool>) -> Option<(bool, &[u8])> {
    match tn3270e_hint {
        Some(true) => {
            if data.len() < 5 || data[0] != 0x00 {
                return None;
            }
            Some((true, &data[5..]))
        }
        Some(false) => Some((false, data)),
        None => {
            if data.len() >= 6 && data[0] == 0x00 && CommandCode::from_u8(data[5]).is_some() {
                Some((true, &data[5..]))
            } else {
                Some((false, data))
            }
        }
    }
}

/// Whether `payload` (already stripped of any TN3270E header) is a
/// Read Partition Query structured field (§4.4.4).
pub fn is_query_request(payload: &[u8]) -> bool {
    payload.len() >= 4 && payload[0] == 0xF3 && payload[3] == 0x01
}

/// Strip a trailing `IAC EOR` terminator, if present. The record handed to
/// `process` already includes it per spec.md §6; a bare `0xFF` that shows up
/// anywhere else in the payload is a legitimate operand or data byte, not a
/// terminator, so this is only ever checked once, at the end.
fn strip_trailing_eor(payload: &[u8]) -> &[u8] {
    match payload.len() {
        n if n >= 2 && payload[n - 2] == IAC && payload[n - 1] == EOR => &payload[..n - 2],
        _ => payload,
    }
}

/// Parse one record into `screen` mutations.
pub fn process(screen: &mut Screen, data: &[u8], tn3270e_hint: Option<bool>) {
    let (had_header, payload) = match strip_tn3270e_header(data, tn3270e_hint) {
        Some(v) => v,
        None => return,
    };
    screen.set_had_tn3270e_header(had_header);
    let payload = strip_trailing_eor(payload);
    if payload.is_empty() {
        return;
    }

    if let Some(cmd) = CommandCode::from_u8(payload[0]) {
        match cmd {
            CommandCode::Write => {
                if payload.len() >= 2 {
                    process_orders(screen, &payload[2..]);
                }
            }
            CommandCode::EraseWrite | CommandCode::EraseWriteAlternate => {
                screen.clear();
                if payload.len() >= 2 {
                    process_orders(screen, &payload[2..]);
                }
            }
            CommandCode::EraseAllUnprotected => {
                screen.erase_all_unprotected();
            }
            CommandCode::WriteStructuredField => {
                // Query/Reply is handled one level up, in the connection's
                // record dispatch, before this function is ever reached.
            }
        }
    } else if OrderCode::from_u8(payload[0]).is_some() {
        // A deliberate tolerance: servers sometimes send orders-only
        // continuations with no leading write command.
        process_orders(screen, payload);
    } else {
        tracing::warn!(command = payload[0], "unrecognized write command; dropping record");
    }
}

fn process_orders(screen: &mut Screen, bytes: &[u8]) {
    let mut pos: usize = 0;
    let mut i: usize = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        tracing::trace!(order = byte, pos, "processing order");
        match OrderCode::from_u8(byte) {
            Some(OrderCode::Sba) => {
                if i + 3 > bytes.len() {
                    tracing::warn!("truncated SBA operand; stopping");
                    break;
                }
                pos = address::decode_address(bytes[i + 1], bytes[i + 2]) as usize % SIZE;
                i += 3;
            }
            Some(OrderCode::Sf) => {
                if i + 2 > bytes.len() {
                    tracing::warn!("truncated SF operand; stopping");
                    break;
                }
                screen.start_field(pos, bytes[i + 1]);
                pos = (pos + 1) % SIZE;
                i += 2;
            }
            Some(OrderCode::Sfe) => {
                if i + 2 > bytes.len() {
                    tracing::warn!("truncated SFE operand; stopping");
                    break;
                }
                let pair_count = bytes[i + 1] as usize;
                let pairs_start = i + 2;
                let total = 2 + pair_count * 2;
                if i + total > bytes.len() {
                    tracing::warn!("truncated SFE attribute pairs; stopping");
                    break;
                }
                let mut attribute: u8 = 0;
                let mut foreground = None;
                let mut highlight = None;
                let mut background = None;
                for p in 0..pair_count {
                    let pair_type = bytes[pairs_start + p * 2];
                    let value = bytes[pairs_start + p * 2 + 1];
                    match pair_type {
                        XA_BASE => attribute = value,
                        XA_HIGHLIGHTING => highlight = Some(Highlight::from_u8(value)),
                        XA_FOREGROUND => foreground = Some(Color::from_u8(value)),
                        XA_BACKGROUND => background = Some(Color::from_u8(value)),
                        _ => {}
                    }
                }
                screen.start_field_extended(pos, attribute, foreground, highlight, background);
                pos = (pos + 1) % SIZE;
                i += total;
            }
            Some(OrderCode::Sa) => {
                if i + 3 > bytes.len() {
                    tracing::warn!("truncated SA operand; stopping");
                    break;
                }
                let (pair_type, value) = (bytes[i + 1], bytes[i + 2]);
                match pair_type {
                    XA_FOREGROUND => screen.set_current_foreground(Color::from_u8(value)),
                    XA_HIGHLIGHTING => screen.set_current_highlight(Highlight::from_u8(value)),
                    XA_BACKGROUND => screen.set_current_background(Color::from_u8(value)),
                    _ => {}
                }
                i += 3;
            }
            Some(OrderCode::Ic) => {
                screen.set_cursor_pos(pos);
                i += 1;
            }
            Some(OrderCode::Pt) => {
                pos = screen.next_input(pos);
                i += 1;
            }
            Some(OrderCode::Ra) => {
                if i + 4 > bytes.len() {
                    tracing::warn!("truncated RA operand; stopping");
                    break;
                }
                let end = address::decode_address(bytes[i + 1], bytes[i + 2]) as usize % SIZE;
                let ch = ebcdic_to_ascii(bytes[i + 3]);
                screen.repeat_char_to_address(pos, end, ch);
                pos = end;
                i += 4;
            }
            Some(OrderCode::Eua) => {
                if i + 3 > bytes.len() {
                    tracing::warn!("truncated EUA operand; stopping");
                    break;
                }
                let end = address::decode_address(bytes[i + 1], bytes[i + 2]) as usize % SIZE;
                screen.erase_unprotected_to_address(pos, end);
                pos = end;
                i += 3;
            }
            Some(OrderCode::Mf) => {
                if i + 2 > bytes.len() {
                    tracing::warn!("truncated MF operand; stopping");
                    break;
                }
                let pair_count = bytes[i + 1] as usize;
                let total = 2 + pair_count * 2;
                if i + total > bytes.len() {
                    tracing::warn!("truncated MF attribute pairs; stopping");
                    break;
                }
                i += total;
            }
            Some(OrderCode::Ge) => {
                if i + 2 > bytes.len() {
                    tracing::warn!("truncated GE operand; stopping");
                    break;
                }
                let ch = ebcdic_to_ascii(bytes[i + 1]);
                screen.put_char(pos, ch);
                pos = (pos + 1) % SIZE;
                i += 2;
            }
            None => {
                let ch = ebcdic_to_ascii(byte);
                screen.put_char(pos, ch);
                pos = (pos + 1) % SIZE;
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_erase_write_blanks_the_screen() {
        let mut screen = Screen::new();
        process(&mut screen, &[0xF5, 0xC3], None);
        assert!(screen.is_unformatted());
        assert_eq!(screen.cursor_pos(), 0);
        assert_eq!(screen.unformatted_data(), "");
    }

    #[test]
    fn single_protected_field_hi() {
        let mut screen = Screen::new();
        let record = [0xF5, 0xC3, 0x11, 0x40, 0x40, 0x1D, 0xE0, 0xC8, 0xC9];
        process(&mut screen, &record, None);
        assert!(screen.cell(0).is_field_start);
        assert!(screen.cell(0).is_protected);
        assert_eq!(screen.cell(1).ch, 'H');
        assert_eq!(screen.cell(2).ch, 'I');
        assert!(screen.cell(1).is_protected);
        assert!(screen.cell(2).is_protected);
        assert_eq!(screen.fields().len(), 1);
    }

    #[test]
    fn repeat_to_address_fills_row_zero() {
        let mut screen = Screen::new();
        let record = [0xF5, 0xC3, 0x11, 0x40, 0x40, 0x3C, 0xC1, 0x50, 0x5C];
        process(&mut screen, &record, None);
        assert_eq!(screen.row_text(0), "*".repeat(80));
        assert_eq!(screen.row_text(1), " ".repeat(80));
        assert_eq!(screen.cursor_pos(), 0);
    }

    #[test]
    fn orders_only_continuation_is_tolerated() {
        let mut screen = Screen::new();
        // SBA to 5, then data byte 'A' (0xC1), no leading write command.
        let record = [0x11, 0x40, 0x45, 0xC1];
        process(&mut screen, &record, None);
        assert_eq!(screen.cell(5).ch, 'A');
    }

    #[test]
    fn truncated_operand_stops_cleanly_without_panicking() {
        let mut screen = Screen::new();
        // SBA with only one operand byte present.
        let record = [0xF5, 0xC3, 0x11, 0x40];
        process(&mut screen, &record, None);
        assert_eq!(screen.cursor_pos(), 0);
    }

    #[test]
    fn tn3270e_header_is_stripped_when_asserted() {
        let mut screen = Screen::new();
        let mut record = vec![0x00, 0x00, 0x00, 0x00, 0x00]; // header, DATA-TYPE=0
        record.extend_from_slice(&[0xF5, 0xC3]);
        process(&mut screen, &record, Some(true));
        assert!(screen.had_tn3270e_header());
        assert!(screen.is_unformatted());
    }

    #[test]
    fn non_3270_data_type_is_dropped_under_tn3270e() {
        let mut screen = Screen::new();
        screen.put_char(0, 'Z');
        let record = vec![0x01, 0x00, 0x00, 0x00, 0x00, 0xF5, 0xC3];
        process(&mut screen, &record, Some(true));
        assert_eq!(screen.cell(0).ch, 'Z');
    }

    #[test]
    fn embedded_0xff_attribute_byte_is_not_mistaken_for_eor() {
        let mut screen = Screen::new();
        // SF with attribute byte 0xFF, then data 'A', then the real trailing IAC EOR.
        let record = [0xF5, 0xC3, 0x11, 0x40, 0x40, 0x1D, 0xFF, 0xC1, 0xFF, 0xEF];
        process(&mut screen, &record, None);
        assert!(screen.cell(0).is_field_start);
        assert_eq!(screen.cell(1).ch, 'A');
    }

    #[test]
    fn query_request_is_detected_after_header_strip() {
        let record = [0xF3, 0x00, 0x05, 0x01, 0xFF, 0x02];
        assert!(is_query_request(&record));
        assert!(!is_query_request(&[0xF3, 0x00, 0x05, 0x02]));
    }
}
