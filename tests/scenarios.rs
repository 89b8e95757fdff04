//! End-to-end scenarios against the screen model and the AID-response
//! builder, independent of any live socket.

use std::sync::Once;

use tn3270_core::address::{decode_address, encode_address};
use tn3270_core::codes::AidKey;
use tn3270_core::connection::build_aid_response;
use tn3270_core::ebcdic::{ascii_to_ebcdic, ebcdic_to_ascii};
use tn3270_core::screen::Screen;

static INIT: Once = Once::new();

/// Install a readable subscriber for these tests' `tracing` output. A no-op
/// unless run with `--features demo-logging`; the library itself never
/// installs a global subscriber.
fn init_logging() {
    INIT.call_once(|| {
        #[cfg(feature = "demo-logging")]
        tracing_subscriber::fmt::init();
    });
}

#[test]
fn empty_erase_write() {
    init_logging();
    let mut screen = Screen::new();
    screen.process(&[0xF5, 0xC3, 0xFF, 0xEF], None);
    assert!(screen.is_unformatted());
    assert_eq!(screen.cursor_pos(), 0);
    assert_eq!(screen.unformatted_data(), "");
    assert_eq!(screen.cells().len(), 1920);
}

#[test]
fn single_protected_field_hi() {
    init_logging();
    let mut screen = Screen::new();
    let record = [0xF5, 0xC3, 0x11, 0x40, 0x40, 0x1D, 0xE0, 0xC8, 0xC9, 0xFF, 0xEF];
    screen.process(&record, None);

    assert!(screen.cell(0).is_field_start);
    assert!(screen.cell(0).is_protected);
    assert_eq!(screen.cell(1).ch, 'H');
    assert_eq!(screen.cell(2).ch, 'I');
    assert!(screen.cell(1).is_protected);
    assert!(screen.cell(2).is_protected);
    assert_eq!(screen.fields().len(), 1);
    assert_eq!(screen.fields()[0].start_pos, 0);
}

#[test]
fn repeat_to_address() {
    init_logging();
    let mut screen = Screen::new();
    let record = [0xF5, 0xC3, 0x11, 0x40, 0x40, 0x3C, 0xC1, 0x50, 0x5C, 0xFF, 0xEF];
    screen.process(&record, None);

    assert_eq!(screen.row_text(0), "*".repeat(80));
    for row in 1..24 {
        assert_eq!(screen.row_text(row), " ".repeat(80));
    }
    assert_eq!(screen.cursor_pos(), 0);
}

#[test]
fn aid_short_read() {
    init_logging();
    let mut screen = Screen::new();
    screen.set_cursor_pos(5);
    // connected in TN3270E mode, sequence 0, unformatted screen, PA2 pressed
    let bytes = build_aid_response(true, 0, AidKey::Pa(2), &screen);
    assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x6E, 0x40, 0xC5, 0xFF, 0xEF]);
}

#[test]
fn aid_with_modified_field() {
    init_logging();
    let mut screen = Screen::new();
    screen.start_field(10, 0x00); // unprotected field at 10
    screen.put_char(11, 'H');
    screen.put_char(12, 'I');
    screen.mark_modified(11);
    screen.set_cursor_pos(13);

    let bytes = build_aid_response(false, 0, AidKey::Enter, &screen);
    assert_eq!(bytes, vec![0x7D, 0x40, 0x4D, 0x11, 0x40, 0x4B, 0xC8, 0xC9, 0xFF, 0xEF]);

    screen.clear_modified_flags();
    assert!(screen.modified_fields().is_empty());
}

#[test]
fn query_request_is_recognized_from_raw_record() {
    init_logging();
    use tn3270_core::stream::{is_query_request, strip_tn3270e_header};

    let record = [0xF3u8, 0x00, 0x05, 0x01, 0xFF, 0x02, 0xFF, 0xEF];
    let (had_header, payload) = strip_tn3270e_header(&record, None).unwrap();
    assert!(!had_header);
    assert!(is_query_request(payload));
}

#[test]
fn address_codec_round_trips_over_full_twelve_bit_range() {
    init_logging();
    for addr in 0u16..4096 {
        let (b1, b2) = encode_address(addr);
        assert_eq!(decode_address(b1, b2), addr);
    }
}

#[test]
fn ebcdic_round_trip_is_total_over_printable_letters_and_digits() {
    init_logging();
    for c in ('A'..='Z').chain('a'..='z').chain('0'..='9') {
        assert_eq!(ebcdic_to_ascii(ascii_to_ebcdic(c)), c);
    }
}
