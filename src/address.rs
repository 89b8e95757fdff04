//! 3270 buffer-address codec: 12-bit (default) and 14-bit address forms.
//!
//! The 12-bit form packs 6 bits per byte through a fixed 64-entry alphabet
//! (`ADDR_TABLE`) rather than a contiguous bit pattern — this table, not a
//! byte-range scheme, is what real 3270 servers and terminals exchange.

/// The 64-entry 6-bit-to-byte alphabet used by the 12-bit address form.
/// `ADDR_TABLE[v]` is the wire byte for the 6-bit value `v`.
pub const ADDR_TABLE: [u8; 64] = [
    0x40,
    0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9,
    0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
    0x50,
    0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9,
    0x5A, 0x5B, 0x5C, 0x5D, 0x5E, 0x5F,
    0x60,
    0x61,
    0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9,
    0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F,
    0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9,
    0x7A, 0x7B, 0x7C, 0x7D, 0x7E, 0x7F,
];

/// Encode a 6-bit value (0..=63) as its `ADDR_TABLE` wire byte.
fn encode_6bit(value: u8) -> u8 {
    ADDR_TABLE[(value & 0x3F) as usize]
}

/// Decode a wire byte back to its 6-bit value, if it appears in
/// `ADDR_TABLE`. Bytes outside the table (malformed input) fall back to
/// their low 6 bits, a tolerant reading consistent with this core's general
/// policy of never hard-failing on malformed operands.
fn decode_6bit(byte: u8) -> u8 {
    match ADDR_TABLE.iter().position(|&b| b == byte) {
        Some(index) => index as u8,
        None => byte & 0x3F,
    }
}

/// Encode a buffer address (0..4096) as its 12-bit two-byte wire form.
///
/// # Examples
///
/// ```
/// use tn3270_core::address::encode_address;
///
/// assert_eq!(encode_address(0), (0x40, 0x40));
/// assert_eq!(encode_address(80), (0xC1, 0x50));
/// ```
pub fn encode_address(addr: u16) -> (u8, u8) {
    let high6 = ((addr >> 6) & 0x3F) as u8;
    let low6 = (addr & 0x3F) as u8;
    (encode_6bit(high6), encode_6bit(low6))
}

/// Decode a two-byte buffer address, accepting either the 12-bit or the
/// 14-bit wire form. The 14-bit form is detected when the first byte's top
/// two bits are `00`.
///
/// # Examples
///
/// ```
/// use tn3270_core::address::decode_address;
///
/// assert_eq!(decode_address(0x40, 0x40), 0);
/// assert_eq!(decode_address(0xC1, 0x50), 80);
/// ```
pub fn decode_address(b1: u8, b2: u8) -> u16 {
    if b1 & 0xC0 == 0 {
        (((b1 & 0x3F) as u16) << 8) | b2 as u16
    } else {
        let high6 = decode_6bit(b1);
        let low6 = decode_6bit(b2);
        ((high6 as u16) << 6) | low6 as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_zero_round_trips_to_space_space() {
        assert_eq!(encode_address(0), (0x40, 0x40));
        assert_eq!(decode_address(0x40, 0x40), 0);
    }

    #[test]
    fn address_eighty_matches_worked_example() {
        assert_eq!(encode_address(80), (0xC1, 0x50));
        assert_eq!(decode_address(0xC1, 0x50), 80);
    }

    #[test]
    fn twelve_bit_round_trip_over_full_range() {
        for addr in 0u16..4096 {
            let (b1, b2) = encode_address(addr);
            assert_eq!(decode_address(b1, b2), addr, "round trip failed for {addr}");
        }
    }

    #[test]
    fn fourteen_bit_form_is_detected_by_top_bits() {
        // b1 = 0b00_000001, b2 = 0x00 -> address 0x100 = 256
        assert_eq!(decode_address(0x01, 0x00), 256);
    }
}
