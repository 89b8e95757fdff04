//! Write-command, order, AID, attribute, and TN3270E byte constants and the
//! small enums built on top of them. Byte-exact against §6.

/// Write commands the stream parser dispatches on (§4.4.1). Both the SNA
/// and CCW encodings of each command must be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Write,
    EraseWrite,
    EraseWriteAlternate,
    WriteStructuredField,
    EraseAllUnprotected,
}

impl CommandCode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0xF1 | 0x01 => Some(CommandCode::Write),
            0xF5 | 0x05 => Some(CommandCode::EraseWrite),
            0x7E | 0x0D => Some(CommandCode::EraseWriteAlternate),
            0xF3 => Some(CommandCode::WriteStructuredField),
            0x6F | 0x0F => Some(CommandCode::EraseAllUnprotected),
            _ => None,
        }
    }
}

/// Order opcodes recognized inside a 3270 record (§4.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCode {
    Sba,
    Sf,
    Sfe,
    Sa,
    Ic,
    Pt,
    Ra,
    Eua,
    Mf,
    Ge,
}

impl OrderCode {
    pub const SBA: u8 = 0x11;
    pub const SF: u8 = 0x1D;
    pub const SFE: u8 = 0x29;
    pub const SA: u8 = 0x28;
    pub const IC: u8 = 0x13;
    pub const PT: u8 = 0x05;
    pub const RA: u8 = 0x3C;
    pub const EUA: u8 = 0x12;
    pub const MF: u8 = 0x2C;
    pub const GE: u8 = 0x08;

    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            Self::SBA => Some(OrderCode::Sba),
            Self::SF => Some(OrderCode::Sf),
            Self::SFE => Some(OrderCode::Sfe),
            Self::SA => Some(OrderCode::Sa),
            Self::IC => Some(OrderCode::Ic),
            Self::PT => Some(OrderCode::Pt),
            Self::RA => Some(OrderCode::Ra),
            Self::EUA => Some(OrderCode::Eua),
            Self::MF => Some(OrderCode::Mf),
            Self::GE => Some(OrderCode::Ge),
            _ => None,
        }
    }
}

/// Attention Identifier bytes (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AidKey {
    Enter,
    Pf(u8),
    Pa(u8),
    Clear,
    SysReq,
    Attn,
}

impl AidKey {
    pub fn to_u8(self) -> u8 {
        match self {
            AidKey::Enter => 0x7D,
            AidKey::Pf(n) if (1..=9).contains(&n) => 0xF0 + n,
            AidKey::Pf(n) if (10..=12).contains(&n) => 0x7A - 10 + n,
            AidKey::Pf(n) if (13..=21).contains(&n) => 0xC1 - 13 + n,
            AidKey::Pf(n) if (22..=24).contains(&n) => 0x4A - 22 + n,
            AidKey::Pf(n) => panic!("invalid PF key number: {n}"),
            AidKey::Pa(1) => 0x6C,
            AidKey::Pa(2) => 0x6E,
            AidKey::Pa(3) => 0x6B,
            AidKey::Pa(n) => panic!("invalid PA key number: {n}"),
            AidKey::Clear => 0x6D,
            AidKey::SysReq => 0xF0,
            AidKey::Attn => 0x00,
        }
    }

    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x7D => AidKey::Enter,
            0xF1..=0xF9 => AidKey::Pf(byte - 0xF0),
            0x7A..=0x7C => AidKey::Pf(byte - 0x7A + 10),
            0xC1..=0xC9 => AidKey::Pf(byte - 0xC1 + 13),
            0x4A..=0x4C => AidKey::Pf(byte - 0x4A + 22),
            0x6C => AidKey::Pa(1),
            0x6E => AidKey::Pa(2),
            0x6B => AidKey::Pa(3),
            0x6D => AidKey::Clear,
            0xF0 => AidKey::SysReq,
            0x00 => AidKey::Attn,
            _ => return None,
        })
    }

    /// Short-read AIDs (PA1–PA3, CLEAR) never carry field data (§4.5.3).
    pub fn is_short_read(self) -> bool {
        matches!(self, AidKey::Pa(_) | AidKey::Clear)
    }
}

// Field attribute bit layout (§4.3).
pub const ATTR_PROTECTED: u8 = 0x20;
pub const ATTR_NUMERIC: u8 = 0x10;
pub const ATTR_DISPLAY_MASK: u8 = 0x0C;
pub const ATTR_DISPLAY_HIDDEN: u8 = 0x0C;
pub const ATTR_DISPLAY_INTENSIFIED: u8 = 0x08;
pub const ATTR_MDT: u8 = 0x01;

// SFE/SA extended-attribute pair types (§4.4.2).
pub const XA_BASE: u8 = 0xC0;
pub const XA_HIGHLIGHTING: u8 = 0x41;
pub const XA_FOREGROUND: u8 = 0x42;
pub const XA_BACKGROUND: u8 = 0x45;

/// 3270 base colors, as carried by the `0x42`/`0x45` extended-attribute
/// pair values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Default,
    Blue,
    Red,
    Pink,
    Green,
    Turquoise,
    Yellow,
    White,
}

impl Color {
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0xF1 => Color::Blue,
            0xF2 => Color::Red,
            0xF3 => Color::Pink,
            0xF4 => Color::Green,
            0xF5 => Color::Turquoise,
            0xF6 => Color::Yellow,
            0xF7 => Color::White,
            _ => Color::Default,
        }
    }
}

/// 3270 highlighting, as carried by the `0x41` extended-attribute pair
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Normal,
    Blink,
    ReverseVideo,
    Underscore,
}

impl Highlight {
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0xF1 => Highlight::Blink,
            0xF2 => Highlight::ReverseVideo,
            0xF4 => Highlight::Underscore,
            _ => Highlight::Normal,
        }
    }
}

// Telnet wire constants (§6).
pub const IAC: u8 = 0xFF;
pub const DONT: u8 = 0xFE;
pub const DO: u8 = 0xFD;
pub const WONT: u8 = 0xFC;
pub const WILL: u8 = 0xFB;
pub const SB: u8 = 0xFA;
pub const SE: u8 = 0xF0;
pub const EOR: u8 = 0xEF;

pub const OPT_BINARY: u8 = 0x00;
pub const OPT_TERMINAL_TYPE: u8 = 0x18;
pub const OPT_EOR: u8 = 0x19;
pub const OPT_TN3270E: u8 = 0x28;

pub const TN3270E_ASSOCIATE: u8 = 0x00;
pub const TN3270E_CONNECT: u8 = 0x01;
pub const TN3270E_DEVICE_TYPE: u8 = 0x02;
pub const TN3270E_FUNCTIONS: u8 = 0x03;
pub const TN3270E_IS: u8 = 0x04;
pub const TN3270E_REASON: u8 = 0x05;
pub const TN3270E_REJECT: u8 = 0x06;
pub const TN3270E_REQUEST: u8 = 0x07;
pub const TN3270E_SEND: u8 = 0x08;

pub const FUNC_BIND_IMAGE: u8 = 0x00;
pub const FUNC_DATA_STREAM_CTL: u8 = 0x02;
pub const FUNC_RESPONSES: u8 = 0x04;
pub const FUNC_SYSREQ: u8 = 0x05;

pub const TERMINAL_TYPE: &str = "IBM-3278-2-E";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_code_accepts_sna_and_ccw_forms() {
        assert_eq!(CommandCode::from_u8(0xF5), Some(CommandCode::EraseWrite));
        assert_eq!(CommandCode::from_u8(0x05), Some(CommandCode::EraseWrite));
        assert_eq!(CommandCode::from_u8(0xF3), Some(CommandCode::WriteStructuredField));
        assert_eq!(CommandCode::from_u8(0x99), None);
    }

    #[test]
    fn order_code_round_trips_spec_bytes() {
        assert_eq!(OrderCode::from_u8(0x11), Some(OrderCode::Sba));
        assert_eq!(OrderCode::from_u8(0x3C), Some(OrderCode::Ra));
        assert_eq!(OrderCode::from_u8(0xFF), None);
    }

    #[test]
    fn aid_key_round_trips() {
        for byte in [0x7Du8, 0xF1, 0xF9, 0x7A, 0x7C, 0xC1, 0xC9, 0x4A, 0x4C, 0x6C, 0x6E, 0x6B, 0x6D, 0xF0, 0x00] {
            let aid = AidKey::from_u8(byte).unwrap();
            assert_eq!(aid.to_u8(), byte, "round trip failed for 0x{byte:02X}");
        }
    }

    #[test]
    fn short_read_aids_are_pa_and_clear_only() {
        assert!(AidKey::Pa(2).is_short_read());
        assert!(AidKey::Clear.is_short_read());
        assert!(!AidKey::Enter.is_short_read());
        assert!(!AidKey::Pf(3).is_short_read());
    }

    #[test]
    fn color_and_highlight_defaults() {
        assert_eq!(Color::from_u8(0xF4), Color::Green);
        assert_eq!(Color::from_u8(0x00), Color::Default);
        assert_eq!(Highlight::from_u8(0xF2), Highlight::ReverseVideo);
        assert_eq!(Highlight::from_u8(0x00), Highlight::Normal);
    }
}
