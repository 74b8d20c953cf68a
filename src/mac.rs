/// Six-byte hardware addresses and their text / OUI forms.
///
/// The only accepted text form is `XX:XX:XX:XX:XX:XX` (17 characters).
/// Formatting is always uppercase and zero-padded.
use core::fmt::{self, Write};
use core::str::FromStr;

use serde::{Serialize, Serializer};

/// Formatted address string ("AA:BB:CC:DD:EE:FF")
pub type MacString = heapless::String<17>;

/// Length of the colon-hex text form
pub const MAC_TEXT_LEN: usize = 17;

/// An IEEE 802 MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// All-zero address. Used as the "match anything" filter pattern and
    /// as the unset local network.
    pub const ANY: MacAddr = MacAddr([0x00; 6]);

    /// All-ones address. Used as the "match nothing" filter pattern.
    pub const NONE: MacAddr = MacAddr([0xFF; 6]);

    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Build an OUI-only pattern: the 24-bit OUI in the first three bytes,
    /// `FF:FF:FF` in the last three.
    pub const fn from_oui(oui: u32) -> Self {
        Self([
            ((oui >> 16) & 0xFF) as u8,
            ((oui >> 8) & 0xFF) as u8,
            (oui & 0xFF) as u8,
            0xFF,
            0xFF,
            0xFF,
        ])
    }

    /// Copy an address out of a slice. Returns `None` unless exactly six bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// 24-bit organisationally unique identifier.
    pub const fn oui(&self) -> u32 {
        ((self.0[0] as u32) << 16) | ((self.0[1] as u32) << 8) | self.0[2] as u32
    }

    /// Group (broadcast / multicast) bit of the first octet.
    pub const fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Locally administered bit of the first octet (randomised client MACs).
    pub const fn is_locally_administered(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// Last three bytes all `0xFF`: an OUI-only filter pattern.
    pub const fn is_oui_wildcard(&self) -> bool {
        self.0[3] == 0xFF && self.0[4] == 0xFF && self.0[5] == 0xFF
    }

    /// Last three bytes all zero. Radios report these for garbled frames.
    pub const fn is_junk(&self) -> bool {
        self.0[3] == 0x00 && self.0[4] == 0x00 && self.0[5] == 0x00
    }

    /// A unicast address that can belong to a real transmitter.
    pub const fn is_individual(&self) -> bool {
        !self.is_group() && !self.is_junk()
    }

    /// 32-bit digest of the last four bytes, used as the ARP cache key.
    pub const fn suffix_hash(&self) -> u32 {
        u32::from_be_bytes([self.0[2], self.0[3], self.0[4], self.0[5]])
    }

    /// Parse the strict `XX:XX:XX:XX:XX:XX` form. Hex digits may be either case.
    pub fn parse(text: &str) -> Result<Self, MacParseError> {
        let bytes = text.as_bytes();
        if bytes.len() != MAC_TEXT_LEN {
            return Err(MacParseError::InvalidLength(bytes.len()));
        }

        let mut out = [0u8; 6];
        for (i, octet) in out.iter_mut().enumerate() {
            let pos = i * 3;
            let hi = hex_value(bytes[pos]).ok_or(MacParseError::InvalidDigit { position: pos })?;
            let lo = hex_value(bytes[pos + 1])
                .ok_or(MacParseError::InvalidDigit { position: pos + 1 })?;
            *octet = (hi << 4) | lo;

            if i < 5 && bytes[pos + 2] != b':' {
                return Err(MacParseError::InvalidDigit { position: pos + 2 });
            }
        }

        Ok(Self(out))
    }

    /// Format into a fixed-capacity string.
    pub fn to_mac_string(&self) -> MacString {
        let mut s = MacString::new();
        // 17 bytes always fit
        let _ = write!(s, "{}", self);
        s
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_mac_string())
    }
}

/// Why an address string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacParseError {
    /// Input was not 17 characters long
    InvalidLength(usize),
    /// A non-hex digit, or a missing `:` separator
    InvalidDigit { position: usize },
}

impl fmt::Display for MacParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacParseError::InvalidLength(len) => {
                write!(f, "expected {} characters, got {}", MAC_TEXT_LEN, len)
            }
            MacParseError::InvalidDigit { position } => {
                write!(f, "unexpected character at position {}", position)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_uppercase() {
        let mac = MacAddr::parse("B4:1E:52:AB:CD:EF").unwrap();
        assert_eq!(mac.0, [0xB4, 0x1E, 0x52, 0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn parse_lowercase() {
        let mac: MacAddr = "b4:1e:52:ab:cd:ef".parse().unwrap();
        assert_eq!(mac.0, [0xB4, 0x1E, 0x52, 0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(MacAddr::parse(""), Err(MacParseError::InvalidLength(0)));
        assert_eq!(
            MacAddr::parse("B4:1E:52:AB:CD"),
            Err(MacParseError::InvalidLength(14))
        );
        assert_eq!(
            MacAddr::parse("B4:1E:52:AB:CD:EF:"),
            Err(MacParseError::InvalidLength(18))
        );
        // No partial parse of a short single-digit form
        assert!(MacAddr::parse("1:2:3:4:5:6").is_err());
    }

    #[test]
    fn parse_rejects_bad_digits() {
        assert_eq!(
            MacAddr::parse("G4:1E:52:AB:CD:EF"),
            Err(MacParseError::InvalidDigit { position: 0 })
        );
        assert_eq!(
            MacAddr::parse("B4:1E:52:AB:CD:EZ"),
            Err(MacParseError::InvalidDigit { position: 16 })
        );
    }

    #[test]
    fn parse_rejects_wrong_separator() {
        assert_eq!(
            MacAddr::parse("B4-1E-52-AB-CD-EF"),
            Err(MacParseError::InvalidDigit { position: 2 })
        );
        assert_eq!(
            MacAddr::parse("B4:1E:52:AB:CD EF"),
            Err(MacParseError::InvalidDigit { position: 14 })
        );
    }

    // ── Formatting ──────────────────────────────────────────────────

    #[test]
    fn format_zero_pads_uppercase() {
        let mac = MacAddr([0x00, 0x0a, 0x01, 0xff, 0x10, 0x0b]);
        assert_eq!(mac.to_mac_string().as_str(), "00:0A:01:FF:10:0B");
    }

    #[test]
    fn text_round_trip() {
        for bytes in [
            [0u8; 6],
            [0xFF; 6],
            [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC],
            [0x01, 0x00, 0x5E, 0x7F, 0xFF, 0xFA],
        ] {
            let mac = MacAddr(bytes);
            assert_eq!(MacAddr::parse(&mac.to_mac_string()), Ok(mac));
        }
    }

    // ── OUI and address classes ─────────────────────────────────────

    #[test]
    fn from_oui_sets_wildcard_suffix() {
        let mac = MacAddr::from_oui(0xAABBCC);
        assert_eq!(mac.0, [0xAA, 0xBB, 0xCC, 0xFF, 0xFF, 0xFF]);
        assert!(mac.is_oui_wildcard());
        assert_eq!(mac.oui(), 0xAABBCC);
    }

    #[test]
    fn from_oui_ignores_high_bits() {
        assert_eq!(MacAddr::from_oui(0x12AABBCC).oui(), 0xAABBCC);
    }

    #[test]
    fn group_and_local_bits() {
        assert!(MacAddr::BROADCAST.is_group());
        assert!(MacAddr([0x01, 0x00, 0x5E, 0, 0, 1]).is_group());
        assert!(MacAddr([0x33, 0x33, 0, 0, 0, 1]).is_group());
        assert!(!MacAddr([0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]).is_group());
        assert!(MacAddr([0xDA, 0, 0, 0, 0, 1]).is_locally_administered());
        assert!(!MacAddr([0xB4, 0x1E, 0x52, 0, 0, 1]).is_locally_administered());
    }

    #[test]
    fn junk_suffix_is_not_individual() {
        let junk = MacAddr([0xB4, 0x1E, 0x52, 0x00, 0x00, 0x00]);
        assert!(junk.is_junk());
        assert!(!junk.is_individual());
        assert!(MacAddr([0xB4, 0x1E, 0x52, 0x00, 0x00, 0x01]).is_individual());
    }

    #[test]
    fn suffix_hash_uses_last_four_bytes() {
        let a = MacAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let b = MacAddr([0x99, 0x88, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(a.suffix_hash(), 0x3344_5566);
        assert_eq!(a.suffix_hash(), b.suffix_hash());
    }

    #[test]
    fn serializes_as_string() {
        let mac = MacAddr([0xB4, 0x1E, 0x52, 0xAB, 0xCD, 0xEF]);
        let mut buf = [0u8; 32];
        let len = serde_json_core::to_slice(&mac, &mut buf).unwrap();
        assert_eq!(&buf[..len], br#""B4:1E:52:AB:CD:EF""#);
    }
}
