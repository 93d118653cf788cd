//! A 16-byte GUID, wire-compatible with the common `{u32, u16, u16, [u8; 8]}`
//! layout used by COM/RFC-4122-adjacent identifiers.

use core::fmt;

/// A 16-byte globally unique identifier.
///
/// Equality is bytewise across the full 16-byte representation — the field
/// split below exists only to describe the wire layout, not to change
/// comparison semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const NIL: Guid = Guid {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };

    #[must_use]
    pub fn nil() -> Self {
        Self::NIL
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Guid {
            data1: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            data2: u16::from_le_bytes(bytes[4..6].try_into().unwrap()),
            data3: u16::from_le_bytes(bytes[6..8].try_into().unwrap()),
            data4: bytes[8..16].try_into().unwrap(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.data1.to_le_bytes());
        out[4..6].copy_from_slice(&self.data2.to_le_bytes());
        out[6..8].copy_from_slice(&self.data3.to_le_bytes());
        out[8..16].copy_from_slice(&self.data4);
        out
    }

    /// Parses the canonical dashed (`8-4-4-4-12`) or undashed (32 hex
    /// digits) textual form, case-insensitively. Any malformed input — wrong
    /// length, misplaced dashes, non-hex digits — yields [`Guid::nil`]
    /// rather than an error, matching how generated decoders treat a
    /// corrupt identity field as absent rather than fatal.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        Self::try_parse(s).unwrap_or(Self::NIL)
    }

    fn try_parse(s: &str) -> Option<Self> {
        let hex = if s.len() == 36 {
            let bytes = s.as_bytes();
            if bytes[8] != b'-' || bytes[13] != b'-' || bytes[18] != b'-' || bytes[23] != b'-' {
                return None;
            }
            s.chars()
                .enumerate()
                .filter(|&(i, _)| i != 8 && i != 13 && i != 18 && i != 23)
                .map(|(_, c)| c)
                .collect::<String>()
        } else if s.len() == 32 {
            s.to_string()
        } else {
            return None;
        };

        if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let mut raw = [0u8; 16];
        for (i, slot) in raw.iter_mut().enumerate() {
            *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }

        // The first three fields are written in big-endian (natural hex reading)
        // order in text but stored little-endian on the wire; the trailing 8
        // bytes are written verbatim in both forms.
        Some(Guid {
            data1: u32::from_be_bytes(raw[0..4].try_into().unwrap()),
            data2: u16::from_be_bytes(raw[4..6].try_into().unwrap()),
            data3: u16::from_be_bytes(raw[6..8].try_into().unwrap()),
            data4: raw[8..16].try_into().unwrap(),
        })
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::NIL
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}
