//! Shared constants and the signalling standard enumeration.

use std::fmt;

use serde::Deserialize;

/// Maximum size of a long private section, header and CRC included.
pub const MAX_PRIVATE_SECTION_SIZE: usize = 4096;

/// Long section header: table_id (1), flags + length (2), extension (2),
/// version (1), section_number (1), last_section_number (1).
pub const LONG_SECTION_HEADER_SIZE: usize = 8;

/// CRC32 trailer size.
pub const SECTION_CRC32_SIZE: usize = 4;

/// Maximum payload of a long private section.
pub const MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE: usize =
    MAX_PRIVATE_SECTION_SIZE - LONG_SECTION_HEADER_SIZE - SECTION_CRC32_SIZE;

/// Largest value a 12-bit loop length field can hold.
pub const MAX_LOOP_LENGTH: usize = 0x0FFF;

/// Largest version number (5 bits).
pub const MAX_VERSION: u8 = 31;

/// Table IDs for the tables handled by this crate.
pub mod table_id {
    /// Network Information Section - actual.
    pub const NIT_ACTUAL: u8 = 0x40;
    /// Network Information Section - other.
    pub const NIT_OTHER: u8 = 0x41;
    /// Bouquet Association Section.
    pub const BAT: u8 = 0x4A;

    /// Table ids below this value are defined by MPEG and are the same in all standards.
    pub const FIRST_STANDARD_SPECIFIC: u8 = 0x40;
}

/// Signalling standard a table definition belongs to.
///
/// Table ids 0x40 and above are reused with different meanings across
/// standards, so the registry keys handlers by (table id, standard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standard {
    /// ISO/IEC 13818-1 only.
    Mpeg,
    /// ETSI EN 300 468.
    #[default]
    Dvb,
    /// ARIB STD-B10, derived from DVB SI.
    Isdb,
    /// ATSC A/65.
    Atsc,
}

impl Standard {
    /// Standard whose table definitions this one inherits, if any.
    pub fn parent(self) -> Option<Standard> {
        match self {
            Standard::Isdb => Some(Standard::Dvb),
            _ => None,
        }
    }

    /// Get display name.
    pub fn name(self) -> &'static str {
        match self {
            Standard::Mpeg => "MPEG",
            Standard::Dvb => "DVB",
            Standard::Isdb => "ISDB",
            Standard::Atsc => "ATSC",
        }
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_limit() {
        assert_eq!(MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE, 4084);
    }

    #[test]
    fn test_standard_parent() {
        assert_eq!(Standard::Isdb.parent(), Some(Standard::Dvb));
        assert_eq!(Standard::Dvb.parent(), None);
        assert_eq!(Standard::Isdb.to_string(), "ISDB");
    }
}
