//! Error types for the table codecs.

use thiserror::Error;

use crate::transport::TransportStreamId;

/// Errors raised while framing or unframing a single section.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    /// Buffer cannot hold even the 3-byte short header.
    #[error("Section too short: {0} bytes")]
    TooShort(usize),

    /// The section_length field is below the long header + CRC size.
    #[error("Section length too small: {0}")]
    LengthTooSmall(u16),

    /// The buffer ends before section_length says it should.
    #[error("Incomplete section: expected {expected} bytes, got {actual}")]
    Incomplete { expected: usize, actual: usize },

    /// Table codecs here only deal with long (syntax) sections.
    #[error("Not a long section (table id 0x{0:02X})")]
    NotLongSection(u8),

    /// Section number beyond the announced last section number.
    #[error("Section number {number} greater than last section number {last}")]
    InvalidSectionNumber { number: u8, last: u8 },

    /// CRC32 stored in the section does not match its content.
    #[error("CRC32 mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    CrcMismatch { stored: u32, computed: u32 },

    /// Payload does not fit in a long section.
    #[error("Section payload too large: {0} bytes (max: {1})")]
    PayloadTooLarge(usize, usize),
}

/// Validation errors raised by the structured-tree (XML) decoders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// The XML text could not be parsed at all.
    #[error("Malformed XML document: {0}")]
    Malformed(String),

    /// Element name is not the one the decoder expects.
    #[error("Unexpected element <{found}>, expected <{expected}>")]
    UnexpectedElement { expected: String, found: String },

    /// A required attribute is absent.
    #[error("Missing required attribute '{attribute}' in <{element}>")]
    MissingAttribute { element: String, attribute: String },

    /// Attribute present but not parsable as the expected type.
    #[error("Invalid value '{value}' for attribute '{attribute}' in <{element}>")]
    InvalidValue {
        element: String,
        attribute: String,
        value: String,
    },

    /// Attribute parsed but outside its allowed range.
    #[error("Value {value} for attribute '{attribute}' in <{element}> out of range {min}..={max}")]
    OutOfRange {
        element: String,
        attribute: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Text content of an element is not valid hexadecimal.
    #[error("Invalid hexadecimal content in <{0}>")]
    InvalidHexa(String),

    /// Element found where a descriptor was expected.
    #[error("Unknown descriptor element <{0}>")]
    UnknownDescriptor(String),

    /// Binary content of an element exceeds its size limit.
    #[error("Content of <{element}> too large: {size} bytes (max: {max})")]
    ContentTooLarge {
        element: String,
        size: usize,
        max: usize,
    },
}

/// Top-level error type for table encoding, assembly and registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error(transparent)]
    Section(#[from] SectionError),

    #[error(transparent)]
    Xml(#[from] XmlError),

    /// A transport's own descriptor loop cannot fit in any section.
    #[error("Transport {key} too large: {size} bytes (max: {max})")]
    EntryTooLarge {
        key: TransportStreamId,
        size: usize,
        max: usize,
    },

    /// A single descriptor cannot fit in a top-level loop.
    #[error("Descriptor too large for a section: {size} bytes (max: {max})")]
    DescriptorTooLarge { size: usize, max: usize },

    /// Section numbers are 8 bits, a table cannot exceed 256 sections.
    #[error("Too many sections: {0} (max: 256)")]
    TooManySections(usize),

    /// Table id not accepted by the codec it was handed to.
    #[error("Table id 0x{0:02X} not handled here")]
    TableIdMismatch(u8),

    /// Attempt to encode a table whose valid flag is false.
    #[error("Cannot serialize an invalid table")]
    InvalidTable,

    /// A handler is already registered for this table id and standard.
    #[error("Table id 0x{0:02X} already registered for {1}")]
    DuplicateRegistration(u8, String),

    /// No registered handler for this table id / tree tag.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Configuration value rejected.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TableError {
    fn from(e: std::io::Error) -> Self {
        TableError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TableError::EntryTooLarge {
            key: TransportStreamId::new(0x7FE1, 0x7FE0),
            size: 5000,
            max: 4080,
        };
        assert_eq!(
            err.to_string(),
            "Transport 0x7FE1/0x7FE0 too large: 5000 bytes (max: 4080)"
        );

        let err: TableError = SectionError::CrcMismatch {
            stored: 0,
            computed: 0xDEADBEEF,
        }
        .into();
        assert!(err.to_string().contains("0xDEADBEEF"));
    }
}
