//! Assembly of the sections forming one table instance.
//!
//! A table instance is identified by (table id, table id extension, version).
//! Its sections are numbered `0..=last_section_number`; the table is complete
//! once every number has been received.

use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, warn};

use crate::error::TableError;
use crate::section::Section;

/// Table id value used as stuffing after the last section of a buffer.
const STUFFING_TABLE_ID: u8 = 0xFF;

/// The sections of one table instance, indexed by section number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryTable {
    sections: Vec<Option<Section>>,
}

impl BinaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a set of sections, in any order.
    pub fn from_sections<I>(sections: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = Section>,
    {
        let mut table = BinaryTable::new();
        for section in sections {
            let table_id = section.table_id();
            if !table.add_section(section) {
                return Err(TableError::TableIdMismatch(table_id));
            }
        }
        Ok(table)
    }

    /// Parse consecutive serialized sections of one table.
    ///
    /// Parsing stops at the end of the buffer or at stuffing bytes.
    pub fn from_bytes(data: &[u8], check_crc: bool) -> Result<Self, TableError> {
        let mut sections = Vec::new();
        let mut rest = data;
        while !rest.is_empty() && rest[0] != STUFFING_TABLE_ID {
            let section = Section::parse(rest, check_crc)?;
            rest = &rest[section.size()..];
            sections.push(section);
        }
        Self::from_sections(sections)
    }

    /// Add a section to the table.
    ///
    /// A section of another table instance (different table id, extension
    /// or version) restarts the collection. A section announcing a different
    /// section count than the ones already held is rejected and false is
    /// returned.
    pub fn add_section(&mut self, section: Section) -> bool {
        if let Some(first) = self.first() {
            if first.table_id() != section.table_id()
                || first.table_id_extension() != section.table_id_extension()
                || first.version() != section.version()
            {
                debug!(
                    "New table instance: tid=0x{:02X} ext=0x{:04X} v{}, dropping {} sections",
                    section.table_id(),
                    section.table_id_extension(),
                    section.version(),
                    self.sections.iter().flatten().count()
                );
                self.sections.clear();
            } else if self.sections.len() != section.last_section_number() as usize + 1 {
                warn!(
                    "Section {} announces {} sections, table has {}",
                    section.section_number(),
                    section.last_section_number() as usize + 1,
                    self.sections.len()
                );
                return false;
            }
        }

        if self.sections.is_empty() {
            self.sections
                .resize(section.last_section_number() as usize + 1, None);
        }
        let index = section.section_number() as usize;
        self.sections[index] = Some(section);
        true
    }

    /// True when every section from 0 to last_section_number is present.
    pub fn is_complete(&self) -> bool {
        !self.sections.is_empty() && self.sections.iter().all(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Number of section slots (last_section_number + 1).
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Section at the given number, if received.
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index).and_then(Option::as_ref)
    }

    /// Received sections in section number order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().flatten()
    }

    pub fn table_id(&self) -> Option<u8> {
        self.first().map(Section::table_id)
    }

    pub fn table_id_extension(&self) -> Option<u16> {
        self.first().map(Section::table_id_extension)
    }

    pub fn version(&self) -> Option<u8> {
        self.first().map(Section::version)
    }

    pub fn is_current(&self) -> Option<bool> {
        self.first().map(Section::is_current)
    }

    /// Serialized size of all received sections.
    pub fn total_size(&self) -> usize {
        self.sections().map(Section::size).sum()
    }

    /// Concatenation of all received sections, serialized.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.total_size());
        for section in self.sections() {
            buf.put_slice(&section.to_bytes());
        }
        buf.freeze()
    }

    fn first(&self) -> Option<&Section> {
        self.sections().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(tid: u8, ext: u16, version: u8, number: u8, last: u8) -> Section {
        Section::new(
            tid,
            true,
            ext,
            version,
            true,
            number,
            last,
            Bytes::from(vec![0xF0, 0x00, 0xF0, 0x00]),
        )
        .unwrap()
    }

    #[test]
    fn test_complete_out_of_order() {
        let mut table = BinaryTable::new();
        assert!(!table.is_complete());
        assert!(table.add_section(section(0x40, 1, 0, 1, 1)));
        assert!(!table.is_complete());
        assert_eq!(table.section_count(), 2);
        assert!(table.section(0).is_none());
        assert!(table.add_section(section(0x40, 1, 0, 0, 1)));
        assert!(table.is_complete());
        let numbers: Vec<u8> = table.sections().map(Section::section_number).collect();
        assert_eq!(numbers, vec![0, 1]);
        assert_eq!(table.table_id(), Some(0x40));
        assert_eq!(table.table_id_extension(), Some(1));
    }

    #[test]
    fn test_new_version_resets() {
        let mut table = BinaryTable::new();
        table.add_section(section(0x40, 1, 0, 0, 1));
        table.add_section(section(0x40, 1, 1, 0, 0));
        assert!(table.is_complete());
        assert_eq!(table.version(), Some(1));
        assert_eq!(table.section_count(), 1);
    }

    #[test]
    fn test_inconsistent_last_section_rejected() {
        let mut table = BinaryTable::new();
        table.add_section(section(0x40, 1, 0, 0, 1));
        assert!(!table.add_section(section(0x40, 1, 0, 0, 2)));
        assert_eq!(table.section_count(), 2);
    }

    #[test]
    fn test_bytes_round_trip_with_stuffing() {
        let table =
            BinaryTable::from_sections(vec![section(0x4A, 7, 2, 0, 1), section(0x4A, 7, 2, 1, 1)])
                .unwrap();
        let mut raw = table.to_bytes().to_vec();
        assert_eq!(raw.len(), table.total_size());
        raw.extend_from_slice(&[0xFF; 5]);

        let parsed = BinaryTable::from_bytes(&raw, true).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_from_bytes_truncated() {
        let table = BinaryTable::from_sections(vec![section(0x40, 1, 0, 0, 0)]).unwrap();
        let raw = table.to_bytes();
        assert!(BinaryTable::from_bytes(&raw[..raw.len() - 1], false).is_err());
        assert!(BinaryTable::from_bytes(&[], false).unwrap().is_empty());
    }
}
