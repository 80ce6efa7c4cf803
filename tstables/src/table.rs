//! Common interface of decoded tables, and the opaque fallback for table ids
//! without a registered handler.

use std::any::Any;
use std::fmt;

use bytes::Bytes;

use crate::binary_table::BinaryTable;
use crate::context::CodecContext;
use crate::error::TableError;
use crate::section::Section;
use crate::xml::{to_hexa, Element};

/// A table in its structured form.
pub trait AbstractTable: fmt::Debug + Send + Sync {
    /// Table id this table serializes with.
    fn table_id(&self) -> u8;

    /// Element name of the XML form.
    fn xml_name(&self) -> &'static str;

    /// False when decoding (binary or XML) failed.
    fn is_valid(&self) -> bool;

    /// Serialize into one or more sections.
    fn serialize(&self, ctx: &CodecContext) -> Result<BinaryTable, TableError>;

    /// Build the XML form.
    fn to_xml(&self) -> Element;

    fn as_any(&self) -> &dyn Any;
}

/// Result of decoding a binary table through the registry.
#[derive(Debug)]
pub enum DecodedTable {
    /// A registered handler decoded the table.
    Known(Box<dyn AbstractTable>),
    /// No handler: the sections are kept as they are.
    Unknown(OpaqueTable),
}

impl DecodedTable {
    pub fn as_table(&self) -> &dyn AbstractTable {
        match self {
            DecodedTable::Known(table) => table.as_ref(),
            DecodedTable::Unknown(table) => table,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, DecodedTable::Known(_))
    }
}

/// XML name of opaque tables.
pub const GENERIC_LONG_TABLE_XML_NAME: &str = "generic_long_table";

/// Sections of a table nobody knows how to interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueTable {
    table: BinaryTable,
}

impl OpaqueTable {
    pub fn new(table: BinaryTable) -> Self {
        OpaqueTable { table }
    }

    pub fn binary_table(&self) -> &BinaryTable {
        &self.table
    }

    /// Rebuild from a `<generic_long_table>` element.
    ///
    /// ```xml
    /// <generic_long_table table_id="0x4E" table_id_ext="0x0001" version="2" current="true" private="true">
    ///   <section>HEX</section>
    /// </generic_long_table>
    /// ```
    pub fn from_xml(element: &Element) -> Result<Self, TableError> {
        element.check_name(GENERIC_LONG_TABLE_XML_NAME)?;
        let table_id = element.int_attribute("table_id", true, 0, 0x00, 0xFF)? as u8;
        let table_id_ext = element.int_attribute("table_id_ext", false, 0xFFFF, 0x0000, 0xFFFF)? as u16;
        let version = element.int_attribute("version", false, 0, 0, 31)? as u8;
        let current = element.bool_attribute("current", false, true)?;
        let private = element.bool_attribute("private", false, true)?;

        let sections: Vec<&Element> = element
            .children()
            .iter()
            .filter(|c| c.name().eq_ignore_ascii_case("section"))
            .collect();
        if sections.len() > 256 {
            return Err(TableError::TooManySections(sections.len()));
        }

        let last = sections.len().saturating_sub(1) as u8;
        let mut table = BinaryTable::new();
        for (index, child) in sections.iter().enumerate() {
            let payload = child.hexa_text()?;
            let section = Section::new(
                table_id,
                private,
                table_id_ext,
                version,
                current,
                index as u8,
                last,
                Bytes::from(payload),
            )?;
            table.add_section(section);
        }
        Ok(OpaqueTable { table })
    }
}

impl AbstractTable for OpaqueTable {
    fn table_id(&self) -> u8 {
        self.table.table_id().unwrap_or(0xFF)
    }

    fn xml_name(&self) -> &'static str {
        GENERIC_LONG_TABLE_XML_NAME
    }

    fn is_valid(&self) -> bool {
        self.table.is_complete()
    }

    fn serialize(&self, _ctx: &CodecContext) -> Result<BinaryTable, TableError> {
        if !self.is_valid() {
            return Err(TableError::InvalidTable);
        }
        Ok(self.table.clone())
    }

    fn to_xml(&self) -> Element {
        let mut root = Element::new(GENERIC_LONG_TABLE_XML_NAME);
        if let Some(first) = self.table.sections().next() {
            root.set_hexa_attribute("table_id", first.table_id() as u64, 2);
            root.set_hexa_attribute("table_id_ext", first.table_id_extension() as u64, 4);
            root.set_int_attribute("version", first.version() as i64);
            root.set_bool_attribute("current", first.is_current());
            root.set_bool_attribute("private", first.private_indicator());
        }
        for section in self.table.sections() {
            root.add_element("section").set_text(to_hexa(section.payload()));
        }
        root
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
