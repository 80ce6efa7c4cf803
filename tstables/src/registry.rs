//! Table type registry.
//!
//! Maps (table id, standard) and XML names to the functions handling a table
//! type. The process-wide registry is built once by [`init`] (or [`install`])
//! before any decoding starts, and is read-only afterwards.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use once_cell::sync::OnceCell;

use crate::binary_table::BinaryTable;
use crate::context::CodecContext;
use crate::display::TablesDisplay;
use crate::error::TableError;
use crate::section::Section;
use crate::table::{AbstractTable, DecodedTable, OpaqueTable, GENERIC_LONG_TABLE_XML_NAME};
use crate::types::{table_id, Standard};
use crate::xml::Element;
use crate::{bat, nit};

/// Decode a complete binary table.
pub type DecodeFn = fn(&CodecContext, &BinaryTable) -> Box<dyn AbstractTable>;
/// Serialize a table of the handler's type.
pub type EncodeFn = fn(&CodecContext, &dyn AbstractTable) -> Result<BinaryTable, TableError>;
/// Decode the XML form.
pub type FromXmlFn = fn(&Element) -> Box<dyn AbstractTable>;
/// Report the structure of one section.
pub type DisplayFn = fn(&mut dyn TablesDisplay, &Section, usize);

/// Functions handling one table type.
#[derive(Clone, Copy)]
pub struct TableHandler {
    /// Table ids sharing this handler.
    pub table_ids: &'static [u8],
    pub standard: Standard,
    pub xml_name: &'static str,
    pub decode: DecodeFn,
    pub encode: EncodeFn,
    pub from_xml: FromXmlFn,
    pub display: Option<DisplayFn>,
}

impl fmt::Debug for TableHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableHandler")
            .field("table_ids", &self.table_ids)
            .field("standard", &self.standard)
            .field("xml_name", &self.xml_name)
            .finish()
    }
}

/// Registry of table handlers.
#[derive(Debug, Default)]
pub struct TableRegistry {
    by_id: HashMap<(u8, Standard), TableHandler>,
    by_xml_name: HashMap<String, TableHandler>,
}

impl TableRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every table type of this crate.
    pub fn with_builtin_tables() -> Result<Self, TableError> {
        let mut registry = TableRegistry::new();
        registry.register(nit::handler())?;
        registry.register(bat::handler())?;
        Ok(registry)
    }

    /// Register a handler for all its table ids.
    ///
    /// Table ids below 0x40 are MPEG-defined and registered for all standards.
    pub fn register(&mut self, handler: TableHandler) -> Result<(), TableError> {
        let keys: Vec<(u8, Standard)> = handler
            .table_ids
            .iter()
            .map(|&tid| (tid, Self::key_standard(tid, handler.standard)))
            .collect();

        if let Some(&(tid, standard)) = keys.iter().find(|k| self.by_id.contains_key(*k)) {
            return Err(TableError::DuplicateRegistration(tid, standard.to_string()));
        }
        let xml_key = handler.xml_name.to_ascii_lowercase();
        if self.by_xml_name.contains_key(&xml_key) {
            let tid = handler.table_ids.first().copied().unwrap_or(0xFF);
            return Err(TableError::DuplicateRegistration(tid, handler.xml_name.to_string()));
        }

        debug!(
            "Registering <{}> for table ids {:02X?} ({})",
            handler.xml_name, handler.table_ids, handler.standard
        );
        for key in keys {
            self.by_id.insert(key, handler);
        }
        self.by_xml_name.insert(xml_key, handler);
        Ok(())
    }

    /// Find the handler for a table id under a standard.
    ///
    /// Standards inheriting from another one (ISDB from DVB) fall back to
    /// their parent's handlers.
    pub fn lookup(&self, tid: u8, standard: Standard) -> Option<&TableHandler> {
        let mut current = Some(Self::key_standard(tid, standard));
        while let Some(key) = current {
            if let Some(handler) = self.by_id.get(&(tid, key)) {
                return Some(handler);
            }
            current = key.parent();
        }
        None
    }

    /// Find the handler for an XML element name (case-insensitive).
    pub fn lookup_xml(&self, name: &str) -> Option<&TableHandler> {
        self.by_xml_name.get(&name.to_ascii_lowercase())
    }

    /// Decode a binary table, keeping it opaque when its table id is unknown.
    pub fn decode(&self, ctx: &CodecContext, table: &BinaryTable) -> DecodedTable {
        let handler = table
            .table_id()
            .and_then(|tid| self.lookup(tid, ctx.standard()));
        match handler {
            Some(handler) => DecodedTable::Known((handler.decode)(ctx, table)),
            None => {
                debug!(
                    "No handler for table id {:02X?} ({}), keeping raw sections",
                    table.table_id(),
                    ctx.standard()
                );
                DecodedTable::Unknown(OpaqueTable::new(table.clone()))
            }
        }
    }

    /// Serialize a table through its handler.
    ///
    /// Tables without a handler (opaque tables) serialize themselves.
    pub fn encode(&self, ctx: &CodecContext, table: &dyn AbstractTable) -> Result<BinaryTable, TableError> {
        match self.lookup(table.table_id(), ctx.standard()) {
            Some(handler) if handler.xml_name == table.xml_name() => (handler.encode)(ctx, table),
            _ => table.serialize(ctx),
        }
    }

    /// Decode the XML form of any registered table, or of an opaque table.
    pub fn from_xml(&self, element: &Element) -> Result<DecodedTable, TableError> {
        if element.name().eq_ignore_ascii_case(GENERIC_LONG_TABLE_XML_NAME) {
            return Ok(DecodedTable::Unknown(OpaqueTable::from_xml(element)?));
        }
        let handler = self
            .lookup_xml(element.name())
            .ok_or_else(|| TableError::UnknownTable(format!("<{}>", element.name())))?;
        Ok(DecodedTable::Known((handler.from_xml)(element)))
    }

    /// Report the structure of a section, or dump it when its table id is unknown.
    pub fn display_section(
        &self,
        ctx: &CodecContext,
        display: &mut dyn TablesDisplay,
        section: &Section,
        indent: usize,
    ) {
        match self
            .lookup(section.table_id(), ctx.standard())
            .and_then(|h| h.display)
        {
            Some(display_fn) => display_fn(display, section, indent),
            None => display.extra_data(section.payload(), indent),
        }
    }

    /// XML document holding the given tables under a `<tsduck>` root.
    pub fn tables_to_xml(&self, tables: &[DecodedTable]) -> String {
        let mut root = Element::new(ROOT_XML_NAME);
        for table in tables {
            root.push_child(table.as_table().to_xml());
        }
        root.to_xml()
    }

    /// Decode every table of an XML document.
    ///
    /// Tables failing validation are returned with their valid flag cleared;
    /// only unknown element names and malformed documents are errors.
    pub fn tables_from_xml(&self, text: &str) -> Result<Vec<DecodedTable>, TableError> {
        let root = Element::parse(text)?;
        root.check_name(ROOT_XML_NAME)?;
        root.children()
            .iter()
            .map(|element| self.from_xml(element))
            .collect()
    }

    fn key_standard(tid: u8, standard: Standard) -> Standard {
        if tid < table_id::FIRST_STANDARD_SPECIFIC {
            Standard::Mpeg
        } else {
            standard
        }
    }
}

/// Root element of XML table documents.
pub const ROOT_XML_NAME: &str = "tsduck";

static REGISTRY: OnceCell<TableRegistry> = OnceCell::new();

/// Initialize the process-wide registry with the built-in tables.
///
/// Idempotent: later calls return the registry built by the first one.
pub fn init() -> Result<&'static TableRegistry, TableError> {
    REGISTRY.get_or_try_init(TableRegistry::with_builtin_tables)
}

/// Install a custom process-wide registry. Fails once a registry is in place.
pub fn install(registry: TableRegistry) -> Result<&'static TableRegistry, TableError> {
    REGISTRY
        .set(registry)
        .map_err(|_| TableError::Config("table registry already initialized".to_string()))?;
    init()
}

/// The process-wide registry, if initialized.
pub fn global() -> Option<&'static TableRegistry> {
    REGISTRY.get()
}
