//! Tables made of a top-level descriptor loop followed by a loop of
//! transport streams, each with its own descriptor loop (NIT, BAT).
//!
//! ```text
//! reserved(4) | top_descriptors_length(12) | top descriptors...
//! reserved(4) | transport_stream_loop_length(12)
//!   transport_stream_id(16) | original_network_id(16)
//!   reserved(4) | transport_descriptors_length(12) | descriptors...
//! ```
//!
//! Decoding is lenient: every length is clamped to the bytes actually
//! available, and whatever cannot be interpreted is reported as extra data.
//! XML decoding is strict: the first invalid attribute invalidates the table.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use bytes::{Buf, BufMut, BytesMut};
use log::{debug, trace, warn};

use crate::binary_table::BinaryTable;
use crate::context::CodecContext;
use crate::descriptor::DescriptorList;
use crate::display::TablesDisplay;
use crate::error::{TableError, XmlError};
use crate::section::Section;
use crate::table::AbstractTable;
use crate::transport::{
    Transport, TransportMap, TransportStreamId, MAX_PREFERRED_SECTION, NO_PREFERRED_SECTION,
};
use crate::types::{Standard, MAX_LOOP_LENGTH, MAX_VERSION};
use crate::xml::Element;

/// XML name of transport entries.
pub const TRANSPORT_XML_NAME: &str = "transport_stream";

/// Reserved bits set in front of every 12-bit length field.
const LENGTH_RESERVED_BITS: u16 = 0xF000;

/// Size of a transport entry header (two ids and a length field).
const TRANSPORT_HEADER_SIZE: usize = 6;

/// Static description of one transport-list table type.
pub trait TransportListKind:
    fmt::Debug + Clone + Copy + Default + PartialEq + Eq + Send + Sync + 'static
{
    /// XML element name.
    const XML_NAME: &'static str;
    /// Standard defining the table.
    const STANDARD: Standard;
    /// Table id of the "actual" variant (or the only one).
    const ACTUAL_TABLE_ID: u8;
    /// Table id of the "other" variant, if the table has one.
    const OTHER_TABLE_ID: Option<u8>;
    /// XML attribute holding the table id extension.
    const EXTENSION_XML_NAME: &'static str;
    /// Label of the table id extension in displays.
    const EXTENSION_DISPLAY_NAME: &'static str;
    /// Label of the top-level descriptor loop in displays.
    const TOP_LOOP_DISPLAY_NAME: &'static str;

    /// Table ids handled by this kind.
    fn table_ids() -> &'static [u8];

    fn is_valid_table_id(table_id: u8) -> bool {
        table_id == Self::ACTUAL_TABLE_ID || Some(table_id) == Self::OTHER_TABLE_ID
    }
}

/// A transport-list table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportListTable<K: TransportListKind> {
    /// Version number (0..=31).
    pub version: u8,
    /// Current/next indicator.
    pub is_current: bool,
    /// Table id extension (network id, bouquet id).
    pub table_id_extension: u16,
    /// Top-level descriptor loop.
    pub descs: DescriptorList,
    /// Transport loop.
    pub transports: TransportMap,
    is_actual: bool,
    is_valid: bool,
    _kind: PhantomData<K>,
}

impl<K: TransportListKind> Default for TransportListTable<K> {
    fn default() -> Self {
        Self::new(true, 0, true, 0)
    }
}

impl<K: TransportListKind> TransportListTable<K> {
    pub fn new(is_actual: bool, version: u8, is_current: bool, table_id_extension: u16) -> Self {
        TransportListTable {
            version,
            is_current,
            table_id_extension,
            descs: DescriptorList::new(),
            transports: TransportMap::new(),
            is_actual: is_actual || K::OTHER_TABLE_ID.is_none(),
            is_valid: true,
            _kind: PhantomData,
        }
    }

    /// Decode a complete binary table.
    pub fn from_binary(table: &BinaryTable) -> Self {
        let mut result = Self::default();
        result.deserialize(table);
        result
    }

    /// Table id matching the actual/other flag.
    pub fn table_id(&self) -> u8 {
        match K::OTHER_TABLE_ID {
            Some(other) if !self.is_actual => other,
            _ => K::ACTUAL_TABLE_ID,
        }
    }

    /// True for the "actual" variant. Always true for tables without an "other" variant.
    pub fn is_actual(&self) -> bool {
        self.is_actual
    }

    pub fn set_actual(&mut self, is_actual: bool) {
        self.is_actual = is_actual || K::OTHER_TABLE_ID.is_none();
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn invalidate(&mut self) {
        self.is_valid = false;
    }

    /// Find a transport by transport stream id.
    pub fn find_transport(&self, tsid: u16) -> Option<(&TransportStreamId, &Transport)> {
        self.transports
            .iter()
            .find(|(id, _)| id.transport_stream_id == tsid)
    }

    /// All transport stream ids, in key order.
    pub fn transport_ids(&self) -> Vec<u16> {
        self.transports
            .keys()
            .map(|id| id.transport_stream_id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Binary decoding
    // ------------------------------------------------------------------

    /// Replace the content with a decoded binary table.
    ///
    /// The table must be complete and carry a table id of this kind,
    /// otherwise the result is empty and invalid. Transports repeated across
    /// sections keep the last occurrence. Returns the number of extra bytes
    /// found after the declared structure, over all sections.
    pub fn deserialize(&mut self, table: &BinaryTable) -> usize {
        self.descs.clear();
        self.transports.clear();
        self.is_valid = false;

        let table_id = match table.table_id() {
            Some(tid) => tid,
            None => return 0,
        };
        if !K::is_valid_table_id(table_id) {
            debug!("{}: table id 0x{:02X} rejected", K::XML_NAME, table_id);
            return 0;
        }
        if !table.is_complete() {
            debug!(
                "{}: incomplete table, {}/{} sections",
                K::XML_NAME,
                table.sections().count(),
                table.section_count()
            );
            return 0;
        }

        self.is_actual = table_id == K::ACTUAL_TABLE_ID;
        self.version = table.version().unwrap_or(0);
        self.is_current = table.is_current().unwrap_or(true);

        let mut extra = 0;
        for section in table.sections() {
            extra += self.deserialize_payload(section.table_id_extension(), section.payload());
        }
        if extra > 0 {
            debug!("{}: {} bytes of extra data", K::XML_NAME, extra);
        }

        self.is_valid = true;
        extra
    }

    /// Add the content of one section payload.
    ///
    /// Never reads past `data`. Returns the number of bytes left after the
    /// declared (and clamped) structure.
    pub fn deserialize_payload(&mut self, table_id_extension: u16, mut data: &[u8]) -> usize {
        self.table_id_extension = table_id_extension;

        if data.remaining() < 2 {
            return data.remaining();
        }
        let top_length = read_loop_length(&mut data);
        self.descs.add_from_bytes(&data[..top_length]);
        data.advance(top_length);

        if data.remaining() < 2 {
            return data.remaining();
        }
        let mut loop_length = read_loop_length(&mut data);

        while loop_length >= TRANSPORT_HEADER_SIZE {
            let id = TransportStreamId::new(data.get_u16(), data.get_u16());
            let length = ((data.get_u16() & 0x0FFF) as usize).min(loop_length - TRANSPORT_HEADER_SIZE);
            loop_length -= TRANSPORT_HEADER_SIZE;

            let mut descs = DescriptorList::new();
            descs.add_from_bytes(&data[..length]);
            data.advance(length);
            loop_length -= length;

            if self.transports.insert(id, Transport::new(descs)).is_some() {
                trace!("{}: transport {} replaced", K::XML_NAME, id);
            }
        }

        data.remaining()
    }

    // ------------------------------------------------------------------
    // Binary encoding
    // ------------------------------------------------------------------

    /// Serialize into as many sections as needed.
    ///
    /// Preferred sections must be -1 or a section number (0..=255).
    /// Top-level descriptors go first, in the leading section(s). Transports
    /// are then placed in key order: into their preferred section when it has
    /// room, else into the first section with room, else into a new section.
    pub fn serialize(&self, ctx: &CodecContext) -> Result<BinaryTable, TableError> {
        if !self.is_valid || self.version > MAX_VERSION {
            return Err(TableError::InvalidTable);
        }
        if let Some((id, transport)) = self.transports.iter().find(|(_, t)| !t.has_valid_hint()) {
            debug!(
                "{}: transport {} has preferred section {}",
                K::XML_NAME,
                id,
                transport.preferred_section
            );
            return Err(TableError::InvalidTable);
        }

        let max_payload = ctx.max_section_payload();
        // Room for both loop length fields.
        let max_loop = (max_payload - 4).min(MAX_LOOP_LENGTH);

        let mut plans = self.plan_top_level(max_loop)?;

        for (id, transport) in &self.transports {
            let entry_size = TRANSPORT_HEADER_SIZE + transport.descs.binary_size();
            if entry_size > max_loop {
                return Err(TableError::EntryTooLarge {
                    key: *id,
                    size: entry_size,
                    max: max_loop,
                });
            }

            let index = match transport.preferred_section() {
                Some(hint) => {
                    while plans.len() <= hint {
                        plans.push(SectionPlan::empty(self.descs.len()));
                    }
                    if plans[hint].fits(entry_size, max_payload) {
                        Some(hint)
                    } else {
                        None
                    }
                }
                None => None,
            };
            let index = match index.or_else(|| plans.iter().position(|p| p.fits(entry_size, max_payload))) {
                Some(index) => index,
                None => {
                    plans.push(SectionPlan::empty(self.descs.len()));
                    plans.len() - 1
                }
            };

            trace!("{}: transport {} in section {}", K::XML_NAME, id, index);
            plans[index].add(*id, entry_size);
        }

        if plans.len() > 256 {
            return Err(TableError::TooManySections(plans.len()));
        }
        debug!(
            "{}: serialized {} transports into {} sections",
            K::XML_NAME,
            self.transports.len(),
            plans.len()
        );

        let last = (plans.len() - 1) as u8;
        let mut table = BinaryTable::new();
        for (number, plan) in plans.iter().enumerate() {
            let payload = self.build_payload(plan);
            let section = Section::new(
                self.table_id(),
                true,
                self.table_id_extension,
                self.version,
                self.is_current,
                number as u8,
                last,
                payload,
            )?;
            table.add_section(section);
        }
        Ok(table)
    }

    /// Spread the top-level descriptors over leading sections.
    fn plan_top_level(&self, max_loop: usize) -> Result<Vec<SectionPlan>, TableError> {
        let mut plans = Vec::new();
        let mut start = 0;
        loop {
            let end = self.descs.fitting_end(start, max_loop);
            if end == start && start < self.descs.len() {
                let size = self.descs.get(start).map_or(0, |d| d.size());
                return Err(TableError::DescriptorTooLarge {
                    size,
                    max: max_loop,
                });
            }
            plans.push(SectionPlan::new(start, end, self.descs.binary_size_of(start, end)));
            start = end;
            if start >= self.descs.len() {
                return Ok(plans);
            }
        }
    }

    fn build_payload(&self, plan: &SectionPlan) -> bytes::Bytes {
        let mut buf = BytesMut::with_capacity(plan.payload_size);

        buf.put_u16(LENGTH_RESERVED_BITS | plan.top_size as u16);
        self.descs.write_range(&mut buf, plan.top_start, plan.top_end);

        buf.put_u16(LENGTH_RESERVED_BITS | plan.loop_size as u16);
        for id in &plan.transports {
            if let Some(transport) = self.transports.get(id) {
                buf.put_u16(id.transport_stream_id);
                buf.put_u16(id.original_network_id);
                buf.put_u16(LENGTH_RESERVED_BITS | transport.descs.binary_size() as u16);
                transport.descs.write_to(&mut buf);
            }
        }
        buf.freeze()
    }

    // ------------------------------------------------------------------
    // XML
    // ------------------------------------------------------------------

    /// Build the XML form.
    pub fn to_xml(&self) -> Element {
        let mut root = Element::new(K::XML_NAME);
        root.set_int_attribute("version", self.version as i64);
        root.set_bool_attribute("current", self.is_current);
        root.set_hexa_attribute(K::EXTENSION_XML_NAME, self.table_id_extension as u64, 4);
        if K::OTHER_TABLE_ID.is_some() {
            root.set_bool_attribute("actual", self.is_actual);
        }
        self.descs.to_xml(&mut root);

        for (id, transport) in &self.transports {
            let e = root.add_element(TRANSPORT_XML_NAME);
            e.set_hexa_attribute("transport_stream_id", id.transport_stream_id as u64, 4);
            e.set_hexa_attribute("original_network_id", id.original_network_id as u64, 4);
            if transport.preferred_section >= 0 {
                e.set_int_attribute("preferred_section", transport.preferred_section as i64);
            }
            transport.descs.to_xml(e);
        }
        root
    }

    /// Decode the XML form. Check [`is_valid`](Self::is_valid) on the result.
    pub fn from_xml(element: &Element) -> Self {
        let mut table = Self::default();
        if let Err(e) = table.fill_from_xml(element) {
            warn!("Invalid <{}>: {}", element.name(), e);
            table.is_valid = false;
        }
        table
    }

    fn fill_from_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        element.check_name(K::XML_NAME)?;
        let version = element.int_attribute("version", false, 0, 0, MAX_VERSION as i64)? as u8;
        let is_current = element.bool_attribute("current", false, true)?;
        let extension = element.int_attribute(K::EXTENSION_XML_NAME, true, 0, 0x0000, 0xFFFF)? as u16;
        let is_actual = element.bool_attribute("actual", false, true)?;
        let (descs, children) = DescriptorList::from_xml(element, &[TRANSPORT_XML_NAME])?;

        self.version = version;
        self.is_current = is_current;
        self.table_id_extension = extension;
        self.set_actual(is_actual);
        self.descs = descs;

        for child in children {
            let id = TransportStreamId::new(
                child.int_attribute("transport_stream_id", true, 0, 0x0000, 0xFFFF)? as u16,
                child.int_attribute("original_network_id", true, 0, 0x0000, 0xFFFF)? as u16,
            );
            let transport = self.transports.entry(id).or_default();
            transport.descs = DescriptorList::from_xml(child, &[])?.0;
            transport.preferred_section = child.int_attribute(
                "preferred_section",
                false,
                NO_PREFERRED_SECTION as i64,
                0,
                MAX_PREFERRED_SECTION as i64,
            )? as i32;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Display
    // ------------------------------------------------------------------

    /// Walk one section with the decoding rules and report it to `display`.
    pub fn display_section(display: &mut dyn TablesDisplay, section: &Section, indent: usize) {
        let extension = section.table_id_extension();
        display.line(
            indent,
            &format!("{}: {} (0x{:X})", K::EXTENSION_DISPLAY_NAME, extension, extension),
        );

        let mut data = section.payload();
        if data.remaining() >= 2 {
            let top_length = read_loop_length(&mut data);
            if top_length > 0 {
                display.line(indent, &format!("{}:", K::TOP_LOOP_DISPLAY_NAME));
                display.descriptor_list(section, &data[..top_length], indent);
            }
            data.advance(top_length);

            if data.remaining() >= 2 {
                let mut loop_length = read_loop_length(&mut data);
                while loop_length >= TRANSPORT_HEADER_SIZE {
                    let tsid = data.get_u16();
                    let onid = data.get_u16();
                    let length =
                        ((data.get_u16() & 0x0FFF) as usize).min(loop_length - TRANSPORT_HEADER_SIZE);
                    loop_length -= TRANSPORT_HEADER_SIZE;
                    display.line(
                        indent,
                        &format!(
                            "Transport Stream Id: {} (0x{:X}), Original Network Id: {} (0x{:X})",
                            tsid, tsid, onid, onid
                        ),
                    );
                    display.descriptor_list(section, &data[..length], indent);
                    data.advance(length);
                    loop_length -= length;
                }
            }
        }

        display.extra_data(data, indent);
    }
}

/// Read a 12-bit loop length and clamp it to the bytes left after it.
fn read_loop_length(data: &mut &[u8]) -> usize {
    let length = (data.get_u16() & 0x0FFF) as usize;
    length.min(data.remaining())
}

/// Content of one section being packed.
#[derive(Debug)]
struct SectionPlan {
    top_start: usize,
    top_end: usize,
    top_size: usize,
    transports: Vec<TransportStreamId>,
    loop_size: usize,
    payload_size: usize,
}

impl SectionPlan {
    fn new(top_start: usize, top_end: usize, top_size: usize) -> Self {
        SectionPlan {
            top_start,
            top_end,
            top_size,
            transports: Vec::new(),
            loop_size: 0,
            payload_size: 4 + top_size,
        }
    }

    /// Section without top-level descriptors.
    fn empty(descs_count: usize) -> Self {
        Self::new(descs_count, descs_count, 0)
    }

    fn fits(&self, entry_size: usize, max_payload: usize) -> bool {
        self.payload_size + entry_size <= max_payload && self.loop_size + entry_size <= MAX_LOOP_LENGTH
    }

    fn add(&mut self, id: TransportStreamId, entry_size: usize) {
        self.transports.push(id);
        self.loop_size += entry_size;
        self.payload_size += entry_size;
    }
}

impl<K: TransportListKind> AbstractTable for TransportListTable<K> {
    fn table_id(&self) -> u8 {
        TransportListTable::table_id(self)
    }

    fn xml_name(&self) -> &'static str {
        K::XML_NAME
    }

    fn is_valid(&self) -> bool {
        self.is_valid
    }

    fn serialize(&self, ctx: &CodecContext) -> Result<BinaryTable, TableError> {
        TransportListTable::serialize(self, ctx)
    }

    fn to_xml(&self) -> Element {
        TransportListTable::to_xml(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Registry entry points, instantiated per kind.

pub(crate) fn decode_table<K: TransportListKind>(
    _ctx: &CodecContext,
    table: &BinaryTable,
) -> Box<dyn AbstractTable> {
    Box::new(TransportListTable::<K>::from_binary(table))
}

pub(crate) fn encode_table<K: TransportListKind>(
    ctx: &CodecContext,
    table: &dyn AbstractTable,
) -> Result<BinaryTable, TableError> {
    table
        .as_any()
        .downcast_ref::<TransportListTable<K>>()
        .ok_or(TableError::TableIdMismatch(table.table_id()))?
        .serialize(ctx)
}

pub(crate) fn table_from_xml<K: TransportListKind>(element: &Element) -> Box<dyn AbstractTable> {
    Box::new(TransportListTable::<K>::from_xml(element))
}
