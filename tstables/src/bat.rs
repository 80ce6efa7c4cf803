//! BAT (Bouquet Association Table).
//!
//! Same layout as the NIT, keyed by bouquet id, carried on PID 0x0011.

use crate::registry::TableHandler;
use crate::transport_list::{
    decode_table, encode_table, table_from_xml, TransportListKind, TransportListTable,
};
use crate::types::{table_id, Standard};

/// Marker for the BAT layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatKind;

impl TransportListKind for BatKind {
    const XML_NAME: &'static str = "BAT";
    const STANDARD: Standard = Standard::Dvb;
    const ACTUAL_TABLE_ID: u8 = table_id::BAT;
    const OTHER_TABLE_ID: Option<u8> = None;
    const EXTENSION_XML_NAME: &'static str = "bouquet_id";
    const EXTENSION_DISPLAY_NAME: &'static str = "Bouquet Id";
    const TOP_LOOP_DISPLAY_NAME: &'static str = "Bouquet information";

    fn table_ids() -> &'static [u8] {
        &[table_id::BAT]
    }
}

/// Bouquet Association Table.
pub type Bat = TransportListTable<BatKind>;

impl TransportListTable<BatKind> {
    pub fn bouquet_id(&self) -> u16 {
        self.table_id_extension
    }
}

/// Registry entry for the BAT.
pub fn handler() -> TableHandler {
    TableHandler {
        table_ids: BatKind::table_ids(),
        standard: BatKind::STANDARD,
        xml_name: BatKind::XML_NAME,
        decode: decode_table::<BatKind>,
        encode: encode_table::<BatKind>,
        from_xml: table_from_xml::<BatKind>,
        display: Some(Bat::display_section),
    }
}
