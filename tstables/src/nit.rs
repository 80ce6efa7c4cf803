//! NIT (Network Information Table).
//!
//! The NIT is transmitted on PID 0x0010 and describes the transport streams
//! of a network. Table id 0x40 describes the actual network, 0x41 another one;
//! both share the same layout and codec, the difference is carried by
//! [`TransportListTable::is_actual`].

use crate::registry::TableHandler;
use crate::transport_list::{
    decode_table, encode_table, table_from_xml, TransportListKind, TransportListTable,
};
use crate::types::{table_id, Standard};

/// Marker for the NIT layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NitKind;

impl TransportListKind for NitKind {
    const XML_NAME: &'static str = "NIT";
    const STANDARD: Standard = Standard::Dvb;
    const ACTUAL_TABLE_ID: u8 = table_id::NIT_ACTUAL;
    const OTHER_TABLE_ID: Option<u8> = Some(table_id::NIT_OTHER);
    const EXTENSION_XML_NAME: &'static str = "network_id";
    const EXTENSION_DISPLAY_NAME: &'static str = "Network Id";
    const TOP_LOOP_DISPLAY_NAME: &'static str = "Network information";

    fn table_ids() -> &'static [u8] {
        &[table_id::NIT_ACTUAL, table_id::NIT_OTHER]
    }
}

/// Network Information Table.
pub type Nit = TransportListTable<NitKind>;

impl TransportListTable<NitKind> {
    pub fn network_id(&self) -> u16 {
        self.table_id_extension
    }
}

/// Registry entry for the NIT.
pub fn handler() -> TableHandler {
    TableHandler {
        table_ids: NitKind::table_ids(),
        standard: NitKind::STANDARD,
        xml_name: NitKind::XML_NAME,
        decode: decode_table::<NitKind>,
        encode: encode_table::<NitKind>,
        from_xml: table_from_xml::<NitKind>,
        display: Some(Nit::display_section),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary_table::BinaryTable;
    use crate::context::CodecContext;
    use crate::descriptor::{Descriptor, DescriptorList};
    use crate::display::TextDisplay;
    use crate::section::Section;
    use crate::transport::{Transport, TransportStreamId};
    use crate::xml::Element;
    use bytes::Bytes;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn section(table_id: u8, number: u8, last: u8, payload: &[u8]) -> Section {
        Section::new(table_id, true, 0x7FE0, 1, true, number, last, Bytes::copy_from_slice(payload))
            .unwrap()
    }

    fn sample_nit() -> Nit {
        let mut nit = Nit::new(true, 4, true, 0x7FE0);
        nit.descs
            .add(Descriptor::new(0x40, b"Net001".to_vec()).unwrap());
        for tsid in [0x7FE1u16, 0x7FE2, 0x7FE3] {
            let mut descs = DescriptorList::new();
            descs.add(Descriptor::new(0xFA, vec![0x3E, 0x42, 0x0A, 0xFB]).unwrap());
            nit.transports
                .insert(TransportStreamId::new(tsid, 0x7FE0), Transport::new(descs));
        }
        nit
    }

    #[test]
    fn test_parse_nit() {
        init_logger();
        let data = [
            // Network descriptors length = 8
            0xF0, 0x08,
            // Network name descriptor: tag=0x40, length=6, "Net001"
            0x40, 0x06, b'N', b'e', b't', b'0', b'0', b'1',
            // Transport stream loop length = 8
            0xF0, 0x08,
            // TS entry: TSID=0x7FE1, ONID=0x7FE0, descriptors_length=2
            0x7F, 0xE1, 0x7F, 0xE0, 0xF0, 0x02,
            // Dummy descriptor
            0xFF, 0x00,
        ];

        let table = BinaryTable::from_sections(vec![section(0x40, 0, 0, &data)]).unwrap();
        let mut nit = Nit::default();
        assert_eq!(nit.deserialize(&table), 0);

        assert!(nit.is_valid());
        assert!(nit.is_actual());
        assert_eq!(nit.network_id(), 0x7FE0);
        assert_eq!(nit.version, 1);
        assert_eq!(nit.descs.find(0x40).unwrap().payload(), b"Net001");
        assert_eq!(nit.transports.len(), 1);
        let (id, ts) = nit.find_transport(0x7FE1).unwrap();
        assert_eq!(id.original_network_id, 0x7FE0);
        assert_eq!(ts.descs.len(), 1);
        assert_eq!(ts.preferred_section, -1);
    }

    #[test]
    fn test_other_network() {
        let table = BinaryTable::from_sections(vec![section(0x41, 0, 0, &[0xF0, 0x00, 0xF0, 0x00])])
            .unwrap();
        let nit = Nit::from_binary(&table);
        assert!(nit.is_valid());
        assert!(!nit.is_actual());
        assert_eq!(nit.table_id(), 0x41);
    }

    #[test]
    fn test_rejects_other_table_id() {
        let table = BinaryTable::from_sections(vec![section(0x42, 0, 0, &[0xF0, 0x00, 0xF0, 0x00])])
            .unwrap();
        assert!(!Nit::from_binary(&table).is_valid());
    }

    #[test]
    fn test_incomplete_table_invalid() {
        let table =
            BinaryTable::from_sections(vec![section(0x40, 1, 1, &[0xF0, 0x00, 0xF0, 0x00])]).unwrap();
        assert!(!Nit::from_binary(&table).is_valid());
    }

    #[test]
    fn test_empty_payload() {
        let mut nit = Nit::default();
        let extra = nit.deserialize_payload(0x0010, &[0x00, 0x00]);
        assert_eq!(extra, 0);
        assert!(nit.is_valid());
        assert_eq!(nit.network_id(), 0x0010);
        assert!(nit.descs.is_empty());
        assert!(nit.transports.is_empty());
    }

    #[test]
    fn test_single_empty_transport() {
        let mut nit = Nit::default();
        let payload = [0xF0, 0x00, 0xF0, 0x06, 0x00, 0x01, 0x00, 0x02, 0xF0, 0x00];
        assert_eq!(nit.deserialize_payload(1, &payload), 0);

        assert_eq!(nit.transports.len(), 1);
        let ts = &nit.transports[&TransportStreamId::new(1, 2)];
        assert!(ts.descs.is_empty());
        assert_eq!(ts.preferred_section, -1);
    }

    #[test]
    fn test_loop_length_masking() {
        let masked = [0xF0, 0x03, 0x40, 0x01, 0x41, 0xF0, 0x00];
        let plain = [0x00, 0x03, 0x40, 0x01, 0x41, 0x00, 0x00];
        let mut a = Nit::default();
        let mut b = Nit::default();
        a.deserialize_payload(0, &masked);
        b.deserialize_payload(0, &plain);
        assert_eq!(a, b);
        assert_eq!(a.descs.len(), 1);
    }

    #[test]
    fn test_clamped_lengths() {
        // Top loop declares 0x123 bytes, only 3 available
        let mut nit = Nit::default();
        let extra = nit.deserialize_payload(0, &[0xF1, 0x23, 0x40, 0x01, 0x41]);
        assert_eq!(extra, 0);
        assert_eq!(nit.descs.len(), 1);

        // Transport declares 0xFFF bytes of descriptors, loop holds 2
        let mut nit = Nit::default();
        let payload = [0xF0, 0x00, 0xF0, 0x08, 0x00, 0x01, 0x00, 0x02, 0xFF, 0xFF, 0x40, 0x00];
        assert_eq!(nit.deserialize_payload(0, &payload), 0);
        assert_eq!(nit.transports[&TransportStreamId::new(1, 2)].descs.len(), 1);
    }

    #[test]
    fn test_trailing_fragment_is_extra_data() {
        let mut nit = Nit::default();
        // Transport loop of 9 bytes: one empty transport and a 3-byte fragment,
        // then 2 bytes after the loop
        let payload = [
            0xF0, 0x00, 0xF0, 0x09, 0x00, 0x01, 0x00, 0x02, 0xF0, 0x00, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE,
        ];
        assert_eq!(nit.deserialize_payload(0, &payload), 5);
        assert_eq!(nit.transports.len(), 1);
    }

    #[test]
    fn test_duplicate_key_overwrites() {
        let mut nit = Nit::default();
        let payload = [
            0xF0, 0x00, 0xF0, 0x12,
            0x00, 0x01, 0x00, 0x02, 0xF0, 0x03, 0x40, 0x01, 0x41,
            0x00, 0x01, 0x00, 0x02, 0xF0, 0x03, 0x40, 0x01, 0x42,
        ];
        assert_eq!(nit.deserialize_payload(0, &payload), 0);
        assert_eq!(nit.transports.len(), 1);
        let ts = &nit.transports[&TransportStreamId::new(1, 2)];
        assert_eq!(ts.descs.get(0).unwrap().payload(), &[0x42]);
    }

    #[test]
    fn test_duplicate_key_across_sections() {
        let first = [0xF0, 0x00, 0xF0, 0x09, 0x00, 0x01, 0x00, 0x02, 0xF0, 0x03, 0x40, 0x01, 0x41];
        let second = [0xF0, 0x00, 0xF0, 0x09, 0x00, 0x01, 0x00, 0x02, 0xF0, 0x03, 0x40, 0x01, 0x42];
        let table =
            BinaryTable::from_sections(vec![section(0x40, 0, 1, &first), section(0x40, 1, 1, &second)])
                .unwrap();
        let nit = Nit::from_binary(&table);
        assert!(nit.is_valid());
        let ts = &nit.transports[&TransportStreamId::new(1, 2)];
        assert_eq!(ts.descs.get(0).unwrap().payload(), &[0x42]);
    }

    #[test]
    fn test_binary_round_trip() {
        let nit = sample_nit();
        let table = nit.serialize(&CodecContext::default()).unwrap();
        assert_eq!(table.section_count(), 1);
        assert_eq!(table.table_id(), Some(0x40));
        assert_eq!(Nit::from_binary(&table), nit);
    }

    #[test]
    fn test_xml_round_trip() {
        let mut nit = sample_nit();
        nit.set_actual(false);
        nit.is_current = false;
        nit.transports
            .get_mut(&TransportStreamId::new(0x7FE2, 0x7FE0))
            .unwrap()
            .preferred_section = 3;

        let xml = nit.to_xml();
        assert_eq!(xml.attribute("network_id"), Some("0x7FE0"));
        assert_eq!(xml.attribute("actual"), Some("false"));
        let parsed = Nit::from_xml(&Element::parse(&xml.to_xml()).unwrap());
        assert!(parsed.is_valid());
        assert_eq!(parsed, nit);
    }

    #[test]
    fn test_xml_defaults() {
        let xml = Element::parse(
            r#"<NIT network_id="0x0001">
                 <transport_stream transport_stream_id="0x0002" original_network_id="0x0003"/>
               </NIT>"#,
        )
        .unwrap();
        let nit = Nit::from_xml(&xml);
        assert!(nit.is_valid());
        assert!(nit.is_current);
        assert!(nit.is_actual());
        assert_eq!(nit.version, 0);
        assert_eq!(nit.transports[&TransportStreamId::new(2, 3)].preferred_section, -1);
    }

    #[test]
    fn test_xml_validation_failures() {
        let cases = [
            // Missing network_id
            r#"<NIT version="1"/>"#,
            // Version out of range
            r#"<NIT version="32" network_id="1"/>"#,
            // Transport without original_network_id
            r#"<NIT network_id="1"><transport_stream transport_stream_id="1"/></NIT>"#,
            // preferred_section out of range
            r#"<NIT network_id="1"><transport_stream transport_stream_id="1" original_network_id="1" preferred_section="256"/></NIT>"#,
            // Wrong element name
            r#"<BAT bouquet_id="1"/>"#,
        ];
        for case in cases {
            let nit = Nit::from_xml(&Element::parse(case).unwrap());
            assert!(!nit.is_valid(), "{}", case);
        }
    }

    #[test]
    fn test_xml_stops_at_first_invalid_transport() {
        let xml = Element::parse(
            r#"<NIT network_id="1">
                 <transport_stream transport_stream_id="1" original_network_id="1"/>
                 <transport_stream transport_stream_id="0x10000" original_network_id="1"/>
                 <transport_stream transport_stream_id="3" original_network_id="1"/>
               </NIT>"#,
        )
        .unwrap();
        let nit = Nit::from_xml(&xml);
        assert!(!nit.is_valid());
        assert_eq!(nit.transport_ids(), vec![1]);
    }

    #[test]
    fn test_display_section() {
        let data = [
            0xF0, 0x03, 0x40, 0x01, b'N',
            0xF0, 0x06, 0x7F, 0xE1, 0x7F, 0xE0, 0xF0, 0x00,
            0xAB,
        ];
        let mut display = TextDisplay::new(Vec::new());
        Nit::display_section(&mut display, &section(0x40, 0, 0, &data), 0);
        let text = String::from_utf8(display.into_inner()).unwrap();

        assert!(text.contains("Network Id: 32736 (0x7FE0)"));
        assert!(text.contains("Network information:"));
        assert!(text.contains("Transport Stream Id: 32737 (0x7FE1), Original Network Id: 32736 (0x7FE0)"));
        assert!(text.contains("Extra data: 1 bytes"));
    }
}
