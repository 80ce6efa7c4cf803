//! Opaque descriptors and descriptor lists.
//!
//! Descriptors are kept as tagged binary blobs. Their content is not
//! interpreted here; in the XML form each one becomes a
//! `<generic_descriptor tag="0xNN">HEX</generic_descriptor>` element.

use bytes::{BufMut, Bytes};
use log::debug;

use crate::error::{TableError, XmlError};
use crate::xml::{to_hexa, Element};

/// Maximum descriptor payload (8-bit length field).
pub const MAX_DESCRIPTOR_PAYLOAD_SIZE: usize = 255;

/// Maximum descriptor size, tag and length included.
pub const MAX_DESCRIPTOR_SIZE: usize = 2 + MAX_DESCRIPTOR_PAYLOAD_SIZE;

/// XML name of the opaque descriptor element.
pub const GENERIC_DESCRIPTOR_XML_NAME: &str = "generic_descriptor";

/// One descriptor: an 8-bit tag and up to 255 bytes of payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    tag: u8,
    payload: Bytes,
}

impl Descriptor {
    pub fn new(tag: u8, payload: impl Into<Bytes>) -> Result<Self, TableError> {
        let payload = payload.into();
        if payload.len() > MAX_DESCRIPTOR_PAYLOAD_SIZE {
            return Err(TableError::DescriptorTooLarge {
                size: 2 + payload.len(),
                max: MAX_DESCRIPTOR_SIZE,
            });
        }
        Ok(Descriptor { tag, payload })
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encoded size, tag and length included.
    pub fn size(&self) -> usize {
        2 + self.payload.len()
    }

    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.tag);
        buf.put_u8(self.payload.len() as u8);
        buf.put_slice(&self.payload);
    }

    pub fn to_xml(&self) -> Element {
        let mut e = Element::new(GENERIC_DESCRIPTOR_XML_NAME);
        e.set_hexa_attribute("tag", self.tag as u64, 2);
        e.set_text(to_hexa(&self.payload));
        e
    }

    pub fn from_xml(element: &Element) -> Result<Self, XmlError> {
        element.check_name(GENERIC_DESCRIPTOR_XML_NAME)?;
        let tag = element.int_attribute("tag", true, 0, 0x00, 0xFF)? as u8;
        let payload = element.hexa_text()?;
        if payload.len() > MAX_DESCRIPTOR_PAYLOAD_SIZE {
            return Err(XmlError::ContentTooLarge {
                element: element.name().to_string(),
                size: payload.len(),
                max: MAX_DESCRIPTOR_PAYLOAD_SIZE,
            });
        }
        Ok(Descriptor {
            tag,
            payload: Bytes::from(payload),
        })
    }
}

/// Ordered list of descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorList {
    descs: Vec<Descriptor>,
}

impl DescriptorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, desc: Descriptor) {
        self.descs.push(desc);
    }

    /// Append all descriptors found in a binary descriptor loop.
    ///
    /// A trailing fragment too short for its declared length is dropped.
    /// Returns the number of bytes dropped.
    pub fn add_from_bytes(&mut self, mut data: &[u8]) -> usize {
        while data.len() >= 2 {
            let tag = data[0];
            let length = data[1] as usize;
            if 2 + length > data.len() {
                break;
            }
            self.descs.push(Descriptor {
                tag,
                payload: Bytes::copy_from_slice(&data[2..2 + length]),
            });
            data = &data[2 + length..];
        }
        if !data.is_empty() {
            debug!("Dropping {} bytes of truncated descriptor", data.len());
        }
        data.len()
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    pub fn clear(&mut self) {
        self.descs.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.descs.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descs.iter()
    }

    /// Find the first descriptor with a given tag.
    pub fn find(&self, tag: u8) -> Option<&Descriptor> {
        self.descs.iter().find(|d| d.tag == tag)
    }

    /// Total encoded size of all descriptors.
    pub fn binary_size(&self) -> usize {
        self.descs.iter().map(Descriptor::size).sum()
    }

    /// Encoded size of the descriptors in `start..end`.
    pub fn binary_size_of(&self, start: usize, end: usize) -> usize {
        self.descs[start..end].iter().map(Descriptor::size).sum()
    }

    /// Index after the last descriptor, starting at `start`, whose
    /// cumulated size stays within `max_size`.
    pub fn fitting_end(&self, start: usize, max_size: usize) -> usize {
        let mut size = 0;
        let mut end = start;
        while end < self.descs.len() && size + self.descs[end].size() <= max_size {
            size += self.descs[end].size();
            end += 1;
        }
        end
    }

    /// Write the descriptors in `start..end`.
    pub fn write_range<B: BufMut>(&self, buf: &mut B, start: usize, end: usize) {
        for desc in &self.descs[start..end] {
            desc.write_to(buf);
        }
    }

    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        self.write_range(buf, 0, self.descs.len());
    }

    /// Append all descriptors as children of `parent`.
    pub fn to_xml(&self, parent: &mut Element) {
        for desc in &self.descs {
            parent.push_child(desc.to_xml());
        }
    }

    /// Build a list from the children of `parent`.
    ///
    /// Children named in `others` are not descriptors; they are returned
    /// in document order for the caller to decode. Any other element must be
    /// a valid descriptor.
    pub fn from_xml<'a>(
        parent: &'a Element,
        others: &[&str],
    ) -> Result<(DescriptorList, Vec<&'a Element>), XmlError> {
        let mut list = DescriptorList::new();
        let mut remaining = Vec::new();

        for child in parent.children() {
            if others.iter().any(|name| child.name().eq_ignore_ascii_case(name)) {
                remaining.push(child);
            } else if child.name().eq_ignore_ascii_case(GENERIC_DESCRIPTOR_XML_NAME) {
                list.add(Descriptor::from_xml(child)?);
            } else {
                return Err(XmlError::UnknownDescriptor(child.name().to_string()));
            }
        }
        Ok((list, remaining))
    }
}

impl<'a> IntoIterator for &'a DescriptorList {
    type Item = &'a Descriptor;
    type IntoIter = std::slice::Iter<'a, Descriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn network_name(name: &str) -> Descriptor {
        Descriptor::new(0x40, name.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_add_from_bytes() {
        let data = [
            0x40, 0x03, b'N', b'e', b't', // network name
            0xFA, 0x00, // empty descriptor
        ];
        let mut list = DescriptorList::new();
        assert_eq!(list.add_from_bytes(&data), 0);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().payload(), b"Net");
        assert_eq!(list.get(1).unwrap().tag(), 0xFA);
        assert_eq!(list.binary_size(), data.len());
    }

    #[test]
    fn test_add_from_bytes_truncated() {
        // Second descriptor declares 5 bytes but only 2 remain
        let data = [0x40, 0x01, b'A', 0x41, 0x05, 0x01, 0x02];
        let mut list = DescriptorList::new();
        assert_eq!(list.add_from_bytes(&data), 4);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_write_preserves_order() {
        let mut list = DescriptorList::new();
        list.add(network_name("B"));
        list.add(Descriptor::new(0x41, vec![1, 2]).unwrap());
        list.add(network_name("A"));

        let mut buf = BytesMut::new();
        list.write_to(&mut buf);
        let mut parsed = DescriptorList::new();
        parsed.add_from_bytes(&buf);
        assert_eq!(parsed, list);
    }

    #[test]
    fn test_fitting_end() {
        let mut list = DescriptorList::new();
        for _ in 0..4 {
            list.add(Descriptor::new(0x40, vec![0; 8]).unwrap()); // 10 bytes each
        }
        assert_eq!(list.fitting_end(0, 25), 2);
        assert_eq!(list.fitting_end(2, 100), 4);
        assert_eq!(list.fitting_end(0, 5), 0);
        assert_eq!(list.binary_size_of(1, 3), 20);
    }

    #[test]
    fn test_descriptor_too_large() {
        assert!(matches!(
            Descriptor::new(0x40, vec![0; 256]),
            Err(TableError::DescriptorTooLarge { size: 258, max: 257 })
        ));
    }

    #[test]
    fn test_xml_round_trip() {
        let mut list = DescriptorList::new();
        list.add(network_name("Kanto"));
        list.add(Descriptor::new(0xFE, Bytes::new()).unwrap());

        let mut root = Element::new("NIT");
        list.to_xml(&mut root);
        root.add_element("transport_stream");

        let (parsed, others) = DescriptorList::from_xml(&root, &["transport_stream"]).unwrap();
        assert_eq!(parsed, list);
        assert_eq!(others.len(), 1);
        assert_eq!(root.children()[0].attribute("tag"), Some("0x40"));
    }

    #[test]
    fn test_xml_unknown_element() {
        let mut root = Element::new("NIT");
        root.add_element("service");
        assert_eq!(
            DescriptorList::from_xml(&root, &["transport_stream"]),
            Err(XmlError::UnknownDescriptor("service".to_string()))
        );
    }

    #[test]
    fn test_xml_bad_descriptor() {
        let mut root = Element::new("NIT");
        root.add_element(GENERIC_DESCRIPTOR_XML_NAME).set_text("40 01");
        // Missing tag attribute
        assert!(matches!(
            DescriptorList::from_xml(&root, &[]),
            Err(XmlError::MissingAttribute { .. })
        ));
    }
}
