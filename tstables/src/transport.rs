//! Transport stream entries of transport-list tables (NIT, BAT).

use std::collections::BTreeMap;
use std::fmt;

use crate::descriptor::DescriptorList;

/// Composite key of a transport: transport stream id then original network id.
///
/// The derived ordering compares `transport_stream_id` first, and is the
/// order in which transports are encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportStreamId {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
}

impl TransportStreamId {
    pub fn new(transport_stream_id: u16, original_network_id: u16) -> Self {
        TransportStreamId {
            transport_stream_id,
            original_network_id,
        }
    }
}

impl fmt::Display for TransportStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04X}/0x{:04X}",
            self.transport_stream_id, self.original_network_id
        )
    }
}

/// Value attached to a transport key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transport {
    /// Transport descriptors.
    pub descs: DescriptorList,
    /// Section index to pack this transport into when serializing, -1 for none.
    pub preferred_section: i32,
}

impl Default for Transport {
    fn default() -> Self {
        Transport {
            descs: DescriptorList::new(),
            preferred_section: NO_PREFERRED_SECTION,
        }
    }
}

impl Transport {
    pub fn new(descs: DescriptorList) -> Self {
        Transport {
            descs,
            ..Default::default()
        }
    }

    /// Hinted section index, if any.
    pub fn preferred_section(&self) -> Option<usize> {
        usize::try_from(self.preferred_section).ok()
    }

    /// True when the hint is unset or names a possible section number.
    pub fn has_valid_hint(&self) -> bool {
        (NO_PREFERRED_SECTION..=MAX_PREFERRED_SECTION).contains(&self.preferred_section)
    }
}

/// "No preference" value of [`Transport::preferred_section`].
pub const NO_PREFERRED_SECTION: i32 = -1;

/// Highest section number a hint can name.
pub const MAX_PREFERRED_SECTION: i32 = 255;

/// Transports keyed by id. A repeated key replaces the previous value.
pub type TransportMap = BTreeMap<TransportStreamId, Transport>;
