//! Binary and XML codecs for MPEG-TS signalling tables.
//!
//! This crate converts long PSI/SI tables between their section form, a
//! typed in-memory model, and an XML representation.
//!
//! # Section Format
//!
//! ```text
//! +----------+---------------------+------------------------+----------+
//! | table_id | flags + length (12) | ext / version / number | payload  | CRC32 |
//! |  1 byte  |       2 bytes       |        5 bytes         | variable | 4 B   |
//! +----------+---------------------+------------------------+----------+-------+
//! ```
//!
//! Tables spanning several sections are assembled in a [`BinaryTable`].
//! Transport-list tables ([`Nit`], [`Bat`]) decode leniently: loop lengths
//! running past the available data are clamped, never rejected. Encoding
//! packs transports into as few sections as the [`CodecContext`] allows,
//! honoring each transport's preferred section where possible.
//!
//! # Example
//!
//! ```rust
//! use tstables::{registry, CodecContext, Nit, Transport, TransportStreamId};
//!
//! let registry = registry::init().unwrap();
//! let ctx = CodecContext::default();
//!
//! let mut nit = Nit::new(true, 1, true, 0x7FE8);
//! nit.transports
//!     .insert(TransportStreamId::new(0x7FE8, 0x7FE8), Transport::default());
//!
//! // Binary form
//! let binary = registry.encode(&ctx, &nit).unwrap();
//! let decoded = registry.decode(&ctx, &binary);
//! assert!(decoded.is_known());
//!
//! // XML form
//! let xml = registry.tables_to_xml(&[decoded]);
//! let tables = registry.tables_from_xml(&xml).unwrap();
//! assert_eq!(tables[0].as_table().xml_name(), "NIT");
//! ```
//!
//! Table types are looked up by table id and [`Standard`] through the
//! [`registry`]. Unknown tables are kept as [`OpaqueTable`] and written back
//! unchanged.

pub mod bat;
pub mod binary_table;
pub mod context;
pub mod descriptor;
pub mod display;
pub mod error;
pub mod nit;
pub mod registry;
pub mod section;
pub mod table;
pub mod transport;
pub mod transport_list;
pub mod types;
pub mod xml;

pub use bat::{Bat, BatKind};
pub use binary_table::BinaryTable;
pub use context::CodecContext;
pub use descriptor::{Descriptor, DescriptorList};
pub use display::{TablesDisplay, TextDisplay};
pub use error::{SectionError, TableError, XmlError};
pub use nit::{Nit, NitKind};
pub use registry::{TableHandler, TableRegistry};
pub use section::Section;
pub use table::{AbstractTable, DecodedTable, OpaqueTable};
pub use transport::{Transport, TransportMap, TransportStreamId};
pub use transport_list::{TransportListKind, TransportListTable};
pub use types::Standard;
pub use xml::Element;
