//! Codec context: signalling standard and section size limits.
//!
//! A context can be built in code or loaded from a TOML file:
//!
//! ```toml
//! [codec]
//! standard = "isdb"
//! max_section_payload = 1024
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::TableError;
use crate::types::{Standard, MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE};

/// Smallest payload a transport-list section can be packed into:
/// two loop length fields and one transport header.
pub const MIN_SECTION_PAYLOAD: usize = 4 + 6;

/// Settings shared by every decode / encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecContext {
    standard: Standard,
    max_section_payload: usize,
}

impl Default for CodecContext {
    fn default() -> Self {
        Self::new(Standard::default())
    }
}

impl CodecContext {
    /// Context for a standard with the default long-section payload limit.
    pub fn new(standard: Standard) -> Self {
        Self {
            standard,
            max_section_payload: MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE,
        }
    }

    /// Override the maximum section payload used by encoders.
    pub fn with_max_section_payload(mut self, size: usize) -> Result<Self, TableError> {
        if !(MIN_SECTION_PAYLOAD..=MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE).contains(&size) {
            return Err(TableError::Config(format!(
                "max_section_payload {} outside {}..={}",
                size, MIN_SECTION_PAYLOAD, MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE
            )));
        }
        self.max_section_payload = size;
        Ok(self)
    }

    pub fn standard(&self) -> Standard {
        self.standard
    }

    pub fn max_section_payload(&self) -> usize {
        self.max_section_payload
    }

    /// Load a context from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, TableError> {
        let config: ConfigFile =
            toml::from_str(text).map_err(|e| TableError::Config(e.to_string()))?;
        let codec = config.codec;

        let mut ctx = Self::new(codec.standard.unwrap_or_default());
        if let Some(size) = codec.max_section_payload {
            ctx = ctx.with_max_section_payload(size)?;
        }
        debug!(
            "Codec context: standard={}, max_section_payload={}",
            ctx.standard, ctx.max_section_payload
        );
        Ok(ctx)
    }

    /// Load a context from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, TableError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    codec: CodecSection,
}

#[derive(Debug, Deserialize, Default)]
struct CodecSection {
    standard: Option<Standard>,
    max_section_payload: Option<usize>,
}
