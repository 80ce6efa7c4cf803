//! Diagnostic display sink.
//!
//! Table display routines walk a section and report its structure (header
//! lines, descriptor loops, trailing extra data) to a [`TablesDisplay`].
//! Interpreting descriptor content is left to the sink.

use std::io::Write;

use crate::section::Section;
use crate::xml::to_hexa;

/// Receiver of section structure.
pub trait TablesDisplay {
    /// One line of text at the given indentation.
    fn line(&mut self, indent: usize, text: &str);

    /// A descriptor loop of `section`.
    fn descriptor_list(&mut self, section: &Section, data: &[u8], indent: usize);

    /// Bytes left after the declared structure. Called with empty data too.
    fn extra_data(&mut self, data: &[u8], indent: usize);
}

/// Plain text display: descriptor tags, lengths and hex payloads.
#[derive(Debug)]
pub struct TextDisplay<W: Write> {
    out: W,
}

impl<W: Write> TextDisplay<W> {
    pub fn new(out: W) -> Self {
        TextDisplay { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TablesDisplay for TextDisplay<W> {
    fn line(&mut self, indent: usize, text: &str) {
        let _ = writeln!(self.out, "{:indent$}{}", "", text, indent = indent);
    }

    fn descriptor_list(&mut self, _section: &Section, mut data: &[u8], indent: usize) {
        let mut index = 0;
        while data.len() >= 2 {
            let tag = data[0];
            let length = (data[1] as usize).min(data.len() - 2);
            self.line(
                indent,
                &format!("- Descriptor {}: tag 0x{:02X}, {} bytes", index, tag, length),
            );
            if length > 0 {
                self.line(indent + 2, &to_hexa(&data[2..2 + length]));
            }
            data = &data[2 + length..];
            index += 1;
        }
        self.extra_data(data, indent);
    }

    fn extra_data(&mut self, data: &[u8], indent: usize) {
        if !data.is_empty() {
            self.line(indent, &format!("Extra data: {} bytes", data.len()));
            self.line(indent + 2, &to_hexa(data));
        }
    }
}
