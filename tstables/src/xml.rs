//! Generic attributed tree used as the structured (XML) form of tables.
//!
//! Tables convert to and from [`Element`] trees; [`Element::to_xml`] and
//! [`Element::parse`] convert trees to and from XML text.

use std::fmt::Write as _;

use crate::error::XmlError;

/// One element of the tree: a name, ordered attributes, child elements and text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check the element name, case-insensitively as XML table names are.
    pub fn check_name(&self, expected: &str) -> Result<(), XmlError> {
        if self.name.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(XmlError::UnexpectedElement {
                expected: expected.to_string(),
                found: self.name.clone(),
            })
        }
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    /// Set an attribute, replacing any previous value.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Set a decimal integer attribute.
    pub fn set_int_attribute(&mut self, name: &str, value: i64) {
        self.set_attribute(name, value.to_string());
    }

    /// Set a hexadecimal attribute, zero-padded to `digits`.
    pub fn set_hexa_attribute(&mut self, name: &str, value: u64, digits: usize) {
        self.set_attribute(name, format!("0x{:0width$X}", value, width = digits));
    }

    pub fn set_bool_attribute(&mut self, name: &str, value: bool) {
        self.set_attribute(name, if value { "true" } else { "false" });
    }

    /// Append a new child element and return it.
    pub fn add_element(&mut self, name: impl Into<String>) -> &mut Element {
        self.children.push(Element::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Read an integer attribute (decimal or `0x` hexadecimal) and check its range.
    ///
    /// An absent optional attribute yields `default`.
    pub fn int_attribute(
        &self,
        name: &str,
        required: bool,
        default: i64,
        min: i64,
        max: i64,
    ) -> Result<i64, XmlError> {
        let raw = match self.attribute(name) {
            Some(raw) => raw,
            None if required => return Err(self.missing(name)),
            None => return Ok(default),
        };

        let value = parse_integer(raw).ok_or_else(|| XmlError::InvalidValue {
            element: self.name.clone(),
            attribute: name.to_string(),
            value: raw.to_string(),
        })?;

        if value < min || value > max {
            return Err(XmlError::OutOfRange {
                element: self.name.clone(),
                attribute: name.to_string(),
                value,
                min,
                max,
            });
        }
        Ok(value)
    }

    /// Read a boolean attribute ("true"/"false", "yes"/"no", "1"/"0").
    pub fn bool_attribute(&self, name: &str, required: bool, default: bool) -> Result<bool, XmlError> {
        let raw = match self.attribute(name) {
            Some(raw) => raw,
            None if required => return Err(self.missing(name)),
            None => return Ok(default),
        };

        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(XmlError::InvalidValue {
                element: self.name.clone(),
                attribute: name.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// Decode the text content as hexadecimal bytes.
    pub fn hexa_text(&self) -> Result<Vec<u8>, XmlError> {
        from_hexa(&self.text).ok_or_else(|| XmlError::InvalidHexa(self.name.clone()))
    }

    fn missing(&self, name: &str) -> XmlError {
        XmlError::MissingAttribute {
            element: self.name.clone(),
            attribute: name.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Text form
    // ------------------------------------------------------------------

    /// Serialize as an XML document with a declaration and 2-space indentation.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.write_xml(&mut out, 0);
        out
    }

    fn write_xml(&self, out: &mut String, depth: usize) {
        let margin = "  ".repeat(depth);
        let _ = write!(out, "{}<{}", margin, self.name);
        for (name, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }

        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>\n");
        } else if self.children.is_empty() {
            let _ = writeln!(out, ">{}</{}>", escape(&self.text), self.name);
        } else {
            out.push_str(">\n");
            if !self.text.is_empty() {
                let _ = writeln!(out, "{}  {}", margin, escape(&self.text));
            }
            for child in &self.children {
                child.write_xml(out, depth + 1);
            }
            let _ = writeln!(out, "{}</{}>", margin, self.name);
        }
    }

    /// Parse an XML document and return its root element.
    pub fn parse(text: &str) -> Result<Element, XmlError> {
        let doc = roxmltree::Document::parse(text).map_err(|e| XmlError::Malformed(e.to_string()))?;
        Ok(Self::from_node(doc.root_element()))
    }

    fn from_node(node: roxmltree::Node) -> Element {
        let mut element = Element::new(node.tag_name().name());
        for attr in node.attributes() {
            element
                .attributes
                .push((attr.name().to_string(), attr.value().to_string()));
        }

        let mut text = String::new();
        for child in node.children() {
            if child.is_element() {
                element.children.push(Self::from_node(child));
            } else if child.is_text() {
                if let Some(t) = child.text() {
                    text.push_str(t);
                }
            }
        }
        element.text = text.trim().to_string();
        element
    }
}

/// Format bytes as space-separated uppercase hexadecimal.
pub fn to_hexa(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Parse hexadecimal text, ignoring whitespace. Returns None on odd digit
/// count or non-hexadecimal characters.
pub fn from_hexa(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<_>>()?;

    if digits.len() % 2 != 0 {
        return None;
    }
    Some(digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim().replace(',', "");
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
