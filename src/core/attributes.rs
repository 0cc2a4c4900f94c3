//! XML Attribute Parsing
//!
//! Parses the attribute list of a start tag. Each attribute keeps both the
//! raw text between its quotes (written back untouched by the serializer)
//! and the decoded, normalized value that XPath sees.

use super::entities::decode_text;
use super::scanner::{is_name_char, is_name_start_char, is_whitespace};
use memchr::{memchr, memchr3};
use std::borrow::Cow;

/// A parsed XML attribute
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// Attribute name (may include namespace prefix)
    pub name: &'a str,
    /// Value as written in the source, without the quotes
    pub raw_value: &'a str,
    /// Value with entities decoded and whitespace normalized
    pub value: Cow<'a, str>,
    /// Quote character used in the source (`"` or `'`)
    pub quote: u8,
}

impl<'a> Attribute<'a> {
    /// Namespace prefix (before colon), if any
    pub fn prefix(&self) -> Option<&'a str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Whether this attribute declares a namespace (`xmlns` or `xmlns:p`)
    pub fn is_namespace_decl(&self) -> bool {
        self.name == "xmlns" || self.name.starts_with("xmlns:")
    }
}

/// Parse attributes from raw tag content (after the element name)
///
/// Input should be the content between element name and '>' or '/>'.
/// Errors carry a message and a byte offset relative to `input`.
pub fn parse_attributes(input: &str) -> Result<Vec<Attribute<'_>>, (&'static str, usize)> {
    let bytes = input.as_bytes();
    let mut attrs: Vec<Attribute<'_>> = Vec::new();
    let mut pos = 0;

    loop {
        let ws_start = pos;
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        if pos == ws_start && !attrs.is_empty() {
            return Err(("Attributes must be separated by whitespace", pos));
        }

        // Attribute name
        let name_start = pos;
        if !is_name_start_char(bytes[pos]) {
            return Err(("Attribute name must start with letter, underscore, or colon", pos));
        }
        while pos < bytes.len() && is_name_char(bytes[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }
        if bytes.get(pos) != Some(&b'=') {
            return Err(("Attribute is missing '='", pos));
        }
        pos += 1;
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }

        // Quoted value
        let quote = match bytes.get(pos) {
            Some(&q @ (b'"' | b'\'')) => q,
            _ => return Err(("Attribute value must be quoted", pos)),
        };
        pos += 1;
        let value_start = pos;
        let value_end = match memchr(quote, &bytes[pos..]) {
            Some(offset) => pos + offset,
            None => return Err(("Unterminated attribute value", value_start)),
        };
        let raw_value = &input[value_start..value_end];
        if let Some(lt) = memchr(b'<', raw_value.as_bytes()) {
            return Err(("'<' is not allowed in attribute values", value_start + lt));
        }
        pos = value_end + 1;

        if attrs.iter().any(|a| a.name == name) {
            return Err(("Duplicate attribute", name_start));
        }

        let value = normalize_value(raw_value).map_err(|(msg, at)| (msg, value_start + at))?;
        attrs.push(Attribute {
            name,
            raw_value,
            value,
            quote,
        });
    }

    Ok(attrs)
}

/// Decode entities and fold literal tab/newline/CR into spaces
fn normalize_value(raw: &str) -> Result<Cow<'_, str>, (&'static str, usize)> {
    if memchr3(b'\t', b'\n', b'\r', raw.as_bytes()).is_none() {
        return decode_text(raw);
    }
    let folded: String = raw
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect();
    let decoded = decode_text(&folded)?.into_owned();
    Ok(Cow::Owned(decoded))
}
