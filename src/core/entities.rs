//! XML Entity Decoding and Escaping
//!
//! Handles decoding of XML entities:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! References to entities that were never declared (`&nbsp;` in a job
//! description, say) are kept verbatim instead of failing the parse. A bare
//! `&` or a malformed character reference is still a well-formedness error.
//!
//! Uses Cow for zero-copy when no entities are present.

use memchr::memchr;
use std::borrow::Cow;

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
/// The error carries a message and the byte offset of the bad reference.
#[inline]
pub fn decode_text(input: &str) -> Result<Cow<'_, str>, (&'static str, usize)> {
    // Fast path: check if there are any entities using SIMD
    if memchr(b'&', input.as_bytes()).is_none() {
        return Ok(Cow::Borrowed(input));
    }
    decode_entities(input).map(Cow::Owned)
}

fn decode_entities(input: &str) -> Result<String, (&'static str, usize)> {
    let bytes = input.as_bytes();
    let mut result = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some(amp_offset) = memchr(b'&', &bytes[pos..]) {
        let amp = pos + amp_offset;
        result.push_str(&input[pos..amp]);

        let semi = match memchr(b';', &bytes[amp..]) {
            Some(offset) => amp + offset,
            None => return Err(("Entity reference is missing its ';'", amp)),
        };
        let reference = &input[amp + 1..semi];

        if let Some(digits) = reference.strip_prefix('#') {
            let c = decode_char_ref(digits).ok_or(("Invalid character reference", amp))?;
            result.push(c);
        } else if !is_entity_name(reference) {
            return Err(("Bare '&' in content, expected an entity name", amp));
        } else if let Some(c) = predefined(reference) {
            result.push(c);
        } else {
            // Undeclared entity: not fatal, keep the reference as written
            result.push_str(&input[amp..=semi]);
        }

        pos = semi + 1;
    }

    result.push_str(&input[pos..]);
    Ok(result)
}

fn predefined(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Decode the part after `&#` of a numeric character reference
fn decode_char_ref(digits: &str) -> Option<char> {
    let codepoint = match digits.strip_prefix('x') {
        Some(hex) if !hex.is_empty() => u32::from_str_radix(hex, 16).ok()?,
        Some(_) => return None,
        None if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse::<u32>().ok()?
        }
        None => return None,
    };

    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint)
}

fn is_entity_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if super::scanner::is_name_start_char(first) => {}
        _ => return false,
    }
    bytes.all(super::scanner::is_name_char)
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// Escape text for element content
pub fn escape_text(input: &str) -> Cow<'_, str> {
    if !input.bytes().any(|b| matches!(b, b'<' | b'>' | b'&' | b'\r')) {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '\r' => result.push_str("&#13;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Escape text for an attribute value delimited by `quote`
pub fn escape_attribute(input: &str, quote: u8) -> Cow<'_, str> {
    let needs_escape = input
        .bytes()
        .any(|b| matches!(b, b'<' | b'&' | b'\t' | b'\n' | b'\r') || b == quote);
    if !needs_escape {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '&' => result.push_str("&amp;"),
            '"' if quote == b'"' => result.push_str("&quot;"),
            '\'' if quote == b'\'' => result.push_str("&apos;"),
            // Attribute value normalization would fold these into spaces
            '\t' => result.push_str("&#9;"),
            '\n' => result.push_str("&#10;"),
            '\r' => result.push_str("&#13;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Comment content that can be written between `<!--` and `-->`
///
/// `--` is split with a space and a trailing `-` gets one appended.
pub fn comment_content(input: &str) -> Cow<'_, str> {
    if !input.contains("--") && !input.ends_with('-') {
        return Cow::Borrowed(input);
    }

    let mut result = input.to_string();
    while result.contains("--") {
        result = result.replace("--", "- -");
    }
    if result.ends_with('-') {
        result.push(' ');
    }
    Cow::Owned(result)
}

/// Processing instruction data as the reader would return it: no leading
/// whitespace, and no `?>` (written as `? >`)
pub fn pi_data(input: &str) -> Cow<'_, str> {
    let trimmed = input.trim_start_matches([' ', '\t', '\n', '\r']);
    if !trimmed.contains("?>") {
        return Cow::Borrowed(trimmed);
    }
    Cow::Owned(trimmed.replace("?>", "? >"))
}
