//! Zero-Copy Slice Reader
//!
//! Turns tokens into events over a `&str`, keeping references into the input.
//! On top of the tokenizer's lexical checks the reader enforces document
//! structure: tags nest and match, there is exactly one root element, and
//! nothing but whitespace, comments and processing instructions sits outside
//! it. The event stream it yields is therefore always well-formed.

use super::events::{EndElement, StartElement, XmlEvent};
use crate::core::attributes::parse_attributes;
use crate::core::entities::decode_text;
use crate::core::scanner::is_whitespace;
use crate::core::tokenizer::{Token, TokenKind, Tokenizer};
use crate::error::ParseError;
use std::borrow::Cow;

/// Zero-copy XML reader from a string slice
pub struct SliceReader<'a> {
    input: &'a str,
    tokenizer: Tokenizer<'a>,
    /// Names of the currently open elements
    open: Vec<&'a str>,
    seen_root: bool,
    seen_doctype: bool,
    finished: bool,
}

impl<'a> SliceReader<'a> {
    pub fn new(input: &'a str) -> Self {
        SliceReader {
            input,
            tokenizer: Tokenizer::new(input),
            open: Vec::new(),
            seen_root: false,
            seen_doctype: false,
            finished: false,
        }
    }

    /// Current element nesting depth
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn error(&mut self, message: impl Into<String>, position: usize) -> ParseError {
        self.finished = true;
        ParseError::new(message, self.input, position)
    }

    /// Get the next XML event
    ///
    /// After `EndDocument` or an error every further call yields `EndDocument`.
    pub fn next_event(&mut self) -> Result<XmlEvent<'a>, ParseError> {
        loop {
            if self.finished {
                return Ok(XmlEvent::EndDocument);
            }
            let token = match self.tokenizer.next_token() {
                Ok(token) => token,
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            };

            match token.kind {
                TokenKind::Eof => {
                    if let Some(name) = self.open.last() {
                        let message = format!("Premature end of data: element <{}> is not closed", name);
                        return Err(self.error(message, token.span.0));
                    }
                    if !self.seen_root {
                        return Err(self.error("Document has no root element", token.span.0));
                    }
                    self.finished = true;
                    return Ok(XmlEvent::EndDocument);
                }

                TokenKind::StartTag | TokenKind::EmptyTag => {
                    let name = token.name.unwrap_or_default();
                    if self.open.is_empty() && self.seen_root {
                        return Err(self.error("Extra content at the end of the document", token.span.0));
                    }
                    self.seen_root = true;
                    let element = StartElement::new(name, self.tag_attributes(&token)?);
                    if token.kind == TokenKind::StartTag {
                        self.open.push(name);
                        return Ok(XmlEvent::StartElement(element));
                    }
                    return Ok(XmlEvent::EmptyElement(element));
                }

                TokenKind::EndTag => {
                    let name = token.name.unwrap_or_default();
                    match self.open.pop() {
                        Some(open) if open == name => return Ok(XmlEvent::EndElement(EndElement { name })),
                        Some(open) => {
                            let message = format!("Mismatched end tag: expected </{}>, found </{}>", open, name);
                            return Err(self.error(message, token.span.0));
                        }
                        None => {
                            let message = format!("Unexpected end tag </{}>", name);
                            return Err(self.error(message, token.span.0));
                        }
                    }
                }

                TokenKind::Text => {
                    let raw = token.content.unwrap_or_default();
                    if self.open.is_empty() {
                        // Whitespace between top-level constructs carries nothing
                        if let Some(offset) = raw.bytes().position(|b| !is_whitespace(b)) {
                            let message = if self.seen_root {
                                "Extra content at the end of the document"
                            } else {
                                "Text is not allowed before the root element"
                            };
                            return Err(self.error(message, token.span.0 + offset));
                        }
                        continue;
                    }
                    let value = match decode_text(raw) {
                        Ok(value) => value,
                        Err((message, offset)) => return Err(self.error(message, token.content_pos + offset)),
                    };
                    return Ok(XmlEvent::Text { raw, value });
                }

                TokenKind::CData => {
                    if self.open.is_empty() {
                        return Err(self.error("CDATA section outside the root element", token.span.0));
                    }
                    return Ok(XmlEvent::CData(token.content.unwrap_or_default()));
                }

                TokenKind::Comment => {
                    return Ok(XmlEvent::Comment(token.content.unwrap_or_default()));
                }

                TokenKind::ProcessingInstruction => {
                    return Ok(XmlEvent::ProcessingInstruction {
                        target: token.name.unwrap_or_default(),
                        data: token.content.unwrap_or_default(),
                    });
                }

                TokenKind::XmlDeclaration => return self.declaration(&token),

                TokenKind::DocType => {
                    if self.seen_root || self.seen_doctype {
                        return Err(self.error("DOCTYPE must appear once, before the root element", token.span.0));
                    }
                    self.seen_doctype = true;
                    return Ok(XmlEvent::DocType(token.content.unwrap_or_default()));
                }
            }
        }
    }

    /// Parse attributes from a start tag token
    fn tag_attributes(&mut self, token: &Token<'a>) -> Result<Vec<crate::core::attributes::Attribute<'a>>, ParseError> {
        let content = token.content.unwrap_or_default();
        match parse_attributes(content) {
            Ok(attrs) => Ok(attrs),
            Err((message, offset)) => Err(self.error(message, token.content_pos + offset)),
        }
    }

    /// Read version, encoding and standalone from the XML declaration
    fn declaration(&mut self, token: &Token<'a>) -> Result<XmlEvent<'a>, ParseError> {
        let content = token.content.unwrap_or_default();
        let attrs = match parse_attributes(content) {
            Ok(attrs) => attrs,
            Err((message, offset)) => return Err(self.error(message, token.content_pos + offset)),
        };

        let version = match attrs.first() {
            Some(attr) if attr.name == "version" => attr.value.clone(),
            _ => return Err(self.error("XML declaration must start with a version", token.span.0)),
        };
        let mut encoding: Option<Cow<'a, str>> = None;
        let mut standalone = None;
        for attr in &attrs[1..] {
            match attr.name {
                "encoding" if encoding.is_none() && standalone.is_none() => encoding = Some(attr.value.clone()),
                "standalone" if standalone.is_none() => standalone = Some(attr.value == "yes"),
                other => {
                    let message = format!("Unexpected '{}' in XML declaration", other);
                    return Err(self.error(message, token.span.0));
                }
            }
        }

        Ok(XmlEvent::XmlDeclaration {
            raw: &self.input[token.span.0..token.span.1],
            version,
            encoding,
            standalone,
        })
    }
}

impl<'a> Iterator for SliceReader<'a> {
    type Item = Result<XmlEvent<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_event() {
            Ok(XmlEvent::EndDocument) => None,
            other => Some(other),
        }
    }
}

/// Parse XML from a string slice and return all events
pub fn parse_events(input: &str) -> Result<Vec<XmlEvent<'_>>, ParseError> {
    SliceReader::new(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_element() {
        let events = parse_events("<root>hello</root>").unwrap();
        assert_eq!(events.len(), 3);

        assert!(matches!(&events[0], XmlEvent::StartElement(e) if e.name == "root"));
        assert!(matches!(&events[1], XmlEvent::Text { value, .. } if value == "hello"));
        assert!(matches!(&events[2], XmlEvent::EndElement(e) if e.name == "root"));
    }

    #[test]
    fn test_attributes() {
        let events = parse_events("<scm class=\"hudson.scm.NullSCM\" plugin='git@4.0'/>").unwrap();
        assert_eq!(events.len(), 1);
        let e = events[0].as_start_element().unwrap();
        assert_eq!(e.get_attribute_value("class"), Some("hudson.scm.NullSCM"));
        assert_eq!(e.get_attribute_value("plugin"), Some("git@4.0"));
    }

    #[test]
    fn test_text_keeps_raw_form() {
        let events = parse_events("<a>x &amp; y &nbsp;</a>").unwrap();
        match &events[1] {
            XmlEvent::Text { raw, value } => {
                assert_eq!(*raw, "x &amp; y &nbsp;");
                assert_eq!(value, "x & y &nbsp;");
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_top_level_whitespace_skipped() {
        let events = parse_events("<?xml version='1.0'?>\n<!-- c -->\n<a/>\n").unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], XmlEvent::XmlDeclaration { version, .. } if version == "1.0"));
    }

    #[test]
    fn test_structure_errors() {
        for input in [
            "",
            "   ",
            "<a>",
            "<a></b>",
            "</a>",
            "<a/><b/>",
            "text<a/>",
            "<a/>text",
            "<![CDATA[x]]><a/>",
            "<a/><!DOCTYPE a>",
            "<a>&bogus</a>",
            "<a x='1' x='2'/>",
            "<?xml encoding='UTF-8'?><a/>",
        ] {
            assert!(parse_events(input).is_err(), "{input:?} should fail");
        }
    }

    #[test]
    fn test_mismatch_message() {
        let err = parse_events("<project>\n<a></b>\n</project>").unwrap_err();
        assert!(err.message.contains("expected </a>"));
        assert_eq!(err.line, 2);
    }
}
