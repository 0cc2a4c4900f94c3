//! XML Tokenizer - State machine for XML token extraction
//!
//! Implements a pull-parser style tokenizer that extracts XML tokens:
//! - Element start/end tags
//! - Text content
//! - CDATA sections
//! - Comments
//! - Processing instructions and the XML declaration
//! - DOCTYPE declarations (internal subset skipped, kept as raw text)
//!
//! The tokenizer checks lexical well-formedness only. Tag nesting and the
//! single-root rule are enforced one level up, in the reader.

use super::scanner::Scanner;
use crate::error::ParseError;

/// Current parsing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Initial state before parsing starts
    Init,
    /// Between markup constructs
    InsideText,
    /// End of input reached or a fatal error was reported
    Done,
}

/// Type of XML token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Element start tag: <element>
    StartTag,
    /// Element end tag: </element>
    EndTag,
    /// Empty element: <element/>
    EmptyTag,
    /// Text content
    Text,
    /// CDATA section: <![CDATA[...]]>
    CData,
    /// Comment: <!--...-->
    Comment,
    /// Processing instruction: <?target ...?>
    ProcessingInstruction,
    /// XML declaration: <?xml ...?>
    XmlDeclaration,
    /// DOCTYPE declaration
    DocType,
    /// End of file
    Eof,
}

/// A lexed XML token
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw span in input (start, end)
    pub span: (usize, usize),
    /// Element name for tags, target for processing instructions
    pub name: Option<&'a str>,
    /// Undecoded body: attribute area for start tags, text as written,
    /// CDATA/comment body, PI data
    pub content: Option<&'a str>,
    /// Absolute input position where `content` begins
    pub content_pos: usize,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, span: (usize, usize)) -> Self {
        Token {
            kind,
            span,
            name: None,
            content: None,
            content_pos: span.0,
        }
    }

    fn with_name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    fn with_content(mut self, content: &'a str, pos: usize) -> Self {
        self.content = Some(content);
        self.content_pos = pos;
        self
    }
}

/// XML tokenizer implementing a pull-parser pattern
pub struct Tokenizer<'a> {
    input: &'a str,
    scanner: Scanner<'a>,
    state: ParseState,
    /// Where an XML declaration may legally appear (after an optional BOM)
    decl_pos: usize,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer for the given input
    pub fn new(input: &'a str) -> Self {
        Tokenizer {
            input,
            scanner: Scanner::new(input),
            state: ParseState::Init,
            decl_pos: 0,
        }
    }

    /// Get the current parse state
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Get the current position in the input
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    fn error(&mut self, message: impl Into<String>, position: usize) -> ParseError {
        self.state = ParseState::Done;
        ParseError::new(message, self.input, position)
    }

    /// Get the next token
    ///
    /// Returns `Eof` once the input is exhausted and keeps returning it.
    pub fn next_token(&mut self) -> Result<Token<'a>, ParseError> {
        if self.state == ParseState::Init {
            if self.scanner.starts_with("\u{FEFF}".as_bytes()) {
                self.scanner.advance(3);
                self.decl_pos = 3;
            }
            self.state = ParseState::InsideText;
        }

        let pos = self.scanner.position();
        if self.state == ParseState::Done || self.scanner.is_eof() {
            self.state = ParseState::Done;
            return Ok(Token::new(TokenKind::Eof, (pos, pos)));
        }

        match self.scanner.peek() {
            Some(b'<') => self.parse_markup(),
            _ => self.parse_text(),
        }
    }

    /// Parse character data up to the next '<'
    fn parse_text(&mut self) -> Result<Token<'a>, ParseError> {
        let start = self.scanner.position();
        let end = self.scanner.find_tag_start().unwrap_or(self.input.len());
        let content = self.scanner.slice(start, end);

        if let Some(offset) = memchr::memmem::find(content.as_bytes(), b"]]>") {
            return Err(self.error("']]>' is not allowed in text content", start + offset));
        }

        self.scanner.set_position(end);
        Ok(Token::new(TokenKind::Text, (start, end)).with_content(content, start))
    }

    /// Parse markup starting with '<'
    fn parse_markup(&mut self) -> Result<Token<'a>, ParseError> {
        let start = self.scanner.position();
        self.scanner.advance(1); // Skip '<'

        match self.scanner.peek() {
            Some(b'/') => self.parse_end_tag(start),
            Some(b'!') => self.parse_bang_markup(start),
            Some(b'?') => self.parse_pi(start),
            Some(_) => self.parse_start_tag(start),
            None => Err(self.error("Unexpected end of input after '<'", start)),
        }
    }

    /// Parse a start tag or empty element tag
    fn parse_start_tag(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => {
                let pos = self.scanner.position();
                return Err(self.error("Invalid element name: must start with letter, underscore, or colon", pos));
            }
        };
        let attrs_start = self.scanner.position();

        // Find the end of the tag, handling quoted attributes
        let end = match self.scanner.find_tag_end_quoted() {
            Some(end) => end,
            None => return Err(self.error(format!("Unterminated start tag <{}>", name), start)),
        };

        let is_empty = end > attrs_start && self.input.as_bytes()[end - 1] == b'/';
        let attrs_end = if is_empty { end - 1 } else { end };

        self.scanner.set_position(end + 1);

        let kind = if is_empty { TokenKind::EmptyTag } else { TokenKind::StartTag };
        Ok(Token::new(kind, (start, end + 1))
            .with_name(name)
            .with_content(self.scanner.slice(attrs_start, attrs_end), attrs_start))
    }

    /// Parse an end tag
    fn parse_end_tag(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(1); // Skip '/'

        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => {
                let pos = self.scanner.position();
                return Err(self.error("Invalid element name in end tag", pos));
            }
        };

        // Only whitespace may follow the name
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(b'>') {
            let pos = self.scanner.position();
            return Err(self.error(format!("Malformed end tag </{}>", name), pos));
        }
        self.scanner.advance(1);

        Ok(Token::new(TokenKind::EndTag, (start, self.scanner.position())).with_name(name))
    }

    /// Parse markup starting with '!' (comment, CDATA, DOCTYPE)
    fn parse_bang_markup(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(1); // Skip '!'

        if self.scanner.starts_with(b"--") {
            self.parse_comment(start)
        } else if self.scanner.starts_with(b"[CDATA[") {
            self.parse_cdata(start)
        } else if self.scanner.starts_with(b"DOCTYPE") {
            self.parse_doctype(start)
        } else {
            Err(self.error("Invalid declaration - expected comment, CDATA, or DOCTYPE", start))
        }
    }

    /// Parse a comment <!--...-->
    fn parse_comment(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(2); // Skip '--'
        let content_start = self.scanner.position();

        // The first "--" in the body must be the terminator
        let dashes = match self.scanner.find_sequence(b"--") {
            Some(pos) => pos,
            None => return Err(self.error("Unterminated comment", start)),
        };
        if self.input.as_bytes().get(dashes + 2) != Some(&b'>') {
            return Err(self.error("'--' is not allowed inside a comment", dashes));
        }

        let content = self.scanner.slice(content_start, dashes);
        self.scanner.set_position(dashes + 3);
        Ok(Token::new(TokenKind::Comment, (start, dashes + 3)).with_content(content, content_start))
    }

    /// Parse a CDATA section <![CDATA[...]]>
    fn parse_cdata(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(7); // Skip '[CDATA['
        let content_start = self.scanner.position();

        let end = match self.scanner.find_sequence(b"]]>") {
            Some(pos) => pos,
            None => return Err(self.error("Unterminated CDATA section", start)),
        };

        let content = self.scanner.slice(content_start, end);
        self.scanner.set_position(end + 3);
        Ok(Token::new(TokenKind::CData, (start, end + 3)).with_content(content, content_start))
    }

    /// Parse a DOCTYPE declaration, skipping over an internal subset
    ///
    /// The declaration is not interpreted. Its raw text is kept so the
    /// serializer can write it back.
    fn parse_doctype(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(7); // Skip 'DOCTYPE'
        let bytes = self.input.as_bytes();
        let mut pos = self.scanner.position();
        let mut depth = 0usize;

        while pos < bytes.len() {
            match bytes[pos] {
                q @ (b'"' | b'\'') => match memchr::memchr(q, &bytes[pos + 1..]) {
                    Some(offset) => pos += offset + 2,
                    None => break,
                },
                b'<' if bytes[pos..].starts_with(b"<!--") => {
                    match memchr::memmem::find(&bytes[pos + 4..], b"-->") {
                        Some(offset) => pos += offset + 7,
                        None => break,
                    }
                }
                b'[' => {
                    depth += 1;
                    pos += 1;
                }
                b']' => {
                    depth = depth.saturating_sub(1);
                    pos += 1;
                }
                b'>' if depth == 0 => {
                    self.scanner.set_position(pos + 1);
                    let raw = self.scanner.slice(start, pos + 1);
                    return Ok(Token::new(TokenKind::DocType, (start, pos + 1)).with_content(raw, start));
                }
                _ => pos += 1,
            }
        }

        Err(self.error("Unterminated DOCTYPE declaration", start))
    }

    /// Parse a processing instruction or the XML declaration
    fn parse_pi(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(1); // Skip '?'

        let target = match self.scanner.read_name() {
            Some(name) => name,
            None => {
                let pos = self.scanner.position();
                return Err(self.error("Processing instruction is missing its target", pos));
            }
        };

        let end = match self.scanner.find_sequence(b"?>") {
            Some(pos) => pos,
            None => return Err(self.error("Unterminated processing instruction", start)),
        };

        let after_target = self.scanner.position();
        if after_target < end && !matches!(self.input.as_bytes()[after_target], b' ' | b'\t' | b'\n' | b'\r') {
            return Err(self.error("Processing instruction target must be followed by whitespace", after_target));
        }
        self.scanner.skip_whitespace();
        let data_start = self.scanner.position().min(end);
        let data = self.scanner.slice(data_start, end);
        self.scanner.set_position(end + 2);

        let kind = if target == "xml" {
            if start != self.decl_pos {
                return Err(self.error("XML declaration is only allowed at the start of the document", start));
            }
            TokenKind::XmlDeclaration
        } else if target.eq_ignore_ascii_case("xml") {
            return Err(self.error(format!("Reserved processing instruction target '{}'", target), start));
        } else {
            TokenKind::ProcessingInstruction
        };

        Ok(Token::new(kind, (start, end + 2))
            .with_name(target)
            .with_content(data, data_start))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    /// Yields tokens up to and excluding `Eof`, or a single error
    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ParseState::Done {
            return None;
        }
        match self.next_token() {
            Ok(token) if token.kind == TokenKind::Eof => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Tokenizer::new(input).map(|t| t.unwrap().kind).collect()
    }

    #[test]
    fn test_simple_element() {
        assert_eq!(
            kinds("<root>text</root>"),
            vec![TokenKind::StartTag, TokenKind::Text, TokenKind::EndTag]
        );
    }

    #[test]
    fn test_start_tag_attribute_area() {
        let mut tokenizer = Tokenizer::new("<a x=\"1\" y='2'/>");
        let token = tokenizer.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::EmptyTag);
        assert_eq!(token.name, Some("a"));
        assert_eq!(token.content, Some(" x=\"1\" y='2'"));
        assert_eq!(token.content_pos, 2);
    }

    #[test]
    fn test_gt_inside_attribute() {
        let mut tokenizer = Tokenizer::new("<a cond=\"x > 1\">");
        let token = tokenizer.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::StartTag);
        assert_eq!(token.span, (0, 16));
    }

    #[test]
    fn test_declaration_and_pi() {
        let mut tokenizer = Tokenizer::new("<?xml version='1.1' encoding='UTF-8'?><?pi some data?><r/>");
        let decl = tokenizer.next_token().unwrap();
        assert_eq!(decl.kind, TokenKind::XmlDeclaration);
        assert_eq!(decl.content, Some("version='1.1' encoding='UTF-8'"));
        let pi = tokenizer.next_token().unwrap();
        assert_eq!(pi.kind, TokenKind::ProcessingInstruction);
        assert_eq!(pi.name, Some("pi"));
        assert_eq!(pi.content, Some("some data"));
    }

    #[test]
    fn test_late_declaration_rejected() {
        let result: Result<Vec<_>, _> = Tokenizer::new("<r/><?xml version='1.0'?>").collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_comment_and_cdata() {
        let mut tokenizer = Tokenizer::new("<!-- a > b --><![CDATA[x < y]]>");
        assert_eq!(tokenizer.next_token().unwrap().content, Some(" a > b "));
        assert_eq!(tokenizer.next_token().unwrap().content, Some("x < y"));
        assert_eq!(tokenizer.next_token().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_double_hyphen_in_comment() {
        let mut tokenizer = Tokenizer::new("<!-- a -- b -->");
        assert!(tokenizer.next_token().is_err());
    }

    #[test]
    fn test_doctype_internal_subset() {
        let input = "<!DOCTYPE r [ <!ENTITY e \"<x>\"> <!-- ] > --> ]><r/>";
        let mut tokenizer = Tokenizer::new(input);
        let doctype = tokenizer.next_token().unwrap();
        assert_eq!(doctype.kind, TokenKind::DocType);
        assert_eq!(doctype.span.1, input.len() - 4);
        assert_eq!(tokenizer.next_token().unwrap().kind, TokenKind::EmptyTag);
    }

    #[test]
    fn test_unterminated_markup() {
        for input in ["<a", "<a x=\"1>", "<!-- open", "<![CDATA[ open", "<?pi open", "</a"] {
            let mut tokenizer = Tokenizer::new(input);
            assert!(tokenizer.next_token().is_err(), "{input}");
            assert_eq!(tokenizer.state(), ParseState::Done);
        }
    }

    #[test]
    fn test_error_line_and_column() {
        let err = Tokenizer::new("<a>\n  ]]>\n</a>")
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn test_bom_skipped() {
        let mut tokenizer = Tokenizer::new("\u{FEFF}<?xml version=\"1.0\"?><r/>");
        assert_eq!(tokenizer.next_token().unwrap().kind, TokenKind::XmlDeclaration);
    }
}
