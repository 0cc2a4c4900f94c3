//! XPath Lexer
//!
//! Tokenizes XPath 1.0 expressions. Follows the lexical disambiguation
//! rules of XPath 1.0: when the previous token can end an operand, `*` is
//! the multiplication operator and `and`/`or`/`div`/`mod` are operators;
//! otherwise `*` is a name test and those words are plain names.

use crate::error::QueryError;

/// XPath token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Operators
    Slash,       // /
    DoubleSlash, // //
    Pipe,        // |
    Plus,        // +
    Minus,       // -
    Multiply,    // * in operator position
    Eq,          // =
    NotEq,       // !=
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=
    And,         // and
    Or,          // or
    Mod,         // mod
    Div,         // div

    // Abbreviations
    Dot,       // .
    DoubleDot, // ..
    At,        // @
    Star,      // * as a name test

    // Brackets
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]

    // Literals
    Number(f64),
    String(String),

    // Names
    Name(String),         // NCName or prefix:local
    NameTest(String),     // prefix:*
    FunctionName(String), // name followed by (
    NodeType(String),     // node, text, comment, processing-instruction followed by (
    Axis(String),         // name followed by ::

    // Special
    DoubleColon, // ::
    Comma,       // ,
    Dollar,      // $

    // End of input
    Eof,
}

impl Token {
    /// Tokens after which a `*` or NCName still starts an operand
    fn expects_operand(&self) -> bool {
        matches!(
            self,
            Token::At
                | Token::DoubleColon
                | Token::LeftParen
                | Token::LeftBracket
                | Token::Comma
                | Token::Dollar
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Multiply
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::LtEq
                | Token::Gt
                | Token::GtEq
                | Token::And
                | Token::Or
                | Token::Mod
                | Token::Div
        )
    }
}

/// XPath lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    /// Byte offset where the last returned token started
    token_start: usize,
    /// Whether the previous token leaves us in operator position
    operator_position: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            pos: 0,
            token_start: 0,
            operator_position: false,
        }
    }

    /// Byte offset of the most recently returned token
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if matches!(c, ' ' | '\t' | '\n' | '\r') {
                self.advance(1);
            } else {
                break;
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, QueryError> {
        self.skip_whitespace();
        self.token_start = self.pos;
        let token = self.scan_token()?;
        self.operator_position = !token.expects_operand();
        Ok(token)
    }

    fn scan_token(&mut self) -> Result<Token, QueryError> {
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        let single = |lexer: &mut Self, token: Token| -> Result<Token, QueryError> {
            lexer.advance(1);
            Ok(token)
        };

        match c {
            '/' => {
                self.advance(1);
                if self.peek() == Some('/') {
                    self.advance(1);
                    Ok(Token::DoubleSlash)
                } else {
                    Ok(Token::Slash)
                }
            }
            '.' => {
                if self.peek_at(1) == Some('.') {
                    self.advance(2);
                    Ok(Token::DoubleDot)
                } else if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                    Ok(self.read_number())
                } else {
                    single(self, Token::Dot)
                }
            }
            '*' if self.operator_position => single(self, Token::Multiply),
            '*' => single(self, Token::Star),
            '@' => single(self, Token::At),
            '|' => single(self, Token::Pipe),
            '+' => single(self, Token::Plus),
            '-' => single(self, Token::Minus),
            '=' => single(self, Token::Eq),
            '(' => single(self, Token::LeftParen),
            ')' => single(self, Token::RightParen),
            '[' => single(self, Token::LeftBracket),
            ']' => single(self, Token::RightBracket),
            ',' => single(self, Token::Comma),
            '$' => single(self, Token::Dollar),
            '!' => {
                if self.peek_at(1) == Some('=') {
                    self.advance(2);
                    Ok(Token::NotEq)
                } else {
                    Err(QueryError::syntax("expected '=' after '!'", self.pos))
                }
            }
            '<' | '>' => {
                self.advance(1);
                let or_equal = self.peek() == Some('=');
                if or_equal {
                    self.advance(1);
                }
                Ok(match (c, or_equal) {
                    ('<', false) => Token::Lt,
                    ('<', true) => Token::LtEq,
                    ('>', false) => Token::Gt,
                    _ => Token::GtEq,
                })
            }
            ':' => {
                if self.peek_at(1) == Some(':') {
                    self.advance(2);
                    Ok(Token::DoubleColon)
                } else {
                    Err(QueryError::syntax("unexpected ':'", self.pos))
                }
            }
            '"' | '\'' => self.read_string(c),
            '0'..='9' => Ok(self.read_number()),
            _ if is_name_start_char(c) => Ok(self.read_name_or_keyword()),
            _ => Err(QueryError::syntax(format!("unexpected character '{c}'"), self.pos)),
        }
    }

    /// Read a number literal: digits with an optional fraction, or `.digits`
    fn read_number(&mut self) -> Token {
        let start = self.pos;
        self.skip_digits();
        if self.peek() == Some('.') {
            self.advance(1);
            self.skip_digits();
        }
        let value = self.input[start..self.pos].parse().unwrap_or(f64::NAN);
        Token::Number(value)
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(1);
        }
    }

    /// Read a string literal; there are no escapes inside XPath literals
    fn read_string(&mut self, quote: char) -> Result<Token, QueryError> {
        let open = self.pos;
        self.advance(1);
        let start = self.pos;

        match self.remaining().find(quote) {
            Some(len) => {
                let value = self.input[start..start + len].to_string();
                self.advance(len + 1);
                Ok(Token::String(value))
            }
            None => Err(QueryError::syntax("unterminated string literal", open)),
        }
    }

    fn read_ncname(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    /// Read a name, then classify it by what follows
    fn read_name_or_keyword(&mut self) -> Token {
        let name = self.read_ncname();

        if self.operator_position {
            match name {
                "and" => return Token::And,
                "or" => return Token::Or,
                "mod" => return Token::Mod,
                "div" => return Token::Div,
                _ => {}
            }
        }

        // prefix:local or prefix:* (no whitespace allowed around the colon)
        let mut qname = name.to_string();
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            match self.peek_at(1) {
                Some('*') => {
                    self.advance(2);
                    return Token::NameTest(format!("{name}:*"));
                }
                Some(c) if is_name_start_char(c) => {
                    self.advance(1);
                    let local = self.read_ncname();
                    qname = format!("{name}:{local}");
                }
                _ => {}
            }
        }

        // Lookahead past whitespace without consuming it
        let rest = self.remaining().trim_start_matches([' ', '\t', '\n', '\r']);
        if rest.starts_with("::") && !qname.contains(':') {
            Token::Axis(qname)
        } else if rest.starts_with('(') {
            match qname.as_str() {
                "node" | "text" | "comment" | "processing-instruction" => Token::NodeType(qname),
                _ => Token::FunctionName(qname),
            }
        } else {
            Token::Name(qname)
        }
    }

    /// Tokenize entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, QueryError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Token {
        Token::Name(s.to_string())
    }

    #[test]
    fn test_simple_path() {
        let mut lexer = Lexer::new("/project/builders");
        assert_eq!(lexer.next_token(), Ok(Token::Slash));
        assert_eq!(lexer.next_token(), Ok(name("project")));
        assert_eq!(lexer.next_token(), Ok(Token::Slash));
        assert_eq!(lexer.next_token(), Ok(name("builders")));
        assert_eq!(lexer.next_token(), Ok(Token::Eof));
    }

    #[test]
    fn test_dotted_element_names() {
        let tokens = Lexer::new("//hudson.tasks.Shell/command").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![Token::DoubleSlash, name("hudson.tasks.Shell"), Token::Slash, name("command")]
        );
    }

    #[test]
    fn test_predicate() {
        let tokens = Lexer::new("item[@id='test']").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                name("item"),
                Token::LeftBracket,
                Token::At,
                name("id"),
                Token::Eq,
                Token::String("test".to_string()),
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn test_axis_and_function() {
        let tokens = Lexer::new("child::a[position() = 1]").tokenize().unwrap();
        assert_eq!(tokens[0], Token::Axis("child".to_string()));
        assert_eq!(tokens[1], Token::DoubleColon);
        assert_eq!(tokens[4], Token::FunctionName("position".to_string()));
        assert!(matches!(tokens.last(), Some(Token::RightBracket)));
    }

    #[test]
    fn test_star_disambiguation() {
        let tokens = Lexer::new("*[2 * 3]").tokenize().unwrap();
        assert_eq!(tokens[0], Token::Star);
        assert_eq!(tokens[3], Token::Multiply);
    }

    #[test]
    fn test_operator_names_disambiguated() {
        let tokens = Lexer::new("and and div").tokenize().unwrap();
        assert_eq!(tokens, vec![name("and"), Token::And, name("div")]);
    }

    #[test]
    fn test_qualified_names() {
        let tokens = Lexer::new("p:job/p:*").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![name("p:job"), Token::Slash, Token::NameTest("p:*".to_string())]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::new("1.5 .25 7").tokenize().unwrap();
        assert_eq!(tokens, vec![Token::Number(1.5), Token::Number(0.25), Token::Number(7.0)]);
    }

    #[test]
    fn test_errors_carry_position() {
        assert_eq!(
            Lexer::new("a = 'x").tokenize(),
            Err(QueryError::syntax("unterminated string literal", 4))
        );
        assert!(matches!(
            Lexer::new("a ! b").tokenize(),
            Err(QueryError::Syntax { position: 2, .. })
        ));
        assert!(Lexer::new("a # b").tokenize().is_err());
    }
}
