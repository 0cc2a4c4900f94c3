//! XPath Parser
//!
//! Recursive descent parser for XPath 1.0 expressions. The whole input must
//! form one expression; anything left over is a syntax error.

use super::lexer::{Lexer, Token};
use crate::error::QueryError;

/// XPath expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Root path (/)
    Root,
    /// Context node, the start of a relative location path
    Context,
    /// Union of two expressions (|)
    Union(Box<Expr>, Box<Expr>),
    /// A location step applied to every node of the left side
    Path(Box<Expr>, Box<Step>),
    /// Filter expression with predicate
    Filter(Box<Expr>, Box<Expr>),
    /// Function call
    Function(String, Vec<Expr>),
    /// Binary operation
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    /// Unary negation
    Negate(Box<Expr>),
    /// Literal number
    Number(f64),
    /// Literal string
    String(String),
    /// Variable reference
    Variable(String),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Location step in a path
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn new(axis: Axis, node_test: NodeTest) -> Self {
        Step {
            axis,
            node_test,
            predicates: Vec::new(),
        }
    }

    /// `descendant-or-self::node()`, the expansion of `//`
    fn descendant_or_self() -> Self {
        Step::new(Axis::DescendantOrSelf, NodeTest::Node)
    }
}

/// XPath axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Self_,
    Attribute,
    Namespace,
}

impl Axis {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            "parent" => Some(Axis::Parent),
            "ancestor" => Some(Axis::Ancestor),
            "ancestor-or-self" => Some(Axis::AncestorOrSelf),
            "following-sibling" => Some(Axis::FollowingSibling),
            "preceding-sibling" => Some(Axis::PrecedingSibling),
            "following" => Some(Axis::Following),
            "preceding" => Some(Axis::Preceding),
            "self" => Some(Axis::Self_),
            "attribute" => Some(Axis::Attribute),
            "namespace" => Some(Axis::Namespace),
            _ => None,
        }
    }

    /// Reverse axes number their nodes from the context node outwards
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Ancestor | Axis::AncestorOrSelf | Axis::Preceding | Axis::PrecedingSibling
        )
    }
}

/// Node test in a location step
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// Matches any node of the axis' principal type (*)
    Any,
    /// Matches an unprefixed name
    Name(String),
    /// Matches prefix:localname
    QName(String, String),
    /// Matches prefix:*
    NamespaceWildcard(String),
    /// node() - matches any node
    Node,
    /// text() - matches text and CDATA nodes
    Text,
    /// comment() - matches comments
    Comment,
    /// processing-instruction() - matches PIs, optionally by target
    ProcessingInstruction(Option<String>),
}

/// Deepest nesting of parenthesized expressions, predicates, function
/// arguments and unary minus accepted in one query
pub const MAX_NESTING: usize = 128;

/// XPath parser
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    /// Byte offset of the current token
    position: usize,
    /// Current expression nesting
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser
    pub fn new(input: &'a str) -> Result<Self, QueryError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        let position = lexer.token_start();
        Ok(Parser {
            lexer,
            current,
            position,
            depth: 0,
        })
    }

    /// Parse a complete XPath expression
    pub fn parse(&mut self) -> Result<Expr, QueryError> {
        if self.current == Token::Eof {
            return Err(self.error("empty expression"));
        }
        let expr = self.parse_expr()?;
        if self.current != Token::Eof {
            return Err(self.error(format!("unexpected {:?} after expression", self.current)));
        }
        Ok(expr)
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::syntax(message, self.position)
    }

    /// Advance to next token
    fn advance(&mut self) -> Result<(), QueryError> {
        self.current = self.lexer.next_token()?;
        self.position = self.lexer.token_start();
        Ok(())
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), QueryError> {
        if self.current != token {
            return Err(self.error(format!("expected {what}, found {:?}", self.current)));
        }
        self.advance()
    }

    fn parse_expr(&mut self) -> Result<Expr, QueryError> {
        self.enter()?;
        let expr = self.parse_or_expr();
        self.depth -= 1;
        expr
    }

    fn enter(&mut self) -> Result<(), QueryError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("expression nested deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_or_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_and_expr()?;

        while self.current == Token::Or {
            self.advance()?;
            let right = self.parse_and_expr()?;
            left = Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right));
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_equality_expr()?;

        while self.current == Token::And {
            self.advance()?;
            let right = self.parse_equality_expr()?;
            left = Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right));
        }

        Ok(left)
    }

    fn parse_equality_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_relational_expr()?;

        loop {
            let op = match &self.current {
                Token::Eq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_relational_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }

        Ok(left)
    }

    fn parse_relational_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_additive_expr()?;

        loop {
            let op = match &self.current {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_additive_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }

        Ok(left)
    }

    fn parse_additive_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_multiplicative_expr()?;

        loop {
            let op = match &self.current {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }

        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_unary_expr()?;

        loop {
            let op = match &self.current {
                Token::Multiply => BinaryOp::Mul,
                Token::Div => BinaryOp::Div,
                Token::Mod => BinaryOp::Mod,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, QueryError> {
        let outer = self.depth;
        let mut negations = 0;
        while self.current == Token::Minus {
            self.enter()?;
            self.advance()?;
            negations += 1;
        }

        let mut expr = self.parse_union_expr()?;
        self.depth = outer;
        for _ in 0..negations {
            expr = Expr::Negate(Box::new(expr));
        }
        Ok(expr)
    }

    fn parse_union_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_path_expr()?;

        while self.current == Token::Pipe {
            self.advance()?;
            let right = self.parse_path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// Whether the current token can begin a location step
    fn at_step_start(&self) -> bool {
        matches!(
            self.current,
            Token::Name(_)
                | Token::NameTest(_)
                | Token::Star
                | Token::NodeType(_)
                | Token::At
                | Token::Axis(_)
                | Token::Dot
                | Token::DoubleDot
        )
    }

    /// PathExpr: a location path, or a filter expression optionally
    /// followed by a relative path
    fn parse_path_expr(&mut self) -> Result<Expr, QueryError> {
        match &self.current {
            Token::Slash => {
                self.advance()?;
                if self.at_step_start() {
                    self.parse_relative_path(Expr::Root)
                } else {
                    Ok(Expr::Root)
                }
            }
            Token::DoubleSlash => {
                self.advance()?;
                let base = Expr::Path(Box::new(Expr::Root), Box::new(Step::descendant_or_self()));
                self.parse_relative_path(base)
            }
            Token::Number(_)
            | Token::String(_)
            | Token::Dollar
            | Token::LeftParen
            | Token::FunctionName(_) => {
                let filter = self.parse_filter_expr()?;
                self.parse_path_continuation(filter)
            }
            _ => self.parse_relative_path(Expr::Context),
        }
    }

    /// One or more steps separated by / or //, starting from `base`
    fn parse_relative_path(&mut self, base: Expr) -> Result<Expr, QueryError> {
        let step = self.parse_step()?;
        let expr = Expr::Path(Box::new(base), Box::new(step));
        self.parse_path_continuation(expr)
    }

    fn parse_path_continuation(&mut self, mut expr: Expr) -> Result<Expr, QueryError> {
        loop {
            match &self.current {
                Token::Slash => {
                    self.advance()?;
                }
                Token::DoubleSlash => {
                    self.advance()?;
                    expr = Expr::Path(Box::new(expr), Box::new(Step::descendant_or_self()));
                }
                _ => return Ok(expr),
            }
            let step = self.parse_step()?;
            expr = Expr::Path(Box::new(expr), Box::new(step));
        }
    }

    /// Parse a primary expression followed by any number of predicates
    fn parse_filter_expr(&mut self) -> Result<Expr, QueryError> {
        let mut expr = self.parse_primary_expr()?;
        while self.current == Token::LeftBracket {
            let predicate = self.parse_predicate()?;
            expr = Expr::Filter(Box::new(expr), Box::new(predicate));
        }
        Ok(expr)
    }

    fn parse_predicate(&mut self) -> Result<Expr, QueryError> {
        self.expect(Token::LeftBracket, "'['")?;
        let predicate = self.parse_expr()?;
        self.expect(Token::RightBracket, "']'")?;
        Ok(predicate)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, QueryError> {
        match &self.current {
            Token::Number(n) => {
                let n = *n;
                self.advance()?;
                Ok(Expr::Number(n))
            }
            Token::String(s) => {
                let s = s.clone();
                self.advance()?;
                Ok(Expr::String(s))
            }
            Token::Dollar => {
                self.advance()?;
                if let Token::Name(name) = &self.current {
                    let name = name.clone();
                    self.advance()?;
                    Ok(Expr::Variable(name))
                } else {
                    Err(self.error("expected variable name after '$'"))
                }
            }
            Token::LeftParen => {
                self.advance()?;
                let expr = self.parse_expr()?;
                self.expect(Token::RightParen, "')'")?;
                Ok(expr)
            }
            Token::FunctionName(name) => {
                let name = name.clone();
                self.advance()?;
                self.expect(Token::LeftParen, "'('")?;
                let args = self.parse_function_args()?;
                Ok(Expr::Function(name, args))
            }
            _ => Err(self.error(format!("unexpected {:?}", self.current))),
        }
    }

    /// Parse a location step, including abbreviated forms
    fn parse_step(&mut self) -> Result<Step, QueryError> {
        let axis = match &self.current {
            Token::Dot => {
                self.advance()?;
                return Ok(Step::new(Axis::Self_, NodeTest::Node));
            }
            Token::DoubleDot => {
                self.advance()?;
                return Ok(Step::new(Axis::Parent, NodeTest::Node));
            }
            Token::At => {
                self.advance()?;
                Axis::Attribute
            }
            Token::Axis(name) => {
                let axis = Axis::from_name(name).ok_or_else(|| self.error(format!("unknown axis '{name}'")))?;
                self.advance()?;
                self.expect(Token::DoubleColon, "'::'")?;
                axis
            }
            _ => Axis::Child,
        };

        let node_test = self.parse_node_test()?;

        let mut step = Step::new(axis, node_test);
        while self.current == Token::LeftBracket {
            step.predicates.push(self.parse_predicate()?);
        }
        Ok(step)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, QueryError> {
        let node_test = match &self.current {
            Token::Star => NodeTest::Any,
            Token::Name(name) => match name.split_once(':') {
                Some((prefix, local)) => NodeTest::QName(prefix.to_string(), local.to_string()),
                None => NodeTest::Name(name.clone()),
            },
            Token::NameTest(test) => {
                let prefix = test.strip_suffix(":*").unwrap_or(test);
                NodeTest::NamespaceWildcard(prefix.to_string())
            }
            Token::NodeType(kind) => {
                let kind = kind.clone();
                self.advance()?;
                self.expect(Token::LeftParen, "'('")?;
                let target = match &self.current {
                    Token::String(s) if kind == "processing-instruction" => {
                        let s = s.clone();
                        self.advance()?;
                        Some(s)
                    }
                    _ => None,
                };
                self.expect(Token::RightParen, "')'")?;

                return Ok(match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => NodeTest::ProcessingInstruction(target),
                });
            }
            _ => return Err(self.error(format!("expected a node test, found {:?}", self.current))),
        };
        self.advance()?;
        Ok(node_test)
    }

    fn parse_function_args(&mut self) -> Result<Vec<Expr>, QueryError> {
        let mut args = Vec::new();

        if self.current != Token::RightParen {
            args.push(self.parse_expr()?);

            while self.current == Token::Comma {
                self.advance()?;
                args.push(self.parse_expr()?);
            }
        }

        self.expect(Token::RightParen, "')'")?;
        Ok(args)
    }
}

/// Parse an XPath expression string
pub fn parse(input: &str) -> Result<Expr, QueryError> {
    Parser::new(input)?.parse()
}
