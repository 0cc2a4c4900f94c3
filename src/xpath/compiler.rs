//! XPath Expression Compiler
//!
//! Compiles parsed XPath expressions into a flat stack-machine program.
//! Compilation does not depend on a document, so one compiled expression
//! can be cached and evaluated against any number of configurations.
//! Calls are checked against the function table here; namespace prefixes
//! are resolved per document at evaluation time.

use super::functions;
use super::parser::{Axis, BinaryOp, Expr, NodeTest, Step};
use crate::error::QueryError;

/// Compiled XPath expression
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub ops: Vec<Op>,
}

/// Compiled operation
#[derive(Debug, Clone)]
pub enum Op {
    /// Push the document node onto the stack
    Root,
    /// Push context node onto the stack
    Context,
    /// Apply a location step to every node of the popped node-set
    Step(Box<CompiledStep>),
    /// Filter the popped node-set in document order
    Predicate(Box<CompiledExpr>),
    /// Union two node sets
    Union,
    /// Push literal number
    Number(f64),
    /// Push literal string
    String(String),
    /// Call function
    Call(String, usize), // name, arg count
    /// Binary operation
    Binary(BinaryOp),
    /// Negate
    Negate,
}

/// A location step with its own predicates
///
/// Step predicates see positions along the axis, so they are evaluated per
/// context node rather than on the merged result.
#[derive(Debug, Clone)]
pub struct CompiledStep {
    pub axis: Axis,
    pub node_test: CompiledNodeTest,
    pub predicates: Vec<CompiledExpr>,
}

/// Compiled node test
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledNodeTest {
    Any,
    Name(String),
    QName(String, String),
    NamespaceWildcard(String),
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
}

impl From<&NodeTest> for CompiledNodeTest {
    fn from(test: &NodeTest) -> Self {
        match test {
            NodeTest::Any => CompiledNodeTest::Any,
            NodeTest::Name(n) => CompiledNodeTest::Name(n.clone()),
            NodeTest::QName(prefix, local) => CompiledNodeTest::QName(prefix.clone(), local.clone()),
            NodeTest::NamespaceWildcard(prefix) => CompiledNodeTest::NamespaceWildcard(prefix.clone()),
            NodeTest::Node => CompiledNodeTest::Node,
            NodeTest::Text => CompiledNodeTest::Text,
            NodeTest::Comment => CompiledNodeTest::Comment,
            NodeTest::ProcessingInstruction(target) => CompiledNodeTest::ProcessingInstruction(target.clone()),
        }
    }
}

impl CompiledExpr {
    /// Compile an XPath expression
    pub fn compile(expr: &Expr) -> Result<Self, QueryError> {
        let mut ops = Vec::new();
        Self::compile_expr(expr, &mut ops)?;
        Ok(CompiledExpr { ops })
    }

    fn compile_expr(expr: &Expr, ops: &mut Vec<Op>) -> Result<(), QueryError> {
        match expr {
            Expr::Root => ops.push(Op::Root),
            Expr::Context => ops.push(Op::Context),
            Expr::Number(n) => ops.push(Op::Number(*n)),
            Expr::String(s) => ops.push(Op::String(s.clone())),
            // No variable bindings can ever be supplied
            Expr::Variable(name) => return Err(QueryError::UndefinedVariable(name.clone())),
            Expr::Negate(inner) => {
                Self::compile_expr(inner, ops)?;
                ops.push(Op::Negate);
            }
            Expr::Binary(left, op, right) => {
                Self::compile_expr(left, ops)?;
                Self::compile_expr(right, ops)?;
                ops.push(Op::Binary(*op));
            }
            Expr::Union(left, right) => {
                Self::compile_expr(left, ops)?;
                Self::compile_expr(right, ops)?;
                ops.push(Op::Union);
            }
            Expr::Path(base, step) => {
                Self::compile_expr(base, ops)?;
                ops.push(Op::Step(Box::new(Self::compile_step(step)?)));
            }
            Expr::Filter(base, pred) => {
                Self::compile_expr(base, ops)?;
                ops.push(Op::Predicate(Box::new(CompiledExpr::compile(pred)?)));
            }
            Expr::Function(name, args) => {
                functions::check_call(name, args.len())?;
                for arg in args {
                    Self::compile_expr(arg, ops)?;
                }
                ops.push(Op::Call(name.clone(), args.len()));
            }
        }
        Ok(())
    }

    fn compile_step(step: &Step) -> Result<CompiledStep, QueryError> {
        let predicates = step
            .predicates
            .iter()
            .map(CompiledExpr::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledStep {
            axis: step.axis,
            node_test: CompiledNodeTest::from(&step.node_test),
            predicates,
        })
    }
}

/// Compile an XPath expression string
pub fn compile(xpath: &str) -> Result<CompiledExpr, QueryError> {
    let expr = super::parser::parse(xpath)?;
    CompiledExpr::compile(&expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simple() {
        let compiled = compile("/root").unwrap();
        assert!(matches!(compiled.ops[0], Op::Root));
        assert!(matches!(&compiled.ops[1], Op::Step(step) if step.node_test == CompiledNodeTest::Name("root".to_string())));
    }

    #[test]
    fn test_step_keeps_predicates() {
        let compiled = compile("//item[1]").unwrap();
        let Some(Op::Step(step)) = compiled.ops.last() else {
            panic!("expected a step last");
        };
        assert_eq!(step.predicates.len(), 1);
    }

    #[test]
    fn test_semantic_errors() {
        assert_eq!(compile("$job").unwrap_err(), QueryError::UndefinedVariable("job".to_string()));
        assert_eq!(compile("//a[frob()]").unwrap_err(), QueryError::UnknownFunction("frob".to_string()));
        assert!(matches!(compile("count()"), Err(QueryError::Arity { found: 0, .. })));
        assert!(matches!(compile("id('x')"), Err(QueryError::Unsupported(_))));
    }
}
