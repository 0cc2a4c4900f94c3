//! XPath 1.0 Engine
//!
//! Full XPath 1.0 implementation with:
//! - All 13 axes (the namespace axis is always empty)
//! - The core function library, except `id()`
//! - Document-independent compiled expressions, suitable for caching

pub mod axes;
pub mod compiler;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use compiler::{compile, CompiledExpr};
pub use eval::{evaluate, evaluate_compiled, EvalContext, Namespaces};
pub use value::XPathValue;
