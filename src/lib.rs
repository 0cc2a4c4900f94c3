//! jobmint - Query and rewrite build-job XML configurations
//!
//! Layers:
//! - core: memchr-accelerated scanning, tokenizing and entity handling
//! - reader: zero-copy pull parser producing a well-formed event stream
//! - dom: arena document with node-level mutation and serialization
//! - xpath: XPath 1.0 lexer, parser, compiler and evaluator
//! - engine: one query over one configuration, with a compiled-query cache
//! - scan: one query over many configurations on disk, optionally in parallel
//!
//! ```
//! use jobmint::{evaluate, Intent, Outcome};
//!
//! let doc = "<project><description>old</description></project>";
//! let outcome = evaluate(doc, "//description", &Intent::MatchAndMutate("new".into())).unwrap();
//! assert_eq!(
//!     outcome,
//!     Outcome::Rewritten("<project><description>new</description></project>\n".into())
//! );
//! ```

pub mod core;
pub mod dom;
pub mod engine;
pub mod error;
pub mod reader;
pub mod scan;
pub mod xpath;

pub use dom::XmlDocument;
pub use engine::{evaluate, ConfigQueryEngine, EngineConfig, Intent, Outcome, DEFAULT_QUERY_CACHE_SIZE};
pub use error::{EngineError, ParseError, QueryError, ScanError};
pub use xpath::XPathValue;
