//! Configuration query-and-mutate engine
//!
//! One call parses a job configuration, evaluates an XPath query with the
//! root element as context, and either reports whether anything matched or
//! overwrites the value of every matched node and serializes the result.
//! The document lives only for the duration of the call.

use crate::dom::{serialize, XmlDocument};
use crate::error::{EngineError, QueryError};
use crate::xpath::{self, CompiledExpr, EvalContext, Namespaces, XPathValue};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Default number of compiled queries kept by an engine
pub const DEFAULT_QUERY_CACHE_SIZE: usize = 64;

/// What to do with the nodes a query selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Only report whether anything matched
    MatchOnly,
    /// Replace the value of every matched node with this string
    MatchAndMutate(String),
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome {
    /// The query selected no node
    NoMatch,
    /// At least one node matched; nothing was changed
    Matched,
    /// At least one node matched and the rewritten document is attached
    Rewritten(String),
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        !matches!(self, Outcome::NoMatch)
    }

    /// The rewritten document, if there is one
    pub fn rewritten(&self) -> Option<&str> {
        match self {
            Outcome::Rewritten(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_rewritten(self) -> Option<String> {
        match self {
            Outcome::Rewritten(doc) => Some(doc),
            _ => None,
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Compiled queries to keep (0 disables the cache)
    pub query_cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            query_cache_size: DEFAULT_QUERY_CACHE_SIZE,
        }
    }
}

/// Query-and-mutate engine with a cache of compiled queries
///
/// The cache is the only state an engine keeps, so one engine can be
/// shared by every worker of a parallel scan.
pub struct ConfigQueryEngine {
    cache: Option<Mutex<LruCache<String, Arc<CompiledExpr>>>>,
}

impl Default for ConfigQueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigQueryEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let cache = NonZeroUsize::new(config.query_cache_size).map(|size| Mutex::new(LruCache::new(size)));
        ConfigQueryEngine { cache }
    }

    /// Evaluate `query` against `config_text`
    ///
    /// # Errors
    ///
    /// `EngineError::Parse` if the text is not a well-formed document,
    /// `EngineError::Query` if the query cannot be compiled or evaluated.
    pub fn evaluate(&self, config_text: &str, query: &str, intent: &Intent) -> Result<Outcome, EngineError> {
        // A broken document is reported as such whatever the query
        let doc = XmlDocument::parse(config_text)?;
        let compiled = self.compile(query)?;
        run(doc, query, &compiled, intent)
    }

    /// Compile a query, going through the cache when there is one
    pub fn compile(&self, query: &str) -> Result<Arc<CompiledExpr>, QueryError> {
        let Some(cache) = &self.cache else {
            return xpath::compile(query).map(Arc::new);
        };

        if let Some(hit) = lock(cache).get(query) {
            return Ok(Arc::clone(hit));
        }

        let compiled = Arc::new(xpath::compile(query)?);
        lock(cache).put(query.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Number of compiled queries currently cached
    pub fn cached_queries(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| lock(cache).len())
    }
}

/// A poisoned lock only means another worker panicked; the cache is still valid
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One-shot evaluation without a query cache
///
/// # Errors
///
/// Same as [`ConfigQueryEngine::evaluate`].
pub fn evaluate(config_text: &str, query: &str, intent: &Intent) -> Result<Outcome, EngineError> {
    let doc = XmlDocument::parse(config_text)?;
    let compiled = xpath::compile(query)?;
    run(doc, query, &compiled, intent)
}

fn run(mut doc: XmlDocument<'_>, query: &str, compiled: &CompiledExpr, intent: &Intent) -> Result<Outcome, EngineError> {
    let namespaces = Namespaces::from_document(&doc);

    let nodes = match xpath::evaluate_compiled(compiled, &EvalContext::at_root(&doc, &namespaces))? {
        XPathValue::NodeSet(nodes) => nodes,
        other => {
            debug!(query, result = other.type_name(), "query did not select nodes");
            Vec::new()
        }
    };
    debug!(query, matches = nodes.len(), "evaluated query");

    if nodes.is_empty() {
        return Ok(Outcome::NoMatch);
    }

    match intent {
        Intent::MatchOnly => Ok(Outcome::Matched),
        Intent::MatchAndMutate(value) => {
            for id in nodes {
                doc.set_node_value(id, value);
            }
            Ok(Outcome::Rewritten(serialize(&doc)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    const PROJECT: &str = "<project><description>old</description></project>";

    fn mutate(value: &str) -> Intent {
        Intent::MatchAndMutate(value.to_string())
    }

    #[test]
    fn test_rewrite_description() {
        let outcome = evaluate(PROJECT, "//description", &mutate("new")).unwrap();
        assert_eq!(
            outcome,
            Outcome::Rewritten("<project><description>new</description></project>\n".to_string())
        );
    }

    #[test]
    fn test_match_only_and_no_match() {
        assert_eq!(evaluate(PROJECT, "//description", &Intent::MatchOnly).unwrap(), Outcome::Matched);
        assert_eq!(evaluate(PROJECT, "//nonexistent", &mutate("x")).unwrap(), Outcome::NoMatch);
        assert_eq!(evaluate(PROJECT, "//nonexistent", &Intent::MatchOnly).unwrap(), Outcome::NoMatch);
    }

    #[test]
    fn test_non_node_set_result_is_no_match() {
        assert_eq!(evaluate(PROJECT, "count(//description) = 1", &Intent::MatchOnly).unwrap(), Outcome::NoMatch);
        assert_eq!(evaluate(PROJECT, "'text'", &mutate("x")).unwrap(), Outcome::NoMatch);
    }

    #[test]
    fn test_attribute_and_text_targets() {
        let input = "<project><scm class='hudson.scm.NullSCM'/><disabled>false</disabled></project>";
        let outcome = evaluate(input, "//scm/@class", &mutate("a<b")).unwrap();
        assert_eq!(
            outcome.rewritten(),
            Some("<project><scm class=\"a&lt;b\"/><disabled>false</disabled></project>\n")
        );
        let outcome = evaluate(input, "//disabled/text()", &mutate("true")).unwrap();
        assert!(outcome.rewritten().is_some_and(|doc| doc.contains("<disabled>true</disabled>")));
    }

    #[test]
    fn test_every_match_rewritten() {
        let input = "<p><b><cmd>a</cmd></b><b><cmd>b</cmd></b></p>";
        let outcome = evaluate(input, "//cmd", &mutate("make")).unwrap();
        assert_eq!(outcome.rewritten(), Some("<p><b><cmd>make</cmd></b><b><cmd>make</cmd></b></p>\n"));
    }

    #[test]
    fn test_errors_are_distinct() {
        assert!(matches!(
            evaluate("<project>", "//a", &Intent::MatchOnly),
            Err(EngineError::Parse(ParseError { .. }))
        ));
        assert!(matches!(
            evaluate("<project>", "//a[1", &Intent::MatchOnly),
            Err(EngineError::Parse(_))
        ));
        assert!(matches!(
            ConfigQueryEngine::new().evaluate("<project>", "//a[1", &Intent::MatchOnly),
            Err(EngineError::Parse(_))
        ));
        assert!(matches!(
            evaluate(PROJECT, "//a[1", &Intent::MatchOnly),
            Err(EngineError::Query(QueryError::Syntax { .. }))
        ));
        assert!(matches!(
            evaluate(PROJECT, "//x:a", &Intent::MatchOnly),
            Err(EngineError::Query(QueryError::UndefinedPrefix(_)))
        ));
    }

    #[test]
    fn test_cache_reuses_compiled_queries() {
        let engine = ConfigQueryEngine::new();
        let first = engine.compile("//description").unwrap();
        let second = engine.compile("//description").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.cached_queries(), 1);
        assert!(engine.compile("//a[").is_err());
        assert_eq!(engine.cached_queries(), 1);
    }

    #[test]
    fn test_cache_disabled() {
        let engine = ConfigQueryEngine::with_config(EngineConfig { query_cache_size: 0 });
        assert_eq!(engine.evaluate(PROJECT, "//description", &Intent::MatchOnly).unwrap(), Outcome::Matched);
        assert_eq!(engine.cached_queries(), 0);
    }

    #[test]
    fn test_cache_evicts_least_recent() {
        let engine = ConfigQueryEngine::with_config(EngineConfig { query_cache_size: 2 });
        for query in ["//a", "//b", "//c"] {
            engine.compile(query).unwrap();
        }
        assert_eq!(engine.cached_queries(), 2);
    }
}
