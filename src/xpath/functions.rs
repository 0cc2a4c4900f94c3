//! XPath 1.0 Functions
//!
//! Implements the XPath 1.0 core function library:
//!
//! Node Set Functions:
//! - position(), last(), count(), local-name(), namespace-uri(), name()
//!
//! String Functions:
//! - string(), concat(), starts-with(), contains(), substring(),
//!   substring-before(), substring-after(), string-length(),
//!   normalize-space(), translate()
//!
//! Boolean Functions:
//! - boolean(), not(), true(), false(), lang()
//!
//! Number Functions:
//! - number(), sum(), floor(), ceiling(), round()
//!
//! `id()` needs DTD attribute types, which are never read, so it is
//! rejected when the query is compiled.

use super::value::{string_to_number, XPathValue};
use crate::dom::{DocumentAccess, NodeId};
use crate::error::QueryError;

/// Accepted argument counts of a core function
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub min: usize,
    pub max: Option<usize>,
    /// Human-readable form used in arity errors
    pub expected: &'static str,
}

impl Signature {
    const fn exactly(n: usize, expected: &'static str) -> Self {
        Signature {
            min: n,
            max: Some(n),
            expected,
        }
    }

    const fn optional_one() -> Self {
        Signature {
            min: 0,
            max: Some(1),
            expected: "0 or 1",
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

/// Signature of a supported function, or None if the name is unknown
pub fn signature(name: &str) -> Option<Signature> {
    let sig = match name {
        "position" | "last" | "true" | "false" => Signature::exactly(0, "0"),
        "count" | "boolean" | "not" | "lang" | "sum" | "floor" | "ceiling" | "round" => {
            Signature::exactly(1, "1")
        }
        "local-name" | "namespace-uri" | "name" | "string" | "string-length" | "normalize-space"
        | "number" => Signature::optional_one(),
        "starts-with" | "contains" | "substring-before" | "substring-after" => {
            Signature::exactly(2, "2")
        }
        "translate" => Signature::exactly(3, "3"),
        "substring" => Signature {
            min: 2,
            max: Some(3),
            expected: "2 or 3",
        },
        "concat" => Signature {
            min: 2,
            max: None,
            expected: "at least 2",
        },
        _ => return None,
    };
    Some(sig)
}

/// Check a call against the function table
pub fn check_call(name: &str, arg_count: usize) -> Result<(), QueryError> {
    if name == "id" {
        return Err(QueryError::Unsupported("id()".to_string()));
    }
    let sig = signature(name).ok_or_else(|| QueryError::UnknownFunction(name.to_string()))?;
    if !sig.accepts(arg_count) {
        return Err(QueryError::Arity {
            name: name.to_string(),
            expected: sig.expected,
            found: arg_count,
        });
    }
    Ok(())
}

/// Evaluate a function call
pub fn call<D: DocumentAccess>(
    name: &str,
    args: Vec<XPathValue>,
    doc: &D,
    context: NodeId,
    position: usize,
    size: usize,
) -> Result<XPathValue, QueryError> {
    check_call(name, args.len())?;

    let value = match name {
        // Node Set Functions
        "position" => XPathValue::Number(position as f64),
        "last" => XPathValue::Number(size as f64),
        "count" => XPathValue::Number(node_set_arg(name, &args[0])?.len() as f64),
        "local-name" => {
            let node = node_arg(name, &args, context)?;
            node_string(node.and_then(|n| doc.node_local_name(n)))
        }
        "namespace-uri" => {
            let node = node_arg(name, &args, context)?;
            node_string(node.and_then(|n| doc.node_namespace(n)))
        }
        "name" => {
            let node = node_arg(name, &args, context)?;
            node_string(node.and_then(|n| doc.node_name(n)))
        }

        // String Functions
        "string" => XPathValue::String(string_arg(&args, doc, context)),
        "concat" => XPathValue::String(args.iter().map(|a| a.to_string_value(doc)).collect()),
        "starts-with" => {
            let (s, prefix) = two_strings(&args, doc);
            XPathValue::Boolean(s.starts_with(&prefix))
        }
        "contains" => {
            let (s, pattern) = two_strings(&args, doc);
            XPathValue::Boolean(s.contains(&pattern))
        }
        "substring" => fn_substring(&args, doc),
        "substring-before" => {
            let (s, pattern) = two_strings(&args, doc);
            let before = s.find(&pattern).map_or("", |pos| &s[..pos]);
            XPathValue::String(before.to_string())
        }
        "substring-after" => {
            let (s, pattern) = two_strings(&args, doc);
            let after = s.find(&pattern).map_or("", |pos| &s[pos + pattern.len()..]);
            XPathValue::String(after.to_string())
        }
        "string-length" => XPathValue::Number(string_arg(&args, doc, context).chars().count() as f64),
        "normalize-space" => {
            let s = string_arg(&args, doc, context);
            let normalized = s
                .split([' ', '\t', '\n', '\r'])
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            XPathValue::String(normalized)
        }
        "translate" => fn_translate(&args, doc),

        // Boolean Functions
        "boolean" => XPathValue::Boolean(args[0].to_boolean()),
        "not" => XPathValue::Boolean(!args[0].to_boolean()),
        "true" => XPathValue::Boolean(true),
        "false" => XPathValue::Boolean(false),
        "lang" => fn_lang(&args[0].to_string_value(doc), doc, context),

        // Number Functions
        "number" => XPathValue::Number(match args.first() {
            Some(arg) => arg.to_number(doc),
            None => string_to_number(&doc.string_value(context)),
        }),
        "sum" => {
            let total = node_set_arg(name, &args[0])?
                .iter()
                .map(|&n| string_to_number(&doc.string_value(n)))
                .sum();
            XPathValue::Number(total)
        }
        "floor" => XPathValue::Number(args[0].to_number(doc).floor()),
        "ceiling" => XPathValue::Number(args[0].to_number(doc).ceil()),
        "round" => XPathValue::Number(round(args[0].to_number(doc))),

        _ => return Err(QueryError::UnknownFunction(name.to_string())),
    };

    Ok(value)
}

fn node_set_arg<'v>(name: &str, arg: &'v XPathValue) -> Result<&'v [NodeId], QueryError> {
    match arg {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        other => Err(QueryError::Type(format!(
            "{name}() expects a node-set, got a {}",
            other.type_name()
        ))),
    }
}

/// The node a name function looks at: first of the argument, or the context node
fn node_arg(name: &str, args: &[XPathValue], context: NodeId) -> Result<Option<NodeId>, QueryError> {
    match args.first() {
        Some(arg) => Ok(node_set_arg(name, arg)?.first().copied()),
        None => Ok(Some(context)),
    }
}

fn node_string(s: Option<&str>) -> XPathValue {
    XPathValue::String(s.unwrap_or("").to_string())
}

/// Optional string argument defaulting to the context node's string-value
fn string_arg<D: DocumentAccess>(args: &[XPathValue], doc: &D, context: NodeId) -> String {
    match args.first() {
        Some(arg) => arg.to_string_value(doc),
        None => doc.string_value(context),
    }
}

fn two_strings<D: DocumentAccess>(args: &[XPathValue], doc: &D) -> (String, String) {
    (args[0].to_string_value(doc), args[1].to_string_value(doc))
}

/// XPath round(): halves go towards positive infinity
fn round(n: f64) -> f64 {
    if !n.is_finite() || n == 0.0 {
        return n;
    }
    let rounded = (n + 0.5).floor();
    // Values in [-0.5, 0) round to negative zero
    if rounded == 0.0 && n < 0.0 {
        -0.0
    } else {
        rounded
    }
}

/// substring(s, start, len?): characters at positions p with
/// round(start) <= p < round(start) + round(len), counting from 1
fn fn_substring<D: DocumentAccess>(args: &[XPathValue], doc: &D) -> XPathValue {
    let s = args[0].to_string_value(doc);
    let start = round(args[1].to_number(doc));
    let end = match args.get(2) {
        Some(len) => start + round(len.to_number(doc)),
        None => f64::INFINITY,
    };

    // NaN bounds compare false and select nothing
    let result: String = s
        .chars()
        .enumerate()
        .filter(|&(i, _)| {
            let p = (i + 1) as f64;
            p >= start && p < end
        })
        .map(|(_, c)| c)
        .collect();
    XPathValue::String(result)
}

fn fn_translate<D: DocumentAccess>(args: &[XPathValue], doc: &D) -> XPathValue {
    let s = args[0].to_string_value(doc);
    let from: Vec<char> = args[1].to_string_value(doc).chars().collect();
    let to: Vec<char> = args[2].to_string_value(doc).chars().collect();

    let result: String = s
        .chars()
        .filter_map(|c| match from.iter().position(|&fc| fc == c) {
            Some(pos) => to.get(pos).copied(),
            None => Some(c),
        })
        .collect();
    XPathValue::String(result)
}

/// lang(): the nearest xml:lang on the context node or an ancestor
/// equals `target` or starts with `target` followed by '-', ignoring case
fn fn_lang<D: DocumentAccess>(target: &str, doc: &D, context: NodeId) -> XPathValue {
    let target = target.to_lowercase();
    let mut node = Some(context);
    while let Some(current) = node {
        if let Some(lang) = doc.attribute_value(current, "xml:lang") {
            let lang = lang.to_lowercase();
            let matches = lang == target
                || (lang.starts_with(&target) && lang.as_bytes().get(target.len()) == Some(&b'-'));
            return XPathValue::Boolean(matches);
        }
        node = doc.parent_of(current);
    }
    XPathValue::Boolean(false)
}
