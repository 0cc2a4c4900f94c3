//! XPath Evaluation Engine
//!
//! Evaluates compiled XPath expressions against an XML document.

use super::axes::{navigate, NodeMatcher};
use super::compiler::{CompiledExpr, CompiledStep, Op};
use super::functions;
use super::parser::BinaryOp;
use super::value::{string_to_number, XPathValue};
use crate::dom::namespace::ns;
use crate::dom::{DocumentAccess, NodeId, XmlDocument};
use crate::error::QueryError;
use std::collections::HashSet;

/// Prefix bindings available to name tests
///
/// The `xml` prefix is always bound.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    bindings: Vec<(String, String)>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings declared with `xmlns:p` on the document's root element
    pub fn from_document(doc: &XmlDocument<'_>) -> Self {
        let mut namespaces = Self::new();
        for (prefix, uri) in doc.root_namespaces() {
            namespaces.bind(prefix, uri);
        }
        namespaces
    }

    /// Bind a prefix, replacing any earlier binding
    pub fn bind(&mut self, prefix: &str, uri: &str) {
        self.bindings.retain(|(p, _)| p != prefix);
        self.bindings.push((prefix.to_string(), uri.to_string()));
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(ns::XML);
        }
        self.bindings
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}

/// Evaluation context - generic over document type
pub struct EvalContext<'a, D: DocumentAccess> {
    pub doc: &'a D,
    pub namespaces: &'a Namespaces,
    pub context_node: NodeId,
    pub context_position: usize,
    pub context_size: usize,
}

impl<'a, D: DocumentAccess> EvalContext<'a, D> {
    /// Context at the root element, position 1 of 1
    pub fn at_root(doc: &'a D, namespaces: &'a Namespaces) -> Self {
        EvalContext {
            doc,
            namespaces,
            context_node: doc.root_element_id().unwrap_or(0),
            context_position: 1,
            context_size: 1,
        }
    }

    fn with_node(&self, node: NodeId, position: usize, size: usize) -> Self {
        EvalContext {
            doc: self.doc,
            namespaces: self.namespaces,
            context_node: node,
            context_position: position,
            context_size: size,
        }
    }
}

/// Evaluate an XPath expression with the root element as context node
///
/// Prefixes in name tests resolve through the root element's declarations.
#[must_use = "XPath evaluation result should be used"]
pub fn evaluate(doc: &XmlDocument<'_>, xpath: &str) -> Result<XPathValue, QueryError> {
    let compiled = super::compiler::compile(xpath)?;
    let namespaces = Namespaces::from_document(doc);
    evaluate_compiled(&compiled, &EvalContext::at_root(doc, &namespaces))
}

/// Evaluate a compiled expression
pub fn evaluate_compiled<D: DocumentAccess>(
    expr: &CompiledExpr,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, QueryError> {
    let mut stack: Vec<XPathValue> = Vec::new();

    for op in &expr.ops {
        match op {
            Op::Root => {
                // The document node, parent of the root element
                stack.push(XPathValue::single_node(0));
            }

            Op::Context => {
                stack.push(XPathValue::single_node(ctx.context_node));
            }

            Op::Step(step) => {
                let nodes = pop_nodeset(&mut stack, "a location step")?;
                stack.push(XPathValue::NodeSet(apply_step(ctx, step, nodes)?));
            }

            Op::Predicate(pred_expr) => {
                let nodes = pop_nodeset(&mut stack, "a predicate")?;
                stack.push(XPathValue::NodeSet(filter_nodes(ctx, pred_expr, nodes)?));
            }

            Op::Union => {
                let right = pop_nodeset(&mut stack, "'|'")?;
                let mut result = pop_nodeset(&mut stack, "'|'")?;
                // Use HashSet for O(1) deduplication instead of O(n) Vec::contains
                let mut seen: HashSet<NodeId> = result.iter().copied().collect();
                result.reserve(right.len());
                for node in right {
                    if seen.insert(node) {
                        result.push(node);
                    }
                }
                // Sort by document order
                result.sort_unstable();
                stack.push(XPathValue::NodeSet(result));
            }

            Op::Number(n) => {
                stack.push(XPathValue::Number(*n));
            }

            Op::String(s) => {
                stack.push(XPathValue::String(s.clone()));
            }

            Op::Negate => {
                let val = stack.pop().unwrap_or_default();
                stack.push(XPathValue::Number(-val.to_number(ctx.doc)));
            }

            Op::Binary(op) => {
                let right = stack.pop().unwrap_or_default();
                let left = stack.pop().unwrap_or_default();
                let doc = ctx.doc;

                let result = match op {
                    BinaryOp::Or => XPathValue::Boolean(left.to_boolean() || right.to_boolean()),
                    BinaryOp::And => XPathValue::Boolean(left.to_boolean() && right.to_boolean()),
                    BinaryOp::Eq
                    | BinaryOp::NotEq
                    | BinaryOp::Lt
                    | BinaryOp::LtEq
                    | BinaryOp::Gt
                    | BinaryOp::GtEq => XPathValue::Boolean(compare(doc, *op, &left, &right)),
                    BinaryOp::Add => XPathValue::Number(left.to_number(doc) + right.to_number(doc)),
                    BinaryOp::Sub => XPathValue::Number(left.to_number(doc) - right.to_number(doc)),
                    BinaryOp::Mul => XPathValue::Number(left.to_number(doc) * right.to_number(doc)),
                    BinaryOp::Div => XPathValue::Number(left.to_number(doc) / right.to_number(doc)),
                    BinaryOp::Mod => XPathValue::Number(left.to_number(doc) % right.to_number(doc)),
                };

                stack.push(result);
            }

            Op::Call(name, arg_count) => {
                let split = stack.len().saturating_sub(*arg_count);
                let args = stack.split_off(split);

                let result = functions::call(
                    name,
                    args,
                    ctx.doc,
                    ctx.context_node,
                    ctx.context_position,
                    ctx.context_size,
                )?;

                stack.push(result);
            }
        }
    }

    Ok(stack.pop().unwrap_or_default())
}

fn pop_nodeset(stack: &mut Vec<XPathValue>, what: &str) -> Result<Vec<NodeId>, QueryError> {
    match stack.pop().unwrap_or_default() {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        other => Err(QueryError::Type(format!(
            "{what} needs a node-set, got a {}",
            other.type_name()
        ))),
    }
}

/// Apply one location step to every input node
///
/// Predicates number candidates in axis order, separately for each input
/// node; the merged result is in document order without duplicates.
fn apply_step<D: DocumentAccess>(
    ctx: &EvalContext<'_, D>,
    step: &CompiledStep,
    nodes: Vec<NodeId>,
) -> Result<Vec<NodeId>, QueryError> {
    let matcher = NodeMatcher::resolve(&step.node_test, ctx.namespaces)?;

    let mut seen = HashSet::with_capacity(nodes.len());
    let mut result = Vec::with_capacity(nodes.len());
    for node in nodes {
        let mut candidates: Vec<NodeId> = navigate(ctx.doc, node, step.axis)
            .into_iter()
            .filter(|&candidate| matcher.matches(ctx.doc, candidate, step.axis))
            .collect();

        for predicate in &step.predicates {
            candidates = filter_nodes(ctx, predicate, candidates)?;
        }

        result.extend(candidates.into_iter().filter(|&c| seen.insert(c)));
    }

    // Sort by document order (node IDs are assigned in document order)
    result.sort_unstable();
    Ok(result)
}

/// Keep the nodes for which `predicate` holds; a number tests the position
fn filter_nodes<D: DocumentAccess>(
    ctx: &EvalContext<'_, D>,
    predicate: &CompiledExpr,
    nodes: Vec<NodeId>,
) -> Result<Vec<NodeId>, QueryError> {
    let size = nodes.len();
    let mut filtered = Vec::new();

    for (i, node) in nodes.into_iter().enumerate() {
        let pred_ctx = ctx.with_node(node, i + 1, size);
        let include = match evaluate_compiled(predicate, &pred_ctx)? {
            XPathValue::Number(n) => (i + 1) as f64 == n,
            other => other.to_boolean(),
        };
        if include {
            filtered.push(node);
        }
    }

    Ok(filtered)
}

/// XPath 1.0 comparison of two values
///
/// A node-set compares true if any of its nodes does; the node's
/// string-value is converted to the type of the other operand.
fn compare<D: DocumentAccess>(doc: &D, op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
            let right_values: Vec<String> = r.iter().map(|&n| doc.string_value(n)).collect();
            l.iter().any(|&n| {
                let left_value = doc.string_value(n);
                right_values.iter().any(|rv| compare_strings(op, &left_value, rv))
            })
        }
        (XPathValue::NodeSet(nodes), other) => compare_node_set(doc, op, nodes, other, false),
        (other, XPathValue::NodeSet(nodes)) => compare_node_set(doc, op, nodes, other, true),
        _ => compare_atomic(doc, op, left, right),
    }
}

/// Compare a node-set against a non-node-set value; `swapped` when the
/// node-set is the right operand
fn compare_node_set<D: DocumentAccess>(
    doc: &D,
    op: BinaryOp,
    nodes: &[NodeId],
    other: &XPathValue,
    swapped: bool,
) -> bool {
    let ordered = |atom: &XPathValue| {
        if swapped {
            compare_atomic(doc, op, other, atom)
        } else {
            compare_atomic(doc, op, atom, other)
        }
    };

    if let XPathValue::Boolean(_) = other {
        return ordered(&XPathValue::Boolean(!nodes.is_empty()));
    }

    nodes.iter().any(|&n| {
        let value = doc.string_value(n);
        let atom = match other {
            XPathValue::Number(_) => XPathValue::Number(string_to_number(&value)),
            _ => XPathValue::String(value),
        };
        ordered(&atom)
    })
}

/// Compare two values neither of which is a node-set
fn compare_atomic<D: DocumentAccess>(doc: &D, op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
    if !matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
        return compare_numbers(op, left.to_number(doc), right.to_number(doc));
    }

    let equal = match (left, right) {
        (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => left.to_boolean() == right.to_boolean(),
        (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
            // NaN is unequal to everything, itself included
            return compare_numbers(op, left.to_number(doc), right.to_number(doc));
        }
        _ => left.to_string_value(doc) == right.to_string_value(doc),
    };
    (op == BinaryOp::Eq) == equal
}

/// String operands: = and != compare strings, the rest compare numbers
fn compare_strings(op: BinaryOp, left: &str, right: &str) -> bool {
    match op {
        BinaryOp::Eq => left == right,
        BinaryOp::NotEq => left != right,
        _ => compare_numbers(op, string_to_number(left), string_to_number(right)),
    }
}

fn compare_numbers(op: BinaryOp, left: f64, right: f64) -> bool {
    match op {
        BinaryOp::Eq => left == right,
        BinaryOp::NotEq => left != right,
        BinaryOp::Lt => left < right,
        BinaryOp::LtEq => left <= right,
        BinaryOp::Gt => left > right,
        BinaryOp::GtEq => left >= right,
        _ => false,
    }
}
