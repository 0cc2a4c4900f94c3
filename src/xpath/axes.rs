//! XPath Axes Implementation
//!
//! All 13 XPath 1.0 axes:
//! - child, parent, self
//! - descendant, descendant-or-self
//! - ancestor, ancestor-or-self
//! - following, following-sibling
//! - preceding, preceding-sibling
//! - attribute, namespace
//!
//! Nodes come back in axis order: document order for forward axes, nearest
//! first for reverse axes. The namespace axis is always empty since
//! namespace nodes are not modelled.

use super::compiler::CompiledNodeTest;
use super::eval::Namespaces;
use super::parser::Axis;
use crate::dom::{DocumentAccess, NodeId, NodeKind};
use crate::error::QueryError;

/// Navigate along an axis from a context node
pub fn navigate<D: DocumentAccess>(doc: &D, context: NodeId, axis: Axis) -> Vec<NodeId> {
    match axis {
        Axis::Child => doc.children_vec(context),
        Axis::Descendant => doc.descendants_vec(context),
        Axis::DescendantOrSelf => descendant_or_self_axis(doc, context),
        Axis::Parent => doc.parent_of(context).into_iter().collect(),
        Axis::Ancestor => ancestor_axis(doc, context),
        Axis::AncestorOrSelf => ancestor_or_self_axis(doc, context),
        Axis::FollowingSibling => sibling_axis(doc, context, |id| doc.next_sibling_of(id)),
        Axis::PrecedingSibling => sibling_axis(doc, context, |id| doc.prev_sibling_of(id)),
        Axis::Following => following_axis(doc, context),
        Axis::Preceding => preceding_axis(doc, context),
        Axis::Self_ => vec![context],
        Axis::Attribute => doc.attributes_vec(context),
        Axis::Namespace => Vec::new(),
    }
}

/// descendant-or-self:: axis - context node plus all descendants
fn descendant_or_self_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let descendants = doc.descendants_vec(context);
    let mut result = Vec::with_capacity(1 + descendants.len());
    result.push(context);
    result.extend(descendants);
    result
}

/// ancestor:: axis - parent, grandparent, ... up to the document node
fn ancestor_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut current = context;

    while let Some(parent) = doc.parent_of(current) {
        result.push(parent);
        current = parent;
    }

    result
}

fn ancestor_or_self_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = vec![context];
    result.extend(ancestor_axis(doc, context));
    result
}

/// Sibling axes; attributes have no siblings
fn sibling_axis<D, F>(doc: &D, context: NodeId, next: F) -> Vec<NodeId>
where
    D: DocumentAccess,
    F: Fn(NodeId) -> Option<NodeId>,
{
    if is_attribute(doc, context) {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut sibling = next(context);
    while let Some(id) = sibling {
        result.push(id);
        sibling = next(id);
    }
    result
}

/// following:: axis - nodes after the context in document order, excluding
/// descendants; for an attribute, its element's descendants come first
fn following_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();

    let mut current = context;
    if is_attribute(doc, context) {
        match doc.parent_of(context) {
            Some(element) => {
                result.extend(doc.descendants_vec(element));
                current = element;
            }
            None => return result,
        }
    }

    let mut node = Some(current);
    while let Some(id) = node {
        let mut sibling = doc.next_sibling_of(id);
        while let Some(sib_id) = sibling {
            result.push(sib_id);
            result.extend(doc.descendants_vec(sib_id));
            sibling = doc.next_sibling_of(sib_id);
        }
        node = doc.parent_of(id);
    }

    result
}

/// preceding:: axis - nodes before the context in reverse document order,
/// excluding ancestors
fn preceding_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();

    // An attribute precedes nothing its element does not
    let mut node = if is_attribute(doc, context) {
        doc.parent_of(context)
    } else {
        Some(context)
    };

    while let Some(id) = node {
        let mut sibling = doc.prev_sibling_of(id);
        while let Some(sib_id) = sibling {
            result.extend(doc.descendants_vec(sib_id).into_iter().rev());
            result.push(sib_id);
            sibling = doc.prev_sibling_of(sib_id);
        }
        node = doc.parent_of(id);
    }

    result
}

fn is_attribute<D: DocumentAccess>(doc: &D, id: NodeId) -> bool {
    doc.node_kind_of(id) == Some(NodeKind::Attribute)
}

/// A node test with its namespace prefix resolved against one document
pub enum NodeMatcher<'t> {
    /// `*`: any node of the principal type
    Principal,
    /// Unprefixed name: principal type, no namespace, same name
    Name(&'t str),
    /// `p:local` or `p:*` (local is None)
    Namespaced { uri: &'t str, local: Option<&'t str> },
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<&'t str>),
}

impl<'t> NodeMatcher<'t> {
    /// Resolve the prefix of a compiled node test
    pub fn resolve(test: &'t CompiledNodeTest, namespaces: &'t Namespaces) -> Result<Self, QueryError> {
        let lookup = move |prefix: &str| {
            namespaces
                .resolve(prefix)
                .ok_or_else(|| QueryError::UndefinedPrefix(prefix.to_string()))
        };

        Ok(match test {
            CompiledNodeTest::Any => NodeMatcher::Principal,
            CompiledNodeTest::Name(name) => NodeMatcher::Name(name),
            CompiledNodeTest::QName(prefix, local) => NodeMatcher::Namespaced {
                uri: lookup(prefix)?,
                local: Some(local.as_str()),
            },
            CompiledNodeTest::NamespaceWildcard(prefix) => NodeMatcher::Namespaced {
                uri: lookup(prefix)?,
                local: None,
            },
            CompiledNodeTest::Node => NodeMatcher::Node,
            CompiledNodeTest::Text => NodeMatcher::Text,
            CompiledNodeTest::Comment => NodeMatcher::Comment,
            CompiledNodeTest::ProcessingInstruction(target) => NodeMatcher::ProcessingInstruction(target.as_deref()),
        })
    }

    /// Check a node found along `axis`
    pub fn matches<D: DocumentAccess>(&self, doc: &D, node_id: NodeId, axis: Axis) -> bool {
        let Some(kind) = doc.node_kind_of(node_id) else {
            return false;
        };
        // The principal node type is attribute on the attribute axis, element elsewhere
        let principal = if axis == Axis::Attribute {
            NodeKind::Attribute
        } else {
            NodeKind::Element
        };

        match self {
            NodeMatcher::Principal => kind == principal,
            NodeMatcher::Name(name) => {
                kind == principal
                    && doc.node_namespace(node_id).is_none()
                    && doc.node_name(node_id) == Some(*name)
            }
            NodeMatcher::Namespaced { uri, local } => {
                kind == principal
                    && doc.node_namespace(node_id) == Some(*uri)
                    && local.map_or(true, |l| doc.node_local_name(node_id) == Some(l))
            }
            NodeMatcher::Node => true,
            NodeMatcher::Text => kind == NodeKind::Text || kind == NodeKind::CData,
            NodeMatcher::Comment => kind == NodeKind::Comment,
            NodeMatcher::ProcessingInstruction(target) => {
                kind == NodeKind::ProcessingInstruction
                    && target.map_or(true, |t| doc.node_name(node_id) == Some(t))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::XmlDocument;

    fn names(doc: &XmlDocument<'_>, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| doc.node_name(id).unwrap_or("#").to_string())
            .collect()
    }

    fn find(doc: &XmlDocument<'_>, name: &str) -> NodeId {
        doc.descendants(0).find(|&id| doc.node_name(id) == Some(name)).unwrap()
    }

    #[test]
    fn test_forward_axes() {
        let doc = XmlDocument::parse("<r><a><b/></a><c><d/></c><e/></r>").unwrap();
        let a = find(&doc, "a");
        assert_eq!(names(&doc, &navigate(&doc, a, Axis::Following)), ["c", "d", "e"]);
        assert_eq!(names(&doc, &navigate(&doc, a, Axis::FollowingSibling)), ["c", "e"]);
        assert_eq!(names(&doc, &navigate(&doc, a, Axis::DescendantOrSelf)), ["a", "b"]);
    }

    #[test]
    fn test_reverse_axes_nearest_first() {
        let doc = XmlDocument::parse("<r><a><b/></a><c><d/></c><e/></r>").unwrap();
        let e = find(&doc, "e");
        assert_eq!(names(&doc, &navigate(&doc, e, Axis::Preceding)), ["d", "c", "b", "a"]);
        assert_eq!(names(&doc, &navigate(&doc, e, Axis::PrecedingSibling)), ["c", "a"]);
        let d = find(&doc, "d");
        assert_eq!(names(&doc, &navigate(&doc, d, Axis::Ancestor)), ["c", "r", "#"]);
    }

    #[test]
    fn test_attribute_axes() {
        let doc = XmlDocument::parse("<r xmlns:p='urn:p'><a x='1' p:y='2'><b/></a><c/></r>").unwrap();
        let a = find(&doc, "a");
        let attrs = navigate(&doc, a, Axis::Attribute);
        assert_eq!(names(&doc, &attrs), ["x", "p:y"]);
        assert_eq!(navigate(&doc, attrs[0], Axis::Parent), vec![a]);
        assert!(navigate(&doc, attrs[0], Axis::FollowingSibling).is_empty());
        assert_eq!(names(&doc, &navigate(&doc, attrs[0], Axis::Following)), ["b", "c"]);
        assert!(navigate(&doc, a, Axis::Namespace).is_empty());
    }

    #[test]
    fn test_name_tests_are_namespace_aware() {
        let doc = XmlDocument::parse("<r xmlns:p='urn:p'><p:job/><job/></r>").unwrap();
        let mut namespaces = Namespaces::new();
        namespaces.bind("q", "urn:p");
        let prefixed = find(&doc, "p:job");
        let plain = find(&doc, "job");

        let by_name = CompiledNodeTest::Name("job".to_string());
        let matcher = NodeMatcher::resolve(&by_name, &namespaces).unwrap();
        assert!(matcher.matches(&doc, plain, Axis::Child));
        assert!(!matcher.matches(&doc, prefixed, Axis::Child));

        let by_qname = CompiledNodeTest::QName("q".to_string(), "job".to_string());
        let matcher = NodeMatcher::resolve(&by_qname, &namespaces).unwrap();
        assert!(matcher.matches(&doc, prefixed, Axis::Child));
        assert!(!matcher.matches(&doc, plain, Axis::Child));

        let unbound = CompiledNodeTest::NamespaceWildcard("z".to_string());
        assert!(matches!(
            NodeMatcher::resolve(&unbound, &namespaces),
            Err(QueryError::UndefinedPrefix(p)) if p == "z"
        ));
    }
}
