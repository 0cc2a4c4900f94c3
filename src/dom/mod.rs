//! DOM Module - Arena-based XML Document
//!
//! Implements an efficient DOM representation using:
//! - Arena allocation for nodes
//! - NodeId (u32) indices for cache-friendly traversal
//! - A string pool borrowing from the input where it can
//! - Namespace resolution stack
//! - A serializer that writes untouched regions back as they were read

pub mod document;
pub mod namespace;
pub mod node;
pub mod serialize;
pub mod strings;

pub use document::XmlDocument;
pub use node::{NodeId, NodeKind, XmlNode};
pub use serialize::serialize;
pub use strings::StringPool;

/// Read access to a document, as needed by the XPath engine
pub trait DocumentAccess {
    /// Get root element ID
    fn root_element_id(&self) -> Option<NodeId>;

    /// Get a node by ID
    fn get_node(&self, id: NodeId) -> Option<&XmlNode>;

    /// Qualified name of an element, attribute or PI target
    fn node_name(&self, id: NodeId) -> Option<&str>;

    /// Get node local name (without prefix)
    fn node_local_name(&self, id: NodeId) -> Option<&str>;

    /// Namespace URI of an element or attribute
    fn node_namespace(&self, id: NodeId) -> Option<&str>;

    /// Decoded value of a non-element node
    fn node_value(&self, id: NodeId) -> Option<&str>;

    /// XPath-visible attribute nodes of an element
    fn attributes_vec(&self, id: NodeId) -> Vec<NodeId>;

    /// Iterate over children - returns collected Vec for trait object compatibility
    fn children_vec(&self, id: NodeId) -> Vec<NodeId>;

    /// Iterate over descendants - returns collected Vec for trait object compatibility
    fn descendants_vec(&self, id: NodeId) -> Vec<NodeId>;

    /// Kind of a node
    fn node_kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.get_node(id).map(|n| n.kind)
    }

    /// Parent of a node; the owning element for attributes
    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.parent)
    }

    fn next_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.next_sibling)
    }

    fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.prev_sibling)
    }

    /// Value of the attribute named `name` on an element
    fn attribute_value(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes_vec(id)
            .into_iter()
            .find(|&a| self.node_name(a) == Some(name))
            .and_then(|a| self.node_value(a))
    }

    /// XPath string-value of a node
    ///
    /// Elements and the document concatenate the text and CDATA of all
    /// descendants; every other node kind yields its own value.
    fn string_value(&self, id: NodeId) -> String {
        match self.get_node(id).map(|n| n.kind) {
            Some(NodeKind::Element | NodeKind::Document) => self
                .descendants_vec(id)
                .into_iter()
                .filter(|&d| self.get_node(d).is_some_and(|n| n.is_text()))
                .filter_map(|d| self.node_value(d))
                .collect(),
            Some(_) => self.node_value(id).unwrap_or("").to_string(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_value() {
        let doc = XmlDocument::parse("<a>x<b>y<![CDATA[z]]></b><!--no--></a>").unwrap();
        let root = doc.root_element_id().unwrap();
        assert_eq!(doc.string_value(root), "xyz");
        assert_eq!(doc.string_value(0), "xyz");
    }
}
