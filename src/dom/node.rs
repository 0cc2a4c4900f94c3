//! XML Node representation
//!
//! Uses NodeId (u32) for compact, cache-friendly node references.
//!
//! Attribute and namespace-declaration nodes are stored in the arena right
//! after their element and are not linked as children. For a freshly parsed
//! document, NodeId order is therefore XPath document order.

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Element node
    Element,
    /// Attribute (owned by an element, not a child)
    Attribute,
    /// `xmlns` / `xmlns:p` declaration: written back, invisible to XPath
    NamespaceDecl,
    /// Text content
    Text,
    /// CDATA section
    CData,
    /// Comment
    Comment,
    /// Processing instruction
    ProcessingInstruction,
}

/// An XML node in the arena
#[derive(Debug, Clone)]
pub struct XmlNode {
    /// Type of this node
    pub kind: NodeKind,
    /// Parent node (None for document root); an attribute's parent is its element
    pub parent: Option<NodeId>,
    /// First child node
    pub first_child: Option<NodeId>,
    /// Last child node
    pub last_child: Option<NodeId>,
    /// Previous sibling
    pub prev_sibling: Option<NodeId>,
    /// Next sibling
    pub next_sibling: Option<NodeId>,
    /// Qualified name for elements and attributes, target for PIs
    pub name_id: u32,
    /// Resolved namespace URI, or 0
    pub namespace_id: u32,
    /// Decoded value: text, CDATA and comment content, attribute value, PI data
    pub value_id: u32,
    /// Value as it is written out; differs from `value_id` when escaped
    pub raw_id: u32,
    /// Number of attribute/namespace nodes following an element
    pub attr_count: u32,
    /// Attribute quote character
    pub quote: u8,
    /// Depth in document tree
    pub depth: u16,
}

impl XmlNode {
    fn with_kind(kind: NodeKind, parent: Option<NodeId>, depth: u16) -> Self {
        XmlNode {
            kind,
            parent,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            name_id: 0,
            namespace_id: 0,
            value_id: 0,
            raw_id: 0,
            attr_count: 0,
            quote: b'"',
            depth,
        }
    }

    /// Create a new document root node
    pub fn document() -> Self {
        Self::with_kind(NodeKind::Document, None, 0)
    }

    /// Create a new element node
    pub fn element(name_id: u32, parent: NodeId, depth: u16) -> Self {
        let mut node = Self::with_kind(NodeKind::Element, Some(parent), depth);
        node.name_id = name_id;
        node
    }

    /// Create an attribute or namespace declaration owned by `element`
    pub fn attribute(kind: NodeKind, name_id: u32, element: NodeId, depth: u16) -> Self {
        let mut node = Self::with_kind(kind, Some(element), depth);
        node.name_id = name_id;
        node
    }

    /// Create a text, CDATA, comment or PI node
    pub fn leaf(kind: NodeKind, parent: NodeId, depth: u16) -> Self {
        Self::with_kind(kind, Some(parent), depth)
    }

    /// Check if this is an element node
    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Check if this is a text or CDATA node
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text | NodeKind::CData)
    }

    /// Check if this node has children
    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}
