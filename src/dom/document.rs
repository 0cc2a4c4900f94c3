//! Arena-based XML Document
//!
//! One `XmlDocument` is built per configuration. It borrows the input and
//! only copies strings that needed entity decoding or were set by a
//! mutation.

use super::namespace::NamespaceResolver;
use super::node::{NodeId, NodeKind, XmlNode};
use super::strings::StringPool;
use crate::core::entities::{comment_content, escape_attribute, escape_text, pi_data};
use crate::error::ParseError;
use crate::reader::events::{StartElement, XmlEvent};
use crate::reader::slice::SliceReader;
use std::borrow::Cow;

/// Arena-based XML document
#[derive(Debug)]
pub struct XmlDocument<'a> {
    input: &'a str,
    nodes: Vec<XmlNode>,
    strings: StringPool<'a>,
    root_element: Option<NodeId>,
    declaration: Option<&'a str>,
    /// DOCTYPE as written and the number of top-level nodes preceding it
    doctype: Option<(&'a str, usize)>,
}

impl<'a> XmlDocument<'a> {
    /// Parse a complete document
    ///
    /// Either the whole input is well-formed and a document is returned, or
    /// the first fatal error is reported and nothing is kept.
    pub fn parse(input: &'a str) -> Result<Self, ParseError> {
        let mut doc = XmlDocument {
            input,
            nodes: Vec::with_capacity(input.len() / 16 + 1),
            strings: StringPool::new(),
            root_element: None,
            declaration: None,
            doctype: None,
        };
        doc.nodes.push(XmlNode::document());
        doc.build_from_events()?;
        Ok(doc)
    }

    /// Build DOM from XML events
    fn build_from_events(&mut self) -> Result<(), ParseError> {
        let mut reader = SliceReader::new(self.input);
        let mut resolver = NamespaceResolver::new(&mut self.strings);
        let mut stack: Vec<NodeId> = vec![0];

        loop {
            let parent = *stack.last().unwrap_or(&0);
            let depth = u16::try_from(stack.len()).unwrap_or(u16::MAX);

            match reader.next_event()? {
                XmlEvent::StartElement(elem) => {
                    let id = self.add_element(elem, parent, depth, &mut resolver);
                    stack.push(id);
                }
                XmlEvent::EmptyElement(elem) => {
                    self.add_element(elem, parent, depth, &mut resolver);
                    resolver.pop_scope();
                }
                XmlEvent::EndElement(_) => {
                    stack.pop();
                    resolver.pop_scope();
                }
                XmlEvent::Text { raw, value } => {
                    let raw_id = self.strings.push_ref(raw);
                    let value_id = match value {
                        Cow::Borrowed(_) => raw_id,
                        Cow::Owned(decoded) => self.strings.push(&decoded),
                    };
                    self.add_leaf(NodeKind::Text, parent, depth, 0, value_id, raw_id);
                }
                XmlEvent::CData(content) => {
                    let id = self.strings.push_ref(content);
                    self.add_leaf(NodeKind::CData, parent, depth, 0, id, id);
                }
                XmlEvent::Comment(content) => {
                    let id = self.strings.push_ref(content);
                    self.add_leaf(NodeKind::Comment, parent, depth, 0, id, id);
                }
                XmlEvent::ProcessingInstruction { target, data } => {
                    let name_id = self.strings.intern_ref(target);
                    let id = self.strings.push_ref(data);
                    self.add_leaf(NodeKind::ProcessingInstruction, parent, depth, name_id, id, id);
                }
                XmlEvent::XmlDeclaration { raw, .. } => self.declaration = Some(raw),
                XmlEvent::DocType(raw) => {
                    let preceding = self.children(0).count();
                    self.doctype = Some((raw, preceding));
                }
                XmlEvent::EndDocument => break,
            }
        }

        Ok(())
    }

    /// Add an element and its attribute nodes; opens a namespace scope
    fn add_element(
        &mut self,
        elem: StartElement<'a>,
        parent: NodeId,
        depth: u16,
        resolver: &mut NamespaceResolver,
    ) -> NodeId {
        resolver.push_scope();
        for attr in elem.attributes.iter().filter(|a| a.is_namespace_decl()) {
            let prefix_id = match attr.name.split_once(':') {
                Some((_, prefix)) => self.strings.intern_ref(prefix),
                None => 0,
            };
            let uri_id = self.strings.intern(&attr.value);
            resolver.declare(prefix_id, uri_id);
        }

        let name_id = self.strings.intern_ref(elem.name);
        let mut node = XmlNode::element(name_id, parent, depth);
        node.attr_count = elem.attributes.len() as u32;
        // Unbound prefixes are tolerated and leave the element without a namespace
        node.namespace_id = match elem.prefix {
            Some(prefix) => {
                let prefix_id = self.strings.intern_ref(prefix);
                resolver.resolve(prefix_id).unwrap_or(0)
            }
            None => resolver.resolve(0).unwrap_or(0),
        };

        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        self.link_child(parent, id);
        if parent == 0 {
            self.root_element = Some(id);
        }

        for attr in elem.attributes {
            let kind = if attr.is_namespace_decl() {
                NodeKind::NamespaceDecl
            } else {
                NodeKind::Attribute
            };
            let mut node = XmlNode::attribute(kind, self.strings.intern_ref(attr.name), id, depth.saturating_add(1));
            if kind == NodeKind::Attribute {
                if let Some(prefix) = attr.prefix() {
                    let prefix_id = self.strings.intern_ref(prefix);
                    node.namespace_id = resolver.resolve(prefix_id).unwrap_or(0);
                }
            }
            node.raw_id = self.strings.push_ref(attr.raw_value);
            node.value_id = match attr.value {
                Cow::Borrowed(value) if value == attr.raw_value => node.raw_id,
                value => self.strings.push(&value),
            };
            node.quote = attr.quote;
            self.nodes.push(node);
        }

        id
    }

    fn add_leaf(&mut self, kind: NodeKind, parent: NodeId, depth: u16, name_id: u32, value_id: u32, raw_id: u32) -> NodeId {
        let mut node = XmlNode::leaf(kind, parent, depth);
        node.name_id = name_id;
        node.value_id = value_id;
        node.raw_id = raw_id;
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        self.link_child(parent, id);
        id
    }

    /// Link a child node to its parent
    fn link_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        let last_child_opt = self.nodes[parent_id as usize].last_child;

        if let Some(last_child_id) = last_child_opt {
            self.nodes[child_id as usize].prev_sibling = Some(last_child_id);
            self.nodes[last_child_id as usize].next_sibling = Some(child_id);
        } else {
            self.nodes[parent_id as usize].first_child = Some(child_id);
        }
        self.nodes[parent_id as usize].last_child = Some(child_id);
    }

    /// Replace the whole value of a node
    ///
    /// - element: every child is dropped and replaced by a single text node
    ///   holding `value` (no node at all when `value` is empty)
    /// - text, CDATA: the content becomes `value`; CDATA holding `]]>`
    ///   turns into a text node
    /// - comment: the content becomes `value` with `--` split by a space and
    ///   a trailing `-` padded, so the comment stays well-formed
    /// - attribute: the value becomes `value`, written back double-quoted
    /// - processing instruction: the data becomes `value` without leading
    ///   whitespace and with `?>` written as `? >`
    /// - document and namespace declarations are left untouched
    ///
    /// Nodes created here are appended to the arena, so after a mutation
    /// NodeId order no longer follows document order.
    pub fn set_node_value(&mut self, id: NodeId, value: &str) {
        let Some(kind) = self.get_node(id).map(|n| n.kind) else {
            return;
        };

        match kind {
            NodeKind::Element => {
                self.detach_children(id);
                if !value.is_empty() {
                    let (value_id, raw_id) = self.store_escaped(value, escape_text(value));
                    let depth = self.nodes[id as usize].depth.saturating_add(1);
                    self.add_leaf(NodeKind::Text, id, depth, 0, value_id, raw_id);
                }
            }
            NodeKind::Text => {
                let (value_id, raw_id) = self.store_escaped(value, escape_text(value));
                let node = &mut self.nodes[id as usize];
                node.value_id = value_id;
                node.raw_id = raw_id;
            }
            NodeKind::Attribute => {
                let (value_id, raw_id) = self.store_escaped(value, escape_attribute(value, b'"'));
                let node = &mut self.nodes[id as usize];
                node.value_id = value_id;
                node.raw_id = raw_id;
                node.quote = b'"';
            }
            NodeKind::CData if value.contains("]]>") => {
                // No CDATA section can hold `]]>`; the node becomes escaped text
                let (value_id, raw_id) = self.store_escaped(value, escape_text(value));
                let node = &mut self.nodes[id as usize];
                node.kind = NodeKind::Text;
                node.value_id = value_id;
                node.raw_id = raw_id;
            }
            NodeKind::CData => self.set_leaf_value(id, Cow::Borrowed(value)),
            NodeKind::Comment => self.set_leaf_value(id, comment_content(value)),
            NodeKind::ProcessingInstruction => self.set_leaf_value(id, pi_data(value)),
            NodeKind::Document | NodeKind::NamespaceDecl => {}
        }
    }

    fn set_leaf_value(&mut self, id: NodeId, value: Cow<'_, str>) {
        let value_id = self.strings.push(&value);
        let node = &mut self.nodes[id as usize];
        node.value_id = value_id;
        node.raw_id = value_id;
    }

    fn store_escaped(&mut self, value: &str, escaped: Cow<'_, str>) -> (u32, u32) {
        let value_id = self.strings.push(value);
        let raw_id = match escaped {
            Cow::Borrowed(_) => value_id,
            Cow::Owned(raw) => self.strings.push(&raw),
        };
        (value_id, raw_id)
    }

    /// Unlink every child of `id`; the detached nodes stay in the arena
    fn detach_children(&mut self, id: NodeId) {
        let mut child = self.nodes[id as usize].first_child.take();
        self.nodes[id as usize].last_child = None;
        while let Some(cid) = child {
            let node = &mut self.nodes[cid as usize];
            child = node.next_sibling.take();
            node.prev_sibling = None;
            node.parent = None;
        }
    }

    /// Get root element ID
    pub fn root_element_id(&self) -> Option<NodeId> {
        self.root_element
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        self.nodes.get(id as usize)
    }

    /// Qualified name of an element, attribute or PI target
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        match node.kind {
            NodeKind::Element | NodeKind::Attribute | NodeKind::NamespaceDecl | NodeKind::ProcessingInstruction => {
                Some(self.strings.get(node.name_id))
            }
            _ => None,
        }
    }

    /// Get node local name (without prefix)
    pub fn node_local_name(&self, id: NodeId) -> Option<&str> {
        let name = self.node_name(id)?;
        Some(name.split_once(':').map_or(name, |(_, local)| local))
    }

    /// Namespace URI of an element or attribute, if it has one
    pub fn node_namespace(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        (node.namespace_id != 0).then(|| self.strings.get(node.namespace_id))
    }

    /// Decoded value of a text, CDATA, comment, attribute or PI node
    pub fn node_value(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        match node.kind {
            NodeKind::Document | NodeKind::Element => None,
            _ => Some(self.strings.get(node.value_id)),
        }
    }

    /// Value as it is serialized (escaped form for text and attributes)
    pub fn node_raw(&self, id: NodeId) -> &str {
        self.get_node(id).map_or("", |n| self.strings.get(n.raw_id))
    }

    /// Attribute and namespace-declaration node IDs of an element, in source order
    pub fn attribute_nodes(&self, id: NodeId) -> std::ops::Range<NodeId> {
        match self.get_node(id) {
            Some(node) if node.is_element() => id + 1..id + 1 + node.attr_count,
            _ => id..id,
        }
    }

    /// XPath-visible attributes of an element (namespace declarations excluded)
    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.attribute_nodes(id)
            .filter(move |&a| self.nodes[a as usize].kind == NodeKind::Attribute)
    }

    /// Get attribute value by qualified name
    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .find(|&a| self.node_name(a) == Some(name))
            .and_then(|a| self.node_value(a))
    }

    /// Prefixed namespace declarations on the root element, as (prefix, uri)
    pub fn root_namespaces(&self) -> Vec<(&str, &str)> {
        let Some(root) = self.root_element else {
            return Vec::new();
        };
        self.attribute_nodes(root)
            .filter(|&a| self.nodes[a as usize].kind == NodeKind::NamespaceDecl)
            .filter_map(|a| {
                let prefix = self.node_name(a)?.strip_prefix("xmlns:")?;
                Some((prefix, self.node_value(a)?))
            })
            .collect()
    }

    /// Iterate over children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_, 'a> {
        let first = self.get_node(id).and_then(|n| n.first_child);
        ChildIter { doc: self, next: first }
    }

    /// Iterate over all descendants of a node, depth first in document order
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_, 'a> {
        let mut stack = Vec::new();
        if let Some(node) = self.get_node(id) {
            let mut child_id = node.last_child;
            while let Some(cid) = child_id {
                stack.push(cid);
                child_id = self.get_node(cid).and_then(|n| n.prev_sibling);
            }
        }
        DescendantIter { doc: self, stack }
    }

    /// Get original input
    pub fn input(&self) -> &'a str {
        self.input
    }

    /// XML declaration as written, if the input had one
    pub fn declaration(&self) -> Option<&'a str> {
        self.declaration
    }

    /// DOCTYPE as written and the number of top-level nodes before it
    pub fn doctype(&self) -> Option<(&'a str, usize)> {
        self.doctype
    }

    /// Get the string pool
    pub fn strings(&self) -> &StringPool<'a> {
        &self.strings
    }
}

/// Iterator over child nodes
pub struct ChildIter<'d, 'a> {
    doc: &'d XmlDocument<'a>,
    next: Option<NodeId>,
}

impl<'d, 'a> Iterator for ChildIter<'d, 'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.get_node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Iterator over descendant nodes (depth-first)
pub struct DescendantIter<'d, 'a> {
    doc: &'d XmlDocument<'a>,
    stack: Vec<NodeId>,
}

impl<'d, 'a> Iterator for DescendantIter<'d, 'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;

        // Push children in reverse so the first child is visited first
        if let Some(node) = self.doc.get_node(current) {
            let mut child_id = node.last_child;
            while let Some(id) = child_id {
                self.stack.push(id);
                child_id = self.doc.get_node(id).and_then(|n| n.prev_sibling);
            }
        }

        Some(current)
    }
}

// =============================================================================
// DocumentAccess trait implementation
// =============================================================================

use super::DocumentAccess;

impl<'a> DocumentAccess for XmlDocument<'a> {
    fn root_element_id(&self) -> Option<NodeId> {
        self.root_element
    }

    fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        self.nodes.get(id as usize)
    }

    fn node_name(&self, id: NodeId) -> Option<&str> {
        XmlDocument::node_name(self, id)
    }

    fn node_local_name(&self, id: NodeId) -> Option<&str> {
        XmlDocument::node_local_name(self, id)
    }

    fn node_namespace(&self, id: NodeId) -> Option<&str> {
        XmlDocument::node_namespace(self, id)
    }

    fn node_value(&self, id: NodeId) -> Option<&str> {
        XmlDocument::node_value(self, id)
    }

    fn attributes_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.attributes(id).collect()
    }

    fn children_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).collect()
    }

    fn descendants_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id).collect()
    }
}
