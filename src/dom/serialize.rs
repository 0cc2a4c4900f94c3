//! Document serialization
//!
//! Writes a document back to text. Text and attribute values are written
//! from their raw form, so anything a mutation did not touch comes out as it
//! was read, entity references included. Layout rules:
//!
//! - the XML declaration and DOCTYPE are written verbatim, and only if the
//!   input had them
//! - every top-level node is followed by a newline
//! - attributes are separated by a single space and keep their quote
//! - elements without children are written as `<name/>`
//!
//! Serializing a document parsed from serializer output reproduces that
//! output exactly.

use super::document::XmlDocument;
use super::node::{NodeId, NodeKind};

/// Serialize a whole document
pub fn serialize(doc: &XmlDocument<'_>) -> String {
    let mut buf = String::with_capacity(doc.input().len() + 64);

    if let Some(decl) = doc.declaration() {
        buf.push_str(decl);
        buf.push('\n');
    }

    let doctype = doc.doctype();
    for (index, child) in doc.children(0).enumerate() {
        if let Some((raw, preceding)) = doctype {
            if preceding == index {
                buf.push_str(raw);
                buf.push('\n');
            }
        }
        serialize_node(doc, child, &mut buf);
        buf.push('\n');
    }

    buf
}

/// Serialize one node and its subtree into `buf`
///
/// Uses an explicit stack so deeply nested configs cannot overflow.
pub fn serialize_node(doc: &XmlDocument<'_>, node_id: NodeId, buf: &mut String) {
    // Either entering a node or writing its closing tag
    enum StackEntry {
        Enter(NodeId),
        Close(NodeId),
    }

    let mut stack: Vec<StackEntry> = Vec::with_capacity(64);
    stack.push(StackEntry::Enter(node_id));

    while let Some(entry) = stack.pop() {
        match entry {
            StackEntry::Close(id) => {
                buf.push_str("</");
                buf.push_str(doc.node_name(id).unwrap_or(""));
                buf.push('>');
            }
            StackEntry::Enter(current_id) => {
                let Some(node) = doc.get_node(current_id) else {
                    continue;
                };

                match node.kind {
                    NodeKind::Element => {
                        buf.push('<');
                        buf.push_str(doc.node_name(current_id).unwrap_or(""));

                        for attr in doc.attribute_nodes(current_id) {
                            let quote = doc.get_node(attr).map_or('"', |a| a.quote as char);
                            buf.push(' ');
                            buf.push_str(doc.node_name(attr).unwrap_or(""));
                            buf.push('=');
                            buf.push(quote);
                            buf.push_str(doc.node_raw(attr));
                            buf.push(quote);
                        }

                        if node.first_child.is_none() {
                            buf.push_str("/>");
                        } else {
                            buf.push('>');
                            stack.push(StackEntry::Close(current_id));

                            // Push children in reverse order using last_child->prev_sibling
                            let mut child_id = node.last_child;
                            while let Some(cid) = child_id {
                                stack.push(StackEntry::Enter(cid));
                                child_id = doc.get_node(cid).and_then(|n| n.prev_sibling);
                            }
                        }
                    }
                    NodeKind::Text => buf.push_str(doc.node_raw(current_id)),
                    NodeKind::CData => write_cdata(doc.node_raw(current_id), buf),
                    NodeKind::Comment => {
                        buf.push_str("<!--");
                        buf.push_str(doc.node_raw(current_id));
                        buf.push_str("-->");
                    }
                    NodeKind::ProcessingInstruction => {
                        buf.push_str("<?");
                        buf.push_str(doc.node_name(current_id).unwrap_or(""));
                        let data = doc.node_raw(current_id);
                        if !data.is_empty() {
                            buf.push(' ');
                            buf.push_str(data);
                        }
                        buf.push_str("?>");
                    }
                    NodeKind::Document => {
                        let mut child_id = node.last_child;
                        while let Some(cid) = child_id {
                            stack.push(StackEntry::Enter(cid));
                            child_id = doc.get_node(cid).and_then(|n| n.prev_sibling);
                        }
                    }
                    // Written with their element
                    NodeKind::Attribute | NodeKind::NamespaceDecl => {}
                }
            }
        }
    }
}

/// Write a CDATA section, splitting it wherever the content holds `]]>`
fn write_cdata(content: &str, buf: &mut String) {
    buf.push_str("<![CDATA[");
    buf.push_str(&content.replace("]]>", "]]]]><![CDATA[>"));
    buf.push_str("]]>");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) -> String {
        serialize(&XmlDocument::parse(input).unwrap())
    }

    #[test]
    fn test_untouched_document() {
        let input = "<?xml version='1.1' encoding='UTF-8'?>\n<project>\n  <description>a &amp; b &nbsp;</description>\n  <keep v='x &lt; y'/>\n</project>\n";
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_layout_normalized() {
        assert_eq!(roundtrip("<a  x = \"1\"\n  y='2' ></a  >"), "<a x=\"1\" y='2'/>\n");
    }

    #[test]
    fn test_top_level_nodes() {
        let out = roundtrip("<!--head-->  <!DOCTYPE a>\n<?pi   go?><a/><!--tail-->");
        assert_eq!(out, "<!--head-->\n<!DOCTYPE a>\n<?pi go?>\n<a/>\n<!--tail-->\n");
    }

    #[test]
    fn test_mutated_cdata() {
        let mut doc = XmlDocument::parse("<a><![CDATA[x]]><![CDATA[y]]></a>").unwrap();
        let mut sections = doc.children(doc.root_element_id().unwrap());
        let (first, second) = (sections.next().unwrap(), sections.next().unwrap());
        doc.set_node_value(first, "<kept>");
        doc.set_node_value(second, "p]]>q");
        let out = serialize(&doc);
        assert_eq!(out, "<a><![CDATA[<kept>]]>p]]&gt;q</a>\n");
        assert_eq!(roundtrip(&out), out);
    }

    #[test]
    fn test_mutated_comment_and_pi_reparse() {
        let mut doc = XmlDocument::parse("<a><!--c--><?t d?></a>").unwrap();
        let mut children = doc.children(doc.root_element_id().unwrap());
        let (comment, pi) = (children.next().unwrap(), children.next().unwrap());
        doc.set_node_value(comment, "a--b-");
        doc.set_node_value(pi, " x?>y");
        let out = serialize(&doc);
        assert_eq!(out, "<a><!--a- -b- --><?t x? >y?></a>\n");

        let reparsed = XmlDocument::parse(&out).unwrap();
        let mut children = reparsed.children(reparsed.root_element_id().unwrap());
        assert_eq!(reparsed.node_value(children.next().unwrap()), Some("a- -b- "));
        assert_eq!(reparsed.node_value(children.next().unwrap()), Some("x? >y"));
        assert_eq!(serialize(&reparsed), out);
    }

    #[test]
    fn test_mutated_values_escaped() {
        let mut doc = XmlDocument::parse("<a k='1'>t</a>").unwrap();
        let root = doc.root_element_id().unwrap();
        let attr = doc.attributes(root).next().unwrap();
        doc.set_node_value(attr, "a'b\"c");
        doc.set_node_value(root, "<&>");
        let out = serialize(&doc);
        assert_eq!(out, "<a k=\"a'b&quot;c\">&lt;&amp;&gt;</a>\n");
        assert_eq!(roundtrip(&out), out);
    }

    #[test]
    fn test_serializer_is_fixpoint() {
        let once = roundtrip("<?xml version=\"1.0\"?><r xmlns:p='urn:p'>\n <p:x a=\"1\"></p:x><![CDATA[c]]><?t d?></r>");
        assert_eq!(roundtrip(&once), once);
    }
}
