//! SVG serialization to compact XML.

use crate::ast::*;

/// Elements whose text children are rendered glyph runs; whitespace there is
/// significant and is written verbatim.
const TEXT_CONTENT_ELEMENTS: &[&str] = &["text", "tspan", "textPath"];

/// Serialize a Document to a compact SVG string.
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();

    if let Some(ref decl) = doc.xml_declaration {
        out.push_str("<?xml version=\"");
        out.push_str(&decl.version);
        out.push('"');
        if let Some(ref enc) = decl.encoding {
            out.push_str(" encoding=\"");
            out.push_str(enc);
            out.push('"');
        }
        if let Some(standalone) = decl.standalone {
            out.push_str(" standalone=\"");
            out.push_str(if standalone { "yes" } else { "no" });
            out.push('"');
        }
        out.push_str("?>");
    }

    if let Some(ref dt) = doc.doctype {
        out.push_str("<!DOCTYPE ");
        out.push_str(dt);
        out.push('>');
    }

    write_element(&mut out, &doc.root);

    out
}

/// Serialize a single element subtree (the equivalent of `outerHTML`).
pub fn serialize_element(elem: &Element) -> String {
    let mut out = String::new();
    write_element(&mut out, elem);
    out
}

/// Byte length of a single ` name="value"` attribute as serialized.
pub fn attribute_size(name: &str, value: &str) -> usize {
    let mut out = String::with_capacity(name.len() + value.len() + 4);
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    push_escaped_attr(&mut out, value);
    out.push('"');
    out.len()
}

fn write_element(out: &mut String, elem: &Element) {
    let name = elem.name.full_name();
    out.push('<');
    out.push_str(&name);

    for attr in &elem.attributes {
        out.push(' ');
        out.push_str(&attr.name.full_name());
        out.push_str("=\"");
        push_escaped_attr(out, &attr.value);
        out.push('"');
    }

    let verbatim_text = elem.name.prefix.is_none()
        && TEXT_CONTENT_ELEMENTS.contains(&elem.name.local.as_str());

    let mut body = String::new();
    for child in &elem.children {
        write_node(&mut body, child, verbatim_text);
    }

    if body.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        out.push_str(&body);
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
}

fn write_node(out: &mut String, node: &Node, verbatim_text: bool) {
    match node {
        Node::Element(elem) => write_element(out, elem),
        Node::Text(text) => {
            if verbatim_text {
                push_escaped_text(out, text);
            } else {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    push_escaped_text(out, trimmed);
                }
            }
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::CData(data) => {
            out.push_str("<![CDATA[");
            out.push_str(data);
            out.push_str("]]>");
        }
        Node::ProcessingInstruction { target, content } => {
            out.push_str("<?");
            out.push_str(target);
            if let Some(c) = content {
                out.push(' ');
                out.push_str(c);
            }
            out.push_str("?>");
        }
    }
}

fn push_escaped_attr(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn push_escaped_text(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
