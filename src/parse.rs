//! SVG parsing from XML.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::ast::*;
use crate::error::SvgcrushError;

/// Parse an SVG string into a Document.
///
/// Comments, whitespace and processing instructions outside the root element
/// are dropped. Inside the root they are kept as nodes so later passes decide
/// their fate.
pub fn parse_svg(svg: &str) -> Result<Document, SvgcrushError> {
    let mut reader = Reader::from_str(svg);

    let mut xml_declaration = None;
    let mut doctype = None;
    let mut root: Option<Element> = None;
    let mut open: Vec<Element> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Decl(decl) if open.is_empty() => {
                xml_declaration = Some(XmlDeclaration {
                    version: String::from_utf8_lossy(decl.version()?.as_ref()).into_owned(),
                    encoding: decl
                        .encoding()
                        .transpose()
                        .ok()
                        .flatten()
                        .map(|e| String::from_utf8_lossy(e.as_ref()).into_owned()),
                    standalone: decl.standalone().transpose().ok().flatten().map(|s| {
                        let s = String::from_utf8_lossy(s.as_ref());
                        s == "yes"
                    }),
                });
            }
            Event::DocType(dt) => {
                doctype = Some(String::from_utf8_lossy(&dt).trim().to_string());
            }
            Event::Start(start) => {
                if open.is_empty() && root.is_some() {
                    return Err(SvgcrushError::InvalidSvg("Multiple root elements".into()));
                }
                open.push(parse_element_start(&start)?);
            }
            Event::Empty(start) => {
                let element = parse_element_start(&start)?;
                attach(&mut open, &mut root, element)?;
            }
            Event::End(_) => {
                let element = open
                    .pop()
                    .ok_or_else(|| SvgcrushError::InvalidSvg("Unbalanced end tag".into()))?;
                attach(&mut open, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(parent) = open.last_mut() {
                    let text = text.unescape()?;
                    if !text.trim().is_empty() || !parent.children.is_empty() {
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
            }
            Event::Comment(comment) => {
                if let Some(parent) = open.last_mut() {
                    parent
                        .children
                        .push(Node::Comment(String::from_utf8_lossy(&comment).into_owned()));
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = open.last_mut() {
                    parent
                        .children
                        .push(Node::CData(String::from_utf8_lossy(&cdata).into_owned()));
                }
            }
            Event::PI(pi) => {
                if let Some(parent) = open.last_mut() {
                    let content = String::from_utf8_lossy(&pi).into_owned();
                    let (target, rest) = content
                        .split_once(char::is_whitespace)
                        .map(|(t, r)| (t.to_string(), Some(r.to_string())))
                        .unwrap_or_else(|| (content, None));
                    parent
                        .children
                        .push(Node::ProcessingInstruction { target, content: rest });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(SvgcrushError::InvalidSvg("Unexpected end of file".into()));
    }

    let root = root.ok_or_else(|| SvgcrushError::InvalidSvg("No root element found".into()))?;

    Ok(Document {
        xml_declaration,
        doctype,
        root,
    })
}

fn attach(
    open: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), SvgcrushError> {
    match open.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_some() => {
            return Err(SvgcrushError::InvalidSvg("Multiple root elements".into()));
        }
        None => *root = Some(element),
    }
    Ok(())
}

fn parse_element_start(start: &BytesStart) -> Result<Element, SvgcrushError> {
    let name_bytes = start.name();
    let name = std::str::from_utf8(name_bytes.as_ref())?;

    let mut element = Element {
        name: QName::parse(name),
        attributes: Vec::new(),
        children: Vec::new(),
    };

    for attr in start.attributes() {
        let attr =
            attr.map_err(|e| SvgcrushError::InvalidSvg(format!("Invalid attribute: {}", e)))?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = attr.unescape_value()?;
        element.attributes.push(Attribute {
            name: QName::parse(key),
            value: value.into_owned(),
        });
    }

    Ok(element)
}
