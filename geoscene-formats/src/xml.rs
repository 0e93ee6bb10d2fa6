//! Generic XML element tree used by the XML based readers.
//!
//! Documents are read namespace-agnostic: [`strip_namespace_prefixes`] removes the prefixes
//! from element and attribute names first, so `<gml:Point>` and `<Point>` are the same element
//! for the readers.

use crate::error::FormatError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::{Captures, Regex};

/// Removes namespace prefixes from element and attribute names.
///
/// Local names are kept as they are. Namespace declarations (`xmlns:prefix="..."`) are left
/// untouched.
pub fn strip_namespace_prefixes(xml: String) -> String {
    lazy_static::lazy_static! {
        static ref ELEMENT_PREFIX: Regex =
            Regex::new(r"<(/?)[A-Za-z_][\w.\-]*:([A-Za-z_])").expect("valid regex");
        static ref ATTRIBUTE_PREFIX: Regex =
            Regex::new(r"(\s)([A-Za-z_][\w.\-]*):([A-Za-z_][\w.\-]*\s*=)").expect("valid regex");
    }

    let without_elements = ELEMENT_PREFIX.replace_all(&xml, "<$1$2");
    let stripped = ATTRIBUTE_PREFIX.replace_all(&without_elements, |caps: &Captures| {
        if &caps[2] == "xmlns" {
            caps[0].to_string()
        } else {
            format!("{}{}", &caps[1], &caps[3])
        }
    });

    stripped.into_owned()
}

/// Returns the name of the root element without parsing the whole document.
pub fn root_name(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => return Some(element_name(&e)),
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Element of a parsed XML document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Element name, as written in the document.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
    /// Concatenated text and CDATA content of the element itself.
    pub text: String,
}

impl XmlElement {
    /// Parses the document and returns its root element.
    pub fn parse(xml: &str) -> Result<XmlElement, FormatError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = vec![];
        let mut root = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                FormatError::Xml(format!("{e} at position {}", reader.buffer_position()))
            })?;

            match event {
                Event::Start(e) => stack.push(Self::from_start(&e)?),
                Event::Empty(e) => {
                    let element = Self::from_start(&e)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| FormatError::Xml("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| FormatError::Xml(e.to_string()))?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(FormatError::Xml("unclosed elements at end of document".into()));
        }

        root.ok_or_else(|| FormatError::Xml("document has no root element".into()))
    }

    fn from_start(start: &BytesStart) -> Result<Self, FormatError> {
        let mut attributes = vec![];
        let mut attrs = start.attributes();
        attrs.with_checks(false);
        for attr in attrs {
            let attr = attr.map_err(|e| FormatError::Xml(e.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| FormatError::Xml(e.to_string()))?;
            attributes.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                value.into_owned(),
            ));
        }

        Ok(Self {
            name: element_name(start),
            attributes,
            children: vec![],
            text: String::new(),
        })
    }

    /// Value of the attribute with the given name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(XmlElement::text)
    }

    /// Trimmed text content of the element.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// True if the element has no child elements.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// All descendants in depth-first document order, not including the element itself.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut result = vec![];
        let mut stack: Vec<&XmlElement> = self.children.iter().rev().collect();
        while let Some(element) = stack.pop() {
            result.push(element);
            stack.extend(element.children.iter().rev());
        }

        result
    }

    /// First descendant for which the predicate returns true.
    pub fn find(&self, predicate: impl Fn(&XmlElement) -> bool) -> Option<&XmlElement> {
        self.descendants().into_iter().find(|e| predicate(e))
    }
}

fn element_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}
