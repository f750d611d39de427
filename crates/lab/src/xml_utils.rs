//! XML utilities using quick-xml
//!
//! A small owned DOM that can be parsed, edited and written back out. It keeps
//! element order and attribute order; comments, processing instructions and
//! the original declaration are dropped.

use color_eyre::{eyre::eyre, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::io::Cursor;

/// A builder for creating XML documents with quick-xml
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl std::fmt::Debug for XmlWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlWriter").finish_non_exhaustive()
    }
}

impl XmlWriter {
    /// Create a writer that indents nested elements by two spaces
    pub fn new_indented() -> Self {
        Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    /// Write `<?xml version="1.0" encoding="UTF-8"?>`
    pub fn write_declaration(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| eyre!("Failed to write XML declaration: {}", e))?;
        Ok(())
    }

    /// Start an XML element with attributes
    pub fn start_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut elem = BytesStart::new(name);
        for (key, value) in attributes {
            elem.push_attribute((*key, *value));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(|e| eyre!("Failed to write start element: {}", e))?;
        Ok(())
    }

    /// Write a self-closing element with attributes
    pub fn write_empty_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut elem = BytesStart::new(name);
        for (key, value) in attributes {
            elem.push_attribute((*key, *value));
        }
        self.writer
            .write_event(Event::Empty(elem))
            .map_err(|e| eyre!("Failed to write empty element: {}", e))?;
        Ok(())
    }

    /// Write text content
    pub fn write_text(&mut self, text: &str) -> Result<()> {
        if !text.is_empty() {
            self.writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| eyre!("Failed to write text: {}", e))?;
        }
        Ok(())
    }

    /// End an XML element
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(|e| eyre!("Failed to write end element: {}", e))?;
        Ok(())
    }

    /// Write `node` and its subtree
    pub fn write_node(&mut self, node: &XmlNode) -> Result<()> {
        let attrs: Vec<(&str, &str)> = node
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if node.children.is_empty() && node.text.is_empty() {
            return self.write_empty_element(&node.name, &attrs);
        }
        self.start_element(&node.name, &attrs)?;
        self.write_text(&node.text)?;
        for child in &node.children {
            self.write_node(child)?;
        }
        self.end_element(&node.name)
    }

    /// Get the generated XML as a string
    pub fn into_string(self) -> Result<String> {
        let bytes = self.writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| eyre!("Failed to convert XML to string: {}", e))
    }
}

/// Simple DOM node for XML parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    /// Element name, including any namespace prefix
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Concatenated, trimmed text content
    pub text: String,
    /// Child elements in document order
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Create an element with no attributes, text or children
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Find first element by name (recursive search, this node included)
    pub fn find(&self, element_name: &str) -> Option<&XmlNode> {
        if self.name == element_name {
            return Some(self);
        }

        for child in &self.children {
            if let Some(found) = child.find(element_name) {
                return Some(found);
            }
        }

        None
    }

    /// Mutable variant of [`XmlNode::find`]
    pub fn find_mut(&mut self, element_name: &str) -> Option<&mut XmlNode> {
        if self.name == element_name {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(element_name))
    }

    /// First direct child with this name
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Mutable variant of [`XmlNode::child`]
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Direct children with this name
    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a XmlNode> + use<'a, 'n> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Resolve a descendant path such as `["devices", "disk", "source"]`.
    ///
    /// The first step is searched anywhere below (and including) this node,
    /// later steps are direct children. Every candidate is tried in document
    /// order, so a `<disk>` without a `<source>` does not hide a later one.
    pub fn find_path(&self, path: &[&str]) -> Option<&XmlNode> {
        let (first, rest) = path.split_first()?;
        if self.name == *first {
            if let Some(found) = self.descend(rest) {
                return Some(found);
            }
        }
        self.children.iter().find_map(|c| c.find_path(path))
    }

    /// Mutable variant of [`XmlNode::find_path`]
    pub fn find_path_mut(&mut self, path: &[&str]) -> Option<&mut XmlNode> {
        let (first, rest) = path.split_first()?;
        if self.name == *first && self.descend(rest).is_some() {
            return self.descend_mut(rest);
        }
        self.children.iter_mut().find_map(|c| c.find_path_mut(path))
    }

    /// First match of `path` through direct children, backtracking over
    /// siblings with the same name
    fn descend(&self, path: &[&str]) -> Option<&XmlNode> {
        let Some((step, rest)) = path.split_first() else {
            return Some(self);
        };
        self.children_named(step).find_map(|c| c.descend(rest))
    }

    fn descend_mut(&mut self, path: &[&str]) -> Option<&mut XmlNode> {
        let Some((step, rest)) = path.split_first() else {
            return Some(self);
        };
        self.children
            .iter_mut()
            .filter(|c| c.name == *step)
            .find_map(|c| c.descend_mut(rest))
    }

    /// Attribute value
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing in place or appending
    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    /// Get text content of this node
    pub fn text_content(&self) -> &str {
        &self.text
    }

    /// Serialize this subtree with an XML declaration and indentation
    pub fn to_document_string(&self) -> Result<String> {
        let mut writer = XmlWriter::new_indented();
        writer.write_declaration()?;
        writer.write_node(self)?;
        let mut s = writer.into_string()?;
        s.push('\n');
        Ok(s)
    }
}

fn node_from_start(e: &BytesStart<'_>) -> Result<XmlNode> {
    let mut node = XmlNode::new(&String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr.map_err(|e| eyre!("Failed to parse XML attribute: {}", e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| eyre!("Failed to unescape XML attribute {key}: {}", e))?
            .into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

/// Parse XML string into a simple DOM structure
pub fn parse_xml_dom(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(node_from_start(&e)?);
            }
            Ok(Event::Empty(e)) => {
                let node = node_from_start(&e)?;
                // Add to parent or set as root
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                } else if root.is_none() {
                    root = Some(node);
                }
            }
            Ok(Event::End(_)) => {
                if let Some(completed_node) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(completed_node);
                    } else {
                        root = Some(completed_node);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| eyre!("Failed to unescape XML text: {}", e))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(eyre!("Failed to parse XML: {}", e)),
            _ => {}
        }
    }

    root.ok_or_else(|| eyre!("No root element found in XML"))
}
