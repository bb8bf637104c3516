//! Minimal XML document model for apply-group extraction.
//!
//! Fragments handled by the batch engine are frequently sequences of
//! sibling elements (a `<groups>` definition followed by its `<apply-groups>`
//! reference), which a strict XML reader rejects. Input is therefore parsed
//! inside a synthetic root element, and queries never see that root.

use std::collections::BTreeSet;

use xml::attribute::OwnedAttribute;
use xml::escape::{escape_str_attribute, escape_str_pcdata};
use xml::name::OwnedName;
use xml::namespace::{Namespace, NS_EMPTY_URI, NS_NO_PREFIX, NS_XMLNS_PREFIX, NS_XML_PREFIX};
use xml::reader::XmlEvent;
use xml::ParserConfig;

use crate::error::{ParseError, ParseResult};

const SYNTHETIC_ROOT: &str = "ncbatch-fragment";

/// Element holding an apply-group definition.
pub const GROUPS_ELEMENT: &str = "groups";

/// Element naming a group inside its definition.
pub const NAME_ELEMENT: &str = "name";

/// Element referencing an apply-group from the configuration.
pub const APPLY_GROUPS_ELEMENT: &str = "apply-groups";

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Element {
    name: OwnedName,
    attributes: Vec<OwnedAttribute>,
    namespace: Namespace,
    children: Vec<Node>,
}

impl Element {
    fn is(&self, local_name: &str) -> bool {
        self.name.local_name == local_name
    }

    fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    fn inner_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => element.collect_text(out),
            }
        }
    }

    /// Depth-first, document-order search for the first element named
    /// `local_name` below this one.
    fn find_first(&self, local_name: &str) -> Option<&Element> {
        for child in self.child_elements() {
            if child.is(local_name) {
                return Some(child);
            }
            if let Some(found) = child.find_first(local_name) {
                return Some(found);
            }
        }
        None
    }

    /// Prefixes bound by element or attribute names in this subtree.
    fn collect_prefixes<'a>(&'a self, prefixes: &mut BTreeSet<&'a str>) {
        prefixes.extend(self.name.prefix.as_deref());
        prefixes.extend(
            self.attributes
                .iter()
                .filter_map(|attribute| attribute.name.prefix.as_deref()),
        );
        for child in self.child_elements() {
            child.collect_prefixes(prefixes);
        }
    }

    fn write(&self, out: &mut String, parent_namespace: &Namespace, carried: &BTreeSet<&str>) {
        let name = qualified_name(&self.name);
        out.push('<');
        out.push_str(&name);
        write_namespace_declarations(out, &self.namespace, parent_namespace, carried);
        for attribute in &self.attributes {
            out.push(' ');
            out.push_str(&qualified_name(&attribute.name));
            out.push_str("=\"");
            out.push_str(&escape_str_attribute(&attribute.value));
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(&escape_str_pcdata(text)),
                Node::Element(element) => element.write(out, &self.namespace, &BTreeSet::new()),
            }
        }
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }

    /// Serializes this element as a standalone subtree of `parent`.
    ///
    /// Bindings inherited from the parent are dropped, except prefixed ones
    /// the subtree uses, which it needs to parse on its own.
    fn to_xml(&self, parent_namespace: &Namespace) -> String {
        let mut carried = BTreeSet::new();
        self.collect_prefixes(&mut carried);
        let mut out = String::new();
        self.write(&mut out, parent_namespace, &carried);
        out
    }
}

fn qualified_name(name: &OwnedName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local_name),
        None => name.local_name.clone(),
    }
}

/// Emits the namespace bindings of an element that its parent does not
/// already provide, plus the inherited prefixed bindings in `carried`.
fn write_namespace_declarations(
    out: &mut String,
    namespace: &Namespace,
    parent_namespace: &Namespace,
    carried: &BTreeSet<&str>,
) {
    for (prefix, uri) in &namespace.0 {
        if prefix == NS_XML_PREFIX || prefix == NS_XMLNS_PREFIX {
            continue;
        }
        let parent_uri = parent_namespace.0.get(prefix);
        if parent_uri == Some(uri) {
            if prefix == NS_NO_PREFIX || !carried.contains(prefix.as_str()) {
                continue;
            }
        } else if parent_uri.is_none() && prefix == NS_NO_PREFIX && uri == NS_EMPTY_URI {
            continue;
        }

        if prefix == NS_NO_PREFIX {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        out.push_str(&escape_str_attribute(uri));
        out.push('"');
    }
}

fn strip_declaration(text: &str) -> &str {
    let trimmed = text.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    text
}

/// A group definition found in a device document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefinition {
    /// Apply-group name.
    pub name: String,
    /// The owning `<groups>` element serialized back to text.
    pub fragment: String,
}

/// A parsed configuration document or fragment.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parses a document or a sequence of sibling fragments.
    pub fn parse(text: &str) -> ParseResult<Self> {
        let wrapped = format!(
            "<{SYNTHETIC_ROOT}>{}</{SYNTHETIC_ROOT}>",
            strip_declaration(text)
        );
        let reader = ParserConfig::new().create_reader(wrapped.as_bytes());

        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;
        for event in reader {
            match event.map_err(ParseError::malformed)? {
                XmlEvent::StartElement {
                    name,
                    attributes,
                    namespace,
                } => stack.push(Element {
                    name,
                    attributes,
                    namespace,
                    children: Vec::new(),
                }),
                XmlEvent::EndElement { .. } => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ParseError::malformed("unbalanced end element"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                }
                XmlEvent::Characters(text) | XmlEvent::CData(text) | XmlEvent::Whitespace(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text));
                    }
                }
                _ => {}
            }
        }

        let root = root.ok_or_else(|| ParseError::malformed("document has no root element"))?;
        Ok(Self { root })
    }

    /// Returns every `groups/name` pair in document order, paired with the
    /// serialized `<groups>` element that owns the name.
    ///
    /// A `<groups>` element with several `<name>` children yields one entry
    /// per name, each carrying the whole element.
    pub fn group_definitions(&self) -> Vec<GroupDefinition> {
        let mut found = Vec::new();
        collect_group_definitions(&self.root, &mut found);
        found
    }

    /// Returns the text of the first `apply-groups` element, trimmed.
    pub fn apply_group_name(&self) -> ParseResult<String> {
        let element = self
            .root
            .find_first(APPLY_GROUPS_ELEMENT)
            .ok_or(ParseError::MissingElement {
                element: APPLY_GROUPS_ELEMENT,
            })?;
        let name = element.inner_text().trim().to_string();
        if name.is_empty() {
            return Err(ParseError::EmptyElement {
                element: APPLY_GROUPS_ELEMENT,
            });
        }
        Ok(name)
    }
}

fn collect_group_definitions(element: &Element, found: &mut Vec<GroupDefinition>) {
    for child in element.child_elements() {
        if child.is(GROUPS_ELEMENT) {
            let names: Vec<_> = child
                .child_elements()
                .filter(|grandchild| grandchild.is(NAME_ELEMENT))
                .map(|name| name.inner_text())
                .collect();
            if !names.is_empty() {
                let fragment = child.to_xml(&element.namespace);
                found.extend(names.into_iter().map(|name| GroupDefinition {
                    name,
                    fragment: fragment.clone(),
                }));
            }
        }
        collect_group_definitions(child, found);
    }
}

/// Extracts the apply-group name a fragment refers to.
pub fn find_apply_group_name(fragment: &str) -> ParseResult<String> {
    Document::parse(fragment)?.apply_group_name()
}
