//! Nested node tree as produced by a page snapshot.
//!
//! This is the wire shape: the page serializer emits it as JSON and
//! [`super::Document`] turns it into an indexed tree for querying.

use serde::{Deserialize, Serialize};

/// Opaque reference to a live element in the page being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub u64);

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A snapshot node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// Literal text.
    Text { text: String },
    /// An element with its attributes and children.
    Element(Element),
}

/// A snapshot element.
///
/// `href` and `src` attributes hold resolved absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Tag name; normalized to lowercase when indexed.
    pub tag: String,
    /// Attributes in source order.
    #[serde(default)]
    pub attrs: Vec<(String, String)>,
    /// Live counterpart, when the snapshot came from a drivable page.
    #[serde(default)]
    pub handle: Option<ElementHandle>,
    /// Child nodes in document order.
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    /// Creates a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl Element {
    /// Creates an element with no attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            handle: None,
            children: Vec::new(),
        }
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets or replaces an attribute.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    /// Builder: adds an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: appends a class to the `class` attribute.
    #[must_use]
    pub fn with_class(mut self, class: &str) -> Self {
        let merged = match self.attr("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr("class", merged);
        self
    }

    /// Builder: appends a child node.
    #[must_use]
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Builder: appends a text child.
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::text(text))
    }

    /// Finds an element in this subtree by handle.
    pub fn find_mut(&mut self, handle: ElementHandle) -> Option<&mut Self> {
        if self.handle == Some(handle) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| match child {
            Node::Element(el) => el.find_mut(handle),
            Node::Text { .. } => None,
        })
    }

    /// Finds an element in this subtree by handle.
    #[must_use]
    pub fn find(&self, handle: ElementHandle) -> Option<&Self> {
        if self.handle == Some(handle) {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            Node::Element(el) => el.find(handle),
            Node::Text { .. } => None,
        })
    }
}
