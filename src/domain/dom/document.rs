//! Indexed, immutable view of a page snapshot.

use std::collections::HashSet;

use crate::domain::Result;

use super::{Element, ElementHandle, Node, Selector};

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeData {
    Text(String),
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        handle: Option<ElementHandle>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    parent: Option<usize>,
    children: Vec<usize>,
    data: NodeData,
}

/// A detached snapshot of a page or of one element's subtree.
///
/// Nodes are stored in document (pre-)order, so comparing two nodes'
/// [`NodeRef::position`] compares their order on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    slots: Vec<Slot>,
}

impl Document {
    /// Indexes a snapshot tree.
    #[must_use]
    pub fn from_node(node: &Node) -> Self {
        let mut doc = Self { slots: Vec::new() };
        doc.push(node, None);
        doc
    }

    fn push(&mut self, node: &Node, parent: Option<usize>) -> usize {
        let id = self.slots.len();
        let data = match node {
            Node::Text { text } => NodeData::Text(text.clone()),
            Node::Element(el) => NodeData::Element {
                tag: el.tag.to_ascii_lowercase(),
                attrs: el.attrs.clone(),
                handle: el.handle,
            },
        };
        self.slots.push(Slot {
            parent,
            children: Vec::new(),
            data,
        });
        if let Node::Element(el) = node {
            for child in &el.children {
                let child_id = self.push(child, Some(id));
                self.slots[id].children.push(child_id);
            }
        }
        id
    }

    /// The snapshot's top node.
    #[must_use]
    pub const fn root(&self) -> NodeRef<'_> {
        NodeRef { doc: self, id: 0 }
    }

    /// All elements, the root included, matching `selector` in document order.
    ///
    /// # Errors
    /// Returns an error if the selector cannot be parsed.
    pub fn select(&self, selector: &str) -> Result<Vec<NodeRef<'_>>> {
        let selector = Selector::parse(selector)?;
        Ok(std::iter::once(self.root())
            .chain(self.root().descendants())
            .filter(|n| selector.matches(*n))
            .collect())
    }

    /// First element, the root included, matching `selector`.
    ///
    /// # Errors
    /// Returns an error if the selector cannot be parsed.
    pub fn select_first(&self, selector: &str) -> Result<Option<NodeRef<'_>>> {
        Ok(self.select(selector)?.into_iter().next())
    }

    /// Locates the node standing for a live element.
    #[must_use]
    pub fn find_by_handle(&self, handle: ElementHandle) -> Option<NodeRef<'_>> {
        (0..self.slots.len())
            .map(|id| NodeRef { doc: self, id })
            .find(|n| n.handle() == Some(handle))
    }

    /// Copies the subtree under `root` into a new document, leaving out the
    /// subtrees rooted at `removed`. The source document is untouched.
    #[must_use]
    pub fn pruned(&self, root: NodeRef<'_>, removed: &[NodeRef<'_>]) -> Self {
        let removed: HashSet<usize> = removed.iter().map(|n| n.id).collect();
        let node = self
            .to_node(root.id, &removed)
            .unwrap_or_else(|| Node::text(""));
        Self::from_node(&node)
    }

    fn to_node(&self, id: usize, removed: &HashSet<usize>) -> Option<Node> {
        if removed.contains(&id) {
            return None;
        }
        let slot = &self.slots[id];
        Some(match &slot.data {
            NodeData::Text(text) => Node::text(text.clone()),
            NodeData::Element { tag, attrs, handle } => Node::Element(Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
                handle: *handle,
                children: slot
                    .children
                    .iter()
                    .filter_map(|child| self.to_node(*child, removed))
                    .collect(),
            }),
        })
    }
}

/// A node inside a [`Document`].
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: usize,
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl<'a> NodeRef<'a> {
    fn slot(&self) -> &'a Slot {
        &self.doc.slots[self.id]
    }

    fn at(&self, id: usize) -> Self {
        Self { doc: self.doc, id }
    }

    /// Position in document order.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.id
    }

    /// Whether this is an element node.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self.slot().data, NodeData::Element { .. })
    }

    /// Text of a text node.
    #[must_use]
    pub fn as_text(&self) -> Option<&'a str> {
        match &self.slot().data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    /// Lowercase tag name of an element.
    #[must_use]
    pub fn tag(&self) -> Option<&'a str> {
        match &self.slot().data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    /// Whether this element has the given (lowercase) tag.
    #[must_use]
    pub fn is(&self, tag: &str) -> bool {
        self.tag() == Some(tag)
    }

    /// Handle of the live element this node was captured from.
    #[must_use]
    pub fn handle(&self) -> Option<ElementHandle> {
        match &self.slot().data {
            NodeData::Element { handle, .. } => *handle,
            NodeData::Text(_) => None,
        }
    }

    /// Attribute value.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        match &self.slot().data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            NodeData::Text(_) => None,
        }
    }

    /// Whether the attribute is present.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Class list.
    pub fn classes(&self) -> impl Iterator<Item = &'a str> {
        self.attr("class")
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    /// Whether the class list contains `class`.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Parent node.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.slot().parent.map(|id| self.at(id))
    }

    /// Ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Self> {
        std::iter::successors(self.parent(), NodeRef::parent)
    }

    /// Child nodes, text included.
    pub fn children(&self) -> impl Iterator<Item = Self> + 'a {
        let doc = self.doc;
        self.slot()
            .children
            .iter()
            .map(move |id| NodeRef { doc, id: *id })
    }

    /// Child elements.
    pub fn element_children(&self) -> impl Iterator<Item = Self> + 'a {
        self.children().filter(NodeRef::is_element)
    }

    /// Next sibling that is an element.
    #[must_use]
    pub fn next_element_sibling(&self) -> Option<Self> {
        let parent = self.parent()?;
        parent
            .children()
            .skip_while(|sibling| sibling.id != self.id)
            .skip(1)
            .find(NodeRef::is_element)
    }

    /// All nodes below this one, in document order.
    pub fn descendants(&self) -> impl Iterator<Item = Self> + 'a {
        let doc = self.doc;
        let mut stack: Vec<usize> = self.slot().children.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(doc.slots[id].children.iter().rev().copied());
            Some(NodeRef { doc, id })
        })
    }

    /// Concatenated text of this node and its descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        if let Some(text) = self.as_text() {
            return text.to_string();
        }
        self.descendants().filter_map(|n| n.as_text()).collect()
    }

    /// Whether `other` is this node or one of its descendants.
    #[must_use]
    pub fn contains(&self, other: Self) -> bool {
        other == *self || other.ancestors().any(|a| a == *self)
    }

    /// Whether this element matches `selector`.
    ///
    /// # Errors
    /// Returns an error if the selector cannot be parsed.
    pub fn matches(&self, selector: &str) -> Result<bool> {
        Ok(Selector::parse(selector)?.matches(*self))
    }

    /// Nearest element, starting with this one, matching `selector`.
    ///
    /// # Errors
    /// Returns an error if the selector cannot be parsed.
    pub fn closest(&self, selector: &str) -> Result<Option<Self>> {
        let selector = Selector::parse(selector)?;
        Ok(std::iter::once(*self)
            .chain(self.ancestors())
            .find(|n| selector.matches(*n)))
    }

    /// Descendant elements matching `selector`, in document order.
    ///
    /// # Errors
    /// Returns an error if the selector cannot be parsed.
    pub fn select(&self, selector: &str) -> Result<Vec<Self>> {
        let selector = Selector::parse(selector)?;
        Ok(self.descendants().filter(|n| selector.matches(*n)).collect())
    }

    /// First descendant element matching `selector`.
    ///
    /// # Errors
    /// Returns an error if the selector cannot be parsed.
    pub fn select_first(&self, selector: &str) -> Result<Option<Self>> {
        let selector = Selector::parse(selector)?;
        Ok(self.descendants().find(|n| selector.matches(*n)))
    }
}
