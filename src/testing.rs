//! In-memory page and clipboard used by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::application::{Clipboard, Page, ScrollAlign};
use crate::domain::dom::{Document, Element, ElementHandle, Node};
use crate::domain::{AppError, Result};

type Reaction = Box<dyn FnMut(&mut FakeState) + Send>;

/// Mutable state behind a [`FakePage`].
pub struct FakeState {
    pub url: String,
    pub root: Element,
    pub clipboard: String,
    pub clicks: Vec<ElementHandle>,
    pub scrolls: Vec<(ElementHandle, ScrollAlign)>,
    pub keys: Vec<(ElementHandle, String)>,
    pub scroll_tops: HashMap<ElementHandle, f64>,
    next_handle: u64,
}

impl FakeState {
    fn assign_handles(&mut self) {
        let mut next = self.next_handle;
        assign(&mut self.root, &mut next);
        self.next_handle = next;
    }

    /// Element by handle.
    pub fn element_mut(&mut self, handle: ElementHandle) -> &mut Element {
        self.root
            .find_mut(handle)
            .unwrap_or_else(|| panic!("no element {handle}"))
    }

    /// Appends `child` to the element `parent`.
    pub fn insert(&mut self, parent: ElementHandle, child: Element) {
        self.element_mut(parent).children.push(Node::from(child));
        self.assign_handles();
    }

    /// Appends `child` to the first element matching `selector`.
    pub fn insert_into(&mut self, selector: &str, child: Element) {
        let parent = first_handle(&self.root, selector);
        self.insert(parent, child);
    }

    /// Removes the first element matching `selector`, if any.
    pub fn remove_first(&mut self, selector: &str) {
        let doc = Document::from_node(&Node::Element(self.root.clone()));
        let handle = doc
            .select_first(selector)
            .unwrap()
            .and_then(|n| n.handle());
        if let Some(handle) = handle {
            remove(&mut self.root, handle);
        }
    }

    /// Sets an attribute on an element.
    pub fn set_attr(&mut self, handle: ElementHandle, name: &str, value: &str) {
        self.element_mut(handle).set_attr(name, value);
    }
}

fn assign(element: &mut Element, next: &mut u64) {
    if element.handle.is_none() {
        *next += 1;
        element.handle = Some(ElementHandle(*next));
    }
    for child in &mut element.children {
        if let Node::Element(el) = child {
            assign(el, next);
        }
    }
}

fn remove(element: &mut Element, handle: ElementHandle) -> bool {
    let before = element.children.len();
    element
        .children
        .retain(|c| !matches!(c, Node::Element(el) if el.handle == Some(handle)));
    if element.children.len() != before {
        return true;
    }
    element.children.iter_mut().any(|c| match c {
        Node::Element(el) => remove(el, handle),
        Node::Text { .. } => false,
    })
}

fn first_handle(root: &Element, selector: &str) -> ElementHandle {
    let doc = Document::from_node(&Node::Element(root.clone()));
    doc.select_first(selector)
        .unwrap()
        .and_then(|n| n.handle())
        .unwrap_or_else(|| panic!("nothing matches {selector}"))
}

/// Scriptable in-memory page.
///
/// The body passed to [`FakePage::new`] is wrapped in an `<html>` root and
/// every element gets a handle. Click reactions can mutate the DOM and the
/// shared clipboard.
#[derive(Clone)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
    reactions: Arc<Mutex<HashMap<ElementHandle, Reaction>>>,
}

impl FakePage {
    pub fn new(url: &str, body: Element) -> Self {
        let mut state = FakeState {
            url: url.to_string(),
            root: Element::new("html").with_child(body),
            clipboard: String::new(),
            clicks: Vec::new(),
            scrolls: Vec::new(),
            keys: Vec::new(),
            scroll_tops: HashMap::new(),
            next_handle: 0,
        };
        state.assign_handles();
        Self {
            state: Arc::new(Mutex::new(state)),
            reactions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Handle of the first element matching `selector`.
    pub fn handle_of(&self, selector: &str) -> ElementHandle {
        first_handle(&self.state().root, selector)
    }

    /// Handles of all elements matching `selector`.
    pub fn handles_of(&self, selector: &str) -> Vec<ElementHandle> {
        let doc = Document::from_node(&Node::Element(self.state().root.clone()));
        doc.select(selector)
            .unwrap()
            .into_iter()
            .filter_map(|n| n.handle())
            .collect()
    }

    /// Runs `reaction` every time the element is clicked.
    pub fn on_click(
        &self,
        handle: ElementHandle,
        reaction: impl FnMut(&mut FakeState) + Send + 'static,
    ) {
        self.reactions
            .lock()
            .unwrap()
            .insert(handle, Box::new(reaction));
    }

    pub fn clicks(&self) -> Vec<ElementHandle> {
        self.state().clicks.clone()
    }

    pub fn clipboard(&self) -> String {
        self.state().clipboard.clone()
    }

    fn existing(&self, handle: ElementHandle) -> Result<()> {
        if self.state().root.find(handle).is_some() {
            Ok(())
        } else {
            Err(AppError::page(format!("element {handle} is detached")))
        }
    }
}

#[async_trait]
impl Page for FakePage {
    async fn url(&self) -> Result<String> {
        Ok(self.state().url.clone())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let doc = self.document().await?;
        Ok(doc
            .select(selector)?
            .into_iter()
            .filter_map(|n| n.handle())
            .collect())
    }

    async fn document(&self) -> Result<Document> {
        Ok(Document::from_node(&Node::Element(self.state().root.clone())))
    }

    async fn snapshot(&self, element: ElementHandle) -> Result<Document> {
        let state = self.state();
        let el = state
            .root
            .find(element)
            .ok_or_else(|| AppError::page(format!("element {element} is detached")))?;
        Ok(Document::from_node(&Node::Element(el.clone())))
    }

    async fn closest(&self, element: ElementHandle, selector: &str) -> Result<Option<ElementHandle>> {
        let doc = self.document().await?;
        let node = doc
            .find_by_handle(element)
            .ok_or_else(|| AppError::page(format!("element {element} is detached")))?;
        Ok(node.closest(selector)?.and_then(|n| n.handle()))
    }

    async fn click(&self, element: ElementHandle) -> Result<()> {
        self.existing(element)?;
        let mut state = self.state();
        state.clicks.push(element);
        if let Some(reaction) = self.reactions.lock().unwrap().get_mut(&element) {
            reaction(&mut state);
            state.assign_handles();
        }
        Ok(())
    }

    async fn scroll_into_view(&self, element: ElementHandle, align: ScrollAlign) -> Result<()> {
        self.existing(element)?;
        self.state().scrolls.push((element, align));
        Ok(())
    }

    async fn scroll_top(&self, element: ElementHandle) -> Result<f64> {
        self.existing(element)?;
        Ok(self
            .state()
            .scroll_tops
            .get(&element)
            .copied()
            .unwrap_or_default())
    }

    async fn set_scroll_top(&self, element: ElementHandle, top: f64) -> Result<()> {
        self.existing(element)?;
        self.state().scroll_tops.insert(element, top);
        Ok(())
    }

    async fn press_key(&self, element: ElementHandle, key: &str) -> Result<()> {
        self.existing(element)?;
        self.state().keys.push((element, key.to_string()));
        Ok(())
    }
}

/// Clipboard sharing its contents with a [`FakePage`].
pub struct FakeClipboard {
    state: Arc<Mutex<FakeState>>,
}

impl FakeClipboard {
    pub fn new(page: &FakePage) -> Self {
        Self {
            state: Arc::clone(&page.state),
        }
    }
}

#[async_trait]
impl Clipboard for FakeClipboard {
    async fn read_text(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().clipboard.clone())
    }

    async fn write_text(&self, text: &str) -> Result<()> {
        self.state.lock().unwrap().clipboard = text.to_string();
        Ok(())
    }
}
