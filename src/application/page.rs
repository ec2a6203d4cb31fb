//! Capability interface over the live page being exported.

use async_trait::async_trait;

use crate::domain::dom::{Document, ElementHandle};
use crate::domain::Result;

/// Vertical alignment when scrolling an element into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAlign {
    Start,
    Center,
    End,
}

impl ScrollAlign {
    /// Value of `scrollIntoView`'s `block` option.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Center => "center",
            Self::End => "end",
        }
    }
}

/// A drivable page.
///
/// Reads go through detached [`Document`] snapshots; every element in a
/// snapshot carries the [`ElementHandle`] of its live counterpart so it can
/// be clicked or scrolled afterwards.
#[async_trait]
pub trait Page: Send + Sync {
    /// Current URL of the page.
    async fn url(&self) -> Result<String>;

    /// Live elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// Snapshot of the whole document.
    async fn document(&self) -> Result<Document>;

    /// Snapshot of one element's subtree.
    async fn snapshot(&self, element: ElementHandle) -> Result<Document>;

    /// Nearest live element, starting with `element` itself, matching
    /// `selector`.
    async fn closest(&self, element: ElementHandle, selector: &str) -> Result<Option<ElementHandle>>;

    /// Dispatches a click on the element.
    async fn click(&self, element: ElementHandle) -> Result<()>;

    /// Scrolls the element into the viewport.
    async fn scroll_into_view(&self, element: ElementHandle, align: ScrollAlign) -> Result<()>;

    /// Current `scrollTop` of a scroll container.
    async fn scroll_top(&self, element: ElementHandle) -> Result<f64>;

    /// Sets `scrollTop` of a scroll container.
    async fn set_scroll_top(&self, element: ElementHandle, top: f64) -> Result<()>;

    /// Dispatches a `keydown` event for `key` on the element.
    async fn press_key(&self, element: ElementHandle, key: &str) -> Result<()>;

    /// First live element matching `selector`.
    async fn query_first(&self, selector: &str) -> Result<Option<ElementHandle>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }
}
