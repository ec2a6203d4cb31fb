//! Page snapshot model: nested wire nodes, an indexed document view and a
//! CSS selector subset for querying it.

pub mod document;
pub mod node;
pub mod selector;

pub use document::{Document, NodeRef};
pub use node::{Element, ElementHandle, Node};
pub use selector::Selector;
