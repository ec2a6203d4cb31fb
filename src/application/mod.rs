//! Application layer - use cases and orchestration.
//!
//! This layer contains the page and clipboard abstractions, the per-site
//! extractors and the formatting of exported conversations.

pub mod clipboard;
pub mod exporter;
pub mod extractors;
pub mod formatter;
pub mod page;
pub mod retry;
pub mod sources;
pub mod text_formatter;

pub use clipboard::{Clipboard, ClipboardBridge};
pub use exporter::Exporter;
pub use formatter::{format_options_table, format_sites_table};
pub use page::{Page, ScrollAlign};
