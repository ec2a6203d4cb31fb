//! Infrastructure layer - external adapters (browser, clipboard, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod cdp;
pub mod clipboard;
pub mod config;
pub mod file_output;
pub mod page_script;

pub use cdp::{list_targets, select_target, CdpPage};
pub use clipboard::SystemClipboard;
#[cfg(test)]
pub use config::MemoryOptionsStore;
pub use config::{OptionsStore, TomlOptionsStore};
pub use file_output::{file_type_for, save_export};
