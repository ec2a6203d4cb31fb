//! Domain layer - core types for exported conversations.
//!
//! This layer contains pure domain models, the page snapshot model and error
//! types without any browser or filesystem access.

pub mod dom;
pub mod error;
pub mod models;
pub mod options;
pub mod site;

pub use error::{AppError, Result};
pub use models::{ChatContent, ExportFormat, ExtractionOutcome, Message, Role, Transcript};
pub use options::{Options, OptionsPatch};
pub use site::{detect_site, Site};
