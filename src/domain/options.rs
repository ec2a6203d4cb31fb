//! User options and their persisted shape.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ExportFormat;

/// Persisted user options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Preferred export format identifier.
    ///
    /// Kept as a raw string so values written by other versions survive a
    /// load/save cycle; see [`Options::export_format`].
    #[serde(default = "default_export_type")]
    pub export_type: String,

    /// Restore the clipboard after `save`/`print` exports.
    #[serde(default = "default_true")]
    pub restore_clipboard: bool,

    /// Wrap pasted file attachments in code fences.
    #[serde(default = "default_true")]
    pub fence_pasted_files: bool,

    /// DevTools HTTP endpoint of the browser to attach to.
    #[serde(default = "default_cdp_url")]
    pub cdp_url: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            export_type: default_export_type(),
            restore_clipboard: default_true(),
            fence_pasted_files: default_true(),
            cdp_url: default_cdp_url(),
        }
    }
}

fn default_export_type() -> String {
    ExportFormat::Markdown.as_str().to_string()
}

const fn default_true() -> bool {
    true
}

fn default_cdp_url() -> String {
    "http://127.0.0.1:9222".to_string()
}

impl Options {
    /// Resolved export format; unknown identifiers fall back to Markdown.
    #[must_use]
    pub fn export_format(&self) -> ExportFormat {
        ExportFormat::resolve(&self.export_type)
    }

    /// Applies a partial update.
    pub fn apply(&mut self, patch: OptionsPatch) {
        if let Some(export_type) = patch.export_type {
            self.export_type = export_type;
        }
        if let Some(restore) = patch.restore_clipboard {
            self.restore_clipboard = restore;
        }
        if let Some(fence) = patch.fence_pasted_files {
            self.fence_pasted_files = fence;
        }
        if let Some(url) = patch.cdp_url {
            self.cdp_url = url;
        }
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chat-export")
    }

    /// Get the default options file path.
    #[must_use]
    pub fn default_file_path() -> PathBuf {
        Self::default_data_dir().join("options.toml")
    }
}

/// Partial update for [`Options`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsPatch {
    pub export_type: Option<String>,
    pub restore_clipboard: Option<bool>,
    pub fence_pasted_files: Option<bool>,
    pub cdp_url: Option<String>,
}
