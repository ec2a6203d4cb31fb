//! Options file management.
//!
//! Handles loading and saving the TOML options file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppError, Options, OptionsPatch, Result};

/// Default options file content.
pub const DEFAULT_OPTIONS: &str = r#"# chat-export options
# Auto-generated - edit as needed

# Export format: markdown, json, xml or html
export_type = "markdown"

# Put the original clipboard back after `save` and `print`
restore_clipboard = true

# Wrap attached file contents in code fences
fence_pasted_files = true

# DevTools endpoint of the browser to attach to
cdp_url = "http://127.0.0.1:9222"
"#;

/// Persistent store for user options.
pub trait OptionsStore: Send + Sync {
    /// All options, with defaults for anything not stored.
    ///
    /// # Errors
    /// Returns error if stored options exist but cannot be read.
    fn get_all(&self) -> Result<Options>;

    /// Applies a partial update and returns the resulting options.
    ///
    /// # Errors
    /// Returns error if the options cannot be read or written.
    fn set(&self, patch: OptionsPatch) -> Result<Options>;
}

/// Options stored as a TOML file.
#[derive(Debug, Clone)]
pub struct TomlOptionsStore {
    path: PathBuf,
}

impl TomlOptionsStore {
    /// Store backed by the file at `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at `~/.chat-export/options.toml`.
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(Options::default_file_path())
    }

    /// Path of the options file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the default options file if it doesn't exist.
    ///
    /// # Errors
    /// Returns error if file cannot be created.
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.path.exists() {
            self.create_parent()?;
            fs::write(&self.path, DEFAULT_OPTIONS)
                .map_err(|e| AppError::io("Failed to create default options", e))?;
            tracing::info!(path = %self.path.display(), "Created default options");
        }
        Ok(())
    }

    fn create_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create options directory", e))?;
        }
        Ok(())
    }

    fn save(&self, options: &Options) -> Result<()> {
        self.create_parent()?;

        let content = toml::to_string_pretty(options).map_err(|e| AppError::Config {
            message: format!("Failed to serialize options: {e}"),
        })?;

        fs::write(&self.path, content).map_err(|e| {
            AppError::io(format!("Failed to write options file: {}", self.path.display()), e)
        })?;

        tracing::info!(path = %self.path.display(), "Options saved");
        Ok(())
    }
}

impl OptionsStore for TomlOptionsStore {
    fn get_all(&self) -> Result<Options> {
        if self.path.exists() {
            load_options_from_file(&self.path)
        } else {
            Ok(Options::default())
        }
    }

    fn set(&self, patch: OptionsPatch) -> Result<Options> {
        let mut options = self.get_all()?;
        options.apply(patch);
        self.save(&options)?;
        Ok(options)
    }
}

/// Load options from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_options_from_file(path: &Path) -> Result<Options> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read options file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse options file: {e}"),
    })
}

/// Options kept in memory, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryOptionsStore {
    options: std::sync::Mutex<Options>,
    unavailable: bool,
}

#[cfg(test)]
impl MemoryOptionsStore {
    pub fn with(options: Options) -> Self {
        Self {
            options: std::sync::Mutex::new(options),
            unavailable: false,
        }
    }

    /// A store whose reads always fail.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl OptionsStore for MemoryOptionsStore {
    fn get_all(&self) -> Result<Options> {
        if self.unavailable {
            return Err(AppError::Config {
                message: "options store unavailable".into(),
            });
        }
        Ok(self.options.lock().unwrap().clone())
    }

    fn set(&self, patch: OptionsPatch) -> Result<Options> {
        let mut options = self.options.lock().unwrap();
        options.apply(patch);
        Ok(options.clone())
    }
}
