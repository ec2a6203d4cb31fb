//! System clipboard backed by `arboard`.

use std::sync::Mutex;

use arboard::Error as ArboardError;
use async_trait::async_trait;

use crate::application::Clipboard;
use crate::domain::{AppError, Result};

/// The operating system clipboard.
pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    /// Opens the system clipboard.
    ///
    /// # Errors
    /// Returns error if no clipboard is available (e.g. no display server).
    pub fn open() -> Result<Self> {
        let inner = arboard::Clipboard::new()
            .map_err(|e| AppError::clipboard(format!("Failed to open clipboard: {e}")))?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    fn with<T>(&self, op: impl FnOnce(&mut arboard::Clipboard) -> Result<T>) -> Result<T> {
        let mut clipboard = self
            .inner
            .lock()
            .map_err(|_| AppError::clipboard("Clipboard lock poisoned"))?;
        op(&mut clipboard)
    }
}

#[async_trait]
impl Clipboard for SystemClipboard {
    async fn read_text(&self) -> Result<String> {
        self.with(|clipboard| match clipboard.get_text() {
            Ok(text) => Ok(text),
            // Empty or non-text clipboard.
            Err(ArboardError::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(AppError::clipboard(format!("Failed to read clipboard: {e}"))),
        })
    }

    async fn write_text(&self, text: &str) -> Result<()> {
        self.with(|clipboard| {
            if text.is_empty() {
                clipboard.clear()
            } else {
                clipboard.set_text(text)
            }
            .map_err(|e| AppError::clipboard(format!("Failed to write clipboard: {e}")))
        })
    }
}
