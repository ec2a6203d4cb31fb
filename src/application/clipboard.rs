//! Serialized access to the system clipboard.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::page::Page;
use crate::domain::dom::ElementHandle;
use crate::domain::Result;

/// Raw clipboard backend.
#[async_trait]
pub trait Clipboard: Send + Sync {
    /// Reads the clipboard as text.
    async fn read_text(&self) -> Result<String>;

    /// Replaces the clipboard with `text`.
    async fn write_text(&self, text: &str) -> Result<()>;
}

/// Clipboard wrapper that allows one read, write or copy transaction at a
/// time.
///
/// A copy transaction (clear, click, settle, read) holds the gate for its
/// whole duration so no other clipboard access can interleave with the
/// page's own copy handler.
pub struct ClipboardBridge {
    backend: Box<dyn Clipboard>,
    gate: Mutex<()>,
}

impl ClipboardBridge {
    /// Wraps a clipboard backend.
    #[must_use]
    pub fn new(backend: Box<dyn Clipboard>) -> Self {
        Self {
            backend,
            gate: Mutex::new(()),
        }
    }

    /// Reads the clipboard.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    pub async fn read(&self) -> Result<String> {
        let _guard = self.gate.lock().await;
        self.backend.read_text().await
    }

    /// Writes the clipboard.
    ///
    /// # Errors
    /// Returns error if the backend cannot be written.
    pub async fn write(&self, text: &str) -> Result<()> {
        let _guard = self.gate.lock().await;
        self.backend.write_text(text).await
    }

    /// Clicks a copy affordance and reads what it put on the clipboard.
    ///
    /// The clipboard is cleared first, so `None` means the click produced
    /// nothing within `settle`.
    ///
    /// # Errors
    /// Returns error if the click or a clipboard access fails.
    pub async fn copy_from(
        &self,
        page: &dyn Page,
        trigger: ElementHandle,
        settle: Duration,
    ) -> Result<Option<String>> {
        let _guard = self.gate.lock().await;
        self.backend.write_text("").await?;
        page.click(trigger).await?;
        tokio::time::sleep(settle).await;
        let text = self.backend.read_text().await?;
        tracing::trace!(%trigger, bytes = text.len(), "Clipboard copy settled");
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}
