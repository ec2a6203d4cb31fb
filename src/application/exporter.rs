//! Export orchestration.
//!
//! Detects the site, runs the matching extractor, formats the transcript
//! and hands the result to the clipboard or a file.

use std::path::{Path, PathBuf};

use chrono::Utc;

use super::clipboard::ClipboardBridge;
use super::extractors::{extractor_for, ExtractContext, ExtractSettings};
use super::formatter::format_content;
use super::page::Page;
use crate::domain::{detect_site, ChatContent, ExportFormat, Options, Result};
use crate::infrastructure::{save_export, OptionsStore};

/// Runs exports against one page.
pub struct Exporter<'a> {
    page: &'a dyn Page,
    clipboard: &'a ClipboardBridge,
    options: &'a dyn OptionsStore,
    format: Option<ExportFormat>,
}

impl<'a> Exporter<'a> {
    #[must_use]
    pub fn new(page: &'a dyn Page, clipboard: &'a ClipboardBridge, options: &'a dyn OptionsStore) -> Self {
        Self {
            page,
            clipboard,
            options,
            format: None,
        }
    }

    /// Uses `format` instead of the stored export type.
    #[must_use]
    pub const fn with_format(mut self, format: Option<ExportFormat>) -> Self {
        self.format = format;
        self
    }

    /// Stored options, or defaults when the store cannot be read.
    #[must_use]
    pub fn options(&self) -> Options {
        self.options.get_all().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Options unavailable, using defaults");
            Options::default()
        })
    }

    /// Extracts and formats the conversation shown on the page.
    ///
    /// With `restore_clipboard`, the clipboard contents from before the run
    /// are written back once extraction is over, whether it succeeded or not.
    ///
    /// # Errors
    /// Returns error if the page is not a supported chat site or the page
    /// cannot be read at all. Individual messages that fail are counted in
    /// [`ChatContent::failed_messages`] instead.
    pub async fn get_chat_content(&self, restore_clipboard: bool) -> Result<ChatContent> {
        let url = self.page.url().await?;
        let site = detect_site(&url)?;
        let options = self.options();
        let format = self.format.unwrap_or_else(|| options.export_format());
        tracing::info!(%site, %format, "Exporting conversation");

        let original = if restore_clipboard {
            match self.clipboard.read().await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not save clipboard, it will not be restored");
                    None
                }
            }
        } else {
            None
        };

        let ctx = ExtractContext::new(
            self.page,
            self.clipboard,
            ExtractSettings {
                fence_pasted_files: options.fence_pasted_files,
            },
        );
        let transcript = extractor_for(site).extract(&ctx).await;

        if let Some(original) = original {
            match self.clipboard.write(&original).await {
                Ok(()) => tracing::debug!("Clipboard restored"),
                Err(e) => tracing::warn!(error = %e, "Failed to restore clipboard"),
            }
        }

        let (messages, failed_messages) = transcript?.into_parts();
        let content = format_content(&messages, format)?;

        Ok(ChatContent {
            format,
            content,
            message_count: messages.len(),
            failed_messages,
        })
    }

    /// Exports and puts the result on the clipboard.
    ///
    /// # Errors
    /// Returns error if the export fails or the clipboard cannot be written.
    pub async fn copy_to_clipboard(&self) -> Result<ChatContent> {
        let chat = self.get_chat_content(false).await?;
        self.clipboard.write(&chat.content).await?;
        tracing::info!(messages = chat.message_count, "Export copied to clipboard");
        Ok(chat)
    }

    /// Exports and saves the result as `chat-export-<date>.<ext>` in `dir`.
    ///
    /// # Errors
    /// Returns error if the export fails or the file cannot be written.
    pub async fn save_to_file(&self, dir: &Path, restore_clipboard: bool) -> Result<(ChatContent, PathBuf)> {
        let chat = self.get_chat_content(restore_clipboard).await?;
        let path = save_export(dir, &chat, Utc::now().date_naive())?;
        Ok((chat, path))
    }
}
