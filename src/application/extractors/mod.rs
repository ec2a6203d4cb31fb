//! Per-site conversation extractors.
//!
//! Each extractor walks the site's message elements in page order and
//! isolates failures per element: a message that cannot be read is logged
//! and tallied, never fatal to the run.

pub mod chatgpt;
pub mod claude;
pub mod gemini;

use async_trait::async_trait;

use super::clipboard::ClipboardBridge;
use super::page::Page;
use crate::domain::{ExtractionOutcome, Result, Site, Transcript};

pub use chatgpt::ChatGptExtractor;
pub use claude::ClaudeExtractor;
pub use gemini::GeminiExtractor;

/// User settings that change what extractors produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSettings {
    /// Wrap attached file contents in code fences.
    pub fence_pasted_files: bool,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            fence_pasted_files: true,
        }
    }
}

/// Shared resources for one extraction run.
pub struct ExtractContext<'a> {
    pub page: &'a dyn Page,
    pub clipboard: &'a ClipboardBridge,
    pub settings: ExtractSettings,
}

impl<'a> ExtractContext<'a> {
    #[must_use]
    pub fn new(page: &'a dyn Page, clipboard: &'a ClipboardBridge, settings: ExtractSettings) -> Self {
        Self {
            page,
            clipboard,
            settings,
        }
    }
}

/// Reads a whole conversation from one chat site.
#[async_trait]
pub trait SiteExtractor: Send + Sync {
    /// Site this extractor understands.
    fn site(&self) -> Site;

    /// Extracts every message currently rendered on the page.
    ///
    /// # Errors
    /// Only fails when the message elements cannot be discovered at all.
    async fn extract(&self, ctx: &ExtractContext<'_>) -> Result<Transcript>;
}

/// Extractor for `site`.
#[must_use]
pub fn extractor_for(site: Site) -> Box<dyn SiteExtractor> {
    match site {
        Site::ChatGpt => Box::new(ChatGptExtractor),
        Site::Claude => Box::new(ClaudeExtractor),
        Site::Gemini => Box::new(GeminiExtractor),
    }
}

/// Records one element's outcome, turning an error into a failure.
fn record_outcome(
    transcript: &mut Transcript,
    site: Site,
    index: usize,
    outcome: Result<ExtractionOutcome>,
) {
    match outcome {
        Ok(ExtractionOutcome::Failed) => {
            tracing::warn!(%site, message = index + 1, "Message could not be extracted");
            transcript.record_failure();
        }
        Ok(outcome) => transcript.record(outcome),
        Err(e) => {
            tracing::warn!(%site, message = index + 1, error = %e, "Message extraction failed");
            transcript.record_failure();
        }
    }
}

/// Logs the end-of-run summary.
fn log_summary(site: Site, discovered: usize, transcript: &Transcript) {
    tracing::info!(
        %site,
        discovered,
        extracted = transcript.message_count(),
        failed = transcript.failed(),
        "Extraction finished"
    );
}
