//! Saving exports to disk.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::{AppError, ChatContent, ExportFormat, Result};

/// Extension and MIME type for a saved export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileType {
    pub extension: &'static str,
    pub mime_type: &'static str,
}

/// Used for format identifiers that are not recognized.
const PLAIN_TEXT: FileType = FileType {
    extension: "txt",
    mime_type: "text/plain",
};

/// File type for a format identifier.
#[must_use]
pub fn file_type_for(format: &str) -> FileType {
    format
        .parse::<ExportFormat>()
        .map_or(PLAIN_TEXT, |format| FileType {
            extension: format.extension(),
            mime_type: format.mime_type(),
        })
}

/// `chat-export-<YYYY-MM-DD>.<ext>`.
#[must_use]
pub fn export_filename(format: &str, date: NaiveDate) -> String {
    format!(
        "chat-export-{}.{}",
        date.format("%Y-%m-%d"),
        file_type_for(format).extension
    )
}

/// Writes an export into `dir`, creating the directory if needed.
///
/// An existing file for the same day and format is overwritten.
///
/// # Errors
/// Returns error if the directory or file cannot be written.
pub fn save_export(dir: &Path, chat: &ChatContent, date: NaiveDate) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::io(format!("Failed to create directory: {}", dir.display()), e))?;

    let path = dir.join(export_filename(chat.format.as_str(), date));
    fs::write(&path, &chat.content)
        .map_err(|e| AppError::io(format!("Failed to write export: {}", path.display()), e))?;

    tracing::info!(
        path = %path.display(),
        mime = file_type_for(chat.format.as_str()).mime_type,
        bytes = chat.content.len(),
        "Export saved"
    );
    Ok(path)
}
