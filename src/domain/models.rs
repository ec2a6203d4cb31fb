//! Domain models for exported chat data.
//!
//! These models represent conversations as scraped from a chat application's
//! rendered page, independent of which site produced them.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from the user (human).
    User,
    /// Message from the AI assistant.
    Assistant,
}

impl Role {
    /// Normalizes a role label read from the page.
    ///
    /// Only `assistant` (in any casing) maps to [`Role::Assistant`]; every
    /// other label, including `system` or `tool`, is treated as the user.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("assistant") {
            Self::Assistant
        } else {
            Self::User
        }
    }

    /// Canonical lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Capitalized display name used in headings.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,
    /// Plain text, possibly containing Markdown fences and inline code.
    pub content: String,
}

impl Message {
    /// Creates a new message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Result of trying to extract one message-like element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// The element produced a message.
    Extracted(Message),
    /// The element was looked at on purpose but yields nothing (e.g. an empty
    /// reasoning block). Neither a message nor a failure.
    Skipped,
    /// The element could not be extracted.
    Failed,
}

/// Ordered, append-only result of one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    failed: usize,
}

impl Transcript {
    /// Creates an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Counts one failed element.
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Applies a per-element outcome.
    pub fn record(&mut self, outcome: ExtractionOutcome) {
        match outcome {
            ExtractionOutcome::Extracted(message) => self.push(message),
            ExtractionOutcome::Skipped => {}
            ExtractionOutcome::Failed => self.record_failure(),
        }
    }

    /// Messages in page order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of elements that could not be extracted.
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Number of extracted messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Splits the transcript into its messages and failure count.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Message>, usize) {
        (self.messages, self.failed)
    }
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// `### Role` headed Markdown.
    #[default]
    Markdown,
    /// Pretty-printed `{"messages": [...]}` document.
    Json,
    /// `<conversation>` document with escaped content.
    Xml,
    /// Standalone HTML page with light Markdown promotion.
    Html,
}

impl ExportFormat {
    /// All formats, in the order they are offered to users.
    pub const ALL: [Self; 4] = [Self::Markdown, Self::Json, Self::Xml, Self::Html];

    /// Resolves a stored format identifier, falling back to Markdown for
    /// anything unrecognized (including values written by older versions).
    #[must_use]
    pub fn resolve(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| {
            tracing::debug!(format = raw, "Unknown export format, using markdown");
            Self::Markdown
        })
    }

    /// Canonical identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Html => "html",
        }
    }

    /// File extension used when saving.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Html => "html",
        }
    }

    /// MIME type used when saving.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown",
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::Html => "text/html",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            "html" => Ok(Self::Html),
            _ => Err(format!("Unknown format: {s}. Use: markdown, json, xml, html")),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized export produced by one export invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContent {
    /// Format the content is serialized in.
    pub format: ExportFormat,
    /// Serialized conversation.
    pub content: String,
    /// Number of messages exported.
    pub message_count: usize,
    /// Number of message-like elements that could not be extracted.
    pub failed_messages: usize,
}

impl ChatContent {
    /// Whether some elements were dropped from the export.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.failed_messages > 0
    }
}
