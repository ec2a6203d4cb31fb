//! Supported chat applications and URL-based site detection.

use serde::{Deserialize, Serialize};

use super::{AppError, Result};

/// Supported AI chat sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    #[serde(rename = "chatgpt")]
    ChatGpt,
    Claude,
    Gemini,
}

impl Site {
    /// All supported sites, in detection order.
    pub const ALL: [Self; 3] = [Self::ChatGpt, Self::Claude, Self::Gemini];

    /// Hostname fragments that identify the site inside a page URL.
    #[must_use]
    pub const fn url_patterns(self) -> &'static [&'static str] {
        match self {
            Self::ChatGpt => &["chat.openai.com", "chatgpt.com"],
            Self::Claude => &["claude.ai"],
            Self::Gemini => &["aistudio.google.com"],
        }
    }

    /// Stable identifier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ChatGpt => "chatgpt",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
        }
    }

    /// Whether the URL belongs to this site.
    #[must_use]
    pub fn matches(self, url: &str) -> bool {
        self.url_patterns().iter().any(|p| url.contains(p))
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies a page URL.
///
/// # Errors
/// Returns [`AppError::UnsupportedSite`] when no site pattern occurs in the URL.
pub fn detect_site(url: &str) -> Result<Site> {
    Site::ALL
        .into_iter()
        .find(|site| site.matches(url))
        .ok_or_else(|| AppError::UnsupportedSite {
            url: url.to_string(),
        })
}
