//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{ExportFormat, OptionsPatch};

/// Chat Export - Export ChatGPT, Claude and Gemini conversations from a browser tab.
///
/// Start Chromium with `--remote-debugging-port=9222`, open a conversation,
/// then run `chat-export copy` or `chat-export save`.
#[derive(Parser, Debug)]
#[command(name = "chat-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// DevTools endpoint of the browser (overrides the stored `cdp_url`).
    #[arg(long, env = "CHAT_EXPORT_CDP")]
    pub cdp: Option<String>,

    /// Export the tab whose URL or title contains this text.
    #[arg(long)]
    pub tab: Option<String>,

    /// Export format: markdown, json, xml or html (overrides the stored export type).
    #[arg(short, long)]
    pub format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the conversation to the clipboard.
    Copy,

    /// Export the conversation to `chat-export-<date>.<ext>`.
    Save {
        /// Directory to save into.
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Leave the last copied message on the clipboard.
        #[arg(long)]
        no_restore: bool,
    },

    /// Print the exported conversation to stdout.
    Print {
        /// Leave the last copied message on the clipboard.
        #[arg(long)]
        no_restore: bool,
    },

    /// Show which site a URL belongs to.
    Detect {
        /// Page URL.
        url: String,
    },

    /// List supported sites.
    Sites,

    /// Show or change stored options.
    Options {
        #[command(subcommand)]
        action: OptionsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum OptionsCommand {
    /// Show stored options.
    Show,

    /// Change stored options.
    Set {
        /// Default export format.
        #[arg(long)]
        export_type: Option<String>,

        /// Restore the clipboard after saving or printing.
        #[arg(long)]
        restore_clipboard: Option<bool>,

        /// Wrap pasted files in code fences.
        #[arg(long)]
        fence_pasted_files: Option<bool>,

        /// DevTools endpoint of the browser.
        #[arg(long)]
        cdp_url: Option<String>,
    },
}

impl OptionsCommand {
    /// The update described by `set`; `None` for `show`.
    #[must_use]
    pub fn patch(&self) -> Option<OptionsPatch> {
        match self {
            Self::Show => None,
            Self::Set {
                export_type,
                restore_clipboard,
                fence_pasted_files,
                cdp_url,
            } => Some(OptionsPatch {
                export_type: export_type.clone(),
                restore_clipboard: *restore_clipboard,
                fence_pasted_files: *fence_pasted_files,
                cdp_url: cdp_url.clone(),
            }),
        }
    }
}

impl Cli {
    /// Parse the format override.
    ///
    /// # Errors
    /// Returns error message if the format is not recognized.
    pub fn export_format(&self) -> Result<Option<ExportFormat>, String> {
        self.format.as_deref().map(str::parse).transpose()
    }
}
