//! Chat Export - Export AI chat conversations from a live browser tab.
//!
//! Attaches to a Chromium tab over the DevTools protocol, detects whether it
//! shows ChatGPT, Claude or Gemini (AI Studio), walks the conversation and
//! exports it as Markdown, JSON, XML or HTML.
//!
//! QUICK START:
//!   chromium --remote-debugging-port=9222   # then open a conversation
//!   chat-export copy                        # Export to the clipboard
//!   chat-export save -d exports -f json     # Save chat-export-<date>.json
//!   chat-export print --tab claude          # Print a specific tab
//!   chat-export options set --export-type html

mod application;
mod cli;
mod domain;
mod infrastructure;
#[cfg(test)]
mod testing;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{format_options_table, format_sites_table, ClipboardBridge, Exporter};
use cli::{Cli, Commands, OptionsCommand};
use domain::{detect_site, ChatContent, ExportFormat, Options};
use infrastructure::{
    file_type_for, list_targets, select_target, CdpPage, OptionsStore, SystemClipboard,
    TomlOptionsStore,
};

/// Export commands that talk to the browser.
enum Export<'a> {
    Copy,
    Save { dir: &'a Path, no_restore: bool },
    Print { no_restore: bool },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> domain::Result<()> {
    let format = cli
        .export_format()
        .map_err(|e| domain::AppError::Config { message: e })?;
    let store = TomlOptionsStore::default_location();

    match &cli.command {
        Commands::Copy => cmd_export(&cli, &store, format, Export::Copy).await?,
        Commands::Save { dir, no_restore } => {
            cmd_export(
                &cli,
                &store,
                format,
                Export::Save {
                    dir,
                    no_restore: *no_restore,
                },
            )
            .await?;
        }
        Commands::Print { no_restore } => {
            cmd_export(
                &cli,
                &store,
                format,
                Export::Print {
                    no_restore: *no_restore,
                },
            )
            .await?;
        }
        Commands::Detect { url } => cmd_detect(url)?,
        Commands::Sites => cmd_sites(),
        Commands::Options { action } => cmd_options(&store, action)?,
    }

    Ok(())
}

/// Export the conversation from the selected tab.
async fn cmd_export(
    cli: &Cli,
    store: &TomlOptionsStore,
    format: Option<ExportFormat>,
    export: Export<'_>,
) -> domain::Result<()> {
    let options = store.get_all().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Options unavailable, using defaults");
        Options::default()
    });
    let cdp_url = cli.cdp.as_deref().unwrap_or(&options.cdp_url);

    let targets = list_targets(cdp_url).await?;
    let target = select_target(&targets, cli.tab.as_deref())?;
    let page = CdpPage::attach(&target).await?;
    let clipboard = ClipboardBridge::new(Box::new(SystemClipboard::open()?));
    let exporter = Exporter::new(&page, &clipboard, store).with_format(format);

    match export {
        Export::Copy => {
            let chat = exporter.copy_to_clipboard().await?;
            print_summary(&chat, "Copied to clipboard");
        }
        Export::Save { dir, no_restore } => {
            let restore = options.restore_clipboard && !no_restore;
            let (chat, path) = exporter.save_to_file(dir, restore).await?;
            print_summary(&chat, &format!("Saved to {}", path.display()));
        }
        Export::Print { no_restore } => {
            let restore = options.restore_clipboard && !no_restore;
            let chat = exporter.get_chat_content(restore).await?;
            println!("{}", chat.content);
            if chat.is_partial() {
                print_partial_warning(&chat);
            }
        }
    }

    Ok(())
}

fn print_summary(chat: &ChatContent, action: &str) {
    println!(
        "{} {} messages as {}. {}",
        "✓".green().bold(),
        chat.message_count,
        chat.format.to_string().cyan(),
        action
    );
    if chat.is_partial() {
        print_partial_warning(chat);
    }
}

fn print_partial_warning(chat: &ChatContent) {
    eprintln!(
        "{} {} message(s) could not be extracted and were left out",
        "⚠".yellow().bold(),
        chat.failed_messages.to_string().yellow()
    );
}

/// Show which site a URL belongs to.
fn cmd_detect(url: &str) -> domain::Result<()> {
    let site = detect_site(url)?;
    println!("{} {}", "✓".green().bold(), site.name().cyan());
    Ok(())
}

/// List supported sites.
fn cmd_sites() {
    println!("{}", format_sites_table());
}

/// Show or change stored options.
fn cmd_options(store: &TomlOptionsStore, action: &OptionsCommand) -> domain::Result<()> {
    let options = match action.patch() {
        Some(patch) => {
            let options = store.set(patch)?;
            println!("{} Options saved", "✓".green().bold());
            options
        }
        None => {
            store.ensure_exists()?;
            store.get_all()?
        }
    };

    if options.export_type.parse::<ExportFormat>().is_err() {
        println!(
            "{} Unknown export type '{}', exports will use markdown (.{})",
            "⚠".yellow().bold(),
            options.export_type,
            file_type_for(ExportFormat::Markdown.as_str()).extension
        );
    }

    println!("{}", format_options_table(&options, store.path()));
    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
