//! Output formatting for exported conversations.
//!
//! Supports Markdown, JSON, XML and a standalone HTML page.

use std::path::Path;

use comfy_table::{presets::UTF8_FULL, Table};
use regex::Captures;
use serde::Serialize;

use crate::domain::{AppError, ExportFormat, Message, Options, Result, Role, Site};
use crate::infrastructure::file_type_for;

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <title>Chat Export</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 800px; margin: 2rem auto; padding: 0 1rem; line-height: 1.6; }
    .message { margin-bottom: 3rem; }
    .role { font-weight: bold; margin-bottom: 1rem; font-size: 1.1em; }
    .content { white-space: pre-wrap; }
    .content p { margin: 1em 0; }
    .content h1, .content h2, .content h3, .content h4 { margin: 1.5em 0 0.5em; }
    .content ul, .content ol { margin: 1em 0; padding-left: 2em; }
    .content li { margin: 0.5em 0; }
    .content strong { font-weight: 600; }
    .content em { font-style: italic; }
    .content code { font-family: monospace; background: #f1f1f1; padding: 0.2em 0.4em; border-radius: 3px; }
    .content pre { background: #f8f8f8; padding: 1em; border-radius: 5px; overflow-x: auto; }
  </style>
</head>
<body>
"#;

#[allow(clippy::expect_used)]
mod patterns {
    use once_cell::sync::Lazy;
    use regex::Regex;

    fn compile(pattern: &str) -> Regex {
        Regex::new(pattern).expect("static regex")
    }

    pub static FENCED: Lazy<Regex> = Lazy::new(|| compile(r"```([a-zA-Z0-9-]*)?([^`]+)```"));
    pub static INLINE_CODE: Lazy<Regex> = Lazy::new(|| compile(r"`([^`]+)`"));
    pub static H3: Lazy<Regex> = Lazy::new(|| compile(r"(?m)^### (.*?)$"));
    pub static H2: Lazy<Regex> = Lazy::new(|| compile(r"(?m)^## (.*?)$"));
    pub static H1: Lazy<Regex> = Lazy::new(|| compile(r"(?m)^# (.*?)$"));
    pub static BOLD: Lazy<Regex> = Lazy::new(|| compile(r"\*\*(.*?)\*\*"));
    pub static ITALIC: Lazy<Regex> = Lazy::new(|| compile(r"\*(.*?)\*"));
    pub static LIST_ITEM: Lazy<Regex> = Lazy::new(|| compile(r"(?m)^[ ]*- (.*?)$"));
    pub static LIST_RUN: Lazy<Regex> = Lazy::new(|| compile(r"(?:<li>.*?</li>\n?)+"));
}

/// Serializes messages in the requested format.
///
/// Output is a pure function of its inputs.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn format_content(messages: &[Message], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Markdown => Ok(format_markdown(messages)),
        ExportFormat::Json => format_json(messages),
        ExportFormat::Xml => Ok(format_xml(messages)),
        ExportFormat::Html => Ok(format_html(messages)),
    }
}

/// Formats messages as `### Role` headed Markdown.
#[must_use]
pub fn format_markdown(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("### {}\n\n{}\n\n", m.role.title(), m.content))
        .collect()
}

#[derive(Serialize)]
struct JsonExport<'a> {
    messages: Vec<JsonMessage<'a>>,
}

#[derive(Serialize)]
struct JsonMessage<'a> {
    role: Role,
    content: &'a str,
}

/// Formats messages as a pretty-printed `{"messages": [...]}` document.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_json(messages: &[Message]) -> Result<String> {
    let export = JsonExport {
        messages: messages
            .iter()
            .map(|m| JsonMessage {
                role: m.role,
                content: &m.content,
            })
            .collect(),
    };
    serde_json::to_string_pretty(&export).map_err(AppError::json_parse)
}

/// Formats messages as a `<conversation>` XML document.
#[must_use]
pub fn format_xml(messages: &[Message]) -> String {
    let body = messages
        .iter()
        .map(|m| {
            format!(
                "  <message role=\"{}\">\n    <content>{}</content>\n  </message>",
                m.role.as_str(),
                escape_markup(&m.content)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<conversation>\n{body}\n</conversation>")
}

/// Formats messages as a standalone HTML page.
#[must_use]
pub fn format_html(messages: &[Message]) -> String {
    let body = messages
        .iter()
        .map(|m| {
            format!(
                "  <div class=\"message\">\n    <div class=\"role\">{}</div>\n    <div class=\"content\">{}</div>\n  </div>",
                m.role.title(),
                markdown_to_html(&m.content)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{HTML_HEAD}{body}\n</body>\n</html>")
}

/// Escapes the five reserved XML/HTML characters, ampersand first.
#[must_use]
pub fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Stands in for a rendered code block while the other passes run.
const BLOCK_MARK: char = '\u{E000}';

/// Best-effort Markdown promotion of escaped message text.
///
/// Fenced code blocks are rendered first and set aside, so inline rules and
/// paragraph splitting never reach into them. Paragraph wrapping skips
/// chunks that already start a heading, list or code block.
fn markdown_to_html(content: &str) -> String {
    let escaped = escape_markup(content);

    let mut code_blocks = Vec::new();
    let html = patterns::FENCED.replace_all(&escaped, |caps: &Captures<'_>| {
        let lang = caps.get(1).map_or("", |m| m.as_str().trim());
        code_blocks.push(format!(
            "<pre><code class=\"language-{lang}\">{}</code></pre>",
            caps[2].trim()
        ));
        format!("\n\n{BLOCK_MARK}{}{BLOCK_MARK}\n\n", code_blocks.len() - 1)
    });
    let html = patterns::INLINE_CODE.replace_all(&html, "<code>${1}</code>");
    let html = patterns::H3.replace_all(&html, "<h3>${1}</h3>");
    let html = patterns::H2.replace_all(&html, "<h2>${1}</h2>");
    let html = patterns::H1.replace_all(&html, "<h1>${1}</h1>");
    let html = patterns::BOLD.replace_all(&html, "<strong>${1}</strong>");
    let html = patterns::ITALIC.replace_all(&html, "<em>${1}</em>");
    let html = patterns::LIST_ITEM.replace_all(&html, "<li>${1}</li>");
    let html = patterns::LIST_RUN.replace_all(&html, "<ul>${0}</ul>");

    let mut html = html
        .split("\n\n")
        .map(|para| para.trim_matches('\n'))
        .filter(|para| !para.trim().is_empty())
        .map(|para| {
            if para.starts_with("<h") || para.starts_with("<ul") || para.starts_with(BLOCK_MARK) {
                para.to_string()
            } else {
                format!("<p>{para}</p>")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    for (index, block) in code_blocks.iter().enumerate() {
        html = html.replace(&format!("{BLOCK_MARK}{index}{BLOCK_MARK}"), block);
    }
    html
}

/// Describes an image attached to a message.
///
/// Missing or empty values are replaced with placeholders.
#[must_use]
pub fn format_image_input(src: Option<&str>, alt: Option<&str>, role: Role) -> String {
    let name = alt.filter(|a| !a.is_empty()).unwrap_or("Name not provided");
    let url = src.filter(|s| !s.is_empty()).unwrap_or("Unable to retrieve URL");
    format!("{} included image: {name} - {url}\n", role.title())
}

/// Table of supported sites and the URL patterns that select them.
#[must_use]
pub fn format_sites_table() -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Site", "URL patterns"]);

    for site in Site::ALL {
        table.add_row(vec![site.name().to_string(), site.url_patterns().join("\n")]);
    }

    table.to_string()
}

/// Table of the stored options.
#[must_use]
pub fn format_options_table(options: &Options, path: &Path) -> String {
    let file_type = file_type_for(&options.export_type);
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Option", "Value"]);

    table.add_row(vec![
        "export_type".to_string(),
        format!(
            "{} (.{}, {})",
            options.export_type, file_type.extension, file_type.mime_type
        ),
    ]);
    table.add_row(vec![
        "restore_clipboard".to_string(),
        options.restore_clipboard.to_string(),
    ]);
    table.add_row(vec![
        "fence_pasted_files".to_string(),
        options.fence_pasted_files.to_string(),
    ]);
    table.add_row(vec!["cdp_url".to_string(), options.cdp_url.clone()]);
    table.add_row(vec!["file".to_string(), path.display().to_string()]);

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Vec<Message> {
        vec![
            Message::new(Role::User, "How do I print?"),
            Message::new(
                Role::Assistant,
                "Use this:\n\n```python\nprint(1)\n```\n\nThat's it & done <ok>",
            ),
        ]
    }

    #[test]
    fn test_markdown() {
        let out = format_content(&conversation()[..1], ExportFormat::Markdown).unwrap();
        assert_eq!(out, "### User\n\nHow do I print?\n\n");
    }

    #[test]
    fn test_json_round_trip() {
        let messages = conversation();
        let out = format_content(&messages, ExportFormat::Json).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        let entries = parsed["messages"].as_array().unwrap();
        assert_eq!(entries.len(), messages.len());
        for (entry, message) in entries.iter().zip(&messages) {
            assert_eq!(entry["role"], message.role.as_str());
            assert_eq!(entry["content"], message.content.as_str());
        }
        assert!(out.contains("\n  \"messages\": ["));
    }

    #[test]
    fn test_xml_escapes_reserved_characters() {
        let messages = vec![Message::new(Role::Assistant, r#"a & b < c > d " e ' f &amp;"#)];
        let out = format_content(&messages, ExportFormat::Xml).unwrap();

        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<conversation>\n"));
        assert!(out.contains(
            "  <message role=\"assistant\">\n    <content>a &amp; b &lt; c &gt; d &quot; e &apos; f &amp;amp;</content>\n  </message>"
        ));
        assert!(out.ends_with("\n</conversation>"));
    }

    #[test]
    fn test_html_promotes_markdown_without_double_wrapping() {
        let messages = vec![Message::new(
            Role::Assistant,
            "# Title\n\nSome **bold** and `code`.\n\n```rust\nfn main() {}\n```\n\n- one\n- two",
        )];
        let out = format_content(&messages, ExportFormat::Html).unwrap();

        assert!(out.starts_with("<!DOCTYPE html>\n<html>"));
        assert!(out.contains("<div class=\"role\">Assistant</div>"));
        assert!(out.contains("<h1>Title</h1>"));
        assert!(out.contains("<p>Some <strong>bold</strong> and <code>code</code>.</p>"));
        assert!(out.contains("<pre><code class=\"language-rust\">fn main() {}</code></pre>"));
        assert!(out.contains("<ul><li>one</li>\n<li>two</li></ul>"));
        assert!(!out.contains("<p><h1>"));
        assert!(!out.contains("<p><pre>"));
        assert!(!out.contains("<p><ul>"));
        assert!(out.ends_with("\n</body>\n</html>"));
    }

    #[test]
    fn test_html_keeps_code_block_with_blank_line_whole() {
        let messages = vec![Message::new(
            Role::Assistant,
            "Run this:\n```python\n# setup\nx = 1\n\nprint(x * 2)\n```\nDone.",
        )];
        let out = format_html(&messages);

        assert!(out.contains(
            "<pre><code class=\"language-python\"># setup\nx = 1\n\nprint(x * 2)</code></pre>"
        ));
        assert!(out.contains("<p>Run this:</p>"));
        assert!(out.contains("<p>Done.</p>"));
        assert!(!out.contains("<p>print"));
        assert!(!out.contains("<em>"));
        assert!(!out.contains("</pre></p>"));
    }

    #[test]
    fn test_html_escapes_before_promotion() {
        let messages = vec![Message::new(Role::User, "<script>alert('x')</script>")];
        let out = format_html(&messages);
        assert!(out.contains("<p>&lt;script&gt;alert(&apos;x&apos;)&lt;/script&gt;</p>"));
    }

    #[test]
    fn test_deterministic() {
        let messages = conversation();
        for format in ExportFormat::ALL {
            assert_eq!(
                format_content(&messages, format).unwrap(),
                format_content(&messages, format).unwrap()
            );
        }
    }

    #[test]
    fn test_sites_table_lists_every_site() {
        let table = format_sites_table();
        assert!(table.contains("chatgpt.com"));
        assert!(table.contains("claude.ai"));
        assert!(table.contains("aistudio.google.com"));
    }

    #[test]
    fn test_options_table_shows_file_type() {
        let options = Options {
            export_type: "json".into(),
            ..Options::default()
        };
        let table = format_options_table(&options, Path::new("/tmp/options.toml"));
        assert!(table.contains("json (.json, application/json)"));
        assert!(table.contains("/tmp/options.toml"));
    }

    #[test]
    fn test_format_image_input() {
        assert_eq!(
            format_image_input(Some("https://x/y.png"), Some("diagram"), Role::Assistant),
            "Assistant included image: diagram - https://x/y.png\n"
        );
        assert_eq!(
            format_image_input(None, None, Role::User),
            "User included image: Name not provided - Unable to retrieve URL\n"
        );
    }
}
