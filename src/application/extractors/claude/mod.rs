//! Claude (`claude.ai`).
//!
//! Assistant replies are copied through their action-bar copy button and
//! extended with any artifacts. User messages are assembled from pasted
//! content panels, attached files and the message text.

mod artifacts;
mod pasted;

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{log_summary, record_outcome, ExtractContext, SiteExtractor};
use crate::application::page::ScrollAlign;
use crate::application::retry::RetryPolicy;
use crate::application::sources::{ClipboardCopy, ContentSource, DomRead};
use crate::domain::dom::{Document, ElementHandle, NodeRef};
use crate::domain::{AppError, ExtractionOutcome, Message, Result, Role, Site, Transcript};

const USER_MESSAGE: &str = r#"[data-testid="user-message"]"#;
const ASSISTANT_MESSAGE: &str = "div.font-claude-response";
const MESSAGE_GROUP: &str = "div[data-test-render-count]";
const BADGE: &str = ".text-text-300";
const STREAMING: &str = "[data-is-streaming]";
const ACTION_BAR_COPY: &str = r#"button[data-testid="action-bar-copy"]"#;
const CLOSE_FALLBACK: &str = r#"button[aria-label="Close"], button svg path[d*="15.8536"]"#;

/// Pause after a group of message parts was read through side panels.
const PART_PAUSE: Duration = Duration::from_millis(100);
/// Lets lazily rendered content mount after a message is scrolled into view.
const RENDER_SETTLE: Duration = Duration::from_millis(300);

#[allow(clippy::expect_used)]
static FENCE_WITH_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z0-9_+-]+)\s*```([A-Za-z0-9_+-]+)").expect("static regex")
});

/// Extracts Claude conversations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    User,
    Assistant,
    /// A message group holding only pasted documents.
    PastedOnly,
}

#[async_trait]
impl SiteExtractor for ClaudeExtractor {
    fn site(&self) -> Site {
        Site::Claude
    }

    async fn extract(&self, ctx: &ExtractContext<'_>) -> Result<Transcript> {
        let entries = {
            let doc = ctx.page.document().await?;
            discover(&doc)?
        };
        tracing::debug!(messages = entries.len(), "Found Claude messages");

        let mut transcript = Transcript::new();
        for (index, (kind, element)) in entries.iter().enumerate() {
            let outcome = extract_entry(ctx, *kind, *element).await;
            record_outcome(&mut transcript, Site::Claude, index, outcome);
        }

        log_summary(Site::Claude, entries.len(), &transcript);
        Ok(transcript)
    }
}

/// All message elements in page order.
fn discover(doc: &Document) -> Result<Vec<(Kind, ElementHandle)>> {
    let mut found: Vec<(usize, Kind, ElementHandle)> = Vec::new();
    let mut push = |kind: Kind, node: NodeRef<'_>| {
        if let Some(handle) = node.handle() {
            found.push((node.position(), kind, handle));
        }
    };

    for node in doc.select(USER_MESSAGE)? {
        push(Kind::User, node);
    }
    for node in doc.select(ASSISTANT_MESSAGE)? {
        push(Kind::Assistant, node);
    }
    for group in doc.select(MESSAGE_GROUP)? {
        let badged = group.select_first(BADGE)?.is_some_and(is_pasted_badge);
        if badged && group.select_first(USER_MESSAGE)?.is_none() {
            push(Kind::PastedOnly, group);
        }
    }

    found.sort_by_key(|(position, _, _)| *position);
    Ok(found.into_iter().map(|(_, kind, handle)| (kind, handle)).collect())
}

fn is_pasted_badge(badge: NodeRef<'_>) -> bool {
    badge.text_content().to_lowercase().contains("pasted")
}

async fn extract_entry(ctx: &ExtractContext<'_>, kind: Kind, element: ElementHandle) -> Result<ExtractionOutcome> {
    ctx.page.scroll_into_view(element, ScrollAlign::Start).await?;
    tokio::time::sleep(RENDER_SETTLE).await;

    match kind {
        Kind::Assistant => extract_assistant(ctx, element).await,
        Kind::User => extract_user(ctx, element).await,
        Kind::PastedOnly => extract_pasted_only(ctx, element).await,
    }
}

/// Snapshot of the message group holding `message`, or of the whole page
/// when the message sits outside any group.
async fn group_snapshot(ctx: &ExtractContext<'_>, message: ElementHandle) -> Result<Document> {
    match ctx.page.closest(message, MESSAGE_GROUP).await? {
        Some(group) => ctx.page.snapshot(group).await,
        None => ctx.page.document().await,
    }
}

async fn extract_assistant(ctx: &ExtractContext<'_>, message: ElementHandle) -> Result<ExtractionOutcome> {
    let (copy_button, container) = {
        let doc = group_snapshot(ctx, message).await?;
        let node = locate(&doc, message)?;
        let group = node.closest(STREAMING)?.and_then(|n| n.parent());
        let copy_button = match group {
            Some(group) => group.select_first(ACTION_BAR_COPY)?.and_then(|b| b.handle()),
            None => None,
        };
        let container = match group {
            Some(group) => Some(group),
            None => node.closest(MESSAGE_GROUP)?,
        };
        (copy_button, container.and_then(|c| c.handle()))
    };

    let copied = match copy_button {
        Some(button) => ClipboardCopy::new(RetryPolicy::ACTION_BAR_COPY)
            .with_cleanup(cleanup_code_blocks)
            .read(ctx, button)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(%message, error = %e, "Action-bar copy failed");
                None
            }),
        None => None,
    };
    let mut content = match copied {
        Some(text) => text,
        None => {
            tracing::debug!(%message, "No clipboard copy, formatting the DOM instead");
            DomRead::plain().read(ctx, message).await?.unwrap_or_default()
        }
    };

    if let Some(container) = container {
        let found = artifacts::extract_all(ctx, container).await?;
        if !found.is_empty() {
            content.push_str("\n\n");
            content.push_str(&found.join("\n\n"));
        }
    }

    Ok(outcome(Role::Assistant, content))
}

async fn extract_user(ctx: &ExtractContext<'_>, message: ElementHandle) -> Result<ExtractionOutcome> {
    let container = ctx.page.closest(message, MESSAGE_GROUP).await?;

    let mut parts = Vec::new();
    if let Some(container) = container {
        let pasted = pasted::extract_all(ctx, container).await?;
        if !pasted.is_empty() {
            parts.extend(label_pasted(pasted));
            tokio::time::sleep(PART_PAUSE).await;
        }

        if let Some(files) = pasted::read_attachments(ctx, container).await? {
            parts.push(files);
            tokio::time::sleep(PART_PAUSE).await;
        }
    }

    if let Some(text) = DomRead::plain().read(ctx, message).await? {
        parts.push(text);
    }

    Ok(outcome(Role::User, parts.join("\n")))
}

async fn extract_pasted_only(ctx: &ExtractContext<'_>, group: ElementHandle) -> Result<ExtractionOutcome> {
    let pasted = pasted::extract_all(ctx, group).await?;
    if !pasted.is_empty() {
        tokio::time::sleep(PART_PAUSE).await;
    }
    Ok(outcome(Role::User, label_pasted(pasted).join("\n")))
}

fn label_pasted(pasted: Vec<String>) -> Vec<String> {
    pasted
        .into_iter()
        .enumerate()
        .map(|(i, block)| format!("Pasted Content #{}:\n\n{block}", i + 1))
        .collect()
}

fn outcome(role: Role, content: String) -> ExtractionOutcome {
    if content.trim().is_empty() {
        ExtractionOutcome::Failed
    } else {
        ExtractionOutcome::Extracted(Message::new(role, content))
    }
}

fn locate(doc: &Document, element: ElementHandle) -> Result<NodeRef<'_>> {
    doc.find_by_handle(element)
        .ok_or_else(|| AppError::page(format!("element {element} is no longer in the page")))
}

/// Closes whatever side panel is open using the generic close controls.
async fn close_any_panel(ctx: &ExtractContext<'_>) -> Result<()> {
    let close = match ctx.page.query_first(CLOSE_FALLBACK).await? {
        Some(hit) => ctx.page.closest(hit, "button").await?,
        None => None,
    };
    if let Some(button) = close {
        ctx.page.click(button).await?;
    }
    Ok(())
}

/// Collapses a language label duplicated in front of a code fence.
///
/// Claude's copy sometimes renders `` bash```bash `` where `` ```bash ``
/// is meant; any other text before the fence is kept.
#[must_use]
pub fn cleanup_code_blocks(content: &str) -> String {
    FENCE_WITH_LABEL
        .replace_all(content, |caps: &Captures<'_>| {
            let (before, lang) = (&caps[1], &caps[2]);
            match before.strip_suffix(lang) {
                Some(prefix) => format!("{prefix}```{lang}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::extractors::ExtractSettings;
    use crate::application::ClipboardBridge;
    use crate::domain::dom::Element;
    use crate::testing::{FakeClipboard, FakePage};

    async fn run(page: &FakePage) -> Transcript {
        let clipboard = ClipboardBridge::new(Box::new(FakeClipboard::new(page)));
        let ctx = ExtractContext::new(page, &clipboard, ExtractSettings::default());
        ClaudeExtractor.extract(&ctx).await.unwrap()
    }

    fn user_group(text: &str) -> Element {
        Element::new("div").with_attr("data-test-render-count", "1").with_child(
            Element::new("div")
                .with_attr("data-testid", "user-message")
                .with_child(Element::new("p").with_text(text)),
        )
    }

    fn assistant_group(id: &str, text: &str) -> Element {
        Element::new("div").with_attr("data-test-render-count", "1").with_child(
            Element::new("div")
                .with_child(
                    Element::new("div").with_attr("data-is-streaming", "false").with_child(
                        Element::new("div")
                            .with_class("font-claude-response")
                            .with_child(Element::new("p").with_text(text)),
                    ),
                )
                .with_child(
                    Element::new("button")
                        .with_attr("data-testid", "action-bar-copy")
                        .with_attr("id", id),
                ),
        )
    }

    #[test]
    fn test_cleanup_duplicated_language_label() {
        assert_eq!(
            cleanup_code_blocks("bash```bash\necho hi\n```"),
            "```bash\necho hi\n```"
        );
        assert_eq!(
            cleanup_code_blocks("Run this:\npython ```python\nprint(1)\n```"),
            "Run this:\n```python\nprint(1)\n```"
        );
        assert_eq!(cleanup_code_blocks("mybash```bash"), "my```bash");
        assert_eq!(cleanup_code_blocks("see```rust"), "see```rust");
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_in_page_order() {
        let page = FakePage::new(
            "https://claude.ai/chat/1",
            Element::new("div")
                .with_child(user_group("Hi"))
                .with_child(assistant_group("copy-1", "ignored dom text"))
                .with_child(user_group("Thanks")),
        );
        let button = page.handle_of("#copy-1");
        page.on_click(button, |state| {
            state.clipboard = "Hello!\n\nbash```bash\nls\n```".into();
        });

        let transcript = run(&page).await;

        let messages: Vec<_> = transcript
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            messages,
            vec![
                (Role::User, "Hi"),
                (Role::Assistant, "Hello!\n\n```bash\nls\n```"),
                (Role::User, "Thanks"),
            ]
        );
        assert_eq!(transcript.failed(), 0);

        let scrolls = page.state().scrolls.clone();
        assert_eq!(scrolls.len(), 3);
        assert!(scrolls.iter().all(|(_, align)| *align == ScrollAlign::Start));
        assert_eq!(scrolls[0].0, page.handle_of(USER_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_assistant_falls_back_to_dom_when_copy_is_silent() {
        let page = FakePage::new(
            "https://claude.ai/chat/1",
            assistant_group("copy-1", "From the DOM"),
        );

        let transcript = run(&page).await;

        assert_eq!(transcript.messages()[0].content, "From the DOM");
        assert_eq!(page.clicks().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_assistant_falls_back_to_dom_when_copy_errors() {
        let page = FakePage::new(
            "https://claude.ai/chat/1",
            assistant_group("copy-1", "From the DOM"),
        );
        // The button unmounts on the first click, so later clicks fail.
        page.on_click(page.handle_of("#copy-1"), |state| {
            state.remove_first(ACTION_BAR_COPY);
        });

        let transcript = run(&page).await;

        assert_eq!(transcript.failed(), 0);
        assert_eq!(transcript.messages()[0].content, "From the DOM");
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_message_joins_pasted_files_and_text_in_order() {
        let thumbnail = |id: &str, badge: Option<&str>| {
            let mut flex_col = Element::new("div").with_class("flex-col").with_text(id);
            if let Some(badge) = badge {
                flex_col = flex_col.with_child(
                    Element::new("span").with_class("text-text-300").with_text(badge),
                );
            }
            Element::new("div")
                .with_attr("data-testid", "file-thumbnail")
                .with_attr("id", id)
                .with_child(flex_col)
        };
        let attachments = Element::new("div").with_child(
            Element::new("div")
                .with_child(
                    Element::new("div")
                        .with_class("group/thumbnail")
                        .with_child(thumbnail("notes", None)),
                )
                .with_child(thumbnail("clip", Some("PASTED"))),
        );
        let group = Element::new("div")
            .with_attr("data-test-render-count", "1")
            .with_child(attachments)
            .with_child(
                Element::new("div")
                    .with_attr("data-testid", "user-message")
                    .with_child(Element::new("p").with_text("What do these do?")),
            );
        let page = FakePage::new(
            "https://claude.ai/chat/1",
            Element::new("div").with_child(group).with_child(
                Element::new("aside")
                    .with_child(Element::new("button").with_attr("data-testid", "close-file-preview")),
            ),
        );
        let show = |text: &'static str| {
            move |state: &mut crate::testing::FakeState| {
                state.remove_first(".whitespace-pre-wrap");
                state.insert_into(
                    "aside",
                    Element::new("div")
                        .with_class("whitespace-pre-wrap break-all text-xs")
                        .with_text(text),
                );
            }
        };
        page.on_click(page.handle_of("#clip .flex-col"), show("let x = 1;"));
        page.on_click(page.handle_of("#notes"), show("buy milk"));

        let transcript = run(&page).await;

        assert_eq!(transcript.failed(), 0);
        assert_eq!(transcript.messages()[0].role, Role::User);
        assert_eq!(
            transcript.messages()[0].content,
            "Pasted Content #1:\n\nPasted Content\n\n```\nlet x = 1;\n```\n\
             ```\nbuy milk\n```\n\n\
             What do these do?"
        );
        let user_message = page.handle_of(USER_MESSAGE);
        assert_eq!(
            page.state().scrolls,
            vec![(user_message, ScrollAlign::Start)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pasted_only_group_is_a_user_message() {
        let pasted_block = Element::new("div").with_class("flex-col").with_child(
            Element::new("span")
                .with_class("text-text-300")
                .with_text("PASTED"),
        );
        let group = Element::new("div")
            .with_attr("data-test-render-count", "1")
            .with_child(pasted_block);
        let page = FakePage::new(
            "https://claude.ai/chat/1",
            Element::new("div").with_child(group).with_child(Element::new("aside")),
        );
        let block = page.handle_of(".flex-col");
        page.on_click(block, |state| {
            state.insert_into(
                "aside",
                Element::new("div")
                    .with_class("whitespace-pre-wrap break-all text-xs")
                    .with_text("fn main() {}"),
            );
            state.insert_into(
                "aside",
                Element::new("button").with_attr("data-testid", "close-file-preview"),
            );
        });

        let transcript = run(&page).await;

        assert_eq!(transcript.message_count(), 1);
        assert_eq!(
            transcript.messages()[0].content,
            "Pasted Content #1:\n\nPasted Content\n\n```\nfn main() {}\n```"
        );
        assert_eq!(transcript.messages()[0].role, Role::User);
    }
}
