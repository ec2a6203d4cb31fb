//! Gemini in AI Studio (`aistudio.google.com`).
//!
//! Regular turns are read back from the edit-mode textarea, which holds the
//! unrendered source of the message. Thought chunks are formatted from the
//! DOM and exported as their own message.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{log_summary, record_outcome, ExtractContext, SiteExtractor};
use crate::application::page::ScrollAlign;
use crate::application::retry::RetryPolicy;
use crate::application::sources::{ContentSource, DomRead};
use crate::domain::dom::ElementHandle;
use crate::domain::{ExtractionOutcome, Message, Result, Role, Site, Transcript};

const TURN: &str = "ms-chat-turn";
const OVERLAY_BACKDROP: &str = ".cdk-overlay-backdrop";
const TURN_CONTAINER: &str = ".chat-turn-container";
const THOUGHT_CHUNK: &str = "ms-thought-chunk";
const EDIT_TOGGLE: &str = r#".toggle-edit-button, button[aria-label="Edit"]"#;
const TEXTAREA: &str = "ms-autosize-textarea[data-value]";
const CANCEL_EDIT: &str = r#"button[aria-label="Cancel editing"], button[aria-label="Stop editing"]"#;
const KEY_TARGET: &str = "textarea, input";

/// Done-editing controls, most specific first.
const DONE_EDITING: [&str; 3] = [
    r#"button[aria-label="Stop editing"]"#,
    r#"button[aria-label="Done editing"]"#,
    ".done-editing-button, .edit-done-button",
];

/// Scroll containers tried in order during the textarea search.
const SCROLL_CONTAINERS: [&str; 6] = [
    "ms-autoscroll-container",
    "ms-prompt-scrollbar",
    "ms-app main",
    "main",
    r#"[role="main"]"#,
    "html",
];

const THINKING_PREFIX: &str = "*Thinking Output*\n\n";

const OVERLAY_SETTLE: Duration = Duration::from_millis(200);
const BOTTOM_SETTLE: Duration = Duration::from_millis(800);
const TOP_SETTLE: Duration = Duration::from_millis(1000);
const TEXTAREA_SETTLE: Duration = Duration::from_millis(200);
const EXIT_SETTLE: Duration = Duration::from_millis(100);
const BETWEEN_TURNS: Duration = Duration::from_millis(25);

/// Polls after which the scroll search starts.
const SCROLL_SEARCH_AFTER: u32 = 20;
const MAX_SCROLL_STEPS: u32 = 20;
const SCROLL_STEP: Duration = Duration::from_millis(200);

#[allow(clippy::expect_used)]
static THOUGHT_CHROME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Expand to view model thoughts|chevron_right|Thoughts\(experimental\)Auto")
        .expect("static regex")
});

#[allow(clippy::expect_used)]
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").expect("static regex"));

/// Extracts Gemini conversations from AI Studio.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiExtractor;

#[async_trait]
impl SiteExtractor for GeminiExtractor {
    fn site(&self) -> Site {
        Site::Gemini
    }

    async fn extract(&self, ctx: &ExtractContext<'_>) -> Result<Transcript> {
        let turns = ctx.page.query_all(TURN).await?;
        tracing::debug!(turns = turns.len(), "Found chat turns");

        let mut transcript = Transcript::new();
        for (index, turn) in turns.iter().enumerate() {
            let outcome = extract_turn(ctx, *turn).await;
            record_outcome(&mut transcript, Site::Gemini, index, outcome);
            tokio::time::sleep(BETWEEN_TURNS).await;
        }

        log_summary(Site::Gemini, turns.len(), &transcript);
        Ok(transcript)
    }
}

async fn extract_turn(ctx: &ExtractContext<'_>, turn: ElementHandle) -> Result<ExtractionOutcome> {
    close_overlays(ctx).await?;

    ctx.page.scroll_into_view(turn, ScrollAlign::End).await?;
    tokio::time::sleep(BOTTOM_SETTLE).await;
    ctx.page.scroll_into_view(turn, ScrollAlign::Start).await?;
    tokio::time::sleep(TOP_SETTLE).await;

    let (role, thought) = {
        let doc = ctx.page.snapshot(turn).await?;
        let root = doc.root();
        let Some(container) = root.select_first(TURN_CONTAINER)? else {
            return Ok(ExtractionOutcome::Failed);
        };
        let role = if container.has_class("user") {
            Role::User
        } else {
            Role::Assistant
        };
        let thought = match root.select_first(THOUGHT_CHUNK)? {
            Some(chunk) => Some(DomRead::plain().render(&doc, chunk)?),
            None => None,
        };
        (role, thought)
    };

    if let Some(thought) = thought {
        let text = scrub_thought(&thought);
        return Ok(if text.is_empty() {
            ExtractionOutcome::Skipped
        } else {
            ExtractionOutcome::Extracted(Message::new(role, format!("{THINKING_PREFIX}{text}")))
        });
    }

    let content = EditModeRead.read(ctx, turn).await?;
    Ok(match content.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => ExtractionOutcome::Extracted(Message::new(role, text)),
        _ => ExtractionOutcome::Failed,
    })
}

async fn close_overlays(ctx: &ExtractContext<'_>) -> Result<()> {
    if let Some(backdrop) = ctx.page.query_first(OVERLAY_BACKDROP).await? {
        ctx.page.click(backdrop).await?;
        tokio::time::sleep(OVERLAY_SETTLE).await;
    }
    Ok(())
}

/// Removes expand/collapse labels from a formatted thought chunk.
#[must_use]
pub fn scrub_thought(text: &str) -> String {
    let text = THOUGHT_CHROME.replace_all(text, "");
    BLANK_RUN.replace_all(&text, "\n\n").trim().to_string()
}

/// Reads a turn's source text through its edit-mode textarea.
///
/// Clicks the edit toggle, waits for the textarea to mount (scrolling the
/// page to force it when it is slow to appear), reads its `data-value` and
/// leaves edit mode again.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditModeRead;

#[async_trait]
impl ContentSource for EditModeRead {
    async fn read(&self, ctx: &ExtractContext<'_>, turn: ElementHandle) -> Result<Option<String>> {
        let toggle = ctx
            .page
            .snapshot(turn)
            .await?
            .root()
            .select_first(EDIT_TOGGLE)?
            .and_then(|n| n.handle());
        let Some(toggle) = toggle else {
            tracing::debug!(%turn, "No edit toggle");
            return Ok(None);
        };
        ctx.page.click(toggle).await?;

        let Some(value) = find_textarea(ctx, turn).await? else {
            tracing::debug!(%turn, "Edit textarea never appeared");
            let cancel = ctx
                .page
                .snapshot(turn)
                .await?
                .root()
                .select_first(CANCEL_EDIT)?
                .and_then(|n| n.handle());
            if let Some(cancel) = cancel {
                ctx.page.click(cancel).await?;
            }
            return Ok(None);
        };

        exit_edit_mode(ctx, turn).await?;
        Ok(Some(value))
    }
}

/// Polls the turn for the edit textarea and returns its value.
async fn find_textarea(ctx: &ExtractContext<'_>, turn: ElementHandle) -> Result<Option<String>> {
    let mut search = ScrollSearch::default();

    for (attempt, delay) in RetryPolicy::TEXTAREA_POLL.schedule() {
        tokio::time::sleep(delay).await;

        let found = {
            let doc = ctx.page.snapshot(turn).await?;
            doc.root().select_first(TEXTAREA)?.and_then(|textarea| {
                let value = textarea.attr("data-value").unwrap_or_default().to_string();
                textarea.handle().map(|handle| (handle, value))
            })
        };
        if let Some((textarea, value)) = found {
            ctx.page.scroll_into_view(textarea, ScrollAlign::Center).await?;
            tokio::time::sleep(TEXTAREA_SETTLE).await;
            return Ok(Some(value));
        }

        if attempt >= SCROLL_SEARCH_AFTER && search.step < MAX_SCROLL_STEPS {
            search.advance(ctx).await?;
        }
    }
    Ok(None)
}

/// Up-then-down scroll of the page's scroll container.
///
/// The first half of the steps scrolls up with growing amounts, the middle
/// step restores the starting position and the rest scroll down.
#[derive(Debug, Default)]
struct ScrollSearch {
    step: u32,
    origin: Option<f64>,
}

impl ScrollSearch {
    const HALFWAY: u32 = MAX_SCROLL_STEPS / 2;

    fn amount(step: u32) -> f64 {
        f64::from(200 + (step % Self::HALFWAY) * 200)
    }

    async fn advance(&mut self, ctx: &ExtractContext<'_>) -> Result<()> {
        if let Some(container) = scroll_container(ctx).await? {
            let top = ctx.page.scroll_top(container).await?;
            if self.step == 0 {
                self.origin = Some(top);
            }

            let amount = Self::amount(self.step);
            if self.step < Self::HALFWAY {
                ctx.page.set_scroll_top(container, (top - amount).max(0.0)).await?;
            } else if self.step == Self::HALFWAY {
                if let Some(origin) = self.origin {
                    ctx.page.set_scroll_top(container, origin).await?;
                }
                tokio::time::sleep(SCROLL_STEP).await;
            } else {
                ctx.page.set_scroll_top(container, top + amount).await?;
            }
        }

        self.step += 1;
        tokio::time::sleep(SCROLL_STEP).await;
        Ok(())
    }
}

async fn scroll_container(ctx: &ExtractContext<'_>) -> Result<Option<ElementHandle>> {
    for selector in SCROLL_CONTAINERS {
        if let Some(container) = ctx.page.query_first(selector).await? {
            return Ok(Some(container));
        }
    }
    Ok(None)
}

async fn exit_edit_mode(ctx: &ExtractContext<'_>, turn: ElementHandle) -> Result<()> {
    let (done, key_target) = {
        let doc = ctx.page.snapshot(turn).await?;
        let root = doc.root();
        let mut done = None;
        for selector in DONE_EDITING {
            if let Some(button) = root.select_first(selector)? {
                done = button.handle();
                break;
            }
        }
        let key_target = root.select_first(KEY_TARGET)?.and_then(|n| n.handle());
        (done, key_target)
    };

    if let Some(done) = done {
        ctx.page.click(done).await?;
    } else if let Some(target) = key_target {
        ctx.page.press_key(target, "Escape").await?;
    } else {
        return Ok(());
    }
    tokio::time::sleep(EXIT_SETTLE).await;
    Ok(())
}
