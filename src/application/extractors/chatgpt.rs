//! ChatGPT (`chatgpt.com`, `chat.openai.com`).
//!
//! Content is read straight from the rendered DOM; citation chips and
//! source footers are cut from a copy before formatting.

use std::time::Duration;

use async_trait::async_trait;

use super::{log_summary, record_outcome, ExtractContext, SiteExtractor};
use crate::application::formatter::format_image_input;
use crate::application::page::ScrollAlign;
use crate::application::sources::DomRead;
use crate::domain::dom::{ElementHandle, NodeRef};
use crate::domain::{ExtractionOutcome, Message, Result, Role, Site, Transcript};

const TURN: &str = r#"[data-testid^="conversation-turn-"]"#;
const AUTHOR: &str = "[data-message-author-role]";
const CONTENT: &str = ".whitespace-pre-wrap, .markdown";
const CITATION_CHIP: &str = "span[data-state]";
const CITATION_LINK: &str = r#"span > a[target="_blank"][rel="noopener"] > span.relative"#;
const FAVICON_SERVICE: &str = "google.com/s2/favicons";

const RENDER_SETTLE: Duration = Duration::from_millis(500);

/// Extracts ChatGPT conversations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatGptExtractor;

#[async_trait]
impl SiteExtractor for ChatGptExtractor {
    fn site(&self) -> Site {
        Site::ChatGpt
    }

    async fn extract(&self, ctx: &ExtractContext<'_>) -> Result<Transcript> {
        let turns = ctx.page.query_all(TURN).await?;
        tracing::debug!(turns = turns.len(), "Found conversation turns");

        let mut transcript = Transcript::new();
        for (index, turn) in turns.iter().enumerate() {
            let outcome = extract_turn(ctx, *turn).await;
            record_outcome(&mut transcript, Site::ChatGpt, index, outcome);
        }

        log_summary(Site::ChatGpt, turns.len(), &transcript);
        Ok(transcript)
    }
}

async fn extract_turn(ctx: &ExtractContext<'_>, turn: ElementHandle) -> Result<ExtractionOutcome> {
    let role = {
        let doc = ctx.page.snapshot(turn).await?;
        let label = doc
            .root()
            .select_first(AUTHOR)?
            .and_then(|n| n.attr("data-message-author-role"))
            .filter(|label| !label.is_empty());
        match label {
            Some(label) => Role::from_label(label),
            None => return Ok(ExtractionOutcome::Failed),
        }
    };

    let align = match role {
        Role::Assistant => ScrollAlign::End,
        Role::User => ScrollAlign::Start,
    };
    ctx.page.scroll_into_view(turn, align).await?;
    tokio::time::sleep(RENDER_SETTLE).await;

    let doc = ctx.page.snapshot(turn).await?;
    let root = doc.root();
    let mut content = String::new();

    for image in root.select("img")? {
        let src = image.attr("src");
        if src.is_some_and(is_favicon) {
            continue;
        }
        content.push_str(&format_image_input(src, image.attr("alt"), role));
        content.push('\n');
    }

    if let Some(body) = root.select_first(CONTENT)? {
        content.push_str(&DomRead::pruned(citation_chrome).render(&doc, body)?);
    }

    Ok(if content.trim().is_empty() {
        ExtractionOutcome::Failed
    } else {
        ExtractionOutcome::Extracted(Message::new(role, content))
    })
}

fn is_favicon(src: &str) -> bool {
    src.contains(FAVICON_SERVICE)
}

/// Inline citation chips, source footers and favicon images.
fn citation_chrome(body: NodeRef<'_>) -> Result<Vec<NodeRef<'_>>> {
    let mut removed = Vec::new();

    for chip in body.select(CITATION_CHIP)? {
        if chip.select_first(CITATION_LINK)?.is_some() {
            removed.push(chip);
        }
    }

    for div in body.select("div")? {
        let sources_button = div
            .select("button")?
            .iter()
            .any(|b| b.text_content().contains("Sources"));
        let favicons = div
            .select("img")?
            .iter()
            .any(|img| img.attr("src").is_some_and(is_favicon));
        if sources_button || favicons {
            removed.push(div);
        }
    }

    removed.extend(
        body.select("img")?
            .into_iter()
            .filter(|img| img.attr("src").is_some_and(is_favicon)),
    );
    Ok(removed)
}
