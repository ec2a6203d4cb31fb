//! Pasted documents and attached files, read through the preview panel.

use std::time::Duration;

use super::{close_any_panel, is_pasted_badge, locate, BADGE};
use crate::application::extractors::ExtractContext;
use crate::application::formatter::format_image_input;
use crate::application::retry::{Attempt, RetryPolicy};
use crate::domain::dom::{ElementHandle, NodeRef};
use crate::domain::{AppError, Result, Role};

const FILE_THUMBNAIL: &str = r#"div[data-testid="file-thumbnail"]"#;
const THUMBNAIL_GROUP: &str = r"div.group\/thumbnail";
const FLEX_COL: &str = ".flex-col";
const BADGE_IN_FLEX_COL: &str = ".flex-col .text-text-300";
const PANEL_CONTENT: &str = ".whitespace-pre-wrap.break-all.text-xs";
const CLOSE_PREVIEW: &str = r#"button[data-testid="close-file-preview"]"#;

const THUMBNAIL_SETTLE: Duration = Duration::from_millis(125);
const CLOSE_SETTLE: Duration = Duration::from_millis(200);
const BETWEEN_ITEMS: Duration = Duration::from_millis(300);

/// Reads every pasted document in a message group.
///
/// Documents that cannot be read are logged and left out.
pub(super) async fn extract_all(ctx: &ExtractContext<'_>, container: ElementHandle) -> Result<Vec<String>> {
    let blocks = {
        let doc = ctx.page.snapshot(container).await?;
        pasted_blocks(locate(&doc, container)?)?
    };
    if blocks.is_empty() {
        return Ok(Vec::new());
    }
    tracing::debug!(blocks = blocks.len(), "Found pasted content");

    let mut contents = Vec::new();
    for (index, block) in blocks.iter().enumerate() {
        match extract_one(ctx, *block).await {
            Ok(Some(content)) => contents.push(content),
            Ok(None) => tracing::warn!(block = index + 1, "Pasted content could not be read"),
            Err(e) => tracing::warn!(block = index + 1, error = %e, "Pasted content extraction failed"),
        }
        tokio::time::sleep(BETWEEN_ITEMS).await;
    }
    Ok(contents)
}

/// Clickable blocks carrying a "pasted" badge, in page order.
fn pasted_blocks(container: NodeRef<'_>) -> Result<Vec<ElementHandle>> {
    let mut blocks: Vec<NodeRef<'_>> = Vec::new();

    for thumbnail in container.select(FILE_THUMBNAIL)? {
        if let Some(flex_col) = thumbnail.select_first(FLEX_COL)? {
            if flex_col.select_first(BADGE)?.is_some_and(is_pasted_badge) {
                blocks.push(flex_col);
            }
        }
    }

    for badge in container.select(BADGE_IN_FLEX_COL)? {
        if !is_pasted_badge(badge) {
            continue;
        }
        if let Some(flex_col) = badge.closest(FLEX_COL)? {
            if !blocks.contains(&flex_col) {
                blocks.push(flex_col);
            }
        }
    }

    Ok(blocks.into_iter().filter_map(|b| b.handle()).collect())
}

enum PanelRead {
    Text(String),
    Empty,
    Missing,
}

async fn extract_one(ctx: &ExtractContext<'_>, block: ElementHandle) -> Result<Option<String>> {
    RetryPolicy::PASTED_PANEL
        .run("pasted content", move |_, settle| async move {
            Ok::<_, AppError>(match open_panel(ctx, block, settle).await? {
                PanelRead::Text(text) => {
                    Attempt::Done(format!("Pasted Content\n\n```\n{text}\n```"))
                }
                PanelRead::Empty => Attempt::Retry,
                PanelRead::Missing => Attempt::GiveUp,
            })
        })
        .await
}

/// Clicks `trigger`, waits and reads the preview panel, closing it again.
async fn open_panel(ctx: &ExtractContext<'_>, trigger: ElementHandle, settle: Duration) -> Result<PanelRead> {
    ctx.page.click(trigger).await?;
    tokio::time::sleep(settle).await;

    let Some(content) = ctx.page.query_first(PANEL_CONTENT).await? else {
        tracing::debug!(%trigger, "Preview panel content not found");
        close_any_panel(ctx).await?;
        return Ok(PanelRead::Missing);
    };
    let text = ctx.page.snapshot(content).await?.root().text_content();

    if let Some(close) = ctx.page.query_first(CLOSE_PREVIEW).await? {
        ctx.page.click(close).await?;
        tokio::time::sleep(CLOSE_SETTLE).await;
    }

    Ok(if text.is_empty() {
        PanelRead::Empty
    } else {
        PanelRead::Text(text)
    })
}

/// Reads plain file attachments and images next to a user message.
///
/// Files already handled as pasted documents are skipped.
pub(super) async fn read_attachments(ctx: &ExtractContext<'_>, container: ElementHandle) -> Result<Option<String>> {
    let (files, images) = {
        let doc = ctx.page.snapshot(container).await?;
        let group = locate(&doc, container)?
            .select_first(THUMBNAIL_GROUP)?
            .and_then(|n| n.parent())
            .and_then(|n| n.parent());
        let Some(group) = group else {
            return Ok(None);
        };

        let mut files = Vec::new();
        for thumbnail in group.select(FILE_THUMBNAIL)? {
            let pasted = match thumbnail.select_first(FLEX_COL)? {
                Some(flex_col) => flex_col.select_first(BADGE)?.is_some_and(is_pasted_badge),
                None => false,
            };
            if !pasted {
                files.extend(thumbnail.handle());
            }
        }

        let images: Vec<String> = group
            .select("img")?
            .into_iter()
            .map(|img| format_image_input(img.attr("src"), img.attr("alt"), Role::User))
            .collect();
        (files, images)
    };

    if files.is_empty() && images.is_empty() {
        return Ok(None);
    }

    let mut contents = Vec::new();
    for file in files {
        match open_panel(ctx, file, THUMBNAIL_SETTLE).await? {
            PanelRead::Text(text) if ctx.settings.fence_pasted_files => {
                contents.push(format!("```\n{text}\n```\n"));
            }
            PanelRead::Text(text) => contents.push(text),
            PanelRead::Empty | PanelRead::Missing => {
                tracing::debug!(%file, "Attached file has no readable preview");
            }
        }
    }
    contents.extend(images);

    Ok(if contents.is_empty() {
        None
    } else {
        Some(contents.join("\n"))
    })
}
