//! Artifacts: code and documents Claude renders in a side panel.

use std::time::Duration;

use super::{close_any_panel, locate};
use crate::application::extractors::ExtractContext;
use crate::application::retry::{Attempt, RetryPolicy};
use crate::application::text_formatter::language_from_class;
use crate::domain::dom::{Document, ElementHandle, NodeRef};
use crate::domain::{AppError, Result};

const ARTIFACT_BLOCK: &str = ".artifact-block-cell";
const SEGMENTED_CONTROL: &str = r#"[role="group"].group\/segmented-control"#;
const CODE_TAB: &str = r#"button[aria-label="Code"]"#;
const PREVIEW_TAB: &str = r#"button[aria-label="Preview"]"#;
const CODE_ELEMENT: &str = ".code-block__code code";
const PANEL_CONTAINER: &str = r#"div[class*="flex"][class*="h-full"]"#;

const TAB_SETTLE: Duration = Duration::from_millis(300);
const COPY_SETTLE: Duration = Duration::from_millis(200);
const CLOSE_SETTLE: Duration = Duration::from_millis(200);
const BETWEEN_ITEMS: Duration = Duration::from_millis(300);

const UNTITLED: &str = "Untitled Artifact";

/// Reads every artifact linked from an assistant message.
///
/// Failed artifacts are logged and left out.
pub(super) async fn extract_all(ctx: &ExtractContext<'_>, container: ElementHandle) -> Result<Vec<String>> {
    let blocks = {
        let doc = ctx.page.snapshot(container).await?;
        outermost_blocks(locate(&doc, container)?)?
    };
    if blocks.is_empty() {
        return Ok(Vec::new());
    }
    tracing::debug!(artifacts = blocks.len(), "Found artifact blocks");

    let mut artifacts = Vec::new();
    let mut failed = 0;
    for (index, (block, title)) in blocks.iter().enumerate() {
        match extract_one(ctx, *block, title).await {
            Ok(Some(artifact)) => artifacts.push(artifact),
            Ok(None) => {
                failed += 1;
                tracing::warn!(artifact = index + 1, %title, "Artifact could not be read");
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(artifact = index + 1, %title, error = %e, "Artifact extraction failed");
            }
        }
        tokio::time::sleep(BETWEEN_ITEMS).await;
    }

    if failed > 0 {
        tracing::warn!(failed, total = blocks.len(), "Some artifacts were not extracted");
    }
    Ok(artifacts)
}

/// Artifact blocks with their titles, skipping blocks nested in another.
fn outermost_blocks(container: NodeRef<'_>) -> Result<Vec<(ElementHandle, String)>> {
    let mut unique: Vec<NodeRef<'_>> = Vec::new();
    for block in container.select(ARTIFACT_BLOCK)? {
        if !unique.iter().any(|outer| outer.contains(block)) {
            unique.push(block);
        }
    }

    let mut blocks = Vec::with_capacity(unique.len());
    for block in unique {
        if let Some(handle) = block.handle() {
            blocks.push((handle, title_of(block)?));
        }
    }
    Ok(blocks)
}

fn title_of(block: NodeRef<'_>) -> Result<String> {
    let title = block
        .select_first(".flex-col")?
        .and_then(|col| col.element_children().next())
        .map(|first| first.text_content().trim().to_string())
        .filter(|t| !t.is_empty());
    Ok(title.unwrap_or_else(|| UNTITLED.to_string()))
}

async fn extract_one(ctx: &ExtractContext<'_>, block: ElementHandle, title: &str) -> Result<Option<String>> {
    RetryPolicy::ARTIFACT_PANEL
        .run("artifact panel", move |_, settle| async move {
            ctx.page.click(block).await?;
            tokio::time::sleep(settle).await;

            let mut doc = ctx.page.document().await?;
            if switch_to_code(ctx, &doc).await? {
                doc = ctx.page.document().await?;
            }

            let Some(panel) = PanelControls::find(&doc)? else {
                tracing::debug!(%block, "Artifact copy button not found");
                close_any_panel(ctx).await?;
                return Ok::<_, AppError>(Attempt::GiveUp);
            };

            let code = ctx.clipboard.copy_from(ctx.page, panel.copy, COPY_SETTLE).await?;
            if let Some(close) = panel.close {
                ctx.page.click(close).await?;
                tokio::time::sleep(CLOSE_SETTLE).await;
            }

            Ok(match code {
                Some(code) => Attempt::Done(format!(
                    "Artifact: {title}\n\n```{}\n{code}\n```",
                    panel.language
                )),
                None => Attempt::Retry,
            })
        })
        .await
}

/// Selects the Code tab when the panel offers a Code/Preview toggle.
///
/// Returns whether the tab was switched.
async fn switch_to_code(ctx: &ExtractContext<'_>, doc: &Document) -> Result<bool> {
    let Some(control) = doc.select_first(SEGMENTED_CONTROL)? else {
        return Ok(false);
    };
    let (Some(code), Some(_)) = (control.select_first(CODE_TAB)?, control.select_first(PREVIEW_TAB)?) else {
        return Ok(false);
    };
    if code.attr("data-state") == Some("on") {
        return Ok(false);
    }
    let Some(handle) = code.handle() else {
        return Ok(false);
    };
    ctx.page.click(handle).await?;
    tokio::time::sleep(TAB_SETTLE).await;
    Ok(true)
}

/// Controls of an open artifact panel.
struct PanelControls {
    copy: ElementHandle,
    close: Option<ElementHandle>,
    language: String,
}

impl PanelControls {
    fn find(doc: &Document) -> Result<Option<Self>> {
        let Some(copy) = panel_copy_button(doc)? else {
            return Ok(None);
        };
        let Some(copy_handle) = copy.handle() else {
            return Ok(None);
        };

        let language = match copy.ancestors().nth(3) {
            Some(scope) => scope
                .select_first(CODE_ELEMENT)?
                .and_then(|code| code.attr("class"))
                .and_then(language_from_class)
                .unwrap_or_default()
                .to_string(),
            None => String::new(),
        };

        let panel = match copy.closest(PANEL_CONTAINER)? {
            Some(panel) => Some(panel),
            None => copy
                .closest("div")?
                .and_then(|div| div.parent())
                .and_then(|n| n.parent()),
        };
        let close = match panel {
            Some(panel) => panel
                .select("button")?
                .into_iter()
                .last()
                .filter(|last| *last != copy)
                .and_then(|button| button.handle()),
            None => None,
        };

        Ok(Some(Self {
            copy: copy_handle,
            close,
            language,
        }))
    }
}

/// The panel's own "Copy" button, which is followed by a dropdown button.
///
/// Action-bar copy buttons carry a `data-testid` and are skipped.
fn panel_copy_button(doc: &Document) -> Result<Option<NodeRef<'_>>> {
    Ok(doc.select("button")?.into_iter().find(|button| {
        !button.has_attr("data-testid")
            && button.text_content().trim() == "Copy"
            && button.next_element_sibling().is_some_and(|next| next.is("button"))
    }))
}
