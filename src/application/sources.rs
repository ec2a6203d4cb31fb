//! Ways of reading the content of one message element.

use async_trait::async_trait;

use super::extractors::ExtractContext;
use super::retry::{Attempt, RetryPolicy};
use super::text_formatter::extract_formatted_text;
use crate::domain::dom::{Document, ElementHandle, NodeRef};
use crate::domain::{AppError, Result};

/// A source of message content for a given element.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Reads the element's content; `None` when the source yields nothing.
    async fn read(&self, ctx: &ExtractContext<'_>, target: ElementHandle) -> Result<Option<String>>;
}

/// Selects nodes to drop from a snapshot before formatting.
pub type Pruner = for<'a> fn(NodeRef<'a>) -> Result<Vec<NodeRef<'a>>>;

/// Formats a snapshot of the element with the DOM text formatter.
#[derive(Clone, Copy, Default)]
pub struct DomRead {
    prune: Option<Pruner>,
}

impl DomRead {
    /// Formats the subtree as is.
    #[must_use]
    pub const fn plain() -> Self {
        Self { prune: None }
    }

    /// Drops the nodes chosen by `prune` from a copy of the subtree first.
    #[must_use]
    pub const fn pruned(prune: Pruner) -> Self {
        Self { prune: Some(prune) }
    }

    /// Formats an already captured node.
    ///
    /// # Errors
    /// Returns error if the pruner fails.
    pub fn render(&self, doc: &Document, node: NodeRef<'_>) -> Result<String> {
        match self.prune {
            Some(prune) => {
                let removed = prune(node)?;
                let copy = doc.pruned(node, &removed);
                Ok(extract_formatted_text(copy.root()))
            }
            None => Ok(extract_formatted_text(node)),
        }
    }
}

#[async_trait]
impl ContentSource for DomRead {
    async fn read(&self, ctx: &ExtractContext<'_>, target: ElementHandle) -> Result<Option<String>> {
        let doc = ctx.page.snapshot(target).await?;
        let text = self.render(&doc, doc.root())?;
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}

/// Clicks a copy affordance and reads the clipboard, retrying on silence.
#[derive(Clone, Copy)]
pub struct ClipboardCopy {
    policy: RetryPolicy,
    cleanup: Option<fn(&str) -> String>,
}

impl ClipboardCopy {
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cleanup: None,
        }
    }

    /// Post-processes copied text.
    #[must_use]
    pub const fn with_cleanup(mut self, cleanup: fn(&str) -> String) -> Self {
        self.cleanup = Some(cleanup);
        self
    }
}

#[async_trait]
impl ContentSource for ClipboardCopy {
    async fn read(&self, ctx: &ExtractContext<'_>, target: ElementHandle) -> Result<Option<String>> {
        let copied = self
            .policy
            .run("clipboard copy", move |_, settle| async move {
                let copied = ctx.clipboard.copy_from(ctx.page, target, settle).await?;
                Ok::<_, AppError>(copied.map_or(Attempt::Retry, Attempt::Done))
            })
            .await?;
        Ok(copied.map(|text| match self.cleanup {
            Some(cleanup) => cleanup(&text),
            None => text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::extractors::ExtractSettings;
    use crate::application::ClipboardBridge;
    use crate::domain::dom::Element;
    use crate::testing::{FakeClipboard, FakePage};

    fn drop_buttons(node: NodeRef<'_>) -> Result<Vec<NodeRef<'_>>> {
        node.select("button")
    }

    #[tokio::test(start_paused = true)]
    async fn test_dom_read_prunes_a_copy() {
        let page = FakePage::new(
            "https://chatgpt.com/c/1",
            Element::new("div")
                .with_class("markdown")
                .with_child(Element::new("p").with_text("Answer"))
                .with_child(Element::new("button").with_text("Retry")),
        );
        let clipboard = ClipboardBridge::new(Box::new(FakeClipboard::new(&page)));
        let ctx = ExtractContext::new(&page, &clipboard, ExtractSettings::default());
        let target = page.handle_of(".markdown");

        let text = DomRead::pruned(drop_buttons).read(&ctx, target).await.unwrap();
        assert_eq!(text.as_deref(), Some("Answer"));
        assert_eq!(page.handles_of("button").len(), 1);

        let text = DomRead::plain().read(&ctx, target).await.unwrap();
        assert_eq!(text.as_deref(), Some("Answer\nRetry"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clipboard_copy_retries_then_cleans_up() {
        let page = FakePage::new("https://claude.ai/chat/1", Element::new("button"));
        let button = page.handle_of("button");
        let mut clicks = 0;
        page.on_click(button, move |state| {
            clicks += 1;
            if clicks == 2 {
                state.clipboard = "  copied  ".into();
            }
        });
        let clipboard = ClipboardBridge::new(Box::new(FakeClipboard::new(&page)));
        let ctx = ExtractContext::new(&page, &clipboard, ExtractSettings::default());

        let text = ClipboardCopy::new(RetryPolicy::ACTION_BAR_COPY)
            .with_cleanup(|t| t.trim().to_string())
            .read(&ctx, button)
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("copied"));
        assert_eq!(page.clicks().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clipboard_copy_gives_none_when_nothing_is_copied() {
        let page = FakePage::new("https://claude.ai/chat/1", Element::new("button"));
        let button = page.handle_of("button");
        let clipboard = ClipboardBridge::new(Box::new(FakeClipboard::new(&page)));
        let ctx = ExtractContext::new(&page, &clipboard, ExtractSettings::default());

        let text = ClipboardCopy::new(RetryPolicy::ACTION_BAR_COPY)
            .read(&ctx, button)
            .await
            .unwrap();
        assert_eq!(text, None);
        assert_eq!(page.clicks().len(), 3);
    }
}
