//! Rendered-DOM to Markdown-flavoured text conversion.
//!
//! Works on detached snapshots only; the live page is never touched.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::dom::NodeRef;

#[allow(clippy::expect_used)]
static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Class markers of web-search citation containers.
const CITATION_CLASSES: [&str; 2] = ["sources-container", "source-item"];

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    list_level: usize,
    in_list: bool,
}

impl Context {
    const fn in_list(self) -> Self {
        Self {
            list_level: self.list_level,
            in_list: true,
        }
    }

    const fn nested_list(self) -> Self {
        Self {
            list_level: self.list_level + 1,
            in_list: true,
        }
    }
}

/// Converts a content subtree into normalized text.
///
/// Headings, emphasis, links, lists and code are rendered as Markdown;
/// citation chrome is dropped. The result has no leading newlines, runs of
/// three or more newlines collapsed to two, and ends with a newline only
/// when it ends in a code fence.
#[must_use]
pub fn extract_formatted_text(root: NodeRef<'_>) -> String {
    normalize(&render(root, Context::default()))
}

/// Language tag from a `language-*` class token.
#[must_use]
pub fn language_from_class(class: &str) -> Option<&str> {
    class
        .split_ascii_whitespace()
        .find_map(|token| token.strip_prefix("language-"))
        .filter(|lang| !lang.is_empty())
}

fn render(node: NodeRef<'_>, ctx: Context) -> String {
    if let Some(text) = node.as_text() {
        return text.trim().to_string();
    }
    if is_citation_chrome(node) {
        return String::new();
    }

    match node.tag().unwrap_or_default() {
        "pre" => render_code_block(node),
        "code" if !node.parent().is_some_and(|p| p.is("pre")) => {
            format!("`{}`", node.text_content())
        }
        "ul" | "ol" => {
            let mut out = render_children(node, ctx.nested_list());
            if ctx.list_level == 0 {
                out.push('\n');
            }
            out
        }
        "li" => format!(
            "\n{}- {}",
            "  ".repeat(ctx.list_level.saturating_sub(1)),
            render_children(node, ctx.in_list())
        ),
        "p" if ctx.in_list => render_children(node, ctx),
        "p" => format!("\n{}\n", render_children(node, ctx)),
        "h1" => format!("\n# {}\n", node.text_content()),
        "h2" => format!("\n## {}\n", node.text_content()),
        "h3" => format!("\n### {}\n", node.text_content()),
        "strong" | "b" => format!("**{}**", node.text_content()),
        "em" | "i" => format!("*{}*", node.text_content()),
        "a" => format!(
            "[{}]({})",
            node.text_content(),
            node.attr("href").unwrap_or_default()
        ),
        _ => render_children(node, ctx),
    }
}

fn render_children(node: NodeRef<'_>, ctx: Context) -> String {
    node.children().map(|child| render(child, ctx)).collect()
}

fn render_code_block(pre: NodeRef<'_>) -> String {
    let code = pre.descendants().find(|n| n.is("code"));
    let language = code
        .and_then(|c| c.attr("class"))
        .and_then(language_from_class)
        .unwrap_or_default();
    let body = code.map_or_else(|| pre.text_content(), |c| c.text_content());
    format!("```{language}\n{body}\n```\n")
}

fn is_citation_chrome(node: NodeRef<'_>) -> bool {
    let is_sources_icon =
        |n: NodeRef<'_>| n.is("svg") && n.attr("aria-label") == Some("Sources");

    is_sources_icon(node)
        || node.element_children().any(is_sources_icon)
        || CITATION_CLASSES.iter().any(|c| node.has_class(c))
        || node.text_content().trim() == "Sources"
}

fn normalize(raw: &str) -> String {
    let collapsed = EXCESS_NEWLINES.replace_all(raw, "\n\n");
    let mut text = collapsed.trim().to_string();
    if text.ends_with("```") {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dom::{Document, Element, Node};

    fn format(element: Element) -> String {
        let doc = Document::from_node(&Node::from(element));
        extract_formatted_text(doc.root())
    }

    fn div() -> Element {
        Element::new("div")
    }

    #[test]
    fn test_paragraphs_are_separated() {
        let input = div()
            .with_child(Element::new("p").with_text("Hello"))
            .with_child(Element::new("p").with_text("World"));
        assert_eq!(format(input), "Hello\n\nWorld");
    }

    #[test]
    fn test_nested_list_keeps_indentation() {
        let input = div().with_child(
            Element::new("ul")
                .with_child(Element::new("li").with_text("A"))
                .with_child(
                    Element::new("li")
                        .with_text("B")
                        .with_child(Element::new("ul").with_child(Element::new("li").with_text("C"))),
                ),
        );
        assert_eq!(format(input), "- A\n- B\n  - C");
    }

    #[test]
    fn test_code_block_with_language() {
        let input = div().with_child(
            Element::new("pre").with_child(
                Element::new("code")
                    .with_class("language-python")
                    .with_text("print(1)"),
            ),
        );
        assert_eq!(format(input), "```python\nprint(1)\n```\n");
    }

    #[test]
    fn test_code_block_without_code_element() {
        let input = div().with_child(Element::new("pre").with_text("raw"));
        assert_eq!(format(input), "```\nraw\n```\n");
    }

    #[test]
    fn test_inline_markup() {
        let input = Element::new("p")
            .with_text("Use ")
            .with_child(Element::new("code").with_text("cargo"))
            .with_text(" and ")
            .with_child(Element::new("strong").with_text("read"))
            .with_child(Element::new("em").with_text("docs"))
            .with_child(
                Element::new("a")
                    .with_attr("href", "https://doc.rust-lang.org/")
                    .with_text("here"),
            );
        assert_eq!(
            format(input),
            "Use`cargo`and**read***docs*[here](https://doc.rust-lang.org/)"
        );
    }

    #[test]
    fn test_headings_use_raw_text() {
        let input = div()
            .with_child(
                Element::new("h2")
                    .with_text("Setup ")
                    .with_child(Element::new("em").with_text("now")),
            )
            .with_child(Element::new("p").with_text("Body"));
        assert_eq!(format(input), "## Setup now\n\nBody");
    }

    #[test]
    fn test_paragraph_inside_list_item_does_not_break() {
        let input = Element::new("ol").with_child(
            Element::new("li").with_child(Element::new("p").with_text("Step one")),
        );
        assert_eq!(format(input), "- Step one");
    }

    #[test]
    fn test_citation_chrome_is_skipped() {
        let input = div()
            .with_child(Element::new("p").with_text("Answer"))
            .with_child(
                Element::new("div")
                    .with_class("sources-container")
                    .with_text("example.com"),
            )
            .with_child(Element::new("button").with_text("Sources"))
            .with_child(
                Element::new("span")
                    .with_child(Element::new("svg").with_attr("aria-label", "Sources"))
                    .with_text("3 links"),
            );
        assert_eq!(format(input), "Answer");
    }

    #[test]
    fn test_plain_text_is_idempotent() {
        let once = format(div().with_text("  just text  "));
        assert_eq!(once, "just text");
        assert_eq!(format(div().with_text(once.clone())), once);
    }

    #[test]
    fn test_excess_newlines_collapse() {
        let input = div()
            .with_child(Element::new("p").with_text("a"))
            .with_child(Element::new("p"))
            .with_child(Element::new("p"))
            .with_child(Element::new("p").with_text("b"));
        assert_eq!(format(input), "a\n\nb");
    }

    #[test]
    fn test_language_from_class() {
        assert_eq!(language_from_class("hljs language-rust"), Some("rust"));
        assert_eq!(language_from_class("language-"), None);
        assert_eq!(language_from_class("plain"), None);
    }
}
