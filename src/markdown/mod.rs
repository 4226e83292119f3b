//! Markdown to HTML conversion

use async_trait::async_trait;
use comrak::{markdown_to_html, Options};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarkdownError {
    #[error("Markdown conversion failed: {0}")]
    Conversion(String),
}

#[async_trait]
pub trait MarkdownRenderer: Send + Sync {
    async fn render(&self, text: &str) -> Result<String, MarkdownError>;
}

/// GitHub-flavoured markdown through comrak.
///
/// Headings get GitHub-style anchors (`<a class="anchor" id="...">`).
#[derive(Debug, Clone)]
pub struct ComrakRenderer {
    gfm: bool,
}

impl Default for ComrakRenderer {
    fn default() -> Self {
        Self { gfm: true }
    }
}

impl ComrakRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain CommonMark, no tables/strikethrough/autolinks/heading anchors
    pub fn commonmark() -> Self {
        Self { gfm: false }
    }
}

#[async_trait]
impl MarkdownRenderer for ComrakRenderer {
    async fn render(&self, text: &str) -> Result<String, MarkdownError> {
        let mut options = Options::default();
        if self.gfm {
            options.extension.table = true;
            options.extension.strikethrough = true;
            options.extension.autolink = true;
            options.extension.tasklist = true;
            options.extension.header_ids = Some(String::new());
        }

        Ok(markdown_to_html(text, &options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_render_heading_and_paragraph() {
        let html = ComrakRenderer::commonmark()
            .render("# Hello\n\nWorld\n")
            .await
            .unwrap();
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<p>World</p>"));
    }

    #[tokio::test]
    async fn test_heading_anchors() {
        let html = ComrakRenderer::new()
            .render("# Hello World\n")
            .await
            .unwrap();
        assert!(html.contains(r#"class="anchor""#));
        assert!(html.contains(r#"id="hello-world""#));
        assert!(html.contains("Hello World</h1>"));
    }

    #[tokio::test]
    async fn test_metadata_lines_render_invisible() {
        let html = ComrakRenderer::new()
            .render("[meta:subject]: <> (Hidden)\n\nVisible\n")
            .await
            .unwrap();
        assert!(!html.contains("Hidden"));
        assert!(!html.contains("meta:"));
        assert!(html.contains("Visible"));
    }

    #[tokio::test]
    async fn test_gfm_tables() {
        let text = "| a | b |\n|---|---|\n| 1 | 2 |\n";

        let gfm = ComrakRenderer::new().render(text).await.unwrap();
        assert!(gfm.contains("<table>"));

        let plain = ComrakRenderer::commonmark().render(text).await.unwrap();
        assert!(!plain.contains("<table>"));
    }
}
