//! CSS inlining of composed HTML.
//!
//! Mail clients ignore `<style>` blocks, so the composed HTML goes through an
//! inliner before delivery. The inliner resolves relative stylesheet links
//! against `base_url`, which is the `file://` URL of the template file.

use async_trait::async_trait;
use css_inline::{CSSInliner, Url};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InlineError {
    #[error("Failed to load stylesheet {url}: {reason}")]
    Stylesheet { url: String, reason: String },

    #[error("Failed to inline CSS: {0}")]
    Inline(String),
}

#[async_trait]
pub trait CssInliner: Send + Sync {
    async fn inline(&self, html: &str, base_url: &str) -> Result<String, InlineError>;
}

/// Moves `<style>` rules and linked stylesheets into `style` attributes.
#[derive(Debug, Clone)]
pub struct StyleInliner {
    load_stylesheets: bool,
}

impl Default for StyleInliner {
    fn default() -> Self {
        Self {
            load_stylesheets: true,
        }
    }
}

impl StyleInliner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inline `<style>` blocks only, leave `<link>` stylesheets alone
    pub fn without_stylesheets() -> Self {
        Self {
            load_stylesheets: false,
        }
    }
}

#[async_trait]
impl CssInliner for StyleInliner {
    async fn inline(&self, html: &str, base_url: &str) -> Result<String, InlineError> {
        let base = Url::parse(base_url)
            .map_err(|e| {
                tracing::debug!(base_url = %base_url, error = %e, "Unusable base URL for CSS inlining");
            })
            .ok();

        let inliner = CSSInliner::options()
            .base_url(base)
            .load_remote_stylesheets(self.load_stylesheets)
            .build();

        inliner
            .inline(html)
            .map_err(|e| InlineError::Inline(e.to_string()))
    }
}

/// Leaves the HTML untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughInliner;

#[async_trait]
impl CssInliner for PassthroughInliner {
    async fn inline(&self, html: &str, base_url: &str) -> Result<String, InlineError> {
        tracing::trace!(base_url = %base_url, "Skipping CSS inlining");
        Ok(html.to_string())
    }
}
