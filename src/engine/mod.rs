//! Rendering engines for template files and markdown sources.
//!
//! The composer never renders templates itself; it asks a [`TemplateEngine`]
//! for a [`RenderFn`] once per template and reuses it for every send.

mod handlebars_engine;

pub use handlebars_engine::HandlebarsEngine;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// A compiled template: data in, markup out
pub type RenderFn = Arc<dyn Fn(&serde_json::Value) -> Result<String, EngineError> + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unsupported template engine: {0}")]
    UnsupportedEngine(String),

    #[error("Failed to read template {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Invalid template {name}: {reason}")]
    Template { name: String, reason: String },

    #[error("Render failed: {0}")]
    Render(String),
}

#[async_trait]
pub trait TemplateEngine: Send + Sync {
    /// Whether `engine` (a file extension such as `hbs`) is handled here.
    fn supports(&self, engine: &str) -> bool;

    /// Compile the template file at `template_path`.
    ///
    /// Implementations may cache per path; the cache lives until [`clear`].
    ///
    /// [`clear`]: TemplateEngine::clear
    async fn fetch(&self, template_path: &Path, engine: &str) -> Result<RenderFn, EngineError>;

    /// Compile in-memory template text, e.g. the markdown source itself.
    async fn compile_source(
        &self,
        name: &str,
        source: &str,
        engine: &str,
    ) -> Result<RenderFn, EngineError>;

    /// Release everything cached by `fetch`.
    fn clear(&self);
}

/// Render function used when a template has no engine file next to it:
/// the rendered markdown body is the whole HTML.
pub fn markdown_passthrough() -> RenderFn {
    Arc::new(|context: &serde_json::Value| -> Result<String, EngineError> {
        Ok(context
            .get("markdown")
            .and_then(|markdown| markdown.as_str())
            .unwrap_or_default()
            .to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_markdown_passthrough() {
        let render = markdown_passthrough();
        assert_eq!(render(&json!({"markdown": "<p>hi</p>"})).unwrap(), "<p>hi</p>");
        assert_eq!(render(&json!({})).unwrap(), "");
    }
}
