//! Handlebars-backed template engine

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use handlebars::Handlebars;

use super::{EngineError, RenderFn, TemplateEngine};

/// Engine identifiers rendered with handlebars
const ENGINES: &[&str] = &["html", "hbs", "handlebars"];

/// Renders `.html`/`.hbs`/`.handlebars` templates.
///
/// Template files are HTML-escaped (`{{{value}}}` stays raw); markdown
/// sources passed to `compile_source` are not escaped.
#[derive(Default)]
pub struct HandlebarsEngine {
    cache: DashMap<PathBuf, RenderFn>,
}

impl HandlebarsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached template files
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn ensure_supported(&self, engine: &str) -> Result<(), EngineError> {
        if self.supports(engine) {
            Ok(())
        } else {
            Err(EngineError::UnsupportedEngine(engine.to_string()))
        }
    }
}

fn build(name: &str, source: &str, escape: bool) -> Result<RenderFn, EngineError> {
    let mut registry = Handlebars::new();
    if !escape {
        registry.register_escape_fn(handlebars::no_escape);
    }

    registry
        .register_template_string(name, source)
        .map_err(|e| EngineError::Template {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

    let registry = Arc::new(registry);
    let name = name.to_string();

    Ok(Arc::new(move |data: &serde_json::Value| {
        registry
            .render(&name, data)
            .map_err(|e| EngineError::Render(e.to_string()))
    }))
}

#[async_trait]
impl TemplateEngine for HandlebarsEngine {
    fn supports(&self, engine: &str) -> bool {
        ENGINES.contains(&engine)
    }

    async fn fetch(&self, template_path: &Path, engine: &str) -> Result<RenderFn, EngineError> {
        self.ensure_supported(engine)?;

        if let Some(render) = self.cache.get(template_path) {
            return Ok(render.clone());
        }

        let source = tokio::fs::read_to_string(template_path)
            .await
            .map_err(|e| EngineError::Io {
                path: template_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let render = build(&template_path.display().to_string(), &source, true)?;
        self.cache
            .insert(template_path.to_path_buf(), render.clone());

        tracing::debug!(
            path = %template_path.display(),
            engine = %engine,
            "Template file compiled"
        );

        Ok(render)
    }

    async fn compile_source(
        &self,
        name: &str,
        source: &str,
        engine: &str,
    ) -> Result<RenderFn, EngineError> {
        self.ensure_supported(engine)?;
        build(name, source, false)
    }

    fn clear(&self) {
        self.cache.clear();
    }
}
