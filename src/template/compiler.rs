//! Lazy, at-most-once template compilation

use std::sync::Arc;

use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;

use crate::engine::{markdown_passthrough, EngineError, TemplateEngine};
use crate::error::{CompileError, ComposeError, Result};
use crate::markdown::MarkdownRenderer;
use crate::metrics::TemplateMetrics;

use super::metadata;
use super::registry::TemplateRegistry;
use super::types::{CompiledEntry, TemplateSlot, TemplateSource};

type PendingCompile = Shared<BoxFuture<'static, std::result::Result<Arc<CompiledEntry>, CompileError>>>;

/// Resolves registered templates into compiled entries.
///
/// A template is compiled on first lookup and cached in the registry.
/// Concurrent lookups of a template that is still compiling wait on the
/// same compile instead of starting another one. A failed compile is not
/// cached; the next lookup tries again.
pub struct TemplateCompiler {
    registry: Arc<TemplateRegistry>,
    engine: Arc<dyn TemplateEngine>,
    markdown: Arc<dyn MarkdownRenderer>,
    in_flight: Arc<DashMap<String, PendingCompile>>,
}

impl TemplateCompiler {
    pub fn new(
        registry: Arc<TemplateRegistry>,
        engine: Arc<dyn TemplateEngine>,
        markdown: Arc<dyn MarkdownRenderer>,
    ) -> Self {
        Self {
            registry,
            engine,
            markdown,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    /// Number of compiles currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Look up `name`, compiling it with `data` if this is the first use.
    #[tracing::instrument(name = "compiler.find", skip(self, data), fields(template = %name))]
    pub async fn find(&self, name: &str, data: &Value) -> Result<Arc<CompiledEntry>> {
        if self.registry.is_closed() {
            return Err(ComposeError::Destroyed);
        }

        let source = match self.registry.get(name) {
            None => return Err(ComposeError::UnknownTemplate(name.to_string())),
            Some(TemplateSlot::Compiled(entry)) => return Ok(entry),
            Some(TemplateSlot::Source(source)) => source,
        };

        let pending = match self.in_flight.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                tracing::debug!(template = %name, "Joining in-flight compile");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                // A compile may have finished since the lookup above
                if let Some(TemplateSlot::Compiled(compiled)) = self.registry.get(name) {
                    return Ok(compiled);
                }

                let pending = self.start_compile(source, data.clone());
                entry.insert(pending.clone());
                pending
            }
        };

        let result = pending.await;

        if self.registry.is_closed() {
            return Err(ComposeError::Destroyed);
        }

        result.map_err(|source| ComposeError::Compile {
            name: name.to_string(),
            source,
        })
    }

    fn start_compile(&self, source: TemplateSource, data: Value) -> PendingCompile {
        let registry = self.registry.clone();
        let engine = self.engine.clone();
        let markdown = self.markdown.clone();
        let in_flight = self.in_flight.clone();

        async move {
            let name = source.name.clone();
            let result = compile(engine.as_ref(), markdown.as_ref(), source, &data).await;

            match &result {
                Ok(entry) => {
                    registry.mark_compiled(entry.clone());
                    TemplateMetrics::record_compile("success");
                    tracing::info!(
                        template = %name,
                        metadata_keys = entry.metadata.len(),
                        "Template compiled"
                    );
                }
                Err(e) => {
                    TemplateMetrics::record_compile("failure");
                    tracing::warn!(template = %name, error = %e, "Template compile failed");
                }
            }

            in_flight.remove(&name);
            result
        }
        .boxed()
        .shared()
    }
}

fn engine_error(e: EngineError) -> CompileError {
    CompileError::Engine(e.to_string())
}

async fn compile(
    engine: &dyn TemplateEngine,
    markdown: &dyn MarkdownRenderer,
    source: TemplateSource,
    data: &Value,
) -> std::result::Result<Arc<CompiledEntry>, CompileError> {
    tracing::debug!(
        template = %source.name,
        engine = %source.engine,
        path = %source.file_path.display(),
        "Compiling template"
    );

    let raw_text = tokio::fs::read_to_string(&source.file_path)
        .await
        .map_err(|e| CompileError::Io {
            path: source.file_path.clone(),
            reason: e.to_string(),
        })?;

    let render_fn = if tokio::fs::try_exists(&source.template_path)
        .await
        .unwrap_or(false)
    {
        engine
            .fetch(&source.template_path, &source.engine)
            .await
            .map_err(engine_error)?
    } else {
        tracing::debug!(
            template = %source.name,
            path = %source.template_path.display(),
            "No engine template, using the markdown body as HTML"
        );
        markdown_passthrough()
    };

    let source_fn = engine
        .compile_source(&source.name, &raw_text, &source.engine)
        .await
        .map_err(engine_error)?;
    let text = source_fn(data).map_err(engine_error)?;

    let markdown_html = markdown
        .render(&text)
        .await
        .map_err(|e| CompileError::Markdown(e.to_string()))?;

    let metadata = metadata::extract(&text);

    Ok(Arc::new(CompiledEntry {
        source,
        render_fn,
        raw_text,
        text,
        metadata,
        markdown_html,
        compiled_at: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::engine::HandlebarsEngine;
    use crate::markdown::{ComrakRenderer, MarkdownError};

    /// Counts conversions, optionally sleeping and failing the first N.
    struct CountingMarkdown {
        calls: AtomicUsize,
        fail_first: usize,
        delay: Duration,
    }

    impl CountingMarkdown {
        fn new(fail_first: usize, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
                delay,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarkdownRenderer for CountingMarkdown {
        async fn render(&self, text: &str) -> std::result::Result<String, MarkdownError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if call < self.fail_first {
                return Err(MarkdownError::Conversion("highlighter crashed".to_string()));
            }
            ComrakRenderer::new().render(text).await
        }
    }

    fn setup(dir: &Path, markdown: Arc<CountingMarkdown>) -> TemplateCompiler {
        let registry = Arc::new(TemplateRegistry::new("html"));
        registry.discover(dir).unwrap();
        TemplateCompiler::new(registry, Arc::new(HandlebarsEngine::new()), markdown)
    }

    fn write_template(dir: &Path) {
        std::fs::write(
            dir.join("welcome.md"),
            "[meta:subject]: <> (Welcome {{name}})\n\n# Hello {{name}}\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_find_unknown_template() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path());
        let compiler = setup(dir.path(), Arc::new(CountingMarkdown::new(0, Duration::ZERO)));

        let err = compiler.find("ghost", &json!({})).await.unwrap_err();
        assert!(matches!(err, ComposeError::UnknownTemplate(ref name) if name == "ghost"));
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn test_find_compiles_once() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path());
        let markdown = Arc::new(CountingMarkdown::new(0, Duration::ZERO));
        let compiler = setup(dir.path(), markdown.clone());

        let entry = compiler.find("welcome", &json!({"name": "Ada"})).await.unwrap();
        assert_eq!(entry.metadata["subject"], "Welcome Ada");
        assert!(entry.markdown_html.contains("Hello Ada"));
        assert!(entry.raw_text.contains("{{name}}"));
        assert!(compiler.registry().get("welcome").unwrap().is_compiled());

        let again = compiler.find("welcome", &json!({"name": "Bob"})).await.unwrap();
        assert!(Arc::ptr_eq(&entry, &again));
        assert_eq!(markdown.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_finds_coalesce() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path());
        let markdown = Arc::new(CountingMarkdown::new(0, Duration::from_millis(50)));
        let compiler = setup(dir.path(), markdown.clone());

        let data = json!({"name": "Ada"});
        let (a, b) = tokio::join!(compiler.find("welcome", &data), compiler.find("welcome", &data));

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(markdown.calls(), 1);
        assert_eq!(compiler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failed_compile_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path());
        let markdown = Arc::new(CountingMarkdown::new(1, Duration::ZERO));
        let compiler = setup(dir.path(), markdown.clone());

        let err = compiler.find("welcome", &json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Compile { source: CompileError::Markdown(_), .. }
        ));
        assert!(!compiler.registry().get("welcome").unwrap().is_compiled());

        let entry = compiler.find("welcome", &json!({})).await.unwrap();
        assert_eq!(entry.name(), "welcome");
        assert_eq!(markdown.calls(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_engine_fails_compile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("legacy.ejs.md"), "# Legacy").unwrap();
        let compiler = setup(dir.path(), Arc::new(CountingMarkdown::new(0, Duration::ZERO)));

        let err = compiler.find("legacy", &json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Compile { source: CompileError::Engine(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_find_after_close() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path());
        let compiler = setup(dir.path(), Arc::new(CountingMarkdown::new(0, Duration::ZERO)));

        compiler.registry().close();
        let err = compiler.find("welcome", &json!({})).await.unwrap_err();
        assert!(matches!(err, ComposeError::Destroyed));
    }

    #[tokio::test]
    async fn test_compile_finishing_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path());
        let markdown = Arc::new(CountingMarkdown::new(0, Duration::from_millis(100)));
        let compiler = setup(dir.path(), markdown.clone());

        let vars = json!({});
        let (result, _) = tokio::join!(compiler.find("welcome", &vars), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            compiler.registry().close();
        });

        assert!(matches!(result, Err(ComposeError::Destroyed)));
        assert_eq!(markdown.calls(), 1);
        assert!(compiler.registry().get("welcome").is_none());
        assert_eq!(compiler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_rediscovered_slot_is_not_overwritten() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_template(first.path());
        std::fs::write(second.path().join("welcome.md"), "# Replacement\n").unwrap();

        let markdown = Arc::new(CountingMarkdown::new(0, Duration::from_millis(100)));
        let compiler = setup(first.path(), markdown.clone());
        let replacement = std::fs::canonicalize(second.path().join("welcome.md")).unwrap();

        let vars = json!({"name": "Ada"});
        let (stale, _) = tokio::join!(compiler.find("welcome", &vars), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            compiler.registry().discover(second.path()).unwrap();
        });

        let stale = stale.unwrap();
        assert!(stale.markdown_html.contains("Hello Ada"));
        let slot = compiler.registry().get("welcome").unwrap();
        assert!(!slot.is_compiled());
        assert_eq!(slot.source().file_path, replacement);

        let fresh = compiler.find("welcome", &json!({})).await.unwrap();
        assert!(fresh.markdown_html.contains("Replacement"));
        assert_eq!(fresh.source.file_path, replacement);
        assert_eq!(markdown.calls(), 2);
    }
}
