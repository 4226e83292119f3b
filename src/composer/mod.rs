//! Template-driven message composition.
//!
//! A [`Composer`] owns the template registry and the collaborators needed to
//! turn a template name plus per-send options into a delivered message:
//!
//! ```text
//! from(path) -> registry
//! send(name, options) -> find/compile -> merge -> render layout -> inline CSS -> deliver
//! ```
//!
//! Every step must succeed before the next one starts; the first failure
//! ends the send and is returned to the caller.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::config::{MessageDefaults, Settings};
use crate::engine::{HandlebarsEngine, TemplateEngine};
use crate::error::{ComposeError, Result};
use crate::inline::{CssInliner, StyleInliner};
use crate::markdown::{ComrakRenderer, MarkdownRenderer};
use crate::message::{compose, MessageRecord, SendOptions};
use crate::metrics::SendMetrics;
use crate::template::{CompiledEntry, TemplateCompiler, TemplateRegistry};
use crate::transport::{create_transport, MemoryTransport, Transport};

/// Settings a composer is built from
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Baseline message fields
    pub defaults: MessageDefaults,
    /// Engine for markdown files without a secondary extension
    pub default_engine: String,
    /// Return composed messages without delivering them
    pub dry_run: bool,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            defaults: MessageDefaults::default(),
            default_engine: "html".to_string(),
            dry_run: false,
        }
    }
}

impl From<&Settings> for ComposerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            defaults: settings.message.clone(),
            default_engine: settings.templates.default_engine.clone(),
            dry_run: settings.mailer.dry_run,
        }
    }
}

pub struct Composer {
    baseline: MessageRecord,
    registry: Arc<TemplateRegistry>,
    compiler: TemplateCompiler,
    engine: Arc<dyn TemplateEngine>,
    inliner: Arc<dyn CssInliner>,
    transport: Arc<dyn Transport>,
    dry_run: bool,
    destroyed: AtomicBool,
}

impl Composer {
    /// Create a composer with the default collaborators and an in-memory
    /// transport.
    ///
    /// Outside dry-run mode, sends succeed but the messages only reach that
    /// in-memory transport. Use [`Composer::from_settings`] for real delivery,
    /// or [`Composer::with_collaborators`] to keep a handle on the transport.
    pub fn new(config: ComposerConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(HandlebarsEngine::new()),
            Arc::new(ComrakRenderer::new()),
            Arc::new(StyleInliner::new()),
            Arc::new(MemoryTransport::new()),
        )
    }

    /// Create a composer from loaded settings, including the transport and
    /// the configured template path.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let transport = create_transport(&settings.mailer)?;
        let composer = Self::with_collaborators(
            ComposerConfig::from(settings),
            Arc::new(HandlebarsEngine::new()),
            Arc::new(ComrakRenderer::new()),
            Arc::new(StyleInliner::new()),
            transport,
        );

        if let Some(path) = &settings.templates.path {
            composer.from(path)?;
        }

        Ok(composer)
    }

    pub fn with_collaborators(
        config: ComposerConfig,
        engine: Arc<dyn TemplateEngine>,
        markdown: Arc<dyn MarkdownRenderer>,
        inliner: Arc<dyn CssInliner>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let registry = Arc::new(TemplateRegistry::new(config.default_engine.clone()));
        let compiler = TemplateCompiler::new(registry.clone(), engine.clone(), markdown);

        Self {
            baseline: MessageRecord::baseline(&config.defaults),
            registry,
            compiler,
            engine,
            inliner,
            transport,
            dry_run: config.dry_run,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Register the templates at `path` (a file or a directory).
    ///
    /// Returns `self` so calls can be chained.
    #[allow(clippy::wrong_self_convention)]
    pub fn from(&self, path: impl AsRef<Path>) -> Result<&Self> {
        self.ensure_alive()?;
        self.registry.discover(path.as_ref())?;
        Ok(self)
    }

    /// Registered template names, sorted
    pub fn names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Baseline every send starts from
    pub fn baseline(&self) -> &MessageRecord {
        &self.baseline
    }

    /// Transport messages are delivered through
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Compiled form of `name`, compiling it with `data` on first use.
    pub async fn find(&self, name: &str, data: &Value) -> Result<Arc<CompiledEntry>> {
        self.ensure_alive()?;
        self.compiler.find(name, data).await
    }

    /// Compose the message for template `name` and deliver it.
    ///
    /// In dry-run mode the composed record is returned without touching the
    /// transport.
    #[tracing::instrument(
        name = "composer.send",
        skip(self, options),
        fields(template = %name, send_id = %Uuid::new_v4())
    )]
    pub async fn send(&self, name: &str, options: SendOptions) -> Result<MessageRecord> {
        let started = Instant::now();
        let result = self.compose_and_deliver(name, &options).await;
        SendMetrics::observe_latency(started.elapsed());

        match &result {
            Ok(_) if self.dry_run => SendMetrics::record_dry_run(),
            Ok(_) => SendMetrics::record_delivered(),
            Err(e) => {
                SendMetrics::record_failed();
                tracing::warn!(code = e.code(), error = %e, "Send failed");
            }
        }

        result
    }

    async fn compose_and_deliver(&self, name: &str, options: &SendOptions) -> Result<MessageRecord> {
        self.ensure_alive()?;

        let data = options.render_context();
        let entry = self.compiler.find(name, &data).await?;

        let mut record = compose(&self.baseline, &entry, options);

        if !options.has_html_override() {
            let context = layout_context(&data, &entry, &record);
            let html = entry
                .render(&context)
                .map_err(|e| ComposeError::Render(e.to_string()))?;
            record.html = Some(html);
        }

        let base_url = format!("file://{}", entry.source.template_path.display());
        let html = record.html.clone().unwrap_or_default();
        match self.inliner.inline(&html, &base_url).await {
            Ok(inlined) => record.html = Some(inlined),
            Err(e) => {
                tracing::warn!(template = %name, error = %e, "Failed to inline the CSS");
                return Err(ComposeError::Inline {
                    reason: e.to_string(),
                    record: Box::new(record),
                });
            }
        }

        self.ensure_alive()?;

        if self.dry_run {
            tracing::debug!(template = %name, "Dry run, skipping delivery");
            return Ok(record);
        }

        let response = self.transport.deliver(&record).await?;
        tracing::info!(
            template = %name,
            transport = self.transport.name(),
            recipients = record.to.len(),
            response = %response,
            "Message delivered"
        );

        Ok(record)
    }

    /// Release the registry and everything the engine cached.
    ///
    /// Returns `false` if the composer was already destroyed.
    pub fn destroy(&self) -> bool {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return false;
        }

        self.registry.close();
        self.engine.clear();
        tracing::debug!("Composer destroyed");
        true
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            Err(ComposeError::Destroyed)
        } else {
            Ok(())
        }
    }
}

impl Drop for Composer {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Data for the engine template: the caller's data plus the composed
/// message and the rendered template body.
fn layout_context(data: &Value, entry: &CompiledEntry, record: &MessageRecord) -> Value {
    let mut context = match data {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    context.insert("markdown".to_string(), json!(entry.markdown_html));
    context.insert("text".to_string(), json!(record.text));
    context.insert("subject".to_string(), json!(record.subject));
    context.insert("from".to_string(), json!(record.from_email));
    context.insert("to".to_string(), json!(record.to));
    context.insert("metadata".to_string(), json!(entry.metadata));

    Value::Object(context)
}
