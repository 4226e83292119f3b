//! Template source descriptors and their compiled form

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{EngineError, RenderFn};

use super::metadata::Metadata;

/// Extension a file must carry to be picked up as a template
pub const MARKDOWN_EXTENSION: &str = "md";

/// A markdown template found during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSource {
    /// Logical name used to look the template up
    pub name: String,

    /// Absolute path of the markdown source
    pub file_path: PathBuf,

    /// Rendering engine, taken from the secondary extension (`x.hbs.md`)
    pub engine: String,

    /// File the rendering engine compiles (`<basename>.<engine>`)
    pub template_path: PathBuf,
}

impl TemplateSource {
    /// Build a descriptor for `file`.
    ///
    /// `group` names templates living in a subdirectory; it replaces the
    /// file's own basename as the logical name. Returns `None` for anything
    /// that is not a markdown file.
    pub fn from_path(file: &Path, group: Option<&str>, default_engine: &str) -> Option<Self> {
        if file.extension().and_then(|ext| ext.to_str()) != Some(MARKDOWN_EXTENSION) {
            return None;
        }

        // "welcome.hbs.md" -> stem "welcome.hbs" -> base "welcome", engine "hbs"
        let stem = Path::new(file.file_stem()?);
        let (base, engine) = match stem.extension().and_then(|ext| ext.to_str()) {
            Some(engine) if !engine.is_empty() => {
                (stem.file_stem()?.to_str()?.to_string(), engine.to_string())
            }
            _ => (stem.to_str()?.to_string(), default_engine.to_string()),
        };

        let name = match group {
            Some(group) if !group.is_empty() => group.to_string(),
            _ => base.clone(),
        };

        if name.is_empty() {
            return None;
        }

        let template_path = file.with_file_name(format!("{}.{}", base, engine));

        Some(Self {
            name,
            file_path: file.to_path_buf(),
            engine,
            template_path,
        })
    }
}

/// A template source after its first successful compile
pub struct CompiledEntry {
    pub source: TemplateSource,

    /// Renders the engine template with a data object
    pub render_fn: RenderFn,

    /// Markdown file contents as read from disk
    pub raw_text: String,

    /// Markdown after engine interpolation; metadata is extracted from this
    pub text: String,

    pub metadata: Metadata,

    /// `text` converted to HTML
    pub markdown_html: String,

    pub compiled_at: DateTime<Utc>,
}

impl CompiledEntry {
    pub fn name(&self) -> &str {
        &self.source.name
    }

    /// Render the engine template with `context`
    pub fn render(&self, context: &serde_json::Value) -> Result<String, EngineError> {
        (self.render_fn)(context)
    }
}

impl fmt::Debug for CompiledEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledEntry")
            .field("source", &self.source)
            .field("metadata", &self.metadata)
            .field("compiled_at", &self.compiled_at)
            .finish_non_exhaustive()
    }
}

/// Registry value: a template is either waiting to be compiled or compiled.
#[derive(Debug, Clone)]
pub enum TemplateSlot {
    Source(TemplateSource),
    Compiled(Arc<CompiledEntry>),
}

impl TemplateSlot {
    pub fn source(&self) -> &TemplateSource {
        match self {
            TemplateSlot::Source(source) => source,
            TemplateSlot::Compiled(entry) => &entry.source,
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self, TemplateSlot::Compiled(_))
    }
}
