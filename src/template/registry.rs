//! Template discovery and the name -> template mapping

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use walkdir::WalkDir;

use crate::error::{ComposeError, Result};
use crate::metrics::TemplateMetrics;

use super::types::{CompiledEntry, TemplateSlot, TemplateSource};

/// Templates known to one composer instance
pub struct TemplateRegistry {
    slots: DashMap<String, TemplateSlot>,
    default_engine: String,
    closed: AtomicBool,
}

impl TemplateRegistry {
    pub fn new(default_engine: impl Into<String>) -> Self {
        Self {
            slots: DashMap::new(),
            default_engine: default_engine.into(),
            closed: AtomicBool::new(false),
        }
    }

    /// Register the markdown templates found at `path`.
    ///
    /// A file registers itself. A directory registers its immediate files,
    /// plus the files one level down in each subdirectory under the
    /// subdirectory's name. Non-markdown files are skipped.
    ///
    /// Returns the number of templates registered by this call.
    pub fn discover(&self, path: &Path) -> Result<usize> {
        let discovery_error = |source: std::io::Error| ComposeError::Discovery {
            path: path.to_path_buf(),
            source,
        };

        let root = fs::canonicalize(path).map_err(discovery_error)?;
        let candidates = collect_candidates(&root).map_err(discovery_error)?;

        let mut registered = 0;
        for (file, group) in candidates {
            if let Some(source) =
                TemplateSource::from_path(&file, group.as_deref(), &self.default_engine)
            {
                self.insert(source);
                registered += 1;
            }
        }

        tracing::debug!(
            path = %root.display(),
            registered,
            total = self.slots.len(),
            "Templates discovered"
        );

        Ok(registered)
    }

    /// Insert a source, replacing any template with the same name.
    pub fn insert(&self, source: TemplateSource) -> Option<TemplateSlot> {
        let name = source.name.clone();
        let file_path = source.file_path.clone();
        let previous = self.slots.insert(name.clone(), TemplateSlot::Source(source));

        TemplateMetrics::record_registered();
        if let Some(ref previous) = previous {
            TemplateMetrics::record_duplicate();
            tracing::warn!(
                template = %name,
                previous = %previous.source().file_path.display(),
                replacement = %file_path.display(),
                "Duplicate template name, keeping the later one"
            );
        }

        previous
    }

    pub fn get(&self, name: &str) -> Option<TemplateSlot> {
        self.slots.get(name).map(|slot| slot.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Replace the slot for `entry` with its compiled form.
    ///
    /// Returns `false` once the registry has been closed, or when the slot
    /// was rediscovered from another file while compiling.
    pub fn mark_compiled(&self, entry: Arc<CompiledEntry>) -> bool {
        if self.is_closed() {
            return false;
        }

        match self.slots.get_mut(entry.name()) {
            Some(mut slot) if slot.source().file_path == entry.source.file_path => {
                *slot = TemplateSlot::Compiled(entry);
                true
            }
            _ => false,
        }
    }

    /// Sorted template names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.iter().map(|slot| slot.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every template and refuse further compiles.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.slots.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// List candidate files under `root` with the group name they belong to.
fn collect_candidates(root: &Path) -> std::io::Result<Vec<(PathBuf, Option<String>)>> {
    if fs::metadata(root)?.is_file() {
        return Ok(vec![(root.to_path_buf(), None)]);
    }

    let mut candidates = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let group = if entry.depth() == 2 {
            entry
                .path()
                .parent()
                .and_then(|dir| dir.file_name())
                .and_then(|dir| dir.to_str())
                .map(str::to_string)
        } else {
            None
        };

        candidates.push((entry.into_path(), group));
    }

    Ok(candidates)
}
