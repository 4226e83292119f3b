//! Markdown e-mail templates.
//!
//! This module provides:
//! - Discovery of `<name>[.<engine>].md` files into a [`TemplateRegistry`]
//! - Extraction of `[meta:key]: <> (value)` annotations
//! - A [`TemplateCompiler`] that compiles each template at most once and
//!   coalesces concurrent lookups of the same template
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(TemplateRegistry::new("html"));
//! registry.discover(Path::new("templates"))?;
//!
//! let compiler = TemplateCompiler::new(registry, engine, markdown);
//! let entry = compiler.find("welcome", &json!({"name": "Ada"})).await?;
//! println!("{:?}", entry.metadata.get("subject"));
//! ```

mod compiler;
pub mod metadata;
mod registry;
mod types;

pub use compiler::TemplateCompiler;
pub use metadata::{extract as extract_metadata, Metadata};
pub use registry::TemplateRegistry;
pub use types::{CompiledEntry, TemplateSlot, TemplateSource, MARKDOWN_EXTENSION};
