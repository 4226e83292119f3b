//! Metadata annotations embedded in markdown templates.
//!
//! A template declares per-message defaults with link-reference lines that
//! render to nothing:
//!
//! ```text
//! [meta:subject]: <> (Welcome aboard)
//! [meta:from]: <> (hello@example.com)
//! ```

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

/// Key/value pairs extracted from a template
pub type Metadata = BTreeMap<String, String>;

lazy_static! {
    static ref META_LINE: Regex =
        Regex::new(r"(?i)^\s*\[meta:([^\]]+)\]:\s*<>\s*\(([^)]+)\)\s*$")
            .expect("metadata pattern is valid");
}

/// Extract every `[meta:KEY]: <> (VALUE)` line from `text`.
///
/// Annotations never span lines. Later duplicates overwrite earlier ones.
/// The input is left untouched.
pub fn extract(text: &str) -> Metadata {
    let mut metadata = Metadata::new();

    for line in text.lines() {
        if let Some(caps) = META_LINE.captures(line) {
            metadata.insert(caps[1].to_string(), caps[2].to_string());
        }
    }

    metadata
}
