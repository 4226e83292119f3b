//! Layered composition of the outgoing message.
//!
//! Layers, lowest precedence first:
//!
//! 1. the baseline record built from service settings
//! 2. metadata annotations of the compiled template
//! 3. options passed to `send`
//!
//! A field present in a higher layer replaces the lower value, even when it
//! is an empty string. `html` and `text` are the exception: they default to
//! the template body and only a non-empty option replaces them.

use crate::template::{CompiledEntry, Metadata};

use super::types::{MessageRecord, Recipients, SendOptions};

/// Compose the record for one send. Inputs are left untouched.
pub fn compose(
    baseline: &MessageRecord,
    entry: &CompiledEntry,
    options: &SendOptions,
) -> MessageRecord {
    let mut record = baseline.clone();

    apply_metadata(&mut record, &entry.metadata);
    apply_options(&mut record, options);

    record.text = Some(body_or_default(options.text.as_deref(), &entry.text));
    record.html = Some(body_or_default(options.html.as_deref(), &entry.markdown_html));

    record
}

fn apply_metadata(record: &mut MessageRecord, metadata: &Metadata) {
    for (key, value) in metadata {
        match key.as_str() {
            "subject" => record.subject = Some(value.clone()),
            "from" => record.from_email = Some(value.clone()),
            "from_name" => record.from_name = Some(value.clone()),
            "to" => record.to = Recipients::from(value.as_str()).into_list(),
            _ => {
                record.metadata.insert(key.clone(), value.clone());
            }
        }
    }
}

fn apply_options(record: &mut MessageRecord, options: &SendOptions) {
    if let Some(subject) = &options.subject {
        record.subject = Some(subject.clone());
    }

    if let Some(from) = &options.from {
        record.from_email = Some(from.clone());
    }

    if let Some(from_name) = &options.from_name {
        record.from_name = Some(from_name.clone());
    }

    if let Some(to) = &options.to {
        record.to = to.clone().into_list();
    }
}

// Truthiness, not presence: an empty override falls back to the template.
fn body_or_default(value: Option<&str>, default: &str) -> String {
    match value {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chrono::Utc;

    use crate::config::MessageDefaults;
    use crate::engine::markdown_passthrough;
    use crate::message::Recipient;
    use crate::template::TemplateSource;

    fn baseline() -> MessageRecord {
        MessageRecord::baseline(&MessageDefaults {
            subject: Some("A".to_string()),
            from: Some("a@x.com".to_string()),
            ..Default::default()
        })
    }

    fn entry(metadata: &[(&str, &str)]) -> CompiledEntry {
        CompiledEntry {
            source: TemplateSource {
                name: "welcome".to_string(),
                file_path: PathBuf::from("/t/welcome.md"),
                engine: "html".to_string(),
                template_path: PathBuf::from("/t/welcome.html"),
            },
            render_fn: markdown_passthrough(),
            raw_text: "# Welcome".to_string(),
            text: "# Welcome".to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            markdown_html: "<h1>Welcome</h1>\n".to_string(),
            compiled_at: Utc::now(),
        }
    }

    #[test]
    fn test_baseline_only() {
        let record = compose(&baseline(), &entry(&[]), &SendOptions::new());
        assert_eq!(record.subject.as_deref(), Some("A"));
        assert_eq!(record.from_email.as_deref(), Some("a@x.com"));
        assert!(record.track_opens);
        assert!(record.track_clicks);
    }

    #[test]
    fn test_metadata_overrides_baseline() {
        let record = compose(&baseline(), &entry(&[("subject", "B")]), &SendOptions::new());
        assert_eq!(record.subject.as_deref(), Some("B"));
        assert_eq!(record.from_email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_options_override_metadata() {
        let options = SendOptions::new().subject("C");
        let record = compose(&baseline(), &entry(&[("subject", "B")]), &options);
        assert_eq!(record.subject.as_deref(), Some("C"));
    }

    #[test]
    fn test_empty_subject_is_still_present() {
        let options = SendOptions::new().subject("");
        let record = compose(&baseline(), &entry(&[("subject", "B")]), &options);
        assert_eq!(record.subject.as_deref(), Some(""));
    }

    #[test]
    fn test_body_defaults_to_template() {
        let record = compose(&baseline(), &entry(&[]), &SendOptions::new());
        assert_eq!(record.html.as_deref(), Some("<h1>Welcome</h1>\n"));
        assert_eq!(record.text.as_deref(), Some("# Welcome"));
    }

    #[test]
    fn test_empty_body_override_falls_back() {
        let options = SendOptions::new().html("").text("");
        let record = compose(&baseline(), &entry(&[]), &options);
        assert_eq!(record.html.as_deref(), Some("<h1>Welcome</h1>\n"));
        assert_eq!(record.text.as_deref(), Some("# Welcome"));
    }

    #[test]
    fn test_non_empty_body_override_wins() {
        let options = SendOptions::new().html("<p>custom</p>").text("custom");
        let record = compose(&baseline(), &entry(&[]), &options);
        assert_eq!(record.html.as_deref(), Some("<p>custom</p>"));
        assert_eq!(record.text.as_deref(), Some("custom"));
    }

    #[test]
    fn test_to_is_always_a_list() {
        let from_string = compose(
            &baseline(),
            &entry(&[]),
            &SendOptions::new().to("foo@bar.com"),
        );
        assert_eq!(from_string.to, vec![Recipient::new("foo@bar.com")]);

        let from_struct = compose(
            &baseline(),
            &entry(&[]),
            &SendOptions::new().to(Recipient::new("foo@bar.com")),
        );
        assert_eq!(from_struct.to, vec![Recipient::new("foo@bar.com")]);

        let list = vec![Recipient::new("a@x.com"), Recipient::new("b@x.com")];
        let from_list = compose(&baseline(), &entry(&[]), &SendOptions::new().to(list.clone()));
        assert_eq!(from_list.to, list);
    }

    #[test]
    fn test_metadata_to_is_normalized_and_overridable() {
        let record = compose(&baseline(), &entry(&[("to", "meta@x.com")]), &SendOptions::new());
        assert_eq!(record.to, vec![Recipient::new("meta@x.com")]);

        let record = compose(
            &baseline(),
            &entry(&[("to", "meta@x.com")]),
            &SendOptions::new().to("caller@x.com"),
        );
        assert_eq!(record.to, vec![Recipient::new("caller@x.com")]);
    }

    #[test]
    fn test_unknown_metadata_is_kept() {
        let record = compose(&baseline(), &entry(&[("campaign", "spring")]), &SendOptions::new());
        assert_eq!(record.metadata["campaign"], "spring");
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let base = baseline();
        let template = entry(&[("subject", "B")]);
        let options = SendOptions::new().subject("C").to("foo@bar.com");

        let _ = compose(&base, &template, &options);

        assert_eq!(base, baseline());
        assert!(base.to.is_empty());
        assert_eq!(template.metadata["subject"], "B");
    }
}
