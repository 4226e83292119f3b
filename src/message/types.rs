//! Message record and per-send options

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::MessageDefaults;

/// A single recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// `to`, `cc` or `bcc`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            kind: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Recipients as callers may spell them: a bare address, one recipient,
/// or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    Address(String),
    One(Recipient),
    Many(Vec<Recipient>),
}

impl Recipients {
    /// Normalize to a list of recipients
    pub fn into_list(self) -> Vec<Recipient> {
        match self {
            Recipients::Address(email) => vec![Recipient::new(email)],
            Recipients::One(recipient) => vec![recipient],
            Recipients::Many(recipients) => recipients,
        }
    }
}

impl From<&str> for Recipients {
    fn from(email: &str) -> Self {
        Recipients::Address(email.to_string())
    }
}

impl From<String> for Recipients {
    fn from(email: String) -> Self {
        Recipients::Address(email)
    }
}

impl From<Recipient> for Recipients {
    fn from(recipient: Recipient) -> Self {
        Recipients::One(recipient)
    }
}

impl From<Vec<Recipient>> for Recipients {
    fn from(recipients: Vec<Recipient>) -> Self {
        Recipients::Many(recipients)
    }
}

/// The message handed to the delivery transport.
///
/// Field names follow the delivery API's message object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    pub track_opens: bool,

    pub track_clicks: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,

    #[serde(default)]
    pub to: Vec<Recipient>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Template metadata without a dedicated field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl MessageRecord {
    /// The service-wide record every send starts from
    pub fn baseline(defaults: &MessageDefaults) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Content-type".to_string(),
            "text/html; charset=UTF-8".to_string(),
        );

        Self {
            headers,
            track_opens: defaults.track_opens,
            track_clicks: defaults.track_clicks,
            subject: defaults.subject.clone(),
            from_email: defaults.from.clone(),
            from_name: None,
            to: defaults
                .to
                .clone()
                .map(Recipients::into_list)
                .unwrap_or_default(),
            html: None,
            text: None,
            metadata: BTreeMap::new(),
        }
    }
}

/// Options for a single send.
///
/// Every field besides the known ones is collected into `data` and handed
/// to the rendering engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Recipients>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, to: impl Into<Recipients>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn from_email(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add a data field for the rendering engine
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Whether the caller supplied HTML that replaces the template body
    pub fn has_html_override(&self) -> bool {
        self.html.as_deref().is_some_and(|html| !html.is_empty())
    }

    /// Data object for the rendering engine: every option, known or not.
    pub fn render_context(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Value::Object(map),
            _ => Value::Object(self.data.clone()),
        }
    }
}
