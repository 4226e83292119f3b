use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::message::Recipients;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mailer: MailerConfig,
    #[serde(default)]
    pub message: MessageDefaults,
    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// Delivery transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    /// API key for the delivery service. Without one, messages go to the
    /// in-memory transport.
    pub api_key: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Compose messages but never hand them to the transport
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Baseline fields copied into every composed message
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDefaults {
    #[serde(default = "default_true")]
    pub track_opens: bool,
    #[serde(default = "default_true")]
    pub track_clicks: bool,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<Recipients>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesConfig {
    /// File or directory discovered at startup
    pub path: Option<PathBuf>,
    /// Engine used when a markdown file carries no secondary extension
    #[serde(default = "default_engine")]
    pub default_engine: String,
}

fn default_endpoint() -> String {
    "https://mandrillapp.com/api/1.0".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_engine() -> String {
    "html".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("mailer.endpoint", default_endpoint())?
            .set_default("mailer.dry_run", false)?
            .set_default("mailer.timeout_seconds", default_timeout_seconds())?
            .set_default("message.track_opens", true)?
            .set_default("message.track_clicks", true)?
            .set_default("templates.default_engine", default_engine())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // MAILWRIGHT__MAILER__API_KEY, MAILWRIGHT__TEMPLATES__PATH, etc.
            .add_source(
                Environment::with_prefix("MAILWRIGHT")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_endpoint(),
            dry_run: false,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for MessageDefaults {
    fn default() -> Self {
        Self {
            track_opens: true,
            track_clicks: true,
            subject: None,
            from: None,
            to: None,
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            path: None,
            default_engine: default_engine(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let mailer = MailerConfig::default();
        assert_eq!(mailer.endpoint, "https://mandrillapp.com/api/1.0");
        assert!(!mailer.dry_run);
        assert!(mailer.api_key.is_none());

        let message = MessageDefaults::default();
        assert!(message.track_opens);
        assert!(message.track_clicks);

        assert_eq!(TemplatesConfig::default().default_engine, "html");
    }

    #[test]
    fn test_message_defaults_deserialize_partial() {
        let defaults: MessageDefaults =
            serde_json::from_str(r#"{"track_clicks": false, "to": "ops@example.com"}"#).unwrap();
        assert!(defaults.track_opens);
        assert!(!defaults.track_clicks);
        assert!(defaults.to.is_some());
    }
}
