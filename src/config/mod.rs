mod settings;

pub use settings::{MailerConfig, MessageDefaults, Settings, TemplatesConfig};
