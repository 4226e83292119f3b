// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;

// Templates and message composition
pub mod message;
pub mod template;

// External collaborators
pub mod engine;
pub mod inline;
pub mod markdown;
pub mod transport;

// Orchestration
pub mod composer;

pub use composer::{Composer, ComposerConfig};
pub use error::{ComposeError, Result};
pub use message::{MessageRecord, Recipient, Recipients, SendOptions};
