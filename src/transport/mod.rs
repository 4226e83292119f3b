//! Delivery of composed messages.
//!
//! The composer hands the final [`MessageRecord`] to a [`Transport`] and
//! reports its result as-is. Retries, if wanted, belong to the transport.

mod factory;
mod mandrill;
mod memory;

pub use factory::create_transport;
pub use mandrill::MandrillTransport;
pub use memory::MemoryTransport;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::MessageRecord;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request could not be completed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The delivery service answered with a non-success status
    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &'static str;

    /// Deliver one message, returning the service's response body.
    async fn deliver(&self, message: &MessageRecord) -> Result<serde_json::Value, TransportError>;
}
