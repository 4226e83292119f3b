//! In-memory transport.
//!
//! Keeps every delivered message. Used when no delivery service is
//! configured, and by tests that need to inspect what was sent.

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::message::MessageRecord;

use super::{Transport, TransportError};

#[derive(Default)]
pub struct MemoryTransport {
    delivered: Mutex<Vec<MessageRecord>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first
    pub async fn delivered(&self) -> Vec<MessageRecord> {
        self.delivered.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.delivered.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.delivered.lock().await.is_empty()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn deliver(&self, message: &MessageRecord) -> Result<serde_json::Value, TransportError> {
        let mut delivered = self.delivered.lock().await;
        delivered.push(message.clone());

        Ok(json!(message
            .to
            .iter()
            .map(|recipient| json!({"email": recipient.email, "status": "queued"}))
            .collect::<Vec<_>>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Recipient;

    #[tokio::test]
    async fn test_memory_transport_records_messages() {
        let transport = MemoryTransport::new();
        assert!(transport.is_empty().await);

        let mut message = MessageRecord::baseline(&Default::default());
        message.to = vec![Recipient::new("foo@bar.com")];

        let response = transport.deliver(&message).await.unwrap();
        assert_eq!(response[0]["email"], "foo@bar.com");
        assert_eq!(response[0]["status"], "queued");

        assert_eq!(transport.len().await, 1);
        assert_eq!(transport.delivered().await[0], message);
    }
}
