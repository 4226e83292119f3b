//! Mandrill HTTP API transport

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::message::MessageRecord;

use super::{Transport, TransportError};

const SEND_PATH: &str = "/messages/send.json";

#[derive(Serialize)]
struct SendRequest<'a> {
    key: &'a str,
    message: &'a MessageRecord,
}

/// Posts messages to the Mandrill `messages/send` endpoint.
pub struct MandrillTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl MandrillTransport {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Full URL of the send endpoint
    pub fn send_url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), SEND_PATH)
    }
}

#[async_trait]
impl Transport for MandrillTransport {
    fn name(&self) -> &'static str {
        "mandrill"
    }

    async fn deliver(&self, message: &MessageRecord) -> Result<serde_json::Value, TransportError> {
        let request = SendRequest {
            key: &self.api_key,
            message,
        };

        let response = self
            .client
            .post(self.send_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Delivery rejected");
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<serde_json::Value>().await?)
    }
}
