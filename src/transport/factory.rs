//! Transport factory

use std::sync::Arc;
use std::time::Duration;

use crate::config::MailerConfig;

use super::mandrill::MandrillTransport;
use super::memory::MemoryTransport;
use super::{Transport, TransportError};

/// Create a transport based on configuration.
///
/// - an `api_key` selects the Mandrill HTTP transport
/// - otherwise messages are kept by a `MemoryTransport`
pub fn create_transport(settings: &MailerConfig) -> Result<Arc<dyn Transport>, TransportError> {
    match settings.api_key.as_deref() {
        Some(key) if !key.is_empty() => {
            tracing::info!(
                transport = "mandrill",
                endpoint = %settings.endpoint,
                "Creating Mandrill transport"
            );
            Ok(Arc::new(MandrillTransport::new(
                key,
                settings.endpoint.clone(),
                Duration::from_secs(settings.timeout_seconds),
            )?))
        }
        _ => {
            if !settings.dry_run {
                tracing::warn!("No API key configured, messages will only be kept in memory");
            }
            Ok(Arc::new(MemoryTransport::new()))
        }
    }
}
