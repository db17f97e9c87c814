//! Backend reachability probes

use super::messages::BackendConnectionType;
use crate::error::{MonitorError, ProbeError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// One reachability check against a backend
#[async_trait]
pub trait BackendProbe: Send + Sync {
    async fn probe(&self) -> std::result::Result<(), ProbeError>;
}

/// Issues a GET and treats 2xx and 3xx responses as available
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    /// New-connection probes never reuse a pooled connection, so every probe
    /// pays for a fresh handshake.
    pub fn new(url: &str, connection: BackendConnectionType, timeout: Duration) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if connection == BackendConnectionType::New {
            builder = builder.pool_max_idle_per_host(0);
        }
        let client = builder.build().map_err(|e| MonitorError::InvalidBackend {
            backend: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl BackendProbe for HttpProbe {
    async fn probe(&self) -> std::result::Result<(), ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}
