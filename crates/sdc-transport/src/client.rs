// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP(S) client pool: one bounded-concurrency `reqwest::Client` per host.
//!
//! Follows the `DashMap`-backed store pattern used by `config::RuntimeConfig`
//! elsewhere in the stack — a lock-free map keyed by host, not a global
//! singleton client.

use crate::deadline::Deadline;
use crate::error::{TransportError, TransportErrorKind, TransportResult};
use dashmap::DashMap;
use std::sync::Arc;

/// A SOAP-over-HTTP request ready to send: caller has already produced the
/// envelope XML via `sdc-soap`.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    pub url: String,
    pub soap_action: String,
    pub body_xml: String,
}

/// A raw SOAP-over-HTTP response: caller projects `body_xml` back through
/// `sdc-soap::Envelope::decode`.
#[derive(Debug, Clone)]
pub struct SoapResponse {
    pub status: u16,
    pub body_xml: String,
}

/// Per-host connection pool with bounded concurrency (delegated to
/// `reqwest`'s own connection-pool limits, configured per client).
pub struct HttpClientPool {
    clients: DashMap<String, Arc<reqwest::Client>>,
    max_connections_per_host: usize,
}

impl HttpClientPool {
    pub fn new(max_connections_per_host: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_connections_per_host,
        }
    }

    fn client_for(&self, host_key: &str) -> TransportResult<Arc<reqwest::Client>> {
        if let Some(c) = self.clients.get(host_key) {
            return Ok(c.clone());
        }
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(self.max_connections_per_host)
            .build()
            .map_err(|e| TransportError::new(TransportErrorKind::Io, e.to_string()))?;
        let client = Arc::new(client);
        self.clients.insert(host_key.to_string(), client.clone());
        Ok(client)
    }

    /// Pre-seeds the pool with a client built from a caller-supplied
    /// `rustls::ClientConfig` (from [`crate::tls::TlsContext::build_client_config`]),
    /// so that subsequent [`Self::send`] calls against `host_key` reuse it
    /// instead of the plain default client `client_for` would otherwise build.
    #[cfg(feature = "tls")]
    pub fn register_tls_config(&self, host_key: impl Into<String>, tls_config: Arc<rustls::ClientConfig>) -> TransportResult<()> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(self.max_connections_per_host)
            .use_preconfigured_tls((*tls_config).clone())
            .build()
            .map_err(|e| TransportError::new(TransportErrorKind::Io, e.to_string()))?;
        self.clients.insert(host_key.into(), Arc::new(client));
        Ok(())
    }

    /// Sends a SOAP request with a deadline. Never retries: retry policy is
    /// an application concern.
    pub async fn send(&self, req: SoapRequest, deadline: Deadline) -> TransportResult<SoapResponse> {
        let host_key = host_key(&req.url);
        let client = self.client_for(&host_key)?;

        let remaining = deadline.remaining();
        if remaining.is_zero() {
            return Err(TransportError::new(TransportErrorKind::Timeout, "deadline already elapsed"));
        }

        let response = client
            .post(&req.url)
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .header("SOAPAction", req.soap_action)
            .timeout(remaining)
            .body(req.body_xml)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body_xml = response.text().await?;
        Ok(SoapResponse { status, body_xml })
    }
}

fn host_key(url: &str) -> String {
    // cheap host:port extraction without a full URL parser dependency;
    // good enough as a pool-bucketing key (not used for routing).
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_key_extracts_authority_ignoring_path() {
        assert_eq!(host_key("https://10.0.0.5:8080/StateEvent"), "10.0.0.5:8080");
        assert_eq!(host_key("http://device.local/Get"), "device.local");
    }

    #[tokio::test]
    async fn pool_reuses_client_for_same_host() {
        let pool = HttpClientPool::new(4);
        let c1 = pool.client_for("10.0.0.1:80").unwrap();
        let c2 = pool.client_for("10.0.0.1:80").unwrap();
        assert!(Arc::ptr_eq(&c1, &c2));
    }
}
