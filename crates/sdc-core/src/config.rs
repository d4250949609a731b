// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration.
//!
//! A `RuntimeConfig` is constructed explicitly and passed down through
//! provider/consumer construction — never a process-wide static. Its
//! rarely-changed, atomically-swapped fields use an `ArcSwap`; anything
//! keyed and frequently looked up uses a `DashMap` — here there is only
//! one such field (`extra`), kept for forward-compatible per-deployment
//! overrides without widening this struct's API.

use std::net::IpAddr;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;

pub use sdc_transport::TlsMode;

/// A pluggable trust-list predicate over a peer certificate's subject/SAN,
/// layered on top of platform trust-store validation. Kept as
/// an `Option` so deployments that don't need one don't pay for a
/// trivially-true closure on every handshake.
pub type TrustPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// The enumerated configuration surface from configuration, held behind one
/// object a caller constructs once per provider/consumer instance and
/// shares (via `Arc`) with every component that needs it.
pub struct RuntimeConfig {
    pub interface_binding: Option<IpAddr>,
    pub multicast_ttl: u32,
    pub discovery_max_wait: Duration,
    pub dup_suppression_window: Duration,
    pub subscription_default_ttl: Duration,
    pub subscription_max_queue: usize,
    pub periodic_report_interval: Duration,
    pub tls_mode: TlsMode,
    trust_predicate: ArcSwap<Option<TrustPredicate>>,
    /// `max_concurrent_transactions` from configuration. This implementation is
    /// always a serialized single writer; the field exists so
    /// a deployment's configuration document can carry it, but any value
    /// other than 1 is rejected at construction.
    pub max_concurrent_transactions: usize,
    extra: DashMap<Arc<str>, Arc<str>>,
}

/// Error constructing a [`RuntimeConfig`] from out-of-range values.
#[derive(Debug, Clone)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl RuntimeConfig {
    /// Builds a config with conservative defaults, overridable field
    /// by field via the setters below.
    pub fn defaults() -> Self {
        Self {
            interface_binding: None,
            multicast_ttl: 1,
            discovery_max_wait: Duration::from_secs(5),
            dup_suppression_window: Duration::from_secs(10),
            subscription_default_ttl: Duration::from_secs(3600),
            subscription_max_queue: 1024,
            periodic_report_interval: Duration::from_secs(1),
            tls_mode: TlsMode::Off,
            trust_predicate: ArcSwap::new(Arc::new(None)),
            max_concurrent_transactions: 1,
            extra: DashMap::new(),
        }
    }

    /// Validates `max_concurrent_transactions` and returns the config, or a
    /// `ConfigError` if it was set to anything but 1.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.max_concurrent_transactions != 1 {
            return Err(ConfigError(format!(
                "max_concurrent_transactions must be 1 (single-writer MDIB), got {}",
                self.max_concurrent_transactions
            )));
        }
        Ok(self)
    }

    pub fn set_trust_predicate(&self, predicate: TrustPredicate) {
        self.trust_predicate.store(Arc::new(Some(predicate)));
    }

    pub fn clear_trust_predicate(&self) {
        self.trust_predicate.store(Arc::new(None));
    }

    /// Evaluates the current trust predicate against a peer subject/SAN
    /// string; `true` (accept) when none is configured.
    pub fn is_peer_trusted(&self, subject_or_san: &str) -> bool {
        match &**self.trust_predicate.load() {
            Some(pred) => pred(subject_or_san),
            None => true,
        }
    }

    pub fn set_extra(&self, key: impl Into<Arc<str>>, value: impl Into<Arc<str>>) {
        self.extra.insert(key.into(), value.into());
    }

    pub fn extra(&self, key: &str) -> Option<Arc<str>> {
        self.extra.get(key).map(|v| v.clone())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6() {
        let cfg = RuntimeConfig::defaults();
        assert_eq!(cfg.multicast_ttl, 1);
        assert_eq!(cfg.discovery_max_wait, Duration::from_secs(5));
        assert_eq!(cfg.dup_suppression_window, Duration::from_secs(10));
        assert_eq!(cfg.subscription_default_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.subscription_max_queue, 1024);
        assert_eq!(cfg.periodic_report_interval, Duration::from_secs(1));
        assert_eq!(cfg.tls_mode, TlsMode::Off);
    }

    #[test]
    fn rejects_concurrent_transactions_other_than_one() {
        let mut cfg = RuntimeConfig::defaults();
        cfg.max_concurrent_transactions = 4;
        assert!(cfg.validated().is_err());
    }

    #[test]
    fn trust_predicate_defaults_to_accept() {
        let cfg = RuntimeConfig::defaults();
        assert!(cfg.is_peer_trusted("CN=anything"));
        cfg.set_trust_predicate(Arc::new(|s: &str| s == "CN=trusted"));
        assert!(cfg.is_peer_trusted("CN=trusted"));
        assert!(!cfg.is_peer_trusted("CN=other"));
    }
}
