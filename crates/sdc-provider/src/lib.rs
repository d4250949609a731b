// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sdc-provider — service dispatch, subscription and report delivery
//!
//! Everything an IEEE 11073 SDC provider needs on top of `sdc-core`'s MDIB
//! store: the closed SOAP action dispatch table, the
//! WS-Eventing subscription manager and per-subscription delivery workers
//!, and periodic report coalescing. `sdc-core` owns the data
//! model and the transaction discipline; this crate is where a committed
//! transaction's report actually reaches a subscriber over HTTP.

pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod periodic;
pub mod subscription;

pub use delivery::{
    encode_delivery_body, run_delivery, send_subscription_end, EPISODIC_REPORT_ACTION, MAX_CONSECUTIVE_FAILURES,
    PERIODIC_REPORT_ACTION,
};
pub use dispatch::{
    ActivateRequest, ServiceDispatch, SetAlertStateRequest, SetComponentStateRequest, SetContextStateRequest,
    SetMetricStateRequest, SetStringRequest, SetValueRequest, SoapAction,
};
pub use error::{to_soap_fault, DispatchError, DispatchResult, SubscriptionError, SubscriptionResult};
pub use periodic::PeriodicCoalescer;
pub use subscription::{Delivery, ReportOrigin, ReportTopic, SubscriptionManager, TerminationReason};

use std::sync::Arc;
use std::time::Duration;

use sdc_core::{MdibRoot, RuntimeConfig, Writer};
use sdc_transport::client::HttpClientPool;

/// Owns the pieces a running provider process needs and wires them
/// together: the dispatch table, the subscription manager, the periodic
/// coalescer and the HTTP client pool deliveries go out through. Spawning
/// the background tasks (`run_delivery` per subscription,
/// `PeriodicCoalescer::run`, `SubscriptionManager::expire_stale` on a
/// timer) is left to the binary that embeds this crate, since only it
/// knows the runtime's shutdown signal.
pub struct Provider {
    pub dispatch: ServiceDispatch,
    pub subscriptions: Arc<SubscriptionManager>,
    pub periodic: Arc<PeriodicCoalescer>,
    pub client_pool: Arc<HttpClientPool>,
    pub config: Arc<RuntimeConfig>,
}

impl Provider {
    pub fn new(root: Arc<MdibRoot>, config: Arc<RuntimeConfig>) -> Self {
        let writer = Arc::new(Writer::new());
        let subscriptions = Arc::new(SubscriptionManager::new(config.subscription_default_ttl, config.subscription_max_queue));
        let periodic = Arc::new(PeriodicCoalescer::new());
        let dispatch = ServiceDispatch::new(root, writer, subscriptions.clone()).with_periodic(periodic.clone());
        Self {
            dispatch,
            subscriptions,
            periodic,
            client_pool: Arc::new(HttpClientPool::new(8)),
            config,
        }
    }

    /// The interval the embedding binary should drive
    /// `PeriodicCoalescer::run` with, taken from configuration rather than
    /// hardcoded here so a deployment can tune it.
    pub fn periodic_report_interval(&self) -> Duration {
        self.config.periodic_report_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_new_wires_dispatch_to_a_shared_subscription_manager() {
        let root = Arc::new(MdibRoot::new("urn:uuid:seq-1"));
        let config = Arc::new(RuntimeConfig::defaults());
        let provider = Provider::new(root, config);
        assert_eq!(provider.subscriptions.active_count(), 0);
    }
}
