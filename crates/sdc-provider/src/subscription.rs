// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WS-Eventing subscription manager: `Subscribe` / `Renew` /
//! `Unsubscribe` / `GetStatus`, expiration-timer semantics, and per-
//! subscription bounded delivery queues.
//!
//! Structurally this generalizes `rpc::registry`'s global service table
//! (register on creation, unregister on drop/expiry, list for
//! introspection) from a flat `Vec` behind an `RwLock` to a `DashMap`
//! keyed by subscription id, since subscriptions churn far more than RPC
//! service registrations and need independent per-entry locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::{SubscriptionError, SubscriptionResult};
use sdc_core::ReportAction;

fn new_subscription_id(n: u64) -> Arc<str> {
    Arc::from(format!("urn:uuid:subscription-{n}"))
}

/// Which BICEPS report categories a subscriber wants delivered — a
/// subscription with an empty filter set receives nothing (WS-Eventing
/// requires an explicit, non-empty `wse:Filter` dialect match).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportTopic {
    Description,
    Metric,
    Alert,
    Component,
    Context,
    Operational,
    RealTimeSample,
    OperationInvoked,
    SystemError,
}

impl ReportTopic {
    fn matches(self, action: &ReportAction) -> bool {
        matches!(
            (self, action),
            (Self::Description, ReportAction::DescriptionCreated(_))
                | (Self::Description, ReportAction::DescriptionUpdated(_))
                | (Self::Description, ReportAction::DescriptionDeleted(_))
                | (Self::Metric, ReportAction::MetricStateChanged(_))
                | (Self::Alert, ReportAction::AlertStateChanged(_))
                | (Self::Component, ReportAction::ComponentStateChanged(_))
                | (Self::Context, ReportAction::ContextStateChanged(_))
                | (Self::Operational, ReportAction::OperationalStateChanged(_))
                | (Self::RealTimeSample, ReportAction::RealTimeSampleChanged(_))
                | (Self::OperationInvoked, ReportAction::OperationInvokedChanged { .. })
                | (Self::SystemError, ReportAction::SystemErrorReport { .. })
        )
    }
}

/// Why a subscription stopped receiving deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    DeliveryFailure,
    Overflow,
    Expired,
    SourceShuttingDown,
    SourceCancelling,
    FilterNotSupported,
}

/// Whether a [`Delivery`] was fanned out the moment its transaction
/// committed, or coalesced by [`crate::periodic::PeriodicCoalescer`] and
/// released on its next tick. `delivery.rs` uses this to pick the
/// `wsa:Action`/top-level element a subscriber sees on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOrigin {
    Episodic,
    Periodic,
}

/// A single filtered batch of report actions delivered to one subscriber.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub mdib_version: u64,
    pub sequence_id: std::sync::Arc<str>,
    pub actions: Vec<ReportAction>,
    pub origin: ReportOrigin,
}

struct Subscription {
    endpoint: String,
    topics: Vec<ReportTopic>,
    expires_at: Instant,
    sender: crossbeam_channel::Sender<Delivery>,
    receiver: crossbeam_channel::Receiver<Delivery>,
}

/// The default bound on how long [`SubscriptionManager::dispatch`] blocks
/// on one subscriber's full queue before giving up on it, per spec.md §5:
/// "blocks the writer briefly under backpressure up to a configurable
/// limit, then fails the subscription — never the transaction".
pub const DEFAULT_BACKPRESSURE_WINDOW: Duration = Duration::from_millis(20);

/// Owns every active subscription for one provider. `max_queue` bounds the
/// per-subscriber delivery channel: a full channel blocks the writer for
/// up to `backpressure_window`, then fails the subscription rather than
/// buffering forever or stalling the commit path indefinitely.
pub struct SubscriptionManager {
    subscriptions: DashMap<std::sync::Arc<str>, Subscription>,
    next_id: AtomicU64,
    default_ttl: Duration,
    max_queue: usize,
    backpressure_window: Duration,
}

impl SubscriptionManager {
    pub fn new(default_ttl: Duration, max_queue: usize) -> Self {
        Self::with_backpressure_window(default_ttl, max_queue, DEFAULT_BACKPRESSURE_WINDOW)
    }

    pub fn with_backpressure_window(default_ttl: Duration, max_queue: usize, backpressure_window: Duration) -> Self {
        Self {
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
            default_ttl,
            max_queue,
            backpressure_window,
        }
    }

    /// `wse:Subscribe`. Rejects an empty topic filter outright — the reporting pipeline
    /// requires at least one matched report category.
    pub fn subscribe(
        &self,
        endpoint: impl Into<String>,
        topics: Vec<ReportTopic>,
        requested_ttl: Option<Duration>,
        now: Instant,
    ) -> SubscriptionResult<(std::sync::Arc<str>, Instant)> {
        if topics.is_empty() {
            return Err(SubscriptionError::FilterNotSupported(
                "subscription must name at least one report topic".into(),
            ));
        }
        let id: Arc<str> = new_subscription_id(self.next_id.fetch_add(1, Ordering::Relaxed));
        let ttl = requested_ttl.unwrap_or(self.default_ttl);
        let expires_at = now + ttl;
        let (sender, receiver) = crossbeam_channel::bounded(self.max_queue);
        self.subscriptions.insert(
            id.clone(),
            Subscription {
                endpoint: endpoint.into(),
                topics,
                expires_at,
                sender,
                receiver,
            },
        );
        log::info!("subscription {id} created, expires at {expires_at:?}");
        Ok((id, expires_at))
    }

    /// `wse:Renew`.
    pub fn renew(&self, id: &str, requested_ttl: Option<Duration>, now: Instant) -> SubscriptionResult<Instant> {
        let mut sub = self
            .subscriptions
            .get_mut(id)
            .ok_or_else(|| SubscriptionError::UnknownSubscription(id.to_string()))?;
        let ttl = requested_ttl.unwrap_or(self.default_ttl);
        sub.expires_at = now + ttl;
        Ok(sub.expires_at)
    }

    /// `wse:Unsubscribe`. Idempotent termination reason is always
    /// `SourceCancelling` from the subscriber's point of view — a
    /// provider-initiated removal uses [`Self::terminate`] instead.
    pub fn unsubscribe(&self, id: &str) -> SubscriptionResult<()> {
        self.subscriptions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SubscriptionError::UnknownSubscription(id.to_string()))
    }

    /// `wse:GetStatus`: remaining time-to-live, or an error if the
    /// subscription is unknown or already expired as of `now`.
    pub fn get_status(&self, id: &str, now: Instant) -> SubscriptionResult<Duration> {
        let sub = self
            .subscriptions
            .get(id)
            .ok_or_else(|| SubscriptionError::UnknownSubscription(id.to_string()))?;
        if sub.expires_at <= now {
            return Err(SubscriptionError::Expired(id.to_string()));
        }
        Ok(sub.expires_at - now)
    }

    /// Provider-initiated termination (shutdown, cancel, or a queue that
    /// overflowed on delivery).
    pub fn terminate(&self, id: &str, reason: TerminationReason) {
        if self.subscriptions.remove(id).is_some() {
            log::info!("subscription {id} terminated: {reason:?}");
        }
    }

    /// Sweeps every subscription whose TTL has lapsed as of `now`.
    pub fn expire_stale(&self, now: Instant) {
        let stale: Vec<std::sync::Arc<str>> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.key().clone())
            .collect();
        for id in stale {
            self.terminate(&id, TerminationReason::Expired);
        }
    }

    /// Fans a committed transaction's report out to every subscription
    /// whose filter matches at least one action in it. A subscription
    /// whose queue is momentarily full blocks this call for up to
    /// `backpressure_window` (per spec.md §5); if it is still full after
    /// that it is terminated with [`TerminationReason::Overflow`] — a
    /// disconnected receiver (the subscriber's delivery task already gave
    /// up) instead terminates with `DeliveryFailure`. Neither case ever
    /// blocks or fails the transaction that produced `report`.
    pub fn dispatch(&self, report: &sdc_core::TransactionReport, origin: ReportOrigin) {
        let mut overflowed = Vec::new();
        let mut disconnected = Vec::new();
        for entry in self.subscriptions.iter() {
            let matched: Vec<ReportAction> = report
                .actions
                .iter()
                .filter(|a| entry.topics.iter().any(|t| t.matches(a)))
                .cloned()
                .collect();
            if matched.is_empty() {
                continue;
            }
            let delivery = Delivery {
                mdib_version: report.mdib_version,
                sequence_id: report.sequence_id.clone(),
                actions: matched,
                origin,
            };
            match entry.sender.send_timeout(delivery, self.backpressure_window) {
                Ok(()) => {}
                Err(crossbeam_channel::SendTimeoutError::Timeout(_)) => overflowed.push(entry.key().clone()),
                Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => disconnected.push(entry.key().clone()),
            }
        }
        for id in overflowed {
            log::warn!("{}", SubscriptionError::Overflow(id.to_string()));
            self.terminate(&id, TerminationReason::Overflow);
        }
        for id in disconnected {
            self.terminate(&id, TerminationReason::DeliveryFailure);
        }
    }

    pub fn endpoint(&self, id: &str) -> Option<String> {
        self.subscriptions.get(id).map(|s| s.endpoint.clone())
    }

    pub fn receiver(&self, id: &str) -> Option<crossbeam_channel::Receiver<Delivery>> {
        self.subscriptions.get(id).map(|s| s.receiver.clone())
    }

    pub fn active_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Terminates every subscription with `SourceShuttingDown` — called
    /// when the owning provider process is going away.
    pub fn shutdown(&self) {
        let ids: Vec<std::sync::Arc<str>> = self.subscriptions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.terminate(&id, TerminationReason::SourceShuttingDown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdc_core::Handle;

    fn metric_changed_report() -> sdc_core::TransactionReport {
        let state = Arc::new(sdc_core::State::new(Handle::from("nm0"), sdc_core::StateValue::metric_initial(36.6)));
        sdc_core::TransactionReport {
            mdib_version: 2,
            sequence_id: Arc::from("urn:uuid:seq-1"),
            actions: vec![ReportAction::MetricStateChanged(state)],
        }
    }

    #[test]
    fn subscribe_rejects_empty_topic_filter() {
        let mgr = SubscriptionManager::new(Duration::from_secs(60), 16);
        let err = mgr.subscribe("https://consumer/ep", Vec::new(), None, Instant::now()).unwrap_err();
        assert!(matches!(err, SubscriptionError::FilterNotSupported(_)));
    }

    #[test]
    fn subscribe_then_get_status_reports_remaining_ttl() {
        let mgr = SubscriptionManager::new(Duration::from_secs(60), 16);
        let now = Instant::now();
        let (id, expires_at) = mgr
            .subscribe("https://consumer/ep", vec![ReportTopic::Metric], None, now)
            .unwrap();
        assert_eq!(expires_at, now + Duration::from_secs(60));
        let remaining = mgr.get_status(&id, now + Duration::from_secs(10)).unwrap();
        assert!(remaining <= Duration::from_secs(50));
    }

    #[test]
    fn renew_extends_expiration_from_call_time() {
        let mgr = SubscriptionManager::new(Duration::from_secs(60), 16);
        let now = Instant::now();
        let (id, _) = mgr
            .subscribe("https://consumer/ep", vec![ReportTopic::Metric], None, now)
            .unwrap();
        let later = now + Duration::from_secs(30);
        let new_expiry = mgr.renew(&id, Some(Duration::from_secs(120)), later).unwrap();
        assert_eq!(new_expiry, later + Duration::from_secs(120));
    }

    #[test]
    fn unsubscribe_removes_the_subscription() {
        let mgr = SubscriptionManager::new(Duration::from_secs(60), 16);
        let (id, _) = mgr
            .subscribe("https://consumer/ep", vec![ReportTopic::Metric], None, Instant::now())
            .unwrap();
        mgr.unsubscribe(&id).unwrap();
        assert!(mgr.get_status(&id, Instant::now()).is_err());
    }

    #[test]
    fn expire_stale_terminates_subscriptions_past_ttl() {
        let mgr = SubscriptionManager::new(Duration::from_millis(1), 16);
        let now = Instant::now();
        let (id, _) = mgr
            .subscribe("https://consumer/ep", vec![ReportTopic::Metric], None, now)
            .unwrap();
        mgr.expire_stale(now + Duration::from_secs(1));
        assert_eq!(mgr.active_count(), 0);
        assert!(mgr.get_status(&id, now + Duration::from_secs(1)).is_err());
    }

    #[test]
    fn dispatch_only_delivers_to_matching_topic_subscribers() {
        let mgr = SubscriptionManager::new(Duration::from_secs(60), 16);
        let now = Instant::now();
        let (metric_id, _) = mgr
            .subscribe("https://consumer/metric", vec![ReportTopic::Metric], None, now)
            .unwrap();
        let (alert_id, _) = mgr
            .subscribe("https://consumer/alert", vec![ReportTopic::Alert], None, now)
            .unwrap();

        let report = metric_changed_report();
        mgr.dispatch(&report, ReportOrigin::Episodic);

        let metric_rx = mgr.receiver(&metric_id).unwrap();
        assert!(metric_rx.try_recv().is_ok());
        let alert_rx = mgr.receiver(&alert_id).unwrap();
        assert!(alert_rx.try_recv().is_err());
    }

    #[test]
    fn dispatch_terminates_subscription_on_full_queue() {
        let mgr = SubscriptionManager::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        let (id, _) = mgr
            .subscribe("https://consumer/metric", vec![ReportTopic::Metric], None, now)
            .unwrap();
        let report = metric_changed_report();
        mgr.dispatch(&report, ReportOrigin::Episodic); // fills the queue of capacity 1
        mgr.dispatch(&report, ReportOrigin::Episodic); // queue full, should terminate
        assert_eq!(mgr.active_count(), 0);
    }
}
