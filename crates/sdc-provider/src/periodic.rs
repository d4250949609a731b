// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic report coalescing.
//!
//! Episodic reports go out the moment a transaction commits
//! (`ServiceDispatch::device_update`/the `Set*`/`Activate` lifecycle in
//! `dispatch.rs` both call `SubscriptionManager::dispatch` directly). This
//! module runs alongside that on a single `tokio::time::interval` timer —
//! following the single-timer-per-task shape of the discovery engine's
//! periodic `Hello` re-announce — and exists only to bound how often a
//! *rapidly* changing state (a waveform sample, a metric under continuous
//! update) is re-sent: every commit is recorded here too, but only the
//! latest value per descriptor survives until the next tick, and the tick
//! dispatches one coalesced report instead of one per commit.
//!
//! Operation-invocation transitions are never coalesced: a consumer
//! waiting on a `Set*` result needs each transition as it happens, so
//! `record` drops `OperationInvokedChanged` actions rather than buffering
//! them. `SystemErrorReport` actions are dropped for the same reason — a
//! fault notification is always dispatched immediately by the caller, not
//! folded into the next periodic tick.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sdc_core::{ReportAction, TransactionReport};

use crate::subscription::{ReportOrigin, SubscriptionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Category {
    Description,
    Metric,
    Alert,
    Component,
    Context,
    Operational,
    RealTimeSample,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CoalesceKey {
    category: Category,
    handle: Arc<str>,
}

fn key_for(action: &ReportAction) -> Option<CoalesceKey> {
    let (category, handle) = match action {
        ReportAction::DescriptionCreated(d) | ReportAction::DescriptionUpdated(d) => {
            (Category::Description, d.handle.as_str())
        }
        ReportAction::DescriptionDeleted(h) => (Category::Description, h.as_str()),
        ReportAction::MetricStateChanged(s) => (Category::Metric, s.descriptor.as_str()),
        ReportAction::AlertStateChanged(s) => (Category::Alert, s.descriptor.as_str()),
        ReportAction::ComponentStateChanged(s) => (Category::Component, s.descriptor.as_str()),
        ReportAction::ContextStateChanged(s) => (Category::Context, s.descriptor.as_str()),
        ReportAction::OperationalStateChanged(s) => (Category::Operational, s.descriptor.as_str()),
        ReportAction::RealTimeSampleChanged(s) => (Category::RealTimeSample, s.descriptor.as_str()),
        ReportAction::OperationInvokedChanged { .. } => return None,
        ReportAction::SystemErrorReport { .. } => return None,
    };
    Some(CoalesceKey {
        category,
        handle: Arc::from(handle),
    })
}

struct Pending {
    actions: HashMap<CoalesceKey, ReportAction>,
    sequence_id: Arc<str>,
}

/// Buffers the latest action per `(category, descriptor)` since the last
/// tick and emits one coalesced [`TransactionReport`] per tick, tagged
/// with the most recent MDIB version seen.
pub struct PeriodicCoalescer {
    pending: Mutex<Pending>,
    latest_mdib_version: AtomicU64,
}

impl PeriodicCoalescer {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Pending {
                actions: HashMap::new(),
                sequence_id: Arc::from(""),
            }),
            latest_mdib_version: AtomicU64::new(0),
        }
    }

    /// Folds a just-committed transaction's report into the pending
    /// buffer. Call this at every commit site that also calls
    /// `SubscriptionManager::dispatch`, so periodic subscribers see every
    /// change eventually even when episodic delivery and periodic
    /// coalescing share the same source reports.
    pub fn record(&self, report: &TransactionReport) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for action in &report.actions {
            if let Some(key) = key_for(action) {
                pending.actions.insert(key, action.clone());
            }
        }
        pending.sequence_id = report.sequence_id.clone();
        self.latest_mdib_version.store(report.mdib_version, Ordering::Relaxed);
    }

    fn drain(&self) -> Option<TransactionReport> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.actions.is_empty() {
            return None;
        }
        let actions: Vec<ReportAction> = pending.actions.drain().map(|(_, v)| v).collect();
        Some(TransactionReport {
            mdib_version: self.latest_mdib_version.load(Ordering::Relaxed),
            sequence_id: pending.sequence_id.clone(),
            actions,
        })
    }

    /// Runs until the process shuts down: every `interval`, drains
    /// whatever's pending and fans it out through the same
    /// `SubscriptionManager::dispatch` path episodic reports use. A tick
    /// with nothing recorded since the last one dispatches nothing.
    pub async fn run(self: Arc<Self>, subscriptions: Arc<SubscriptionManager>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(report) = self.drain() {
                subscriptions.dispatch(&report, ReportOrigin::Periodic);
            }
        }
    }
}

impl Default for PeriodicCoalescer {
    fn default() -> Self {
        Self::new()
    }
}
