// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-provider announcement state machine and periodic re-announcement
//! task: `Unannounced -> HelloSent -> Live -> ByeSent -> Unannounced`.
//!
//! The periodic task is a plain tokio background task driven by a
//! shutdown flag rather than a join handle threaded through by the
//! caller, matching how the rest of this crate favors tokio tasks over
//! raw threads for long-running work. WS-Discovery's redundant Hello
//! repeats are optional, so there is no aggressive/normal phase split
//! here — just one fixed interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::message::{AppSequence, DiscoveryMessage, Metadata};

/// Where a provider's discovery announcement currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncerState {
    Unannounced,
    HelloSent,
    Live,
    ByeSent,
}

/// Drives one provider's `AppSequence` and announcement state across its
/// lifetime. Transitions are explicit method calls so the state machine
/// can be exercised without a socket or a running task.
pub struct Announcer {
    state: AnnouncerState,
    app_sequence: AppSequence,
    epr: String,
    metadata: Metadata,
    metadata_version: u64,
}

impl Announcer {
    pub fn new(instance_id: u64, epr: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            state: AnnouncerState::Unannounced,
            app_sequence: AppSequence::first(instance_id),
            epr: epr.into(),
            metadata,
            metadata_version: 0,
        }
    }

    pub fn state(&self) -> AnnouncerState {
        self.state
    }

    pub fn app_sequence(&self) -> AppSequence {
        self.app_sequence
    }

    /// `Unannounced -> HelloSent`: builds a `Hello` for the wire and
    /// advances the sequence for the next message this provider sends.
    pub fn hello(&mut self, message_id: impl Into<String>) -> DiscoveryMessage {
        let msg = DiscoveryMessage::Hello {
            app_sequence: self.app_sequence,
            message_id: message_id.into(),
            epr: self.epr.clone(),
            metadata: self.metadata.clone(),
            metadata_version: self.metadata_version,
        };
        self.app_sequence = self.app_sequence.next();
        self.state = AnnouncerState::HelloSent;
        msg
    }

    /// `HelloSent -> Live`: acknowledges the Hello has gone out and the
    /// provider is now steady-state discoverable (answers Probes/Resolves).
    pub fn mark_live(&mut self) {
        if self.state == AnnouncerState::HelloSent {
            self.state = AnnouncerState::Live;
        }
    }

    /// `Live -> ByeSent`: builds a `Bye` for graceful shutdown.
    pub fn bye(&mut self, message_id: impl Into<String>) -> DiscoveryMessage {
        let msg = DiscoveryMessage::Bye {
            app_sequence: self.app_sequence,
            message_id: message_id.into(),
            epr: self.epr.clone(),
        };
        self.app_sequence = self.app_sequence.next();
        self.state = AnnouncerState::ByeSent;
        msg
    }

    /// `ByeSent -> Unannounced`: the provider may now be forgotten and,
    /// if it restarts, must mint a fresh Hello from a new instance id.
    pub fn mark_unannounced(&mut self) {
        if self.state == AnnouncerState::ByeSent {
            self.state = AnnouncerState::Unannounced;
        }
    }

    /// Metadata changed (e.g. a new service xaddr came online): bumps the
    /// metadata version so a subsequent Hello/ProbeMatches reflects it.
    pub fn update_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
        self.metadata_version += 1;
    }

    pub fn probe_matches(&self, message_id: impl Into<String>, relates_to: impl Into<String>) -> DiscoveryMessage {
        DiscoveryMessage::ProbeMatches {
            app_sequence: self.app_sequence,
            message_id: message_id.into(),
            relates_to: relates_to.into(),
            epr: self.epr.clone(),
            metadata: self.metadata.clone(),
            metadata_version: self.metadata_version,
        }
    }

    pub fn resolve_matches(&self, message_id: impl Into<String>, relates_to: impl Into<String>) -> DiscoveryMessage {
        DiscoveryMessage::ResolveMatches {
            app_sequence: self.app_sequence,
            message_id: message_id.into(),
            relates_to: relates_to.into(),
            epr: self.epr.clone(),
            metadata: self.metadata.clone(),
            metadata_version: self.metadata_version,
        }
    }
}

/// Background task sending a redundant `Hello` on a fixed interval while a
/// provider is `Live`, to cover for multicast packet loss missed by any
/// single Hello. Stop by dropping the handle or calling `shutdown()`.
pub struct PeriodicHello {
    shutdown: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PeriodicHello {
    pub fn spawn<F>(interval: Duration, mut emit: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                emit();
            }
        });
        Self {
            shutdown,
            task: Some(task),
        }
    }

    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PeriodicHello {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> Metadata {
        Metadata {
            types: vec!["dpws:Device".into()],
            scopes: vec!["sdc.mds.pkp:1".into()],
            x_addrs: vec!["https://127.0.0.1:8080/device".into()],
        }
    }

    #[test]
    fn lifecycle_follows_unannounced_hello_live_bye_unannounced() {
        let mut ann = Announcer::new(1, "urn:uuid:device-1", sample_metadata());
        assert_eq!(ann.state(), AnnouncerState::Unannounced);

        ann.hello("urn:uuid:m1");
        assert_eq!(ann.state(), AnnouncerState::HelloSent);

        ann.mark_live();
        assert_eq!(ann.state(), AnnouncerState::Live);

        ann.bye("urn:uuid:m2");
        assert_eq!(ann.state(), AnnouncerState::ByeSent);

        ann.mark_unannounced();
        assert_eq!(ann.state(), AnnouncerState::Unannounced);
    }

    #[test]
    fn app_sequence_advances_with_every_emitted_message() {
        let mut ann = Announcer::new(1, "urn:uuid:device-1", sample_metadata());
        let first = ann.app_sequence();
        ann.hello("urn:uuid:m1");
        let second = ann.app_sequence();
        assert_eq!(second.message_number, first.message_number + 1);
        assert_eq!(second.instance_id, first.instance_id);
    }

    #[test]
    fn mark_live_is_a_no_op_outside_hello_sent() {
        let mut ann = Announcer::new(1, "urn:uuid:device-1", sample_metadata());
        ann.mark_live();
        assert_eq!(ann.state(), AnnouncerState::Unannounced, "can't skip straight to Live");
    }

    #[test]
    fn metadata_update_bumps_version_without_touching_state() {
        let mut ann = Announcer::new(1, "urn:uuid:device-1", sample_metadata());
        ann.hello("urn:uuid:m1");
        ann.mark_live();
        ann.update_metadata(sample_metadata());
        let msg = ann.probe_matches("urn:uuid:m3", "urn:uuid:m-probe");
        match msg {
            DiscoveryMessage::ProbeMatches { metadata_version, .. } => assert_eq!(metadata_version, 1),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
