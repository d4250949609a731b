// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sdc-discovery — WS-Discovery 1.1 engine
//!
//! Multicast probe/resolve, hello/bye announcement, duplicate suppression
//! and relevance matching for IEEE 11073 SDC endpoint discovery. Wire
//! messages are hand-encoded SOAP bodies via `sdc-xml`/`sdc-soap` rather
//! than a serde-tagged wire enum, consistent with how the rest of this
//! workspace treats the SOAP layer.

pub mod announcer;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod message;
pub mod relevance;

pub use announcer::{Announcer, AnnouncerState, PeriodicHello};
pub use dedup::DedupTable;
pub use engine::{
    DiscoveredEndpoint, DiscoveryEngine, RetransmitSchedule, WSD_MULTICAST_ADDR, WSD_MULTICAST_PORT,
};
pub use error::{DiscoveryError, DiscoveryErrorKind, DiscoveryResult};
pub use message::{AppSequence, DiscoveryAction, DiscoveryMessage, Metadata};
pub use relevance::RelevancePredicate;
