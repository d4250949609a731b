// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast socket plumbing tying the wire codec, dedup table and
//! relevance predicate together into a `DiscoveredEndpoint` stream.
//!
//! Socket setup uses `socket2` directly (SO_REUSEADDR, bind-before-join,
//! and the multicast options `std::net::UdpSocket` can't express) for a
//! single socket: WS-Discovery needs exactly one multicast socket here,
//! since Resolve/Probe responses are unicast replies on the same socket
//! rather than a separate metatraffic channel.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::dedup::DedupTable;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::message::{DiscoveryAction, DiscoveryMessage, Metadata};
use crate::relevance::RelevancePredicate;

/// The well-known WS-Discovery 1.1 multicast group and port.
pub const WSD_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const WSD_MULTICAST_PORT: u16 = 3702;

/// The WS-Discovery 1.1 UDP retransmission algorithm (SOAP-over-UDP
/// Appendix I): an outbound multicast is sent once after `initial_delay`,
/// then resent `repeat_count` more times with the inter-send delay
/// doubling from `min_delay` up to a ceiling of `max_delay`. Every resend
/// carries the exact same bytes (same `AppSequence`/`MessageID`) so a
/// receiver's [`DedupTable`] collapses them back into one logical message.
#[derive(Debug, Clone, Copy)]
pub struct RetransmitSchedule {
    pub initial_delay: Duration,
    pub repeat_count: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetransmitSchedule {
    /// `UDP_UPPER_DELAY`/`UDP_MIN_DELAY`/`UDP_MAX_DELAY`/
    /// `UDP_RETRANSMIT_COUNT` at the defaults named in WS-Discovery 1.1.
    pub const DEFAULT: Self = Self {
        initial_delay: Duration::from_millis(100),
        repeat_count: 2,
        min_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(500),
    };
}

impl Default for RetransmitSchedule {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A relevant endpoint surfaced to a consumer: either freshly announced
/// (`Hello`), found in response to a `Probe`/`Resolve`, or withdrawn
/// (`Bye`).
#[derive(Debug, Clone)]
pub enum DiscoveredEndpoint {
    Found {
        epr: String,
        metadata: Metadata,
        metadata_version: u64,
    },
    Withdrawn {
        epr: String,
    },
}

fn bind_multicast_socket(interface: Option<Ipv4Addr>) -> DiscoveryResult<StdUdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| DiscoveryError::interface_unavailable(e.to_string()))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| DiscoveryError::interface_unavailable(e.to_string()))?;
    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, WSD_MULTICAST_PORT);
    socket
        .bind(&bind_addr.into())
        .map_err(|e| DiscoveryError::address_conflict(e.to_string()))?;
    socket
        .join_multicast_v4(&WSD_MULTICAST_ADDR, &interface.unwrap_or(Ipv4Addr::UNSPECIFIED))
        .map_err(|e| DiscoveryError::interface_unavailable(e.to_string()))?;
    socket
        .set_multicast_loop_v4(true)
        .map_err(|e| DiscoveryError::interface_unavailable(e.to_string()))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| DiscoveryError::interface_unavailable(e.to_string()))?;
    Ok(socket.into())
}

/// Owns the multicast socket and dedup table for one discovery node
/// (either a provider announcing itself, a consumer searching, or both at
/// once — WS-Discovery doesn't separate the roles at the transport level).
pub struct DiscoveryEngine {
    socket: Arc<UdpSocket>,
    dedup: DedupTable,
    events_tx: Sender<DiscoveredEndpoint>,
    events_rx: Receiver<DiscoveredEndpoint>,
}

impl DiscoveryEngine {
    /// Binds with the dedup table's built-in default window. Most callers
    /// should use [`DiscoveryEngine::bind_with_window`] instead, passing
    /// `RuntimeConfig.dup_suppression_window` through.
    pub fn bind(interface: Option<Ipv4Addr>) -> DiscoveryResult<Self> {
        Self::bind_with_window(interface, DedupTable::DEFAULT_WINDOW)
    }

    pub fn bind_with_window(interface: Option<Ipv4Addr>, dup_suppression_window: Duration) -> DiscoveryResult<Self> {
        let std_socket = bind_multicast_socket(interface)?;
        let socket = UdpSocket::from_std(std_socket)
            .map_err(|e| DiscoveryError::interface_unavailable(e.to_string()))?;
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Ok(Self {
            socket: Arc::new(socket),
            dedup: DedupTable::with_window(10_000, dup_suppression_window),
            events_tx,
            events_rx,
        })
    }

    /// A clone-able handle for reading discovered endpoints off the main
    /// socket-polling task.
    pub fn events(&self) -> Receiver<DiscoveredEndpoint> {
        self.events_rx.clone()
    }

    pub async fn send_to(&self, dest: SocketAddr, body_xml: &str) -> DiscoveryResult<()> {
        self.socket
            .send_to(body_xml.as_bytes(), dest)
            .await
            .map_err(|e| DiscoveryError::interface_unavailable(e.to_string()))?;
        Ok(())
    }

    pub async fn send_multicast(&self, body_xml: &str) -> DiscoveryResult<()> {
        self.send_to(SocketAddr::new(WSD_MULTICAST_ADDR.into(), WSD_MULTICAST_PORT), body_xml)
            .await
    }

    /// Sends `body_xml` to the multicast group following `schedule`: waits
    /// `initial_delay`, sends once, then sends `repeat_count` more times
    /// with the inter-send delay doubling up to `max_delay`. Per
    /// spec.md §4.D, every repetition of one logical announce/probe uses
    /// this so a lost first multicast doesn't strand a consumer or
    /// provider on an unreliable network.
    pub async fn send_multicast_with_retransmit(
        &self,
        body_xml: &str,
        schedule: RetransmitSchedule,
    ) -> DiscoveryResult<()> {
        tokio::time::sleep(schedule.initial_delay).await;
        self.send_multicast(body_xml).await?;

        let mut delay = schedule.min_delay;
        for _ in 0..schedule.repeat_count {
            tokio::time::sleep(delay).await;
            self.send_multicast(body_xml).await?;
            delay = std::cmp::min(delay * 2, schedule.max_delay);
        }
        Ok(())
    }

    /// Runs until cancelled: reads datagrams, decodes recognized
    /// WS-Discovery actions, drops duplicates, filters by `predicate`, and
    /// forwards relevant `Hello`/`ProbeMatches`/`ResolveMatches`/`Bye`
    /// payloads onto the event channel. Decode failures and irrelevant
    /// messages are logged and dropped — a malformed or foreign packet on
    /// the multicast group is not this node's problem to raise.
    pub async fn run(&mut self, predicate: RelevancePredicate, now: impl Fn() -> Duration) {
        let mut buf = vec![0u8; 65536];
        loop {
            let (len, _from) = match self.socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(err) => {
                    log::debug!("discovery socket recv failed: {err}");
                    continue;
                }
            };
            let datagram = String::from_utf8_lossy(&buf[..len]).into_owned();
            self.handle_datagram(&datagram, &predicate, now());
        }
    }

    fn handle_datagram(&mut self, datagram: &str, predicate: &RelevancePredicate, now: Duration) {
        let Some(action) = detect_action(datagram) else {
            log::debug!("discovery datagram did not match a known wsd action, dropping");
            return;
        };
        let decoded = DiscoveryMessage::decode_body(&action, String::new(), None, datagram);
        let msg = match decoded {
            Ok(m) => m,
            Err(err) => {
                log::debug!("failed to decode discovery message: {err}");
                return;
            }
        };

        if self.dedup.is_duplicate(msg.app_sequence(), msg.message_id(), now) {
            return;
        }

        let event = match msg {
            DiscoveryMessage::Hello {
                epr,
                metadata,
                metadata_version,
                ..
            } if predicate.matches(&metadata) => Some(DiscoveredEndpoint::Found {
                epr,
                metadata,
                metadata_version,
            }),
            DiscoveryMessage::ProbeMatches {
                epr,
                metadata,
                metadata_version,
                ..
            } if predicate.matches(&metadata) => Some(DiscoveredEndpoint::Found {
                epr,
                metadata,
                metadata_version,
            }),
            DiscoveryMessage::ResolveMatches {
                epr,
                metadata,
                metadata_version,
                ..
            } if predicate.matches(&metadata) => Some(DiscoveredEndpoint::Found {
                epr,
                metadata,
                metadata_version,
            }),
            DiscoveryMessage::Bye { epr, .. } => Some(DiscoveredEndpoint::Withdrawn { epr }),
            _ => None,
        };

        if let Some(event) = event {
            if self.events_tx.send(event).is_err() {
                log::debug!("discovery event channel has no receivers left");
            }
        }
    }
}

fn detect_action(datagram: &str) -> Option<DiscoveryAction> {
    for (needle, action) in [
        ("<wsd:ProbeMatches", DiscoveryAction::ProbeMatches),
        ("<wsd:ResolveMatches", DiscoveryAction::ResolveMatches),
        ("<wsd:Probe", DiscoveryAction::Probe),
        ("<wsd:Resolve", DiscoveryAction::Resolve),
        ("<wsd:Hello", DiscoveryAction::Hello),
        ("<wsd:Bye", DiscoveryAction::Bye),
    ] {
        if datagram.contains(needle) {
            return Some(action);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::AppSequence;

    #[test]
    fn detect_action_distinguishes_matches_from_bare_probe_and_resolve() {
        let probe = DiscoveryMessage::Probe {
            app_sequence: AppSequence::first(1),
            message_id: "m1".into(),
            types: vec![],
            scopes: vec![],
        }
        .encode_body();
        assert_eq!(detect_action(&probe), Some(DiscoveryAction::Probe));

        let resolve = DiscoveryMessage::Resolve {
            app_sequence: AppSequence::first(1),
            message_id: "m2".into(),
            epr: "urn:uuid:x".into(),
        }
        .encode_body();
        assert_eq!(detect_action(&resolve), Some(DiscoveryAction::Resolve));
    }

    #[test]
    fn detect_action_returns_none_for_unrelated_payload() {
        assert_eq!(detect_action("<foo:Bar/>"), None);
    }
}
