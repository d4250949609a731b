// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consumer-facing wrapper around [`sdc_discovery::DiscoveryEngine`]: send
//! a `Probe`, collect matching endpoints for a fixed window, stop.
//!
//! `sdc-discovery` itself only knows how to run forever and hand matching
//! events to whoever reads its channel; a one-shot "who's out there right
//! now" search is a consumer concern, not something the engine needs to
//! bake in, since a provider's announcer has no use for it.

use std::net::Ipv4Addr;
use std::time::Duration;

use sdc_discovery::{
    AppSequence, DiscoveredEndpoint, DiscoveryEngine, DiscoveryMessage, RelevancePredicate, RetransmitSchedule,
};

use crate::error::ConsumerResult;

/// One endpoint found by [`probe`], with just enough to drive a
/// `GetMdib`/`Subscribe` bootstrap: the endpoint reference and the
/// `wsd:XAddrs` a client should try, in the order advertised.
#[derive(Debug, Clone)]
pub struct DiscoveredProvider {
    pub epr: String,
    pub x_addrs: Vec<String>,
}

/// Sends a multicast `Probe` filtered by `predicate`, following the
/// specification-mandated initial-delay-then-repeat-with-backoff schedule
/// (spec.md §4.D), and collects every matching `ProbeMatches`/`Hello` that
/// arrives within `max_wait`. Runs the engine's receive loop on a
/// background task for the duration of the wait and aborts it on return.
pub async fn probe(
    engine: &DiscoveryEngine,
    predicate: RelevancePredicate,
    max_wait: Duration,
) -> ConsumerResult<Vec<DiscoveredProvider>> {
    let events = engine.events();

    let message = DiscoveryMessage::Probe {
        app_sequence: AppSequence::first(1),
        message_id: sdc_soap::new_message_id(),
        types: predicate.types.clone(),
        scopes: predicate.scopes.clone(),
    };
    let body = message.encode_body();
    engine
        .send_multicast_with_retransmit(&body, RetransmitSchedule::default())
        .await?;

    Ok(collect_matches(events, predicate, max_wait).await)
}

/// Like [`probe`], but also drives the engine's own receive loop for the
/// duration of the search — use this when nothing else in the process is
/// already running [`DiscoveryEngine::run`] against a shared engine.
/// `interface` selects which local interface joins the multicast group;
/// `None` binds to all interfaces.
///
/// The probe is sent before the engine is handed to its background
/// receive loop, since [`DiscoveryEngine::run`] takes `&mut self` (it
/// mutates the dedup table) and so cannot be shared with a concurrent
/// sender — only [`DiscoveryEngine::events`]'s cloned receiver is needed
/// afterward to collect matches.
pub async fn discover(
    interface: Option<Ipv4Addr>,
    predicate: RelevancePredicate,
    max_wait: Duration,
) -> ConsumerResult<Vec<DiscoveredProvider>> {
    let mut engine = DiscoveryEngine::bind(interface)?;
    let events = engine.events();

    let message = DiscoveryMessage::Probe {
        app_sequence: AppSequence::first(1),
        message_id: sdc_soap::new_message_id(),
        types: predicate.types.clone(),
        scopes: predicate.scopes.clone(),
    };
    let body = message.encode_body();
    engine
        .send_multicast_with_retransmit(&body, RetransmitSchedule::default())
        .await?;

    let run_predicate = predicate.clone();
    let handle = tokio::spawn(async move {
        engine.run(run_predicate, || std::time::UNIX_EPOCH.elapsed().unwrap_or_default()).await;
    });

    let result = collect_matches(events, predicate, max_wait).await;
    handle.abort();
    Ok(result)
}

async fn collect_matches(
    events: crossbeam_channel::Receiver<DiscoveredEndpoint>,
    predicate: RelevancePredicate,
    max_wait: Duration,
) -> Vec<DiscoveredProvider> {
    let deadline = tokio::time::Instant::now() + max_wait;
    let mut found = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        let events = events.clone();
        let received = tokio::task::spawn_blocking(move || events.recv_timeout(remaining)).await;
        match received {
            Ok(Ok(DiscoveredEndpoint::Found { epr, metadata, .. })) if predicate.matches(&metadata) => {
                found.push(DiscoveredProvider {
                    epr,
                    x_addrs: metadata.x_addrs,
                });
            }
            Ok(Ok(_)) => continue,
            Ok(Err(_)) | Err(_) => break,
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovered_provider_carries_first_x_addr_as_preferred() {
        let provider = DiscoveredProvider {
            epr: "urn:uuid:device-1".into(),
            x_addrs: vec!["https://10.0.0.5:8080/device".into(), "https://10.0.0.6:8080/device".into()],
        };
        assert_eq!(provider.x_addrs.first().map(String::as_str), Some("https://10.0.0.5:8080/device"));
    }
}
