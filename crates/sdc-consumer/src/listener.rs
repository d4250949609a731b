// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The delivery-endpoint HTTP server a consumer hands to
//! [`crate::eventing::EventingClient::subscribe`] as `delivery_to`.
//!
//! Wraps [`sdc_transport::server::HttpServer`]/[`ServiceRegistry`] with
//! exactly one registered path: decode the SOAP envelope a provider POSTs,
//! parse its `EpisodicReport` body, and hand the result to a [`Mirror`].
//! Reports arrive and apply synchronously within the handler — there is
//! no separate inbound queue, since [`Mirror::apply_report`] is already
//! cheap, in-process, and never blocks on I/O.

use std::net::SocketAddr;
use std::sync::Arc;

use sdc_soap::Envelope;
use sdc_transport::server::{HttpServer, ServiceRegistry};
use tokio::sync::mpsc::UnboundedSender;

use crate::mirror::{Mirror, MirrorOutcome};
use crate::report_body::parse_report_body;

/// Path a provider's delivery POSTs land on; combined with a consumer's
/// bound host/port this is the `delivery_to` URL passed to `Subscribe`.
pub const DELIVERY_PATH: &str = "ReportListener";

/// Starts an HTTP server applying every delivered report to `mirror`.
/// Runs until the process ends or the returned task is aborted; malformed
/// deliveries are logged and acknowledged anyway, since a provider has no
/// use for a NOTIFY-style delivery failure beyond the consecutive-failure
/// count `sdc-provider::delivery` already tracks on its own side.
///
/// `outcomes`, if given, receives every successfully-applied report's
/// [`MirrorOutcome`] — a caller that wants to narrate what changed (not
/// just that the mirror's version advanced) reads this side channel
/// instead of polling the mirror.
pub fn serve(
    mirror: Arc<Mirror>,
    addr: SocketAddr,
    outcomes: Option<UnboundedSender<MirrorOutcome>>,
) -> tokio::task::JoinHandle<std::io::Result<()>> {
    let registry = ServiceRegistry::new();
    registry.register(DELIVERY_PATH, move |body_xml| {
        let mirror = Arc::clone(&mirror);
        let outcomes = outcomes.clone();
        Box::pin(async move { handle_delivery(&mirror, &body_xml, outcomes.as_ref()) })
    });
    let server = HttpServer::new(registry);
    tokio::spawn(async move { server.serve(addr).await })
}

/// Processes one delivered envelope. Always returns a well-formed empty
/// SOAP body: WS-Eventing delivery is fire-and-forget from the provider's
/// perspective, so the response content doesn't carry application-level
/// outcome back — only HTTP status does, and [`sdc_transport::server`]
/// already answers `200 OK` for anything a registered handler returns.
fn handle_delivery(mirror: &Mirror, body_xml: &str, outcomes: Option<&UnboundedSender<MirrorOutcome>>) -> String {
    let envelope = match Envelope::decode(body_xml) {
        Ok(e) => e,
        Err(err) => {
            log::warn!("report delivery did not decode as a SOAP envelope: {err}");
            return empty_ack();
        }
    };
    let report = match parse_report_body(&envelope.body_xml) {
        Ok(r) => r,
        Err(err) => {
            log::warn!("report delivery body did not decode as an EpisodicReport: {err}");
            return empty_ack();
        }
    };
    match mirror.apply_report(report) {
        Ok(outcome) => {
            if let MirrorOutcome::NeedsRebuild = outcome {
                log::warn!("report delivery requires a full mirror rebuild (sequence id or structural change)");
            }
            if let Some(tx) = outcomes {
                tx.send(outcome).ok();
            }
        }
        Err(err) => {
            log::warn!("failed to apply delivered report: {err}");
        }
    }
    empty_ack()
}

fn empty_ack() -> String {
    "<s:Envelope xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\"><s:Body/></s:Envelope>".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_body_is_acknowledged_without_panicking() {
        let mirror = Mirror::new();
        let ack = handle_delivery(&mirror, "not xml at all", None);
        assert!(ack.contains("s:Envelope"));
    }
}
