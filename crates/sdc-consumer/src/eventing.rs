// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WS-Eventing client operations: Subscribe/Renew/GetStatus/Unsubscribe
//! against a peer's subscription manager endpoint.
//!
//! `sdc-provider::subscription::SubscriptionManager` already implements
//! Subscribe/Renew/GetStatus/Unsubscribe as plain Rust methods, but no
//! binary in this workspace wires them to a SOAP endpoint — provider
//! construction is left to the embedding process (see
//! `sdc_provider::Provider`'s doc comment). This module is the other half
//! of that contract: a consumer that speaks the wire protocol to whatever
//! endpoint discovery handed it, the same way `bootstrap::get_mdib` speaks
//! `GetMdib` without assuming anything about how the peer dispatches it.

use std::time::Duration;

use sdc_soap::{Addressing, Envelope};
use sdc_transport::client::{HttpClientPool, SoapRequest};
use sdc_transport::deadline::Deadline;
use sdc_xml::qname::ns;
use sdc_xml::writer::escape_attr;
use sdc_xml::Runtime;

use crate::error::{ConsumerError, ConsumerResult};

const ACTION_FILTER_DIALECT: &str = "http://docs.oasis-open.org/ws-dd/ns/dpws/2009/01/Action";

pub const SUBSCRIBE_ACTION: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing/Subscribe";
pub const RENEW_ACTION: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing/Renew";
pub const GET_STATUS_ACTION: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing/GetStatus";
pub const UNSUBSCRIBE_ACTION: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing/Unsubscribe";

/// Result of a successful `Subscribe`: the subscription manager reference
/// (opaque id a `Renew`/`GetStatus`/`Unsubscribe` must quote back) and the
/// granted expiry.
#[derive(Debug, Clone)]
pub struct SubscribeOutcome {
    pub subscription_id: String,
    pub expires: Duration,
}

fn write_duration(d: Duration) -> String {
    format!("PT{}S", d.as_secs())
}

fn parse_duration(s: &str) -> Option<Duration> {
    let secs = s.strip_prefix("PT")?.strip_suffix('S')?;
    secs.parse::<u64>().ok().map(Duration::from_secs)
}

fn find_text(node: roxmltree::Node, local: &str) -> Option<String> {
    node.descendants()
        .find(|c| c.is_element() && c.tag_name().name() == local)
        .and_then(|c| c.text())
        .map(str::to_string)
}

/// A thin WS-Eventing client bound to one HTTP client pool and deadline
/// policy — mirrors `bootstrap::get_mdib`'s shape rather than wrapping
/// state of its own, since every call here targets whatever subscription
/// manager endpoint the previous call (or discovery) returned.
pub struct EventingClient<'a> {
    pub client_pool: &'a HttpClientPool,
    pub request_timeout: Duration,
}

impl<'a> EventingClient<'a> {
    pub fn new(client_pool: &'a HttpClientPool, request_timeout: Duration) -> Self {
        Self {
            client_pool,
            request_timeout,
        }
    }

    async fn call(&self, endpoint: &str, action: &str, body: String) -> ConsumerResult<Envelope> {
        let mut runtime = Runtime::new();
        let addressing = Addressing::request(action, sdc_soap::new_message_id());
        let xml = Envelope::new(addressing, body).encode(&mut runtime);
        let request = SoapRequest {
            url: endpoint.to_string(),
            soap_action: action.to_string(),
            body_xml: xml,
        };
        let response = self.client_pool.send(request, Deadline::after(self.request_timeout)).await?;
        let envelope = Envelope::decode(&response.body_xml)?;
        if envelope.is_fault() || response.status >= 300 {
            return Err(ConsumerError::UnexpectedResponse(format!(
                "{action} to {endpoint} failed (status {}): {}",
                response.status, envelope.body_xml
            )));
        }
        Ok(envelope)
    }

    /// Subscribes to the given action filter, asking reports be delivered
    /// to `delivery_to` (a URL this consumer's own
    /// `sdc_transport::server::HttpServer` listens on, see
    /// [`crate::listener`]).
    pub async fn subscribe(
        &self,
        endpoint: &str,
        actions: &[&str],
        delivery_to: &str,
        requested_ttl: Option<Duration>,
    ) -> ConsumerResult<SubscribeOutcome> {
        let mut runtime = Runtime::new();
        let wse = runtime.qnames.prefix_for(ns::WSE).to_string();
        let mut body = format!(
            "<{wse}:Subscribe><{wse}:Delivery Mode=\"{}/DeliveryModes/Push\">\
             <{wse}:NotificationTo><wsa:Address>{}</wsa:Address></{wse}:NotificationTo>\
             </{wse}:Delivery>",
            ns::WSE,
            escape_attr(delivery_to)
        );
        if let Some(ttl) = requested_ttl {
            body.push_str(&format!("<{wse}:Expires>{}</{wse}:Expires>", write_duration(ttl)));
        }
        body.push_str(&format!(
            "<{wse}:Filter Dialect=\"{ACTION_FILTER_DIALECT}\">{}</{wse}:Filter>",
            actions.join(" ")
        ));
        body.push_str(&format!("</{wse}:Subscribe>"));

        let envelope = self.call(endpoint, SUBSCRIBE_ACTION, body).await?;
        parse_subscribe_response(&envelope.body_xml)
    }

    pub async fn renew(&self, endpoint: &str, subscription_id: &str, requested_ttl: Option<Duration>) -> ConsumerResult<Duration> {
        let mut runtime = Runtime::new();
        let wse = runtime.qnames.prefix_for(ns::WSE).to_string();
        let mut body = format!("<{wse}:Renew><{wse}:Identifier>{}</{wse}:Identifier>", escape_attr(subscription_id));
        if let Some(ttl) = requested_ttl {
            body.push_str(&format!("<{wse}:Expires>{}</{wse}:Expires>", write_duration(ttl)));
        }
        body.push_str(&format!("</{wse}:Renew>"));

        let envelope = self.call(endpoint, RENEW_ACTION, body).await?;
        let expires = sdc_xml::reader::with_root(&envelope.body_xml, |root| {
            find_text(root, "Expires")
                .and_then(|s| parse_duration(&s))
                .ok_or_else(|| sdc_xml::DecodeError::missing("/RenewResponse/Expires"))
        })?;
        Ok(expires)
    }

    pub async fn get_status(&self, endpoint: &str, subscription_id: &str) -> ConsumerResult<Duration> {
        let mut runtime = Runtime::new();
        let wse = runtime.qnames.prefix_for(ns::WSE).to_string();
        let body = format!(
            "<{wse}:GetStatus><{wse}:Identifier>{}</{wse}:Identifier></{wse}:GetStatus>",
            escape_attr(subscription_id)
        );

        let envelope = self.call(endpoint, GET_STATUS_ACTION, body).await?;
        let remaining = sdc_xml::reader::with_root(&envelope.body_xml, |root| {
            find_text(root, "Expires")
                .and_then(|s| parse_duration(&s))
                .ok_or_else(|| sdc_xml::DecodeError::missing("/GetStatusResponse/Expires"))
        })?;
        Ok(remaining)
    }

    pub async fn unsubscribe(&self, endpoint: &str, subscription_id: &str) -> ConsumerResult<()> {
        let mut runtime = Runtime::new();
        let wse = runtime.qnames.prefix_for(ns::WSE).to_string();
        let body = format!(
            "<{wse}:Unsubscribe><{wse}:Identifier>{}</{wse}:Identifier></{wse}:Unsubscribe>",
            escape_attr(subscription_id)
        );
        self.call(endpoint, UNSUBSCRIBE_ACTION, body).await?;
        Ok(())
    }
}

fn parse_subscribe_response(body_xml: &str) -> ConsumerResult<SubscribeOutcome> {
    sdc_xml::reader::with_root(body_xml, |root| {
        let subscription_id = find_text(root, "Identifier").ok_or_else(|| sdc_xml::DecodeError::missing("/SubscribeResponse/.../Identifier"))?;
        let expires = find_text(root, "Expires")
            .and_then(|s| parse_duration(&s))
            .ok_or_else(|| sdc_xml::DecodeError::missing("/SubscribeResponse/Expires"))?;
        Ok(SubscribeOutcome { subscription_id, expires })
    })
    .map_err(ConsumerError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_parse_duration_round_trip() {
        let d = Duration::from_secs(3600);
        assert_eq!(parse_duration(&write_duration(d)), Some(d));
    }

    #[test]
    fn parses_subscribe_response_body() {
        let xml = r#"<wse:SubscribeResponse xmlns:wse="http://schemas.xmlsoap.org/ws/2004/08/eventing" xmlns:wsa="http://www.w3.org/2005/08/addressing">
            <wse:SubscriptionManager>
                <wsa:Address>http://peer/ReportingService</wsa:Address>
                <wsa:ReferenceParameters><wse:Identifier>urn:uuid:subscription-1</wse:Identifier></wsa:ReferenceParameters>
            </wse:SubscriptionManager>
            <wse:Expires>PT3600S</wse:Expires>
        </wse:SubscribeResponse>"#;
        let outcome = parse_subscribe_response(xml).unwrap();
        assert_eq!(outcome.subscription_id, "urn:uuid:subscription-1");
        assert_eq!(outcome.expires, Duration::from_secs(3600));
    }
}
