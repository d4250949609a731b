// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Report delivery: one background task per subscription that
//! drains its bounded queue in order and posts each batch as a SOAP
//! envelope to the subscriber's endpoint.
//!
//! `crossbeam_channel::Receiver` is not `async`-aware, so delivery polls it
//! with a short sleep between empty reads rather than blocking a Tokio
//! worker thread outright — the same trade the rest of this crate makes to
//! avoid pulling in a second channel implementation just for the async
//! side.

use std::sync::Arc;
use std::time::Duration;

use sdc_core::{ReportAction, TransactionReport};
use sdc_soap::envelope::Envelope;
use sdc_soap::{Addressing, SoapFault};
use sdc_transport::client::{HttpClientPool, SoapRequest};
use sdc_transport::deadline::Deadline;
use sdc_xml::qname::ns;
use sdc_xml::writer::escape_attr;
use sdc_xml::Runtime;

use crate::subscription::{Delivery, ReportOrigin, SubscriptionManager, TerminationReason};

/// The `wsa:Action` an episodically-delivered report is addressed with. A
/// real deployment would vary this per report category; one constant per
/// origin is enough here since the consumer façade dispatches on body
/// content, not the SOAP action, when reading a report.
pub const EPISODIC_REPORT_ACTION: &str =
    "http://standards.ieee.org/11073/20701/2018/MdibReportingService/EpisodicReport";

/// The `wsa:Action` a [`ReportOrigin::Periodic`] delivery is addressed
/// with, so a consumer can tell a coalesced periodic update apart from an
/// episodic one without inspecting the body.
pub const PERIODIC_REPORT_ACTION: &str =
    "http://standards.ieee.org/11073/20701/2018/MdibReportingService/PeriodicReport";

/// A subscription is torn down with [`TerminationReason::DeliveryFailure`]
/// after this many consecutive failed POSTs: bounded retry, never silent
/// indefinite buffering.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Renders one [`Delivery`] batch as a report body, grouped by category so
/// a consumer can project each part back to the BICEPS report type it came
/// from without re-deriving the grouping itself. The top-level element is
/// `EpisodicReport` or `PeriodicReport` depending on `delivery.origin`.
pub fn encode_delivery_body(delivery: &Delivery, runtime: &mut Runtime) -> String {
    let pm = runtime.qnames.prefix_for(ns::PM).to_string();
    let msg = runtime.qnames.prefix_for(ns::MSG).to_string();

    let transient = TransactionReport {
        mdib_version: delivery.mdib_version,
        sequence_id: delivery.sequence_id.clone(),
        actions: delivery.actions.clone(),
    };
    let slices = transient.decompose();

    let root_tag = match delivery.origin {
        ReportOrigin::Episodic => "EpisodicReport",
        ReportOrigin::Periodic => "PeriodicReport",
    };

    let mut body = format!(
        "<{msg}:{root_tag} {pm}:MdibVersion=\"{}\" {pm}:SequenceId=\"{}\">",
        delivery.mdib_version,
        escape_attr(&delivery.sequence_id),
    );
    write_description_part(&mut body, &slices.description, &pm);
    write_state_part(&mut body, "MetricReportPart", &slices.metric, runtime);
    write_state_part(&mut body, "AlertReportPart", &slices.alert, runtime);
    write_state_part(&mut body, "ComponentReportPart", &slices.component, runtime);
    write_state_part(&mut body, "ContextReportPart", &slices.context, runtime);
    write_state_part(&mut body, "OperationalStateReportPart", &slices.operational, runtime);
    write_state_part(&mut body, "RealTimeSampleArrayMetricReportPart", &slices.real_time_sample, runtime);
    write_invocation_part(&mut body, &slices.operation_invoked, &pm);
    write_system_error_part(&mut body, &slices.system_error, &pm);
    body.push_str(&format!("</{msg}:{root_tag}>"));
    body
}

fn write_description_part(buf: &mut String, actions: &[&ReportAction], pm: &str) {
    if actions.is_empty() {
        return;
    }
    buf.push_str(&format!("<{pm}:DescriptionReportPart>"));
    for action in actions {
        match action {
            ReportAction::DescriptionCreated(d) => buf.push_str(&format!(
                "<{pm}:ReportPart Kind=\"Crt\" Handle=\"{}\" DescriptorVersion=\"{}\"/>",
                escape_attr(d.handle.as_str()),
                d.version
            )),
            ReportAction::DescriptionUpdated(d) => buf.push_str(&format!(
                "<{pm}:ReportPart Kind=\"Upt\" Handle=\"{}\" DescriptorVersion=\"{}\"/>",
                escape_attr(d.handle.as_str()),
                d.version
            )),
            ReportAction::DescriptionDeleted(handle) => buf.push_str(&format!(
                "<{pm}:ReportPart Kind=\"Del\" Handle=\"{}\"/>",
                escape_attr(handle.as_str())
            )),
            _ => unreachable!("description slice only ever holds description actions"),
        }
    }
    buf.push_str(&format!("</{pm}:DescriptionReportPart>"));
}

fn write_state_part(buf: &mut String, tag: &str, actions: &[&ReportAction], runtime: &mut Runtime) {
    if actions.is_empty() {
        return;
    }
    let pm = runtime.qnames.prefix_for(ns::PM).to_string();
    buf.push_str(&format!("<{pm}:{tag}>"));
    for action in actions {
        let state = match action {
            ReportAction::MetricStateChanged(s)
            | ReportAction::AlertStateChanged(s)
            | ReportAction::ComponentStateChanged(s)
            | ReportAction::ContextStateChanged(s)
            | ReportAction::OperationalStateChanged(s)
            | ReportAction::RealTimeSampleChanged(s) => s,
            _ => unreachable!("state slice only ever holds state-change actions"),
        };
        sdc_core::snapshot::write_state(buf, state, runtime);
    }
    buf.push_str(&format!("</{pm}:{tag}>"));
}

fn write_invocation_part(buf: &mut String, actions: &[&ReportAction], pm: &str) {
    if actions.is_empty() {
        return;
    }
    buf.push_str(&format!("<{pm}:OperationInvokedReportPart>"));
    for action in actions {
        let ReportAction::OperationInvokedChanged {
            transaction_id,
            operation_handle,
            state,
            error,
        } = action
        else {
            unreachable!("operation-invoked slice only ever holds OperationInvokedChanged actions");
        };
        buf.push_str(&format!(
            "<{pm}:InvocationInfo TransactionId=\"{transaction_id}\" OperationHandleRef=\"{}\" InvocationState=\"{}\"",
            escape_attr(operation_handle.as_str()),
            invocation_state_name(*state),
        ));
        match error {
            Some(detail) => buf.push_str(&format!(">{}</{pm}:InvocationInfo>", sdc_xml::writer::escape_text(detail))),
            None => buf.push_str("/>"),
        }
    }
    buf.push_str(&format!("</{pm}:OperationInvokedReportPart>"));
}

fn write_system_error_part(buf: &mut String, actions: &[&ReportAction], pm: &str) {
    if actions.is_empty() {
        return;
    }
    buf.push_str(&format!("<{pm}:SystemErrorReportPart>"));
    for action in actions {
        let ReportAction::SystemErrorReport {
            source,
            error_code,
            error_info,
        } = action
        else {
            unreachable!("system-error slice only ever holds SystemErrorReport actions");
        };
        buf.push_str(&format!(
            "<{pm}:ReportPart SourceHandleRef=\"{}\" ErrorCode=\"{}\"",
            escape_attr(source.as_str()),
            escape_attr(error_code),
        ));
        match error_info {
            Some(detail) => buf.push_str(&format!(">{}</{pm}:ReportPart>", sdc_xml::writer::escape_text(detail))),
            None => buf.push_str("/>"),
        }
    }
    buf.push_str(&format!("</{pm}:SystemErrorReportPart>"));
}

fn invocation_state_name(state: sdc_core::InvocationState) -> &'static str {
    use sdc_core::InvocationState as I;
    match state {
        I::Wait => "Wait",
        I::Start => "Start",
        I::Finished => "Fin",
        I::FinishedWithModification => "FinMod",
        I::Cancelled => "Cancelled",
        I::Failed => "Fail",
    }
}

/// Drives delivery for one subscription until it's terminated or its
/// channel disconnects. Intended to be `tokio::spawn`ed once per
/// subscription, right after `SubscriptionManager::subscribe` succeeds.
pub async fn run_delivery(id: Arc<str>, manager: Arc<SubscriptionManager>, client_pool: Arc<HttpClientPool>, request_timeout: Duration) {
    let mut consecutive_failures = 0u32;
    loop {
        let Some(endpoint) = manager.endpoint(&id) else {
            return;
        };
        let Some(receiver) = manager.receiver(&id) else {
            return;
        };

        let delivery = match receiver.try_recv() {
            Ok(d) => d,
            Err(crossbeam_channel::TryRecvError::Empty) => {
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }
            Err(crossbeam_channel::TryRecvError::Disconnected) => return,
        };

        let action = match delivery.origin {
            ReportOrigin::Episodic => EPISODIC_REPORT_ACTION,
            ReportOrigin::Periodic => PERIODIC_REPORT_ACTION,
        };
        let mut runtime = Runtime::new();
        let body = encode_delivery_body(&delivery, &mut runtime);
        let addressing = Addressing::request(action, sdc_soap::correlation::new_message_id());
        let xml = Envelope::new(addressing, body).encode(&mut runtime);

        let request = SoapRequest {
            url: endpoint,
            soap_action: action.to_string(),
            body_xml: xml,
        };
        let deadline = Deadline::after(request_timeout);

        match client_pool.send(request, deadline).await {
            Ok(resp) if resp.status < 300 => {
                consecutive_failures = 0;
            }
            _ => {
                consecutive_failures += 1;
                log::warn!("delivery to subscription {id} failed ({consecutive_failures} consecutive)");
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    manager.terminate(&id, TerminationReason::DeliveryFailure);
                    return;
                }
            }
        }
    }
}

/// Best-effort `wse:SubscriptionEnd` notification, sent once when a
/// subscription is torn down (by expiry, delivery failure, or provider
/// shutdown). Never retried: if this fails the subscriber learns the
/// subscription is gone the next time it calls `GetStatus` and gets
/// `UnknownSubscription` instead.
pub async fn send_subscription_end(
    endpoint: &str,
    reason: TerminationReason,
    client_pool: &HttpClientPool,
    request_timeout: Duration,
) {
    let mut runtime = Runtime::new();
    let fault = SoapFault::new(sdc_soap::FaultCode::Receiver, format!("subscription ended: {reason:?}"));
    let addressing = Addressing::request(
        "http://schemas.xmlsoap.org/ws/2004/08/eventing/SubscriptionEnd",
        sdc_soap::correlation::new_message_id(),
    );
    let mut body = String::new();
    body.push_str(&format!("<wse:SubscriptionEnd><wse:Status>{reason:?}</wse:Status>"));
    let _ = &fault; // reason is carried in the body; fault kept for symmetry with error-path encoding elsewhere
    body.push_str("</wse:SubscriptionEnd>");
    let xml = Envelope::new(addressing, body).encode(&mut runtime);

    let request = SoapRequest {
        url: endpoint.to_string(),
        soap_action: "http://schemas.xmlsoap.org/ws/2004/08/eventing/SubscriptionEnd".to_string(),
        body_xml: xml,
    };
    if let Err(err) = client_pool.send(request, Deadline::after(request_timeout)).await {
        log::debug!("best-effort SubscriptionEnd to {endpoint} failed: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdc_core::{Handle, ReportAction, State, StateValue};

    #[test]
    fn encode_delivery_body_groups_metric_and_invocation_parts() {
        let state = Arc::new(State::new(Handle::from("nm0"), StateValue::metric_initial(37.0)));
        let delivery = Delivery {
            mdib_version: 3,
            sequence_id: Arc::from("urn:uuid:seq-1"),
            actions: vec![
                ReportAction::MetricStateChanged(state),
                ReportAction::OperationInvokedChanged {
                    transaction_id: 7,
                    operation_handle: Handle::from("op_set_nm0"),
                    state: sdc_core::InvocationState::Finished,
                    error: None,
                },
            ],
            origin: ReportOrigin::Episodic,
        };
        let mut rt = Runtime::new();
        let xml = encode_delivery_body(&delivery, &mut rt);
        assert!(xml.contains("MdibVersion=\"3\""));
        assert!(xml.contains("EpisodicReport"));
        assert!(xml.contains("MetricReportPart"));
        assert!(xml.contains("OperationInvokedReportPart"));
        assert!(xml.contains("TransactionId=\"7\""));
        assert!(xml.contains("InvocationState=\"Fin\""));
    }

    #[test]
    fn encode_delivery_body_omits_empty_categories() {
        let state = Arc::new(State::new(Handle::from("nm0"), StateValue::metric_initial(37.0)));
        let delivery = Delivery {
            mdib_version: 1,
            sequence_id: Arc::from("urn:uuid:seq-1"),
            actions: vec![ReportAction::MetricStateChanged(state)],
            origin: ReportOrigin::Episodic,
        };
        let mut rt = Runtime::new();
        let xml = encode_delivery_body(&delivery, &mut rt);
        assert!(!xml.contains("AlertReportPart"));
        assert!(!xml.contains("OperationInvokedReportPart"));
    }

    #[test]
    fn encode_delivery_body_uses_periodic_report_element_for_periodic_origin() {
        let state = Arc::new(State::new(Handle::from("nm0"), StateValue::metric_initial(37.0)));
        let delivery = Delivery {
            mdib_version: 5,
            sequence_id: Arc::from("urn:uuid:seq-1"),
            actions: vec![ReportAction::MetricStateChanged(state)],
            origin: ReportOrigin::Periodic,
        };
        let mut rt = Runtime::new();
        let xml = encode_delivery_body(&delivery, &mut rt);
        assert!(xml.contains("PeriodicReport"));
        assert!(!xml.contains("EpisodicReport"));
    }

    #[test]
    fn encode_delivery_body_renders_system_error_part() {
        let delivery = Delivery {
            mdib_version: 2,
            sequence_id: Arc::from("urn:uuid:seq-1"),
            actions: vec![ReportAction::SystemErrorReport {
                source: Handle::from("mds0"),
                error_code: "SensorLost".into(),
                error_info: Some("channel 2 disconnected".into()),
            }],
            origin: ReportOrigin::Episodic,
        };
        let mut rt = Runtime::new();
        let xml = encode_delivery_body(&delivery, &mut rt);
        assert!(xml.contains("SystemErrorReportPart"));
        assert!(xml.contains("ErrorCode=\"SensorLost\""));
        assert!(xml.contains("channel 2 disconnected"));
    }
}
