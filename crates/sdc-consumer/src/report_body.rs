// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decodes the `msg:EpisodicReport` body `sdc_provider::delivery` produces
//! into the pieces a [`crate::mirror::Mirror`] applies.
//!
//! Mirrors `sdc_core::snapshot::parse_mdib_body` in shape — same
//! `roxmltree`-node-walking style, same reliance on
//! `sdc_core::snapshot::parse_state_element` for the per-state work — but
//! over a report body instead of a full `GetMdibResponse`.

use std::sync::Arc;

use sdc_core::{Handle, InvocationState, State};
use sdc_xml::reader::with_root;
use sdc_xml::{DecodeError, DecodeErrorKind, DecodeResult};

/// One entry from a `DescriptionReportPart`. Carries only handle, kind and
/// (for Crt/Upt) the new descriptor version — `sdc-provider`'s delivery
/// encoding does not inline the full descriptor body, so a mirror cannot
/// apply a structural change incrementally; it can only detect that one
/// happened and must re-fetch (see [`crate::mirror::Mirror::apply_report`]).
#[derive(Debug, Clone)]
pub struct DescriptionChange {
    pub kind: DescriptionChangeKind,
    pub handle: Handle,
    pub descriptor_version: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionChangeKind {
    Created,
    Updated,
    Deleted,
}

/// One `OperationInvokedReportPart` entry: a transition of a previously
/// invoked `Set*`/`Activate` operation.
#[derive(Debug, Clone)]
pub struct InvocationUpdate {
    pub transaction_id: u64,
    pub operation_handle: Handle,
    pub state: InvocationState,
    pub detail: Option<String>,
}

/// A fully decoded report body, ready for [`crate::mirror::Mirror::apply_report`].
#[derive(Debug, Clone)]
pub struct ReportBody {
    pub mdib_version: u64,
    pub sequence_id: Arc<str>,
    pub description_changes: Vec<DescriptionChange>,
    pub states: Vec<Arc<State>>,
    pub invocations: Vec<InvocationUpdate>,
}

const STATE_PART_TAGS: &[&str] = &[
    "MetricReportPart",
    "AlertReportPart",
    "ComponentReportPart",
    "ContextReportPart",
    "OperationalStateReportPart",
    "RealTimeSampleArrayMetricReportPart",
];

pub fn parse_report_body(xml: &str) -> DecodeResult<ReportBody> {
    with_root(xml, |root| {
        let mdib_version = root
            .attribute("MdibVersion")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| DecodeError::missing("/EpisodicReport/@MdibVersion"))?;
        let sequence_id = root
            .attribute("SequenceId")
            .ok_or_else(|| DecodeError::missing("/EpisodicReport/@SequenceId"))?
            .to_string();

        let mut description_changes = Vec::new();
        if let Some(part) = find_child(root, "DescriptionReportPart") {
            for node in part.children().filter(roxmltree::Node::is_element) {
                let handle = node
                    .attribute("Handle")
                    .ok_or_else(|| DecodeError::missing("/DescriptionReportPart/ReportPart/@Handle"))?;
                let kind = match node.attribute("Kind") {
                    Some("Crt") => DescriptionChangeKind::Created,
                    Some("Upt") => DescriptionChangeKind::Updated,
                    Some("Del") => DescriptionChangeKind::Deleted,
                    _ => {
                        return Err(DecodeError::new(
                            DecodeErrorKind::SchemaViolation,
                            "/DescriptionReportPart/ReportPart/@Kind",
                            "unrecognized description change kind",
                        ))
                    }
                };
                description_changes.push(DescriptionChange {
                    kind,
                    handle: Handle::from(handle),
                    descriptor_version: node.attribute("DescriptorVersion").and_then(|v| v.parse().ok()),
                });
            }
        }

        let mut states = Vec::new();
        for tag in STATE_PART_TAGS {
            let Some(part) = find_child(root, tag) else {
                continue;
            };
            for node in part.children().filter(roxmltree::Node::is_element) {
                states.push(Arc::new(sdc_core::snapshot::parse_state_element(node)?));
            }
        }

        let mut invocations = Vec::new();
        if let Some(part) = find_child(root, "OperationInvokedReportPart") {
            for node in part.children().filter(roxmltree::Node::is_element) {
                let transaction_id = node
                    .attribute("TransactionId")
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| DecodeError::missing("/OperationInvokedReportPart/InvocationInfo/@TransactionId"))?;
                let operation_handle = node
                    .attribute("OperationHandleRef")
                    .ok_or_else(|| DecodeError::missing("/OperationInvokedReportPart/InvocationInfo/@OperationHandleRef"))?;
                let state = node
                    .attribute("InvocationState")
                    .and_then(invocation_state_from_name)
                    .ok_or_else(|| DecodeError::missing("/OperationInvokedReportPart/InvocationInfo/@InvocationState"))?;
                invocations.push(InvocationUpdate {
                    transaction_id,
                    operation_handle: Handle::from(operation_handle),
                    state,
                    detail: node.text().map(str::to_string),
                });
            }
        }

        Ok(ReportBody {
            mdib_version,
            sequence_id: Arc::from(sequence_id),
            description_changes,
            states,
            invocations,
        })
    })
}

fn find_child<'a>(node: roxmltree::Node<'a, 'a>, local: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|c| c.is_element() && c.tag_name().name() == local)
}

fn invocation_state_from_name(s: &str) -> Option<InvocationState> {
    Some(match s {
        "Wait" => InvocationState::Wait,
        "Start" => InvocationState::Start,
        "Fin" => InvocationState::Finished,
        "FinMod" => InvocationState::FinishedWithModification,
        "Cancelled" => InvocationState::Cancelled,
        "Fail" => InvocationState::Failed,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metric_and_invocation_parts() {
        let xml = r#"<msg:EpisodicReport
            xmlns:msg="http://standards.ieee.org/downloads/11073/11073-10207-2017/message"
            xmlns:pm="http://standards.ieee.org/downloads/11073/11073-10207-2017/participant"
            MdibVersion="4" SequenceId="urn:uuid:seq-1">
            <pm:MetricReportPart>
                <pm:MetricState DescriptorHandle="nm0" StateVersion="2" ActivationState="On">
                    <pm:MetricValue Value="37.1" Validity="Vld"/>
                </pm:MetricState>
            </pm:MetricReportPart>
            <pm:OperationInvokedReportPart>
                <pm:InvocationInfo TransactionId="7" OperationHandleRef="op_set_nm0" InvocationState="Fin"/>
            </pm:OperationInvokedReportPart>
        </msg:EpisodicReport>"#;

        let report = parse_report_body(xml).unwrap();
        assert_eq!(report.mdib_version, 4);
        assert_eq!(&*report.sequence_id, "urn:uuid:seq-1");
        assert_eq!(report.states.len(), 1);
        assert_eq!(report.invocations.len(), 1);
        assert_eq!(report.invocations[0].transaction_id, 7);
        assert_eq!(report.invocations[0].state, InvocationState::Finished);
    }

    #[test]
    fn parses_description_report_part_as_handle_only_changes() {
        let xml = r#"<msg:EpisodicReport
            xmlns:msg="http://standards.ieee.org/downloads/11073/11073-10207-2017/message"
            xmlns:pm="http://standards.ieee.org/downloads/11073/11073-10207-2017/participant"
            MdibVersion="2" SequenceId="urn:uuid:seq-1">
            <pm:DescriptionReportPart>
                <pm:ReportPart Kind="Del" Handle="nm0"/>
            </pm:DescriptionReportPart>
        </msg:EpisodicReport>"#;

        let report = parse_report_body(xml).unwrap();
        assert_eq!(report.description_changes.len(), 1);
        assert_eq!(report.description_changes[0].kind, DescriptionChangeKind::Deleted);
    }
}
