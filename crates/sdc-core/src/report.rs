// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transaction-to-report decomposition.
//!
//! A committed transaction produces one [`TransactionReport`] describing
//! exactly what changed. `sdc-provider` turns that into one or more
//! BICEPS report messages per subscribed action filter; this crate only
//! owns the MDIB-version-stamped, ordered list of changes.

use std::sync::Arc;

use crate::descriptor::Descriptor;
use crate::handle::Handle;
use crate::state::State;

/// The closed set of report actions a committed transaction can produce.
/// Named after the BICEPS report message each action ultimately feeds
///; `sdc-provider` groups same-variant actions from one
/// transaction into a single outbound message.
#[derive(Debug, Clone)]
pub enum ReportAction {
    DescriptionCreated(Arc<Descriptor>),
    DescriptionUpdated(Arc<Descriptor>),
    DescriptionDeleted(Handle),
    MetricStateChanged(Arc<State>),
    AlertStateChanged(Arc<State>),
    ComponentStateChanged(Arc<State>),
    ContextStateChanged(Arc<State>),
    OperationalStateChanged(Arc<State>),
    RealTimeSampleChanged(Arc<State>),
    /// Emitted by `sdc-provider` when an invoked `Set*`/`Activate`
    /// operation transitions (Wait / Start / Finished / Cancelled) —
    /// staged here as a variant so `ReportAction` stays the single closed
    /// enum report consumers match on, even though nothing in this crate
    /// constructs it directly.
    OperationInvokedChanged {
        transaction_id: u64,
        operation_handle: Handle,
        state: InvocationState,
        error: Option<String>,
    },
    /// A provider-initiated fault notification not tied to any transaction
    /// commit — a hardware fault, a lost sensor link, anything the device
    /// needs to surface outside the MDIB version sequence. `source` names
    /// the descriptor the fault is reported against.
    SystemErrorReport {
        source: Handle,
        error_code: String,
        error_info: Option<String>,
    },
}

/// The closed lifecycle of one invoked `Set*`/`Activate` operation:
/// `Wait -> Start -> Finished | FinishedWithModification | Cancelled
/// | Failed`. Lives here, not in `sdc-provider`, because it's the payload
/// of a [`ReportAction`] and this crate owns the closed report-action enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Wait,
    Start,
    Finished,
    FinishedWithModification,
    Cancelled,
    Failed,
}

/// Everything one committed transaction produced, in commit order. The
/// MDIB version is the same for every action in the list — a single
/// transaction is one version bump, never more, never less.
#[derive(Debug, Clone)]
pub struct TransactionReport {
    pub mdib_version: u64,
    pub sequence_id: Arc<str>,
    pub actions: Vec<ReportAction>,
}

impl TransactionReport {
    /// Splits the report into the per-report-type slices a subscription
    /// dispatcher needs, preserving the original ordering within each
    /// slice. An action type absent from this transaction yields an empty
    /// slice, not an omitted one — callers can always match exhaustively.
    pub fn decompose(&self) -> ReportSlices<'_> {
        let mut slices = ReportSlices::default();
        for action in &self.actions {
            match action {
                ReportAction::DescriptionCreated(_)
                | ReportAction::DescriptionUpdated(_)
                | ReportAction::DescriptionDeleted(_) => slices.description.push(action),
                ReportAction::MetricStateChanged(_) => slices.metric.push(action),
                ReportAction::AlertStateChanged(_) => slices.alert.push(action),
                ReportAction::ComponentStateChanged(_) => slices.component.push(action),
                ReportAction::ContextStateChanged(_) => slices.context.push(action),
                ReportAction::OperationalStateChanged(_) => slices.operational.push(action),
                ReportAction::RealTimeSampleChanged(_) => slices.real_time_sample.push(action),
                ReportAction::OperationInvokedChanged { .. } => slices.operation_invoked.push(action),
                ReportAction::SystemErrorReport { .. } => slices.system_error.push(action),
            }
        }
        slices
    }
}

#[derive(Debug, Default)]
pub struct ReportSlices<'a> {
    pub description: Vec<&'a ReportAction>,
    pub metric: Vec<&'a ReportAction>,
    pub alert: Vec<&'a ReportAction>,
    pub component: Vec<&'a ReportAction>,
    pub context: Vec<&'a ReportAction>,
    pub operational: Vec<&'a ReportAction>,
    pub real_time_sample: Vec<&'a ReportAction>,
    pub operation_invoked: Vec<&'a ReportAction>,
    pub system_error: Vec<&'a ReportAction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateValue;

    #[test]
    fn decompose_groups_by_report_type_preserving_order() {
        let s1 = Arc::new(State::new(Handle::from("m1"), StateValue::metric_initial(1.0)));
        let s2 = Arc::new(State::new(Handle::from("m2"), StateValue::metric_initial(2.0)));
        let report = TransactionReport {
            mdib_version: 3,
            sequence_id: Arc::from("urn:uuid:seq"),
            actions: vec![
                ReportAction::MetricStateChanged(s1.clone()),
                ReportAction::MetricStateChanged(s2.clone()),
            ],
        };
        let slices = report.decompose();
        assert_eq!(slices.metric.len(), 2);
        assert!(slices.alert.is_empty());
    }
}
