// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service dispatch: binds the closed set of SOAP actions this
//! provider answers to MDIB read operations and transactional mutations.
//!
//! Reads (`GetMdib`/`GetMdDescription`/`GetMdState`/`GetContextStates`)
//! answer directly from the current [`Snapshot`]. Parameter-bearing
//! operations (`SetValue`/`SetString`/`Activate`/`SetContextState`/
//! `SetAlertState`/`SetMetricState`/`SetComponentState`) return a
//! transaction id immediately and complete asynchronously, emitting an
//! `OperationInvokedReport` transition (`Wait -> Start -> Finished |
//! FinishedWithModification | Cancelled | Failed`) at each step — never
//! applied to the store directly, always staged through a [`Writer`]
//! transaction so the single-writer discipline and invariant checks in
//! `sdc-core` still gate the mutation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sdc_core::descriptor::{DescriptorKind, OperationKind};
use sdc_core::state::{ActivationState, ContextAssociation, MeasurementValidity, State, StateValue};
use sdc_core::{Handle, InstanceHandle, InvocationState, MdibRoot, ReportAction, TransactionError, TransactionKind, TransactionReport, Writer};

use crate::error::{DispatchError, DispatchResult};
use crate::subscription::{ReportOrigin, SubscriptionManager};

/// The closed set of SOAP actions this dispatcher answers. An
/// action outside this set never reaches a handler — the HTTP layer maps an
/// unrecognized `wsa:Action` straight to [`SoapAction::from_uri`] returning
/// `None`, which becomes `ActionNotSupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapAction {
    GetMdib,
    GetMdDescription,
    GetMdState,
    GetContextStates,
    SetValue,
    SetString,
    Activate,
    SetContextState,
    SetAlertState,
    SetMetricState,
    SetComponentState,
}

impl SoapAction {
    /// Maps a `wsa:Action` URI's final path segment onto the closed action
    /// set, the same terminal-segment convention `DiscoveryAction::from_uri`
    /// uses for WS-Discovery actions.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let local = uri.rsplit('/').next()?;
        Some(match local {
            "GetMdib" => Self::GetMdib,
            "GetMdDescription" => Self::GetMdDescription,
            "GetMdState" => Self::GetMdState,
            "GetContextStates" => Self::GetContextStates,
            "SetValue" => Self::SetValue,
            "SetString" => Self::SetString,
            "Activate" => Self::Activate,
            "SetContextState" => Self::SetContextState,
            "SetAlertState" => Self::SetAlertState,
            "SetMetricState" => Self::SetMetricState,
            "SetComponentState" => Self::SetComponentState,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetMdib => "GetMdib",
            Self::GetMdDescription => "GetMdDescription",
            Self::GetMdState => "GetMdState",
            Self::GetContextStates => "GetContextStates",
            Self::SetValue => "SetValue",
            Self::SetString => "SetString",
            Self::Activate => "Activate",
            Self::SetContextState => "SetContextState",
            Self::SetAlertState => "SetAlertState",
            Self::SetMetricState => "SetMetricState",
            Self::SetComponentState => "SetComponentState",
        }
    }
}

/// Parameters of a `SetValue` invocation: a numeric metric's target value.
#[derive(Debug, Clone)]
pub struct SetValueRequest {
    pub operation_handle: Handle,
    pub target_handle: Handle,
    pub requested_value: f64,
}

/// Parameters of a `SetString` invocation.
#[derive(Debug, Clone)]
pub struct SetStringRequest {
    pub operation_handle: Handle,
    pub target_handle: Handle,
    pub requested_string: String,
}

/// Parameters of an `Activate` invocation; `arguments` are passed through
/// opaque, since their shape is operation-specific.
#[derive(Debug, Clone)]
pub struct ActivateRequest {
    pub operation_handle: Handle,
    pub target_handle: Handle,
    pub arguments: Vec<String>,
}

/// Parameters of a `SetContextState` invocation.
#[derive(Debug, Clone)]
pub struct SetContextStateRequest {
    pub operation_handle: Handle,
    pub target_handle: Handle,
    pub instance: Option<InstanceHandle>,
    pub association: ContextAssociation,
    pub identifications: Vec<(String, String)>,
}

/// Parameters of a `SetAlertState` invocation.
#[derive(Debug, Clone)]
pub struct SetAlertStateRequest {
    pub operation_handle: Handle,
    pub target_handle: Handle,
    pub presence: bool,
    pub acknowledged: bool,
    pub activation: ActivationState,
}

/// Parameters of a `SetMetricState` invocation.
#[derive(Debug, Clone)]
pub struct SetMetricStateRequest {
    pub operation_handle: Handle,
    pub target_handle: Handle,
    pub measured_value: Option<f64>,
    pub string_value: Option<String>,
    pub validity: MeasurementValidity,
}

/// Parameters of a `SetComponentState` invocation.
#[derive(Debug, Clone)]
pub struct SetComponentStateRequest {
    pub operation_handle: Handle,
    pub target_handle: Handle,
    pub activation: ActivationState,
}

/// Binds SOAP actions onto `sdc-core`'s transaction discipline and the
/// reporting pipeline's subscription fan-out. One instance per provider.
pub struct ServiceDispatch {
    root: Arc<MdibRoot>,
    writer: Arc<Writer>,
    subscriptions: Arc<SubscriptionManager>,
    periodic: Option<Arc<crate::periodic::PeriodicCoalescer>>,
    next_transaction_id: AtomicU64,
}

impl ServiceDispatch {
    pub fn new(root: Arc<MdibRoot>, writer: Arc<Writer>, subscriptions: Arc<SubscriptionManager>) -> Self {
        Self {
            root,
            writer,
            subscriptions,
            periodic: None,
            next_transaction_id: AtomicU64::new(1),
        }
    }

    /// Feeds every committed transaction's report into `periodic` as well
    /// as fanning it out episodically, so periodic-only subscribers see
    /// coalesced updates on the next tick.
    pub fn with_periodic(mut self, periodic: Arc<crate::periodic::PeriodicCoalescer>) -> Self {
        self.periodic = Some(periodic);
        self
    }

    fn record_report(&self, report: &TransactionReport) {
        self.subscriptions.dispatch(report, ReportOrigin::Episodic);
        if let Some(periodic) = &self.periodic {
            periodic.record(report);
        }
    }

    /// Reports a fault not tied to any transaction commit — e.g. a hardware
    /// fault or a lost sensor link — immediately to every `SystemError`
    /// subscriber, stamped with the MDIB version current as of the call.
    /// Never folded into periodic coalescing, since a system error is
    /// exactly the kind of event a periodic subscriber still needs to see
    /// the moment it happens.
    pub fn report_system_error(&self, source: Handle, error_code: impl Into<String>, error_info: Option<String>) {
        let snapshot = self.root.read();
        let report = TransactionReport {
            mdib_version: snapshot.mdib_version,
            sequence_id: snapshot.sequence_id.clone(),
            actions: vec![ReportAction::SystemErrorReport {
                source,
                error_code: error_code.into(),
                error_info,
            }],
        };
        self.subscriptions.dispatch(&report, ReportOrigin::Episodic);
    }

    fn allocate_transaction_id(&self) -> u64 {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed)
    }

    /// `msg:GetMdib` — the full current snapshot, rendered as the canonical
    /// response body.
    pub fn get_mdib(&self, runtime: &mut sdc_xml::Runtime) -> String {
        let snapshot = self.root.read();
        sdc_core::snapshot::export_snapshot(&snapshot, runtime)
    }

    /// `msg:GetMdDescription`. `handles` restricts the response to the
    /// named descriptors and their descendants; an empty list means "all".
    pub fn get_md_description(&self, handles: &[Handle]) -> Vec<Arc<sdc_core::descriptor::Descriptor>> {
        let snapshot = self.root.read();
        if handles.is_empty() {
            return snapshot.descriptors().cloned().collect();
        }
        handles
            .iter()
            .flat_map(|h| descendants_including_self(&snapshot, h))
            .collect()
    }

    /// `msg:GetMdState`. `handles` restricts the response to states owned by
    /// the named descriptors; an empty list means "all".
    pub fn get_md_state(&self, handles: &[Handle]) -> Vec<Arc<State>> {
        let snapshot = self.root.read();
        if handles.is_empty() {
            return snapshot.states().cloned().collect();
        }
        handles
            .iter()
            .flat_map(|h| snapshot.states_for(h).into_iter().cloned())
            .collect()
    }

    /// `msg:GetContextStates`. `handles` restricts to states of the named
    /// context descriptors; empty means every context state in the MDIB.
    pub fn get_context_states(&self, handles: &[Handle]) -> Vec<Arc<State>> {
        self.get_md_state(handles)
            .into_iter()
            .filter(|s| matches!(s.value, StateValue::Context { .. }))
            .collect()
    }

    /// Commits a device-driven mutation — a sensor reading, an alarm
    /// trigger, anything not initiated by an operator `Set*`/`Activate`
    /// call — through the same single-writer transaction path used by
    /// dispatch, and fans its report out to subscribers immediately. Every
    /// committed transaction reports episodically regardless of its
    /// source; only operator invocations additionally get the
    /// `OperationInvokedReport` lifecycle wrapped around them.
    pub fn device_update(
        &self,
        kind: TransactionKind,
        apply: impl FnOnce(&mut sdc_core::Transaction<'_>) -> DispatchResult<()>,
    ) -> DispatchResult<TransactionReport> {
        let mut tx = self.writer.begin(&self.root, kind);
        apply(&mut tx)?;
        let (_, report) = tx.commit()?;
        self.record_report(&report);
        Ok(report)
    }

    fn validate_operation(&self, operation_handle: &Handle, expected: OperationKind) -> DispatchResult<()> {
        let snapshot = self.root.read();
        let descriptor = snapshot
            .descriptor(operation_handle)
            .ok_or_else(|| DispatchError::from(TransactionError::unknown_handle(operation_handle.clone())))?;
        match descriptor.kind {
            DescriptorKind::Operation(k) if k == expected => Ok(()),
            _ => Err(DispatchError::from(TransactionError::type_mismatch(
                operation_handle.clone(),
                format!("handle does not name a {expected:?} operation"),
            ))),
        }
    }

    fn emit_invocation(&self, transaction_id: u64, operation_handle: Handle, state: InvocationState, error: Option<String>) {
        let snapshot = self.root.read();
        let report = TransactionReport {
            mdib_version: snapshot.mdib_version,
            sequence_id: snapshot.sequence_id.clone(),
            actions: vec![ReportAction::OperationInvokedChanged {
                transaction_id,
                operation_handle,
                state,
                error,
            }],
        };
        self.subscriptions.dispatch(&report, ReportOrigin::Episodic);
    }

    /// Runs one `Set*`/`Activate` invocation to completion synchronously —
    /// `Wait` and `Start` are emitted before `apply` runs; a successful
    /// commit's [`TransactionReport`] is fanned out to subscribers exactly
    /// like any other commit before `Finished` is emitted, and a failure
    /// emits `Failed` with no MDIB change at all. The caller (an async SOAP
    /// handler) is expected to `tokio::spawn` this so the initial SOAP
    /// response can return the transaction id without waiting for the
    /// commit.
    fn run_invocation(
        &self,
        operation_handle: Handle,
        apply: impl FnOnce(&Writer, &MdibRoot) -> DispatchResult<TransactionReport>,
    ) -> u64 {
        let transaction_id = self.allocate_transaction_id();
        self.emit_invocation(transaction_id, operation_handle.clone(), InvocationState::Wait, None);
        self.emit_invocation(transaction_id, operation_handle.clone(), InvocationState::Start, None);
        match apply(&self.writer, &self.root) {
            Ok(report) => {
                self.record_report(&report);
                self.emit_invocation(transaction_id, operation_handle, InvocationState::Finished, None);
            }
            Err(err) => {
                self.emit_invocation(transaction_id, operation_handle, InvocationState::Failed, Some(err.to_string()));
            }
        }
        transaction_id
    }

    pub fn set_value(&self, req: SetValueRequest) -> DispatchResult<u64> {
        self.validate_operation(&req.operation_handle, OperationKind::Set)?;
        Ok(self.run_invocation(req.operation_handle, move |writer, root| {
            let mut tx = writer.begin(root, TransactionKind::MetricStates);
            let existing = tx
                .base()
                .states_for(&req.target_handle)
                .into_iter()
                .find(|s| matches!(s.value, StateValue::Metric { .. }))
                .cloned();
            let next = match existing {
                Some(prev) => prev.bumped(StateValue::Metric {
                    measured_value: Some(req.requested_value),
                    string_value: None,
                    validity: MeasurementValidity::Valid,
                    presentation_time_ms: None,
                    activation: ActivationState::On,
                }),
                None => State::new(req.target_handle.clone(), StateValue::metric_initial(req.requested_value)),
            };
            tx.update_state(next)?;
            let (_, report) = tx.commit()?;
            Ok(report)
        }))
    }

    pub fn set_string(&self, req: SetStringRequest) -> DispatchResult<u64> {
        self.validate_operation(&req.operation_handle, OperationKind::SetString)?;
        Ok(self.run_invocation(req.operation_handle, move |writer, root| {
            let mut tx = writer.begin(root, TransactionKind::MetricStates);
            let existing = tx
                .base()
                .states_for(&req.target_handle)
                .into_iter()
                .find(|s| matches!(s.value, StateValue::Metric { .. }))
                .cloned();
            let next = match existing {
                Some(prev) => prev.bumped(StateValue::Metric {
                    measured_value: None,
                    string_value: Some(req.requested_string.clone()),
                    validity: MeasurementValidity::Valid,
                    presentation_time_ms: None,
                    activation: ActivationState::On,
                }),
                None => State::new(
                    req.target_handle.clone(),
                    StateValue::Metric {
                        measured_value: None,
                        string_value: Some(req.requested_string.clone()),
                        validity: MeasurementValidity::Valid,
                        presentation_time_ms: None,
                        activation: ActivationState::On,
                    },
                ),
            };
            tx.update_state(next)?;
            let (_, report) = tx.commit()?;
            Ok(report)
        }))
    }

    /// `Activate` only toggles the target's operational/activation state —
    /// what an activation's arguments mean beyond that is device-specific
    /// and out of scope here.
    pub fn activate(&self, req: ActivateRequest) -> DispatchResult<u64> {
        self.validate_operation(&req.operation_handle, OperationKind::Activate)?;
        Ok(self.run_invocation(req.operation_handle, move |writer, root| {
            let mut tx = writer.begin(root, TransactionKind::OperationalStates);
            let existing = tx.base().states_for(&req.target_handle).into_iter().next().cloned();
            let next = match existing {
                Some(prev) => prev.bumped(StateValue::Operation { activation: ActivationState::On }),
                None => State::new(req.target_handle.clone(), StateValue::Operation { activation: ActivationState::On }),
            };
            tx.update_state(next)?;
            let (_, report) = tx.commit()?;
            Ok(report)
        }))
    }

    pub fn set_context_state(&self, req: SetContextStateRequest) -> DispatchResult<u64> {
        self.validate_operation(&req.operation_handle, OperationKind::SetContext)?;
        Ok(self.run_invocation(req.operation_handle, move |writer, root| {
            let mut tx = writer.begin(root, TransactionKind::ContextStates);
            let value = StateValue::Context {
                association: req.association,
                identifications: req.identifications.clone(),
            };
            let next = match &req.instance {
                Some(instance) => State::new_multi(req.target_handle.clone(), instance.clone(), value),
                None => State::new(req.target_handle.clone(), value),
            };
            tx.update_state(next)?;
            let (_, report) = tx.commit()?;
            Ok(report)
        }))
    }

    pub fn set_alert_state(&self, req: SetAlertStateRequest) -> DispatchResult<u64> {
        self.validate_operation(&req.operation_handle, OperationKind::SetAlert)?;
        Ok(self.run_invocation(req.operation_handle, move |writer, root| {
            let mut tx = writer.begin(root, TransactionKind::AlertStates);
            let existing = tx.base().states_for(&req.target_handle).into_iter().next().cloned();
            let value = StateValue::Alert {
                presence: req.presence,
                acknowledged: req.acknowledged,
                activation: req.activation,
            };
            let next = match existing {
                Some(prev) => prev.bumped(value),
                None => State::new(req.target_handle.clone(), value),
            };
            tx.update_state(next)?;
            let (_, report) = tx.commit()?;
            Ok(report)
        }))
    }

    pub fn set_metric_state(&self, req: SetMetricStateRequest) -> DispatchResult<u64> {
        self.validate_operation(&req.operation_handle, OperationKind::Set)?;
        Ok(self.run_invocation(req.operation_handle, move |writer, root| {
            let mut tx = writer.begin(root, TransactionKind::MetricStates);
            let existing = tx.base().states_for(&req.target_handle).into_iter().next().cloned();
            let value = StateValue::Metric {
                measured_value: req.measured_value,
                string_value: req.string_value.clone(),
                validity: req.validity,
                presentation_time_ms: None,
                activation: ActivationState::On,
            };
            let next = match existing {
                Some(prev) => prev.bumped(value),
                None => State::new(req.target_handle.clone(), value),
            };
            tx.update_state(next)?;
            let (_, report) = tx.commit()?;
            Ok(report)
        }))
    }

    pub fn set_component_state(&self, req: SetComponentStateRequest) -> DispatchResult<u64> {
        self.validate_operation(&req.operation_handle, OperationKind::SetComponent)?;
        Ok(self.run_invocation(req.operation_handle, move |writer, root| {
            let mut tx = writer.begin(root, TransactionKind::ComponentStates);
            let existing = tx.base().states_for(&req.target_handle).into_iter().next().cloned();
            let value = StateValue::Component { activation: req.activation };
            let next = match existing {
                Some(prev) => prev.bumped(value),
                None => State::new(req.target_handle.clone(), value),
            };
            tx.update_state(next)?;
            let (_, report) = tx.commit()?;
            Ok(report)
        }))
    }
}

fn descendants_including_self(snapshot: &sdc_core::Snapshot, handle: &Handle) -> Vec<Arc<sdc_core::descriptor::Descriptor>> {
    let mut out = Vec::new();
    let mut frontier = vec![handle.clone()];
    while let Some(h) = frontier.pop() {
        if let Some(d) = snapshot.descriptor(&h) {
            out.push(d.clone());
        }
        for child in snapshot.children(&h) {
            frontier.push(child.handle.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdc_core::descriptor::{Descriptor, MetricKind};
    use std::time::Duration;

    fn seeded_dispatch() -> (ServiceDispatch, Arc<MdibRoot>, Arc<SubscriptionManager>) {
        let root = Arc::new(MdibRoot::new("urn:uuid:seq-1"));
        let mds = Arc::new(Descriptor::root_mds(Handle::from("mds0")));
        let metric = Arc::new(Descriptor::child(
            Handle::from("nm0"),
            DescriptorKind::Metric(MetricKind::Numeric),
            Handle::from("mds0"),
        ));
        let set_op = Arc::new(Descriptor::child(
            Handle::from("op_set_nm0"),
            DescriptorKind::Operation(OperationKind::Set),
            Handle::from("mds0"),
        ));
        root.publish(
            1,
            vec![
                (Handle::from("mds0"), Some(mds)),
                (Handle::from("nm0"), Some(metric)),
                (Handle::from("op_set_nm0"), Some(set_op)),
            ],
            vec![],
        );
        let writer = Arc::new(Writer::new());
        let subscriptions = Arc::new(SubscriptionManager::new(Duration::from_secs(60), 16));
        let dispatch = ServiceDispatch::new(root.clone(), writer, subscriptions.clone());
        (dispatch, root, subscriptions)
    }

    #[test]
    fn set_value_commits_and_reports_finished() {
        let (dispatch, root, subscriptions) = seeded_dispatch();
        let (sub_id, _) = subscriptions
            .subscribe(
                "https://consumer/ep",
                vec![crate::subscription::ReportTopic::OperationInvoked, crate::subscription::ReportTopic::Metric],
                None,
                std::time::Instant::now(),
            )
            .unwrap();

        let tx_id = dispatch
            .set_value(SetValueRequest {
                operation_handle: Handle::from("op_set_nm0"),
                target_handle: Handle::from("nm0"),
                requested_value: 38.2,
            })
            .unwrap();
        assert_eq!(tx_id, 1);

        let snap = root.read();
        let state = snap
            .states_for(&Handle::from("nm0"))
            .into_iter()
            .next()
            .expect("metric state committed");
        assert!(matches!(state.value, StateValue::Metric { measured_value: Some(v), .. } if v == 38.2));

        let rx = subscriptions.receiver(&sub_id).unwrap();
        let mut saw_finished = false;
        while let Ok(delivery) = rx.try_recv() {
            for action in delivery.actions {
                if let ReportAction::OperationInvokedChanged { state, .. } = action {
                    if matches!(state, InvocationState::Finished) {
                        saw_finished = true;
                    }
                }
            }
        }
        assert!(saw_finished, "expected a Finished OperationInvokedChanged delivery");
    }

    #[test]
    fn set_value_against_unknown_operation_handle_is_rejected_before_any_commit() {
        let (dispatch, root, _subscriptions) = seeded_dispatch();
        let err = dispatch
            .set_value(SetValueRequest {
                operation_handle: Handle::from("ghost"),
                target_handle: Handle::from("nm0"),
                requested_value: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transaction(_)));
        assert_eq!(root.read().mdib_version, 1, "rejected invocation must not touch the MDIB");
    }

    #[test]
    fn set_value_against_wrong_operation_kind_is_rejected() {
        let (dispatch, _root, _subscriptions) = seeded_dispatch();
        let err = dispatch
            .set_string(SetStringRequest {
                operation_handle: Handle::from("op_set_nm0"),
                target_handle: Handle::from("nm0"),
                requested_string: "x".into(),
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transaction(_)));
    }

    #[test]
    fn device_update_commits_and_reports_without_an_operation_invoked_part() {
        let (dispatch, root, subscriptions) = seeded_dispatch();
        let (sub_id, _) = subscriptions
            .subscribe("https://consumer/ep", vec![crate::subscription::ReportTopic::Metric], None, std::time::Instant::now())
            .unwrap();

        let report = dispatch
            .device_update(TransactionKind::MetricStates, |tx| {
                let existing = tx
                    .base()
                    .states_for(&Handle::from("nm0"))
                    .into_iter()
                    .find(|s| matches!(s.value, StateValue::Metric { .. }))
                    .cloned();
                let next = match existing {
                    Some(prev) => prev.bumped(StateValue::metric_initial(21.5)),
                    None => State::new(Handle::from("nm0"), StateValue::metric_initial(21.5)),
                };
                tx.update_state(next)?;
                Ok(())
            })
            .unwrap();
        assert!(matches!(report.actions[0], ReportAction::MetricStateChanged(_)));
        assert_eq!(root.read().mdib_version, 2);

        let rx = subscriptions.receiver(&sub_id).unwrap();
        let delivery = rx.try_recv().expect("device update delivered");
        assert!(matches!(delivery.actions[0], ReportAction::MetricStateChanged(_)));
    }

    #[test]
    fn get_mdib_contains_current_version_and_descriptors() {
        let (dispatch, _root, _subscriptions) = seeded_dispatch();
        let mut rt = sdc_xml::Runtime::new();
        let xml = dispatch.get_mdib(&mut rt);
        assert!(xml.contains("MdibVersion=\"1\""));
        assert!(xml.contains("NumericMetric"));
    }

    #[test]
    fn get_md_description_filters_to_requested_handle_and_descendants() {
        let (dispatch, _root, _subscriptions) = seeded_dispatch();
        let filtered = dispatch.get_md_description(&[Handle::from("nm0")]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].handle, Handle::from("nm0"));
    }
}
