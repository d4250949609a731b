// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The consumer-side MDIB mirror: bootstraps from a `GetMdib` snapshot,
//! then keeps itself current by applying incoming reports transactionally.
//!
//! Unlike a provider's [`sdc_core::mdib::MdibRoot`], which is the sole
//! source of truth, a mirror's [`MdibRoot`] is a derived copy that can
//! fall behind or fall out of sync entirely — a missed report, a provider
//! restart — and must notice when that happens rather than silently
//! drifting. [`Mirror::apply_report`] is the one place that detects it:
//! a sequence id mismatch or a non-contiguous MDIB version means the
//! mirror stops trusting its own state and tells the caller to rebuild
//! from a fresh [`Mirror::bootstrap`].

use std::sync::Arc;
use std::time::Duration;

use sdc_core::mdib::MdibRoot;
use sdc_core::snapshot::{import_snapshot, parse_mdib_body};
use sdc_core::transaction::{TransactionKind, Writer};
use sdc_core::{DescriptorKind, MetricKind, State, VersionGap};
use sdc_transport::client::HttpClientPool;

use crate::bootstrap::get_mdib;
use crate::error::{ConsumerError, ConsumerResult};
use crate::report_body::{DescriptionChangeKind, InvocationUpdate, ReportBody};

/// What applying one report did to the mirror.
#[derive(Debug)]
pub enum MirrorOutcome {
    /// The report was purely an `OperationInvokedReportPart` — no MDIB
    /// version bump, per the rule that a failed `Set*`/`Activate` leaves
    /// the MDIB untouched. The mirror's store was not touched.
    InvocationOnly { invocations: Vec<InvocationUpdate> },
    /// The report applied cleanly; the mirror now reflects `mdib_version`.
    Applied {
        mdib_version: u64,
        invocations: Vec<InvocationUpdate>,
    },
    /// The report could not be applied incrementally (a structural
    /// create/update, or a version/sequence mismatch) and the caller must
    /// call [`Mirror::bootstrap`] again.
    NeedsRebuild,
}

/// Owns a mirrored [`MdibRoot`] plus the writer that serializes incoming
/// report application against it. One per subscribed provider endpoint.
pub struct Mirror {
    root: Arc<MdibRoot>,
    writer: Writer,
}

impl Mirror {
    /// Starts with an empty MDIB under a placeholder sequence id;
    /// [`Self::bootstrap`] must be called before the mirror reflects
    /// anything real.
    pub fn new() -> Self {
        Self {
            root: Arc::new(MdibRoot::new("urn:uuid:unbootstrapped")),
            writer: Writer::new(),
        }
    }

    pub fn root(&self) -> &Arc<MdibRoot> {
        &self.root
    }

    /// Fetches `GetMdib` from `endpoint` and replaces the mirror's entire
    /// contents with the decoded snapshot, preserving the provider's own
    /// sequence id and MDIB version so future incremental reports line up.
    pub async fn bootstrap(
        &self,
        client_pool: &HttpClientPool,
        endpoint: &str,
        request_timeout: Duration,
    ) -> ConsumerResult<()> {
        let document = get_mdib(client_pool, endpoint, request_timeout).await?;
        let (sequence_id, mdib_version, descriptors, states) = parse_mdib_body(&document.body_xml)?;
        import_snapshot(&self.root, sequence_id, mdib_version, descriptors, states);
        Ok(())
    }

    /// Applies a decoded report, bringing the mirror forward by exactly
    /// one MDIB version, or reports that a rebuild is needed.
    ///
    /// A report carrying only `OperationInvokedReportPart` entries never
    /// changes the MDIB version (a failed invocation has no state
    /// effect), so it's handled before any version/sequence check: there
    /// is nothing to validate the mirror's freshness against.
    pub fn apply_report(&self, report: ReportBody) -> ConsumerResult<MirrorOutcome> {
        if report.states.is_empty() && report.description_changes.is_empty() {
            return Ok(MirrorOutcome::InvocationOnly {
                invocations: report.invocations,
            });
        }

        let current = self.root.read();
        if report.sequence_id != current.sequence_id {
            return Ok(MirrorOutcome::NeedsRebuild);
        }
        if report.mdib_version != current.mdib_version + 1 {
            return Err(ConsumerError::VersionGap(VersionGap {
                expected: current.mdib_version + 1,
                observed: report.mdib_version,
                state: None,
            }));
        }

        // A description report part only carries handle/kind/version, not
        // a full descriptor body (see `report_body::DescriptionChange`'s
        // doc comment): created/updated descriptors can't be applied
        // incrementally. Deletions carry no body to reconstruct, so those
        // alone can still be replayed.
        if report
            .description_changes
            .iter()
            .any(|c| c.kind != DescriptionChangeKind::Deleted)
        {
            return Ok(MirrorOutcome::NeedsRebuild);
        }

        let kind = infer_transaction_kind(&current, &report)?;
        let mut tx = self.writer.begin(&self.root, kind);
        for change in &report.description_changes {
            tx.remove_descriptor(change.handle.clone())?;
        }
        for state in report.states {
            tx.update_state(Arc::try_unwrap(state).unwrap_or_else(|s| (*s).clone()))?;
        }
        let (snapshot, _tx_report) = tx.commit()?;

        Ok(MirrorOutcome::Applied {
            mdib_version: snapshot.mdib_version,
            invocations: report.invocations,
        })
    }
}

impl Default for Mirror {
    fn default() -> Self {
        Self::new()
    }
}

/// A report body doesn't record which BICEPS report-part tag a state came
/// from, only the flat state list — so the transaction kind is inferred
/// from the first state's owning descriptor. `RealTimeSample` metrics are
/// folded into `MetricStates` here rather than `RealTimeSamples`: the two
/// kinds apply the identical state shape and a mirror, unlike a provider,
/// never needs to enforce the single-kind-per-transaction rule against a
/// second, unrelated write in flight.
fn infer_transaction_kind(current: &sdc_core::Snapshot, report: &ReportBody) -> ConsumerResult<TransactionKind> {
    if !report.description_changes.is_empty() {
        return Ok(TransactionKind::DescriptorModification);
    }
    let first = report
        .states
        .first()
        .ok_or_else(|| ConsumerError::UnexpectedResponse("report has neither states nor description changes".into()))?;
    let descriptor = current
        .descriptor(&first.descriptor)
        .ok_or_else(|| ConsumerError::UnexpectedResponse(format!("report references unknown descriptor {}", first.descriptor)))?;
    Ok(match descriptor.kind {
        DescriptorKind::Metric(_) => TransactionKind::MetricStates,
        DescriptorKind::Alert(_) => TransactionKind::AlertStates,
        DescriptorKind::Mds
        | DescriptorKind::Vmd
        | DescriptorKind::Channel
        | DescriptorKind::Sco
        | DescriptorKind::Battery
        | DescriptorKind::Clock => TransactionKind::ComponentStates,
        DescriptorKind::Context(_) | DescriptorKind::SystemContext => TransactionKind::ContextStates,
        DescriptorKind::Operation(_) => TransactionKind::OperationalStates,
    })
}

#[allow(dead_code)]
fn is_real_time_sample(kind: DescriptorKind) -> bool {
    matches!(kind, DescriptorKind::Metric(MetricKind::RealTimeSample))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdc_core::{Descriptor, Handle, StateValue};

    fn seeded_mirror() -> Mirror {
        let mirror = Mirror::new();
        import_snapshot(
            &mirror.root,
            "urn:uuid:seq-1",
            3,
            vec![
                Arc::new(Descriptor::root_mds(Handle::from("mds0"))),
                Arc::new(Descriptor::child(
                    Handle::from("nm0"),
                    DescriptorKind::Metric(MetricKind::Numeric),
                    Handle::from("mds0"),
                )),
            ],
            vec![Arc::new(State::new(Handle::from("nm0"), StateValue::metric_initial(36.0)))],
        );
        mirror
    }

    fn metric_report(mdib_version: u64, sequence_id: &str, value: f64) -> ReportBody {
        ReportBody {
            mdib_version,
            sequence_id: Arc::from(sequence_id),
            description_changes: Vec::new(),
            states: vec![Arc::new(State::new(Handle::from("nm0"), StateValue::metric_initial(value)))],
            invocations: Vec::new(),
        }
    }

    #[test]
    fn applies_a_contiguous_metric_report() {
        let mirror = seeded_mirror();
        let outcome = mirror.apply_report(metric_report(4, "urn:uuid:seq-1", 37.2)).unwrap();
        match outcome {
            MirrorOutcome::Applied { mdib_version, .. } => assert_eq!(mdib_version, 4),
            other => panic!("expected Applied, got {other:?}"),
        }
        let snap = mirror.root.read();
        let state = snap.state(&sdc_core::StateKey::single(Handle::from("nm0"))).unwrap();
        match &state.value {
            StateValue::Metric { measured_value, .. } => assert_eq!(*measured_value, Some(37.2)),
            other => panic!("unexpected state value: {other:?}"),
        }
    }

    #[test]
    fn non_contiguous_version_is_a_version_gap_error() {
        let mirror = seeded_mirror();
        let err = mirror.apply_report(metric_report(6, "urn:uuid:seq-1", 37.2)).unwrap_err();
        match err {
            ConsumerError::VersionGap(gap) => {
                assert_eq!(gap.expected, 4);
                assert_eq!(gap.observed, 6);
            }
            other => panic!("expected VersionGap, got {other:?}"),
        }
    }

    #[test]
    fn sequence_id_change_requests_a_rebuild() {
        let mirror = seeded_mirror();
        let outcome = mirror.apply_report(metric_report(4, "urn:uuid:seq-2", 37.2)).unwrap();
        assert!(matches!(outcome, MirrorOutcome::NeedsRebuild));
    }

    #[test]
    fn invocation_only_report_never_touches_mdib_version() {
        let mirror = seeded_mirror();
        let report = ReportBody {
            mdib_version: 999,
            sequence_id: Arc::from("urn:uuid:whatever"),
            description_changes: Vec::new(),
            states: Vec::new(),
            invocations: vec![InvocationUpdate {
                transaction_id: 1,
                operation_handle: Handle::from("op_set_nm0"),
                state: sdc_core::InvocationState::Finished,
                detail: None,
            }],
        };
        let outcome = mirror.apply_report(report).unwrap();
        match outcome {
            MirrorOutcome::InvocationOnly { invocations } => assert_eq!(invocations.len(), 1),
            other => panic!("expected InvocationOnly, got {other:?}"),
        }
        assert_eq!(mirror.root.read().mdib_version, 3, "invocation-only report must not bump version");
    }

    #[test]
    fn created_description_change_forces_a_rebuild() {
        let mirror = seeded_mirror();
        let report = ReportBody {
            mdib_version: 4,
            sequence_id: Arc::from("urn:uuid:seq-1"),
            description_changes: vec![crate::report_body::DescriptionChange {
                kind: DescriptionChangeKind::Created,
                handle: Handle::from("nm1"),
                descriptor_version: Some(0),
            }],
            states: Vec::new(),
            invocations: Vec::new(),
        };
        let outcome = mirror.apply_report(report).unwrap();
        assert!(matches!(outcome, MirrorOutcome::NeedsRebuild));
    }
}
