// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The single-writer transactional commit path.
//!
//! Exactly one transaction may be building at a time per MDIB — enforced
//! with a `parking_lot::Mutex<()>` rather than a channel or actor, since
//! the critical section is pure in-memory bookkeeping with no `.await`
//! inside it. `max_concurrent_transactions` is always 1; there
//! is no queueing or priority scheme to build.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::descriptor::Descriptor;
use crate::error::{TransactionError, TransactionResult};
use crate::handle::{Handle, StateKey};
use crate::mdib::{MdibRoot, Snapshot};
use crate::report::{ReportAction, TransactionReport};
use crate::state::State;

/// The closed set of transaction kinds, each of which may only touch the
/// portion of the MDIB its name implies. A single `Tx` may mix
/// descriptor changes with state changes only when built as a
/// `DescriptorModification` — every other kind is states-only and is
/// rejected if it tries to add or remove a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    DescriptorModification,
    MetricStates,
    AlertStates,
    ComponentStates,
    ContextStates,
    OperationalStates,
    RealTimeSamples,
}

enum PendingDescriptor {
    Insert(Arc<Descriptor>),
    Update(Arc<Descriptor>),
    Remove(Handle),
}

/// A transaction under construction. Borrows nothing from the store until
/// [`Transaction::commit`] is called, so a caller can stage changes, bail
/// out on an application-level error, and simply drop the transaction
/// without touching the MDIB.
pub struct Transaction<'a> {
    root: &'a MdibRoot,
    _guard: parking_lot::MutexGuard<'a, ()>,
    kind: TransactionKind,
    base: Arc<Snapshot>,
    descriptor_changes: Vec<PendingDescriptor>,
    state_changes: Vec<State>,
    context_associations_touched: HashSet<Handle>,
}

/// Owns the writer lock. One per [`MdibRoot`] in practice; kept separate
/// from `MdibRoot` itself so read-only consumers never need to construct
/// one.
pub struct Writer {
    lock: Mutex<()>,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Self { lock: Mutex::new(()) }
    }

    pub fn begin<'a>(&'a self, root: &'a MdibRoot, kind: TransactionKind) -> Transaction<'a> {
        let guard = self.lock.lock();
        let base = root.read();
        Transaction {
            root,
            _guard: guard,
            kind,
            base,
            descriptor_changes: Vec::new(),
            state_changes: Vec::new(),
            context_associations_touched: HashSet::new(),
        }
    }
}

impl<'a> Transaction<'a> {
    /// Current, consistent view this transaction is building against.
    pub fn base(&self) -> &Snapshot {
        &self.base
    }

    pub fn insert_descriptor(&mut self, descriptor: Descriptor) -> TransactionResult<()> {
        if self.kind != TransactionKind::DescriptorModification {
            return Err(TransactionError::invariant_violation(
                "descriptor insert requires a DescriptorModification transaction",
            ));
        }
        if self.base.descriptor(&descriptor.handle).is_some() {
            return Err(TransactionError::handle_collision(descriptor.handle));
        }
        if descriptor.parent.is_none() && self.has_root_descriptor() {
            return Err(TransactionError::invariant_violation(
                "an MDIB may have only one MDS root descriptor",
            ));
        }
        if let Some(parent) = &descriptor.parent {
            if self.base.descriptor(parent).is_none() && self.pending_descriptor(parent).is_none() {
                return Err(TransactionError::unknown_handle(parent.clone()));
            }
            if self.ancestor_chain(parent).contains(&descriptor.handle) {
                return Err(TransactionError::invariant_violation(
                    "descriptor insert would create a cycle in the parent chain",
                ));
            }
        }
        self.descriptor_changes
            .push(PendingDescriptor::Insert(Arc::new(descriptor)));
        Ok(())
    }

    /// Whether a descriptor with no parent (an MDS root) already exists,
    /// either published or staged earlier in this same transaction.
    fn has_root_descriptor(&self) -> bool {
        self.base.descriptors().any(|d| d.parent.is_none())
            || self
                .descriptor_changes
                .iter()
                .any(|c| matches!(c, PendingDescriptor::Insert(d) if d.parent.is_none()))
    }

    /// Walks `start`'s parent chain (through the base snapshot and any
    /// descriptor staged earlier in this transaction), stopping at the
    /// root or after a bounded number of hops to tolerate a chain already
    /// corrupted by data this transaction didn't introduce.
    fn ancestor_chain(&self, start: &Handle) -> Vec<Handle> {
        let mut chain = Vec::new();
        let mut current = Some(start.clone());
        while let Some(handle) = current {
            if chain.len() > 10_000 || chain.contains(&handle) {
                break;
            }
            chain.push(handle.clone());
            current = self
                .base
                .descriptor(&handle)
                .map(|d| d.parent.clone())
                .or_else(|| self.pending_descriptor(&handle).map(|d| d.parent.clone()))
                .flatten();
        }
        chain
    }

    /// Stages an update to an already-existing descriptor — either a plain
    /// attribute change, or a structural one (parent or kind). Unlike an
    /// insert, this requires the handle to already be present. When the
    /// update is structural, every direct child's descriptor version is
    /// also bumped (its own state version is untouched), per spec.md §4.E:
    /// "a descriptor update that changes a structural attribute ... also
    /// increments descriptor versions of every affected child."
    pub fn update_descriptor(&mut self, descriptor: Descriptor) -> TransactionResult<()> {
        if self.kind != TransactionKind::DescriptorModification {
            return Err(TransactionError::invariant_violation(
                "descriptor update requires a DescriptorModification transaction",
            ));
        }
        let existing = self
            .base
            .descriptor(&descriptor.handle)
            .cloned()
            .or_else(|| self.pending_descriptor(&descriptor.handle));
        let existing = match existing {
            Some(d) => d,
            None => return Err(TransactionError::unknown_handle(descriptor.handle)),
        };

        let structural_change = existing.parent != descriptor.parent || existing.kind != descriptor.kind;
        let handle = descriptor.handle.clone();
        self.descriptor_changes
            .push(PendingDescriptor::Update(Arc::new(descriptor)));

        if structural_change {
            let child_handles: Vec<Handle> = self
                .base
                .children(&handle)
                .into_iter()
                .map(|d| d.handle.clone())
                .collect();
            for child_handle in child_handles {
                if self.pending_descriptor(&child_handle).is_some() {
                    continue;
                }
                if let Some(child) = self.base.descriptor(&child_handle).cloned() {
                    self.descriptor_changes.push(PendingDescriptor::Update(child));
                }
            }
        }
        Ok(())
    }

    /// Stages removal of `handle` plus, transitively, every descendant
    /// descriptor and every state belonging to any of them. The cascade
    /// is computed once here, against the
    /// transaction's base snapshot, so `commit` only needs to replay a
    /// flat list of removals.
    pub fn remove_descriptor(&mut self, handle: Handle) -> TransactionResult<()> {
        if self.kind != TransactionKind::DescriptorModification {
            return Err(TransactionError::invariant_violation(
                "descriptor removal requires a DescriptorModification transaction",
            ));
        }
        if self.base.descriptor(&handle).is_none() {
            return Err(TransactionError::unknown_handle(handle));
        }
        for descendant in descendant_closure(&self.base, &handle) {
            self.descriptor_changes.push(PendingDescriptor::Remove(descendant));
        }
        Ok(())
    }

    /// Stages a state update. The owning descriptor must already exist
    /// (either in the base snapshot or inserted earlier in this same
    /// transaction), and its kind must match the transaction's kind
    /// (checked below).
    pub fn update_state(&mut self, state: State) -> TransactionResult<()> {
        let descriptor = self
            .base
            .descriptor(&state.descriptor)
            .cloned()
            .or_else(|| self.pending_descriptor(&state.descriptor));
        let descriptor = match descriptor {
            Some(d) => d,
            None => return Err(TransactionError::unknown_handle(state.descriptor)),
        };

        if !self.kind_matches(descriptor.kind) {
            return Err(TransactionError::type_mismatch(
                state.descriptor,
                format!("state kind does not match transaction kind {:?}", self.kind),
            ));
        }

        if state.instance.is_some() && !descriptor.kind.allows_multi_state() {
            return Err(TransactionError::invariant_violation(
                "multi-state instance handle on a descriptor that does not permit multi-state",
            ));
        }

        if self.kind == TransactionKind::ContextStates {
            if let crate::state::StateValue::Context { association, .. } = &state.value {
                if matches!(
                    association,
                    crate::state::ContextAssociation::Associated
                        | crate::state::ContextAssociation::Disassociated
                ) {
                    let instance_key = state
                        .instance
                        .as_ref()
                        .map(|i| Handle::from(i.as_str()))
                        .unwrap_or_else(|| state.descriptor.clone());
                    if !self.context_associations_touched.insert(instance_key) {
                        return Err(TransactionError::invariant_violation(
                            "at most one associate/disassociate transition per context instance per transaction",
                        ));
                    }
                }
            }
        }

        self.state_changes.push(state);
        Ok(())
    }

    fn pending_descriptor(&self, handle: &Handle) -> Option<Arc<Descriptor>> {
        self.descriptor_changes.iter().find_map(|c| match c {
            PendingDescriptor::Insert(d) | PendingDescriptor::Update(d) if &d.handle == handle => Some(d.clone()),
            _ => None,
        })
    }

    fn kind_matches(&self, descriptor_kind: crate::descriptor::DescriptorKind) -> bool {
        use crate::descriptor::DescriptorKind as D;
        match self.kind {
            TransactionKind::DescriptorModification => true,
            TransactionKind::MetricStates => matches!(descriptor_kind, D::Metric(_)),
            TransactionKind::AlertStates => matches!(descriptor_kind, D::Alert(_)),
            TransactionKind::ComponentStates => {
                matches!(descriptor_kind, D::Mds | D::Vmd | D::Channel | D::Sco | D::Battery | D::Clock)
            }
            TransactionKind::ContextStates => matches!(descriptor_kind, D::Context(_) | D::SystemContext),
            TransactionKind::OperationalStates => matches!(descriptor_kind, D::Operation(_)),
            TransactionKind::RealTimeSamples => {
                matches!(descriptor_kind, D::Metric(crate::descriptor::MetricKind::RealTimeSample))
            }
        }
    }

    /// Commits the staged changes atomically. On any error the MDIB is
    /// left exactly as it was before `begin` was called (the
    /// atomicity guarantee) — nothing in this method mutates the store
    /// before every check below has passed.
    pub fn commit(self) -> TransactionResult<(Arc<Snapshot>, TransactionReport)> {
        if self.descriptor_changes.is_empty() && self.state_changes.is_empty() {
            return Err(TransactionError::invariant_violation("empty transaction"));
        }

        let next_version = self.base.mdib_version + 1;
        let mut report_actions = Vec::new();

        let mut descriptor_pub = Vec::new();
        for change in &self.descriptor_changes {
            match change {
                PendingDescriptor::Insert(d) => {
                    let prev_version = self.base.descriptor(&d.handle).map(|e| e.version);
                    let bumped = Arc::new(Descriptor {
                        version: prev_version.map(|v| v + 1).unwrap_or(0),
                        ..(**d).clone()
                    });
                    report_actions.push(ReportAction::DescriptionCreated(bumped.clone()));
                    descriptor_pub.push((bumped.handle.clone(), Some(bumped)));
                }
                PendingDescriptor::Update(d) => {
                    let prev_version = self.base.descriptor(&d.handle).map(|e| e.version).unwrap_or(0);
                    let bumped = Arc::new(Descriptor {
                        version: prev_version + 1,
                        ..(**d).clone()
                    });
                    report_actions.push(ReportAction::DescriptionUpdated(bumped.clone()));
                    descriptor_pub.push((bumped.handle.clone(), Some(bumped)));
                }
                PendingDescriptor::Remove(handle) => {
                    report_actions.push(ReportAction::DescriptionDeleted(handle.clone()));
                    descriptor_pub.push((handle.clone(), None));
                }
            }
        }

        let mut state_pub = Vec::new();
        // cascading removal: every state belonging to a removed descriptor
        // goes too, even though no `update_state` call staged it directly.
        for change in &self.descriptor_changes {
            if let PendingDescriptor::Remove(handle) = change {
                for key in cascading_state_keys(&self.base, handle) {
                    state_pub.push((key, None));
                }
            }
        }
        for state in self.state_changes {
            let key = state.key();
            let prev_version = self.base.state(&key).map(|s| s.version).unwrap_or(0);
            let bumped = Arc::new(State {
                version: if self.base.state(&key).is_some() { prev_version + 1 } else { 0 },
                ..state
            });
            report_actions.push(self.action_for(&bumped));
            state_pub.push((key, Some(bumped)));
        }

        let published = self.root.publish(next_version, descriptor_pub, state_pub);
        let report = TransactionReport {
            mdib_version: next_version,
            sequence_id: published.sequence_id.clone(),
            actions: report_actions,
        };
        Ok((published, report))
    }

    fn action_for(&self, state: &Arc<State>) -> ReportAction {
        match self.kind {
            TransactionKind::MetricStates => ReportAction::MetricStateChanged(state.clone()),
            TransactionKind::AlertStates => ReportAction::AlertStateChanged(state.clone()),
            TransactionKind::ComponentStates => ReportAction::ComponentStateChanged(state.clone()),
            TransactionKind::ContextStates => ReportAction::ContextStateChanged(state.clone()),
            TransactionKind::OperationalStates => ReportAction::OperationalStateChanged(state.clone()),
            TransactionKind::RealTimeSamples => ReportAction::RealTimeSampleChanged(state.clone()),
            TransactionKind::DescriptorModification => ReportAction::ComponentStateChanged(state.clone()),
        }
    }
}

/// Identifies the set of state keys this in-progress transaction would
/// also delete when removing a descriptor — used by higher layers that
/// want to pre-validate a bulk removal before staging it state by state.
pub fn cascading_state_keys(snapshot: &Snapshot, handle: &Handle) -> Vec<StateKey> {
    snapshot
        .states()
        .filter(|s| &s.descriptor == handle)
        .map(|s| s.key())
        .collect()
}

/// `handle` plus every descendant reachable by following `parent` links,
/// breadth-first, against `snapshot`.
fn descendant_closure(snapshot: &Snapshot, handle: &Handle) -> Vec<Handle> {
    let mut closure = vec![handle.clone()];
    let mut frontier = vec![handle.clone()];
    while let Some(parent) = frontier.pop() {
        for child in snapshot.children(&parent) {
            closure.push(child.handle.clone());
            frontier.push(child.handle.clone());
        }
    }
    closure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MetricKind;
    use crate::error::TransactionErrorKind;
    use crate::mdib::MdibRoot;
    use crate::state::StateValue;

    fn seeded_root() -> MdibRoot {
        let root = MdibRoot::new("urn:uuid:seq-1");
        let mds = Arc::new(Descriptor::root_mds(Handle::from("mds0")));
        let vmd = Arc::new(Descriptor::child(Handle::from("vmd0"), crate::descriptor::DescriptorKind::Vmd, Handle::from("mds0")));
        let metric = Arc::new(Descriptor::child(
            Handle::from("nm0"),
            crate::descriptor::DescriptorKind::Metric(MetricKind::Numeric),
            Handle::from("vmd0"),
        ));
        let state = Arc::new(State::new(Handle::from("nm0"), StateValue::metric_initial(36.6)));
        root.publish(
            1,
            vec![
                (Handle::from("mds0"), Some(mds)),
                (Handle::from("vmd0"), Some(vmd)),
                (Handle::from("nm0"), Some(metric)),
            ],
            vec![(state.key(), Some(state))],
        );
        root
    }

    #[test]
    fn commit_bumps_mdib_version_by_exactly_one() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::MetricStates);
        let prev = tx.base().state(&StateKey::single(Handle::from("nm0"))).unwrap().clone();
        tx.update_state(State {
            version: prev.version,
            ..(*prev).clone()
        })
        .unwrap();
        let (snap, report) = tx.commit().unwrap();
        assert_eq!(snap.mdib_version, 2);
        assert_eq!(report.mdib_version, 2);
    }

    #[test]
    fn changed_entity_version_increments_by_one_unchanged_entities_preserved() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::MetricStates);
        tx.update_state(State::new(Handle::from("nm0"), StateValue::metric_initial(37.0)))
            .unwrap();
        let (snap, _report) = tx.commit().unwrap();
        let nm0 = snap.state(&StateKey::single(Handle::from("nm0"))).unwrap();
        assert_eq!(nm0.version, 1);
        let mds0 = snap.descriptor(&Handle::from("mds0")).unwrap();
        assert_eq!(mds0.version, 0, "untouched descriptor keeps its version");
    }

    #[test]
    fn remove_descriptor_cascades_to_descendants_and_their_states() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::DescriptorModification);
        tx.remove_descriptor(Handle::from("vmd0")).unwrap();
        let (snap, report) = tx.commit().unwrap();

        assert!(snap.descriptor(&Handle::from("vmd0")).is_none());
        assert!(snap.descriptor(&Handle::from("nm0")).is_none(), "descendant must cascade");
        assert!(
            snap.state(&StateKey::single(Handle::from("nm0"))).is_none(),
            "descendant's state must cascade"
        );
        let deletions = report
            .actions
            .iter()
            .filter(|a| matches!(a, ReportAction::DescriptionDeleted(_)))
            .count();
        assert_eq!(deletions, 2, "vmd0 and nm0 both produce a deletion entry");
    }

    #[test]
    fn wrong_kind_state_update_is_rejected_with_type_mismatch() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::AlertStates);
        let err = tx
            .update_state(State::new(Handle::from("nm0"), StateValue::metric_initial(1.0)))
            .unwrap_err();
        assert_eq!(err.kind, TransactionErrorKind::TypeMismatch);
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::MetricStates);
        let err = tx
            .update_state(State::new(Handle::from("ghost"), StateValue::metric_initial(1.0)))
            .unwrap_err();
        assert_eq!(err.kind, TransactionErrorKind::UnknownHandle);
    }

    #[test]
    fn handle_collision_is_rejected() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::DescriptorModification);
        let err = tx
            .insert_descriptor(Descriptor::child(
                Handle::from("vmd0"),
                crate::descriptor::DescriptorKind::Vmd,
                Handle::from("mds0"),
            ))
            .unwrap_err();
        assert_eq!(err.kind, TransactionErrorKind::HandleCollision);
    }

    #[test]
    fn second_root_descriptor_is_rejected() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::DescriptorModification);
        let err = tx
            .insert_descriptor(Descriptor::root_mds(Handle::from("mds1")))
            .unwrap_err();
        assert_eq!(err.kind, TransactionErrorKind::InvariantViolation);
    }

    #[test]
    fn self_parented_descriptor_is_rejected() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::DescriptorModification);
        let err = tx
            .insert_descriptor(Descriptor::child(
                Handle::from("loopy"),
                crate::descriptor::DescriptorKind::Vmd,
                Handle::from("loopy"),
            ))
            .unwrap_err();
        assert_eq!(err.kind, TransactionErrorKind::UnknownHandle, "parent must already exist before a cycle can even be checked");
    }

    #[test]
    fn update_descriptor_bumps_version_and_emits_description_updated() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::DescriptorModification);
        let vmd0 = tx.base().descriptor(&Handle::from("vmd0")).unwrap().clone();
        let mut updated = (*vmd0).clone();
        updated.attributes.push(("Type".into(), "urn:oid:1.2.3".into()));
        tx.update_descriptor(updated).unwrap();
        let (snap, report) = tx.commit().unwrap();

        let vmd0 = snap.descriptor(&Handle::from("vmd0")).unwrap();
        assert_eq!(vmd0.version, 1);
        assert_eq!(vmd0.attributes.len(), 1);
        assert!(report.actions.iter().any(|a| matches!(a, ReportAction::DescriptionUpdated(d) if d.handle == Handle::from("vmd0"))));
    }

    #[test]
    fn structural_descriptor_update_bumps_direct_children_versions() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::DescriptorModification);
        tx.insert_descriptor(Descriptor::child(
            Handle::from("vmd1"),
            crate::descriptor::DescriptorKind::Vmd,
            Handle::from("mds0"),
        ))
        .unwrap();
        let vmd0 = tx.base().descriptor(&Handle::from("vmd0")).unwrap().clone();
        let mut reparented = (*vmd0).clone();
        reparented.parent = Some(Handle::from("vmd1"));
        tx.update_descriptor(reparented).unwrap();
        let (snap, report) = tx.commit().unwrap();

        let nm0 = snap.descriptor(&Handle::from("nm0")).unwrap();
        assert_eq!(nm0.version, 1, "nm0 is a direct child of the reparented vmd0");
        let nm0_state = snap.state(&StateKey::single(Handle::from("nm0"))).unwrap();
        assert_eq!(nm0_state.version, 0, "state version is untouched by a purely structural descriptor change");
        let nm0_updates = report
            .actions
            .iter()
            .filter(|a| matches!(a, ReportAction::DescriptionUpdated(d) if d.handle == Handle::from("nm0")))
            .count();
        assert_eq!(nm0_updates, 1);
    }

    #[test]
    fn update_descriptor_on_unknown_handle_is_rejected() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::DescriptorModification);
        let err = tx
            .update_descriptor(Descriptor::child(
                Handle::from("ghost"),
                crate::descriptor::DescriptorKind::Vmd,
                Handle::from("mds0"),
            ))
            .unwrap_err();
        assert_eq!(err.kind, TransactionErrorKind::UnknownHandle);
    }

    #[test]
    fn double_association_in_one_transaction_is_an_invariant_violation() {
        let root = seeded_root();
        let system_context = Arc::new(Descriptor::child(
            Handle::from("sctx0"),
            crate::descriptor::DescriptorKind::SystemContext,
            Handle::from("mds0"),
        ));
        root.publish(2, vec![(Handle::from("sctx0"), Some(system_context))], vec![]);

        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::ContextStates);
        tx.update_state(State::new_multi(
            Handle::from("sctx0"),
            crate::handle::InstanceHandle::from("patient0"),
            StateValue::Context {
                association: crate::state::ContextAssociation::Associated,
                identifications: vec![],
            },
        ))
        .unwrap();
        let err = tx
            .update_state(State::new_multi(
                Handle::from("sctx0"),
                crate::handle::InstanceHandle::from("patient0"),
                StateValue::Context {
                    association: crate::state::ContextAssociation::Disassociated,
                    identifications: vec![],
                },
            ))
            .unwrap_err();
        assert_eq!(err.kind, TransactionErrorKind::InvariantViolation);
    }

    #[test]
    fn multi_state_instance_on_non_context_descriptor_is_rejected() {
        let root = seeded_root();
        let writer = Writer::new();
        let mut tx = writer.begin(&root, TransactionKind::MetricStates);
        let err = tx
            .update_state(State::new_multi(
                Handle::from("nm0"),
                crate::handle::InstanceHandle::from("inst0"),
                StateValue::metric_initial(1.0),
            ))
            .unwrap_err();
        assert_eq!(err.kind, TransactionErrorKind::InvariantViolation);
    }
}
