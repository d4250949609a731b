// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The MDIB store: a versioned, structurally-shared tree of descriptors and
//! states, published for lock-free concurrent reads.
//!
//! Each snapshot is a pair of `im::HashMap`s (persistent, node-sharing maps):
//! a commit clones the two maps in O(1) — `im::HashMap::clone` shares the
//! underlying tree structure rather than copying it — and the handful of
//! `insert`/`remove` calls that follow only path-copy the nodes on the
//! route to the changed keys. The result is swapped into an
//! [`arc_swap::ArcSwap`] in one atomic store. Readers that already hold a
//! [`Snapshot`] never block on, or see effects of, a concurrent commit.

use std::sync::Arc;

use arc_swap::ArcSwap;
use im::HashMap as PersistentMap;

use crate::descriptor::Descriptor;
use crate::handle::{Handle, StateKey};
use crate::state::State;

type DescriptorMap = PersistentMap<Handle, Arc<Descriptor>>;
type StateMap = PersistentMap<StateKey, Arc<State>>;

/// An immutable, point-in-time view of the MDIB. Cheap to clone (the two
/// persistent maps share structure with whatever snapshot produced them);
/// never changes once obtained.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub mdib_version: u64,
    pub sequence_id: Arc<str>,
    descriptors: DescriptorMap,
    states: StateMap,
}

impl Snapshot {
    pub fn descriptor(&self, handle: &Handle) -> Option<&Arc<Descriptor>> {
        self.descriptors.get(handle)
    }

    pub fn state(&self, key: &StateKey) -> Option<&Arc<State>> {
        self.states.get(key)
    }

    pub fn states_for(&self, descriptor: &Handle) -> Vec<&Arc<State>> {
        self.states
            .iter()
            .filter(|(k, _)| &k.descriptor == descriptor)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn children(&self, parent: &Handle) -> Vec<&Arc<Descriptor>> {
        self.descriptors
            .values()
            .filter(|d| d.parent.as_ref() == Some(parent))
            .collect()
    }

    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<Descriptor>> {
        self.descriptors.values()
    }

    pub fn states(&self) -> impl Iterator<Item = &Arc<State>> {
        self.states.values()
    }
}

/// The MDIB root: one per provider instance, one per mirrored consumer
/// instance. Holds the currently-published [`Snapshot`] behind an
/// `ArcSwap`, plus the sequence id identifying this MDIB's lifetime — a
/// new sequence id means a consumer's local mirror must be rebuilt from
/// scratch rather than incrementally updated.
pub struct MdibRoot {
    current: ArcSwap<Snapshot>,
}

impl MdibRoot {
    /// Builds an empty MDIB rooted at the given top-level MDS handle, with
    /// a freshly minted sequence id.
    pub fn new(sequence_id: impl Into<Arc<str>>) -> Self {
        let root = Snapshot {
            mdib_version: 0,
            sequence_id: sequence_id.into(),
            descriptors: PersistentMap::new(),
            states: PersistentMap::new(),
        };
        Self {
            current: ArcSwap::new(Arc::new(root)),
        }
    }

    pub fn read(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Publishes a new snapshot built from the current one plus the
    /// described changes. Not exposed outside the crate: all mutation goes
    /// through [`crate::transaction::Transaction::commit`], which enforces
    /// the single-writer lock and invariant checks before calling this.
    pub(crate) fn publish(
        &self,
        mdib_version: u64,
        descriptor_changes: Vec<(Handle, Option<Arc<Descriptor>>)>,
        state_changes: Vec<(StateKey, Option<Arc<State>>)>,
    ) -> Arc<Snapshot> {
        let prev = self.current.load();
        let mut descriptors = prev.descriptors.clone();
        let mut states = prev.states.clone();

        for (handle, value) in descriptor_changes {
            match value {
                Some(d) => {
                    descriptors.insert(handle, d);
                }
                None => {
                    descriptors.remove(&handle);
                }
            }
        }
        for (key, value) in state_changes {
            match value {
                Some(s) => {
                    states.insert(key, s);
                }
                None => {
                    states.remove(&key);
                }
            }
        }

        let next = Arc::new(Snapshot {
            mdib_version,
            sequence_id: prev.sequence_id.clone(),
            descriptors,
            states,
        });
        self.current.store(next.clone());
        next
    }

    /// Replaces the entire MDIB with a fresh sequence id and version 0,
    /// discarding history. Used when importing a snapshot from the wire
    /// or re-synchronizing a consumer mirror after a sequence id change.
    pub fn reset(
        &self,
        sequence_id: impl Into<Arc<str>>,
        descriptors: Vec<Arc<Descriptor>>,
        states: Vec<Arc<State>>,
    ) {
        let descriptor_map: DescriptorMap = descriptors
            .into_iter()
            .map(|d| (d.handle.clone(), d))
            .collect();
        let state_map: StateMap = states.into_iter().map(|s| (s.key(), s)).collect();
        let next = Arc::new(Snapshot {
            mdib_version: 0,
            sequence_id: sequence_id.into(),
            descriptors: descriptor_map,
            states: state_map,
        });
        self.current.store(next);
    }

    /// Like [`Self::reset`], but keeps the caller-supplied `mdib_version`
    /// instead of zeroing it. A true full restart always starts a fresh
    /// MDIB at version 0 (that's what `reset` models); re-loading a
    /// previously exported snapshot — a provider's own bootstrap from a
    /// seed document, or a consumer mirror re-synchronizing from a fresh
    /// `GetMdib` after a version gap — must instead pick up exactly where
    /// the source left off, or the mirror's own future version-gap check
    /// against incoming reports would never agree with the provider again.
    pub fn load_external(
        &self,
        sequence_id: impl Into<Arc<str>>,
        mdib_version: u64,
        descriptors: Vec<Arc<Descriptor>>,
        states: Vec<Arc<State>>,
    ) {
        let descriptor_map: DescriptorMap = descriptors
            .into_iter()
            .map(|d| (d.handle.clone(), d))
            .collect();
        let state_map: StateMap = states.into_iter().map(|s| (s.key(), s)).collect();
        let next = Arc::new(Snapshot {
            mdib_version,
            sequence_id: sequence_id.into(),
            descriptors: descriptor_map,
            states: state_map,
        });
        self.current.store(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorKind;
    use crate::state::StateValue;

    #[test]
    fn fresh_root_is_empty_at_version_zero() {
        let root = MdibRoot::new("urn:uuid:seq-1");
        let snap = root.read();
        assert_eq!(snap.mdib_version, 0);
        assert_eq!(snap.descriptor_count(), 0);
    }

    #[test]
    fn publish_is_visible_only_to_new_reads() {
        let root = MdibRoot::new("urn:uuid:seq-1");
        let held = root.read();

        let mds = Arc::new(Descriptor::root_mds(Handle::from("mds0")));
        root.publish(1, vec![(Handle::from("mds0"), Some(mds))], vec![]);

        assert_eq!(held.descriptor_count(), 0, "held snapshot must not mutate");
        let fresh = root.read();
        assert_eq!(fresh.descriptor_count(), 1);
        assert_eq!(fresh.mdib_version, 1);
    }

    #[test]
    fn reset_replaces_sequence_id_and_resets_version() {
        let root = MdibRoot::new("urn:uuid:seq-1");
        let mds = Arc::new(Descriptor::root_mds(Handle::from("mds0")));
        root.publish(5, vec![(Handle::from("mds0"), Some(mds))], vec![]);

        let metric = Arc::new(Descriptor::child(
            Handle::from("metric0"),
            DescriptorKind::Metric(crate::descriptor::MetricKind::Numeric),
            Handle::from("mds0"),
        ));
        let state = Arc::new(State::new(
            Handle::from("metric0"),
            StateValue::metric_initial(37.0),
        ));
        root.reset("urn:uuid:seq-2", vec![metric], vec![state]);

        let snap = root.read();
        assert_eq!(snap.mdib_version, 0);
        assert_eq!(&*snap.sequence_id, "urn:uuid:seq-2");
        assert_eq!(snap.descriptor_count(), 1);
        assert_eq!(snap.state_count(), 1);
    }

    #[test]
    fn load_external_preserves_the_supplied_mdib_version() {
        let root = MdibRoot::new("urn:uuid:seq-1");
        let mds = Arc::new(Descriptor::root_mds(Handle::from("mds0")));
        root.load_external("urn:uuid:seq-1", 42, vec![mds], vec![]);

        let snap = root.read();
        assert_eq!(snap.mdib_version, 42);
        assert_eq!(snap.descriptor_count(), 1);
    }
}
