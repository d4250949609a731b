// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Descriptor tree nodes: the immutable-per-version "what a thing is" half
//! of the MDIB.

use crate::handle::Handle;
use sdc_xml::RawElement;

/// Metric sub-kind, nested inside [`DescriptorKind::Metric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Numeric,
    String,
    Enum,
    RealTimeSample,
    Distribution,
}

/// Operation sub-kind, nested inside [`DescriptorKind::Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Set,
    Activate,
    SetContext,
    SetAlert,
    SetComponent,
    SetString,
}

/// Alert sub-kind, nested inside [`DescriptorKind::Alert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    System,
    Condition,
    Signal,
}

/// Context sub-kind, nested inside [`DescriptorKind::Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Patient,
    Location,
    Ensemble,
    Workflow,
    Means,
    Operator,
}

/// The closed set of descriptor types a node can be, per the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Mds,
    Vmd,
    Channel,
    Metric(MetricKind),
    Operation(OperationKind),
    Alert(AlertKind),
    Sco,
    Battery,
    Clock,
    SystemContext,
    Context(ContextKind),
}

impl DescriptorKind {
    /// Returns whether this kind may own more than one state instance
    /// distinguished by a multi-state handle (context descriptors only).
    pub fn allows_multi_state(self) -> bool {
        matches!(self, DescriptorKind::Context(_))
    }
}

/// An immutable-per-version descriptor node.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub handle: Handle,
    pub kind: DescriptorKind,
    /// `None` only for the root MDS node.
    pub parent: Option<Handle>,
    pub version: u64,
    /// Schema-defined attributes not modeled as first-class fields, kept as
    /// name/value pairs (codec-facing binding types carry the typed view;
    /// the store only needs enough to enforce invariants and report
    /// deltas).
    pub attributes: Vec<(String, String)>,
    /// Child elements this binding didn't recognize, captured verbatim so a
    /// decode-then-encode round trip doesn't drop schema extension content.
    /// Carried across [`Descriptor::bumped`] since a version bump never
    /// touches unrecognized content.
    pub extension: Vec<RawElement>,
}

impl Descriptor {
    pub fn root_mds(handle: Handle) -> Self {
        Self {
            handle,
            kind: DescriptorKind::Mds,
            parent: None,
            version: 0,
            attributes: Vec::new(),
            extension: Vec::new(),
        }
    }

    pub fn child(handle: Handle, kind: DescriptorKind, parent: Handle) -> Self {
        Self {
            handle,
            kind,
            parent: Some(parent),
            version: 0,
            attributes: Vec::new(),
            extension: Vec::new(),
        }
    }

    pub fn bumped(&self) -> Self {
        let mut next = self.clone();
        next.version += 1;
        next
    }
}
