// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime state records: the mutable "how is it right now" half of the
//! MDIB.

use crate::handle::{Handle, InstanceHandle};
use sdc_xml::RawElement;

/// Activation state, shared by several descriptor kinds (metrics, alerts,
/// components, operations).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    On,
    NotReady,
    StandBy,
    Off,
    Shutdown,
    Failure,
}

/// Measurement validity, carried on metric states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementValidity {
    Valid,
    Invalid,
    Questionable,
    NotAvailable,
    CalibrationOngoing,
}

/// Context association, carried on context states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAssociation {
    Associated,
    Disassociated,
    NoAssociation,
}

/// The runtime value payload of a state, shaped by the owning descriptor's
/// kind. Kept as one enum (rather than one struct per kind) so the store
/// can hold a homogeneous `Vec`/map of states without dynamic dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Metric {
        measured_value: Option<f64>,
        string_value: Option<String>,
        validity: MeasurementValidity,
        presentation_time_ms: Option<u64>,
        activation: ActivationState,
    },
    Alert {
        presence: bool,
        acknowledged: bool,
        activation: ActivationState,
    },
    Operation {
        activation: ActivationState,
    },
    Component {
        activation: ActivationState,
    },
    Context {
        association: ContextAssociation,
        identifications: Vec<(String, String)>,
    },
    /// Battery, clock, SCO, system-context and similar descriptors whose
    /// state is a flat set of attributes not worth a dedicated variant.
    Generic {
        attributes: Vec<(String, String)>,
    },
}

impl StateValue {
    pub fn metric_initial(measured_value: f64) -> Self {
        Self::Metric {
            measured_value: Some(measured_value),
            string_value: None,
            validity: MeasurementValidity::Valid,
            presentation_time_ms: None,
            activation: ActivationState::On,
        }
    }
}

/// A mutable runtime record associated with a descriptor by handle.
#[derive(Debug, Clone)]
pub struct State {
    pub descriptor: Handle,
    pub instance: Option<InstanceHandle>,
    pub version: u64,
    pub value: StateValue,
    /// Child elements this binding didn't recognize, captured verbatim so a
    /// decode-then-encode round trip doesn't drop schema extension content.
    /// Carried across [`State::bumped`] since a version bump never touches
    /// unrecognized content.
    pub extension: Vec<RawElement>,
}

impl State {
    pub fn new(descriptor: Handle, value: StateValue) -> Self {
        Self {
            descriptor,
            instance: None,
            version: 0,
            value,
            extension: Vec::new(),
        }
    }

    pub fn new_multi(descriptor: Handle, instance: InstanceHandle, value: StateValue) -> Self {
        Self {
            descriptor,
            instance: Some(instance),
            version: 0,
            value,
            extension: Vec::new(),
        }
    }

    pub fn key(&self) -> crate::handle::StateKey {
        crate::handle::StateKey {
            descriptor: self.descriptor.clone(),
            instance: self.instance.clone(),
        }
    }

    pub fn bumped(&self, value: StateValue) -> Self {
        let mut next = self.clone();
        next.version += 1;
        next.value = value;
        next
    }
}
