// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sdc-core — MDIB store, transactional mutation engine and reporting core
//!
//! The heart of the IEEE 11073 SDC implementation: a
//! typed, versioned, hierarchical Medical Device Information Base plus the
//! single-writer/concurrent-reader transaction discipline that governs it.
//! Report fan-out to subscriptions, service dispatch and the consumer
//! façade live one layer up in `sdc-provider`/`sdc-consumer`; this crate
//! only owns the data model, its invariants, and the ordered
//! [`report::TransactionReport`] a commit produces.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod mdib;
pub mod report;
pub mod snapshot;
pub mod state;
pub mod transaction;

pub use config::RuntimeConfig;
pub use descriptor::{AlertKind, ContextKind, Descriptor, DescriptorKind, MetricKind, OperationKind};
pub use error::{SdcError, TransactionError, TransactionErrorKind, TransactionResult, VersionGap};
pub use handle::{Handle, InstanceHandle, StateKey};
pub use mdib::{MdibRoot, Snapshot};
pub use report::{InvocationState, ReportAction, ReportSlices, TransactionReport};
pub use state::{ActivationState, ContextAssociation, MeasurementValidity, State, StateValue};
pub use transaction::{Transaction, TransactionKind, Writer};
