// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transaction and top-level error taxonomy.

use std::fmt;

use crate::handle::{Handle, StateKey};

/// Why a transaction was rejected. Closed set: every commit either
/// succeeds entirely or fails with exactly one of these (the MDIB store
/// atomicity guarantee — a rejected transaction changes nothing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// The transaction referenced a handle with no matching descriptor.
    UnknownHandle,
    /// The transaction tried to insert a descriptor whose handle already
    /// exists.
    HandleCollision,
    /// A state's kind does not match its descriptor's kind (e.g. a metric
    /// state attached to an operation descriptor).
    TypeMismatch,
    /// A structural rule was broken that isn't covered by the three kinds
    /// above — for example more than one associate/disassociate pair for
    /// the same context instance in one transaction.
    InvariantViolation,
}

#[derive(Debug, Clone)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub handle: Option<Handle>,
    pub detail: String,
}

impl TransactionError {
    pub fn new(kind: TransactionErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            handle: None,
            detail: detail.into(),
        }
    }

    pub fn for_handle(kind: TransactionErrorKind, handle: Handle, detail: impl Into<String>) -> Self {
        Self {
            kind,
            handle: Some(handle),
            detail: detail.into(),
        }
    }

    pub fn unknown_handle(handle: Handle) -> Self {
        Self::for_handle(
            TransactionErrorKind::UnknownHandle,
            handle,
            "no descriptor with this handle exists in the current MDIB",
        )
    }

    pub fn handle_collision(handle: Handle) -> Self {
        Self::for_handle(
            TransactionErrorKind::HandleCollision,
            handle,
            "a descriptor with this handle already exists",
        )
    }

    pub fn type_mismatch(handle: Handle, detail: impl Into<String>) -> Self {
        Self::for_handle(TransactionErrorKind::TypeMismatch, handle, detail)
    }

    pub fn invariant_violation(detail: impl Into<String>) -> Self {
        Self::new(TransactionErrorKind::InvariantViolation, detail)
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(h) => write!(f, "transaction rejected ({:?}) at {}: {}", self.kind, h, self.detail),
            None => write!(f, "transaction rejected ({:?}): {}", self.kind, self.detail),
        }
    }
}

impl std::error::Error for TransactionError {}

pub type TransactionResult<T> = Result<T, TransactionError>;

/// A consumer-side mirror detected a non-contiguous MDIB version (a report
/// or `GetMdibResponse` skipped over one or more versions), meaning at
/// least one update was missed and the mirror can no longer be trusted
/// incrementally and must re-synchronize from a fresh `GetMdib`.
#[derive(Debug, Clone)]
pub struct VersionGap {
    pub expected: u64,
    pub observed: u64,
    pub state: Option<StateKey>,
}

impl fmt::Display for VersionGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version gap: expected {}, observed {}",
            self.expected, self.observed
        )
    }
}

impl std::error::Error for VersionGap {}

/// Top-level error composing the failure modes of every crate `sdc-core`
/// sits above, so callers higher up the stack (`sdc-provider`,
/// `sdc-consumer`) can propagate with a single `?` without losing which
/// layer failed.
#[derive(Debug)]
pub enum SdcError {
    Xml(sdc_xml::DecodeError),
    Soap(sdc_soap::SoapFault),
    Transaction(TransactionError),
    VersionGap(VersionGap),
}

impl fmt::Display for SdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdcError::Xml(e) => write!(f, "{e}"),
            SdcError::Soap(e) => write!(f, "{e}"),
            SdcError::Transaction(e) => write!(f, "{e}"),
            SdcError::VersionGap(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SdcError {}

impl From<sdc_xml::DecodeError> for SdcError {
    fn from(e: sdc_xml::DecodeError) -> Self {
        SdcError::Xml(e)
    }
}

impl From<sdc_soap::SoapFault> for SdcError {
    fn from(e: sdc_soap::SoapFault) -> Self {
        SdcError::Soap(e)
    }
}

impl From<TransactionError> for SdcError {
    fn from(e: TransactionError) -> Self {
        SdcError::Transaction(e)
    }
}

impl From<VersionGap> for SdcError {
    fn from(e: VersionGap) -> Self {
        SdcError::VersionGap(e)
    }
}
