// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport-layer error taxonomy.
//!
//! `TransportError` is always surfaced to the caller; this layer never
//! retries a SOAP-level operation on its own (the HTTP transport — retry policy is
//! an application concern).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectFailed,
    Timeout,
    Cancelled,
    TlsHandshakeFailed,
    BadResponse,
    Io,
}

#[derive(Debug, Clone)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error ({:?}): {}", self.kind, self.detail)
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::ConnectFailed
        } else {
            TransportErrorKind::Io
        };
        Self::new(kind, e.to_string())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
