// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode error taxonomy for the XML binding layer.

use std::fmt;

/// Kind of decode failure, closed set per the error taxonomy in the error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Malformed XML (unbalanced tags, bad encoding, ...).
    Malformed,
    /// A required element or attribute was missing.
    MissingElement,
    /// A value failed a schema range/enumeration check.
    SchemaViolation,
    /// An element was found but did not match any known QName for the
    /// expected position.
    UnexpectedElement,
}

/// A single XML decode failure, with an XPath-shaped locator so the caller
/// (typically a SOAP fault handler) can report where parsing gave up.
#[derive(Debug, Clone)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub xpath: String,
    pub detail: String,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, xpath: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            xpath: xpath.into(),
            detail: detail.into(),
        }
    }

    pub fn schema_violation(xpath: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::SchemaViolation, xpath, detail)
    }

    pub fn missing(xpath: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::MissingElement, xpath, "required element absent")
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decode error at {}: {:?}: {}", self.xpath, self.kind, self.detail)
    }
}

impl std::error::Error for DecodeError {}

impl From<roxmltree::Error> for DecodeError {
    fn from(e: roxmltree::Error) -> Self {
        Self::new(DecodeErrorKind::Malformed, "/", e.to_string())
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;
