// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery error taxonomy.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryErrorKind {
    /// The configured multicast interface could not be bound or joined.
    InterfaceUnavailable,
    /// Another process already owns the discovery port on this interface.
    AddressConflict,
}

#[derive(Debug, Clone)]
pub struct DiscoveryError {
    pub kind: DiscoveryErrorKind,
    pub detail: String,
}

impl DiscoveryError {
    pub fn new(kind: DiscoveryErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn interface_unavailable(detail: impl Into<String>) -> Self {
        Self::new(DiscoveryErrorKind::InterfaceUnavailable, detail)
    }

    pub fn address_conflict(detail: impl Into<String>) -> Self {
        Self::new(DiscoveryErrorKind::AddressConflict, detail)
    }
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "discovery error ({:?}): {}", self.kind, self.detail)
    }
}

impl std::error::Error for DiscoveryError {}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
