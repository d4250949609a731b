// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stable string identifiers within one MDIB.
//!
//! A `Handle` never gets reused within the lifetime of a provider instance.
//! Kept as a distinct newtype around `Arc<str>` for cheap clone/hash/eq,
//! rather than a bare `String`, so a descriptor handle and a multi-state
//! instance handle can never be mixed up at the type level.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(Arc<str>);

impl Handle {
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Handle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Handle {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Distinguishes a multi-state instance handle from a descriptor [`Handle`]
/// at the type level, so `(Handle, Option<InstanceHandle>)` state keys can't
/// be built from two unrelated handles by accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(Arc<str>);

impl InstanceHandle {
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstanceHandle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Key identifying one state record: the owning descriptor handle, plus an
/// optional multi-state instance handle for context states.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub descriptor: Handle,
    pub instance: Option<InstanceHandle>,
}

impl StateKey {
    pub fn single(descriptor: Handle) -> Self {
        Self {
            descriptor,
            instance: None,
        }
    }

    pub fn multi(descriptor: Handle, instance: InstanceHandle) -> Self {
        Self {
            descriptor,
            instance: Some(instance),
        }
    }
}
