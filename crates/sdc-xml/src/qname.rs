// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QName tables and namespace scoping.
//!
//! Namespaces are never resolved against process-wide state: every decode
//! and encode call threads a [`Runtime`] through explicitly, so two
//! independently constructed `Runtime`s never share prefix assignments.

use std::collections::HashMap;
use std::sync::Arc;

/// A qualified XML name: namespace URI plus local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Arc<str>,
    pub local: Arc<str>,
}

impl QName {
    pub fn new(namespace: impl Into<Arc<str>>, local: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local)
    }
}

/// Well-known SDC/BICEPS/WS-* namespace URIs.
pub mod ns {
    pub const SOAP12: &str = "http://www.w3.org/2003/05/soap-envelope";
    pub const WSA: &str = "http://www.w3.org/2005/08/addressing";
    pub const WSD: &str = "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01";
    pub const WSE: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing";
    pub const DPWS: &str = "http://docs.oasis-open.org/ws-dd/ns/dpws/2009/01";
    pub const MSG: &str = "http://standards.ieee.org/downloads/11073/11073-10207-2017/message";
    pub const PM: &str = "http://standards.ieee.org/downloads/11073/11073-10207-2017/participant";
    pub const EXT: &str = "http://standards.ieee.org/downloads/11073/11073-10207-2017/extension";
}

/// A namespace→prefix assignment table scoped to one encode/decode `Runtime`.
///
/// Never a global: construct one per encoding session (per request, per
/// document) so concurrent encodes cannot observe each other's prefixes.
#[derive(Debug, Default)]
pub struct QNameTable {
    prefixes: HashMap<Arc<str>, Arc<str>>,
    next_auto: u32,
}

impl QNameTable {
    pub fn new() -> Self {
        let mut table = Self {
            prefixes: HashMap::new(),
            next_auto: 0,
        };
        table.bind(ns::SOAP12, "s12");
        table.bind(ns::WSA, "wsa");
        table.bind(ns::WSD, "wsd");
        table.bind(ns::WSE, "wse");
        table.bind(ns::DPWS, "dpws");
        table.bind(ns::MSG, "msg");
        table.bind(ns::PM, "pm");
        table.bind(ns::EXT, "ext");
        table
    }

    pub fn bind(&mut self, namespace: impl Into<Arc<str>>, prefix: impl Into<Arc<str>>) {
        self.prefixes.insert(namespace.into(), prefix.into());
    }

    /// Return the prefix for a namespace, minting `ns0`, `ns1`, ... for
    /// namespaces not already bound (extension elements, mostly).
    pub fn prefix_for(&mut self, namespace: &str) -> Arc<str> {
        if let Some(p) = self.prefixes.get(namespace) {
            return p.clone();
        }
        let prefix: Arc<str> = Arc::from(format!("ns{}", self.next_auto));
        self.next_auto += 1;
        self.prefixes.insert(Arc::from(namespace), prefix.clone());
        prefix
    }

    /// All namespace→prefix bindings made so far, for emitting `xmlns:`
    /// declarations on the document root.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }
}

/// Encode/decode session state, explicitly constructed and passed down —
/// never a process-wide singleton.
#[derive(Debug, Default)]
pub struct Runtime {
    pub qnames: QNameTable,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            qnames: QNameTable::new(),
        }
    }
}
