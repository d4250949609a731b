// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Match predicate deciding whether a discovered endpoint's metadata is
//! relevant to a consumer's search. Promoted to a first-class type
//! rather than inlined filter logic, so `sdc-consumer` and `sdcctl`
//! share one implementation of WS-Discovery scope matching.

use crate::message::Metadata;

/// Filters candidate endpoints by `wsd:Types` and `wsd:Scopes`. An empty
/// list in either field means "don't filter on this dimension" — the
/// WS-Discovery 1.1 default for an all-matching Probe.
#[derive(Debug, Clone, Default)]
pub struct RelevancePredicate {
    pub types: Vec<String>,
    pub scopes: Vec<String>,
}

impl RelevancePredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = String>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    /// An endpoint matches when every requested type is present in its
    /// advertised types, and every requested scope is present in its
    /// advertised scopes (WS-Discovery 1.1 §4.3's "rdf" matching rule
    /// narrowed to exact string match, which is all BICEPS scope URIs
    /// need — SDC doesn't use the LDAP/strcmp0 scope-matching variants).
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.types.iter().all(|t| metadata.types.iter().any(|m| m == t))
            && self.scopes.iter().all(|s| metadata.scopes.iter().any(|m| m == s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(types: &[&str], scopes: &[&str]) -> Metadata {
        Metadata {
            types: types.iter().map(|s| s.to_string()).collect(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            x_addrs: Vec::new(),
        }
    }

    #[test]
    fn empty_predicate_matches_everything() {
        let pred = RelevancePredicate::new();
        assert!(pred.matches(&md(&["dpws:Device"], &["sdc.mds.pkp:1"])));
        assert!(pred.matches(&md(&[], &[])));
    }

    #[test]
    fn requires_all_requested_types_present() {
        let pred = RelevancePredicate::new().with_types(["dpws:Device".to_string(), "sdc:MedicalDevice".to_string()]);
        assert!(pred.matches(&md(&["dpws:Device", "sdc:MedicalDevice", "extra:Thing"], &[])));
        assert!(!pred.matches(&md(&["dpws:Device"], &[])));
    }

    #[test]
    fn requires_all_requested_scopes_present() {
        let pred = RelevancePredicate::new().with_scopes(["sdc.mds.pkp:1.2.3".to_string()]);
        assert!(pred.matches(&md(&[], &["sdc.mds.pkp:1.2.3", "sdc.mds.pkp:4.5.6"])));
        assert!(!pred.matches(&md(&[], &["sdc.mds.pkp:9.9.9"])));
    }

    #[test]
    fn combined_types_and_scopes_must_both_satisfy() {
        let pred = RelevancePredicate::new()
            .with_types(["dpws:Device".to_string()])
            .with_scopes(["sdc.mds.pkp:1".to_string()]);
        assert!(pred.matches(&md(&["dpws:Device"], &["sdc.mds.pkp:1"])));
        assert!(!pred.matches(&md(&["dpws:Device"], &["sdc.mds.pkp:2"])));
        assert!(!pred.matches(&md(&["other:Thing"], &["sdc.mds.pkp:1"])));
    }
}
