// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WS-Discovery 1.1 wire messages.
//!
//! A closed enum encoded to/decoded from SOAP envelopes via `sdc-soap`:
//! one variant per message kind, with explicit XML element names rather
//! than a derived serialization, since WS-Discovery's wire format mixes
//! attribute- and element-based encodings that don't map cleanly onto a
//! single derive.

use sdc_xml::writer::escape_text;
use sdc_xml::{DecodeError, DecodeResult};

/// `wsd:AppSequence`: orders a discovery node's outbound messages and lets
/// receivers detect duplicates/reorders across interface hops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppSequence {
    pub instance_id: u64,
    pub message_number: u64,
}

impl AppSequence {
    pub fn first(instance_id: u64) -> Self {
        Self {
            instance_id,
            message_number: 1,
        }
    }

    pub fn next(self) -> Self {
        Self {
            instance_id: self.instance_id,
            message_number: self.message_number + 1,
        }
    }
}

/// What a discovery target was found to support/expose — the three
/// dimensions a [`crate::relevance::RelevancePredicate`] filters over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub types: Vec<String>,
    pub scopes: Vec<String>,
    pub x_addrs: Vec<String>,
}

/// The closed set of WS-Discovery message kinds this engine sends and
/// receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMessage {
    Probe {
        app_sequence: AppSequence,
        message_id: String,
        types: Vec<String>,
        scopes: Vec<String>,
    },
    ProbeMatches {
        app_sequence: AppSequence,
        message_id: String,
        relates_to: String,
        epr: String,
        metadata: Metadata,
        metadata_version: u64,
    },
    Resolve {
        app_sequence: AppSequence,
        message_id: String,
        epr: String,
    },
    ResolveMatches {
        app_sequence: AppSequence,
        message_id: String,
        relates_to: String,
        epr: String,
        metadata: Metadata,
        metadata_version: u64,
    },
    Hello {
        app_sequence: AppSequence,
        message_id: String,
        epr: String,
        metadata: Metadata,
        metadata_version: u64,
    },
    Bye {
        app_sequence: AppSequence,
        message_id: String,
        epr: String,
    },
}

impl DiscoveryMessage {
    pub fn app_sequence(&self) -> AppSequence {
        match self {
            Self::Probe { app_sequence, .. }
            | Self::ProbeMatches { app_sequence, .. }
            | Self::Resolve { app_sequence, .. }
            | Self::ResolveMatches { app_sequence, .. }
            | Self::Hello { app_sequence, .. }
            | Self::Bye { app_sequence, .. } => *app_sequence,
        }
    }

    pub fn message_id(&self) -> &str {
        match self {
            Self::Probe { message_id, .. }
            | Self::ProbeMatches { message_id, .. }
            | Self::Resolve { message_id, .. }
            | Self::ResolveMatches { message_id, .. }
            | Self::Hello { message_id, .. }
            | Self::Bye { message_id, .. } => message_id,
        }
    }

    /// Encodes the `wsd:`-qualified SOAP body for this message. The caller
    /// wraps this in a full `sdc_soap::Envelope` addressed with the right
    /// `wsa:Action` for the variant.
    pub fn encode_body(&self) -> String {
        let mut buf = String::new();
        match self {
            Self::Probe {
                app_sequence,
                types,
                scopes,
                ..
            } => {
                write_app_sequence(&mut buf, *app_sequence);
                buf.push_str("<wsd:Probe>");
                write_list(&mut buf, "wsd:Types", types);
                write_list(&mut buf, "wsd:Scopes", scopes);
                buf.push_str("</wsd:Probe>");
            }
            Self::ProbeMatches {
                app_sequence,
                epr,
                metadata,
                metadata_version,
                ..
            } => {
                write_app_sequence(&mut buf, *app_sequence);
                buf.push_str("<wsd:ProbeMatches><wsd:ProbeMatch>");
                write_epr_metadata(&mut buf, epr, metadata, *metadata_version);
                buf.push_str("</wsd:ProbeMatch></wsd:ProbeMatches>");
            }
            Self::Resolve { app_sequence, epr, .. } => {
                write_app_sequence(&mut buf, *app_sequence);
                buf.push_str("<wsd:Resolve><wsa:EndpointReference><wsa:Address>");
                buf.push_str(&escape_text(epr));
                buf.push_str("</wsa:Address></wsa:EndpointReference></wsd:Resolve>");
            }
            Self::ResolveMatches {
                app_sequence,
                epr,
                metadata,
                metadata_version,
                ..
            } => {
                write_app_sequence(&mut buf, *app_sequence);
                buf.push_str("<wsd:ResolveMatches><wsd:ResolveMatch>");
                write_epr_metadata(&mut buf, epr, metadata, *metadata_version);
                buf.push_str("</wsd:ResolveMatch></wsd:ResolveMatches>");
            }
            Self::Hello {
                app_sequence,
                epr,
                metadata,
                metadata_version,
                ..
            } => {
                write_app_sequence(&mut buf, *app_sequence);
                buf.push_str("<wsd:Hello>");
                write_epr_metadata(&mut buf, epr, metadata, *metadata_version);
                buf.push_str("</wsd:Hello>");
            }
            Self::Bye { app_sequence, epr, .. } => {
                write_app_sequence(&mut buf, *app_sequence);
                buf.push_str("<wsd:Bye><wsa:EndpointReference><wsa:Address>");
                buf.push_str(&escape_text(epr));
                buf.push_str("</wsa:Address></wsa:EndpointReference></wsd:Bye>");
            }
        }
        buf
    }

    /// Decodes a `wsd:`-qualified SOAP body back into a typed message.
    /// `action` disambiguates which variant to parse (the WS-Addressing
    /// `Action` header, already pulled out of the enclosing envelope by
    /// the caller), and `message_id`/`relates_to` come from the same
    /// envelope's addressing block.
    pub fn decode_body(
        action: &DiscoveryAction,
        message_id: String,
        relates_to: Option<String>,
        body_xml: &str,
    ) -> DecodeResult<Self> {
        sdc_xml::reader::with_root(body_xml, |root| {
            let app_sequence = read_app_sequence(root)?;
            match action {
                DiscoveryAction::Probe => {
                    let probe = find_child(root, "Probe").ok_or_else(|| DecodeError::missing("/Probe"))?;
                    Ok(DiscoveryMessage::Probe {
                        app_sequence,
                        message_id,
                        types: read_list(probe, "Types"),
                        scopes: read_list(probe, "Scopes"),
                    })
                }
                DiscoveryAction::ProbeMatches => {
                    let (epr, metadata, version) = read_first_match(root, "ProbeMatches", "ProbeMatch")?;
                    Ok(DiscoveryMessage::ProbeMatches {
                        app_sequence,
                        message_id,
                        relates_to: relates_to.ok_or_else(|| DecodeError::missing("/Header/RelatesTo"))?,
                        epr,
                        metadata,
                        metadata_version: version,
                    })
                }
                DiscoveryAction::Resolve => {
                    let resolve = find_child(root, "Resolve").ok_or_else(|| DecodeError::missing("/Resolve"))?;
                    let epr = read_epr(resolve)?;
                    Ok(DiscoveryMessage::Resolve {
                        app_sequence,
                        message_id,
                        epr,
                    })
                }
                DiscoveryAction::ResolveMatches => {
                    let (epr, metadata, version) = read_first_match(root, "ResolveMatches", "ResolveMatch")?;
                    Ok(DiscoveryMessage::ResolveMatches {
                        app_sequence,
                        message_id,
                        relates_to: relates_to.ok_or_else(|| DecodeError::missing("/Header/RelatesTo"))?,
                        epr,
                        metadata,
                        metadata_version: version,
                    })
                }
                DiscoveryAction::Hello => {
                    let hello = find_child(root, "Hello").ok_or_else(|| DecodeError::missing("/Hello"))?;
                    let epr = read_epr(hello)?;
                    let metadata = read_metadata(hello);
                    let version = read_metadata_version(hello);
                    Ok(DiscoveryMessage::Hello {
                        app_sequence,
                        message_id,
                        epr,
                        metadata,
                        metadata_version: version,
                    })
                }
                DiscoveryAction::Bye => {
                    let bye = find_child(root, "Bye").ok_or_else(|| DecodeError::missing("/Bye"))?;
                    let epr = read_epr(bye)?;
                    Ok(DiscoveryMessage::Bye {
                        app_sequence,
                        message_id,
                        epr,
                    })
                }
            }
        })
    }
}

/// The `wsa:Action` values WS-Discovery defines, narrowed to the closed
/// set the discovery engine names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryAction {
    Probe,
    ProbeMatches,
    Resolve,
    ResolveMatches,
    Hello,
    Bye,
}

impl DiscoveryAction {
    pub const NS: &'static str = "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01";

    pub fn as_uri(self) -> String {
        let local = match self {
            Self::Probe => "Probe",
            Self::ProbeMatches => "ProbeMatches",
            Self::Resolve => "Resolve",
            Self::ResolveMatches => "ResolveMatches",
            Self::Hello => "Hello",
            Self::Bye => "Bye",
        };
        format!("{}/{local}", Self::NS)
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        let local = uri.rsplit('/').next()?;
        Some(match local {
            "Probe" => Self::Probe,
            "ProbeMatches" => Self::ProbeMatches,
            "Resolve" => Self::Resolve,
            "ResolveMatches" => Self::ResolveMatches,
            "Hello" => Self::Hello,
            "Bye" => Self::Bye,
            _ => return None,
        })
    }
}

fn write_app_sequence(buf: &mut String, seq: AppSequence) {
    buf.push_str(&format!(
        "<wsd:AppSequence InstanceId=\"{}\" MessageNumber=\"{}\"/>",
        seq.instance_id, seq.message_number
    ));
}

fn write_list(buf: &mut String, tag: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    buf.push_str(&format!("<{tag}>{}</{tag}>", escape_text(&items.join(" "))));
}

fn write_epr_metadata(buf: &mut String, epr: &str, metadata: &Metadata, version: u64) {
    buf.push_str("<wsa:EndpointReference><wsa:Address>");
    buf.push_str(&escape_text(epr));
    buf.push_str("</wsa:Address></wsa:EndpointReference>");
    write_list(buf, "wsd:Types", &metadata.types);
    write_list(buf, "wsd:Scopes", &metadata.scopes);
    write_list(buf, "wsd:XAddrs", &metadata.x_addrs);
    buf.push_str(&format!("<wsd:MetadataVersion>{version}</wsd:MetadataVersion>"));
}

fn find_child<'a>(node: roxmltree::Node<'a, 'a>, local: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|c| c.is_element() && c.tag_name().name() == local)
}

fn read_app_sequence(node: roxmltree::Node) -> DecodeResult<AppSequence> {
    let app_seq = find_child(node, "AppSequence").ok_or_else(|| DecodeError::missing("/AppSequence"))?;
    let instance_id = app_seq
        .attribute("InstanceId")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| DecodeError::missing("/AppSequence/@InstanceId"))?;
    let message_number = app_seq
        .attribute("MessageNumber")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| DecodeError::missing("/AppSequence/@MessageNumber"))?;
    Ok(AppSequence {
        instance_id,
        message_number,
    })
}

fn read_list(node: roxmltree::Node, local: &str) -> Vec<String> {
    find_child(node, local)
        .and_then(|n| n.text())
        .map(|t| t.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn read_epr(node: roxmltree::Node) -> DecodeResult<String> {
    find_child(node, "EndpointReference")
        .and_then(|epr| find_child(epr, "Address"))
        .and_then(|addr| addr.text())
        .map(str::to_string)
        .ok_or_else(|| DecodeError::missing("/EndpointReference/Address"))
}

fn read_metadata(node: roxmltree::Node) -> Metadata {
    Metadata {
        types: read_list(node, "Types"),
        scopes: read_list(node, "Scopes"),
        x_addrs: read_list(node, "XAddrs"),
    }
}

fn read_metadata_version(node: roxmltree::Node) -> u64 {
    find_child(node, "MetadataVersion")
        .and_then(|n| n.text())
        .and_then(|t| t.parse().ok())
        .unwrap_or(0)
}

fn read_first_match(
    node: roxmltree::Node,
    wrapper: &str,
    item: &str,
) -> DecodeResult<(String, Metadata, u64)> {
    let wrapper_node = find_child(node, wrapper).ok_or_else(|| DecodeError::missing(format!("/{wrapper}")))?;
    let match_node = find_child(wrapper_node, item).ok_or_else(|| DecodeError::missing(format!("/{wrapper}/{item}")))?;
    let epr = read_epr(match_node)?;
    let metadata = read_metadata(match_node);
    let version = read_metadata_version(match_node);
    Ok((epr, metadata, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_round_trips_through_encode_decode() {
        let msg = DiscoveryMessage::Probe {
            app_sequence: AppSequence::first(1),
            message_id: "urn:uuid:m1".into(),
            types: vec!["dpws:Device".into()],
            scopes: vec!["sdc.mds.pkp:1.2.3.4.5".into()],
        };
        let body = msg.encode_body();
        let decoded = DiscoveryMessage::decode_body(&DiscoveryAction::Probe, "urn:uuid:m1".into(), None, &body).unwrap();
        match decoded {
            DiscoveryMessage::Probe { types, scopes, .. } => {
                assert_eq!(types, vec!["dpws:Device".to_string()]);
                assert_eq!(scopes, vec!["sdc.mds.pkp:1.2.3.4.5".to_string()]);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn hello_round_trips_metadata_and_version() {
        let msg = DiscoveryMessage::Hello {
            app_sequence: AppSequence::first(7),
            message_id: "urn:uuid:h1".into(),
            epr: "urn:uuid:device-1".into(),
            metadata: Metadata {
                types: vec!["dpws:Device".into()],
                scopes: vec![],
                x_addrs: vec!["https://10.0.0.5:8080/device".into()],
            },
            metadata_version: 3,
        };
        let body = msg.encode_body();
        let decoded = DiscoveryMessage::decode_body(&DiscoveryAction::Hello, "urn:uuid:h1".into(), None, &body).unwrap();
        match decoded {
            DiscoveryMessage::Hello {
                epr, metadata, metadata_version, ..
            } => {
                assert_eq!(epr, "urn:uuid:device-1");
                assert_eq!(metadata.x_addrs, vec!["https://10.0.0.5:8080/device".to_string()]);
                assert_eq!(metadata_version, 3);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn action_uri_round_trips() {
        for action in [
            DiscoveryAction::Probe,
            DiscoveryAction::ProbeMatches,
            DiscoveryAction::Resolve,
            DiscoveryAction::ResolveMatches,
            DiscoveryAction::Hello,
            DiscoveryAction::Bye,
        ] {
            assert_eq!(DiscoveryAction::from_uri(&action.as_uri()), Some(action));
        }
    }

    #[test]
    fn app_sequence_next_increments_message_number_only() {
        let seq = AppSequence::first(42);
        let next = seq.next();
        assert_eq!(next.instance_id, 42);
        assert_eq!(next.message_number, 2);
    }
}
