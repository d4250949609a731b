// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MDIB export/import: the canonical `GetMdibResponse` XML body. Used both
//! as the wire format for a consumer's bootstrap `GetMdib` call and as a
//! diagnostic snapshot a provider can write to/read from a file —
//! durability beyond that is the host's concern.

use std::sync::Arc;

use sdc_xml::qname::ns;
use sdc_xml::reader::with_root;
use sdc_xml::writer::{escape_attr, escape_text};
use sdc_xml::{DecodeError, DecodeErrorKind, DecodeResult, Runtime};

use crate::descriptor::{AlertKind, ContextKind, Descriptor, DescriptorKind, MetricKind, OperationKind};
use crate::handle::Handle;
use crate::mdib::{MdibRoot, Snapshot};
use crate::state::{ActivationState, ContextAssociation, MeasurementValidity, State, StateValue};

fn descriptor_kind_name(kind: DescriptorKind) -> &'static str {
    match kind {
        DescriptorKind::Mds => "Mds",
        DescriptorKind::Vmd => "Vmd",
        DescriptorKind::Channel => "Channel",
        DescriptorKind::Metric(MetricKind::Numeric) => "NumericMetric",
        DescriptorKind::Metric(MetricKind::String) => "StringMetric",
        DescriptorKind::Metric(MetricKind::Enum) => "EnumStringMetric",
        DescriptorKind::Metric(MetricKind::RealTimeSample) => "RealTimeSampleArrayMetric",
        DescriptorKind::Metric(MetricKind::Distribution) => "DistributionSampleArrayMetric",
        DescriptorKind::Operation(OperationKind::Set) => "SetValueOperation",
        DescriptorKind::Operation(OperationKind::Activate) => "ActivateOperation",
        DescriptorKind::Operation(OperationKind::SetContext) => "SetContextStateOperation",
        DescriptorKind::Operation(OperationKind::SetAlert) => "SetAlertStateOperation",
        DescriptorKind::Operation(OperationKind::SetComponent) => "SetComponentStateOperation",
        DescriptorKind::Operation(OperationKind::SetString) => "SetStringOperation",
        DescriptorKind::Alert(AlertKind::System) => "AlertSystem",
        DescriptorKind::Alert(AlertKind::Condition) => "AlertCondition",
        DescriptorKind::Alert(AlertKind::Signal) => "AlertSignal",
        DescriptorKind::Sco => "Sco",
        DescriptorKind::Battery => "Battery",
        DescriptorKind::Clock => "Clock",
        DescriptorKind::SystemContext => "SystemContext",
        DescriptorKind::Context(ContextKind::Patient) => "PatientContext",
        DescriptorKind::Context(ContextKind::Location) => "LocationContext",
        DescriptorKind::Context(ContextKind::Ensemble) => "EnsembleContext",
        DescriptorKind::Context(ContextKind::Workflow) => "WorkflowContext",
        DescriptorKind::Context(ContextKind::Means) => "MeansContext",
        DescriptorKind::Context(ContextKind::Operator) => "OperatorContext",
    }
}

fn descriptor_kind_from_name(name: &str) -> Option<DescriptorKind> {
    Some(match name {
        "Mds" => DescriptorKind::Mds,
        "Vmd" => DescriptorKind::Vmd,
        "Channel" => DescriptorKind::Channel,
        "NumericMetric" => DescriptorKind::Metric(MetricKind::Numeric),
        "StringMetric" => DescriptorKind::Metric(MetricKind::String),
        "EnumStringMetric" => DescriptorKind::Metric(MetricKind::Enum),
        "RealTimeSampleArrayMetric" => DescriptorKind::Metric(MetricKind::RealTimeSample),
        "DistributionSampleArrayMetric" => DescriptorKind::Metric(MetricKind::Distribution),
        "SetValueOperation" => DescriptorKind::Operation(OperationKind::Set),
        "ActivateOperation" => DescriptorKind::Operation(OperationKind::Activate),
        "SetContextStateOperation" => DescriptorKind::Operation(OperationKind::SetContext),
        "SetAlertStateOperation" => DescriptorKind::Operation(OperationKind::SetAlert),
        "SetComponentStateOperation" => DescriptorKind::Operation(OperationKind::SetComponent),
        "SetStringOperation" => DescriptorKind::Operation(OperationKind::SetString),
        "AlertSystem" => DescriptorKind::Alert(AlertKind::System),
        "AlertCondition" => DescriptorKind::Alert(AlertKind::Condition),
        "AlertSignal" => DescriptorKind::Alert(AlertKind::Signal),
        "Sco" => DescriptorKind::Sco,
        "Battery" => DescriptorKind::Battery,
        "Clock" => DescriptorKind::Clock,
        "SystemContext" => DescriptorKind::SystemContext,
        "PatientContext" => DescriptorKind::Context(ContextKind::Patient),
        "LocationContext" => DescriptorKind::Context(ContextKind::Location),
        "EnsembleContext" => DescriptorKind::Context(ContextKind::Ensemble),
        "WorkflowContext" => DescriptorKind::Context(ContextKind::Workflow),
        "MeansContext" => DescriptorKind::Context(ContextKind::Means),
        "OperatorContext" => DescriptorKind::Context(ContextKind::Operator),
        _ => return None,
    })
}

fn activation_name(a: ActivationState) -> &'static str {
    match a {
        ActivationState::On => "On",
        ActivationState::NotReady => "NotRdy",
        ActivationState::StandBy => "StndBy",
        ActivationState::Off => "Off",
        ActivationState::Shutdown => "Shtdn",
        ActivationState::Failure => "Fail",
    }
}

fn activation_from_name(s: &str) -> Option<ActivationState> {
    Some(match s {
        "On" => ActivationState::On,
        "NotRdy" => ActivationState::NotReady,
        "StndBy" => ActivationState::StandBy,
        "Off" => ActivationState::Off,
        "Shtdn" => ActivationState::Shutdown,
        "Fail" => ActivationState::Failure,
        _ => return None,
    })
}

fn validity_from_name(s: &str) -> Option<MeasurementValidity> {
    Some(match s {
        "Vld" => MeasurementValidity::Valid,
        "Inv" => MeasurementValidity::Invalid,
        "Vldated" => MeasurementValidity::Questionable,
        "NA" => MeasurementValidity::NotAvailable,
        "Ong" => MeasurementValidity::CalibrationOngoing,
        _ => return None,
    })
}

fn association_from_name(s: &str) -> Option<ContextAssociation> {
    Some(match s {
        "Assoc" => ContextAssociation::Associated,
        "Dis" => ContextAssociation::Disassociated,
        "No" => ContextAssociation::NoAssociation,
        _ => return None,
    })
}

/// Renders a [`Snapshot`] as the canonical `msg:GetMdibResponse` body (the
/// SOAP envelope itself is the caller's concern — this produces the body
/// XML that goes inside `<soap:Body>`).
pub fn export_snapshot(snapshot: &Snapshot, runtime: &mut Runtime) -> String {
    let pm = runtime.qnames.prefix_for(ns::PM).to_string();
    let msg = runtime.qnames.prefix_for(ns::MSG).to_string();

    let mut descriptors_xml = String::new();
    // deterministic order keeps export diffable across runs
    let mut descriptors: Vec<_> = snapshot.descriptors().collect();
    descriptors.sort_by(|a, b| a.handle.as_str().cmp(b.handle.as_str()));
    for d in &descriptors {
        write_descriptor(&mut descriptors_xml, d, runtime);
    }

    let mut states_xml = String::new();
    let mut states: Vec<_> = snapshot.states().collect();
    states.sort_by(|a, b| a.descriptor.as_str().cmp(b.descriptor.as_str()));
    for s in &states {
        write_state(&mut states_xml, s, runtime);
    }

    format!(
        "<{msg}:GetMdibResponse><{msg}:Mdib {pm}:MdibVersion=\"{}\" {pm}:SequenceId=\"{}\">\
         <{pm}:MdDescription>{descriptors_xml}</{pm}:MdDescription>\
         <{pm}:MdState>{states_xml}</{pm}:MdState>\
         </{msg}:Mdib></{msg}:GetMdibResponse>",
        snapshot.mdib_version,
        escape_attr(&snapshot.sequence_id),
    )
}

/// Renders one descriptor as its `pm:`-qualified element, exactly as it
/// appears inside a `GetMdibResponse`'s `MdDescription`. Exposed so
/// `sdc-provider`'s report delivery can render full `DescriptionReportPart`
/// entries with the same shape instead of duplicating this table.
///
/// Any captured [`Descriptor::extension`] content is re-emitted verbatim
/// after the known `Attr` children, so a parse-then-export round trip
/// preserves schema extension elements this binding doesn't model.
pub fn write_descriptor(buf: &mut String, d: &Arc<Descriptor>, runtime: &mut Runtime) {
    let pm = runtime.qnames.prefix_for(ns::PM).to_string();
    let kind = descriptor_kind_name(d.kind);
    buf.push_str(&format!(
        "<{pm}:{kind} {pm}:Handle=\"{}\" {pm}:DescriptorVersion=\"{}\"",
        escape_attr(d.handle.as_str()),
        d.version
    ));
    if let Some(parent) = &d.parent {
        buf.push_str(&format!(" {pm}:ParentHandle=\"{}\"", escape_attr(parent.as_str())));
    }
    if d.attributes.is_empty() && d.extension.is_empty() {
        buf.push_str("/>");
        return;
    }
    buf.push('>');
    for (name, value) in &d.attributes {
        buf.push_str(&format!(
            "<{pm}:Attr Name=\"{}\">{}</{pm}:Attr>",
            escape_attr(name),
            escape_text(value)
        ));
    }
    for raw in &d.extension {
        buf.push_str(&raw.to_xml_string(runtime));
    }
    buf.push_str(&format!("</{pm}:{kind}>"));
}

/// Renders one state as its `pm:`-qualified element. Exposed for the same
/// reason as [`write_descriptor`] — `sdc-provider`'s report parts carry full
/// state values, not just handle/version, so a mirror can apply them
/// without a round trip back to `GetMdib`.
///
/// Any captured [`State::extension`] content is re-emitted verbatim after
/// the value's own children, so a parse-then-export round trip preserves
/// schema extension elements this binding doesn't model.
pub fn write_state(buf: &mut String, s: &Arc<State>, runtime: &mut Runtime) {
    let pm = runtime.qnames.prefix_for(ns::PM).to_string();
    let tag = state_tag(&s.value);
    buf.push_str(&format!(
        "<{pm}:{tag} {pm}:DescriptorHandle=\"{}\" {pm}:StateVersion=\"{}\"",
        escape_attr(s.descriptor.as_str()),
        s.version
    ));
    if let Some(instance) = &s.instance {
        buf.push_str(&format!(" {pm}:Handle=\"{}\"", escape_attr(instance.as_str())));
    }
    match &s.value {
        StateValue::Metric {
            measured_value,
            string_value,
            validity,
            presentation_time_ms,
            activation,
        } => {
            buf.push_str(&format!(" {pm}:ActivationState=\"{}\"", activation_name(*activation)));
            buf.push('>');
            if let Some(v) = measured_value {
                buf.push_str(&format!(
                    "<{pm}:MetricValue Value=\"{v}\" Validity=\"{}\"",
                    validity_name(*validity)
                ));
                if let Some(t) = presentation_time_ms {
                    buf.push_str(&format!(" DeterminationTime=\"{t}\""));
                }
                buf.push_str("/>");
            }
            if let Some(sv) = string_value {
                buf.push_str(&format!("<{pm}:StringValue>{}</{pm}:StringValue>", escape_text(sv)));
            }
            for raw in &s.extension {
                buf.push_str(&raw.to_xml_string(runtime));
            }
            buf.push_str(&format!("</{pm}:{tag}>"));
        }
        StateValue::Alert {
            presence,
            acknowledged,
            activation,
        } => {
            buf.push_str(&format!(
                " {pm}:ActivationState=\"{}\" {pm}:Presence=\"{}\" {pm}:Acknowledged=\"{}\"",
                activation_name(*activation),
                presence,
                acknowledged
            ));
            if s.extension.is_empty() {
                buf.push_str("/>");
            } else {
                buf.push('>');
                for raw in &s.extension {
                    buf.push_str(&raw.to_xml_string(runtime));
                }
                buf.push_str(&format!("</{pm}:{tag}>"));
            }
        }
        StateValue::Operation { activation } | StateValue::Component { activation } => {
            buf.push_str(&format!(" {pm}:ActivationState=\"{}\"", activation_name(*activation)));
            if s.extension.is_empty() {
                buf.push_str("/>");
            } else {
                buf.push('>');
                for raw in &s.extension {
                    buf.push_str(&raw.to_xml_string(runtime));
                }
                buf.push_str(&format!("</{pm}:{tag}>"));
            }
        }
        StateValue::Context {
            association,
            identifications,
        } => {
            buf.push_str(&format!(" {pm}:ContextAssociation=\"{}\"", association_name(*association)));
            if identifications.is_empty() && s.extension.is_empty() {
                buf.push_str("/>");
            } else {
                buf.push('>');
                for (root, extension) in identifications {
                    buf.push_str(&format!(
                        "<{pm}:Identification Root=\"{}\" Extension=\"{}\"/>",
                        escape_attr(root),
                        escape_attr(extension)
                    ));
                }
                for raw in &s.extension {
                    buf.push_str(&raw.to_xml_string(runtime));
                }
                buf.push_str(&format!("</{pm}:{tag}>"));
            }
        }
        StateValue::Generic { attributes } => {
            if attributes.is_empty() && s.extension.is_empty() {
                buf.push_str("/>");
            } else {
                buf.push('>');
                for (name, value) in attributes {
                    buf.push_str(&format!(
                        "<{pm}:Attr Name=\"{}\">{}</{pm}:Attr>",
                        escape_attr(name),
                        escape_text(value)
                    ));
                }
                for raw in &s.extension {
                    buf.push_str(&raw.to_xml_string(runtime));
                }
                buf.push_str(&format!("</{pm}:{tag}>"));
            }
        }
    }
}

fn state_tag(v: &StateValue) -> &'static str {
    match v {
        StateValue::Metric { .. } => "MetricState",
        StateValue::Alert { .. } => "AlertState",
        StateValue::Operation { .. } => "OperationState",
        StateValue::Component { .. } => "ComponentState",
        StateValue::Context { .. } => "ContextState",
        StateValue::Generic { .. } => "GenericState",
    }
}

fn validity_name(v: MeasurementValidity) -> &'static str {
    match v {
        MeasurementValidity::Valid => "Vld",
        MeasurementValidity::Invalid => "Inv",
        MeasurementValidity::Questionable => "Vldated",
        MeasurementValidity::NotAvailable => "NA",
        MeasurementValidity::CalibrationOngoing => "Ong",
    }
}

fn association_name(a: ContextAssociation) -> &'static str {
    match a {
        ContextAssociation::Associated => "Assoc",
        ContextAssociation::Disassociated => "Dis",
        ContextAssociation::NoAssociation => "No",
    }
}

/// Replaces `root`'s entire contents from a previously exported snapshot's
/// descriptor/state set. Used for provider bootstrap from a seed document
/// and for rebuilding a consumer mirror after a sequence id change.
/// Does not parse XML itself — that's `sdc-xml`'s job one layer up;
/// this takes the already-decoded descriptor/state vectors so the two
/// directions of the export/import pair stay symmetric without pulling a
/// full BICEPS schema reader into this crate.
pub fn import_snapshot(
    root: &MdibRoot,
    sequence_id: impl Into<Arc<str>>,
    mdib_version: u64,
    descriptors: Vec<Arc<Descriptor>>,
    states: Vec<Arc<State>>,
) {
    root.load_external(sequence_id, mdib_version, descriptors, states);
}

fn find_child<'a>(node: roxmltree::Node<'a, 'a>, local: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|c| c.is_element() && c.tag_name().name() == local)
}

/// Parses a `msg:GetMdibResponse` body — the inverse of [`export_snapshot`]
/// — into the sequence id, MDIB version and decoded descriptor/state
/// vectors [`import_snapshot`] expects. Used by a consumer façade's bootstrap
/// `GetMdib` call and by loading a diagnostic snapshot back off disk.
pub fn parse_mdib_body(xml: &str) -> DecodeResult<(Arc<str>, u64, Vec<Arc<Descriptor>>, Vec<Arc<State>>)> {
    with_root(xml, |root| {
        let mdib = find_child(root, "Mdib").ok_or_else(|| DecodeError::missing("/GetMdibResponse/Mdib"))?;
        let mdib_version = mdib
            .attribute("MdibVersion")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| DecodeError::missing("/Mdib/@MdibVersion"))?;
        let sequence_id = mdib
            .attribute("SequenceId")
            .ok_or_else(|| DecodeError::missing("/Mdib/@SequenceId"))?
            .to_string();

        let md_description = find_child(mdib, "MdDescription").ok_or_else(|| DecodeError::missing("/Mdib/MdDescription"))?;
        let mut descriptors = Vec::new();
        for node in md_description.children().filter(roxmltree::Node::is_element) {
            descriptors.push(Arc::new(parse_descriptor(node)?));
        }

        let md_state = find_child(mdib, "MdState").ok_or_else(|| DecodeError::missing("/Mdib/MdState"))?;
        let mut states = Vec::new();
        for node in md_state.children().filter(roxmltree::Node::is_element) {
            states.push(Arc::new(parse_state(node)?));
        }

        Ok((Arc::from(sequence_id), mdib_version, descriptors, states))
    })
}

fn parse_descriptor(node: roxmltree::Node) -> DecodeResult<Descriptor> {
    let local = node.tag_name().name();
    let kind = descriptor_kind_for_element(local).ok_or_else(|| {
        DecodeError::new(
            DecodeErrorKind::UnexpectedElement,
            format!("/MdDescription/{local}"),
            "unrecognized descriptor element",
        )
    })?;
    let handle = node
        .attribute("Handle")
        .ok_or_else(|| DecodeError::missing(format!("/{local}/@Handle")))?;
    let version = node.attribute("DescriptorVersion").and_then(|v| v.parse().ok()).unwrap_or(0);
    let parent = node.attribute("ParentHandle").map(Handle::from);
    let attributes = node
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "Attr")
        .filter_map(|c| Some((c.attribute("Name")?.to_string(), c.text().unwrap_or("").to_string())))
        .collect();
    let extension = sdc_xml::binding::unknown_children(node, &["Attr"]);
    Ok(Descriptor {
        handle: Handle::from(handle),
        kind,
        parent,
        version,
        attributes,
        extension,
    })
}

fn parse_state(node: roxmltree::Node) -> DecodeResult<State> {
    let local = node.tag_name().name();
    let descriptor = node
        .attribute("DescriptorHandle")
        .ok_or_else(|| DecodeError::missing(format!("/{local}/@DescriptorHandle")))?;
    let version = node.attribute("StateVersion").and_then(|v| v.parse().ok()).unwrap_or(0);
    let instance = node.attribute("Handle").map(crate::handle::InstanceHandle::from);

    let value = match local {
        "MetricState" => {
            let activation = node.attribute("ActivationState").and_then(activation_from_name).unwrap_or(ActivationState::On);
            let (measured_value, validity, presentation_time_ms) = match find_child(node, "MetricValue") {
                Some(mv) => (
                    mv.attribute("Value").and_then(|v| v.parse().ok()),
                    mv.attribute("Validity")
                        .and_then(validity_from_name)
                        .unwrap_or(MeasurementValidity::Valid),
                    mv.attribute("DeterminationTime").and_then(|v| v.parse().ok()),
                ),
                None => (None, MeasurementValidity::Valid, None),
            };
            let string_value = find_child(node, "StringValue").and_then(|n| n.text()).map(str::to_string);
            StateValue::Metric {
                measured_value,
                string_value,
                validity,
                presentation_time_ms,
                activation,
            }
        }
        "AlertState" => StateValue::Alert {
            presence: node.attribute("Presence").map(|v| v == "true").unwrap_or(false),
            acknowledged: node.attribute("Acknowledged").map(|v| v == "true").unwrap_or(false),
            activation: node.attribute("ActivationState").and_then(activation_from_name).unwrap_or(ActivationState::On),
        },
        "OperationState" => StateValue::Operation {
            activation: node.attribute("ActivationState").and_then(activation_from_name).unwrap_or(ActivationState::On),
        },
        "ComponentState" => StateValue::Component {
            activation: node.attribute("ActivationState").and_then(activation_from_name).unwrap_or(ActivationState::On),
        },
        "ContextState" => {
            let association = node
                .attribute("ContextAssociation")
                .and_then(association_from_name)
                .unwrap_or(ContextAssociation::NoAssociation);
            let identifications = node
                .children()
                .filter(|c| c.is_element() && c.tag_name().name() == "Identification")
                .filter_map(|c| Some((c.attribute("Root")?.to_string(), c.attribute("Extension")?.to_string())))
                .collect();
            StateValue::Context {
                association,
                identifications,
            }
        }
        "GenericState" => StateValue::Generic {
            attributes: node
                .children()
                .filter(|c| c.is_element() && c.tag_name().name() == "Attr")
                .filter_map(|c| Some((c.attribute("Name")?.to_string(), c.text().unwrap_or("").to_string())))
                .collect(),
        },
        other => {
            return Err(DecodeError::new(
                DecodeErrorKind::UnexpectedElement,
                format!("/MdState/{other}"),
                "unrecognized state element",
            ))
        }
    };

    let known_children: &[&str] = match local {
        "MetricState" => &["MetricValue", "StringValue"],
        "ContextState" => &["Identification"],
        "GenericState" => &["Attr"],
        _ => &[],
    };
    let extension = sdc_xml::binding::unknown_children(node, known_children);

    Ok(State {
        descriptor: Handle::from(descriptor),
        instance,
        version,
        value,
        extension,
    })
}

/// Parses one `pm:`-qualified descriptor element — the same shape
/// [`parse_mdib_body`] walks inside `MdDescription` — in isolation. Exposed
/// so a consumer mirror can decode a single `DescriptionReportPart` entry
/// without re-implementing the element-name-to-`DescriptorKind` table.
pub fn parse_descriptor_element(node: roxmltree::Node) -> DecodeResult<Descriptor> {
    parse_descriptor(node)
}

/// Parses one `pm:`-qualified state element in isolation. Exposed for the
/// same reason as [`parse_descriptor_element`] — a consumer mirror applies
/// incoming `*ReportPart` state entries one at a time as they're walked out
/// of the report body.
pub fn parse_state_element(node: roxmltree::Node) -> DecodeResult<State> {
    parse_state(node)
}

/// Looks up the [`DescriptorKind`] for an exported element's local name —
/// the inverse of [`descriptor_kind_name`], exposed so a BICEPS XML reader
/// built on top of this crate can project parsed element names back to a
/// typed `DescriptorKind` without duplicating the mapping table.
pub fn descriptor_kind_for_element(local_name: &str) -> Option<DescriptorKind> {
    descriptor_kind_from_name(local_name)
}

/// The inverse of [`activation_name`], exposed for the same reason.
pub fn activation_for_attr(value: &str) -> Option<ActivationState> {
    activation_from_name(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle;
    use crate::mdib::MdibRoot;

    #[test]
    fn export_contains_mdib_version_and_sequence_id() {
        let root = MdibRoot::new("urn:uuid:seq-1");
        let mds = Arc::new(Descriptor::root_mds(Handle::from("mds0")));
        root.publish(1, vec![(Handle::from("mds0"), Some(mds))], vec![]);
        let snap = root.read();

        let mut rt = Runtime::new();
        let xml = export_snapshot(&snap, &mut rt);
        assert!(xml.contains("MdibVersion=\"1\""));
        assert!(xml.contains("SequenceId=\"urn:uuid:seq-1\""));
        assert!(xml.contains("Mds"));
    }

    #[test]
    fn export_round_trips_metric_value_and_validity() {
        let root = MdibRoot::new("urn:uuid:seq-1");
        let mds = Arc::new(Descriptor::root_mds(Handle::from("mds0")));
        let metric = Arc::new(Descriptor::child(
            Handle::from("nm0"),
            DescriptorKind::Metric(MetricKind::Numeric),
            Handle::from("mds0"),
        ));
        let state = Arc::new(State::new(Handle::from("nm0"), StateValue::metric_initial(36.6)));
        root.publish(
            1,
            vec![
                (Handle::from("mds0"), Some(mds)),
                (Handle::from("nm0"), Some(metric)),
            ],
            vec![(state.key(), Some(state))],
        );
        let snap = root.read();
        let mut rt = Runtime::new();
        let xml = export_snapshot(&snap, &mut rt);
        assert!(xml.contains("Value=\"36.6\""));
        assert!(xml.contains("Validity=\"Vld\""));
    }

    #[test]
    fn descriptor_kind_round_trips_through_element_name() {
        for kind in [
            DescriptorKind::Mds,
            DescriptorKind::Metric(MetricKind::Numeric),
            DescriptorKind::Context(ContextKind::Patient),
            DescriptorKind::Alert(AlertKind::Condition),
        ] {
            let name = descriptor_kind_name(kind);
            assert_eq!(descriptor_kind_for_element(name), Some(kind));
        }
    }

    #[test]
    fn parse_descriptor_preserves_unknown_extension_element() {
        let doc = roxmltree::Document::parse(
            r#"<Mds xmlns="urn:test" Handle="mds0" DescriptorVersion="1">
                 <Extension><ext:Vendor xmlns:ext="urn:example:vendor" id="acme"/></Extension>
               </Mds>"#,
        )
        .unwrap();
        let d = parse_descriptor(doc.root_element()).unwrap();
        assert_eq!(d.extension.len(), 1);
        assert_eq!(d.extension[0].name.local, "Extension");

        let mut rt = Runtime::new();
        let mut out = String::new();
        write_descriptor(&mut out, &Arc::new(d), &mut rt);
        assert!(out.contains("Vendor"));
        assert!(out.contains("acme"));
    }

    #[test]
    fn parse_state_preserves_unknown_extension_element() {
        let doc = roxmltree::Document::parse(
            r#"<MetricState xmlns="urn:test" DescriptorHandle="nm0" StateVersion="1" ActivationState="On">
                 <MetricValue Value="1.0" Validity="Vld"/>
                 <Annotation Type="foo"/>
               </MetricState>"#,
        )
        .unwrap();
        let s = parse_state(doc.root_element()).unwrap();
        assert_eq!(s.extension.len(), 1);
        assert_eq!(s.extension[0].name.local, "Annotation");

        let mut rt = Runtime::new();
        let mut out = String::new();
        write_state(&mut out, &Arc::new(s), &mut rt);
        assert!(out.contains("Annotation"));
        assert!(out.contains("MetricValue"));
    }
}
