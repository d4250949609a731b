// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The `FromXml`/`ToXml` contract that every generated SDC schema binding
//! implements, plus the unknown-extension holder that makes round trips
//! lossless.
//!
//! One small trait pair the rest of the codec (SOAP envelopes, service
//! dispatch) can stay generic over, rather than hand-matching element
//! names at every call site.

use crate::error::DecodeResult;
use crate::qname::{QName, Runtime};
use roxmltree::Node;

/// A verbatim-preserved extension element that this binding did not
/// recognize. Held so `encode(decode(x)) == x` even for schema extension
/// points the reader doesn't model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawElement {
    pub name: QName,
    pub attributes: Vec<(QName, String)>,
    pub text: Option<String>,
    pub children: Vec<RawElement>,
}

impl RawElement {
    /// Captures a `roxmltree` node verbatim, recursing into children.
    pub fn capture(node: Node) -> Self {
        let name = QName::new(
            node.tag_name().namespace().unwrap_or_default(),
            node.tag_name().name(),
        );
        let attributes = node
            .attributes()
            .map(|a| {
                (
                    QName::new(a.namespace().unwrap_or_default(), a.name()),
                    a.value().to_string(),
                )
            })
            .collect();
        let children: Vec<RawElement> = node
            .children()
            .filter(Node::is_element)
            .map(RawElement::capture)
            .collect();
        let text = if children.is_empty() {
            node.text().map(str::to_string)
        } else {
            None
        };
        Self {
            name,
            attributes,
            text,
            children,
        }
    }

    /// Re-serializes the captured element verbatim.
    pub fn to_xml_string(&self, runtime: &mut Runtime) -> String {
        let prefix = runtime.qnames.prefix_for(&self.name.namespace);
        let mut buf = format!("<{prefix}:{}", self.name.local);
        for (attr_name, value) in &self.attributes {
            let _ = std::fmt::Write::write_fmt(
                &mut buf,
                format_args!(" {}=\"{}\"", attr_name.local, crate::writer::escape_attr(value)),
            );
        }
        if self.children.is_empty() && self.text.is_none() {
            buf.push_str("/>");
            return buf;
        }
        buf.push('>');
        if let Some(t) = &self.text {
            buf.push_str(&crate::writer::escape_text(t));
        }
        for child in &self.children {
            buf.push_str(&child.to_xml_string(runtime));
        }
        let _ = std::fmt::Write::write_fmt(&mut buf, format_args!("</{prefix}:{}>", self.name.local));
        buf
    }
}

/// Constructs a binding type from a parsed XML element.
pub trait FromXml: Sized {
    /// The qualified element name this binding decodes.
    fn qname() -> QName;

    fn from_xml(node: Node, runtime: &Runtime) -> DecodeResult<Self>;
}

/// Serializes a binding type back to an XML element.
pub trait ToXml {
    fn to_xml(&self, runtime: &mut Runtime) -> String;
}

/// Reads a single required child element's text content, validating it is
/// present. Used by generated bindings for simple scalar fields.
pub fn required_text<'a>(node: &'a Node, local: &str, xpath: &str) -> DecodeResult<&'a str> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == local)
        .and_then(|c| c.text())
        .ok_or_else(|| crate::error::DecodeError::missing(format!("{xpath}/{local}")))
}

/// Reads an optional child element's text content.
pub fn optional_text<'a>(node: &'a Node, local: &str) -> Option<&'a str> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == local)
        .and_then(|c| c.text())
}

/// Collects every child element this binding did not explicitly consume,
/// keyed by exclusion of a set of known local names.
pub fn unknown_children(node: Node, known: &[&str]) -> Vec<RawElement> {
    node.children()
        .filter(Node::is_element)
        .filter(|c| !known.contains(&c.tag_name().name()))
        .map(RawElement::capture)
        .collect()
}
