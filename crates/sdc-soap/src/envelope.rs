// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOAP 1.2 envelope encode/decode.
//!
//! The codec is stateless: it never remembers a request to match a later
//! reply. Correlation state (pending request → awaited reply) lives in the
//! transport layer's client pool, per the SOAP codec.

use crate::addressing::Addressing;
use crate::fault::SoapFault;
use sdc_xml::{qname::ns, DecodeError, DecodeErrorKind, DecodeResult, Runtime};

/// A decoded (or about-to-be-encoded) SOAP envelope.
///
/// `body_xml` is the serialized inner XML of `<soap:Body>` — already
/// namespace-qualified by the caller. Keeping the body as opaque XML here
/// (rather than a typed field) is what lets this crate stay independent of
/// any particular BICEPS message type; typed projection happens one layer
/// up, in the service dispatch and consumer façade.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub addressing: Addressing,
    pub body_xml: String,
    /// Extra header elements carrying `soap:mustUnderstand="true"` that this
    /// peer is expected to recognize by local name. Only used on encode;
    /// decode reports unrecognized ones via [`check_must_understand`].
    pub must_understand_headers: Vec<(String, String)>,
}

impl Envelope {
    pub fn new(addressing: Addressing, body_xml: impl Into<String>) -> Self {
        Self {
            addressing,
            body_xml: body_xml.into(),
            must_understand_headers: Vec::new(),
        }
    }

    /// Encodes the full SOAP envelope as a UTF-8 XML document.
    pub fn encode(&self, runtime: &mut Runtime) -> String {
        let mut buf = String::with_capacity(512 + self.body_xml.len());
        buf.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        buf.push_str(r#"<soap:Envelope xmlns:soap=""#);
        buf.push_str(ns::SOAP12);
        buf.push_str(r#"" xmlns:wsa=""#);
        buf.push_str(ns::WSA);
        buf.push_str(r#"" xmlns:wsd=""#);
        buf.push_str(ns::WSD);
        buf.push_str(r#"" xmlns:wse=""#);
        buf.push_str(ns::WSE);
        buf.push_str(r#"" xmlns:msg=""#);
        buf.push_str(ns::MSG);
        buf.push_str(r#"" xmlns:pm=""#);
        buf.push_str(ns::PM);
        buf.push_str(r#"">"#);
        // touch the runtime so callers that pre-bind extension prefixes see
        // them reflected if/when extension content is spliced into body_xml
        let _ = runtime.qnames.prefix_for(ns::SOAP12);
        buf.push_str("<soap:Header>");
        self.addressing.write_headers(&mut buf);
        for (local, value) in &self.must_understand_headers {
            let _ = std::fmt::Write::write_fmt(
                &mut buf,
                format_args!(
                    "<sdc:{local} soap:mustUnderstand=\"true\">{}</sdc:{local}>",
                    sdc_xml::writer::escape_text(value)
                ),
            );
        }
        buf.push_str("</soap:Header>");
        buf.push_str("<soap:Body>");
        buf.push_str(&self.body_xml);
        buf.push_str("</soap:Body>");
        buf.push_str("</soap:Envelope>");
        buf
    }

    /// Decodes a full SOAP envelope. The body is returned as the raw inner
    /// XML text of `<soap:Body>` for the caller to project into a typed
    /// message.
    pub fn decode(xml: &str) -> DecodeResult<Self> {
        sdc_xml::reader::with_root(xml, |root| {
            if root.tag_name().name() != "Envelope" {
                return Err(DecodeError::new(
                    DecodeErrorKind::UnexpectedElement,
                    "/",
                    format!("expected soap:Envelope, found {}", root.tag_name().name()),
                ));
            }
            let addressing = Addressing::parse(root)?;
            let body = root
                .children()
                .find(|c| c.is_element() && c.tag_name().name() == "Body")
                .ok_or_else(|| DecodeError::missing("/Envelope/Body"))?;
            let body_xml: String = body
                .children()
                .filter(|c| c.is_element())
                .map(|c| c.document().input_text()[c.range()].to_string())
                .collect::<Vec<_>>()
                .join("");
            Ok(Self {
                addressing,
                body_xml,
                must_understand_headers: Vec::new(),
            })
        })
    }

    /// Returns `true` if `<soap:Body>` holds a `<soap:Fault>` element.
    pub fn is_fault(&self) -> bool {
        self.body_xml.trim_start().starts_with("<soap:Fault")
    }
}

/// Encodes a SOAP fault as a full envelope, addressed as the reply to
/// `request`.
pub fn encode_fault(request: &Addressing, fault: &SoapFault, runtime: &mut Runtime) -> String {
    let mut body = String::new();
    fault.write_body(&mut body);
    let addressing = Addressing::reply_to(
        request,
        "http://www.w3.org/2005/08/addressing/fault",
        format!("urn:uuid:{}", crate::correlation::new_message_id()),
    );
    Envelope::new(addressing, body).encode(runtime)
}

/// Validates that every header element flagged `soap:mustUnderstand="true"`
/// in the raw XML is among `known_local_names`; the first unrecognized one
/// (if any) is returned as a `MustUnderstand` fault per the SOAP codec.
pub fn check_must_understand(xml: &str, known_local_names: &[&str]) -> Option<SoapFault> {
    sdc_xml::reader::with_root(xml, |root| {
        let header = root
            .children()
            .find(|c| c.is_element() && c.tag_name().name() == "Header");
        let Some(header) = header else { return Ok(None) };
        for child in header.children().filter(|c| c.is_element()) {
            let flagged = child
                .attribute((sdc_xml::qname::ns::SOAP12, "mustUnderstand"))
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false);
            if flagged && !known_local_names.contains(&child.tag_name().name()) {
                return Ok(Some(SoapFault::not_understood(child.tag_name().name())));
            }
        }
        Ok(None)
    })
    .unwrap_or(None)
}
