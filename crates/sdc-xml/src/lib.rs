// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sdc-xml — XML binding layer
//!
//! Maps IEEE 11073 SDC (BICEPS/WS-*) schema types to and from in-memory
//! typed records. Namespaces are tracked by [`QName`](qname::QName);
//! elements this crate's bindings don't recognize are preserved verbatim in
//! a [`RawElement`](binding::RawElement) holder so round-trip serialization
//! never silently drops extension content.
//!
//! Numeric and enumerated fields are validated against schema constraints
//! at construction time; violations surface as
//! [`DecodeError`](error::DecodeError) with `kind =
//! SchemaViolation` and an XPath-shaped locator.

pub mod binding;
pub mod error;
pub mod qname;
pub mod reader;
pub mod writer;

pub use binding::{FromXml, RawElement, ToXml};
pub use error::{DecodeError, DecodeErrorKind, DecodeResult};
pub use qname::{QName, QNameTable, Runtime};

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn qname_table_binds_known_namespaces_on_construction() {
        let mut t = QNameTable::new();
        assert_eq!(t.prefix_for(qname::ns::MSG).as_ref(), "msg");
        assert_eq!(t.prefix_for(qname::ns::PM).as_ref(), "pm");
    }

    #[test]
    fn qname_table_mints_fresh_prefixes_for_unknown_namespaces() {
        let mut t = QNameTable::new();
        let p1 = t.prefix_for("urn:example:ext1");
        let p2 = t.prefix_for("urn:example:ext2");
        assert_ne!(p1, p2);
        // stable on repeat lookup
        assert_eq!(t.prefix_for("urn:example:ext1"), p1);
    }

    #[test]
    fn raw_element_round_trips_unknown_extension_content() {
        let xml = r#"<ext:Foo xmlns:ext="urn:example:ext"><ext:Bar attr="1">text</ext:Bar></ext:Foo>"#;
        let doc = Document::parse(xml).unwrap();
        let raw = RawElement::capture(doc.root_element());
        assert_eq!(raw.name.local.as_ref(), "Foo");
        assert_eq!(raw.children.len(), 1);
        assert_eq!(raw.children[0].text.as_deref(), Some("text"));

        let mut rt = Runtime::new();
        let serialized = raw.to_xml_string(&mut rt);
        // re-parse to confirm it's well-formed and structurally equivalent
        let reparsed_doc = Document::parse(&serialized).unwrap();
        let reparsed = RawElement::capture(reparsed_doc.root_element());
        assert_eq!(reparsed.name.local, raw.name.local);
        assert_eq!(reparsed.children.len(), raw.children.len());
    }

    #[test]
    fn validate_range_rejects_out_of_bounds_value() {
        let err = reader::validate_range(300.0_f64, -50.0, 250.0, "/pm:Value").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::SchemaViolation);
        assert_eq!(err.xpath, "/pm:Value");
    }

    #[test]
    fn validate_enum_accepts_member_and_rejects_outsider() {
        assert!(reader::validate_enum("On", &["On", "Off", "StandBy"], "/x").is_ok());
        assert!(reader::validate_enum("Maybe", &["On", "Off", "StandBy"], "/x").is_err());
    }

    #[test]
    fn text_escaping_handles_reserved_characters() {
        let escaped = writer::escape_text("a < b & c > d");
        assert_eq!(escaped, "a &lt; b &amp; c &gt; d");
        let attr = writer::escape_attr("say \"hi\" & bye");
        assert_eq!(attr, "say &quot;hi&quot; &amp; bye");
    }
}
