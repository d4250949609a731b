// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parses a complete XML document and exposes its root element.

use crate::error::{DecodeError, DecodeResult};
use roxmltree::{Document, Node};

/// Parses `xml` and hands the root element to `f`.
///
/// Keeping the `roxmltree::Document` alive only for the duration of the
/// closure avoids binding types that borrow from it outliving the parse —
/// every `FromXml` impl is expected to copy out what it needs (handles,
/// `Arc<str>`, owned `String`s) rather than storing `Node` borrows.
pub fn with_root<T>(xml: &str, f: impl FnOnce(Node) -> DecodeResult<T>) -> DecodeResult<T> {
    let doc = Document::parse(xml)?;
    f(doc.root_element())
}

/// Validates a numeric attribute/element falls within `[min, max]`,
/// surfacing `SchemaViolation` on failure.
pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    value: T,
    min: T,
    max: T,
    xpath: &str,
) -> DecodeResult<T> {
    if value < min || value > max {
        return Err(DecodeError::schema_violation(
            xpath,
            format!("value {value} out of range [{min}, {max}]"),
        ));
    }
    Ok(value)
}

/// Validates a value is one of a closed enumeration.
pub fn validate_enum<'a>(value: &'a str, allowed: &[&str], xpath: &str) -> DecodeResult<&'a str> {
    if allowed.contains(&value) {
        Ok(value)
    } else {
        Err(DecodeError::schema_violation(
            xpath,
            format!("value '{value}' not in {allowed:?}"),
        ))
    }
}
