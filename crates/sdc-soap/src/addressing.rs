// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WS-Addressing 1.0 header block.

use sdc_xml::{DecodeError, DecodeResult};

/// The WS-Addressing headers carried on every SDC SOAP message.
///
/// Message correlation (matching a reply's `RelatesTo` back to the
/// request's `MessageID`) is the transport's job, not this codec's — this
/// type only carries the values; see the SOAP codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addressing {
    pub action: String,
    pub message_id: String,
    pub relates_to: Option<String>,
    pub to: Option<String>,
    pub reply_to: Option<String>,
}

impl Addressing {
    /// A fresh request addressing block; `message_id` should be minted by
    /// the caller (transport layer owns ID generation/correlation state).
    pub fn request(action: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            message_id: message_id.into(),
            relates_to: None,
            to: None,
            reply_to: None,
        }
    }

    /// Builds the addressing block of a reply correlated to `request`.
    pub fn reply_to(request: &Addressing, action: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            message_id: message_id.into(),
            relates_to: Some(request.message_id.clone()),
            to: None,
            reply_to: None,
        }
    }

    pub(crate) fn write_headers(&self, buf: &mut String) {
        buf.push_str("<wsa:Action>");
        buf.push_str(&sdc_xml::writer::escape_text(&self.action));
        buf.push_str("</wsa:Action>");
        buf.push_str("<wsa:MessageID>");
        buf.push_str(&sdc_xml::writer::escape_text(&self.message_id));
        buf.push_str("</wsa:MessageID>");
        if let Some(r) = &self.relates_to {
            buf.push_str("<wsa:RelatesTo>");
            buf.push_str(&sdc_xml::writer::escape_text(r));
            buf.push_str("</wsa:RelatesTo>");
        }
        if let Some(to) = &self.to {
            buf.push_str("<wsa:To>");
            buf.push_str(&sdc_xml::writer::escape_text(to));
            buf.push_str("</wsa:To>");
        }
        if let Some(rt) = &self.reply_to {
            buf.push_str("<wsa:ReplyTo><wsa:Address>");
            buf.push_str(&sdc_xml::writer::escape_text(rt));
            buf.push_str("</wsa:Address></wsa:ReplyTo>");
        }
    }

    pub(crate) fn parse(node: roxmltree::Node) -> DecodeResult<Self> {
        let header = node
            .children()
            .find(|c| c.is_element() && c.tag_name().name() == "Header")
            .ok_or_else(|| DecodeError::missing("/Envelope/Header"))?;

        let find = |local: &str| -> Option<roxmltree::Node> {
            header.children().find(|c| c.is_element() && c.tag_name().name() == local)
        };

        let action = find("Action")
            .and_then(|n| n.text())
            .ok_or_else(|| DecodeError::missing("/Envelope/Header/Action"))?
            .to_string();
        let message_id = find("MessageID")
            .and_then(|n| n.text())
            .ok_or_else(|| DecodeError::missing("/Envelope/Header/MessageID"))?
            .to_string();
        let relates_to = find("RelatesTo").and_then(|n| n.text()).map(str::to_string);
        let to = find("To").and_then(|n| n.text()).map(str::to_string);
        let reply_to = find("ReplyTo")
            .and_then(|n| n.children().find(|c| c.is_element() && c.tag_name().name() == "Address"))
            .and_then(|n| n.text())
            .map(str::to_string);

        Ok(Self {
            action,
            message_id,
            relates_to,
            to,
            reply_to,
        })
    }
}
