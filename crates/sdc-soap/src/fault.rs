// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOAP 1.2 faults, including the SDC-specific sub-codes from the error taxonomy.

use std::fmt;

/// Top-level SOAP 1.2 fault code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    Sender,
    Receiver,
    MustUnderstand,
    VersionMismatch,
}

impl FaultCode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Sender => "soap:Sender",
            Self::Receiver => "soap:Receiver",
            Self::MustUnderstand => "soap:MustUnderstand",
            Self::VersionMismatch => "soap:VersionMismatch",
        }
    }
}

/// SDC-specific fault sub-codes layered under a `FaultCode`, per the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdcSubcode {
    InvalidHandle,
    InvalidState,
    OperationInvokedReportMissing,
    ActionNotSupported,
}

impl SdcSubcode {
    fn as_str(self) -> &'static str {
        match self {
            Self::InvalidHandle => "sdc:InvalidHandle",
            Self::InvalidState => "sdc:InvalidState",
            Self::OperationInvokedReportMissing => "sdc:OperationInvokedReportMissing",
            Self::ActionNotSupported => "sdc:ActionNotSupported",
        }
    }
}

/// A decoded or to-be-encoded SOAP fault.
#[derive(Debug, Clone)]
pub struct SoapFault {
    pub code: FaultCode,
    pub subcode: Option<SdcSubcode>,
    pub reason: String,
}

impl SoapFault {
    pub fn new(code: FaultCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            subcode: None,
            reason: reason.into(),
        }
    }

    pub fn with_subcode(code: FaultCode, subcode: SdcSubcode, reason: impl Into<String>) -> Self {
        Self {
            code,
            subcode: Some(subcode),
            reason: reason.into(),
        }
    }

    pub fn not_understood(header_qname: &str) -> Self {
        Self::new(
            FaultCode::MustUnderstand,
            format!("mandatory header '{header_qname}' not understood"),
        )
    }

    pub fn action_not_supported(action: &str) -> Self {
        Self::with_subcode(
            FaultCode::Sender,
            SdcSubcode::ActionNotSupported,
            format!("action '{action}' is not dispatched by this endpoint"),
        )
    }

    pub(crate) fn write_body(&self, buf: &mut String) {
        buf.push_str("<soap:Fault><soap:Code><soap:Value>");
        buf.push_str(self.code.as_str());
        buf.push_str("</soap:Value>");
        if let Some(sc) = self.subcode {
            buf.push_str("<soap:Subcode><soap:Value>");
            buf.push_str(sc.as_str());
            buf.push_str("</soap:Value></soap:Subcode>");
        }
        buf.push_str("</soap:Code><soap:Reason><soap:Text xml:lang=\"en\">");
        buf.push_str(&sdc_xml::writer::escape_text(&self.reason));
        buf.push_str("</soap:Text></soap:Reason></soap:Fault>");
    }
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code.as_str())?;
        if let Some(sc) = self.subcode {
            write!(f, "/{}", sc.as_str())?;
        }
        write!(f, ": {}", self.reason)
    }
}

impl std::error::Error for SoapFault {}
