// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consumer-side error taxonomy. Composes over the same component errors
//! `sdc-core::error::SdcError` already unifies, plus the transport- and
//! eventing-specific failures a consumer's own call sites see that a
//! provider never does (a failed `GetMdib`, a rejected `Subscribe`).

use std::fmt;

/// Everything that can go wrong performing a consumer-side operation.
/// Closed set, one variant per component error source plus the
/// not-otherwise-classifiable response shapes a consumer has to reject.
#[derive(Debug)]
pub enum ConsumerError {
    Transport(sdc_transport::TransportError),
    Decode(sdc_xml::DecodeError),
    Fault(sdc_soap::SoapFault),
    Transaction(sdc_core::TransactionError),
    VersionGap(sdc_core::VersionGap),
    Discovery(sdc_discovery::DiscoveryError),
    /// The peer returned a SOAP fault body where a success response was
    /// expected, but it didn't decode as a well-formed [`sdc_soap::SoapFault`]
    /// either — the response is simply not usable.
    UnexpectedResponse(String),
}

impl fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerError::Transport(e) => write!(f, "{e}"),
            ConsumerError::Decode(e) => write!(f, "{e}"),
            ConsumerError::Fault(e) => write!(f, "{e}"),
            ConsumerError::Transaction(e) => write!(f, "{e}"),
            ConsumerError::VersionGap(e) => write!(f, "{e}"),
            ConsumerError::Discovery(e) => write!(f, "{e}"),
            ConsumerError::UnexpectedResponse(detail) => write!(f, "unexpected response: {detail}"),
        }
    }
}

impl std::error::Error for ConsumerError {}

impl From<sdc_transport::TransportError> for ConsumerError {
    fn from(e: sdc_transport::TransportError) -> Self {
        ConsumerError::Transport(e)
    }
}

impl From<sdc_xml::DecodeError> for ConsumerError {
    fn from(e: sdc_xml::DecodeError) -> Self {
        ConsumerError::Decode(e)
    }
}

impl From<sdc_soap::SoapFault> for ConsumerError {
    fn from(e: sdc_soap::SoapFault) -> Self {
        ConsumerError::Fault(e)
    }
}

impl From<sdc_core::TransactionError> for ConsumerError {
    fn from(e: sdc_core::TransactionError) -> Self {
        ConsumerError::Transaction(e)
    }
}

impl From<sdc_core::VersionGap> for ConsumerError {
    fn from(e: sdc_core::VersionGap) -> Self {
        ConsumerError::VersionGap(e)
    }
}

impl From<sdc_discovery::DiscoveryError> for ConsumerError {
    fn from(e: sdc_discovery::DiscoveryError) -> Self {
        ConsumerError::Discovery(e)
    }
}

pub type ConsumerResult<T> = Result<T, ConsumerError>;
