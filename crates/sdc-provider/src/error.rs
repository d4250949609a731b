// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscription and dispatch error taxonomy, following
//! `rpc::error::RpcError`'s shape: a closed enum, manual `Display`, and a
//! `From` edge into `sdc_core::SdcError` so the SOAP boundary has one place
//! that maps an internal error onto a fault sub-code.

use std::fmt;

#[derive(Debug)]
pub enum SubscriptionError {
    UnknownSubscription(String),
    FilterNotSupported(String),
    Expired(String),
    DeliveryFailure(String),
    Overflow(String),
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSubscription(id) => write!(f, "unknown subscription: {id}"),
            Self::FilterNotSupported(detail) => write!(f, "filter not supported: {detail}"),
            Self::Expired(id) => write!(f, "subscription expired: {id}"),
            Self::DeliveryFailure(detail) => write!(f, "delivery failure: {detail}"),
            Self::Overflow(id) => write!(f, "subscription queue overflow: {id}"),
        }
    }
}

impl std::error::Error for SubscriptionError {}

pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

#[derive(Debug)]
pub enum DispatchError {
    ActionNotSupported(String),
    Transaction(sdc_core::TransactionError),
    Subscription(SubscriptionError),
    Decode(sdc_xml::DecodeError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActionNotSupported(action) => write!(f, "action not supported: {action}"),
            Self::Transaction(e) => write!(f, "transaction error: {e}"),
            Self::Subscription(e) => write!(f, "subscription error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<sdc_core::TransactionError> for DispatchError {
    fn from(e: sdc_core::TransactionError) -> Self {
        Self::Transaction(e)
    }
}

impl From<SubscriptionError> for DispatchError {
    fn from(e: SubscriptionError) -> Self {
        Self::Subscription(e)
    }
}

impl From<sdc_xml::DecodeError> for DispatchError {
    fn from(e: sdc_xml::DecodeError) -> Self {
        Self::Decode(e)
    }
}

/// Maps an internal error to the SOAP fault sub-code the error taxonomy assigns it —
/// the single conversion point the dispatch layer's HTTP handler calls
/// before writing a `soap:Fault` body.
pub fn to_soap_fault(err: &DispatchError) -> sdc_soap::fault::SoapFault {
    use sdc_core::TransactionErrorKind as TK;
    use sdc_soap::fault::{FaultCode, SdcSubcode, SoapFault};

    match err {
        DispatchError::ActionNotSupported(action) => SoapFault::action_not_supported(action),
        DispatchError::Decode(e) => SoapFault::new(FaultCode::Sender, e.to_string()),
        DispatchError::Subscription(e) => SoapFault::with_subcode(
            FaultCode::Receiver,
            SdcSubcode::OperationInvokedReportMissing,
            e.to_string(),
        ),
        DispatchError::Transaction(e) => match e.kind {
            TK::UnknownHandle => SoapFault::with_subcode(FaultCode::Sender, SdcSubcode::InvalidHandle, e.to_string()),
            TK::HandleCollision | TK::TypeMismatch | TK::InvariantViolation => {
                SoapFault::with_subcode(FaultCode::Sender, SdcSubcode::InvalidState, e.to_string())
            }
        },
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
