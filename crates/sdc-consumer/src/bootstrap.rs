// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `GetMdib` bootstrap: the one round trip that seeds a fresh
//! [`crate::mirror::Mirror`] and the one a stale mirror re-issues after a
//! version gap or sequence id change.

use std::time::Duration;

use sdc_soap::{Addressing, Envelope};
use sdc_transport::client::{HttpClientPool, SoapRequest};
use sdc_transport::deadline::Deadline;
use sdc_xml::Runtime;

use crate::error::{ConsumerError, ConsumerResult};

/// The SOAP action a `GetMdib` request is addressed with, matching
/// `sdc-provider::dispatch::SoapAction::GetMdib::as_str()` without taking a
/// dependency on that crate just for one string constant.
pub const GET_MDIB_ACTION: &str =
    "http://standards.ieee.org/11073/20701/2018/MdibReportingService/GetMdib";

/// The decoded, still-unparsed result of a `GetMdib` call: the raw
/// `GetMdibResponse` body, ready for `sdc_core::snapshot::parse_mdib_body`.
pub struct MdibDocument {
    pub body_xml: String,
}

/// Issues `GetMdib` against a provider's service endpoint and returns the
/// decoded response body. Callers feed the result to
/// `sdc_core::snapshot::parse_mdib_body` and then
/// `sdc_core::mdib::MdibRoot::load_external` — this module only owns the
/// wire round trip, not MDIB construction, so it stays usable from
/// `sdcctl` for a one-shot snapshot dump as well as from
/// [`crate::mirror::Mirror::bootstrap`].
pub async fn get_mdib(
    client_pool: &HttpClientPool,
    endpoint: &str,
    request_timeout: Duration,
) -> ConsumerResult<MdibDocument> {
    let mut runtime = Runtime::new();
    let addressing = Addressing::request(GET_MDIB_ACTION, sdc_soap::new_message_id());
    let xml = Envelope::new(addressing, "<msg:GetMdib/>").encode(&mut runtime);

    let request = SoapRequest {
        url: endpoint.to_string(),
        soap_action: GET_MDIB_ACTION.to_string(),
        body_xml: xml,
    };
    let response = client_pool.send(request, Deadline::after(request_timeout)).await?;

    let envelope = Envelope::decode(&response.body_xml)?;
    if envelope.is_fault() {
        return Err(ConsumerError::UnexpectedResponse(format!(
            "GetMdib to {endpoint} returned a fault: {}",
            envelope.body_xml
        )));
    }
    if response.status >= 300 {
        return Err(ConsumerError::UnexpectedResponse(format!(
            "GetMdib to {endpoint} returned HTTP {}",
            response.status
        )));
    }

    Ok(MdibDocument {
        body_xml: envelope.body_xml,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_mdib_action_matches_reporting_service_namespace() {
        assert!(GET_MDIB_ACTION.starts_with("http://standards.ieee.org/11073/20701/2018/"));
        assert!(GET_MDIB_ACTION.ends_with("GetMdib"));
    }
}
