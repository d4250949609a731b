// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sdc-soap — SOAP 1.2 + WS-Addressing message plane
//!
//! Encodes and decodes SOAP envelopes carrying WS-Addressing headers
//! (`Action`, `MessageID`, `RelatesTo`, `To`, `ReplyTo`) and SDC faults. The
//! codec is stateless: see [`envelope::Envelope`] for the encode/decode
//! entry points and [`fault::SoapFault`] for the closed fault taxonomy.

pub mod addressing;
pub mod correlation;
pub mod envelope;
pub mod fault;

pub use addressing::Addressing;
pub use correlation::new_message_id;
pub use envelope::{check_must_understand, encode_fault, Envelope};
pub use fault::{FaultCode, SdcSubcode, SoapFault};

#[cfg(test)]
mod tests {
    use super::*;
    use sdc_xml::Runtime;

    #[test]
    fn envelope_round_trips_addressing_and_body() {
        let addressing = Addressing::request(
            "http://standards.ieee.org/11073/20701/2018/MdibReportingService/GetMdib",
            new_message_id(),
        );
        let env = Envelope::new(addressing.clone(), "<msg:GetMdib/>");
        let mut rt = Runtime::new();
        let xml = env.encode(&mut rt);

        let decoded = Envelope::decode(&xml).unwrap();
        assert_eq!(decoded.addressing.action, addressing.action);
        assert_eq!(decoded.addressing.message_id, addressing.message_id);
        assert!(decoded.body_xml.contains("GetMdib"));
    }

    #[test]
    fn reply_addressing_relates_to_the_request_message_id() {
        let request = Addressing::request("urn:action:req", "urn:uuid:abc");
        let reply = Addressing::reply_to(&request, "urn:action:reply", "urn:uuid:def");
        assert_eq!(reply.relates_to.as_deref(), Some("urn:uuid:abc"));
    }

    #[test]
    fn fault_encodes_with_sdc_subcode() {
        let request = Addressing::request("urn:action:req", "urn:uuid:abc");
        let fault = SoapFault::with_subcode(FaultCode::Sender, SdcSubcode::InvalidHandle, "no such handle 'nm0'");
        let mut rt = Runtime::new();
        let xml = encode_fault(&request, &fault, &mut rt);
        assert!(xml.contains("soap:Fault"));
        assert!(xml.contains("sdc:InvalidHandle"));

        let decoded = Envelope::decode(&xml).unwrap();
        assert!(decoded.is_fault());
    }

    #[test]
    fn unknown_must_understand_header_is_rejected() {
        let xml = r#"<?xml version="1.0"?>
        <soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns:wsa="http://www.w3.org/2005/08/addressing">
          <soap:Header>
            <wsa:Action>urn:action:req</wsa:Action>
            <wsa:MessageID>urn:uuid:1</wsa:MessageID>
            <sdc:Exotic xmlns:sdc="urn:example" soap:mustUnderstand="true">x</sdc:Exotic>
          </soap:Header>
          <soap:Body><msg:GetMdib xmlns:msg="urn:example"/></soap:Body>
        </soap:Envelope>"#;
        let fault = check_must_understand(xml, &["Action", "MessageID"]);
        assert!(fault.is_some());
        assert_eq!(fault.unwrap().code, FaultCode::MustUnderstand);
    }

    #[test]
    fn known_must_understand_header_passes() {
        let xml = r#"<?xml version="1.0"?>
        <soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns:wsa="http://www.w3.org/2005/08/addressing">
          <soap:Header>
            <wsa:Action>urn:action:req</wsa:Action>
            <wsa:MessageID>urn:uuid:1</wsa:MessageID>
          </soap:Header>
          <soap:Body><msg:GetMdib xmlns:msg="urn:example"/></soap:Body>
        </soap:Envelope>"#;
        assert!(check_must_understand(xml, &["Action", "MessageID"]).is_none());
    }

    #[test]
    fn message_ids_are_unique_across_calls() {
        let a = new_message_id();
        let b = new_message_id();
        assert_ne!(a, b);
    }
}
