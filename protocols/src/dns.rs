use anyhow::Context;
use dns_parser::{Packet, ResponseCode};
use pnet::packet::dns::{DnsClass, DnsQuery, DnsTypes, MutableDnsPacket, Opcode, Retcode};
use thiserror::Error;

pub const DNS_HDR_LEN: usize = 12;
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

#[derive(Debug, Error)]
pub enum DnsWireError {
    #[error("invalid query name '{0}'")]
    InvalidName(String),

    #[error("malformed dns response: {0}")]
    Malformed(String),
}

/// What the probe needs from a resolver's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsReply {
    pub id: u16,
    pub is_response: bool,
    pub rcode: String,
    pub answers: usize,
}

/// Builds a recursive A-record query for `qname` with transaction `id`.
pub fn create_query_packet(qname: &str, id: u16) -> anyhow::Result<Vec<u8>> {
    let query: DnsQuery = create_a_query(qname)?;
    let q_fixed_len: usize = 4;
    let qlen: usize = query.qname.len() + q_fixed_len;
    let total: usize = DNS_HDR_LEN + qlen;
    let mut buffer: Vec<u8> = vec![0u8; total];

    {
        let mut dns: MutableDnsPacket =
            MutableDnsPacket::new(&mut buffer).context("creating dns header")?;
        dns.set_id(id);
        dns.set_is_response(0);
        dns.set_opcode(Opcode::StandardQuery);
        dns.set_is_authoriative(0);
        dns.set_is_truncated(0);
        dns.set_is_recursion_desirable(1);
        dns.set_is_recursion_available(0);
        dns.set_zero_reserved(0);
        dns.set_is_non_authenticated_data(0);
        dns.set_rcode(Retcode::NoError);
        dns.set_query_count(1);
        dns.set_response_count(0);
        dns.set_authority_rr_count(0);
        dns.set_additional_rr_count(0);
    }

    let mut cursor: usize = DNS_HDR_LEN;

    buffer[cursor..cursor + query.qname.len()].copy_from_slice(&query.qname);
    cursor += query.qname.len();

    buffer[cursor..cursor + 2].copy_from_slice(&query.qtype.0.to_be_bytes());
    cursor += 2;

    buffer[cursor..cursor + 2].copy_from_slice(&query.qclass.0.to_be_bytes());

    Ok(buffer)
}

/// Parses a resolver datagram far enough to match it to a query.
pub fn parse_reply(payload: &[u8]) -> Result<DnsReply, DnsWireError> {
    let packet = Packet::parse(payload).map_err(|e| DnsWireError::Malformed(e.to_string()))?;
    let rcode = match packet.header.response_code {
        ResponseCode::NoError => "NOERROR".to_string(),
        ResponseCode::NameError => "NXDOMAIN".to_string(),
        ResponseCode::ServerFailure => "SERVFAIL".to_string(),
        ResponseCode::Refused => "REFUSED".to_string(),
        other => format!("{other:?}"),
    };

    Ok(DnsReply {
        id: packet.header.id,
        is_response: !packet.header.query,
        rcode,
        answers: packet.answers.len(),
    })
}

fn create_a_query(qname: &str) -> Result<DnsQuery, DnsWireError> {
    let qname: Vec<u8> = encode_dns_name(qname)?;
    Ok(DnsQuery {
        qname,
        qtype: DnsTypes::A,
        qclass: DnsClass(1),
        payload: Vec::new(),
    })
}

fn encode_dns_name(name: &str) -> Result<Vec<u8>, DnsWireError> {
    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() || trimmed.len() > MAX_NAME_LEN {
        return Err(DnsWireError::InvalidName(name.to_string()));
    }

    let mut encoded: Vec<u8> = Vec::with_capacity(trimmed.len() + 2);
    for label in trimmed.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN || !label.is_ascii() {
            return Err(DnsWireError::InvalidName(name.to_string()));
        }
        encoded.push(label.len() as u8);
        encoded.extend_from_slice(label.as_bytes());
    }
    encoded.push(0);
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_packet_round_trips_through_parser() {
        let bytes = create_query_packet("example.com", 0xBEEF).unwrap();
        assert_eq!(bytes.len(), DNS_HDR_LEN + 13 + 4);

        let packet = Packet::parse(&bytes).unwrap();
        assert_eq!(packet.header.id, 0xBEEF);
        assert!(packet.header.query);
        assert!(packet.header.recursion_desired);
        assert_eq!(packet.questions.len(), 1);
        assert_eq!(packet.questions[0].qname.to_string(), "example.com");
    }

    #[test]
    fn trailing_dot_is_accepted() {
        let a = create_query_packet("example.com.", 1).unwrap();
        let b = create_query_packet("example.com", 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bad_names_are_rejected() {
        assert!(create_query_packet("", 1).is_err());
        assert!(create_query_packet("a..b", 1).is_err());
        assert!(create_query_packet(&"x".repeat(64), 1).is_err());
    }

    #[test]
    fn reply_header_is_extracted() {
        let mut bytes = create_query_packet("example.com", 7).unwrap();
        // QR bit and RCODE=3 (NXDOMAIN)
        bytes[2] |= 0x80;
        bytes[3] |= 0x03;

        let reply = parse_reply(&bytes).unwrap();
        assert_eq!(reply.id, 7);
        assert!(reply.is_response);
        assert_eq!(reply.rcode, "NXDOMAIN");
        assert_eq!(reply.answers, 0);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_reply(&[0x01, 0x02, 0x03]),
            Err(DnsWireError::Malformed(_))
        ));
    }
}
