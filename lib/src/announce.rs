//! Turns an untrusted enode URL into the registry's announce arguments.
//!
//! The checks run in a fixed order and stop at the first failure:
//! parse, IPv4 form, public routability, ports against the chain id, and
//! finally the key itself.

use crate::crypto::{Address, pubkey_to_address};
use crate::endpoint::{self, EncodedEndpoint, EndpointDescriptor, ParsedEnode};
use crate::error::Rejection;
use std::net::{IpAddr, Ipv4Addr};

/// Validated announcement, ready to be sent to the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announcement {
    /// address derived from the node key
    pub masternode: Address,
    pub endpoint: EncodedEndpoint,
    pub descriptor: EndpointDescriptor,
}

fn ipv4_of(ip: Option<IpAddr>) -> Option<Ipv4Addr> {
    match ip? {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(ip) => ip.to_ipv4_mapped(),
    }
}

pub fn validate_enode(enode: &str, chain_id: u64) -> Result<Announcement, Rejection> {
    let parsed: ParsedEnode = enode
        .trim()
        .parse()
        .map_err(Rejection::MalformedDescriptor)?;

    let ip = ipv4_of(parsed.ip).ok_or(Rejection::NotIpv4)?;

    if !endpoint::is_public(ip) {
        return Err(Rejection::PrivateOrLoopbackAddress);
    }

    if u64::from(parsed.udp_port) != chain_id || u64::from(parsed.tcp_port) != chain_id {
        return Err(Rejection::PortMismatch {
            udp: parsed.udp_port,
            tcp: parsed.tcp_port,
            expected: chain_id,
        });
    }

    let public_key = k256::PublicKey::from_sec1_bytes(&parsed.uncompressed_key())
        .map_err(|_| Rejection::InvalidPublicKey)?;
    let descriptor = EndpointDescriptor {
        ip,
        public_key,
        udp_port: parsed.udp_port,
        tcp_port: parsed.tcp_port,
    };

    Ok(Announcement {
        masternode: pubkey_to_address(&descriptor.public_key),
        endpoint: descriptor.encode(),
        descriptor,
    })
}
