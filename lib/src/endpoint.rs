//! Masternode endpoint codec.
//!
//! Endpoints are published as enode URLs, `enode://<node id>@<ip>:<tcp>?discport=<udp>`,
//! where the node id is the hex of the 64-byte uncompressed secp256k1 key.
//! On chain the registry stores only the IPv4 address packed into a
//! big-endian `u32` and the 33-byte compressed key spread over two 32-byte
//! words; ports are implied by the chain id.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

pub const ENODE_SCHEME: &str = "enode://";
pub const COMPRESSED_KEY_LEN: usize = 33;
const NODE_ID_LEN: usize = 64;

/// Fixed-width registry form of an endpoint.
///
/// `pubkey[0]` holds bytes 0..32 of the compressed key; the first byte of
/// `pubkey[1]` holds byte 32, the rest of that word is zero.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodedEndpoint {
    pub ipv4: u32,
    pub pubkey: [[u8; 32]; 2],
}

/// Validated endpoint of a masternode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub ip: Ipv4Addr,
    pub public_key: k256::PublicKey,
    pub udp_port: u16,
    pub tcp_port: u16,
}

impl EndpointDescriptor {
    pub fn compressed_key(&self) -> [u8; COMPRESSED_KEY_LEN] {
        let mut out = [0u8; COMPRESSED_KEY_LEN];
        out.copy_from_slice(self.public_key.to_encoded_point(true).as_bytes());
        out
    }

    pub fn encode(&self) -> EncodedEndpoint {
        encode(self.ip, &self.compressed_key())
    }

    /// Rebuild a descriptor from its registry form; both ports are set to `port`.
    pub fn from_encoded(encoded: &EncodedEndpoint, port: u16) -> Option<Self> {
        let mut compressed = [0u8; COMPRESSED_KEY_LEN];
        compressed[..32].copy_from_slice(&encoded.pubkey[0]);
        compressed[32] = encoded.pubkey[1][0];
        let public_key = k256::PublicKey::from_sec1_bytes(&compressed).ok()?;
        Some(EndpointDescriptor {
            ip: Ipv4Addr::from(encoded.ipv4),
            public_key,
            udp_port: port,
            tcp_port: port,
        })
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let point = self.public_key.to_encoded_point(false);
        write!(
            f,
            "{ENODE_SCHEME}{}@{}:{}",
            hex::encode(&point.as_bytes()[1..]),
            self.ip,
            self.tcp_port
        )?;
        if self.udp_port != self.tcp_port {
            write!(f, "?discport={}", self.udp_port)?;
        }
        Ok(())
    }
}

pub fn encode(ip: Ipv4Addr, compressed_key: &[u8; COMPRESSED_KEY_LEN]) -> EncodedEndpoint {
    let mut pubkey = [[0u8; 32]; 2];
    pubkey[0].copy_from_slice(&compressed_key[..32]);
    pubkey[1][0] = compressed_key[32];
    EncodedEndpoint {
        ipv4: u32::from_be_bytes(ip.octets()),
        pubkey,
    }
}

/// Display form of a registry endpoint, or an empty string if the stored
/// key is not a curve point.
pub fn decode(encoded: &EncodedEndpoint, port: u16) -> String {
    EndpointDescriptor::from_encoded(encoded, port)
        .map(|descriptor| descriptor.to_string())
        .unwrap_or_default()
}

/// False for loopback (127/8) and RFC1918 ranges (10/8, 172.16/12, 192.168/16).
pub fn is_public(ip: Ipv4Addr) -> bool {
    !(ip.is_loopback() || ip.is_private())
}

/// Syntactic parse of an enode URL. The node id is only length-checked here;
/// curve validation happens when the announcement is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedEnode {
    /// `None` for an incomplete enode (bare node id without a host)
    pub ip: Option<IpAddr>,
    pub udp_port: u16,
    pub tcp_port: u16,
    pub node_id: [u8; NODE_ID_LEN],
}

impl ParsedEnode {
    /// 65-byte SEC1 uncompressed encoding of the node id.
    pub fn uncompressed_key(&self) -> [u8; NODE_ID_LEN + 1] {
        let mut out = [0u8; NODE_ID_LEN + 1];
        out[0] = 0x04;
        out[1..].copy_from_slice(&self.node_id);
        out
    }
}

fn parse_node_id(id: &str) -> Result<[u8; NODE_ID_LEN], String> {
    let mut node_id = [0u8; NODE_ID_LEN];
    hex::decode_to_slice(id, &mut node_id).map_err(|e| format!("invalid node id: {e}"))?;
    Ok(node_id)
}

impl FromStr for ParsedEnode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let Some(rest) = s.strip_prefix(ENODE_SCHEME) else {
            // a bare hex id is accepted as an incomplete node
            if s.len() == 2 * NODE_ID_LEN {
                return Ok(ParsedEnode {
                    ip: None,
                    udp_port: 0,
                    tcp_port: 0,
                    node_id: parse_node_id(s)?,
                });
            }
            return Err("invalid URL scheme, want \"enode\"".to_string());
        };
        let Some((id, location)) = rest.split_once('@') else {
            return Ok(ParsedEnode {
                ip: None,
                udp_port: 0,
                tcp_port: 0,
                node_id: parse_node_id(rest)?,
            });
        };
        let node_id = parse_node_id(id)?;
        let (host, query) = match location.split_once('?') {
            Some((host, query)) => (host, Some(query)),
            None => (location, None),
        };
        let socket = SocketAddr::from_str(host).map_err(|e| format!("invalid host {host:?}: {e}"))?;
        let tcp_port = socket.port();
        let mut udp_port = tcp_port;
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if let Some(port) = pair.strip_prefix("discport=") {
                udp_port = port
                    .parse()
                    .map_err(|e| format!("invalid discport {port:?}: {e}"))?;
            }
        }
        Ok(ParsedEnode {
            ip: Some(socket.ip()),
            udp_port,
            tcp_port,
            node_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use k256::elliptic_curve::group::Curve;
    use k256::{ProjectivePoint, Scalar};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn compressed(key: &k256::PublicKey) -> [u8; COMPRESSED_KEY_LEN] {
        let mut out = [0u8; COMPRESSED_KEY_LEN];
        out.copy_from_slice(key.to_encoded_point(true).as_bytes());
        out
    }

    #[test]
    fn rejects_private_and_loopback() {
        for ip in ["127.0.0.1", "10.0.0.1", "192.168.1.1", "172.16.0.1", "172.31.255.255"] {
            assert!(!is_public(ip.parse().unwrap()), "{ip} should be rejected");
        }
        for ip in ["8.8.8.8", "1.1.1.1", "172.15.255.255", "172.32.0.1", "192.169.0.1"] {
            assert!(is_public(ip.parse().unwrap()), "{ip} should be accepted");
        }
    }

    #[test]
    fn packs_ipv4_big_endian() {
        let key = PrivateKey::new_key().public_key();
        let encoded = encode(Ipv4Addr::new(1, 2, 3, 4), &compressed(&key));
        assert_eq!(encoded.ipv4, 0x0102_0304);
        assert_eq!(encoded.pubkey[0][..], compressed(&key)[..32]);
        assert_eq!(encoded.pubkey[1][0], compressed(&key)[32]);
        assert!(encoded.pubkey[1][1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn decode_matches_display_form_for_random_endpoints() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        // walk the curve from a random start; point addition keeps this cheap
        let mut point = ProjectivePoint::GENERATOR * Scalar::from(rng.r#gen::<u64>() | 1);
        for _ in 0..10_000 {
            point += ProjectivePoint::GENERATOR;
            let key = k256::PublicKey::from_affine(point.to_affine()).unwrap();
            let ip = Ipv4Addr::from(rng.r#gen::<u32>());
            let port = rng.r#gen::<u16>();

            let encoded = encode(ip, &compressed(&key));
            let expected = EndpointDescriptor {
                ip,
                public_key: key,
                udp_port: port,
                tcp_port: port,
            };
            assert_eq!(decode(&encoded, port), expected.to_string());
            assert_eq!(Ipv4Addr::from(encoded.ipv4).octets(), ip.octets());
            assert_eq!(EndpointDescriptor::from_encoded(&encoded, port), Some(expected));
        }
    }

    #[test]
    fn decode_of_garbage_key_is_empty() {
        let encoded = EncodedEndpoint {
            ipv4: 0x0808_0808,
            pubkey: [[0xff; 32], [0x07; 32]],
        };
        assert_eq!(decode(&encoded, 39797), "");
        assert_eq!(decode(&EncodedEndpoint::default(), 39797), "");
    }

    #[test]
    fn parses_full_enode() {
        let key = PrivateKey::new_key().public_key();
        let descriptor = EndpointDescriptor {
            ip: Ipv4Addr::new(8, 8, 8, 8),
            public_key: key,
            udp_port: 30301,
            tcp_port: 30303,
        };
        let url = descriptor.to_string();
        assert!(url.ends_with("@8.8.8.8:30303?discport=30301"));

        let parsed: ParsedEnode = url.parse().unwrap();
        assert_eq!(parsed.ip, Some(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
        assert_eq!(parsed.tcp_port, 30303);
        assert_eq!(parsed.udp_port, 30301);
        assert_eq!(
            k256::PublicKey::from_sec1_bytes(&parsed.uncompressed_key()).unwrap(),
            key
        );
    }

    #[test]
    fn parses_incomplete_and_rejects_garbage() {
        let id = "ab".repeat(64);
        let bare: ParsedEnode = id.parse().unwrap();
        assert_eq!(bare.ip, None);
        let no_host: ParsedEnode = format!("enode://{id}").parse().unwrap();
        assert_eq!(no_host.ip, None);

        assert!("http://example.com".parse::<ParsedEnode>().is_err());
        assert!(format!("enode://{}@1.2.3.4:30303", "ab".repeat(10))
            .parse::<ParsedEnode>()
            .is_err());
        assert!(format!("enode://{id}@1.2.3.4").parse::<ParsedEnode>().is_err());
        assert!(format!("enode://{id}@example.com:30303").parse::<ParsedEnode>().is_err());
        assert!(format!("enode://{id}@1.2.3.4:30303?discport=x").parse::<ParsedEnode>().is_err());
    }
}
