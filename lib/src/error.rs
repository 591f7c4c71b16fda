use crate::crypto::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an announced endpoint was refused before reaching the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    #[error("malformed enode descriptor: {0}")]
    MalformedDescriptor(String),
    #[error("enode address is not IPv4")]
    NotIpv4,
    #[error("enode address is private or loopback")]
    PrivateOrLoopbackAddress,
    #[error("enode ports udp={udp} tcp={tcp} must both equal chain id {expected}")]
    PortMismatch { udp: u16, tcp: u16, expected: u64 },
    #[error("invalid enode public key")]
    InvalidPublicKey,
}

// Clone because a single failed cache production is handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MnError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("announcement rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("owner {0} has no registered masternode")]
    OwnerNotRegistered(Address),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("insufficient collateral")]
    InsufficientCollateral,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("production aborted: {0}")]
    ProductionAborted(String),
    #[error("codec error: {0}")]
    Codec(String),
}

pub type Result<T> = std::result::Result<T, MnError>;
