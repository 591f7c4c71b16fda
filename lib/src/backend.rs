//! Interfaces of the external collaborators: the chain node, the on-chain
//! masternode registry and collateral token, the signer and the transaction
//! pool.
//!
//! Registry reads take the head they must be answered against so that all
//! calls of one query cycle see the same block.

use crate::crypto::Address;
use crate::error::Result;
use crate::hash::{Hash, TxHash};
use crate::types::{
    CollateralBalance, CountInfo, NodeInfo, OwnerInfo, SignedTransaction, TxRequest,
};
use async_trait::async_trait;
use std::fmt;

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn current_head(&self) -> Result<Hash>;
    fn chain_id(&self) -> u64;
}

#[async_trait]
pub trait RegistryReader: Send + Sync {
    async fn enumerate(&self, at: Hash) -> Result<Vec<Address>>;
    async fn info(&self, at: Hash, masternode: Address) -> Result<NodeInfo>;
    async fn is_active(&self, at: Hash, masternode: Address) -> Result<bool>;
    async fn count(&self, at: Hash) -> Result<CountInfo>;
    /// Node currently announced by `owner`; errors when there is none.
    async fn owner_info(&self, owner: Address) -> Result<OwnerInfo>;
}

#[async_trait]
pub trait CollateralReader: Send + Sync {
    async fn balance_info(&self, owner: Address) -> Result<CollateralBalance>;
}

pub trait Signer: Send + Sync {
    fn sign_transaction(
        &self,
        request: TxRequest,
        credential: &CredentialRef,
    ) -> Result<SignedTransaction>;
}

#[async_trait]
pub trait TxPool: Send + Sync {
    /// Queue a transaction and return its hash without waiting for inclusion.
    async fn send_transaction(&self, tx: SignedTransaction) -> Result<TxHash>;
}

/// Everything `MasternodeApi` needs from the outside world.
pub trait Backend: ChainReader + RegistryReader + CollateralReader + Signer + TxPool {}

impl<T> Backend for T where T: ChainReader + RegistryReader + CollateralReader + Signer + TxPool {}

/// Opaque reference to the credential unlocking the sender's key,
/// typically a keystore passphrase.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialRef(Option<String>);

impl CredentialRef {
    pub fn new(secret: impl Into<String>) -> Self {
        CredentialRef(Some(secret.into()))
    }
    pub fn none() -> Self {
        CredentialRef(None)
    }
    pub fn secret(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(_) => write!(f, "CredentialRef(***)"),
            None => write!(f, "CredentialRef(None)"),
        }
    }
}
