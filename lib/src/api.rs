//! Masternode API served on top of a [`Backend`].
//!
//! Reads of the full node list and of the registry counters are cached per
//! chain head, each in its own [`HeadCache`]. Writes are validated, signed
//! and queued, and return the pending transaction hash straight away.

use crate::U256;
use crate::announce::validate_enode;
use crate::backend::{Backend, CredentialRef};
use crate::cache::HeadCache;
use crate::crypto::Address;
use crate::endpoint;
use crate::error::{MnError, Result};
use crate::hash::{Hash, TxHash};
use crate::types::{CollateralBalance, ContractCall, MasternodeRecord, RegistryStats, TxRequest};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct MasternodeApi<B> {
    backend: Arc<B>,
    nodes_cache: HeadCache<Vec<MasternodeRecord>>,
    stats_cache: HeadCache<RegistryStats>,
}

impl<B: Backend + 'static> MasternodeApi<B> {
    pub fn new(backend: Arc<B>) -> Self {
        MasternodeApi {
            backend,
            nodes_cache: HeadCache::new(),
            stats_cache: HeadCache::new(),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub async fn list_masternodes(&self) -> Result<Arc<Vec<MasternodeRecord>>> {
        let head = self.backend.current_head().await?;
        let backend = self.backend.clone();
        self.nodes_cache
            .get(head, move |head| async move { list_masternodes(&*backend, head).await })
            .await
            .inspect_err(|e| error!("ListMasternodes failed: {e}"))
    }

    /// Record whose node or owner address is `owner_or_mn`; the zero record
    /// when there is none.
    pub async fn masternode_info(&self, owner_or_mn: Address) -> Result<MasternodeRecord> {
        let nodes = self.list_masternodes().await?;
        Ok(nodes
            .iter()
            .find(|node| node.masternode == owner_or_mn || node.owner == owner_or_mn)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn stats(&self) -> Result<RegistryStats> {
        let head = self.backend.current_head().await?;
        let backend = self.backend.clone();
        let stats = self
            .stats_cache
            .get(head, move |head| async move {
                let count = backend.count(head).await?;
                Ok::<_, MnError>(RegistryStats::from(count))
            })
            .await
            .inspect_err(|e| error!("Stats failed: {e}"))?;
        Ok((*stats).clone())
    }

    pub async fn collateral_balance(&self, owner: Address) -> Result<CollateralBalance> {
        self.backend
            .balance_info(owner)
            .await
            .inspect_err(|e| error!(%owner, "collateral balance failed: {e}"))
    }

    pub async fn deposit_collateral(
        &self,
        owner: Address,
        amount: U256,
        credential: &CredentialRef,
    ) -> Result<TxHash> {
        if amount.is_zero() {
            return Err(MnError::InvalidAmount("deposit must be positive".to_string()));
        }
        let request = TxRequest::new(owner, ContractCall::DepositCollateral, amount);
        let tx_hash = self.submit(request, credential).await?;
        info!(tx = %tx_hash, "Note: please wait until the collateral TX gets into a block!");
        Ok(tx_hash)
    }

    pub async fn withdraw_collateral(
        &self,
        owner: Address,
        amount: U256,
        credential: &CredentialRef,
    ) -> Result<TxHash> {
        if amount.is_zero() {
            return Err(MnError::InvalidAmount("withdrawal must be positive".to_string()));
        }
        let request = TxRequest::new(
            owner,
            ContractCall::WithdrawCollateral { amount },
            U256::zero(),
        );
        let tx_hash = self.submit(request, credential).await?;
        info!(tx = %tx_hash, "Note: please wait until the collateral TX gets into a block!");
        Ok(tx_hash)
    }

    pub async fn announce(
        &self,
        owner: Address,
        enode: &str,
        credential: &CredentialRef,
    ) -> Result<TxHash> {
        let announcement = validate_enode(enode, self.backend.chain_id())
            .inspect_err(|reason| warn!(%owner, "announcement rejected: {reason}"))?;
        let call = ContractCall::Announce {
            masternode: announcement.masternode,
            endpoint: announcement.endpoint,
        };
        let tx_hash = self
            .submit(TxRequest::new(owner, call, U256::zero()), credential)
            .await?;
        info!(
            tx = %tx_hash,
            masternode = %announcement.masternode,
            "Note: please wait until the TX gets into a block!"
        );
        Ok(tx_hash)
    }

    pub async fn denounce(&self, owner: Address, credential: &CredentialRef) -> Result<TxHash> {
        let owner_info = self.backend.owner_info(owner).await.map_err(|e| {
            error!(%owner, "Not found: {e}");
            MnError::OwnerNotRegistered(owner)
        })?;
        let call = ContractCall::Denounce {
            masternode: owner_info.masternode,
        };
        let tx_hash = self
            .submit(TxRequest::new(owner, call, U256::zero()), credential)
            .await?;
        info!(tx = %tx_hash, "Note: please wait until the TX gets into a block!");
        Ok(tx_hash)
    }

    async fn submit(&self, request: TxRequest, credential: &CredentialRef) -> Result<TxHash> {
        let signed = self.backend.sign_transaction(request, credential)?;
        self.backend.send_transaction(signed).await
    }
}

/// One full enumeration pass at `head`. Nodes whose `info` or `is_active`
/// call fails are logged and left out.
async fn list_masternodes<B: Backend + ?Sized>(
    backend: &B,
    head: Hash,
) -> Result<Vec<MasternodeRecord>> {
    let masternodes = backend
        .enumerate(head)
        .await
        .inspect_err(|e| error!(%head, "Failed to enumerate masternodes: {e}"))?;
    let port = u16::try_from(backend.chain_id()).unwrap_or(0);

    let mut res = Vec::with_capacity(masternodes.len());
    for mn in masternodes {
        let info = match backend.info(head, mn).await {
            Ok(info) => info,
            Err(e) => {
                warn!(%mn, "Info error: {e}");
                continue;
            }
        };
        let is_active = match backend.is_active(head, mn).await {
            Ok(is_active) => is_active,
            Err(e) => {
                warn!(%mn, "IsActive error: {e}");
                continue;
            }
        };
        res.push(MasternodeRecord {
            masternode: mn,
            owner: info.owner,
            enode: endpoint::decode(&info.endpoint, port),
            collateral: info.collateral,
            announced_block: info.announced_block,
            is_active,
        });
    }
    Ok(res)
}
