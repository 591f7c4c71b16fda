//! In-process development chain.
//!
//! Implements every collaborator `MasternodeApi` needs: it seals one block
//! per accepted transaction, keeps the registry state of the most recent
//! blocks so reads can be pinned to a head, and signs with a password
//! protected keystore.

use crate::config::NodeConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnlib::U256;
use mnlib::backend::{ChainReader, CollateralReader, CredentialRef, RegistryReader, Signer, TxPool};
use mnlib::crypto::{Address, PrivateKey, Signature, pubkey_to_address};
use mnlib::error::{MnError, Result};
use mnlib::hash::{Hash, TxHash};
use mnlib::types::{
    CollateralBalance, ContractCall, CountInfo, NodeInfo, OwnerInfo, SignedTransaction, TxRequest,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

// number of past blocks whose registry state stays readable
pub const SNAPSHOT_DEPTH: usize = 64;

#[derive(Serialize)]
struct BlockHeader {
    number: u64,
    parent: Hash,
    timestamp: DateTime<Utc>,
    tx: TxHash,
}

#[derive(Clone, Debug)]
struct NodeEntry {
    info: NodeInfo,
    active: bool,
}

/// Registry and collateral state as of one block.
#[derive(Clone, Debug, Default)]
struct RegistryState {
    height: u64,
    nodes: BTreeMap<Address, NodeEntry>,
    // owner -> announced node
    owners: HashMap<Address, Address>,
    balances: HashMap<Address, CollateralBalance>,
    max_of_all_times: U256,
}

impl RegistryState {
    fn balance(&self, owner: &Address) -> U256 {
        self.balances
            .get(owner)
            .map(|b| b.balance)
            .unwrap_or_default()
    }

    fn set_balance(&mut self, owner: Address, balance: U256) {
        self.balances.insert(
            owner,
            CollateralBalance {
                balance,
                last_block: self.height,
            },
        );
        if let Some(node) = self.owners.get(&owner) {
            if let Some(entry) = self.nodes.get_mut(node) {
                entry.info.collateral = balance;
            }
        }
    }

    fn count(&self) -> CountInfo {
        let mut count = CountInfo {
            max_of_all_times: self.max_of_all_times,
            ..CountInfo::default()
        };
        for entry in self.nodes.values() {
            count.total += 1;
            count.total_collateral = count.total_collateral.saturating_add(entry.info.collateral);
            if entry.active {
                count.active += 1;
                count.active_collateral = count.active_collateral.saturating_add(entry.info.collateral);
            }
        }
        count
    }

    fn apply(&mut self, request: &TxRequest) -> Result<()> {
        let from = request.from;
        let min_collateral = U256::from_coins(mnlib::MASTERNODE_MIN_COLLATERAL);
        match &request.call {
            ContractCall::Announce {
                masternode,
                endpoint,
            } => {
                let balance = self.balance(&from);
                if balance < min_collateral {
                    return Err(MnError::InsufficientCollateral);
                }
                if let Some(entry) = self.nodes.get(masternode) {
                    if entry.info.owner != from {
                        return Err(reverted("masternode is owned by another account"));
                    }
                }
                if let Some(previous) = self.owners.remove(&from) {
                    self.nodes.remove(&previous);
                }
                self.nodes.insert(
                    *masternode,
                    NodeEntry {
                        info: NodeInfo {
                            owner: from,
                            endpoint: *endpoint,
                            collateral: balance,
                            announced_block: self.height,
                        },
                        active: true,
                    },
                );
                self.owners.insert(from, *masternode);
                let total = self.count().total_collateral;
                if total > self.max_of_all_times {
                    self.max_of_all_times = total;
                }
            }
            ContractCall::Denounce { masternode } => {
                match self.nodes.get(masternode) {
                    Some(entry) if entry.info.owner == from => {}
                    Some(_) => return Err(reverted("not the masternode owner")),
                    None => return Err(reverted("unknown masternode")),
                }
                self.nodes.remove(masternode);
                self.owners.remove(&from);
            }
            ContractCall::DepositCollateral => {
                if request.value.is_zero() {
                    return Err(MnError::InvalidAmount("deposit must be positive".to_string()));
                }
                let balance = self
                    .balance(&from)
                    .checked_add(request.value)
                    .ok_or_else(|| MnError::InvalidAmount("deposit overflows balance".to_string()))?;
                self.set_balance(from, balance);
            }
            ContractCall::WithdrawCollateral { amount } => {
                let balance = self.balance(&from);
                if *amount > balance {
                    return Err(MnError::InsufficientCollateral);
                }
                let remaining = balance - *amount;
                if self.owners.contains_key(&from) && remaining < min_collateral {
                    return Err(reverted("announced masternode needs the minimum collateral"));
                }
                self.set_balance(from, remaining);
            }
        }
        Ok(())
    }
}

fn reverted(reason: &str) -> MnError {
    MnError::Unavailable(format!("execution reverted: {reason}"))
}

struct Chain {
    head: Hash,
    // oldest first, newest last
    snapshots: VecDeque<(Hash, Arc<RegistryState>)>,
}

impl Chain {
    fn latest(&self) -> Arc<RegistryState> {
        self.snapshots
            .back()
            .map(|(_, state)| state.clone())
            .unwrap_or_default()
    }
}

struct KeystoreEntry {
    key: PrivateKey,
    password: String,
}

pub struct DevChain {
    chain_id: u64,
    keystore: HashMap<Address, KeystoreEntry>,
    chain: RwLock<Chain>,
}

impl DevChain {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let mut keystore = HashMap::new();
        let mut genesis = RegistryState::default();
        for account in &config.accounts {
            let key = PrivateKey::from_hex(&account.secret)?;
            let address = key.address();
            if account.balance > 0 {
                genesis.set_balance(address, U256::from_coins(account.balance));
            }
            info!(%address, balance = account.balance, "loaded account");
            keystore.insert(
                address,
                KeystoreEntry {
                    key,
                    password: account.password.clone(),
                },
            );
        }
        let head = Hash::hash(&BlockHeader {
            number: 0,
            parent: Hash::zero(),
            timestamp: Utc::now(),
            tx: Hash::zero(),
        })?;
        info!(%head, chain_id = config.chain_id, "genesis sealed");
        Ok(DevChain {
            chain_id: config.chain_id,
            keystore,
            chain: RwLock::new(Chain {
                head,
                snapshots: VecDeque::from([(head, Arc::new(genesis))]),
            }),
        })
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.keystore.keys()
    }

    pub async fn height(&self) -> u64 {
        self.chain.read().await.latest().height
    }

    async fn snapshot(&self, at: Hash) -> Result<Arc<RegistryState>> {
        let chain = self.chain.read().await;
        chain
            .snapshots
            .iter()
            .rev()
            .find(|(hash, _)| *hash == at)
            .map(|(_, state)| state.clone())
            .ok_or_else(|| MnError::Unavailable(format!("state for block {at} is not available")))
    }
}

#[async_trait]
impl ChainReader for DevChain {
    async fn current_head(&self) -> Result<Hash> {
        Ok(self.chain.read().await.head)
    }
    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl RegistryReader for DevChain {
    async fn enumerate(&self, at: Hash) -> Result<Vec<Address>> {
        Ok(self.snapshot(at).await?.nodes.keys().copied().collect())
    }

    async fn info(&self, at: Hash, masternode: Address) -> Result<NodeInfo> {
        self.snapshot(at)
            .await?
            .nodes
            .get(&masternode)
            .map(|entry| entry.info.clone())
            .ok_or_else(|| reverted("unknown masternode"))
    }

    async fn is_active(&self, at: Hash, masternode: Address) -> Result<bool> {
        Ok(self
            .snapshot(at)
            .await?
            .nodes
            .get(&masternode)
            .is_some_and(|entry| entry.active))
    }

    async fn count(&self, at: Hash) -> Result<CountInfo> {
        Ok(self.snapshot(at).await?.count())
    }

    async fn owner_info(&self, owner: Address) -> Result<OwnerInfo> {
        let state = self.chain.read().await.latest();
        let masternode = state
            .owners
            .get(&owner)
            .copied()
            .ok_or_else(|| reverted("owner has no masternode"))?;
        let announced_block = state
            .nodes
            .get(&masternode)
            .map(|entry| entry.info.announced_block)
            .unwrap_or_default();
        Ok(OwnerInfo {
            masternode,
            announced_block,
        })
    }
}

#[async_trait]
impl CollateralReader for DevChain {
    async fn balance_info(&self, owner: Address) -> Result<CollateralBalance> {
        let state = self.chain.read().await.latest();
        Ok(state.balances.get(&owner).cloned().unwrap_or_default())
    }
}

impl Signer for DevChain {
    fn sign_transaction(
        &self,
        request: TxRequest,
        credential: &CredentialRef,
    ) -> Result<SignedTransaction> {
        let entry = self
            .keystore
            .get(&request.from)
            .ok_or_else(|| MnError::Signing(format!("unknown account {}", request.from)))?;
        if credential.secret() != Some(entry.password.as_str()) {
            return Err(MnError::Signing(
                "could not decrypt key with given password".to_string(),
            ));
        }
        let signature = Signature::sign_output(&request.hash()?, &entry.key);
        Ok(SignedTransaction {
            request,
            public_key: entry.key.public_key_bytes(),
            signature,
        })
    }
}

#[async_trait]
impl TxPool for DevChain {
    async fn send_transaction(&self, tx: SignedTransaction) -> Result<TxHash> {
        let signer = k256::PublicKey::from_sec1_bytes(&tx.public_key)
            .map_err(|_| MnError::Signing("invalid signer key".to_string()))?;
        if pubkey_to_address(&signer) != tx.request.from || !tx.verify()? {
            return Err(MnError::Signing("invalid transaction signature".to_string()));
        }
        let tx_hash = tx.hash()?;

        let mut chain = self.chain.write().await;
        let mut state = (*chain.latest()).clone();
        state.height += 1;
        state.apply(&tx.request)?;

        let head = Hash::hash(&BlockHeader {
            number: state.height,
            parent: chain.head,
            timestamp: Utc::now(),
            tx: tx_hash,
        })?;
        debug!(%head, height = state.height, tx = %tx_hash, "sealed block");
        chain.head = head;
        chain.snapshots.push_back((head, Arc::new(state)));
        while chain.snapshots.len() > SNAPSHOT_DEPTH {
            chain.snapshots.pop_front();
        }
        Ok(tx_hash)
    }
}
