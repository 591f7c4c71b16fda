mod masternode;
mod tx;

pub use masternode::{CollateralBalance, CountInfo, MasternodeRecord, NodeInfo, OwnerInfo, RegistryStats};
pub use tx::{Contract, ContractCall, SignedTransaction, TxRequest};
