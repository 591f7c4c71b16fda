use crate::U256;
use crate::crypto::Address;
use crate::endpoint::EncodedEndpoint;
use serde::{Deserialize, Serialize};

/// One row of the masternode list, assembled from a single head snapshot.
///
/// The `Default` value is the "not found" answer of point lookups.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MasternodeRecord {
    pub masternode: Address,
    pub owner: Address,
    /// enode URL, empty when the stored endpoint could not be decoded
    pub enode: String,
    pub collateral: U256,
    pub announced_block: u64,
    pub is_active: bool,
}

impl MasternodeRecord {
    pub fn is_zero(&self) -> bool {
        *self == MasternodeRecord::default()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub active: u64,
    pub total: u64,
    pub active_collateral: U256,
    pub total_collateral: U256,
    pub max_of_all_times: U256,
}

impl From<CountInfo> for RegistryStats {
    fn from(count: CountInfo) -> Self {
        RegistryStats {
            active: count.active,
            total: count.total,
            active_collateral: count.active_collateral,
            total_collateral: count.total_collateral,
            max_of_all_times: count.max_of_all_times,
        }
    }
}

/// Registry `info` answer for one node.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub owner: Address,
    pub endpoint: EncodedEndpoint,
    pub collateral: U256,
    pub announced_block: u64,
}

/// Registry `count` answer.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CountInfo {
    pub active: u64,
    pub total: u64,
    pub active_collateral: U256,
    pub total_collateral: U256,
    pub max_of_all_times: U256,
}

/// Registry `owner_info` answer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OwnerInfo {
    pub masternode: Address,
    pub announced_block: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CollateralBalance {
    pub balance: U256,
    pub last_block: u64,
}
