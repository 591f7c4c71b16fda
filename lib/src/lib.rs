use serde::{Deserialize, Serialize};
use uint::construct_uint;
construct_uint! {
// consisting of 4 x 64-bit words
#[derive(Serialize, Deserialize)]
pub struct U256(4);
}
pub mod announce;
pub mod api;
pub mod backend;
pub mod cache;
pub mod crypto;
pub mod endpoint;
pub mod error;
pub mod hash;
pub mod network;
pub mod types;

// 1 coin = 10^18 base units
pub const COIN_DECIMALS: u32 = 18;
// gas limit for collateral token transactions
pub const MNTOKEN_CALL_GAS: u64 = 300_000;
// gas limit for masternode registry transactions
pub const MASTERNODE_CALL_GAS: u64 = 500_000;
// minimum collateral an owner must hold to announce a node, in coins
pub const MASTERNODE_MIN_COLLATERAL: u64 = 10_000;
// largest frame accepted by the wire codec
pub const MAX_MESSAGE_SIZE: u64 = 16 * 1024 * 1024;

impl U256 {
    /// Amount of base units in `coins` whole coins.
    pub fn from_coins(coins: u64) -> Self {
        U256::from(coins) * U256::exp10(COIN_DECIMALS as usize)
    }
}
