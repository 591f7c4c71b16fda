use crate::U256;
use crate::crypto::{Address, Signature};
use crate::endpoint::EncodedEndpoint;
use crate::error::Result;
use crate::hash::{Hash, TxHash};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contract {
    MasternodeRegistry,
    MasternodeToken,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ContractCall {
    Announce {
        masternode: Address,
        endpoint: EncodedEndpoint,
    },
    Denounce {
        masternode: Address,
    },
    DepositCollateral,
    WithdrawCollateral {
        amount: U256,
    },
}

impl ContractCall {
    pub fn contract(&self) -> Contract {
        match self {
            ContractCall::Announce { .. } | ContractCall::Denounce { .. } => {
                Contract::MasternodeRegistry
            }
            ContractCall::DepositCollateral | ContractCall::WithdrawCollateral { .. } => {
                Contract::MasternodeToken
            }
        }
    }

    pub fn gas_limit(&self) -> u64 {
        match self.contract() {
            Contract::MasternodeRegistry => crate::MASTERNODE_CALL_GAS,
            Contract::MasternodeToken => crate::MNTOKEN_CALL_GAS,
        }
    }
}

/// Unsigned contract call, ready to be handed to a signer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Contract,
    pub call: ContractCall,
    pub value: U256,
    pub gas_limit: u64,
}

impl TxRequest {
    pub fn new(from: Address, call: ContractCall, value: U256) -> Self {
        TxRequest {
            from,
            to: call.contract(),
            gas_limit: call.gas_limit(),
            call,
            value,
        }
    }
    pub fn hash(&self) -> Result<Hash> {
        Hash::hash(self)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub request: TxRequest,
    /// compressed SEC1 key of the signer
    pub public_key: Vec<u8>,
    pub signature: Signature,
}

impl SignedTransaction {
    pub fn hash(&self) -> Result<TxHash> {
        Hash::hash(self)
    }

    pub fn verify(&self) -> Result<bool> {
        Ok(self.signature.verify(&self.request.hash()?, &self.public_key))
    }
}
