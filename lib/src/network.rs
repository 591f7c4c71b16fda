use crate::U256;
use crate::crypto::Address;
use crate::error::MnError;
use crate::hash::{Hash, TxHash};
use crate::types::{CollateralBalance, MasternodeRecord, RegistryStats};
use serde::{Deserialize, Serialize};
use std::io::{Error as IoError, ErrorKind as IoErrorKind, Result as IoResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Requests and answers exchanged between `mnctl` and a node.
/// Frames are CBOR, prefixed by their length as a big-endian u64.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // requests
    FetchHead,
    ListMasternodes,
    MasternodeInfo(Address),
    FetchStats,
    CollateralBalance(Address),
    Announce {
        owner: Address,
        enode: String,
        password: Option<String>,
    },
    Denounce {
        owner: Address,
        password: Option<String>,
    },
    DepositCollateral {
        owner: Address,
        amount: U256,
        password: Option<String>,
    },
    WithdrawCollateral {
        owner: Address,
        amount: U256,
        password: Option<String>,
    },
    // answers
    Head(Hash),
    Masternodes(Vec<MasternodeRecord>),
    Masternode(MasternodeRecord),
    Stats(RegistryStats),
    Balance(CollateralBalance),
    TxSubmitted(TxHash),
    Error(MnError),
}

impl Message {
    pub fn encode(&self) -> IoResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| IoError::new(IoErrorKind::InvalidData, e.to_string()))?;
        Ok(bytes)
    }

    pub fn decode(data: &[u8]) -> IoResult<Self> {
        ciborium::from_reader(data).map_err(|e| IoError::new(IoErrorKind::InvalidData, e.to_string()))
    }

    pub async fn send_async<W: AsyncWrite + Unpin>(&self, stream: &mut W) -> IoResult<()> {
        let bytes = self.encode()?;
        stream.write_u64(bytes.len() as u64).await?;
        stream.write_all(&bytes).await?;
        stream.flush().await
    }

    pub async fn receive_async<R: AsyncRead + Unpin>(stream: &mut R) -> IoResult<Self> {
        let len = stream.read_u64().await?;
        if len > crate::MAX_MESSAGE_SIZE {
            return Err(IoError::new(
                IoErrorKind::InvalidData,
                format!("message of {len} bytes exceeds limit"),
            ));
        }
        let mut data = vec![0u8; len as usize];
        stream.read_exact(&mut data).await?;
        Self::decode(&data)
    }
}
