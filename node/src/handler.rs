use mnlib::api::MasternodeApi;
use mnlib::backend::{Backend, CredentialRef};
use mnlib::error::Result;
use mnlib::network::Message;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

/// Serve one client until it hangs up or sends something that is not a
/// request.
pub async fn handle_connection<S, B>(mut socket: S, api: Arc<MasternodeApi<B>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
    B: Backend + 'static,
{
    loop {
        let message = match Message::receive_async(&mut socket).await {
            Ok(message) => message,
            Err(e) => {
                debug!("connection closed: {e}");
                return;
            }
        };

        use Message::*;
        let reply = match message {
            Head(_) | Masternodes(_) | Masternode(_) | Stats(_) | Balance(_) | TxSubmitted(_)
            | Error(_) => {
                warn!("client sent an answer instead of a request, closing connection");
                return;
            }
            request => answer(&api, request).await,
        };
        let reply = reply.unwrap_or_else(Error);
        if let Err(e) = reply.send_async(&mut socket).await {
            warn!("failed to send reply: {e}");
            return;
        }
    }
}

async fn answer<B: Backend + 'static>(api: &MasternodeApi<B>, request: Message) -> Result<Message> {
    use Message::*;
    let reply = match request {
        FetchHead => Head(api.backend().current_head().await?),
        ListMasternodes => Masternodes(api.list_masternodes().await?.to_vec()),
        MasternodeInfo(address) => Masternode(api.masternode_info(address).await?),
        FetchStats => Stats(api.stats().await?),
        CollateralBalance(owner) => Balance(api.collateral_balance(owner).await?),
        Announce {
            owner,
            enode,
            password,
        } => TxSubmitted(api.announce(owner, &enode, &credential(password)).await?),
        Denounce { owner, password } => {
            TxSubmitted(api.denounce(owner, &credential(password)).await?)
        }
        DepositCollateral {
            owner,
            amount,
            password,
        } => TxSubmitted(
            api.deposit_collateral(owner, amount, &credential(password))
                .await?,
        ),
        WithdrawCollateral {
            owner,
            amount,
            password,
        } => TxSubmitted(
            api.withdraw_collateral(owner, amount, &credential(password))
                .await?,
        ),
        other => {
            return Err(mnlib::error::MnError::Codec(format!(
                "unexpected message {other:?}"
            )));
        }
    };
    Ok(reply)
}

fn credential(password: Option<String>) -> CredentialRef {
    password.map(CredentialRef::new).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Account, NodeConfig};
    use crate::devchain::DevChain;
    use mnlib::U256;
    use mnlib::crypto::PrivateKey;
    use mnlib::error::MnError;

    const SECRET: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    fn api() -> Arc<MasternodeApi<DevChain>> {
        let config = NodeConfig {
            chain_id: 39797,
            accounts: vec![Account {
                secret: SECRET.to_string(),
                password: "pw".to_string(),
                balance: 20_000,
            }],
        };
        Arc::new(MasternodeApi::new(Arc::new(DevChain::new(&config).unwrap())))
    }

    async fn roundtrip<S>(client: &mut S, request: Message) -> Message
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        request.send_async(client).await.unwrap();
        Message::receive_async(client).await.unwrap()
    }

    #[tokio::test]
    async fn serves_requests_on_one_connection() {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(handle_connection(server, api()));
        let owner = PrivateKey::from_hex(SECRET).unwrap().address();

        let Message::Head(genesis) = roundtrip(&mut client, Message::FetchHead).await else {
            panic!("expected a head");
        };
        assert_eq!(
            roundtrip(&mut client, Message::ListMasternodes).await,
            Message::Masternodes(vec![])
        );

        let reply = roundtrip(
            &mut client,
            Message::DepositCollateral {
                owner,
                amount: U256::from_coins(5),
                password: Some("pw".to_string()),
            },
        )
        .await;
        assert!(matches!(reply, Message::TxSubmitted(_)));

        let Message::Head(head) = roundtrip(&mut client, Message::FetchHead).await else {
            panic!("expected a head");
        };
        assert_ne!(head, genesis);

        let Message::Balance(balance) =
            roundtrip(&mut client, Message::CollateralBalance(owner)).await
        else {
            panic!("expected a balance");
        };
        assert_eq!(balance.balance, U256::from_coins(20_005));
    }

    #[tokio::test]
    async fn failures_come_back_as_error_answers() {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(handle_connection(server, api()));
        let owner = PrivateKey::from_hex(SECRET).unwrap().address();

        let reply = roundtrip(
            &mut client,
            Message::Announce {
                owner,
                enode: "enode://1234@127.0.0.1:39797".to_string(),
                password: Some("pw".to_string()),
            },
        )
        .await;
        assert!(matches!(reply, Message::Error(MnError::Rejected(_))));

        let reply = roundtrip(
            &mut client,
            Message::Denounce {
                owner,
                password: None,
            },
        )
        .await;
        assert_eq!(reply, Message::Error(MnError::OwnerNotRegistered(owner)));

        // the connection is still usable afterwards
        assert!(matches!(
            roundtrip(&mut client, Message::FetchStats).await,
            Message::Stats(_)
        ));
    }

    #[tokio::test]
    async fn answer_from_client_closes_connection() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(handle_connection(server, api()));
        Message::Stats(Default::default())
            .send_async(&mut client)
            .await
            .unwrap();
        task.await.unwrap();
        assert!(Message::receive_async(&mut client).await.is_err());
    }
}
