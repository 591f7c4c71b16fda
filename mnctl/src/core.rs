use anyhow::{Context, Result, anyhow, bail};
use bigdecimal::BigDecimal;
use mnlib::U256;
use mnlib::crypto::Address;
use mnlib::hash::{Hash, TxHash};
use mnlib::network::Message;
use mnlib::types::{CollateralBalance, MasternodeRecord, RegistryStats};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// `host:port` of the node
    pub node: String,
    /// 0x-prefixed owner account used when `--owner` is omitted
    pub default_owner: Option<String>,
    pub password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node: "127.0.0.1:9000".to_string(),
            default_owner: None,
            password: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading mnctl config {}", path.display()))?;
        Ok(toml::from_str(&text)?)
    }
}

/// Connection to a node; one TCP stream per command.
pub struct Core {
    pub config: Config,
    stream: Option<TcpStream>,
}

impl Core {
    pub fn new(config: Config) -> Self {
        Core {
            config,
            stream: None,
        }
    }

    pub fn owner(&self, owner: Option<Address>) -> Result<Address> {
        if let Some(owner) = owner {
            return Ok(owner);
        }
        let configured = self
            .config
            .default_owner
            .as_deref()
            .ok_or_else(|| anyhow!("no --owner given and no default_owner configured"))?;
        configured
            .parse()
            .map_err(|e| anyhow!("invalid default_owner {configured}: {e}"))
    }

    pub fn password(&self, password: Option<String>) -> Option<String> {
        password.or_else(|| self.config.password.clone())
    }

    async fn request(&mut self, message: Message) -> Result<Message> {
        if self.stream.is_none() {
            let stream = TcpStream::connect(&self.config.node)
                .await
                .with_context(|| format!("connecting to node {}", self.config.node))?;
            self.stream = Some(stream);
        }
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("not connected"))?;
        debug!(?message, "sending request");
        message.send_async(stream).await?;
        match Message::receive_async(stream).await? {
            Message::Error(e) => Err(e.into()),
            reply => Ok(reply),
        }
    }

    pub async fn head(&mut self) -> Result<Hash> {
        match self.request(Message::FetchHead).await? {
            Message::Head(head) => Ok(head),
            other => unexpected(other),
        }
    }

    pub async fn list(&mut self) -> Result<Vec<MasternodeRecord>> {
        match self.request(Message::ListMasternodes).await? {
            Message::Masternodes(nodes) => Ok(nodes),
            other => unexpected(other),
        }
    }

    pub async fn info(&mut self, address: Address) -> Result<MasternodeRecord> {
        match self.request(Message::MasternodeInfo(address)).await? {
            Message::Masternode(record) => Ok(record),
            other => unexpected(other),
        }
    }

    pub async fn stats(&mut self) -> Result<RegistryStats> {
        match self.request(Message::FetchStats).await? {
            Message::Stats(stats) => Ok(stats),
            other => unexpected(other),
        }
    }

    pub async fn balance(&mut self, owner: Address) -> Result<CollateralBalance> {
        match self.request(Message::CollateralBalance(owner)).await? {
            Message::Balance(balance) => Ok(balance),
            other => unexpected(other),
        }
    }

    pub async fn announce(
        &mut self,
        owner: Address,
        enode: String,
        password: Option<String>,
    ) -> Result<TxHash> {
        self.submit(Message::Announce {
            owner,
            enode,
            password,
        })
        .await
    }

    pub async fn denounce(&mut self, owner: Address, password: Option<String>) -> Result<TxHash> {
        self.submit(Message::Denounce { owner, password }).await
    }

    pub async fn deposit(
        &mut self,
        owner: Address,
        amount: U256,
        password: Option<String>,
    ) -> Result<TxHash> {
        self.submit(Message::DepositCollateral {
            owner,
            amount,
            password,
        })
        .await
    }

    pub async fn withdraw(
        &mut self,
        owner: Address,
        amount: U256,
        password: Option<String>,
    ) -> Result<TxHash> {
        self.submit(Message::WithdrawCollateral {
            owner,
            amount,
            password,
        })
        .await
    }

    async fn submit(&mut self, message: Message) -> Result<TxHash> {
        match self.request(message).await? {
            Message::TxSubmitted(tx) => Ok(tx),
            other => unexpected(other),
        }
    }
}

fn unexpected<T>(reply: Message) -> Result<T> {
    Err(anyhow!("Unexpected response from node: {reply:?}"))
}

/// Parse a coin amount such as `10000` or `0.5` into base units.
pub fn parse_coins(text: &str) -> Result<U256> {
    let coins = BigDecimal::from_str(text.trim()).with_context(|| format!("invalid amount {text}"))?;
    let units = coins * coin();
    if !units.is_integer() {
        bail!("amount {text} has more than {} decimals", mnlib::COIN_DECIMALS);
    }
    let (digits, _) = units.with_scale(0).as_bigint_and_exponent();
    U256::from_dec_str(&digits.to_string()).map_err(|_| anyhow!("amount {text} out of range"))
}

/// Render base units as coins, without trailing zeros.
pub fn format_coins(units: U256) -> String {
    match BigDecimal::from_str(&units.to_string()) {
        Ok(units) => (units / coin()).normalized().to_plain_string(),
        Err(_) => units.to_string(),
    }
}

fn coin() -> BigDecimal {
    BigDecimal::from(10u64.pow(mnlib::COIN_DECIMALS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnlib::error::MnError;
    use tokio::net::TcpListener;

    #[test]
    fn coins_convert_to_base_units() {
        assert_eq!(parse_coins("1").unwrap(), U256::from_coins(1));
        assert_eq!(
            parse_coins("0.5").unwrap(),
            U256::from(500_000_000_000_000_000u64)
        );
        assert_eq!(parse_coins("10000").unwrap(), U256::from_coins(10_000));
        assert!(parse_coins("0.0000000000000000001").is_err());
        assert!(parse_coins("-1").is_err());
        assert!(parse_coins("lots").is_err());
    }

    #[test]
    fn base_units_render_as_coins() {
        assert_eq!(format_coins(U256::from_coins(12_000)), "12000");
        assert_eq!(format_coins(U256::from(1_500_000_000_000_000_000u64)), "1.5");
        assert_eq!(format_coins(U256::zero()), "0");
    }

    #[test]
    fn config_falls_back_for_owner_and_password() {
        let owner: Address = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf".parse().unwrap();
        let config: Config = toml::from_str(
            r#"
            node = "10.0.0.1:9000"
            default_owner = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
            password = "pw"
            "#,
        )
        .unwrap();
        let core = Core::new(config);
        assert_eq!(core.owner(None).unwrap(), owner);
        assert_eq!(core.password(None).as_deref(), Some("pw"));
        assert_eq!(core.password(Some("x".into())).as_deref(), Some("x"));

        let bare = Core::new(Config::default());
        assert!(bare.owner(None).is_err());
        assert_eq!(bare.password(None), None);
    }

    #[tokio::test]
    async fn node_errors_surface_as_failures() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            while let Ok(request) = Message::receive_async(&mut socket).await {
                let reply = match request {
                    Message::FetchStats => Message::Stats(RegistryStats::default()),
                    _ => Message::Error(MnError::InsufficientCollateral),
                };
                reply.send_async(&mut socket).await.unwrap();
            }
        });

        let mut core = Core::new(Config {
            node: addr.to_string(),
            ..Config::default()
        });
        assert_eq!(core.stats().await.unwrap(), RegistryStats::default());
        let err = core
            .deposit(Address::default(), U256::one(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<MnError>(),
            Some(&MnError::InsufficientCollateral)
        );
        // unexpected answer type
        assert!(core.head().await.is_err());
    }
}
