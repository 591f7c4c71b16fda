use anyhow::{Context, Result};
use argh::FromArgs;
use mnlib::api::MasternodeApi;
use node_lib::config::NodeConfig;
use node_lib::devchain::DevChain;
use node_lib::{handler, util};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(FromArgs)]
/// Development masternode registry node
struct Args {
    #[argh(option, default = "9000")]
    /// port number
    port: u16,
    #[argh(option, default = "PathBuf::from(\"./node.toml\")")]
    /// accounts file; a sample is written when it does not exist
    config: PathBuf,
    #[argh(option)]
    /// directory for daily rotated log files
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let _guard = util::init_tracing(args.log_dir.as_deref())?;

    let config = if args.config.exists() {
        NodeConfig::load(&args.config)?
    } else {
        warn!(path = %args.config.display(), "no config found, writing a sample one");
        let config = NodeConfig::sample();
        config.save(&args.config)?;
        config
    };

    let chain = DevChain::new(&config).context("starting dev chain")?;
    for account in chain.accounts() {
        info!(%account, "unlockable account");
    }
    let api = Arc::new(MasternodeApi::new(Arc::new(chain)));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");
    loop {
        let (socket, peer) = listener.accept().await?;
        info!(%peer, "client connected");
        tokio::spawn(handler::handle_connection(socket, api.clone()));
    }
}
