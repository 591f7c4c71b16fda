mod core;
use anyhow::Result;
use clap::{Parser, Subcommand};
use crate::core::{Config, Core, format_coins, parse_coins};
use mnlib::crypto::Address;
use mnlib::types::MasternodeRecord;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, value_name = "FILE", default_value_os_t = PathBuf::from("mnctl.toml"))]
    config: PathBuf,

    /// node address, overrides the config
    #[arg(short, long, value_name = "ADDRESS")]
    node: Option<String>,

    /// passphrase unlocking the owner account on the node
    #[arg(long, global = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every registered masternode
    List,
    /// Show the masternode registered by, or as, an address
    Info { address: Address },
    /// Show registry totals
    Stats,
    /// Register a masternode for the owner
    Announce {
        #[arg(long)]
        owner: Option<Address>,
        #[arg(long)]
        enode: String,
    },
    /// Remove the owner's masternode
    Denounce {
        #[arg(long)]
        owner: Option<Address>,
    },
    /// Show the collateral balance of an owner
    Balance { address: Option<Address> },
    /// Lock coins as collateral
    Deposit {
        #[arg(long)]
        owner: Option<Address>,
        #[arg(long)]
        amount: String,
    },
    /// Release collateral coins
    Withdraw {
        #[arg(long)]
        owner: Option<Address>,
        #[arg(long)]
        amount: String,
    },
    GenerateConfig {
        #[arg(short, long, value_name = "FILE", default_value_os_t = PathBuf::from("mnctl.toml"))]
        output: PathBuf,
    },
}

fn generate_dummy_config(path: &PathBuf) -> Result<()> {
    let dummy_config = Config {
        default_owner: Some("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf".to_string()),
        ..Config::default()
    };
    let config_str = toml::to_string_pretty(&dummy_config)?;
    std::fs::write(path, config_str)?;
    println!("Dummy config generated at: {}", path.display());
    Ok(())
}

fn print_record(record: &MasternodeRecord) {
    if record.is_zero() {
        println!("not found");
        return;
    }
    println!("masternode:      {}", record.masternode);
    println!("owner:           {}", record.owner);
    println!("enode:           {}", record.enode);
    println!("collateral:      {}", format_coins(record.collateral));
    println!("announced block: {}", record.announced_block);
    println!("active:          {}", record.is_active);
}

async fn run(command: Commands, core: &mut Core, password: Option<String>) -> Result<()> {
    let password = core.password(password);
    match command {
        Commands::List => {
            let nodes = core.list().await?;
            println!("{} masternode(s)", nodes.len());
            for node in &nodes {
                println!(
                    "{} owner={} collateral={} active={} {}",
                    node.masternode,
                    node.owner,
                    format_coins(node.collateral),
                    node.is_active,
                    node.enode
                );
            }
        }
        Commands::Info { address } => print_record(&core.info(address).await?),
        Commands::Stats => {
            let head = core.head().await?;
            let stats = core.stats().await?;
            println!("head:              {head}");
            println!("active:            {} / {}", stats.active, stats.total);
            println!("active collateral: {}", format_coins(stats.active_collateral));
            println!("total collateral:  {}", format_coins(stats.total_collateral));
            println!("max of all times:  {}", format_coins(stats.max_of_all_times));
        }
        Commands::Announce { owner, enode } => {
            let owner = core.owner(owner)?;
            let tx = core.announce(owner, enode, password).await?;
            println!("Announce transaction sent: {tx}");
        }
        Commands::Denounce { owner } => {
            let owner = core.owner(owner)?;
            let tx = core.denounce(owner, password).await?;
            println!("Denounce transaction sent: {tx}");
        }
        Commands::Balance { address } => {
            let owner = core.owner(address)?;
            let balance = core.balance(owner).await?;
            println!(
                "Collateral: {} (last change in block {})",
                format_coins(balance.balance),
                balance.last_block
            );
        }
        Commands::Deposit { owner, amount } => {
            let owner = core.owner(owner)?;
            let tx = core.deposit(owner, parse_coins(&amount)?, password).await?;
            println!("Deposit transaction sent: {tx}");
        }
        Commands::Withdraw { owner, amount } => {
            let owner = core.owner(owner)?;
            let tx = core.withdraw(owner, parse_coins(&amount)?, password).await?;
            println!("Withdraw transaction sent: {tx}");
        }
        Commands::GenerateConfig { output } => generate_dummy_config(&output)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::GenerateConfig { output } = &cli.command {
        return generate_dummy_config(output);
    }
    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(node) = cli.node {
        config.node = node;
    }
    let mut core = Core::new(config);
    run(cli.command, &mut core, cli.password).await
}
