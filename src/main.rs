//! Offline HD wallet tool: mnemonic generation/validation, address derivation and
//! plugin inspection over the same plugins the pool units use.
use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hdwallet_pool::core::types::RangeRequestUnit;
use hdwallet_pool::{HdWalletConfig, PluginRegistry};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "hdwallet-pool")]
#[command(about = "Multi-chain HD wallet tool")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// TOML configuration file; defaults plus environment overrides when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chain plugin to use (overrides the configured chain)
    #[arg(long, global = true)]
    chain: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a freshly generated mnemonic
    GenerateMnemonic {
        /// 12, 15, 18, 21 or 24
        #[arg(long)]
        words: Option<usize>,
    },
    /// Check a mnemonic read from stdin
    ValidateMnemonic,
    /// Derive addresses for a mnemonic read from stdin
    Derive {
        #[arg(long, default_value_t = 0)]
        account: u32,
        #[arg(long, default_value_t = 0)]
        change: u32,
        #[arg(long, default_value_t = 0)]
        from: u32,
        #[arg(long, default_value_t = 0)]
        to: u32,
        /// Also print the account-level extended public key
        #[arg(long)]
        xpub: bool,
    },
    /// List registered chain plugins
    Chains,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let mut config = match &args.config {
        Some(path) => HdWalletConfig::load(path)?,
        None => {
            let mut config = HdWalletConfig::default();
            config.apply_env_overrides()?;
            config
        }
    };
    if let Some(chain) = args.chain {
        config.chain.name = chain;
    }
    if let Commands::GenerateMnemonic { words: Some(words) } = &args.command {
        config.mnemonic.words_count = *words;
    }
    config.validate()?;

    let registry = PluginRegistry::with_builtin(&config)?;
    let plugin = registry.get(&config.chain.name)?;
    info!(chain = plugin.name(), chain_id = plugin.chain_id(), "using chain plugin");

    match args.command {
        Commands::GenerateMnemonic { .. } => {
            let phrase = plugin.generate_mnemonic()?;
            println!("{}", phrase.expose_secret());
        }
        Commands::ValidateMnemonic => {
            let phrase = read_mnemonic()?;
            let valid = plugin.validate_mnemonic(phrase.expose_secret());
            println!("{}", json!({ "valid": valid }));
            if !valid {
                std::process::exit(1);
            }
        }
        Commands::Derive { account, change, from, to, xpub } => {
            let phrase = read_mnemonic()?;
            if !plugin.validate_mnemonic(phrase.expose_secret()) {
                bail!("invalid mnemonic");
            }
            let unit = plugin.new_pool_unit(Uuid::new_v4(), phrase.expose_secret())?;
            let (count, accounts) = unit.get_multiple_accounts(&[RangeRequestUnit::new(account, change, from, to)])?;
            let account_xpub = if xpub { Some(unit.account_extended_public_key(account)?) } else { None };
            unit.unload_wallet();
            let output = json!({
                "chain": plugin.name(),
                "count": count,
                "accounts": accounts,
                "account_xpub": account_xpub,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Chains => {
            let chains: Vec<_> = registry
                .plugins()
                .map(|p| {
                    json!({
                        "name": p.name(),
                        "build_info": p.build_info(),
                        "params": p.chain_params(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&chains)?);
        }
    }
    Ok(())
}

fn read_mnemonic() -> Result<SecretString> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read mnemonic from stdin")?;
    let phrase = SecretString::new(line.trim().to_string());
    zeroize::Zeroize::zeroize(&mut line);
    Ok(phrase)
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
