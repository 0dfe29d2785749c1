//! Swap command line
//!
//! Thin wrapper over the library for inspecting and submitting transaction
//! raws and for deriving wallet addresses.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin swap -- decode <transaction_raw>
//! cargo run --bin swap -- --config config/swap.toml submit --chain vapor <transaction_raw>
//! cargo run --bin swap -- --config config/swap.toml wallet --chain bitcoin --mnemonic "..."
//! ```

use anyhow::{Context, Result};
use bitcoin::NetworkKind;
use clap::{Parser, Subcommand, ValueEnum};
use swap::{
    decode_transaction_raw, submit_transaction_raw, Bip32Wallet, Bitcoin, Evm, KeySource, SwapConfig,
    Vapor, VaporWallet,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "swap", author, version)]
#[command(about = "HTLC swap transaction tools for Bitcoin, Ethereum, XinFin and Vapor")]
struct Args {
    /// Path to configuration file (default: config/swap.toml or SWAP_CONFIG_PATH env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the decoded JSON of a transaction raw
    Decode {
        transaction_raw: String,
    },
    /// Submit a signed transaction raw and print the transaction id
    Submit {
        #[arg(long, value_enum)]
        chain: ChainArg,
        transaction_raw: String,
    },
    /// Print the keys and address derived from a mnemonic
    Wallet {
        #[arg(long, value_enum)]
        chain: ChainArg,
        #[arg(long)]
        mnemonic: String,
        #[arg(long, default_value = "")]
        passphrase: String,
        /// Derivation path; defaults to the chain's standard path at index 0
        #[arg(long)]
        path: Option<String>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ChainArg {
    Bitcoin,
    Ethereum,
    Xinfin,
    Vapor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt::init();

    match args.command {
        Command::Decode { transaction_raw } => {
            let decoded = decode_transaction_raw(&transaction_raw)?;
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        }
        Command::Submit {
            chain,
            transaction_raw,
        } => {
            let config = SwapConfig::load_from_path(args.config.as_deref())?;
            let transaction_id = submit(&config, chain, &transaction_raw).await?;
            println!("{}", transaction_id);
        }
        Command::Wallet {
            chain,
            mnemonic,
            passphrase,
            path,
        } => {
            let config = SwapConfig::load_from_path(args.config.as_deref())?;
            wallet(&config, chain, &mnemonic, &passphrase, path.as_deref())?;
        }
    }

    Ok(())
}

async fn submit(config: &SwapConfig, chain: ChainArg, transaction_raw: &str) -> Result<String> {
    info!("Submitting {:?} transaction raw", chain);
    let transaction_id = match chain {
        ChainArg::Bitcoin => {
            let bitcoin = config.bitcoin.as_ref().context("bitcoin is not configured")?;
            submit_transaction_raw(Bitcoin::new(bitcoin)?, transaction_raw).await?
        }
        ChainArg::Ethereum => {
            let ethereum = config.ethereum.as_ref().context("ethereum is not configured")?;
            submit_transaction_raw(Evm::ethereum(ethereum)?, transaction_raw).await?
        }
        ChainArg::Xinfin => {
            let xinfin = config.xinfin.as_ref().context("xinfin is not configured")?;
            submit_transaction_raw(Evm::xinfin(xinfin)?, transaction_raw).await?
        }
        ChainArg::Vapor => {
            let vapor = config.vapor.as_ref().context("vapor is not configured")?;
            submit_transaction_raw(Vapor::new(vapor)?, transaction_raw).await?
        }
    };
    Ok(transaction_id)
}

fn wallet(
    config: &SwapConfig,
    chain: ChainArg,
    mnemonic: &str,
    passphrase: &str,
    path: Option<&str>,
) -> Result<()> {
    // Only the path template is resolved here; the wallet comes from the mnemonic.
    let key = match path {
        Some(path) => KeySource::new("").with_path(path),
        None => KeySource::new(""),
    };
    let (xprivate_key, xpublic_key, path, public_key, address) = match chain {
        ChainArg::Vapor => {
            let vapor = config.vapor.as_ref().context("vapor is not configured")?;
            let chain = Vapor::new(vapor)?;
            let path = key.path(chain.bip44_template());
            let wallet = VaporWallet::from_mnemonic(mnemonic, passphrase, &vapor.network)?
                .from_path(&path)?;
            (
                wallet.xprivate_key(),
                wallet.xpublic_key(),
                path,
                wallet.public_key(),
                wallet.address()?,
            )
        }
        ChainArg::Bitcoin => {
            let bitcoin = config.bitcoin.as_ref().context("bitcoin is not configured")?;
            let chain = Bitcoin::new(bitcoin)?;
            let network = NetworkKind::from(chain.bitcoin_network());
            let path = key.path(chain.bip44_template());
            let wallet = Bip32Wallet::from_mnemonic(mnemonic, passphrase, network)?.from_path(&path)?;
            let address = chain.wallet_address(&wallet);
            (
                wallet.xprivate_key(),
                wallet.xpublic_key(),
                path,
                wallet.public_key().to_string(),
                address,
            )
        }
        ChainArg::Ethereum | ChainArg::Xinfin => {
            let chain = match chain {
                ChainArg::Xinfin => {
                    Evm::xinfin(config.xinfin.as_ref().context("xinfin is not configured")?)?
                }
                _ => Evm::ethereum(config.ethereum.as_ref().context("ethereum is not configured")?)?,
            };
            let path = key.path(chain.bip44_template());
            let wallet =
                Bip32Wallet::from_mnemonic(mnemonic, passphrase, NetworkKind::Main)?.from_path(&path)?;
            let address = chain.wallet_address(&wallet)?;
            (
                wallet.xprivate_key(),
                wallet.xpublic_key(),
                path,
                wallet.public_key().to_string(),
                address,
            )
        }
    };

    println!("xprivate_key: {}", xprivate_key);
    println!("xpublic_key : {}", xpublic_key);
    println!("path       : {}", path);
    println!("public_key : {}", public_key);
    println!("address    : {}", address);
    Ok(())
}
