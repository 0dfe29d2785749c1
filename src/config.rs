//! Configuration Management Module
//!
//! Per-chain connection settings. Every chain value is built from one of these
//! structs and passed to the chain constructor; nothing is read from globals.

use serde::{Deserialize, Serialize};

use crate::{bitcoin, evm, vapor};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Top-level configuration file (`config/swap.toml`).
///
/// Every section is optional; only configured chains can be used by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwapConfig {
    #[serde(default)]
    pub bitcoin: Option<BitcoinConfig>,
    #[serde(default)]
    pub ethereum: Option<EvmConfig>,
    #[serde(default)]
    pub xinfin: Option<EvmConfig>,
    #[serde(default)]
    pub vapor: Option<VaporConfig>,
}

/// Configuration for a Bitcoin network reached through an Esplora API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BitcoinConfig {
    /// "mainnet", "testnet" or "regtest"
    pub network: String,
    /// Esplora API root
    pub api_url: String,
    /// Fixed fee rate in sat/vB; queried from the API when absent
    #[serde(default)]
    pub fee_rate: Option<f64>,
    /// Confirmation target (blocks) used to pick the API fee estimate
    #[serde(default = "default_confirmation_target")]
    pub confirmation_target: u16,
}

/// Configuration for an EVM chain hosting the HTLC contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvmConfig {
    /// e.g. "mainnet", "ropsten" (Ethereum) or "mainnet", "apothem" (XinFin)
    pub network: String,
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// EIP-155 chain ID
    pub chain_id: u64,
    /// Address of the deployed HTLC contract
    pub contract_address: String,
}

/// Configuration for the Vapor chain reached through a blockcenter API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaporConfig {
    /// "mainnet", "solonet" or "testnet"
    pub network: String,
    /// Blockcenter API root
    pub api_url: String,
    /// Asset id moved by HTLC transactions
    #[serde(default = "default_vapor_asset")]
    pub asset: String,
    /// Fee offered to the blockcenter, in NEU
    #[serde(default = "default_vapor_fee")]
    pub fee: u64,
    /// Minimum confirmations of spent wallet outputs
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
}

fn default_confirmation_target() -> u16 {
    6
}

fn default_vapor_asset() -> String {
    vapor::BTM_ASSET.to_string()
}

fn default_vapor_fee() -> u64 {
    10_000_000
}

fn default_confirmations() -> u64 {
    1
}

// ============================================================================
// PRESETS
// ============================================================================

impl BitcoinConfig {
    pub fn mainnet() -> Self {
        Self {
            network: "mainnet".to_string(),
            api_url: "https://blockstream.info/api".to_string(),
            fee_rate: None,
            confirmation_target: default_confirmation_target(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: "testnet".to_string(),
            api_url: "https://blockstream.info/testnet/api".to_string(),
            fee_rate: None,
            confirmation_target: default_confirmation_target(),
        }
    }
}

impl VaporConfig {
    pub fn mainnet() -> Self {
        Self {
            network: "mainnet".to_string(),
            api_url: "https://bcapi.bystack.com/api/v2/vapor".to_string(),
            asset: default_vapor_asset(),
            fee: default_vapor_fee(),
            confirmations: default_confirmations(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: "testnet".to_string(),
            api_url: "https://test-bcapi.bystack.com/api/v2/vapor".to_string(),
            ..Self::mainnet()
        }
    }
}

// ============================================================================
// LOADING AND VALIDATION
// ============================================================================

impl SwapConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to config file. If None, uses SWAP_CONFIG_PATH env var or
    ///   `config/swap.toml`.
    ///
    /// # Returns
    ///
    /// * `Ok(SwapConfig)` - Successfully loaded and validated configuration
    /// * `Err(anyhow::Error)` - File missing, unparsable or invalid
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("SWAP_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/swap.toml".to_string());

        if !std::path::Path::new(&config_path).exists() {
            return Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/swap.template.toml config/swap.toml\n\
                Then edit config/swap.toml with your actual values.",
                config_path
            ));
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: SwapConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the default location.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks:
    /// - Networks are known for their chain
    /// - Endpoint URLs are not empty
    /// - EVM chain IDs are non-zero and contract addresses are well formed
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(bitcoin) = &self.bitcoin {
            if !bitcoin::is_network(&bitcoin.network) {
                anyhow::bail!("Configuration error: unknown bitcoin network '{}'", bitcoin.network);
            }
            require_url("bitcoin", &bitcoin.api_url)?;
            if let Some(rate) = bitcoin.fee_rate {
                if rate <= 0.0 {
                    anyhow::bail!("Configuration error: bitcoin fee_rate must be positive");
                }
            }
        }

        for (name, evm_config, is_network) in [
            ("ethereum", &self.ethereum, evm::is_ethereum_network as fn(&str) -> bool),
            ("xinfin", &self.xinfin, evm::is_xinfin_network as fn(&str) -> bool),
        ] {
            if let Some(cfg) = evm_config {
                if !is_network(&cfg.network) {
                    anyhow::bail!("Configuration error: unknown {} network '{}'", name, cfg.network);
                }
                require_url(name, &cfg.rpc_url)?;
                if cfg.chain_id == 0 {
                    anyhow::bail!("Configuration error: {} chain_id must be non-zero", name);
                }
                if !evm::is_address(&cfg.contract_address) {
                    anyhow::bail!(
                        "Configuration error: invalid {} contract_address '{}'",
                        name,
                        cfg.contract_address
                    );
                }
            }
        }

        if let Some(vapor) = &self.vapor {
            if !vapor::is_network(&vapor.network) {
                anyhow::bail!("Configuration error: unknown vapor network '{}'", vapor.network);
            }
            require_url("vapor", &vapor.api_url)?;
            if vapor.asset.len() != 64 || hex::decode(&vapor.asset).is_err() {
                anyhow::bail!("Configuration error: invalid vapor asset '{}'", vapor.asset);
            }
        }

        Ok(())
    }
}

fn require_url(chain: &str, url: &str) -> anyhow::Result<()> {
    if url.trim().is_empty() {
        anyhow::bail!("Configuration error: {} endpoint URL is empty", chain);
    }
    Ok(())
}
