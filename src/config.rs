//! Configuration management for the Pharos agent
//!
//! Loads configuration from TOML files with environment variable substitution.
//! Every retry count, delay and fee value used by the submission core is a
//! named field here so tests can shrink timeouts.

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub network: NetworkConfig,
    pub wallet: WalletConfig,
    pub submission: SubmissionConfig,
    pub receipt: ReceiptConfig,
    pub fees: FeeConfig,
    pub api: ApiConfig,
    pub aquaflux_api: ApiConfig,
    pub flow: FlowConfig,
    pub contracts: ContractsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub keys_file: Option<String>,
    pub private_key_env: Option<String>,
}

/// Broadcast retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    /// Exponent cap for the 2^attempt backoff
    pub backoff_cap_exp: u32,
    pub send_timeout_secs: u64,
}

/// Receipt polling policy
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptConfig {
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
    pub attempt_timeout_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_exp: u32,
}

/// Flat test-network fee policy. Valid only for low-contention test
/// networks; a mainnet deployment would sample the fee market instead.
#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    pub max_fee_gwei: u64,
    pub priority_fee_gwei: u64,
    /// Safety margin applied to the network gas estimate, in percent
    pub gas_margin_percent: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub pacing_delay_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// Actions executed in order for every account
    pub actions: Vec<String>,
    pub staking_rounds: u32,
    pub min_step_delay_secs: u64,
    pub max_step_delay_secs: u64,
    /// Fraction of each stable balance staked per round, in percent
    pub stake_fraction_percent: u64,
    /// Amount of the source token swapped per swap step, human units
    pub swap_amount: f64,
    /// [min, max] quote-token (USDT) amount for the add-liquidity step,
    /// raw units; the base leg is derived from the pool ratio
    pub lp_quote_range: [u64; 2],
    pub transfer: Option<TransferConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    pub recipient: Address,
    /// Native amount in ether units
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    pub usdc: Address,
    pub usdt: Address,
    pub musd: Address,
    pub wphrs: Address,
    pub staking_router: Address,
    /// MockUSD vault exposing claimFaucet / getNextFaucetClaimTime
    pub faucet: Address,
    pub swap_router: Address,
    pub liquidity_router: Address,
    pub dvm_pool: Address,
    pub nft_sale: Address,
    pub aquaflux_nft: Address,
    pub aquaflux_c: Address,
    pub aquaflux_s: Address,
    pub aquaflux_cs: Address,
}

const KNOWN_ACTIONS: &[&str] = &[
    "claim",
    "stake",
    "swap",
    "add-liquidity",
    "mint",
    "aquaflux",
    "transfer",
];

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("PHAROS_AGENT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific path
    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.network.rpc_url.is_empty() {
            anyhow::bail!("network.rpc_url must be set");
        }
        if self.wallet.keys_file.is_none() && self.wallet.private_key_env.is_none() {
            anyhow::bail!("Either wallet.keys_file or wallet.private_key_env must be set");
        }
        if self.submission.max_attempts == 0 || self.receipt.max_attempts == 0 {
            anyhow::bail!("Retry attempt counts must be at least 1");
        }
        if self.flow.min_step_delay_secs > self.flow.max_step_delay_secs {
            anyhow::bail!("flow.min_step_delay_secs exceeds flow.max_step_delay_secs");
        }
        if self.flow.lp_quote_range[0] > self.flow.lp_quote_range[1] {
            anyhow::bail!("flow.lp_quote_range must be ordered [min, max]");
        }
        if self.flow.actions.is_empty() {
            anyhow::bail!("flow.actions must list at least one action");
        }
        for action in &self.flow.actions {
            if !KNOWN_ACTIONS.contains(&action.as_str()) {
                anyhow::bail!(
                    "Unknown action {:?} (known: {})",
                    action,
                    KNOWN_ACTIONS.join(", ")
                );
            }
            if action == "transfer" && self.flow.transfer.is_none() {
                anyhow::bail!("flow.transfer must be configured when the transfer action is enabled");
            }
        }
        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
    }

    let mut result = input.to_string();
    for cap in ENV_VAR.captures_iter(input) {
        let var_value = env::var(&cap[1]).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
