//! Typed configuration for the three run modes.
//!
//! Each mode reads one YAML file, then lets `BULK_TRANSFER_*` environment
//! variables override individual keys (`BULK_TRANSFER_RPC_URL`,
//! `BULK_TRANSFER_ENGINE__POLL_INTERVAL_MS`, ...). Everything is validated
//! before any transfer starts; per-transfer problems such as a malformed key
//! or a zero amount are left to the worker so they fail only that transfer.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use solana_commitment_config::CommitmentLevel;
use tracing::{debug, warn};
use validator::Validate;

use crate::app::poller::PollPolicy;
use crate::app::worker::WorkerConfig;
use crate::domain::{ConfigError, SubmitOptions, TransferIntent, ValidationError};
use crate::infra::RpcGatewayConfig;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "BULK_TRANSFER";

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
const SOL_DECIMALS: usize = 9;

/// Commitment level as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl From<Commitment> for CommitmentLevel {
    fn from(c: Commitment) -> Self {
        match c {
            Commitment::Processed => CommitmentLevel::Processed,
            Commitment::Confirmed => CommitmentLevel::Confirmed,
            Commitment::Finalized => CommitmentLevel::Finalized,
        }
    }
}

/// Optional `engine:` section shared by every mode
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct EngineSection {
    #[validate(range(min = 1, message = "poll_interval_ms must be at least 1"))]
    pub poll_interval_ms: u64,
    #[validate(range(min = 1, message = "max_poll_attempts must be at least 1"))]
    pub max_poll_attempts: u32,
    pub checkpoint_commitment: Commitment,
    pub skip_preflight: bool,
    pub preflight_commitment: Commitment,
    #[validate(range(min = 1, message = "request_timeout_secs must be at least 1"))]
    pub request_timeout_secs: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_poll_attempts: 20,
            checkpoint_commitment: Commitment::Finalized,
            skip_preflight: false,
            preflight_commitment: Commitment::Finalized,
            request_timeout_secs: 30,
        }
    }
}

impl EngineSection {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll: PollPolicy {
                interval: Duration::from_millis(self.poll_interval_ms),
                max_attempts: self.max_poll_attempts,
            },
            checkpoint_commitment: self.checkpoint_commitment.into(),
            submit: SubmitOptions {
                skip_preflight: self.skip_preflight,
                preflight_commitment: self.preflight_commitment.into(),
            },
        }
    }

    pub fn gateway_config(&self) -> RpcGatewayConfig {
        RpcGatewayConfig {
            timeout: Duration::from_secs(self.request_timeout_secs),
            commitment: self.checkpoint_commitment.into(),
        }
    }
}

/// One entry of a batch file
#[derive(Debug, Deserialize)]
pub struct TransferEntry {
    #[serde(deserialize_with = "deserialize_secret")]
    pub from_private_key: SecretString,
    pub to_address: String,
    pub amount: u64,
}

/// `batch` mode: an explicit list of transfers
#[derive(Debug, Deserialize, Validate)]
pub struct BatchConfig {
    #[validate(url(message = "rpc_url must be a valid URL"))]
    pub rpc_url: String,
    #[serde(default)]
    pub transfers: Vec<TransferEntry>,
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineSection,
}

impl BatchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_file(path)?;
        config.validate()?;
        debug!(transfers = config.transfers.len(), "Loaded batch configuration");
        Ok(config)
    }

    /// Intents in file order
    pub fn into_intents(self) -> Vec<TransferIntent> {
        self.transfers
            .into_iter()
            .map(|t| TransferIntent::new(t.from_private_key, t.to_address, t.amount))
            .collect()
    }
}

/// `wallets` mode: source keys and destinations paired by position
#[derive(Debug, Deserialize, Validate)]
pub struct WalletsConfig {
    #[serde(default, deserialize_with = "deserialize_secret_list")]
    pub from_private_keys: Vec<SecretString>,
    #[serde(default)]
    pub to_addresses: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineSection,
}

impl WalletsConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_file(path)?;
        config.validate()?;
        if !config.from_private_keys.is_empty() && config.to_addresses.is_empty() {
            return Err(ConfigError::Invalid(
                "to_addresses: at least one destination is required".to_string(),
            ));
        }
        debug!(
            sources = config.from_private_keys.len(),
            destinations = config.to_addresses.len(),
            "Loaded wallets configuration"
        );
        Ok(config)
    }
}

/// `subscribe` mode: one transfer per new slot
#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeConfig {
    #[validate(url(message = "rpc_url must be a valid URL"))]
    pub rpc_url: String,
    #[validate(url(message = "ws_url must be a valid URL"))]
    pub ws_url: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub private_key: SecretString,
    #[validate(length(min = 1, message = "recipient_address is required"))]
    pub recipient_address: String,
    #[validate(range(min = 1, message = "amount must be greater than 0"))]
    pub amount: u64,
    #[validate(range(min = 1, message = "max_transfers must be at least 1"))]
    pub max_transfers: Option<usize>,
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineSection,
}

impl SubscribeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Websocket endpoint, derived from `rpc_url` when not given
    pub fn websocket_url(&self) -> String {
        self.ws_url
            .clone()
            .unwrap_or_else(|| derive_ws_url(&self.rpc_url))
    }
}

/// Public cluster selected with `--network`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    MainnetBeta,
    Testnet,
    Devnet,
}

impl Network {
    /// Unknown names fall back to devnet with a warning
    pub fn from_name(name: &str) -> Self {
        match name {
            "mainnet-beta" => Network::MainnetBeta,
            "testnet" => Network::Testnet,
            "devnet" => Network::Devnet,
            other => {
                warn!(network = %other, "Unknown network, falling back to devnet");
                Network::Devnet
            }
        }
    }

    pub fn rpc_url(&self) -> &'static str {
        match self {
            Network::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
        }
    }
}

/// Parse a decimal SOL amount into lamports without going through floats
pub fn parse_sol_amount(input: &str) -> Result<u64, ValidationError> {
    let invalid = |message: &str| ValidationError::InvalidAmount(format!("'{}': {}", input, message));
    let s = input.trim();

    let (whole, frac) = match s.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("expected a decimal number"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected a decimal number"));
    }
    if frac.len() > SOL_DECIMALS {
        return Err(invalid("at most 9 decimal places are allowed"));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("amount too large"))?
    };
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = SOL_DECIMALS)
            .parse()
            .map_err(|_| invalid("expected a decimal number"))?
    };

    let lamports = whole
        .checked_mul(LAMPORTS_PER_SOL)
        .and_then(|l| l.checked_add(frac))
        .ok_or_else(|| invalid("amount too large"))?;
    if lamports == 0 {
        return Err(invalid("must be greater than 0"));
    }
    Ok(lamports)
}

/// `http(s)://host` to `ws(s)://host`
pub fn derive_ws_url(rpc_url: &str) -> String {
    if let Some(rest) = rpc_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = rpc_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        rpc_url.to_string()
    }
}

fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(settings.try_deserialize()?)
}

fn deserialize_secret<'de, D: Deserializer<'de>>(d: D) -> Result<SecretString, D::Error> {
    String::deserialize(d).map(SecretString::from)
}

fn deserialize_secret_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<SecretString>, D::Error> {
    Vec::<String>::deserialize(d).map(|keys| keys.into_iter().map(SecretString::from).collect())
}
