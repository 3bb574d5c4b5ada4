use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::infrastructure::ethereum::ProviderConfig;

pub const DEFAULT_RPC_URL: &str = "https://1rpc.io/sepolia";
pub const DEFAULT_BLOCK_NUMBER: u64 = 9_899_209;
pub const DEFAULT_RECIPIENT: &str = "0x4592d8f8d7b001e72cb26a73e4fa1806a51ac79d";
/// 0.01 ETH
pub const DEFAULT_TRANSFER_WEI: &str = "10000000000000000";
pub const DEFAULT_TRANSFER_GAS: u64 = 21_000;
pub const DEFAULT_COUNTER_ADDRESS: &str = "0xBc78860D20775E4cbbA1D6Ad5e434094bF9f72ef";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

pub const TRANSFER_KEY_ENV: &str = "ETHPROBE_TRANSFER_KEY";
pub const COUNTER_KEY_ENV: &str = "ETHPROBE_COUNTER_KEY";
pub const CONFIG_PATH_ENV: &str = "ETHPROBE_CONFIG";

/// A private key as read from config or environment. Debug output is redacted.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(<redacted>)")
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    pub rpc: Option<String>,
    pub ws: Option<String>,
    pub ipc: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    pub number: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub to: String,
    /// Decimal or 0x-hex wei amount
    pub value_wei: String,
    pub gas_limit: u64,
    /// Sender key; a fresh key is generated when absent
    pub private_key: Option<Secret>,
    /// Sign but do not broadcast
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub address: String,
    pub private_key: Secret,
    /// Skips `eth_estimateGas` when set
    pub gas_limit: Option<u64>,
    pub poll_interval_ms: u64,
    /// No timeout when absent
    pub receipt_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub block: BlockConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub counter: CounterConfig,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            number: DEFAULT_BLOCK_NUMBER,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            to: DEFAULT_RECIPIENT.to_string(),
            value_wei: DEFAULT_TRANSFER_WEI.to_string(),
            gas_limit: DEFAULT_TRANSFER_GAS,
            private_key: None,
            dry_run: false,
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_COUNTER_ADDRESS.to_string(),
            private_key: Secret::default(),
            gas_limit: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            receipt_timeout_secs: None,
        }
    }
}

impl EndpointConfig {
    /// IPC wins over WebSocket, WebSocket over HTTP
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        if let Some(ipc) = non_empty(&self.ipc) {
            return ipc_config(PathBuf::from(ipc));
        }
        if let Some(ws) = non_empty(&self.ws) {
            return Ok(ProviderConfig::WebSocket(ws.to_string()));
        }
        let rpc = non_empty(&self.rpc).unwrap_or(DEFAULT_RPC_URL);
        Ok(ProviderConfig::Http(rpc.to_string()))
    }
}

#[cfg(unix)]
pub fn ipc_config(path: PathBuf) -> Result<ProviderConfig> {
    Ok(ProviderConfig::Ipc(path))
}

#[cfg(not(unix))]
pub fn ipc_config(path: PathBuf) -> Result<ProviderConfig> {
    anyhow::bail!("IPC endpoints are only supported on Unix ({})", path.display())
}

impl TransferConfig {
    pub fn recipient(&self) -> Result<Address> {
        parse_address(&self.to).context("transfer.to")
    }

    pub fn value(&self) -> Result<U256> {
        U256::from_str(self.value_wei.trim())
            .with_context(|| format!("transfer.value_wei is not a number: {}", self.value_wei))
    }
}

impl CounterConfig {
    pub fn contract_address(&self) -> Result<Address> {
        parse_address(&self.address).context("counter.address")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn receipt_timeout(&self) -> Option<Duration> {
        self.receipt_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Config> {
        toml::from_str::<Config>(content).context("Invalid config file")
    }

    /// Secrets from the environment override the file
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(TRANSFER_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.transfer.private_key = Some(Secret::new(key));
        }
        if let Some(key) = lookup(COUNTER_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.counter.private_key = Secret::new(key);
        }
    }
}

/// Load the config file, falling back to defaults when none exists.
/// A file named by `--config` or `ETHPROBE_CONFIG` must exist.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    load_with(explicit, |key| std::env::var(key).ok())
}

fn load_with<F>(explicit: Option<&Path>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let requested = explicit.map(Path::to_path_buf).or_else(|| {
        lookup(CONFIG_PATH_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    });

    let mut config = match requested {
        Some(path) => read_file(&path)?,
        None => match default_config_path(&lookup) {
            Some(path) if path.exists() => read_file(&path)?,
            _ => Config::default(),
        },
    };
    config.apply_env(lookup);
    Ok(config)
}

fn read_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    Config::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
}

fn default_config_path<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(xdg) = lookup("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("ethprobe").join("config.toml"));
    }
    if let Some(home) = lookup("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("ethprobe").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "ethprobe", "ethprobe")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim()).with_context(|| format!("Invalid address: {value}"))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
