use crate::encoding::parse_address;
use anyhow::{anyhow, Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::{env, fs, path::Path};

/// Network file as written on disk (e.g. `networks/sepolia.json`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfigRaw {
    pub chain_id: u64,
    #[serde(default)]
    pub rpc: Option<String>,
    /// Name of an environment variable holding the RPC URL, so provider API
    /// keys stay out of committed files.
    #[serde(default)]
    pub rpc_env_var: Option<String>,
    pub entry_point: String,
    #[serde(default)]
    pub factory: Option<String>,
    #[serde(default)]
    pub bundler_url: Option<String>,
    #[serde(default)]
    pub paymaster_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub entry_point: Address,
    pub factory: Option<Address>,
    pub bundler_url: Option<String>,
    pub paymaster_url: Option<String>,
}

pub fn load_network(path: &Path, rpc_override: Option<String>) -> Result<NetworkConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read network json at {}", path.display()))?;
    let raw: NetworkConfigRaw = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse network json at {}", path.display()))?;

    resolve(raw, rpc_override)
}

/// Applies the override order: explicit flag, then `rpcEnvVar`, then `rpc`.
pub fn resolve(raw: NetworkConfigRaw, rpc_override: Option<String>) -> Result<NetworkConfig> {
    let rpc_url = rpc_override
        .or_else(|| raw.rpc_env_var.as_ref().and_then(|k| env::var(k).ok()))
        .or_else(|| raw.rpc.clone())
        .ok_or_else(|| {
            anyhow!("no rpc url: pass --rpc, set the env var named by rpcEnvVar, or include rpc in the network json")
        })?;

    if rpc_url.contains("alchemy.com/v2/") || rpc_url.contains("infura.io/v3/") {
        tracing::warn!("RPC URL looks like it may contain an API key; consider rpcEnvVar instead of committing it.");
    }

    let entry_point = parse_address(&raw.entry_point).context("invalid entryPoint address")?;
    let factory = raw
        .factory
        .as_deref()
        .map(parse_address)
        .transpose()
        .context("invalid factory address")?;

    Ok(NetworkConfig {
        chain_id: raw.chain_id,
        rpc_url,
        entry_point,
        factory,
        bundler_url: raw.bundler_url,
        paymaster_url: raw.paymaster_url,
    })
}
