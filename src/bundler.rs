use crate::encoding::{
    fmt_address, fmt_h256, parse_address, parse_h256, parse_u256_quantity, user_op_to_json,
};
use crate::rpc::JsonRpcTransport;
use crate::types::{GasLimits, SignedUserOperation, UserOperation};
use anyhow::{anyhow, Context, Result};
use ethers::types::{Address, H256, U256};
use serde_json::Value;
use std::time::Duration;

/// ERC-4337 bundler JSON-RPC client.
#[derive(Debug, Clone)]
pub struct BundlerClient {
    rpc: JsonRpcTransport,
}

impl BundlerClient {
    pub fn new(url: String) -> Self {
        Self {
            rpc: JsonRpcTransport::new(url),
        }
    }

    /// `op` is typically signed with a dummy signature at this point; bundlers
    /// simulate validation and need a well-formed one.
    pub async fn estimate_user_operation_gas(
        &self,
        op: &UserOperation,
        entrypoint: Address,
    ) -> Result<GasLimits> {
        let params = serde_json::json!([user_op_to_json(op), fmt_address(entrypoint)]);
        let res = self
            .rpc
            .call("eth_estimateUserOperationGas", params)
            .await
            .context("eth_estimateUserOperationGas failed")?;

        parse_gas_estimates(&res)
    }

    pub async fn send_user_operation(
        &self,
        op: &SignedUserOperation,
        entrypoint: Address,
    ) -> Result<H256> {
        let params = serde_json::json!([user_op_to_json(op), fmt_address(entrypoint)]);
        let res = self
            .rpc
            .call("eth_sendUserOperation", params)
            .await
            .context("eth_sendUserOperation failed")?;

        let hash = parse_userop_hash(&res)?;
        if hash != op.hash() {
            tracing::warn!(
                bundler = %fmt_h256(hash),
                local = %fmt_h256(op.hash()),
                "bundler returned a different userOpHash than computed locally"
            );
        }
        Ok(hash)
    }

    pub async fn supported_entry_points(&self) -> Result<Vec<Address>> {
        let res = self
            .rpc
            .call("eth_supportedEntryPoints", serde_json::json!([]))
            .await
            .context("eth_supportedEntryPoints failed")?;

        res.as_array()
            .ok_or_else(|| anyhow!("expected an array of entry points, got {res}"))?
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| anyhow!("entry point is not a string: {v}"))
                    .and_then(parse_address)
            })
            .collect()
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let res = self
            .rpc
            .call("eth_chainId", serde_json::json!([]))
            .await
            .context("eth_chainId failed")?;
        let s = res
            .as_str()
            .ok_or_else(|| anyhow!("eth_chainId returned a non-string: {res}"))?;
        let id = parse_u256_quantity(s)?;
        if id > U256::from(u64::MAX) {
            return Err(anyhow!("chain id {id} exceeds u64"));
        }
        Ok(id.as_u64())
    }

    /// Poll for a receipt until timeout. A zero timeout waits forever.
    pub async fn wait_user_operation_receipt(
        &self,
        user_op_hash: H256,
        timeout: Duration,
    ) -> Result<Value> {
        let start = std::time::Instant::now();
        loop {
            if receipt_wait_expired(start.elapsed(), timeout) {
                return Err(anyhow!(
                    "timed out waiting for userOp receipt after {:?}",
                    timeout
                ));
            }

            let params = serde_json::json!([fmt_h256(user_op_hash)]);
            match self.rpc.call("eth_getUserOperationReceipt", params).await {
                Ok(v) => {
                    if !v.is_null() {
                        return Ok(v);
                    }
                }
                Err(e) => {
                    // transient errors are common on free-tier bundlers; keep polling
                    tracing::warn!(error = %e, "bundler receipt poll error");
                }
            }

            tokio::time::sleep(Duration::from_millis(1500)).await;
        }
    }
}

/// Only an exact zero timeout waits forever.
fn receipt_wait_expired(elapsed: Duration, timeout: Duration) -> bool {
    !timeout.is_zero() && elapsed > timeout
}

fn parse_gas_estimates(v: &Value) -> Result<GasLimits> {
    Ok(GasLimits {
        call_gas_limit: parse_u256_field(v, "callGasLimit")?,
        verification_gas_limit: parse_u256_field(v, "verificationGasLimit")?,
        pre_verification_gas: parse_u256_field(v, "preVerificationGas")?,
    })
}

fn parse_u256_field(v: &Value, key: &str) -> Result<U256> {
    match v.get(key) {
        Some(Value::String(s)) => parse_u256_quantity(s),
        // some bundlers answer with plain JSON numbers
        Some(Value::Number(n)) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| anyhow!("field {key} is not a non-negative integer")),
        _ => Err(anyhow!("missing or invalid field {key}")),
    }
}

fn parse_userop_hash(res: &Value) -> Result<H256> {
    // Most bundlers return the userOpHash directly as a JSON string; some wrap it.
    let hash_str = if let Some(s) = res.as_str() {
        s
    } else if let Some(s) = res.get("result").and_then(|v| v.as_str()) {
        s
    } else if let Some(s) = res.get("userOpHash").and_then(|v| v.as_str()) {
        s
    } else if let Some(s) = res.get("userOperationHash").and_then(|v| v.as_str()) {
        s
    } else {
        return Err(anyhow!(
            "unexpected eth_sendUserOperation result shape (expected string or {{result: ...}}): {}",
            res
        ));
    };

    parse_h256(hash_str)
}
