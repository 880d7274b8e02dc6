use crate::encoding::{self, user_op_to_json};
use crate::error::UserOpError;
use crate::rpc::JsonRpcTransport;
use crate::types::UserOperation;
use anyhow::{anyhow, Context, Result};
use ethers::abi::{encode, Token};
use ethers::signers::Signer;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use serde_json::Value;

/// `paymaster ++ extra`, with no delimiter. Empty `extra` yields exactly the
/// 20 address bytes.
pub fn paymaster_and_data(paymaster: Address, extra: &[u8]) -> Bytes {
    let mut v = Vec::with_capacity(20 + extra.len());
    v.extend_from_slice(paymaster.as_bytes());
    v.extend_from_slice(extra);
    Bytes::from(v)
}

/// Returns `op` with `paymasterAndData = paymaster ++ extra` and an empty
/// signature, since any previous signature covered different bytes.
pub fn attach(op: UserOperation, paymaster: Address, extra: &[u8]) -> UserOperation {
    UserOperation {
        paymaster_and_data: paymaster_and_data(paymaster, extra),
        signature: Bytes::default(),
        ..op
    }
}

/// The paymaster named in `paymasterAndData`, if any.
pub fn paymaster_address(paymaster_and_data: &[u8]) -> Option<Address> {
    if paymaster_and_data.len() < 20 {
        return None;
    }
    Some(Address::from_slice(&paymaster_and_data[..20]))
}

/// Validity window for a verifying-paymaster sponsorship (unix seconds,
/// `valid_until == 0` means no expiry).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Validity {
    pub valid_until: u64,
    pub valid_after: u64,
}

const UINT48_MAX: u64 = (1 << 48) - 1;

/// Hash a verifying-paymaster signer commits to: the operation fields bound to
/// the chain, the paymaster and the validity window. `paymasterAndData` and
/// `signature` are not covered.
///
/// Unlike the eth-infinitism v0.6 `VerifyingPaymaster.getHash`, the
/// per-sender `senderNonce` is not part of the encoding. Signatures made here
/// are rejected by a deployed paymaster that hashes it; use such a paymaster
/// through its own signing service instead.
pub fn sponsorship_hash(
    op: &UserOperation,
    paymaster: Address,
    chain_id: u64,
    validity: Validity,
) -> H256 {
    let encoded = encode(&[
        Token::Address(op.sender),
        Token::Uint(op.nonce),
        Token::FixedBytes(keccak256(&op.init_code).to_vec()),
        Token::FixedBytes(keccak256(&op.call_data).to_vec()),
        Token::Uint(op.call_gas_limit),
        Token::Uint(op.verification_gas_limit),
        Token::Uint(op.pre_verification_gas),
        Token::Uint(op.max_fee_per_gas),
        Token::Uint(op.max_priority_fee_per_gas),
        Token::Uint(U256::from(chain_id)),
        Token::Address(paymaster),
        Token::Uint(U256::from(validity.valid_until)),
        Token::Uint(U256::from(validity.valid_after)),
    ]);
    H256(keccak256(encoded))
}

/// Signs a verifying-paymaster sponsorship and attaches
/// `paymaster ++ abi.encode(uint48 validUntil, uint48 validAfter) ++ signature`.
pub async fn sponsor<S: Signer>(
    op: UserOperation,
    paymaster: Address,
    chain_id: u64,
    validity: Validity,
    signer: Option<&S>,
) -> Result<UserOperation, UserOpError> {
    let signer = signer.ok_or(UserOpError::SignerUnavailable)?;
    if validity.valid_until > UINT48_MAX || validity.valid_after > UINT48_MAX {
        return Err(UserOpError::InvalidUserOperation(
            "sponsorship validity does not fit in uint48".into(),
        ));
    }

    let hash = sponsorship_hash(&op, paymaster, chain_id, validity);
    let sig = signer
        .sign_message(hash.as_bytes())
        .await
        .map_err(|e| UserOpError::Signing(e.to_string()))?;

    let mut extra = encode(&[
        Token::Uint(U256::from(validity.valid_until)),
        Token::Uint(U256::from(validity.valid_after)),
    ]);
    extra.extend_from_slice(&sig.to_vec());

    tracing::debug!(
        paymaster = %encoding::fmt_address(paymaster),
        valid_until = validity.valid_until,
        valid_after = validity.valid_after,
        "attached verifying paymaster sponsorship"
    );

    Ok(attach(op, paymaster, &extra))
}

/// Minimal ERC-7677 paymaster web service client.
///
/// Implements `pm_getPaymasterStubData` and `pm_getPaymasterData` so the
/// service stays vendor-portable.
#[derive(Debug, Clone)]
pub struct PaymasterClient {
    rpc: JsonRpcTransport,
}

/// Service-specific sponsorship context.
#[derive(Debug, Clone, Default)]
pub struct SponsorContext {
    pub policy_id: String,
    pub webhook_data: Option<String>,
}

impl PaymasterClient {
    pub fn new(url: String) -> Self {
        Self {
            rpc: JsonRpcTransport::new(url),
        }
    }

    pub async fn get_paymaster_stub_data(
        &self,
        op: &UserOperation,
        entrypoint: Address,
        chain_id: u64,
        ctx: &SponsorContext,
    ) -> Result<Bytes> {
        let params = build_params(op, entrypoint, chain_id, ctx);
        let res = self
            .rpc
            .call("pm_getPaymasterStubData", params)
            .await
            .context("pm_getPaymasterStubData RPC failed")?;
        parse_v06_paymaster_and_data(&res)
    }

    pub async fn get_paymaster_data(
        &self,
        op: &UserOperation,
        entrypoint: Address,
        chain_id: u64,
        ctx: &SponsorContext,
    ) -> Result<Bytes> {
        let params = build_params(op, entrypoint, chain_id, ctx);
        let res = self
            .rpc
            .call("pm_getPaymasterData", params)
            .await
            .context("pm_getPaymasterData RPC failed")?;
        parse_v06_paymaster_and_data(&res)
    }
}

fn build_params(
    op: &UserOperation,
    entrypoint: Address,
    chain_id: u64,
    ctx: &SponsorContext,
) -> Value {
    let mut context = serde_json::json!({
        "policyId": ctx.policy_id,
    });

    if let Some(wd) = ctx.webhook_data.as_deref() {
        if let Some(obj) = context.as_object_mut() {
            obj.insert("webhookData".to_string(), Value::String(wd.to_string()));
        }
    }

    serde_json::json!([
        user_op_to_json(op),
        encoding::fmt_address(entrypoint),
        encoding::fmt_u256(U256::from(chain_id)),
        context
    ])
}

fn parse_v06_paymaster_and_data(result: &Value) -> Result<Bytes> {
    // ERC-7677 puts v0.6 data at the top level: { "paymasterAndData": "0x..." }.
    // Some services wrap it: { "entrypointV06Response": { "paymasterAndData": "0x..." } }.
    let field = if let Some(s) = result.get("paymasterAndData").and_then(|x| x.as_str()) {
        s
    } else {
        result
            .get("entrypointV06Response")
            .or_else(|| result.get("entryPointV06Response"))
            .ok_or_else(|| {
                anyhow!(
                    "missing paymasterAndData (expected top-level paymasterAndData or entrypointV06Response.paymasterAndData)"
                )
            })?
            .get("paymasterAndData")
            .and_then(|x| x.as_str())
            .ok_or_else(|| anyhow!("missing paymasterAndData field"))?
    };

    let bytes = encoding::parse_bytes(field).context("invalid hex in paymasterAndData")?;
    if !bytes.is_empty() && bytes.len() < 20 {
        return Err(anyhow!(
            "paymasterAndData is {} bytes; expected at least a 20-byte paymaster address",
            bytes.len()
        ));
    }
    Ok(bytes)
}
