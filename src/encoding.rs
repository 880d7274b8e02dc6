use crate::types::UserOperation;
use anyhow::{anyhow, Context};
use ethers::types::{Address, Bytes, H256, U256};

pub fn fmt_address(addr: Address) -> String {
    format!("0x{}", hex::encode(addr.as_bytes()))
}

pub fn fmt_h256(h: H256) -> String {
    format!("0x{}", hex::encode(h.as_bytes()))
}

/// JSON-RPC "quantity" encoding.
pub fn fmt_u256(v: U256) -> String {
    if v.is_zero() {
        "0x0".to_string()
    } else {
        format!("0x{:x}", v)
    }
}

pub fn fmt_bytes(b: &Bytes) -> String {
    format!("0x{}", hex::encode(b.as_ref()))
}

/// Wire form used by bundlers and paymaster services.
pub fn user_op_to_json(op: &UserOperation) -> serde_json::Value {
    serde_json::json!({
        "sender": fmt_address(op.sender),
        "nonce": fmt_u256(op.nonce),
        "initCode": fmt_bytes(&op.init_code),
        "callData": fmt_bytes(&op.call_data),
        "callGasLimit": fmt_u256(op.call_gas_limit),
        "verificationGasLimit": fmt_u256(op.verification_gas_limit),
        "preVerificationGas": fmt_u256(op.pre_verification_gas),
        "maxFeePerGas": fmt_u256(op.max_fee_per_gas),
        "maxPriorityFeePerGas": fmt_u256(op.max_priority_fee_per_gas),
        "paymasterAndData": fmt_bytes(&op.paymaster_and_data),
        "signature": fmt_bytes(&op.signature),
    })
}

pub fn user_op_from_json(v: &serde_json::Value) -> anyhow::Result<UserOperation> {
    serde_json::from_value(v.clone()).context("malformed UserOperation JSON")
}

pub fn parse_u256_quantity(s: &str) -> anyhow::Result<U256> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Ok(U256::zero());
    }
    Ok(U256::from_str_radix(s, 16)?)
}

/// Accepts `0x`-prefixed hex or a plain decimal string.
pub fn parse_u256(s: &str) -> anyhow::Result<U256> {
    if s.starts_with("0x") || s.starts_with("0X") {
        return parse_u256_quantity(&s[2..]);
    }
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        anyhow::bail!("expected a non-negative integer, got {s:?}");
    }
    Ok(U256::from_dec_str(s)?)
}

pub fn parse_h256(s: &str) -> anyhow::Result<H256> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        anyhow::bail!("expected 32-byte hex, got {} bytes", bytes.len());
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(H256(arr))
}

pub fn parse_address(s: &str) -> anyhow::Result<Address> {
    let hex_str = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(hex_str).with_context(|| format!("invalid hex address {s:?}"))?;
    if bytes.len() != 20 {
        return Err(anyhow!("expected 20-byte address, got {} bytes", bytes.len()));
    }
    Ok(Address::from_slice(&bytes))
}

pub fn parse_bytes(s: &str) -> anyhow::Result<Bytes> {
    let hex_str = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(hex_str).with_context(|| format!("invalid hex bytes {s:?}"))?;
    Ok(Bytes::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_encoding_has_no_leading_zeros() {
        assert_eq!(fmt_u256(U256::zero()), "0x0");
        assert_eq!(fmt_u256(U256::from(1114u64)), "0x45a");
    }

    #[test]
    fn parse_u256_accepts_hex_and_decimal() {
        assert_eq!(parse_u256("0x45a").unwrap(), U256::from(1114u64));
        assert_eq!(parse_u256("1114").unwrap(), U256::from(1114u64));
        assert!(parse_u256("-1").is_err());
        assert!(parse_u256("1.5").is_err());
        assert!(parse_u256("").is_err());
    }

    #[test]
    fn parse_address_rejects_wrong_length() {
        assert!(parse_address("0x1234").is_err());
        assert_eq!(
            parse_address("0x1111111111111111111111111111111111111111").unwrap(),
            Address::repeat_byte(0x11)
        );
    }

    #[test]
    fn user_op_json_uses_camel_case_wire_names() {
        let op = UserOperation {
            sender: Address::repeat_byte(0x11),
            nonce: U256::from(5u64),
            call_data: Bytes::from(vec![0xab, 0xcd]),
            ..Default::default()
        };
        let v = user_op_to_json(&op);
        assert_eq!(v["sender"], "0x1111111111111111111111111111111111111111");
        assert_eq!(v["nonce"], "0x5");
        assert_eq!(v["initCode"], "0x");
        assert_eq!(v["callData"], "0xabcd");
        assert_eq!(v["paymasterAndData"], "0x");
        assert_eq!(user_op_from_json(&v).unwrap(), op);
    }
}
