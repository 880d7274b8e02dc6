//! Canonical ERC-4337 (EntryPoint v0.6) UserOperation hash.
//!
//! This must match `EntryPoint.getUserOpHash` bit for bit:
//!
//! ```text
//! inner = keccak256(abi.encode(sender, nonce, keccak256(initCode), keccak256(callData),
//!                              callGasLimit, verificationGasLimit, preVerificationGas,
//!                              maxFeePerGas, maxPriorityFeePerGas, keccak256(paymasterAndData)))
//! hash  = keccak256(abi.encode(inner, entryPoint, chainId))
//! ```
//!
//! The signature field never takes part.
use crate::types::UserOperation;
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;

/// ABI encoding of the fixed-width tuple hashed into the inner digest.
pub fn pack_for_hash(op: &UserOperation) -> Bytes {
    encode(&[
        Token::Address(op.sender),
        Token::Uint(op.nonce),
        Token::FixedBytes(keccak256(&op.init_code).to_vec()),
        Token::FixedBytes(keccak256(&op.call_data).to_vec()),
        Token::Uint(op.call_gas_limit),
        Token::Uint(op.verification_gas_limit),
        Token::Uint(op.pre_verification_gas),
        Token::Uint(op.max_fee_per_gas),
        Token::Uint(op.max_priority_fee_per_gas),
        Token::FixedBytes(keccak256(&op.paymaster_and_data).to_vec()),
    ])
    .into()
}

pub fn user_operation_hash(op: &UserOperation, entry_point: Address, chain_id: u64) -> H256 {
    let inner = keccak256(pack_for_hash(op));
    let outer = encode(&[
        Token::FixedBytes(inner.to_vec()),
        Token::Address(entry_point),
        Token::Uint(U256::from(chain_id)),
    ]);
    H256(keccak256(outer))
}
