use crate::encoding::{parse_address, parse_bytes, parse_u256};
use crate::error::UserOpError;
use ethers::types::{Address, Bytes, H256, U256};
use serde::Deserialize;
use std::ops::Deref;

/// Placeholder gas limits. The builder performs no gas estimation of its own;
/// callers that need real numbers should overwrite these with a bundler's
/// `eth_estimateUserOperationGas` response (see [`UserOperation::with_gas_estimates`]).
pub const PLACEHOLDER_CALL_GAS_LIMIT: u64 = 100_000;
pub const PLACEHOLDER_VERIFICATION_GAS_LIMIT: u64 = 100_000;
pub const PLACEHOLDER_PRE_VERIFICATION_GAS: u64 = 21_000;

/// Fee used for both caps when the network yields no fee estimate (1 gwei).
pub const DEFAULT_FEE_PER_GAS: u64 = 1_000_000_000;

/// ERC-4337 UserOperation (EntryPoint v0.6 layout).
///
/// `sender`, `nonce`, `callData` and the five gas/fee fields are mandatory when
/// decoding from JSON; `initCode`, `paymasterAndData` and `signature` may be
/// omitted and default to empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    #[serde(default)]
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    #[serde(default)]
    pub paymaster_and_data: Bytes,
    #[serde(default)]
    pub signature: Bytes,
}

impl UserOperation {
    /// Returns a copy with bundler gas estimates applied. The signature is
    /// cleared because it no longer covers the new values.
    pub fn with_gas_estimates(self, gas: GasLimits) -> Self {
        Self {
            call_gas_limit: gas.call_gas_limit,
            verification_gas_limit: gas.verification_gas_limit,
            pre_verification_gas: gas.pre_verification_gas,
            signature: Bytes::default(),
            ..self
        }
    }

    /// Returns a copy carrying `signature`. Used for dummy signatures during
    /// gas estimation; real signatures come from [`crate::signer::sign`].
    pub fn with_signature(self, signature: Bytes) -> Self {
        Self { signature, ..self }
    }
}

/// A UserOperation that has been signed over `hash`.
///
/// Only read access is exposed. To change any field, take the operation back
/// out with [`SignedUserOperation::into_unsigned`] and sign the result again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedUserOperation {
    hash: H256,
    op: UserOperation,
}

impl SignedUserOperation {
    pub(crate) fn new(hash: H256, op: UserOperation) -> Self {
        Self { hash, op }
    }

    /// The UserOperation hash the signature was produced over.
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Drops the signature and returns the operation for further edits.
    pub fn into_unsigned(self) -> UserOperation {
        self.op.with_signature(Bytes::default())
    }
}

impl Deref for SignedUserOperation {
    type Target = UserOperation;

    fn deref(&self) -> &Self::Target {
        &self.op
    }
}

impl AsRef<UserOperation> for SignedUserOperation {
    fn as_ref(&self) -> &UserOperation {
        &self.op
    }
}

/// The three gas limits of a UserOperation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasLimits {
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
}

impl Default for GasLimits {
    fn default() -> Self {
        Self {
            call_gas_limit: U256::from(PLACEHOLDER_CALL_GAS_LIMIT),
            verification_gas_limit: U256::from(PLACEHOLDER_VERIFICATION_GAS_LIMIT),
            pre_verification_gas: U256::from(PLACEHOLDER_PRE_VERIFICATION_GAS),
        }
    }
}

/// EIP-1559 fee caps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl FeeEstimate {
    pub fn fallback() -> Self {
        Self {
            max_fee_per_gas: U256::from(DEFAULT_FEE_PER_GAS),
            max_priority_fee_per_gas: U256::from(DEFAULT_FEE_PER_GAS),
        }
    }
}

/// What the account should execute: `to.call{value}(data)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionIntent {
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub nonce: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl TransactionIntent {
    pub fn new(to: Address) -> Self {
        Self {
            to: Some(to),
            ..Default::default()
        }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn data(mut self, data: Bytes) -> Self {
        self.data = data;
        self
    }

    pub fn nonce(mut self, nonce: U256) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn fees(mut self, max_fee_per_gas: U256, max_priority_fee_per_gas: U256) -> Self {
        self.max_fee_per_gas = Some(max_fee_per_gas);
        self.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
        self
    }
}

/// String-typed intent as it arrives from JSON or the command line.
///
/// Integers accept decimal or `0x` hex.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionIntent {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub max_fee_per_gas: Option<String>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<String>,
}

impl TryFrom<RawTransactionIntent> for TransactionIntent {
    type Error = UserOpError;

    fn try_from(raw: RawTransactionIntent) -> Result<Self, Self::Error> {
        let to = match raw.to.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(UserOpError::InvalidIntent("missing destination `to`".into()))
            }
            Some(s) => parse_address(s)
                .map_err(|e| UserOpError::InvalidIntent(format!("invalid `to` {s:?}: {e}")))?,
        };

        let value = optional(raw.value.as_deref(), "value", parse_u256)?.unwrap_or_default();
        let data = optional(raw.data.as_deref(), "data", parse_bytes)?.unwrap_or_default();

        Ok(Self {
            to: Some(to),
            value,
            data,
            nonce: optional(raw.nonce.as_deref(), "nonce", parse_u256)?,
            max_fee_per_gas: optional(raw.max_fee_per_gas.as_deref(), "maxFeePerGas", parse_u256)?,
            max_priority_fee_per_gas: optional(
                raw.max_priority_fee_per_gas.as_deref(),
                "maxPriorityFeePerGas",
                parse_u256,
            )?,
        })
    }
}

fn optional<T>(
    s: Option<&str>,
    field: &str,
    parse: impl Fn(&str) -> anyhow::Result<T>,
) -> Result<Option<T>, UserOpError> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse(s)
            .map(Some)
            .map_err(|e| UserOpError::InvalidIntent(format!("invalid `{field}` {s:?}: {e}"))),
    }
}
