//! Contract calls used by the SDK.
//!
//! The set of calls is small and fixed, so the encoders are generated at
//! compile time from human-readable signatures instead of dispatching through
//! a runtime ABI.
use anyhow::Context;
use ethers::abi::AbiEncode;
use ethers::contract::abigen;
use ethers::providers::Middleware;
use ethers::types::{Address, Bytes, U256};
use std::sync::Arc;

abigen!(
    SimpleAccount,
    r#"[
        function execute(address dest, uint256 value, bytes func)
    ]"#
);

abigen!(
    SimpleAccountFactory,
    r#"[
        function createAccount(address owner, uint256 salt) returns (address)
        function getAddress(address owner, uint256 salt) view returns (address)
    ]"#
);

abigen!(
    EntryPoint,
    r#"[
        function getNonce(address sender, uint192 key) view returns (uint256)
    ]"#
);

/// `SimpleAccount.execute(dest, value, func)` calldata. This is the only call
/// path the account exposes to the builder.
pub fn execute_call_data(to: Address, value: U256, data: Bytes) -> Bytes {
    ExecuteCall {
        dest: to,
        value,
        func: data,
    }
    .encode()
    .into()
}

/// `initCode` for a not-yet-deployed account: factory address followed by
/// `createAccount(owner, salt)` calldata.
pub fn init_code(factory: Address, owner: Address, salt: U256) -> Bytes {
    let create = CreateAccountCall { owner, salt }.encode();

    let mut v = Vec::with_capacity(20 + create.len());
    v.extend_from_slice(factory.as_bytes());
    v.extend_from_slice(&create);
    Bytes::from(v)
}

/// Counterfactual account address for `(owner, salt)` and whether code is
/// already deployed there.
pub async fn account_address<M: Middleware + 'static>(
    client: Arc<M>,
    factory: Address,
    owner: Address,
    salt: U256,
) -> anyhow::Result<(Address, bool)> {
    let factory = SimpleAccountFactory::new(factory, client.clone());

    let account = factory
        .get_address(owner, salt)
        .call()
        .await
        .context("factory.getAddress failed")?;

    let code = client
        .get_code(account, None)
        .await
        .context("eth_getCode failed")?;

    Ok((account, !code.as_ref().is_empty()))
}
