//! ERC-4337 (EntryPoint v0.6) UserOperation construction, hashing and signing.
//!
//! [`UserOperationBuilder`] turns a [`TransactionIntent`] into an unsigned
//! [`UserOperation`] using a [`ChainQuery`] for the nonce and fee caps.
//! [`user_operation_hash`] computes the EntryPoint `getUserOpHash` locally and
//! [`sign_user_operation`] signs it with any ethers [`Signer`](ethers::signers::Signer).
//! Paymaster data is attached with [`paymaster::attach`] or, for
//! verifying paymasters, [`paymaster::sponsor`].

pub mod builder;
pub mod bundler;
pub mod calls;
pub mod chain;
pub mod config;
pub mod encoding;
pub mod error;
pub mod events;
pub mod hash;
pub mod paymaster;
pub mod rpc;
pub mod signer;
pub mod types;

pub use builder::{BuildReport, UserOperationBuilder};
pub use chain::{ChainQuery, NonceSource, ProviderChainQuery};
pub use error::{Result, UserOpError};
pub use hash::{pack_for_hash, user_operation_hash};
pub use signer::{recover_owner, sign, sign_user_operation, verify};
pub use types::{
    FeeEstimate, GasLimits, RawTransactionIntent, SignedUserOperation, TransactionIntent,
    UserOperation,
};
