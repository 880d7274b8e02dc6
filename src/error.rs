use thiserror::Error;

/// Errors produced while building, hashing or signing a UserOperation.
///
/// All variants are terminal for the operation at hand. Nothing in this crate
/// retries internally; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum UserOpError {
    /// Malformed transaction intent (missing or invalid destination, bad sender, ...).
    #[error("invalid transaction intent: {0}")]
    InvalidIntent(String),

    /// A chain query failed and no fallback applies.
    #[error("network query failed: {0}")]
    NetworkQueryFailed(String),

    /// Signing was requested but no signer is bound.
    #[error("no signer available")]
    SignerUnavailable,

    /// The bound signer returned an error.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A serialized UserOperation (or paymaster payload) could not be decoded.
    #[error("invalid user operation: {0}")]
    InvalidUserOperation(String),
}

pub type Result<T, E = UserOpError> = std::result::Result<T, E>;
