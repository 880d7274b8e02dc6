use crate::error::{Result, UserOpError};
use crate::hash::user_operation_hash;
use crate::types::{SignedUserOperation, UserOperation};
use ethers::signers::Signer;
use ethers::types::{Address, Bytes, Signature, H256};

/// Signs `hash` with the EIP-191 personal-message scheme and returns the
/// operation with its signature populated.
///
/// The digest is signed as an opaque 32-byte message, which is what
/// SimpleAccount-style `validateUserOp` implementations recover against.
pub async fn sign<S: Signer>(
    op: UserOperation,
    hash: H256,
    signer: Option<&S>,
) -> Result<SignedUserOperation> {
    let signer = signer.ok_or(UserOpError::SignerUnavailable)?;

    let sig = signer
        .sign_message(hash.as_bytes())
        .await
        .map_err(|e| UserOpError::Signing(e.to_string()))?;

    tracing::debug!(
        user_op_hash = ?hash,
        signer = ?signer.address(),
        "signed user operation"
    );

    Ok(SignedUserOperation::new(
        hash,
        op.with_signature(Bytes::from(sig.to_vec())),
    ))
}

/// Hashes `op` for `entry_point`/`chain_id` and signs the result.
pub async fn sign_user_operation<S: Signer>(
    op: UserOperation,
    entry_point: Address,
    chain_id: u64,
    signer: Option<&S>,
) -> Result<SignedUserOperation> {
    let hash = user_operation_hash(&op, entry_point, chain_id);
    sign(op, hash, signer).await
}

/// Recovers the EIP-191 signer of `op.signature` over `hash`.
pub fn recover_owner(op: &UserOperation, hash: H256) -> Option<Address> {
    let sig = Signature::try_from(op.signature.as_ref()).ok()?;
    sig.recover(hash.as_bytes()).ok()
}

/// `true` when `op.signature` is a valid signature by `owner` over `hash`.
pub fn verify(op: &UserOperation, hash: H256, owner: Address) -> bool {
    recover_owner(op, hash) == Some(owner)
}
