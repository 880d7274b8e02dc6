use crate::calls::EntryPoint;
use crate::error::{Result, UserOpError};
use crate::types::FeeEstimate;
use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::types::{Address, U256};
use std::sync::Arc;

/// Read-only chain state the builder needs.
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// Current nonce for `sender`.
    async fn nonce(&self, sender: Address) -> Result<U256>;

    /// Current EIP-1559 fee caps.
    async fn fee_estimate(&self) -> Result<FeeEstimate>;
}

#[async_trait]
impl<T: ChainQuery + ?Sized> ChainQuery for Arc<T> {
    async fn nonce(&self, sender: Address) -> Result<U256> {
        (**self).nonce(sender).await
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate> {
        (**self).fee_estimate().await
    }
}

/// Where the account nonce is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NonceSource {
    /// `eth_getTransactionCount(sender, latest)`.
    TransactionCount,
    /// `EntryPoint.getNonce(sender, 0)`.
    EntryPoint(Address),
}

/// [`ChainQuery`] backed by an ethers [`Middleware`].
#[derive(Debug)]
pub struct ProviderChainQuery<M> {
    client: Arc<M>,
    nonce_source: NonceSource,
}

impl<M> Clone for ProviderChainQuery<M> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            nonce_source: self.nonce_source,
        }
    }
}

impl<M: Middleware + 'static> ProviderChainQuery<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self {
            client,
            nonce_source: NonceSource::TransactionCount,
        }
    }

    pub fn with_nonce_source(mut self, nonce_source: NonceSource) -> Self {
        self.nonce_source = nonce_source;
        self
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainQuery for ProviderChainQuery<M> {
    async fn nonce(&self, sender: Address) -> Result<U256> {
        match self.nonce_source {
            NonceSource::TransactionCount => self
                .client
                .get_transaction_count(sender, None)
                .await
                .map_err(|e| {
                    UserOpError::NetworkQueryFailed(format!("eth_getTransactionCount: {e}"))
                }),
            NonceSource::EntryPoint(entry_point) => {
                EntryPoint::new(entry_point, self.client.clone())
                    .get_nonce(sender, U256::zero())
                    .call()
                    .await
                    .map_err(|e| {
                        UserOpError::NetworkQueryFailed(format!("entryPoint.getNonce: {e}"))
                    })
            }
        }
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate> {
        match self.client.estimate_eip1559_fees(None).await {
            Ok((max_fee_per_gas, max_priority_fee_per_gas)) => {
                return Ok(FeeEstimate {
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                })
            }
            Err(e) => {
                tracing::debug!(error = %e, "EIP-1559 fee estimate unavailable; trying eth_gasPrice");
            }
        }

        // Nodes without EIP-1559 support: use the legacy gas price for both caps.
        let gas_price = self
            .client
            .get_gas_price()
            .await
            .map_err(|e| UserOpError::NetworkQueryFailed(format!("eth_gasPrice: {e}")))?;

        Ok(FeeEstimate {
            max_fee_per_gas: gas_price,
            max_priority_fee_per_gas: gas_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::providers::Provider;

    #[tokio::test]
    async fn transaction_count_nonce() {
        let (provider, mock) = Provider::mocked();
        mock.push(U256::from(7u64)).unwrap();

        let query = ProviderChainQuery::new(Arc::new(provider));
        let nonce = query.nonce(Address::repeat_byte(0x11)).await.unwrap();
        assert_eq!(nonce, U256::from(7u64));
    }

    #[tokio::test]
    async fn failed_nonce_query_is_network_error() {
        // no response queued: the mock transport errors
        let (provider, _mock) = Provider::mocked();

        let query = ProviderChainQuery::new(Arc::new(provider));
        let err = query.nonce(Address::repeat_byte(0x11)).await.unwrap_err();
        assert!(matches!(err, UserOpError::NetworkQueryFailed(_)));
    }
}
