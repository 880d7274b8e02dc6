use crate::calls::execute_call_data;
use crate::chain::ChainQuery;
use crate::error::{Result, UserOpError};
use crate::types::{FeeEstimate, GasLimits, TransactionIntent, UserOperation};
use ethers::types::{Address, Bytes, U256};
use std::time::Duration;

/// Which parts of a build fell back to defaults instead of live chain data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// The nonce query failed; the operation uses nonce 0.
    pub nonce_fallback: bool,
    /// The fee query failed; the operation uses [`FeeEstimate::fallback`].
    pub fee_fallback: bool,
}

impl BuildReport {
    pub fn is_degraded(&self) -> bool {
        self.nonce_fallback || self.fee_fallback
    }
}

/// Produces unsigned UserOperations from transaction intents.
///
/// Gas limits are placeholders unless overridden with [`Self::gas_limits`];
/// no gas estimation happens here.
#[derive(Clone, Debug)]
pub struct UserOperationBuilder<C> {
    chain: C,
    gas_limits: GasLimits,
    fee_multiplier_bps: u64,
    query_timeout: Option<Duration>,
}

impl<C: ChainQuery> UserOperationBuilder<C> {
    pub fn new(chain: C) -> Self {
        Self {
            chain,
            gas_limits: GasLimits::default(),
            fee_multiplier_bps: 10_000,
            query_timeout: None,
        }
    }

    pub fn gas_limits(mut self, gas_limits: GasLimits) -> Self {
        self.gas_limits = gas_limits;
        self
    }

    /// Multiplier in basis points applied to network fee estimates
    /// (e.g. 15000 = 1.5x). Explicit fee overrides are never scaled.
    pub fn fee_multiplier_bps(mut self, bps: u64) -> Self {
        self.fee_multiplier_bps = bps.max(1);
        self
    }

    /// Upper bound on each chain query; a timeout triggers the fallback.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub async fn build(
        &self,
        sender: Address,
        intent: &TransactionIntent,
        init_code: Bytes,
        paymaster_and_data: Bytes,
    ) -> Result<UserOperation> {
        self.build_with_report(sender, intent, init_code, paymaster_and_data)
            .await
            .map(|(op, _)| op)
    }

    pub async fn build_with_report(
        &self,
        sender: Address,
        intent: &TransactionIntent,
        init_code: Bytes,
        paymaster_and_data: Bytes,
    ) -> Result<(UserOperation, BuildReport)> {
        if sender.is_zero() {
            return Err(UserOpError::InvalidIntent("sender is the zero address".into()));
        }
        let to = intent
            .to
            .ok_or_else(|| UserOpError::InvalidIntent("missing destination `to`".into()))?;

        let mut report = BuildReport::default();

        // independent reads; wait for both
        let (nonce, fees) = tokio::join!(
            self.resolve_nonce(sender, intent),
            self.resolve_fees(intent)
        );

        let nonce = nonce.unwrap_or_else(|e| {
            tracing::warn!(
                %sender,
                error = %e,
                "nonce query failed; falling back to nonce 0 (may collide with already-used nonces)"
            );
            report.nonce_fallback = true;
            U256::zero()
        });

        let fees = fees.unwrap_or_else(|e| {
            let fallback = FeeEstimate::fallback();
            tracing::warn!(
                error = %e,
                max_fee_per_gas = %fallback.max_fee_per_gas,
                "fee query failed; falling back to default fee"
            );
            report.fee_fallback = true;
            // explicit caps survive the fallback
            FeeEstimate {
                max_fee_per_gas: intent.max_fee_per_gas.unwrap_or(fallback.max_fee_per_gas),
                max_priority_fee_per_gas: intent
                    .max_priority_fee_per_gas
                    .unwrap_or(fallback.max_priority_fee_per_gas),
            }
        });

        let op = UserOperation {
            sender,
            nonce,
            init_code,
            call_data: execute_call_data(to, intent.value, intent.data.clone()),
            call_gas_limit: self.gas_limits.call_gas_limit,
            verification_gas_limit: self.gas_limits.verification_gas_limit,
            pre_verification_gas: self.gas_limits.pre_verification_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            paymaster_and_data,
            signature: Bytes::default(),
        };

        tracing::debug!(
            %sender,
            %to,
            nonce = %op.nonce,
            max_fee_per_gas = %op.max_fee_per_gas,
            degraded = report.is_degraded(),
            "built user operation"
        );

        Ok((op, report))
    }

    async fn resolve_nonce(&self, sender: Address, intent: &TransactionIntent) -> Result<U256> {
        if let Some(nonce) = intent.nonce {
            return Ok(nonce);
        }
        self.with_timeout("nonce", self.chain.nonce(sender)).await
    }

    async fn resolve_fees(&self, intent: &TransactionIntent) -> Result<FeeEstimate> {
        if let (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) =
            (intent.max_fee_per_gas, intent.max_priority_fee_per_gas)
        {
            return Ok(FeeEstimate {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            });
        }

        let estimate = self.with_timeout("fee", self.chain.fee_estimate()).await?;
        if estimate.max_fee_per_gas.is_zero() {
            return Err(UserOpError::NetworkQueryFailed(
                "node returned a zero fee estimate".into(),
            ));
        }

        let bps = U256::from(self.fee_multiplier_bps);
        let scale = |v: U256| v.saturating_mul(bps) / U256::from(10_000u64);

        Ok(FeeEstimate {
            max_fee_per_gas: intent
                .max_fee_per_gas
                .unwrap_or_else(|| scale(estimate.max_fee_per_gas)),
            max_priority_fee_per_gas: intent
                .max_priority_fee_per_gas
                .unwrap_or_else(|| scale(estimate.max_priority_fee_per_gas)),
        })
    }

    async fn with_timeout<T>(
        &self,
        what: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.query_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fut).await.map_err(|_| {
                UserOpError::NetworkQueryFailed(format!("{what} query timed out after {timeout:?}"))
            })?,
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::execute_call_data;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct MockChain {
        nonce: Option<U256>,
        fees: Option<FeeEstimate>,
        hang: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainQuery for MockChain {
        async fn nonce(&self, _sender: Address) -> Result<U256> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.nonce
                .ok_or_else(|| UserOpError::NetworkQueryFailed("account not deployed".into()))
        }

        async fn fee_estimate(&self) -> Result<FeeEstimate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.fees
                .ok_or_else(|| UserOpError::NetworkQueryFailed("no fee data".into()))
        }
    }

    fn healthy() -> MockChain {
        MockChain {
            nonce: Some(U256::from(9u64)),
            fees: Some(FeeEstimate {
                max_fee_per_gas: U256::from(2_000u64),
                max_priority_fee_per_gas: U256::from(100u64),
            }),
            ..Default::default()
        }
    }

    fn sender() -> Address {
        Address::repeat_byte(0x11)
    }

    fn intent() -> TransactionIntent {
        TransactionIntent::new(Address::repeat_byte(0x33))
            .value(U256::from(7u64))
            .data(Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]))
    }

    #[tokio::test]
    async fn build_uses_chain_state_and_placeholders() {
        let builder = UserOperationBuilder::new(healthy());
        let (op, report) = builder
            .build_with_report(sender(), &intent(), Bytes::default(), Bytes::default())
            .await
            .unwrap();

        assert_eq!(report, BuildReport::default());
        assert_eq!(op.sender, sender());
        assert_eq!(op.nonce, U256::from(9u64));
        assert_eq!(op.max_fee_per_gas, U256::from(2_000u64));
        assert_eq!(op.max_priority_fee_per_gas, U256::from(100u64));
        assert_eq!(
            op.call_data,
            execute_call_data(
                Address::repeat_byte(0x33),
                U256::from(7u64),
                Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])
            )
        );
        let gas = GasLimits::default();
        assert_eq!(op.call_gas_limit, gas.call_gas_limit);
        assert_eq!(op.verification_gas_limit, gas.verification_gas_limit);
        assert_eq!(op.pre_verification_gas, gas.pre_verification_gas);
        assert!(op.signature.is_empty());
        assert!(op.init_code.is_empty());
        assert!(op.paymaster_and_data.is_empty());
    }

    #[tokio::test]
    async fn overrides_skip_the_network() {
        let chain = Arc::new(MockChain::default());
        let builder = UserOperationBuilder::new(chain.clone());
        let intent = intent()
            .nonce(U256::from(42u64))
            .fees(U256::from(5u64), U256::from(1u64));

        let (op, report) = builder
            .build_with_report(sender(), &intent, Bytes::default(), Bytes::default())
            .await
            .unwrap();

        assert!(!report.is_degraded());
        assert_eq!(op.nonce, U256::from(42u64));
        assert_eq!(op.max_fee_per_gas, U256::from(5u64));
        assert_eq!(op.max_priority_fee_per_gas, U256::from(1u64));
        assert_eq!(chain.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_nonce_query_falls_back_to_zero() {
        let chain = MockChain {
            nonce: None,
            ..healthy()
        };
        let (op, report) = UserOperationBuilder::new(chain)
            .build_with_report(sender(), &intent(), Bytes::default(), Bytes::default())
            .await
            .unwrap();

        assert!(report.nonce_fallback);
        assert!(!report.fee_fallback);
        assert_eq!(op.nonce, U256::zero());
    }

    #[tokio::test]
    async fn failed_fee_query_falls_back_to_default_fee() {
        let chain = MockChain {
            fees: None,
            ..healthy()
        };
        let (op, report) = UserOperationBuilder::new(chain)
            .build_with_report(sender(), &intent(), Bytes::default(), Bytes::default())
            .await
            .unwrap();

        assert!(report.fee_fallback);
        assert_eq!(op.max_fee_per_gas, FeeEstimate::fallback().max_fee_per_gas);
        assert_eq!(
            op.max_priority_fee_per_gas,
            FeeEstimate::fallback().max_priority_fee_per_gas
        );
    }

    #[tokio::test]
    async fn partial_fee_override_survives_fee_fallback() {
        let chain = MockChain {
            fees: None,
            ..healthy()
        };
        let mut partial = intent();
        partial.max_priority_fee_per_gas = Some(U256::from(7u64));

        let (op, report) = UserOperationBuilder::new(chain)
            .build_with_report(sender(), &partial, Bytes::default(), Bytes::default())
            .await
            .unwrap();

        assert!(report.fee_fallback);
        assert_eq!(op.max_priority_fee_per_gas, U256::from(7u64));
        assert_eq!(op.max_fee_per_gas, FeeEstimate::fallback().max_fee_per_gas);
    }

    #[tokio::test]
    async fn zero_fee_estimate_counts_as_missing() {
        let chain = MockChain {
            fees: Some(FeeEstimate {
                max_fee_per_gas: U256::zero(),
                max_priority_fee_per_gas: U256::zero(),
            }),
            ..healthy()
        };
        let (op, report) = UserOperationBuilder::new(chain)
            .build_with_report(sender(), &intent(), Bytes::default(), Bytes::default())
            .await
            .unwrap();

        assert!(report.fee_fallback);
        assert_eq!(op.max_fee_per_gas, U256::from(crate::types::DEFAULT_FEE_PER_GAS));
    }

    #[tokio::test]
    async fn hanging_queries_time_out_into_fallbacks() {
        let chain = MockChain {
            hang: true,
            ..healthy()
        };
        let (op, report) = UserOperationBuilder::new(chain)
            .query_timeout(Duration::from_millis(20))
            .build_with_report(sender(), &intent(), Bytes::default(), Bytes::default())
            .await
            .unwrap();

        assert!(report.nonce_fallback && report.fee_fallback);
        assert_eq!(op.nonce, U256::zero());
    }

    #[tokio::test]
    async fn fee_multiplier_scales_estimates_but_not_overrides() {
        let builder = UserOperationBuilder::new(healthy()).fee_multiplier_bps(15_000);

        let op = builder
            .build(sender(), &intent(), Bytes::default(), Bytes::default())
            .await
            .unwrap();
        assert_eq!(op.max_fee_per_gas, U256::from(3_000u64));
        assert_eq!(op.max_priority_fee_per_gas, U256::from(150u64));

        let mut partial = intent();
        partial.max_priority_fee_per_gas = Some(U256::from(1u64));
        let op = builder
            .build(sender(), &partial, Bytes::default(), Bytes::default())
            .await
            .unwrap();
        assert_eq!(op.max_fee_per_gas, U256::from(3_000u64));
        assert_eq!(op.max_priority_fee_per_gas, U256::from(1u64));
    }

    #[tokio::test]
    async fn gas_limit_placeholders_are_overridable() {
        let gas = GasLimits {
            call_gas_limit: U256::from(1u64),
            verification_gas_limit: U256::from(2u64),
            pre_verification_gas: U256::from(3u64),
        };
        let op = UserOperationBuilder::new(healthy())
            .gas_limits(gas)
            .build(sender(), &intent(), Bytes::default(), Bytes::default())
            .await
            .unwrap();
        assert_eq!(op.call_gas_limit, U256::from(1u64));
        assert_eq!(op.verification_gas_limit, U256::from(2u64));
        assert_eq!(op.pre_verification_gas, U256::from(3u64));
    }

    #[tokio::test]
    async fn init_code_and_paymaster_data_pass_through() {
        let init = Bytes::from(vec![0x44; 24]);
        let pm = Bytes::from(vec![0x55; 20]);
        let op = UserOperationBuilder::new(healthy())
            .build(sender(), &intent(), init.clone(), pm.clone())
            .await
            .unwrap();
        assert_eq!(op.init_code, init);
        assert_eq!(op.paymaster_and_data, pm);
    }

    #[tokio::test]
    async fn missing_destination_is_invalid_intent() {
        let err = UserOperationBuilder::new(healthy())
            .build(
                sender(),
                &TransactionIntent::default(),
                Bytes::default(),
                Bytes::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserOpError::InvalidIntent(_)));
    }

    #[tokio::test]
    async fn zero_sender_is_invalid_intent() {
        let err = UserOperationBuilder::new(healthy())
            .build(Address::zero(), &intent(), Bytes::default(), Bytes::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UserOpError::InvalidIntent(_)));
    }
}
