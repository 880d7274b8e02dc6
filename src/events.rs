use anyhow::{anyhow, Result};
use ethers::abi::{decode, ParamType, Token};
use ethers::providers::Middleware;
use ethers::types::{Address, BlockNumber, Filter, Log, H256, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

/// Event topic0 for:
/// UserOperationEvent(bytes32 indexed userOpHash, address indexed sender, address indexed paymaster,
///                    uint256 nonce, bool success, uint256 actualGasCost, uint256 actualGasUsed)
pub fn user_operation_event_topic() -> H256 {
    H256(ethers::utils::keccak256(
        "UserOperationEvent(bytes32,address,address,uint256,bool,uint256,uint256)",
    ))
}

/// A UserOperation the EntryPoint executed with gas paid by a paymaster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SponsoredOperation {
    pub user_op_hash: H256,
    pub sender: Address,
    pub paymaster: Address,
    pub nonce: U256,
    pub success: bool,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<H256>,
}

pub fn decode_user_operation_event(log: &Log) -> Result<SponsoredOperation> {
    if log.topics.len() != 4 || log.topics[0] != user_operation_event_topic() {
        return Err(anyhow!("not a UserOperationEvent log"));
    }

    let tokens = decode(
        &[
            ParamType::Uint(256),
            ParamType::Bool,
            ParamType::Uint(256),
            ParamType::Uint(256),
        ],
        &log.data,
    )?;
    let [nonce, success, actual_gas_cost, actual_gas_used]: [Token; 4] = tokens
        .try_into()
        .map_err(|_| anyhow!("UserOperationEvent: unexpected data layout"))?;

    let uint = |t: Token, name: &str| {
        t.into_uint()
            .ok_or_else(|| anyhow!("UserOperationEvent: bad {name}"))
    };
    let nonce = uint(nonce, "nonce")?;
    let actual_gas_cost = uint(actual_gas_cost, "actualGasCost")?;
    let actual_gas_used = uint(actual_gas_used, "actualGasUsed")?;
    let success = success
        .into_bool()
        .ok_or_else(|| anyhow!("UserOperationEvent: bad success"))?;

    Ok(SponsoredOperation {
        user_op_hash: log.topics[1],
        sender: topic_address(log.topics[2]),
        paymaster: topic_address(log.topics[3]),
        nonce,
        success,
        actual_gas_cost,
        actual_gas_used,
        block_number: log.block_number.map(|b| b.as_u64()),
        transaction_hash: log.transaction_hash,
    })
}

fn topic_address(topic: H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..])
}

/// Handle for a running log subscription. Items arrive through [`Self::recv`];
/// dropping the handle (or calling [`Self::cancel`]) stops the background task.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T> {
    /// Next item, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn cancel(self) {
        drop(self)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Streams `UserOperationEvent`s sponsored by `paymaster`, starting at
/// `from_block` and polling every `poll_interval`.
pub fn subscribe_sponsored<M: Middleware + 'static>(
    client: Arc<M>,
    entry_point: Address,
    paymaster: Address,
    from_block: u64,
    poll_interval: Duration,
) -> Subscription<SponsoredOperation> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let task = tokio::spawn(async move {
        let mut cursor = from_block;
        loop {
            match poll_once(client.as_ref(), entry_point, paymaster, cursor).await {
                Ok((events, next)) => {
                    for ev in events {
                        if tx.send(ev).await.is_err() {
                            // receiver gone
                            return;
                        }
                    }
                    cursor = next;
                }
                Err(e) => {
                    tracing::warn!(error = %e, cursor, "sponsorship log poll failed");
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    });

    Subscription { rx, task }
}

async fn poll_once<M: Middleware + 'static>(
    client: &M,
    entry_point: Address,
    paymaster: Address,
    from: u64,
) -> Result<(Vec<SponsoredOperation>, u64)> {
    let latest = client.get_block_number().await?.as_u64();
    if from > latest {
        return Ok((Vec::new(), from));
    }

    let filter = Filter::new()
        .address(entry_point)
        .topic0(user_operation_event_topic())
        .topic3(H256::from(paymaster))
        .from_block(BlockNumber::Number(from.into()))
        .to_block(BlockNumber::Number(latest.into()));

    let logs = client.get_logs(&filter).await?;

    let mut out = Vec::with_capacity(logs.len());
    for log in &logs {
        match decode_user_operation_event(log) {
            Ok(ev) => out.push(ev),
            Err(e) => {
                tracing::warn!(error = %e, tx = ?log.transaction_hash, "skipping undecodable log")
            }
        }
    }

    tracing::debug!(from, to = latest, found = out.len(), "scanned sponsorship logs");

    Ok((out, latest.saturating_add(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::encode;
    use ethers::types::U64;

    fn sample_log() -> Log {
        Log {
            address: Address::repeat_byte(0x5f),
            topics: vec![
                user_operation_event_topic(),
                H256::repeat_byte(0xaa),
                H256::from(Address::repeat_byte(0x11)),
                H256::from(Address::repeat_byte(0x77)),
            ],
            data: encode(&[
                Token::Uint(U256::from(5u64)),
                Token::Bool(true),
                Token::Uint(U256::from(123_456u64)),
                Token::Uint(U256::from(78_900u64)),
            ])
            .into(),
            block_number: Some(U64::from(42u64)),
            transaction_hash: Some(H256::repeat_byte(0xbb)),
            ..Default::default()
        }
    }

    #[test]
    fn topic_matches_entry_point_event() {
        assert_eq!(
            user_operation_event_topic(),
            crate::encoding::parse_h256(
                "0x49628fd1471006c1482da88028e9ce4dbb080b815c9b0344d39e5a8e6ec1419f"
            )
            .unwrap()
        );
    }

    #[test]
    fn decodes_user_operation_event() {
        let ev = decode_user_operation_event(&sample_log()).unwrap();
        assert_eq!(ev.user_op_hash, H256::repeat_byte(0xaa));
        assert_eq!(ev.sender, Address::repeat_byte(0x11));
        assert_eq!(ev.paymaster, Address::repeat_byte(0x77));
        assert_eq!(ev.nonce, U256::from(5u64));
        assert!(ev.success);
        assert_eq!(ev.actual_gas_cost, U256::from(123_456u64));
        assert_eq!(ev.actual_gas_used, U256::from(78_900u64));
        assert_eq!(ev.block_number, Some(42));
        assert_eq!(ev.transaction_hash, Some(H256::repeat_byte(0xbb)));
    }

    #[test]
    fn rejects_other_events() {
        let mut log = sample_log();
        log.topics[0] = H256::repeat_byte(0x01);
        assert!(decode_user_operation_event(&log).is_err());

        let mut log = sample_log();
        log.topics.truncate(3);
        assert!(decode_user_operation_event(&log).is_err());
    }

    #[tokio::test]
    async fn poll_decodes_sponsored_logs_and_advances_cursor() {
        let (provider, mock) = ethers::providers::Provider::mocked();
        // responses are served last-in first-out
        mock.push::<Vec<Log>, _>(vec![sample_log()]).unwrap();
        mock.push::<U64, _>(U64::from(50u64)).unwrap();

        let (events, next) = poll_once(
            &provider,
            Address::repeat_byte(0x5f),
            Address::repeat_byte(0x77),
            40,
        )
        .await
        .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].paymaster, Address::repeat_byte(0x77));
        assert_eq!(events[0].user_op_hash, H256::repeat_byte(0xaa));
        assert_eq!(next, 51);
    }

    #[tokio::test]
    async fn poll_ahead_of_head_keeps_cursor() {
        let (provider, mock) = ethers::providers::Provider::mocked();
        mock.push::<U64, _>(U64::from(10u64)).unwrap();

        let (events, next) = poll_once(
            &provider,
            Address::repeat_byte(0x5f),
            Address::repeat_byte(0x77),
            11,
        )
        .await
        .unwrap();

        assert!(events.is_empty());
        assert_eq!(next, 11);
    }

    #[tokio::test]
    async fn subscription_ends_when_cancelled() {
        let (provider, _mock) = ethers::providers::Provider::mocked();
        let sub = subscribe_sponsored(
            Arc::new(provider),
            Address::repeat_byte(0x5f),
            Address::repeat_byte(0x77),
            0,
            Duration::from_millis(5),
        );
        let task = sub.task.abort_handle();
        sub.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(task.is_finished());
    }
}
