//! JSON-RPC implementation of [`ChainReader`]
//!
//! Read calls go over HTTP `eth_call` with hand-assembled calldata; the
//! swap stream comes from `eth_subscribe("logs")` over websocket. Call
//! retries use bounded exponential backoff on transport failures only;
//! RPC-level errors and empty returns surface immediately.

use super::abi::{self, SWAP_TOPIC};
use super::{ChainReader, CollectedFees, PoolState, PositionInfo, SwapLog, SwapSubscription, TokenMetadata};
use crate::config::ChainConfig;
use crate::errors::ChainError;
use crate::logger::{self, LogTag};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const SWAP_CHANNEL_CAPACITY: usize = 256;
const WS_RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct JsonRpcChainReader {
    http: reqwest::Client,
    http_url: String,
    ws_url: String,
    position_manager: Address,
    factory: Address,
    staker: Option<Address>,
    max_retries: u32,
    retry_base: Duration,
}

impl JsonRpcChainReader {
    pub fn from_config(config: &ChainConfig) -> Result<Self, ChainError> {
        let position_manager = parse_address(&config.position_manager)?;
        let factory = parse_address(&config.factory)?;
        let staker = if config.staker.is_empty() {
            None
        } else {
            Some(parse_address(&config.staker)?)
        };

        Ok(Self {
            http: reqwest::Client::new(),
            http_url: config.http_url.clone(),
            ws_url: config.ws_url.clone(),
            position_manager,
            factory,
            staker,
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms),
        })
    }

    /// One `eth_call` against the latest block, with bounded backoff on
    /// transport errors.
    async fn eth_call(&self, to: Address, data: String) -> Result<Vec<u8>, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": format!("{:#x}", to), "data": data }, "latest"],
        });

        let mut attempt = 0u32;
        let response: Value = loop {
            match self.http.post(&self.http_url).json(&body).send().await {
                Ok(resp) => match resp.json::<Value>().await {
                    Ok(parsed) => break parsed,
                    Err(e) => {
                        if attempt >= self.max_retries {
                            return Err(ChainError::Transport(e.to_string()));
                        }
                    }
                },
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(ChainError::Transport(e.to_string()));
                    }
                }
            }
            let delay = self.retry_base * 2u32.saturating_pow(attempt);
            logger::debug(
                LogTag::Chain,
                &format!("eth_call retry {} in {:?}", attempt + 1, delay),
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        };

        if let Some(error) = response.get("error") {
            return Err(ChainError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }

        let result = response
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainError::Decode("missing result field".to_string()))?;
        let bytes = abi::decode_hex(result)?;
        if bytes.is_empty() {
            return Err(ChainError::EmptyResponse(format!("{:#x}", to)));
        }
        Ok(bytes)
    }

    async fn call_u256(&self, to: Address, data: String) -> Result<U256, ChainError> {
        let bytes = self.eth_call(to, data).await?;
        Ok(abi::decode_u256(abi::word(&bytes, 0)?))
    }
}

#[async_trait]
impl ChainReader for JsonRpcChainReader {
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, ChainError> {
        let symbol_bytes = self.eth_call(token, abi::calldata(abi::SEL_SYMBOL, &[])).await?;
        let name_bytes = self.eth_call(token, abi::calldata(abi::SEL_NAME, &[])).await?;
        let decimals = self.call_u256(token, abi::calldata(abi::SEL_DECIMALS, &[])).await?;

        Ok(TokenMetadata {
            symbol: abi::decode_string(&symbol_bytes)?,
            name: abi::decode_string(&name_bytes)?,
            decimals: u8::try_from(decimals)
                .map_err(|_| ChainError::Decode("decimals out of range".to_string()))?,
        })
    }

    async fn pool_state(&self, pool: Address) -> Result<PoolState, ChainError> {
        let token0_bytes = self.eth_call(pool, abi::calldata(abi::SEL_TOKEN0, &[])).await?;
        let token1_bytes = self.eth_call(pool, abi::calldata(abi::SEL_TOKEN1, &[])).await?;
        let fee = self.call_u256(pool, abi::calldata(abi::SEL_FEE, &[])).await?;
        let spacing_bytes = self
            .eth_call(pool, abi::calldata(abi::SEL_TICK_SPACING, &[]))
            .await?;
        let slot0_bytes = self.eth_call(pool, abi::calldata(abi::SEL_SLOT0, &[])).await?;
        let liquidity = self
            .eth_call(pool, abi::calldata(abi::SEL_LIQUIDITY, &[]))
            .await?;

        Ok(PoolState {
            token0: abi::decode_address(abi::word(&token0_bytes, 0)?),
            token1: abi::decode_address(abi::word(&token1_bytes, 0)?),
            fee: u32::try_from(fee)
                .map_err(|_| ChainError::Decode("fee out of range".to_string()))?,
            tick_spacing: abi::decode_tick(abi::word(&spacing_bytes, 0)?),
            sqrt_price_x96: abi::decode_u256(abi::word(&slot0_bytes, 0)?),
            tick: abi::decode_tick(abi::word(&slot0_bytes, 1)?),
            liquidity: abi::decode_u128(abi::word(&liquidity, 0)?)?,
        })
    }

    async fn find_pool(
        &self,
        token0: Address,
        token1: Address,
        fee: u32,
    ) -> Result<Address, ChainError> {
        let data = abi::calldata(
            abi::SEL_GET_POOL,
            &[
                abi::encode_address(token0),
                abi::encode_address(token1),
                abi::encode_u64(fee as u64),
            ],
        );
        let bytes = self.eth_call(self.factory, data).await?;
        let pool = abi::decode_address(abi::word(&bytes, 0)?);
        if pool == Address::ZERO {
            return Err(ChainError::EmptyResponse(format!(
                "no pool for pair ({:#x}, {:#x}) fee {}",
                token0, token1, fee
            )));
        }
        Ok(pool)
    }

    async fn position_info(&self, token_id: u64) -> Result<PositionInfo, ChainError> {
        let data = abi::calldata(abi::SEL_POSITIONS, &[abi::encode_u64(token_id)]);
        let bytes = self.eth_call(self.position_manager, data).await?;

        // positions() layout: nonce, operator, token0, token1, fee,
        // tickLower, tickUpper, liquidity, feeGrowth0, feeGrowth1, owed0, owed1
        Ok(PositionInfo {
            token0: abi::decode_address(abi::word(&bytes, 2)?),
            token1: abi::decode_address(abi::word(&bytes, 3)?),
            fee: abi::decode_u32(abi::word(&bytes, 4)?)?,
            tick_lower: abi::decode_tick(abi::word(&bytes, 5)?),
            tick_upper: abi::decode_tick(abi::word(&bytes, 6)?),
            liquidity: abi::decode_u128(abi::word(&bytes, 7)?)?,
        })
    }

    async fn owner_of(&self, token_id: u64) -> Result<Address, ChainError> {
        let data = abi::calldata(abi::SEL_OWNER_OF, &[abi::encode_u64(token_id)]);
        let bytes = self.eth_call(self.position_manager, data).await?;
        Ok(abi::decode_address(abi::word(&bytes, 0)?))
    }

    async fn positions_of_owner(&self, owner: Address) -> Result<Vec<u64>, ChainError> {
        let balance = self
            .call_u256(
                self.position_manager,
                abi::calldata(abi::SEL_BALANCE_OF, &[abi::encode_address(owner)]),
            )
            .await?;
        let count = u64::try_from(balance)
            .map_err(|_| ChainError::Decode("position count out of range".to_string()))?;

        let mut token_ids = Vec::with_capacity(count as usize);
        for index in 0..count {
            let data = abi::calldata(
                abi::SEL_TOKEN_OF_OWNER_BY_INDEX,
                &[abi::encode_address(owner), abi::encode_u64(index)],
            );
            let bytes = self.eth_call(self.position_manager, data).await?;
            token_ids.push(abi::decode_u64(abi::word(&bytes, 0)?)?);
        }
        Ok(token_ids)
    }

    async fn erc20_balance_of(
        &self,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainError> {
        self.call_u256(
            token,
            abi::calldata(abi::SEL_BALANCE_OF, &[abi::encode_address(holder)]),
        )
        .await
    }

    async fn simulate_collect(
        &self,
        token_id: u64,
        recipient: Address,
    ) -> Result<CollectedFees, ChainError> {
        // collect((tokenId, recipient, amount0Max, amount1Max)) with maximal
        // claims; eth_call never mutates, so fees stay uncollected.
        let max = U256::from(u128::MAX);
        let data = abi::calldata(
            abi::SEL_COLLECT,
            &[
                abi::encode_u64(token_id),
                abi::encode_address(recipient),
                abi::encode_u256(max),
                abi::encode_u256(max),
            ],
        );
        let bytes = self.eth_call(self.position_manager, data).await?;
        Ok(CollectedFees {
            amount0: abi::decode_u256(abi::word(&bytes, 0)?),
            amount1: abi::decode_u256(abi::word(&bytes, 1)?),
        })
    }

    async fn is_staked(&self, token_id: u64) -> Result<bool, ChainError> {
        let Some(staker) = self.staker else {
            return Ok(false);
        };
        let data = abi::calldata(abi::SEL_DEPOSITS, &[abi::encode_u64(token_id)]);
        let bytes = self.eth_call(staker, data).await?;
        // deposits() word 0 is the depositor; zero address means not staked
        Ok(abi::decode_address(abi::word(&bytes, 0)?) != Address::ZERO)
    }

    async fn pending_reward(&self, token_id: u64) -> Result<U256, ChainError> {
        let Some(staker) = self.staker else {
            return Ok(U256::ZERO);
        };
        let data = abi::calldata(abi::SEL_PENDING_REWARD, &[abi::encode_u64(token_id)]);
        self.call_u256(staker, data).await
    }

    async fn subscribe_swaps(&self, pool: Address) -> Result<SwapSubscription, ChainError> {
        let (tx, rx) = mpsc::channel(SWAP_CHANNEL_CAPACITY);
        let ws_url = self.ws_url.clone();
        let pool_hex = format!("{:#x}", pool);

        let task = tokio::spawn(async move {
            loop {
                if tx.is_closed() {
                    break;
                }
                match run_swap_stream(&ws_url, &pool_hex, &tx).await {
                    Ok(()) => break, // receiver gone, clean shutdown
                    Err(e) => {
                        logger::warning(
                            LogTag::Chain,
                            &format!("swap stream for {} dropped: {} - reconnecting", pool_hex, e),
                        );
                        tokio::time::sleep(WS_RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Ok(SwapSubscription::new(rx, task))
    }
}

/// Drive one websocket connection until the receiver closes (Ok) or the
/// transport fails (Err, caller reconnects).
async fn run_swap_stream(
    ws_url: &str,
    pool_hex: &str,
    tx: &mpsc::Sender<SwapLog>,
) -> Result<(), ChainError> {
    let (mut socket, _) = connect_async(ws_url)
        .await
        .map_err(|e| ChainError::Subscription(e.to_string()))?;

    let subscribe = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "eth_subscribe",
        "params": ["logs", { "address": pool_hex, "topics": [SWAP_TOPIC] }],
    });
    socket
        .send(Message::Text(subscribe.to_string()))
        .await
        .map_err(|e| ChainError::Subscription(e.to_string()))?;

    while let Some(message) = socket.next().await {
        if tx.is_closed() {
            return Ok(());
        }
        let message = message.map_err(|e| ChainError::Subscription(e.to_string()))?;
        let text = match message {
            Message::Text(text) => text,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => {
                return Err(ChainError::Subscription("server closed stream".to_string()))
            }
            _ => continue,
        };

        // Malformed payloads are logged and skipped; one bad log must not
        // tear down the subscription.
        match decode_swap_notification(&text) {
            Ok(Some(swap)) => {
                if tx.send(swap).await.is_err() {
                    return Ok(());
                }
            }
            Ok(None) => {} // subscription ack or unrelated frame
            Err(e) => {
                logger::warning(LogTag::Chain, &format!("skipping malformed swap log: {}", e));
            }
        }
    }

    Err(ChainError::Subscription("stream ended".to_string()))
}

/// Decode an `eth_subscription` frame into a [`SwapLog`]. Returns
/// `Ok(None)` for non-log frames (e.g. the subscription id ack).
fn decode_swap_notification(text: &str) -> Result<Option<SwapLog>, ChainError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ChainError::Decode(e.to_string()))?;
    let Some(result) = value
        .get("params")
        .and_then(|params| params.get("result"))
    else {
        return Ok(None);
    };
    let data = result
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::Decode("log without data field".to_string()))?;
    let bytes = abi::decode_hex(data)?;

    // Swap data words: amount0, amount1, sqrtPriceX96, liquidity, tick
    Ok(Some(SwapLog {
        amount0: abi::decode_i256(abi::word(&bytes, 0)?),
        amount1: abi::decode_i256(abi::word(&bytes, 1)?),
        sqrt_price_x96: abi::decode_u256(abi::word(&bytes, 2)?),
        liquidity: Some(abi::decode_u128(abi::word(&bytes, 3)?)?),
        tick: abi::decode_tick(abi::word(&bytes, 4)?),
    }))
}

fn parse_address(raw: &str) -> Result<Address, ChainError> {
    Address::from_str(raw.trim())
        .map_err(|e| ChainError::Decode(format!("bad address '{}': {}", raw, e)))
}
