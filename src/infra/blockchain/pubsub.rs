//! Slot notifications over the validator's websocket endpoint.

use async_trait::async_trait;
use futures_util::StreamExt;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::domain::{AppError, BlockchainError, SlotSource};

const SLOT_CHANNEL_CAPACITY: usize = 64;

pub struct PubsubSlotSource {
    ws_url: String,
}

impl PubsubSlotSource {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }
}

#[async_trait]
impl SlotSource for PubsubSlotSource {
    /// Connect and subscribe, forwarding slot numbers until either side goes
    /// away. Returns once the subscription is acknowledged.
    async fn subscribe(&self) -> Result<mpsc::Receiver<u64>, AppError> {
        let (tx, rx) = mpsc::channel(SLOT_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), AppError>>();
        let ws_url = self.ws_url.clone();

        tokio::spawn(async move {
            let client = match PubsubClient::new(&ws_url).await {
                Ok(client) => client,
                Err(e) => {
                    let _ = ready_tx.send(Err(AppError::Blockchain(BlockchainError::Connection(
                        format!("websocket connect to {} failed: {}", ws_url, e),
                    ))));
                    return;
                }
            };

            let (mut stream, unsubscribe) = match client.slot_subscribe().await {
                Ok(subscription) => subscription,
                Err(e) => {
                    let _ = ready_tx.send(Err(AppError::Blockchain(BlockchainError::RpcError(
                        format!("slotSubscribe failed: {}", e),
                    ))));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            info!(ws_url = %ws_url, "Slot subscription active");

            loop {
                tokio::select! {
                    update = stream.next() => match update {
                        Some(info) => {
                            if tx.send(info.slot).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            warn!("Slot stream ended by server");
                            break;
                        }
                    },
                    _ = tx.closed() => break,
                }
            }

            drop(stream);
            unsubscribe().await;
            debug!("Slot subscription closed");
        });

        ready_rx.await.map_err(|_| {
            AppError::Blockchain(BlockchainError::Connection(
                "slot subscription task exited".to_string(),
            ))
        })??;
        Ok(rx)
    }
}
