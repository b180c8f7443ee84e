// ABOUTME: In-process queue broker -- one FIFO channel and consumer task per queue.
// ABOUTME: Requeued messages come back after a configurable redelivery delay.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{Delivery, Disposition, QueueHandler, QueueTransport};

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// How long a requeued message waits before redelivery. Drives the
    /// cadence of poll-via-requeue consumers, so keep it well under a second.
    pub redelivery_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            redelivery_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
struct Message {
    body: String,
    delivery_tag: u64,
    redelivered: bool,
}

struct QueueEntry {
    tx: mpsc::UnboundedSender<Message>,
    /// Parked receiver, taken by the first `add_consumer`.
    rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    next_tag: AtomicU64,
    consumed: AtomicBool,
}

type QueueMap = Arc<Mutex<HashMap<String, Arc<QueueEntry>>>>;

/// Point-to-point broker living inside the process. Queues survive for the
/// process lifetime (declared durable, non-exclusive, non-auto-delete in
/// spirit); at-least-once delivery with explicit ack/requeue.
pub struct MemoryBroker {
    config: BrokerConfig,
    queues: QueueMap,
}

impl MemoryBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn entry(&self, name: &str) -> Option<Arc<QueueEntry>> {
        self.queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

#[async_trait]
impl QueueTransport for MemoryBroker {
    async fn declare_queue(&self, name: &str) -> Result<()> {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        if queues.contains_key(name) {
            return Ok(());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        queues.insert(
            name.to_string(),
            Arc::new(QueueEntry {
                tx,
                rx: Mutex::new(Some(rx)),
                next_tag: AtomicU64::new(1),
                consumed: AtomicBool::new(false),
            }),
        );
        tracing::debug!(queue = %name, "Queue declared");
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &str) -> Result<()> {
        let entry = self
            .entry(queue)
            .ok_or_else(|| anyhow::anyhow!("Queue not declared: {}", queue))?;
        let message = Message {
            body: body.to_string(),
            delivery_tag: entry.next_tag.fetch_add(1, Ordering::Relaxed),
            redelivered: false,
        };
        entry
            .tx
            .send(message)
            .map_err(|_| anyhow::anyhow!("Queue closed: {}", queue))?;
        crate::metrics::record_queue_publish(queue);
        Ok(())
    }

    async fn add_consumer(&self, queue: &str, handler: Arc<dyn QueueHandler>) -> Result<()> {
        let entry = self
            .entry(queue)
            .ok_or_else(|| anyhow::anyhow!("Queue not declared: {}", queue))?;

        if entry.consumed.swap(true, Ordering::SeqCst) {
            tracing::debug!(queue = %queue, "Consumer already attached");
            return Ok(());
        }

        let mut rx = entry
            .rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| anyhow::anyhow!("Queue receiver missing: {}", queue))?;

        let queues = Arc::clone(&self.queues);
        let queue_name = queue.to_string();
        let delay = self.config.redelivery_delay;

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let delivery = Delivery {
                    body: msg.body.clone(),
                    delivery_tag: msg.delivery_tag,
                    redelivered: msg.redelivered,
                };

                let disposition = match handler.handle(delivery).await {
                    Ok(d) => d,
                    Err(e) => {
                        // Callback errors never crash the listener.
                        tracing::warn!(
                            queue = %queue_name,
                            error = %e,
                            "Consumer callback failed, requeueing"
                        );
                        Disposition::Requeue
                    }
                };

                if disposition == Disposition::Requeue {
                    let queues = Arc::clone(&queues);
                    let queue_name = queue_name.clone();
                    let body = msg.body;
                    let delivery_tag = msg.delivery_tag;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let tx = queues
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .get(&queue_name)
                            .map(|entry| entry.tx.clone());
                        if let Some(tx) = tx {
                            let _ = tx.send(Message {
                                body,
                                delivery_tag,
                                redelivered: true,
                            });
                        }
                        // Queue removed while the message waited: drop it.
                    });
                }
            }
            tracing::debug!(queue = %queue_name, "Queue closed, consumer stopped");
        });

        tracing::debug!(queue = %queue, "Consumer attached");
        Ok(())
    }

    async fn remove_queue(&self, name: &str) -> Result<()> {
        let removed = self
            .queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        if removed.is_some() {
            tracing::debug!(queue = %name, "Queue removed");
        }
        Ok(())
    }
}
