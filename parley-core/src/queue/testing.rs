// ABOUTME: Recording queue transport for tests -- captures declares, publishes, and consumers.
// ABOUTME: Tests deliver messages by hand and assert on what would have hit the broker.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::{Delivery, Disposition, QueueHandler, QueueTransport};

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub queue: String,
    pub body: String,
}

/// Transport double that records every operation instead of moving messages.
/// Tests invoke registered handlers directly via `deliver`.
#[derive(Default)]
pub struct RecordingTransport {
    declared: RwLock<Vec<String>>,
    published: RwLock<Vec<PublishedMessage>>,
    consumers: RwLock<HashMap<String, Arc<dyn QueueHandler>>>,
    removed: RwLock<Vec<String>>,
    next_tag: AtomicU64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declared_queues(&self) -> Vec<String> {
        self.declared
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn was_declared(&self, queue: &str) -> bool {
        self.declared
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|q| q == queue)
    }

    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn messages_for_queue(&self, queue: &str) -> Vec<String> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.queue == queue)
            .map(|m| m.body.clone())
            .collect()
    }

    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn has_consumer(&self, queue: &str) -> bool {
        self.consumers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(queue)
    }

    pub fn consumer_queues(&self) -> Vec<String> {
        self.consumers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn was_removed(&self, queue: &str) -> bool {
        self.removed
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|q| q == queue)
    }

    /// Hand a message to the consumer registered for `queue` and return its
    /// disposition, exactly as the broker's consumer loop would observe it.
    pub async fn deliver(&self, queue: &str, body: &str) -> Result<Disposition> {
        self.deliver_with(queue, body, false).await
    }

    pub async fn deliver_redelivered(&self, queue: &str, body: &str) -> Result<Disposition> {
        self.deliver_with(queue, body, true).await
    }

    async fn deliver_with(&self, queue: &str, body: &str, redelivered: bool) -> Result<Disposition> {
        let handler = self
            .consumers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(queue)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No consumer registered for queue: {}", queue))?;
        let delivery = Delivery {
            body: body.to_string(),
            delivery_tag: self.next_tag.fetch_add(1, Ordering::Relaxed) + 1,
            redelivered,
        };
        handler.handle(delivery).await
    }
}

#[async_trait]
impl QueueTransport for RecordingTransport {
    async fn declare_queue(&self, name: &str) -> Result<()> {
        let mut declared = self.declared.write().unwrap_or_else(|e| e.into_inner());
        if !declared.iter().any(|q| q == name) {
            declared.push(name.to_string());
        }
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &str) -> Result<()> {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage {
                queue: queue.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }

    async fn add_consumer(&self, queue: &str, handler: Arc<dyn QueueHandler>) -> Result<()> {
        self.consumers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(queue.to_string())
            .or_insert(handler);
        Ok(())
    }

    async fn remove_queue(&self, name: &str) -> Result<()> {
        self.removed
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.to_string());
        self.consumers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        Ok(())
    }
}
