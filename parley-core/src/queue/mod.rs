// ABOUTME: Queue transport abstraction -- declare/publish/consume with explicit ack/nack.
// ABOUTME: Handlers are explicit structs registered per queue name; names follow the wire conventions.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod memory;
pub mod testing;

/// The single global inbound queue that new session ids are published to.
pub const SESSION_QUEUE: &str = "session_queue";

/// Name of the per-session chat queue carrying raw message bodies.
pub fn chat_queue_name(session_id: &str) -> String {
    format!("chat_queue_{}", session_id)
}

/// Fresh per-agent queue name, generated on every successful connect.
pub fn agent_queue_name(agent_name: &str) -> String {
    format!(
        "agent_queue_{}_{}",
        agent_name.replace(' ', ""),
        uuid::Uuid::new_v4().simple()
    )
}

/// One message handed to a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub body: String,
    pub delivery_tag: u64,
    /// True when this delivery is a redelivery after a requeue.
    pub redelivered: bool,
}

/// What a consumer decides to do with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge and drop the message.
    Ack,
    /// Negative-acknowledge; the broker redelivers after its redelivery delay.
    Requeue,
}

/// A per-queue consumer callback. Returning an error is equivalent to
/// `Requeue`: the consumer loop logs it and redelivers, never crashing.
#[async_trait]
pub trait QueueHandler: Send + Sync + 'static {
    async fn handle(&self, delivery: Delivery) -> Result<Disposition>;
}

/// Durable point-to-point queue provider.
#[async_trait]
pub trait QueueTransport: Send + Sync + 'static {
    /// Declare a queue. Idempotent; declaring an existing queue is a no-op.
    async fn declare_queue(&self, name: &str) -> Result<()>;

    /// Publish a UTF-8 body. Fails if the queue has not been declared;
    /// that failure propagates to the caller rather than being retried here.
    async fn publish(&self, queue: &str, body: &str) -> Result<()>;

    /// Attach the consumer for a queue. Attaching to a queue that already has
    /// one is a no-op, so re-offered sessions don't stack consumers.
    async fn add_consumer(&self, queue: &str, handler: Arc<dyn QueueHandler>) -> Result<()>;

    /// Delete a queue, dropping any buffered messages and stopping its consumer.
    async fn remove_queue(&self, name: &str) -> Result<()>;
}
