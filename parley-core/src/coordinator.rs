// ABOUTME: Dispatch coordinator -- owns the queue topology and the state transitions it triggers.
// ABOUTME: Session queue assigns agents; agent queues offer sessions; chat queues carry messages.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{DispatchError, DispatchResult};
use crate::metrics;
use crate::model::{Agent, ChatSession, SessionStatus};
use crate::queue::{
    agent_queue_name, chat_queue_name, Delivery, Disposition, QueueHandler, QueueTransport,
    SESSION_QUEUE,
};
use crate::selector::select_agent;
use crate::shift::is_in_shift;
use crate::store::Store;

/// Orchestrates the session lifecycle across the queue topology. One instance
/// per process; all handlers hold their dependencies explicitly.
pub struct Coordinator {
    store: Arc<Store>,
    transport: Arc<dyn QueueTransport>,
}

impl Coordinator {
    pub fn new(store: Arc<Store>, transport: Arc<dyn QueueTransport>) -> Self {
        Self { store, transport }
    }

    /// Declare the global session queue and attach its consumer. Called once
    /// at startup, before any session is created.
    pub async fn start(&self) -> Result<()> {
        self.transport.declare_queue(SESSION_QUEUE).await?;
        self.transport
            .add_consumer(
                SESSION_QUEUE,
                Arc::new(SessionQueueHandler {
                    store: Arc::clone(&self.store),
                    transport: Arc::clone(&self.transport),
                }),
            )
            .await?;
        tracing::info!("Dispatch coordinator started, listening for chat sessions");
        Ok(())
    }

    /// Create a Pending session and announce it on the global session queue.
    /// Transport failures propagate to the caller as a generic failure.
    pub async fn create_session(&self) -> Result<ChatSession> {
        let session = ChatSession::new();
        self.store.insert_session(&session)?;
        tracing::info!(session_id = %session.id, "Chat session saved");

        self.transport.publish(SESSION_QUEUE, &session.id).await?;
        metrics::record_session_created();
        tracing::info!(session_id = %session.id, "Chat session created");

        Ok(session)
    }

    /// A client poll resets the missed-poll counter on a Pending session.
    /// Any other status (or an unknown id) is a logged no-op.
    pub fn poll_session(&self, session_id: &str) -> Result<()> {
        // Retry once on a revision conflict; the sweep may race us.
        for _ in 0..2 {
            let mut session = match self.store.get_session(session_id)? {
                Some(s) if s.status == SessionStatus::Pending => s,
                _ => {
                    tracing::warn!(session_id = %session_id, "Pending chat session not found");
                    return Ok(());
                }
            };

            session.missed_polls = 0;
            if self.store.update_session(&session)? {
                tracing::info!(session_id = %session_id, "Chat session polled");
                return Ok(());
            }
            tracing::debug!(session_id = %session_id, "Poll lost a revision race, retrying");
        }
        tracing::warn!(session_id = %session_id, "Poll gave up after revision conflicts");
        Ok(())
    }

    /// Complete an InProgress session, release the agent's load, and tear
    /// down the per-session chat queue.
    pub async fn complete_session(&self, session_id: &str) -> Result<()> {
        if !self.store.complete_session(session_id)? {
            tracing::warn!(session_id = %session_id, "Session not in progress, nothing to complete");
            return Ok(());
        }
        tracing::info!(session_id = %session_id, "Chat session completed");

        self.transport
            .remove_queue(&chat_queue_name(session_id))
            .await?;
        Ok(())
    }

    /// Publish a client message onto the session's chat queue. The session
    /// must exist and be InProgress; otherwise this is a logged no-op.
    pub async fn send_client_message(&self, session_id: &str, body: &str) -> Result<()> {
        match self.store.get_session(session_id)? {
            Some(s) if s.status == SessionStatus::InProgress => {}
            _ => {
                tracing::warn!(session_id = %session_id, "Active chat session not found");
                return Ok(());
            }
        }

        self.transport
            .publish(&chat_queue_name(session_id), body)
            .await?;
        tracing::info!(session_id = %session_id, "Chat message sent");
        Ok(())
    }

    /// Publish an agent message onto their active session's chat queue.
    pub async fn send_agent_message(&self, agent_id: &str, body: &str) -> Result<()> {
        let agent = match self.store.get_agent(agent_id)? {
            Some(a) if a.online && a.active_session_id.is_some() => a,
            _ => {
                tracing::warn!(agent_id = %agent_id, "Agent not found or offline");
                return Ok(());
            }
        };
        let session_id = agent.active_session_id.as_deref().unwrap_or_default();

        match self.store.get_session(session_id)? {
            Some(s) if s.status == SessionStatus::InProgress => {}
            Some(_) => {
                tracing::warn!(session_id = %session_id, "Chat session not in progress");
                return Ok(());
            }
            None => {
                tracing::warn!(session_id = %session_id, "Agent session not found");
                return Ok(());
            }
        }

        self.transport
            .publish(&chat_queue_name(session_id), body)
            .await?;
        tracing::info!(session_id = %session_id, "Chat message sent");
        Ok(())
    }

    /// Bring an agent online: generate a fresh per-agent queue, declare it,
    /// and attach its offer consumer. Connecting an already-online agent is a
    /// no-op; connecting outside the declared shift is refused.
    pub async fn connect_agent(&self, agent_id: &str, now: DateTime<Utc>) -> DispatchResult<Agent> {
        let mut agent = self
            .store
            .get_agent(agent_id)
            .map_err(DispatchError::Other)?
            .ok_or_else(|| DispatchError::AgentNotFound(agent_id.to_string()))?;

        if agent.online {
            return Ok(agent);
        }

        if !is_in_shift(agent.shift, now) {
            return Err(DispatchError::AgentShiftConflict(agent_id.to_string()));
        }

        agent.online = true;
        agent.queue_name = agent_queue_name(&agent.name);

        if !self.store.update_agent(&agent).map_err(DispatchError::Other)? {
            return Err(DispatchError::StaleRevision {
                entity: "agent",
                id: agent_id.to_string(),
            });
        }

        self.transport
            .declare_queue(&agent.queue_name)
            .await
            .map_err(DispatchError::Other)?;
        self.transport
            .add_consumer(
                &agent.queue_name,
                Arc::new(AgentQueueHandler {
                    agent_id: agent_id.to_string(),
                    store: Arc::clone(&self.store),
                    transport: Arc::clone(&self.transport),
                }),
            )
            .await
            .map_err(DispatchError::Other)?;

        tracing::info!(
            agent_id = %agent_id,
            agent = %agent.name,
            queue = %agent.queue_name,
            "Agent connected"
        );

        // Re-read so the returned record carries the persisted revision.
        self.store
            .get_agent(agent_id)
            .map_err(DispatchError::Other)?
            .ok_or_else(|| DispatchError::AgentNotFound(agent_id.to_string()))
    }
}

/// Consumer for the global session queue. Payload is a session id.
pub struct SessionQueueHandler {
    pub store: Arc<Store>,
    pub transport: Arc<dyn QueueTransport>,
}

#[async_trait]
impl QueueHandler for SessionQueueHandler {
    async fn handle(&self, delivery: Delivery) -> Result<Disposition> {
        let session_id = delivery.body.trim().to_string();
        tracing::info!(session_id = %session_id, "Received session");

        let session = match self.store.get_session(&session_id)? {
            Some(s) => s,
            None => {
                tracing::warn!(session_id = %session_id, "Unknown session on session queue");
                return Ok(Disposition::Ack);
            }
        };

        // Idempotent against duplicate and redelivered messages.
        match session.status {
            SessionStatus::InActive => {
                tracing::info!(session_id = %session_id, "Session is inactive");
                return Ok(Disposition::Ack);
            }
            SessionStatus::Completed => {
                tracing::info!(session_id = %session_id, "Session is already completed");
                return Ok(Disposition::Ack);
            }
            SessionStatus::InProgress => {
                tracing::info!(session_id = %session_id, "Session is already in progress");
                return Ok(Disposition::Ack);
            }
            SessionStatus::Pending => {}
        }

        let agents = self.store.list_agents()?;
        let agent_id = match select_agent(&agents) {
            Some(id) => id,
            None => {
                // Dropped, not requeued: the monitor evicts sessions that
                // stay Pending too long.
                tracing::info!(session_id = %session_id, "No available agent found for session");
                return Ok(Disposition::Ack);
            }
        };

        let queue_name = match self.store.assign_session(&agent_id, &session_id)? {
            Some(q) => q,
            None => {
                tracing::warn!(
                    session_id = %session_id,
                    agent_id = %agent_id,
                    "Assignment lost a race, dropping offer"
                );
                return Ok(Disposition::Ack);
            }
        };

        metrics::record_assignment();
        tracing::info!(session_id = %session_id, agent_id = %agent_id, "Assigned session to agent");

        if queue_name.is_empty() {
            tracing::warn!(agent_id = %agent_id, "Assigned agent has no queue, offer not published");
            return Ok(Disposition::Ack);
        }

        // A failure here propagates as an error; the consumer loop requeues
        // and the redelivery hits the InProgress drop path above.
        self.transport.publish(&queue_name, &session_id).await?;

        Ok(Disposition::Ack)
    }
}

/// Consumer for one agent's offer queue. Payload is a session id being
/// offered; the offer is re-queued until the agent's state matches it.
pub struct AgentQueueHandler {
    pub agent_id: String,
    pub store: Arc<Store>,
    pub transport: Arc<dyn QueueTransport>,
}

#[async_trait]
impl QueueHandler for AgentQueueHandler {
    async fn handle(&self, delivery: Delivery) -> Result<Disposition> {
        let session_id = delivery.body.trim().to_string();

        // A message referencing a finished session is moot: acknowledge and
        // drop before any agent-state check, or the offer would requeue
        // forever once completion releases the agent.
        let session = match self.store.get_session(&session_id)? {
            Some(s) => s,
            None => {
                tracing::warn!(session_id = %session_id, "Unknown session offered to agent");
                return Ok(Disposition::Ack);
            }
        };
        if matches!(
            session.status,
            SessionStatus::Completed | SessionStatus::InActive
        ) {
            return Ok(Disposition::Ack);
        }

        let agent = match self.store.get_agent(&self.agent_id)? {
            Some(a) => a,
            None => return Ok(Disposition::Requeue),
        };
        if !agent.online || agent.active_session_id.as_deref() != Some(session_id.as_str()) {
            return Ok(Disposition::Requeue);
        }

        let chat_queue = chat_queue_name(&session_id);
        self.transport.declare_queue(&chat_queue).await?;
        self.transport
            .add_consumer(&chat_queue, Arc::new(ChatQueueHandler))
            .await?;

        // Poll-via-requeue: the offer stays live until the session resolves;
        // redelivery cadence comes from the broker config.
        Ok(Disposition::Requeue)
    }
}

/// Consumer for a per-session chat queue. Delivery to the human UI layer is
/// out of scope, so every message is acknowledged on receipt; a failing
/// callback is requeued by the consumer loop.
pub struct ChatQueueHandler;

#[async_trait]
impl QueueHandler for ChatQueueHandler {
    async fn handle(&self, delivery: Delivery) -> Result<Disposition> {
        tracing::debug!(
            len = delivery.body.len(),
            redelivered = delivery.redelivered,
            "Chat message delivered"
        );
        Ok(Disposition::Ack)
    }
}
