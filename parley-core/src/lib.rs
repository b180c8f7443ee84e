// ABOUTME: Queue-backed dispatch engine for routing support chat sessions to agents.
// ABOUTME: Selector, coordinator, monitor, and shift gate over a SQLite store and queue transport.

pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod model;
pub mod monitor;
pub mod queue;
pub mod seed;
pub mod selector;
pub mod shift;
pub mod store;

pub use coordinator::Coordinator;
pub use error::{DispatchError, DispatchResult};
pub use model::{Agent, ChatSession, Seniority, SessionStatus, Shift};
pub use monitor::SessionMonitor;
pub use queue::{memory::MemoryBroker, QueueTransport};
pub use store::Store;
