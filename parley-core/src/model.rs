// ABOUTME: Domain model for support chat dispatch -- agents, chat sessions, and their enums.
// ABOUTME: Capacity is derived from seniority and the overflow flag, never stored.

use serde::{Deserialize, Serialize};

/// Session slots available to a full-multiplier agent. The effective limit
/// per agent is `MAX_CONCURRENCY * multiplier(seniority)`.
pub const MAX_CONCURRENCY: u32 = 10;

/// Agent seniority tier. Ordinal rank (Junior=0 .. TeamLead=3) drives selection
/// order; junior agents are preferred so senior agents stay in reserve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Junior,
    MidLevel,
    Senior,
    TeamLead,
}

impl Seniority {
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Junior => 0,
            Self::MidLevel => 1,
            Self::Senior => 2,
            Self::TeamLead => 3,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Self::Junior => 0.4,
            Self::MidLevel => 0.6,
            Self::Senior => 0.8,
            Self::TeamLead => 0.5,
        }
    }
}

impl std::fmt::Display for Seniority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Junior => write!(f, "junior"),
            Self::MidLevel => write!(f, "mid_level"),
            Self::Senior => write!(f, "senior"),
            Self::TeamLead => write!(f, "team_lead"),
        }
    }
}

impl std::str::FromStr for Seniority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "junior" => Ok(Self::Junior),
            "mid_level" => Ok(Self::MidLevel),
            "senior" => Ok(Self::Senior),
            "team_lead" => Ok(Self::TeamLead),
            _ => anyhow::bail!("Unknown seniority: {}", s),
        }
    }
}

/// Time-of-day window during which an agent may connect. Unknown values fail
/// at parse time; the gate itself matches exhaustively over the closed enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Morning,
    Afternoon,
    Night,
}

impl std::fmt::Display for Shift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Morning => write!(f, "morning"),
            Self::Afternoon => write!(f, "afternoon"),
            Self::Night => write!(f, "night"),
        }
    }
}

impl std::str::FromStr for Shift {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(Self::Morning),
            "afternoon" => Ok(Self::Afternoon),
            "night" => Ok(Self::Night),
            _ => anyhow::bail!("Unknown shift: {}", s),
        }
    }
}

/// Lifecycle status of a chat session. `InActive` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
    InActive,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::InActive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "inactive" => Ok(Self::InActive),
            _ => anyhow::bail!("Unknown session status: {}", s),
        }
    }
}

/// Effective capacity for a seniority tier. Overflow agents are pinned to the
/// junior multiplier regardless of declared seniority.
pub fn capacity(seniority: Seniority, overflow: bool) -> f64 {
    let multiplier = if overflow {
        Seniority::Junior.multiplier()
    } else {
        seniority.multiplier()
    };
    MAX_CONCURRENCY as f64 * multiplier
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub team: String,
    /// Per-connection queue name, regenerated on every successful connect.
    pub queue_name: String,
    /// Session currently offered to this agent; None when idle.
    pub active_session_id: Option<String>,
    pub seniority: Seniority,
    pub shift: Shift,
    pub online: bool,
    pub overflow: bool,
    pub assigned_sessions: Vec<String>,
    /// Optimistic concurrency token, bumped on every persisted write.
    pub revision: i64,
}

impl Agent {
    pub fn capacity(&self) -> f64 {
        capacity(self.seniority, self.overflow)
    }

    pub fn load(&self) -> usize {
        self.assigned_sessions.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub status: SessionStatus,
    /// Set when the coordinator assigns an agent; stays set after completion.
    pub agent_id: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub missed_polls: i64,
    pub revision: i64,
}

impl ChatSession {
    /// A fresh Pending session with a generated id and current timestamp.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: SessionStatus::Pending,
            agent_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            completed_at: None,
            missed_polls: 0,
            revision: 0,
        }
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
