// ABOUTME: SQLite-backed store for agents and chat sessions.
// ABOUTME: Every write bumps a revision column; multi-record mutations run in one transaction.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::model::{Agent, ChatSession, Seniority, SessionStatus, Shift};

fn map_agent_row(row: &rusqlite::Row) -> rusqlite::Result<Agent> {
    let seniority_str: String = row.get(5)?;
    let seniority = Seniority::from_str(&seniority_str).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("Unknown seniority: {}", seniority_str).into(),
        )
    })?;

    let shift_str: String = row.get(6)?;
    let shift = Shift::from_str(&shift_str).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("Unknown shift: {}", shift_str).into(),
        )
    })?;

    let assigned_json: String = row.get(9)?;
    let assigned_sessions: Vec<String> = serde_json::from_str(&assigned_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        team: row.get(2)?,
        queue_name: row.get(3)?,
        active_session_id: row.get(4)?,
        seniority,
        shift,
        online: row.get::<_, i32>(7)? != 0,
        overflow: row.get::<_, i32>(8)? != 0,
        assigned_sessions,
        revision: row.get(10)?,
    })
}

fn map_session_row(row: &rusqlite::Row) -> rusqlite::Result<ChatSession> {
    let status_str: String = row.get(1)?;
    let status = SessionStatus::from_str(&status_str).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("Unknown session status: {}", status_str).into(),
        )
    })?;

    Ok(ChatSession {
        id: row.get(0)?,
        status,
        agent_id: row.get(2)?,
        created_at: row.get(3)?,
        completed_at: row.get(4)?,
        missed_polls: row.get(5)?,
        revision: row.get(6)?,
    })
}

const AGENT_COLUMNS: &str = "id, name, team, queue_name, active_session_id, seniority, shift, \
                             online, overflow, assigned_sessions, revision";
const SESSION_COLUMNS: &str = "id, status, agent_id, created_at, completed_at, missed_polls, revision";

#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn new<P: AsRef<Path>>(workspace_path: P) -> Result<Self> {
        let workspace_path: PathBuf = workspace_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&workspace_path).context("Failed to create workspace directory")?;

        let db_path = workspace_path.join("parley.db");
        let conn = Connection::open(&db_path).context("Failed to open SQLite database")?;
        Self::init_schema(&conn)?;

        tracing::info!(db = %db_path.display(), "Store initialized");

        Ok(Store {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init_schema(&conn)?;
        Ok(Store {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                team TEXT NOT NULL,
                queue_name TEXT NOT NULL DEFAULT '',
                active_session_id TEXT,
                seniority TEXT NOT NULL,
                shift TEXT NOT NULL,
                online INTEGER NOT NULL DEFAULT 0,
                overflow INTEGER NOT NULL DEFAULT 0,
                assigned_sessions TEXT NOT NULL DEFAULT '[]',
                revision INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                agent_id TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                missed_polls INTEGER NOT NULL DEFAULT 0,
                revision INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        Ok(())
    }

    // =========================================================================
    // Agents
    // =========================================================================

    pub fn insert_agent(&self, agent: &Agent) -> Result<()> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        db.execute(
            "INSERT INTO agents (id, name, team, queue_name, active_session_id, seniority, shift,
                                 online, overflow, assigned_sessions, revision)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                &agent.id,
                &agent.name,
                &agent.team,
                &agent.queue_name,
                &agent.active_session_id,
                agent.seniority.to_string(),
                agent.shift.to_string(),
                if agent.online { 1 } else { 0 },
                if agent.overflow { 1 } else { 0 },
                serde_json::to_string(&agent.assigned_sessions)?,
                agent.revision,
            ],
        )?;
        Ok(())
    }

    pub fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM agents WHERE id = ?1",
            AGENT_COLUMNS
        ))?;

        match stmt.query_row(params![id], map_agent_row) {
            Ok(agent) => Ok(Some(agent)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All agents in insertion order. Selection tie-breaking depends on this
    /// order being stable across reads.
    pub fn list_agents(&self) -> Result<Vec<Agent>> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM agents ORDER BY rowid ASC",
            AGENT_COLUMNS
        ))?;
        let agents = stmt
            .query_map([], map_agent_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(agents)
    }

    pub fn count_agents(&self) -> Result<i64> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let count = db.query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Write an agent back, guarded by its revision. Returns false when a
    /// concurrent writer got there first; the caller re-reads and retries.
    pub fn update_agent(&self, agent: &Agent) -> Result<bool> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let updated = db.execute(
            "UPDATE agents SET name = ?1, team = ?2, queue_name = ?3, active_session_id = ?4,
                               seniority = ?5, shift = ?6, online = ?7, overflow = ?8,
                               assigned_sessions = ?9, revision = revision + 1
             WHERE id = ?10 AND revision = ?11",
            params![
                &agent.name,
                &agent.team,
                &agent.queue_name,
                &agent.active_session_id,
                agent.seniority.to_string(),
                agent.shift.to_string(),
                if agent.online { 1 } else { 0 },
                if agent.overflow { 1 } else { 0 },
                serde_json::to_string(&agent.assigned_sessions)?,
                &agent.id,
                agent.revision,
            ],
        )?;
        Ok(updated > 0)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub fn insert_session(&self, session: &ChatSession) -> Result<()> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        db.execute(
            "INSERT INTO sessions (id, status, agent_id, created_at, completed_at, missed_polls, revision)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &session.id,
                session.status.to_string(),
                &session.agent_id,
                &session.created_at,
                &session.completed_at,
                session.missed_polls,
                session.revision,
            ],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<ChatSession>> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM sessions WHERE id = ?1",
            SESSION_COLUMNS
        ))?;

        match stmt.query_row(params![id], map_session_row) {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_sessions_by_status(&self, status: SessionStatus) -> Result<Vec<ChatSession>> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM sessions WHERE status = ?1 ORDER BY created_at ASC",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map(params![status.to_string()], map_session_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    pub fn count_sessions(&self) -> Result<i64> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let count = db.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Revision-guarded session write; same contract as `update_agent`.
    pub fn update_session(&self, session: &ChatSession) -> Result<bool> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let updated = db.execute(
            "UPDATE sessions SET status = ?1, agent_id = ?2, completed_at = ?3,
                                 missed_polls = ?4, revision = revision + 1
             WHERE id = ?5 AND revision = ?6",
            params![
                session.status.to_string(),
                &session.agent_id,
                &session.completed_at,
                session.missed_polls,
                &session.id,
                session.revision,
            ],
        )?;
        Ok(updated > 0)
    }

    /// Administrative bulk wipe of session records.
    pub fn delete_all_sessions(&self) -> Result<()> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        db.execute("DELETE FROM sessions", [])?;
        tracing::info!("All sessions deleted");
        Ok(())
    }

    // =========================================================================
    // Dual-record mutations
    // =========================================================================

    /// Bind a Pending session to an agent: session goes InProgress and the
    /// agent takes on the load, in one transaction so no reader can observe
    /// one side without the other. Returns the agent's queue name on success,
    /// or None if the session was no longer Pending (or the agent vanished).
    pub fn assign_session(&self, agent_id: &str, session_id: &str) -> Result<Option<String>> {
        let mut db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let tx = db.transaction()?;

        let updated = tx.execute(
            "UPDATE sessions SET status = 'in_progress', agent_id = ?1, revision = revision + 1
             WHERE id = ?2 AND status = 'pending'",
            params![agent_id, session_id],
        )?;
        if updated == 0 {
            // Dropped transaction rolls back.
            return Ok(None);
        }

        let agent_row = tx.query_row(
            "SELECT queue_name, assigned_sessions FROM agents WHERE id = ?1",
            params![agent_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        );
        let (queue_name, assigned_json) = match agent_row {
            Ok(pair) => pair,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut assigned: Vec<String> =
            serde_json::from_str(&assigned_json).context("Corrupt assigned_sessions column")?;
        if !assigned.iter().any(|s| s == session_id) {
            assigned.push(session_id.to_string());
        }

        tx.execute(
            "UPDATE agents SET active_session_id = ?1, assigned_sessions = ?2, revision = revision + 1
             WHERE id = ?3",
            params![session_id, serde_json::to_string(&assigned)?, agent_id],
        )?;

        tx.commit()?;
        Ok(Some(queue_name))
    }

    /// Complete an InProgress session and release the assigned agent's load,
    /// in one transaction. Returns false if the session was not InProgress.
    pub fn complete_session(&self, session_id: &str) -> Result<bool> {
        let completed_at = chrono::Utc::now().to_rfc3339();
        let mut db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let tx = db.transaction()?;

        let agent_id = match tx.query_row(
            "SELECT agent_id FROM sessions WHERE id = ?1 AND status = 'in_progress'",
            params![session_id],
            |row| row.get::<_, Option<String>>(0),
        ) {
            Ok(agent_id) => agent_id,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        tx.execute(
            "UPDATE sessions SET status = 'completed', completed_at = ?1, revision = revision + 1
             WHERE id = ?2",
            params![completed_at, session_id],
        )?;

        if let Some(ref agent_id) = agent_id {
            let agent_row = tx.query_row(
                "SELECT active_session_id, assigned_sessions FROM agents WHERE id = ?1",
                params![agent_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                    ))
                },
            );
            match agent_row {
                Ok((active, assigned_json)) => {
                    let mut assigned: Vec<String> = serde_json::from_str(&assigned_json)
                        .context("Corrupt assigned_sessions column")?;
                    assigned.retain(|s| s != session_id);
                    let active = match active {
                        Some(ref s) if s == session_id => None,
                        other => other,
                    };
                    tx.execute(
                        "UPDATE agents SET active_session_id = ?1, assigned_sessions = ?2,
                                           revision = revision + 1
                         WHERE id = ?3",
                        params![active, serde_json::to_string(&assigned)?, agent_id],
                    )?;
                }
                // Agent record gone: complete the session anyway.
                Err(rusqlite::Error::QueryReturnedNoRows) => {}
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit()?;
        Ok(true)
    }
}
