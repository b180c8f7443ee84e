// ABOUTME: Reference agent roster seeded at first startup.
// ABOUTME: Idempotent -- a store that already has agents is left untouched.

use anyhow::Result;

use crate::model::{Agent, Seniority, Shift};
use crate::store::Store;

fn agent(name: &str, team: &str, seniority: Seniority, shift: Shift, overflow: bool) -> Agent {
    Agent {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        team: team.to_string(),
        queue_name: String::new(),
        active_session_id: None,
        seniority,
        shift,
        online: false,
        overflow,
        assigned_sessions: Vec::new(),
        revision: 0,
    }
}

/// Seed the reference roster if the agents table is empty. Returns how many
/// agents were inserted.
pub fn seed_agents(store: &Store) -> Result<usize> {
    if store.count_agents()? > 0 {
        return Ok(0);
    }

    let agents = vec![
        // Team A
        agent("Alice", "Team A", Seniority::Junior, Shift::Afternoon, false),
        agent("Bob", "Team A", Seniority::MidLevel, Shift::Afternoon, false),
        agent("Charlie", "Team A", Seniority::MidLevel, Shift::Afternoon, false),
        agent("David", "Team A", Seniority::Junior, Shift::Afternoon, false),
        // Team B
        agent("Eve", "Team B", Seniority::Senior, Shift::Morning, false),
        agent("Frank", "Team B", Seniority::MidLevel, Shift::Morning, false),
        agent("Grace", "Team B", Seniority::Junior, Shift::Morning, false),
        agent("Hank", "Team B", Seniority::Junior, Shift::Morning, false),
        // Team C (night shift)
        agent("Ivy", "Team C", Seniority::MidLevel, Shift::Night, false),
        agent("Jack", "Team C", Seniority::MidLevel, Shift::Night, false),
        // Overflow team
        agent("Karen", "Overflow", Seniority::Junior, Shift::Afternoon, true),
        agent("Leo", "Overflow", Seniority::Junior, Shift::Afternoon, true),
        agent("Mona", "Overflow", Seniority::Junior, Shift::Afternoon, true),
        agent("Nina", "Overflow", Seniority::Junior, Shift::Afternoon, true),
        agent("Oscar", "Overflow", Seniority::Junior, Shift::Afternoon, true),
        agent("Paul", "Overflow", Seniority::Junior, Shift::Afternoon, true),
    ];

    let count = agents.len();
    for agent in &agents {
        store.insert_agent(agent)?;
    }

    tracing::info!(count, "Seeded agent roster");
    Ok(count)
}
