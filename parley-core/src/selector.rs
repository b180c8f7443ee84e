// ABOUTME: Agent selection policy -- pure function over the full agent set.
// ABOUTME: Online agents with spare capacity, lowest seniority ordinal first, stable ties.

use crate::model::Agent;

/// Pick the agent that should receive the next session, or None if every
/// online agent is at capacity. Junior agents are preferred first so senior
/// agents stay in reserve for overflow and escalation. Selection does not
/// mutate anything; persisting the assignment is the caller's job.
pub fn select_agent(agents: &[Agent]) -> Option<String> {
    let mut available: Vec<&Agent> = agents
        .iter()
        .filter(|a| a.online)
        .filter(|a| (a.load() as f64) < a.capacity())
        .collect();

    // Stable sort: equal ordinals keep their encounter order.
    available.sort_by_key(|a| a.seniority.ordinal());

    available.first().map(|a| a.id.clone())
}
