// ABOUTME: Queue-backed customer chat dispatch service -- HTTP surface and wiring.
// ABOUTME: The dispatch engine itself lives in parley-core.

pub mod config;
pub mod routes;
