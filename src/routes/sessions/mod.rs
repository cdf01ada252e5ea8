mod handler;
mod model;

pub use handler::{health, not_found, session_count, sweep_sessions};
pub use model::{HealthResponse, SessionCountResponse, SweepResponse};
