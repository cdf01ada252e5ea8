use std::sync::Arc;

pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod result;
pub mod routes;
pub mod session;
pub mod store;
pub mod utils;

pub use database::{MemorySessionTable, SessionOperation, SessionRecord, SessionTable};
pub use error::StoreError;
pub use session::{CookieConfig, CookieSettings, Session};
pub use store::{SessionRecordStore, SessionStore, SweepableStore, SweeperHandle, spawn_sweeper};

/// PostgreSQL 会话存储
pub type PgSessionStore = SessionRecordStore<SessionOperation>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SweepableStore>,
}
