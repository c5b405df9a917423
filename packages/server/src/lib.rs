//! HTTP front door and worker pool for the research engine.
//!
//! A thin adapter: handlers validate input, enqueue sessions, and
//! serve persisted state; the `research` library does everything
//! else.

pub mod app;
pub mod config;
pub mod routes;
pub mod worker;

pub use app::{build_router, AppState};
pub use config::Config;
pub use worker::{JobQueue, RunSession, WorkerPool};
