//! HTTP API module.
//!
//! This module provides the HTTP server, the API types and the log stream
//! for the dashboard.

pub mod server;
pub mod types;
pub mod logs;

pub use server::{router, start_server, AppState};
pub use types::*;
pub use logs::*;
