//! Web layer for the departure monitor.
//!
//! Serves the store's view of the next departure as JSON and exposes the
//! live config and manual refresh operations.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
