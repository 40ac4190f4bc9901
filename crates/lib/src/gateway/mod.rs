//! Webhook gateway: HTTP server, update classification, and the voice path.

mod server;

pub use server::{run_gateway, AppState};
