//! Gateway runtime: HTTP server lifecycle and single-event mode.

mod config;
mod event;
mod server;
mod signal;

pub use config::GatewayConfig;
pub use event::run_event;
pub use server::{GatewayServer, ServerState};
pub use signal::shutdown_signal;
