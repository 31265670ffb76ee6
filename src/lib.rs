// Public API for integration tests and potential library usage

pub mod api;
pub mod config;
pub mod console;
pub mod protocol;
pub mod questions;
pub mod server;
pub mod session;
pub mod state;
pub mod types;

// Dispatcher and timers, as `impl AppState`
pub mod broadcast;
