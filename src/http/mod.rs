//! HTTP server module.
//!
//! Serves the router on plain HTTP; TLS is left to the reverse proxy in front
//! of the stack. Shuts down gracefully on SIGTERM/SIGINT.

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
