//! Emporium API: library crate exposing the server's modules for
//! integration tests.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;
