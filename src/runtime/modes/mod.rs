//! Mode routing
//!
//! `serve` runs the HTTP server; `gen-config` is handled directly in `main`.

pub mod server;

pub use server::run_server;
