//! HTTP API: server, routing, and request/response mapping.

pub mod app;

pub use app::{ApiNode, build_app, services};
