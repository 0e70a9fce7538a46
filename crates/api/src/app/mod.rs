//! HTTP API application wiring (Axum router + node wiring).
//!
//! - `services.rs`: builds the [`GridcastNode`] (in-memory or Postgres backends)
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use gridcast_infra::GridcastNode;
use gridcast_registry::RegistryJournal;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// The node type the API serves; the journal backend is chosen at startup.
pub type ApiNode = GridcastNode<Arc<dyn RegistryJournal>>;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(node: Arc<ApiNode>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(node)))
}
