//! API Module
//!
//! HTTP handlers and routing for the transient store REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a payload with a TTL
//! - `GET /get/:key` - Retrieve a bundle by key
//! - `DELETE /del/:key` - Delete a bundle
//! - `GET /stats` - Get store statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
