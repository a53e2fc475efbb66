// Infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod store;

// Domain
pub mod auth;
pub mod gateway;
pub mod notification;
pub mod users;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;

// Supporting modules
pub mod tasks;
pub mod telemetry;
