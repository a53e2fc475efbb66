//! API layer - operational endpoints and the route table.
//!
//! Trigger handlers live in `triggers`; this module only wires them.

mod health;
mod metrics;
mod routes;

pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
