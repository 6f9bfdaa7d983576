//! Per-concept fan-out to the routed providers.

mod routing;
mod service;

pub use routing::RoutingTable;
pub use service::{ApiResolutionService, ResolveOptions};
