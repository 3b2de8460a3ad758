//! Gateway: the HTTP surface of the service.
//!
//! Single port serves the operator status page, a health probe and the order-status webhook.
//! Starting the gateway also starts the session supervisor and the inbound reply processor.

mod page;
mod server;

pub use page::render_status;
pub use server::{router, run_gateway, run_gateway_with, GatewayState};
