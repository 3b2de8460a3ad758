//! Relay core library: keeps one chat transport session alive, sends a survey when an order
//! completes, and answers the customer's numeric reply.

pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod init;
pub mod reply;
pub mod session;
pub mod transport;
pub mod webhook;
