//! # Transport Layer
//!
//! Carriers for the hex request/response exchange. The protocol only needs
//! something implementing [`ScramTransport`](crate::protocol::client::ScramTransport);
//! HTTP or socket carriers live with the applications that own those stacks.

pub mod local;

pub use local::LocalTransport;
