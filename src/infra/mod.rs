//! Infrastructure adapters and runtime bootstrap.

pub mod client;
pub mod error;
pub mod http;
pub mod shutdown;
pub mod store;
pub mod telemetry;
