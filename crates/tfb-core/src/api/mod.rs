//! TF System membership API client.

pub mod client;
pub mod envelope;
pub mod transport;
pub mod types;

pub use client::MembershipClient;
pub use envelope::{ApiResult, ErrorKind};
