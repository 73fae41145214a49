//! relay-axum: HTTP surface for relay.
//!
//! One POST endpoint takes `{tenant_id, worker_id, action, ...}` and answers
//! with `{success, data?, error?}`. See [`rest`] for the per-action contract.

pub mod app;
pub mod envelope;
pub mod rest;
pub mod state;
mod error;
pub use error::RelayAxumError;
pub use state::RelayState;

pub use app::{relay, RelayApp};
pub use envelope::{Envelope, ProcessJobsRequest};
