//! Deterministic simulation harness for veil.
//!
//! - [`SimEnv`]: seeded ChaCha20 entropy and tokio virtual time, so a test
//!   run with a paused clock is reproducible from its seed.
//! - [`SimServer`]: in-memory message store and identity directory with
//!   latency and fault injection. Every request body it receives is recorded
//!   so tests can check what would have crossed the wire.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod sim_env;
pub mod sim_server;

pub use sim_env::SimEnv;
pub use sim_server::{SimServer, SimSession};
