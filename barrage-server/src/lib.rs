//! Controller and worker runtimes of the barrage load generator.
//!
//! The controller keeps a registry of workers and fans commands out to
//! them; each worker owns a single in-flight attack that new plans replace
//! atomically. Both roles expose a small JSON-over-HTTP surface.

pub mod backoff;
pub mod controller;
pub mod error;
pub mod wire;
pub mod worker;

pub use error::ServerError;
