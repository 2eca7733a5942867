//! Outbound HTTP client construction for barrage.
//!
//! All outbound traffic goes through one of three client profiles, each with
//! its own timeout budget: control calls from the controller to workers,
//! registration calls from workers to the controller, and the
//! load-generation requests themselves.

pub mod client;
pub mod errors;

pub use client::{attack_client, control_client, registration_client, ClientConfig};
pub use errors::HttpError;
