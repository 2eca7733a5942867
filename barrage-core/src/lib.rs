//! Core data model for the barrage load generator.
//!
//! This crate holds the types shared by every other barrage crate: the
//! [`TestPlan`] command envelope that travels from the operator through the
//! controller to the workers, the [`Target`]/[`Outcome`] pair exchanged
//! between payload generators and the attacker, and the load-splitting
//! helpers used by the controller to partition a master plan across workers.

pub mod error;
pub mod outcome;
pub mod plan;
pub mod split;
pub mod target;
pub mod targeter;

pub use error::CoreError;
pub use outcome::Outcome;
pub use plan::TestPlan;
pub use split::{divide, simple_split, SplitError, Splitter};
pub use target::Target;
pub use targeter::{TargetError, Targeter};
