//! Rate-paced attack engine.
//!
//! An [`Attacker`] drives requests produced by a
//! [`Targeter`](barrage_core::Targeter) at a fixed [`Rate`] for a bounded
//! duration, with bounded parallelism and a per-request timeout. Every
//! response is yielded as an [`Outcome`](barrage_core::Outcome) to the
//! consumer; a running [`Attack`] can be stopped at any time and drains its
//! in-flight requests within the request timeout.
//!
//! The attacker is deliberately stateless across attacks: every new plan
//! constructs a fresh one.

mod attacker;
mod rate;
mod window;

pub use attacker::{Attack, Attacker, AttackerConfig};
pub use rate::Rate;
pub use window::{MetricsWindow, WindowSnapshot};
