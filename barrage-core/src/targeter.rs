//! The seam between payload generators and the attacker

use crate::outcome::Outcome;
use crate::target::Target;

/// Error produced while building a single request; it fails that request
/// only, never the attack.
pub type TargetError = Box<dyn std::error::Error + Send + Sync>;

/// Produces the next request for the attacker and consumes its outcome.
///
/// `next` fills the pre-allocated record and returns a sequence seed that is
/// handed back to `process_result` together with the response, so stateful
/// generators can correlate the two.
pub trait Targeter: Send + Sync {
    fn next(&self, target: &mut Target) -> Result<u64, TargetError>;

    /// Called once per response, in arrival order. The default does nothing;
    /// only stateful generators override it.
    fn process_result(&self, _outcome: &Outcome, _seq: u64) {}
}
