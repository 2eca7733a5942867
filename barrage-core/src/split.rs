//! Load splitting: dividing a master plan into per-worker plans

use crate::plan::TestPlan;

/// Errors produced while splitting a plan across workers.
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("invalid number of workers {0}, need at least 1")]
    NoWorkers(usize),

    #[error("invalid split parameters: {0}")]
    InvalidParams(String),

    #[error("invalid params JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// A splitter turns one master plan into one plan per worker such that the
/// aggregate effective rate equals the master's.
pub type Splitter = fn(&TestPlan, usize) -> Result<Vec<TestPlan>, SplitError>;

/// The default splitter: every worker receives the full plan with `per`
/// multiplied by the worker count, so each worker runs at `1/n` of the
/// master rate.
pub fn simple_split(plan: &TestPlan, num_workers: usize) -> Result<Vec<TestPlan>, SplitError> {
    if num_workers == 0 {
        return Err(SplitError::NoWorkers(num_workers));
    }
    let mut worker_plan = plan.clone();
    worker_plan.per = plan.per * num_workers as u32;
    Ok(vec![worker_plan; num_workers])
}

/// Distribute `numerator` into `parts` pieces as evenly as possible.
///
/// The first `numerator % parts` pieces get one extra unit.
pub fn divide(numerator: usize, parts: usize) -> Result<Vec<usize>, SplitError> {
    if parts == 0 {
        return Err(SplitError::InvalidParams(
            "cannot divide into zero parts".into(),
        ));
    }
    let base = numerator / parts;
    let rest = numerator % parts;
    Ok((0..parts)
        .map(|idx| if idx < rest { base + 1 } else { base })
        .collect())
}
