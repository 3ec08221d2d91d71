//! Accumulated result of the best-effort stages.
//!
//! A failed clone, fetch or cache write does not stop the run; the failure is
//! recorded here and the stages after it still execute. Once anything is
//! recorded the run is errored and the process exits non-zero.

use std::fmt;

/// Pipeline stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Clone,
    Fetch,
    Branch,
    Checkout,
    Pull,
    Stats,
    Cache,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Clone => "clone",
            Stage::Fetch => "fetch",
            Stage::Branch => "branch",
            Stage::Checkout => "checkout",
            Stage::Pull => "pull",
            Stage::Stats => "stats",
            Stage::Cache => "cache",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Outcome {
    failures: Vec<Failure>,
}

impl Outcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure and log it. Failures are never cleared.
    pub fn record(&mut self, stage: Stage, err: impl fmt::Display) {
        let failure = Failure {
            stage,
            message: err.to_string(),
        };
        log::warn!("{}", failure);
        self.failures.push(failure);
    }

    pub fn is_errored(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn has_failed(&self, stage: Stage) -> bool {
        self.failures.iter().any(|f| f.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_outcome_is_clean() {
        let outcome = Outcome::new();
        assert!(!outcome.is_errored());
        assert!(outcome.failures().is_empty());
    }

    #[test]
    fn record_is_sticky_and_ordered() {
        let mut outcome = Outcome::new();
        outcome.record(Stage::Fetch, "network down");
        outcome.record(Stage::Pull, "conflict");

        assert!(outcome.is_errored());
        assert!(outcome.has_failed(Stage::Fetch));
        assert!(!outcome.has_failed(Stage::Clone));
        let rendered: Vec<String> = outcome.failures().iter().map(|f| f.to_string()).collect();
        assert_eq!(rendered, vec!["fetch: network down", "pull: conflict"]);
    }
}
