//! Error types.
//!
//! Configuration and genotype-space problems are rejected before a run
//! starts ([`ConfigError`], [`SpaceError`], wrapped by [`EvolutionError`]).
//! Failures inside user code never escape the evaluator: they are recorded
//! as an [`EvalFailure`] on the affected individual.

use std::time::Duration;

/// Boxed error returned by user-supplied test and loss functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid run configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("population_size must be at least 2, got {0}")]
    PopulationTooSmall(usize),

    #[error("elite_count ({elite}) must be smaller than population_size ({population})")]
    EliteCountTooHigh { elite: usize, population: usize },

    #[error("{name} must lie in [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },

    #[error("mutation_scale must be finite and non-negative, got {0}")]
    InvalidMagnitude(f64),

    #[error("max_generations must be at least 1")]
    ZeroGenerations,

    #[error("patience must be at least 1 when set")]
    InvalidPatience,

    #[error("convergence_threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),

    #[error("eval_timeout must be positive when set")]
    ZeroTimeout,

    #[error("tournament size must be at least 1")]
    InvalidTournamentSize,
}

/// Invalid genotype space declaration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpaceError {
    #[error("genotype space must declare at least one gene")]
    Empty,

    #[error("gene `{0}` is declared more than once")]
    DuplicateGene(String),

    #[error("gene `{name}` has min {min} greater than max {max}")]
    InvalidBounds { name: String, min: f64, max: f64 },

    #[error("gene `{0}` has non-finite bounds")]
    NonFiniteBounds(String),

    #[error("gene `{0}` spans a range too wide to represent")]
    RangeTooWide(String),

    #[error("integer gene `{0}` has no integer inside its bounds")]
    NoIntegerInRange(String),
}

/// Why an individual could not be given a fitness.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalFailure {
    #[error("test function failed: {0}")]
    Mapping(String),

    #[error("loss function failed: {0}")]
    Loss(String),

    #[error("user function panicked: {0}")]
    Panicked(String),

    #[error("loss function returned non-finite value {0}")]
    NonFinite(f64),

    #[error("evaluation timed out after {0:?}")]
    TimedOut(Duration),
}

impl EvalFailure {
    /// Returns `true` for failures caused by the evaluation deadline rather
    /// than by the computation itself.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EvalFailure::TimedOut(_))
    }
}

/// Selection cannot proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("population contains no individual with a valid fitness")]
    NoValidIndividuals,

    #[error("cannot select from an empty population")]
    EmptyPopulation,
}

/// A population could not be advanced to the next generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdvanceError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("population has {actual} members, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Errors that prevent an evolution run from being constructed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvolutionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid genotype space: {0}")]
    Space(#[from] SpaceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ConfigError::EliteCountTooHigh {
            elite: 10,
            population: 10,
        };
        assert_eq!(
            err.to_string(),
            "elite_count (10) must be smaller than population_size (10)"
        );

        let err: EvolutionError = SpaceError::DuplicateGene("lr".into()).into();
        assert_eq!(
            err.to_string(),
            "invalid genotype space: gene `lr` is declared more than once"
        );
    }

    #[test]
    fn test_timeout_is_distinct() {
        assert!(EvalFailure::TimedOut(Duration::from_millis(5)).is_timeout());
        assert!(!EvalFailure::Loss("boom".into()).is_timeout());
        assert!(!EvalFailure::NonFinite(f64::NAN).is_timeout());
    }
}
