//! Run configuration.
//!
//! [`EvolutionConfig`] holds every parameter of the generational loop.
//! It is consumed, never mutated, by the engine and validated eagerly
//! before the first individual is evaluated.

use crate::error::ConfigError;
use crate::operators::Crossover;
use crate::selection::Selection;
use std::time::Duration;

/// Whether individuals with invalid fitness may be carried forward as elites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElitePolicy {
    /// Only valid individuals are elites; fewer than `elite_count` may
    /// survive when the population has few valid members.
    #[default]
    ExcludeInvalid,
    /// Fill the elite slots by rank, invalid individuals ranking last.
    IncludeInvalid,
}

/// Configuration for an evolution run.
///
/// # Defaults
///
/// ```
/// use evo_optim::EvolutionConfig;
///
/// let config = EvolutionConfig::default();
/// assert_eq!(config.population_size, 100);
/// assert_eq!(config.elite_count, 2);
/// assert!(config.validate().is_ok());
/// ```
///
/// # Builder Pattern
///
/// ```
/// use evo_optim::{Crossover, EvolutionConfig, Selection};
///
/// let config = EvolutionConfig::default()
///     .with_population_size(40)
///     .with_elite_count(1)
///     .with_selection(Selection::Tournament(3))
///     .with_crossover(Crossover::Uniform)
///     .with_mutation_rate(0.2)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvolutionConfig {
    /// Number of individuals per generation (`N`).
    pub population_size: usize,

    /// Individuals copied unchanged into the next generation (`E < N`).
    pub elite_count: usize,

    /// Which individuals may be elites.
    pub elite_policy: ElitePolicy,

    /// Parent selection strategy.
    pub selection: Selection,

    /// Recombination scheme.
    pub crossover: Crossover,

    /// Probability that a parent pair is recombined (`p_c`).
    pub crossover_rate: f64,

    /// Per-gene mutation probability (`p_m`).
    pub mutation_rate: f64,

    /// Mutation standard deviation as a fraction of each gene's range.
    pub mutation_scale: f64,

    /// Generations to run after the initial population.
    pub max_generations: usize,

    /// Minimum gain in best-ever fitness that counts as progress.
    pub convergence_threshold: f64,

    /// Stop after this many consecutive generations without progress.
    ///
    /// `None` disables convergence detection.
    pub patience: Option<usize>,

    /// Evaluate children on rayon worker threads.
    ///
    /// Results are identical to sequential runs; see [`crate::random`].
    pub parallel: bool,

    /// Per-individual evaluation deadline. Expired evaluations are invalid.
    pub eval_timeout: Option<Duration>,

    /// Master random seed. `None` draws one (reported in the result).
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            elite_count: 2,
            elite_policy: ElitePolicy::default(),
            selection: Selection::default(),
            crossover: Crossover::default(),
            crossover_rate: 0.9,
            mutation_rate: 0.1,
            mutation_scale: 0.1,
            max_generations: 100,
            convergence_threshold: 0.0,
            patience: None,
            parallel: true,
            eval_timeout: None,
            seed: None,
        }
    }
}

impl EvolutionConfig {
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_elite_count(mut self, e: usize) -> Self {
        self.elite_count = e;
        self
    }

    pub fn with_elite_policy(mut self, policy: ElitePolicy) -> Self {
        self.elite_policy = policy;
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_crossover(mut self, crossover: Crossover) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_mutation_scale(mut self, scale: f64) -> Self {
        self.mutation_scale = scale;
        self
    }

    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    /// Enables convergence detection: stop once best-ever fitness has not
    /// improved by more than `threshold` for `patience` generations.
    pub fn with_convergence(mut self, threshold: f64, patience: usize) -> Self {
        self.convergence_threshold = threshold;
        self.patience = Some(patience);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_eval_timeout(mut self, timeout: Duration) -> Self {
        self.eval_timeout = Some(timeout);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Small, quick runs for smoke tests and cheap objectives.
    ///
    /// - Population: 20, Elites: 1, Generations: 50
    /// - Patience: 10
    pub fn fast() -> Self {
        Self {
            population_size: 20,
            elite_count: 1,
            max_generations: 50,
            patience: Some(10),
            ..Self::default()
        }
    }

    /// Moderate population and run length.
    ///
    /// - Population: 100, Elites: 2, Generations: 200
    /// - Patience: 30, Convergence threshold: 1e-6
    pub fn balanced() -> Self {
        Self {
            population_size: 100,
            elite_count: 2,
            max_generations: 200,
            convergence_threshold: 1e-6,
            patience: Some(30),
            ..Self::default()
        }
    }

    /// Large population, long run, rank selection for steady pressure.
    ///
    /// - Population: 200, Elites: 4, Generations: 500
    /// - Patience: 80, Convergence threshold: 1e-8
    pub fn thorough() -> Self {
        Self {
            population_size: 200,
            elite_count: 4,
            selection: Selection::Rank,
            max_generations: 500,
            convergence_threshold: 1e-8,
            patience: Some(80),
            ..Self::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall(self.population_size));
        }
        if self.elite_count >= self.population_size {
            return Err(ConfigError::EliteCountTooHigh {
                elite: self.elite_count,
                population: self.population_size,
            });
        }
        check_rate("crossover_rate", self.crossover_rate)?;
        check_rate("mutation_rate", self.mutation_rate)?;
        if !self.mutation_scale.is_finite() || self.mutation_scale < 0.0 {
            return Err(ConfigError::InvalidMagnitude(self.mutation_scale));
        }
        if self.max_generations == 0 {
            return Err(ConfigError::ZeroGenerations);
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.convergence_threshold));
        }
        if self.patience == Some(0) {
            return Err(ConfigError::InvalidPatience);
        }
        if self.eval_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.selection == Selection::Tournament(0) {
            return Err(ConfigError::InvalidTournamentSize);
        }
        Ok(())
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RateOutOfRange { name, value })
    }
}
