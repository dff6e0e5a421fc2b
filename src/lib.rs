//! Evolutionary optimizer for black-box parameter search.
//!
//! Users declare a [`GenotypeSpace`] of bounded continuous or integer genes,
//! a [`TestFunction`] mapping a genotype to a phenotype (e.g. trained model
//! settings) and a [`LossFunction`] scoring that phenotype. The engine
//! evolves a population toward **higher** fitness without gradients.
//!
//! # Core Types
//!
//! - [`GenotypeSpace`], [`GeneSpec`], [`Genotype`]: the search space
//! - [`Individual`], [`Fitness`]: evaluated candidates; invalid fitness marks
//!   candidates whose user code failed
//! - [`Evaluator`]: runs user code, isolating errors, panics and timeouts
//! - [`Selection`], [`Crossover`], [`GaussianMutation`]: variation operators
//! - [`PopulationManager`], [`Population`], [`GenerationRecord`]: one
//!   generation step and its summary
//! - [`Evolution`], [`EvolutionConfig`], [`EvolutionResult`]: the run itself
//!
//! # Reproducibility
//!
//! A run is a pure function of its seed and configuration as long as the
//! user functions are deterministic. Parallel and sequential evaluation
//! produce identical histories; see [`random`].
//!
//! # References
//!
//! - Holland (1975), *Adaptation in Natural and Artificial Systems*
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and Machine Learning*
//! - De Jong (2006), *Evolutionary Computation: A Unified Approach*

mod config;
pub mod error;
mod evaluator;
pub mod functions;
mod operators;
mod population;
pub mod random;
mod runner;
mod selection;
mod space;
mod types;

pub use config::{ElitePolicy, EvolutionConfig};
pub use error::{
    AdvanceError, BoxError, ConfigError, EvalFailure, EvolutionError, SelectionError, SpaceError,
};
pub use evaluator::Evaluator;
pub use operators::{Crossover, GaussianMutation};
pub use population::{GenerationRecord, Population, PopulationManager};
pub use runner::{Evolution, EvolutionResult, RunState, TracePoint, TraceRow};
pub use selection::{Selection, Selector};
pub use space::{GeneKind, GeneSpec, Genotype, GenotypeSpace};
pub use types::{Fitness, Individual, LossFunction, TestFunction};
