//! Core types shared by the engine: fitness, individuals and the two
//! user-supplied capabilities.
//!
//! The engine never looks inside a phenotype. It only needs:
//!
//! 1. a [`TestFunction`] turning a [`Genotype`] into a phenotype, and
//! 2. a [`LossFunction`] turning that phenotype into a scalar fitness.
//!
//! Both may fail; failures are reported through `Result` and turned into
//! [`Fitness::Invalid`] by the [`Evaluator`](crate::Evaluator).
//!
//! Fitness is **maximized**. Express a minimization problem by negating
//! inside the loss function (see [`Minimize`](crate::functions::Minimize)).

use crate::error::{BoxError, EvalFailure};
use crate::space::Genotype;
use std::cmp::Ordering;
use std::fmt;

/// Outcome of evaluating one individual.
#[derive(Debug, Clone, PartialEq)]
pub enum Fitness {
    /// A finite score. Higher is better.
    Valid(f64),
    /// The individual could not be scored.
    Invalid(EvalFailure),
}

impl Fitness {
    /// The score, or `None` when invalid.
    pub fn value(&self) -> Option<f64> {
        match self {
            Fitness::Valid(v) => Some(*v),
            Fitness::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Fitness::Valid(_))
    }

    pub fn failure(&self) -> Option<&EvalFailure> {
        match self {
            Fitness::Valid(_) => None,
            Fitness::Invalid(e) => Some(e),
        }
    }

    /// Total order used for ranking: every invalid fitness ranks below
    /// every valid one, invalid fitnesses compare equal to each other.
    pub fn rank_cmp(&self, other: &Fitness) -> Ordering {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Fitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fitness::Valid(v) => write!(f, "{v}"),
            Fitness::Invalid(e) => write!(f, "invalid ({e})"),
        }
    }
}

/// A candidate solution.
///
/// Created unevaluated from a genotype; the [`Evaluator`](crate::Evaluator)
/// consumes it and returns the evaluated form. There is no way to change
/// the genotype of an existing individual: operators always build new ones.
#[derive(Debug, Clone)]
pub struct Individual<P> {
    genotype: Genotype,
    phenotype: Option<P>,
    fitness: Option<Fitness>,
}

impl<P> Individual<P> {
    /// An unevaluated individual.
    pub fn new(genotype: Genotype) -> Self {
        Self {
            genotype,
            phenotype: None,
            fitness: None,
        }
    }

    pub(crate) fn evaluated(genotype: Genotype, phenotype: Option<P>, fitness: Fitness) -> Self {
        Self {
            genotype,
            phenotype,
            fitness: Some(fitness),
        }
    }

    pub fn genotype(&self) -> &Genotype {
        &self.genotype
    }

    /// The phenotype, if the test function succeeded.
    pub fn phenotype(&self) -> Option<&P> {
        self.phenotype.as_ref()
    }

    /// The fitness, or `None` while unevaluated.
    pub fn fitness(&self) -> Option<&Fitness> {
        self.fitness.as_ref()
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Valid fitness score, `None` for unevaluated or invalid individuals.
    pub fn score(&self) -> Option<f64> {
        self.fitness.as_ref().and_then(Fitness::value)
    }

    pub fn is_valid(&self) -> bool {
        self.score().is_some()
    }

    pub(crate) fn into_genotype(self) -> Genotype {
        self.genotype
    }
}

impl<P> fmt::Display for Individual<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fitness {
            Some(fitness) => writeln!(f, "     fitness : {fitness}")?,
            None => writeln!(f, "     fitness : unevaluated")?,
        }
        write!(f, "{}", self.genotype)
    }
}

/// Maps a genotype to a phenotype.
///
/// Implemented for any `Fn(&Genotype) -> Result<P, BoxError>`.
///
/// # Implementing
///
/// ```
/// use evo_optim::{BoxError, Genotype, TestFunction};
///
/// struct TreeParams;
///
/// impl TestFunction for TreeParams {
///     type Phenotype = (usize, f64);
///
///     fn express(&self, g: &Genotype) -> Result<(usize, f64), BoxError> {
///         let depth = g.get("depth").ok_or("missing depth")? as usize;
///         let eta = g.get("eta").ok_or("missing eta")?;
///         Ok((depth, eta))
///     }
/// }
/// ```
pub trait TestFunction: Send + Sync + 'static {
    /// What the genotype decodes into. Opaque to the engine.
    type Phenotype: Send + Sync + 'static;

    fn express(&self, genotype: &Genotype) -> Result<Self::Phenotype, BoxError>;
}

impl<F, P> TestFunction for F
where
    F: Fn(&Genotype) -> Result<P, BoxError> + Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    type Phenotype = P;

    fn express(&self, genotype: &Genotype) -> Result<P, BoxError> {
        self(genotype)
    }
}

/// Scores a phenotype. Higher is better; non-finite scores are treated as
/// failures.
///
/// Implemented for any `Fn(&P) -> Result<f64, BoxError>`.
pub trait LossFunction<P>: Send + Sync + 'static {
    fn score(&self, phenotype: &P) -> Result<f64, BoxError>;
}

impl<F, P> LossFunction<P> for F
where
    F: Fn(&P) -> Result<f64, BoxError> + Send + Sync + 'static,
{
    fn score(&self, phenotype: &P) -> Result<f64, BoxError> {
        self(phenotype)
    }
}
