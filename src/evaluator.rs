//! Evaluation of individuals through the user-supplied functions.
//!
//! The [`Evaluator`] is the only place that calls into user code. Errors,
//! panics, non-finite scores and (optionally) timeouts are all converted
//! into [`Fitness::Invalid`]; nothing escapes to the caller, so a single bad
//! individual cannot abort a run.

use crate::error::EvalFailure;
use crate::space::Genotype;
use crate::types::{Fitness, Individual, LossFunction, TestFunction};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Applies the test function, then the loss function, to individuals.
///
/// Both functions are held behind `Arc` so that a timed evaluation can run
/// on a detached worker thread that outlives the deadline.
pub struct Evaluator<T, L> {
    test: Arc<T>,
    loss: Arc<L>,
    timeout: Option<Duration>,
}

impl<T, L> Clone for Evaluator<T, L> {
    fn clone(&self) -> Self {
        Self {
            test: Arc::clone(&self.test),
            loss: Arc::clone(&self.loss),
            timeout: self.timeout,
        }
    }
}

impl<T, L> Evaluator<T, L>
where
    T: TestFunction,
    L: LossFunction<T::Phenotype>,
{
    pub fn new(test: T, loss: L) -> Self {
        Self {
            test: Arc::new(test),
            loss: Arc::new(loss),
            timeout: None,
        }
    }

    /// Sets a per-individual deadline. `None` runs user code inline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Evaluates an unevaluated individual.
    ///
    /// An individual that already carries a fitness is returned unchanged;
    /// fitness is computed exactly once.
    pub fn evaluate(&self, individual: Individual<T::Phenotype>) -> Individual<T::Phenotype> {
        if individual.is_evaluated() {
            return individual;
        }
        let genotype = individual.into_genotype();
        let (phenotype, fitness) = match self.timeout {
            None => compute(&*self.test, &*self.loss, &genotype),
            Some(limit) => self.compute_with_deadline(&genotype, limit),
        };

        match fitness.failure() {
            Some(failure) if failure.is_timeout() => {
                log::warn!("evaluation timed out for {:?}: {failure}", genotype.values());
            }
            Some(failure) => {
                log::warn!("evaluation failed for {:?}: {failure}", genotype.values());
            }
            None => log::trace!("evaluated {:?} -> {fitness}", genotype.values()),
        }

        Individual::evaluated(genotype, phenotype, fitness)
    }

    /// Shorthand for evaluating a fresh genotype.
    pub fn evaluate_genotype(&self, genotype: Genotype) -> Individual<T::Phenotype> {
        self.evaluate(Individual::new(genotype))
    }

    /// Evaluates a batch, preserving order.
    pub fn evaluate_all(
        &self,
        genotypes: Vec<Genotype>,
        parallel: bool,
    ) -> Vec<Individual<T::Phenotype>> {
        #[cfg(feature = "parallel")]
        {
            if parallel {
                return genotypes
                    .into_par_iter()
                    .map(|g| self.evaluate_genotype(g))
                    .collect();
            }
        }
        #[cfg(not(feature = "parallel"))]
        let _ = parallel;

        genotypes
            .into_iter()
            .map(|g| self.evaluate_genotype(g))
            .collect()
    }

    fn compute_with_deadline(
        &self,
        genotype: &Genotype,
        limit: Duration,
    ) -> (Option<T::Phenotype>, Fitness) {
        let (tx, rx) = mpsc::channel();
        let test = Arc::clone(&self.test);
        let loss = Arc::clone(&self.loss);
        let owned = genotype.clone();

        let spawned = thread::Builder::new()
            .name("evo-eval".into())
            .spawn(move || {
                let _ = tx.send(compute(&*test, &*loss, &owned));
            });
        if let Err(e) = spawned {
            log::warn!("could not spawn evaluation thread ({e}); evaluating inline");
            return compute(&*self.test, &*self.loss, genotype);
        }

        match rx.recv_timeout(limit) {
            Ok(out) => out,
            // The worker keeps running; its result is dropped when it finishes.
            Err(RecvTimeoutError::Timeout) => (None, Fitness::Invalid(EvalFailure::TimedOut(limit))),
            Err(RecvTimeoutError::Disconnected) => (
                None,
                Fitness::Invalid(EvalFailure::Panicked(
                    "evaluation thread exited without a result".into(),
                )),
            ),
        }
    }
}

fn compute<T, L>(test: &T, loss: &L, genotype: &Genotype) -> (Option<T::Phenotype>, Fitness)
where
    T: TestFunction,
    L: LossFunction<T::Phenotype>,
{
    let phenotype = match guarded(|| test.express(genotype)) {
        Ok(Ok(p)) => p,
        Ok(Err(e)) => return (None, Fitness::Invalid(EvalFailure::Mapping(e.to_string()))),
        Err(msg) => return (None, Fitness::Invalid(EvalFailure::Panicked(msg))),
    };

    let fitness = match guarded(|| loss.score(&phenotype)) {
        Ok(Ok(v)) if v.is_finite() => Fitness::Valid(v),
        Ok(Ok(v)) => Fitness::Invalid(EvalFailure::NonFinite(v)),
        Ok(Err(e)) => Fitness::Invalid(EvalFailure::Loss(e.to_string())),
        Err(msg) => Fitness::Invalid(EvalFailure::Panicked(msg)),
    };

    (Some(phenotype), fitness)
}

/// Runs user code, turning a panic into its message.
fn guarded<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
