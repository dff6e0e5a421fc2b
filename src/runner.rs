//! Generational loop.
//!
//! [`Evolution`] drives a run through
//! `Initializing → Running → {Converged | Exhausted | Failed | Cancelled}`,
//! keeping one [`GenerationRecord`] per generation and the best individual
//! ever seen.

use crate::config::EvolutionConfig;
use crate::error::EvolutionError;
use crate::evaluator::Evaluator;
use crate::population::{GenerationRecord, Population, PopulationManager};
use crate::random::create_rng;
use crate::space::{GeneSpec, GenotypeSpace};
use crate::types::{Individual, LossFunction, TestFunction};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunState {
    /// Initial population not built yet.
    Initializing,
    /// Advancing generations.
    Running,
    /// Best-ever fitness stopped improving for `patience` generations.
    Converged,
    /// `max_generations` reached.
    Exhausted,
    /// A generation had no valid individual to select from.
    Failed,
    /// Stopped by the external cancel flag between generations.
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Initializing | RunState::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Initializing => "initializing",
            RunState::Running => "running",
            RunState::Converged => "converged",
            RunState::Exhausted => "exhausted",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

type GenerationHook<P> = Box<dyn FnMut(&GenerationRecord<P>) + Send>;

/// An evolution run.
///
/// # Usage
///
/// ```
/// use evo_optim::{BoxError, Evolution, EvolutionConfig, GeneSpec, Genotype, RunState};
///
/// let genes = vec![
///     GeneSpec::continuous("x", -5.0, 5.0),
///     GeneSpec::continuous("y", -5.0, 5.0),
/// ];
/// let test = |g: &Genotype| -> Result<Vec<f64>, BoxError> { Ok(g.values().to_vec()) };
/// let loss = |p: &Vec<f64>| -> Result<f64, BoxError> {
///     Ok(-p.iter().map(|v| v * v).sum::<f64>())
/// };
/// let config = EvolutionConfig::fast().with_seed(42);
///
/// let result = Evolution::from_genes(genes, test, loss, config).unwrap().run();
/// assert!(matches!(result.state, RunState::Converged | RunState::Exhausted));
/// assert!(result.best_fitness().unwrap() > -1.0);
/// ```
pub struct Evolution<T: TestFunction, L> {
    manager: PopulationManager<T, L>,
    seed: u64,
    state: RunState,
    population: Option<Population<T::Phenotype>>,
    history: Vec<GenerationRecord<T::Phenotype>>,
    best_ever: Option<Arc<Individual<T::Phenotype>>>,
    stagnation: usize,
    failed_at: Option<usize>,
    on_generation: Option<GenerationHook<T::Phenotype>>,
}

impl<T, L> Evolution<T, L>
where
    T: TestFunction,
    L: LossFunction<T::Phenotype>,
{
    /// Creates a run over an existing space.
    ///
    /// # Errors
    ///
    /// [`EvolutionError::Config`] if `config` is invalid. Nothing is
    /// evaluated before validation succeeds.
    pub fn new(
        space: GenotypeSpace,
        test: T,
        loss: L,
        config: EvolutionConfig,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let evaluator = Evaluator::new(test, loss).with_timeout(config.eval_timeout);
        Ok(Self {
            manager: PopulationManager::new(space, evaluator, config, seed),
            seed,
            state: RunState::Initializing,
            population: None,
            history: Vec::new(),
            best_ever: None,
            stagnation: 0,
            failed_at: None,
            on_generation: None,
        })
    }

    /// Validates the gene declarations and the configuration, then creates
    /// the run.
    pub fn from_genes(
        genes: Vec<GeneSpec>,
        test: T,
        loss: L,
        config: EvolutionConfig,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        let space = GenotypeSpace::new(genes)?;
        Self::new(space, test, loss, config)
    }

    /// Registers a callback invoked with every generation record, starting
    /// with generation 0.
    pub fn on_generation(
        mut self,
        hook: impl FnMut(&GenerationRecord<T::Phenotype>) + Send + 'static,
    ) -> Self {
        self.on_generation = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The master seed, drawn at construction when the config had none.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &EvolutionConfig {
        self.manager.config()
    }

    pub fn population(&self) -> Option<&Population<T::Phenotype>> {
        self.population.as_ref()
    }

    pub fn history(&self) -> &[GenerationRecord<T::Phenotype>] {
        &self.history
    }

    pub fn best_ever(&self) -> Option<&Arc<Individual<T::Phenotype>>> {
        self.best_ever.as_ref()
    }

    /// Performs one transition: builds generation 0 when initializing,
    /// otherwise advances one generation and checks stopping criteria.
    /// Terminal states are left unchanged.
    pub fn step(&mut self) -> RunState {
        match self.state {
            RunState::Initializing => self.initialize(),
            RunState::Running => self.advance(),
            _ => {}
        }
        self.state
    }

    /// Runs to a terminal state.
    pub fn run(self) -> EvolutionResult<T::Phenotype> {
        self.run_with_cancel(None)
    }

    /// Runs with an optional cancellation flag.
    ///
    /// The flag is checked between generations only; a generation in
    /// progress always completes.
    pub fn run_with_cancel(mut self, cancel: Option<Arc<AtomicBool>>) -> EvolutionResult<T::Phenotype> {
        while !self.state.is_terminal() {
            let stop = cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed));
            if stop && self.state == RunState::Running {
                log::info!(
                    "cancelled after generation {}",
                    self.population.as_ref().map_or(0, Population::generation)
                );
                self.state = RunState::Cancelled;
                break;
            }
            self.step();
        }
        self.finish()
    }

    fn initialize(&mut self) {
        let config = self.manager.config();
        log::info!(
            "starting evolution: population {}, elites {}, {} genes, seed {}",
            config.population_size,
            config.elite_count,
            self.manager.space().len(),
            self.seed
        );
        let mut rng = create_rng(self.seed);
        let population = self.manager.initialize(&mut rng);
        let record = population.record();
        let dead = record.all_invalid();
        self.accept(record);
        self.population = Some(population);
        self.state = RunState::Running;
        if dead {
            self.fail(0);
        }
    }

    fn advance(&mut self) {
        let Some(current) = self.population.as_ref() else {
            self.state = RunState::Initializing;
            return;
        };

        let current_generation = current.generation();
        match self.manager.advance(current) {
            Ok((next, record)) => {
                let dead = record.all_invalid();
                let improvement = self.accept(record);
                let generation = next.generation();
                self.population = Some(next);
                if dead {
                    self.fail(generation);
                } else {
                    self.check_stopping(generation, improvement);
                }
            }
            Err(err) => {
                log::error!("generation {current_generation}: {err}; run failed");
                self.failed_at = Some(current_generation);
                self.state = RunState::Failed;
            }
        }
    }

    /// Ends the run on a generation with no valid individual.
    fn fail(&mut self, generation: usize) {
        log::error!("generation {generation}: every individual is invalid; run failed");
        self.failed_at = Some(generation);
        self.state = RunState::Failed;
    }

    /// Appends a record and updates best-ever. Returns the gain in
    /// best-ever fitness, `None` if it did not change.
    fn accept(&mut self, record: GenerationRecord<T::Phenotype>) -> Option<f64> {
        log::debug!(
            "generation {}: best {:?}, mean {:?}, invalid {}/{}",
            record.generation,
            record.best_fitness(),
            record.mean_fitness,
            record.invalid_count,
            record.size
        );
        if let Some(hook) = self.on_generation.as_mut() {
            hook(&record);
        }

        let previous = self.best_ever.as_ref().and_then(|b| b.score());
        let improvement = match (record.best.as_ref(), record.best_fitness()) {
            (Some(best), Some(score)) if previous.map_or(true, |p| score > p) => {
                self.best_ever = Some(Arc::clone(best));
                Some(previous.map_or(f64::INFINITY, |p| score - p))
            }
            _ => None,
        };

        self.history.push(record);
        improvement
    }

    fn check_stopping(&mut self, generation: usize, improvement: Option<f64>) {
        let config = self.manager.config();
        match improvement {
            Some(gain) if gain > config.convergence_threshold => self.stagnation = 0,
            _ => self.stagnation += 1,
        }

        if generation >= config.max_generations {
            self.state = RunState::Exhausted;
        } else if config.patience.is_some_and(|p| self.stagnation >= p) {
            log::info!(
                "converged at generation {generation}: no gain above {} for {} generations",
                config.convergence_threshold,
                self.stagnation
            );
            self.state = RunState::Converged;
        }
    }

    fn finish(self) -> EvolutionResult<T::Phenotype> {
        let generations = self.population.as_ref().map_or(0, Population::generation);
        log::info!(
            "evolution {} after {generations} generations, best fitness {:?}",
            self.state,
            self.best_ever.as_ref().and_then(|b| b.score())
        );
        EvolutionResult {
            state: self.state,
            seed: self.seed,
            generations,
            failed_at: self.failed_at,
            best: self.best_ever,
            history: self.history,
            final_population: self.population,
        }
    }
}

/// Outcome of a run.
#[derive(Debug)]
pub struct EvolutionResult<P> {
    /// Terminal state.
    pub state: RunState,

    /// Master seed; rerunning with it reproduces the run.
    pub seed: u64,

    /// Index of the last generation produced.
    pub generations: usize,

    /// Generation whose population was entirely invalid, when `Failed`.
    pub failed_at: Option<usize>,

    /// Best individual over the whole run, if any was ever valid.
    pub best: Option<Arc<Individual<P>>>,

    /// One record per generation, generation 0 first.
    pub history: Vec<GenerationRecord<P>>,

    /// Last population, absent only if the run never initialized.
    pub final_population: Option<Population<P>>,
}

impl<P> EvolutionResult<P> {
    pub fn best_fitness(&self) -> Option<f64> {
        self.best.as_ref().and_then(|b| b.score())
    }

    /// Best-ever fitness after each generation. Non-decreasing.
    pub fn best_fitness_history(&self) -> Vec<Option<f64>> {
        let mut running: Option<f64> = None;
        self.history
            .iter()
            .map(|r| {
                running = match (running, r.best_fitness()) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
                running
            })
            .collect()
    }

    /// Best and worst individual of every generation as plain numbers,
    /// ready for plotting the search trajectory.
    pub fn trace(&self) -> Vec<TraceRow> {
        self.history
            .iter()
            .map(|r| TraceRow {
                generation: r.generation,
                best: r.best.as_deref().and_then(TracePoint::from_individual),
                worst: r.worst.as_deref().and_then(TracePoint::from_individual),
            })
            .collect()
    }
}

/// Gene values and fitness of one individual.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TracePoint {
    pub genes: Vec<f64>,
    pub fitness: f64,
}

impl TracePoint {
    fn from_individual<P>(ind: &Individual<P>) -> Option<Self> {
        Some(Self {
            genes: ind.genotype().values().to_vec(),
            fitness: ind.score()?,
        })
    }
}

/// Best and worst point of one generation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceRow {
    pub generation: usize,
    pub best: Option<TracePoint>,
    pub worst: Option<TracePoint>,
}
