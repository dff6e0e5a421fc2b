//! Populations and the generation step.
//!
//! A [`Population`] is an immutable snapshot of one generation. Members are
//! shared through `Arc`, so elites move into the next generation and into
//! the history without copying or re-evaluation.
//!
//! [`PopulationManager::advance`] builds generation `g + 1` from `g`:
//!
//! 1. carry the top `E` individuals forward unchanged,
//! 2. for each offspring pairing: select two parents, cross them over,
//!    mutate both children and evaluate them,
//! 3. append children in pairing order until the population has `N` members.
//!
//! Every pairing draws from its own random stream (see [`crate::random`]),
//! so pairings may be bred on any worker thread in any order.

use crate::config::{ElitePolicy, EvolutionConfig};
use crate::error::AdvanceError;
use crate::evaluator::Evaluator;
use crate::operators::GaussianMutation;
use crate::random::stream_rng;
use crate::selection::Selector;
use crate::space::GenotypeSpace;
use crate::types::{Individual, LossFunction, TestFunction};
use rand::Rng;
use std::cmp::Ordering;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One generation of evaluated individuals.
#[derive(Debug)]
pub struct Population<P> {
    generation: usize,
    members: Vec<Arc<Individual<P>>>,
}

impl<P> Clone for Population<P> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            members: self.members.clone(),
        }
    }
}

impl<P> Population<P> {
    pub(crate) fn new(generation: usize, members: Vec<Arc<Individual<P>>>) -> Self {
        debug_assert!(members.iter().all(|m| m.is_evaluated()));
        Self {
            generation,
            members,
        }
    }

    /// Index of this generation; the initial population is generation 0.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn members(&self) -> &[Arc<Individual<P>>] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Fitness scores in population order, `None` for invalid individuals.
    pub fn scores(&self) -> Vec<Option<f64>> {
        self.members.iter().map(|m| m.score()).collect()
    }

    pub fn invalid_count(&self) -> usize {
        self.members.iter().filter(|m| !m.is_valid()).count()
    }

    /// Fittest valid individual; ties go to the earliest member.
    pub fn best(&self) -> Option<&Arc<Individual<P>>> {
        self.valid()
            .reduce(|best, m| if m.score() > best.score() { m } else { best })
    }

    /// Least fit valid individual; ties go to the earliest member.
    pub fn worst(&self) -> Option<&Arc<Individual<P>>> {
        self.valid()
            .reduce(|worst, m| if m.score() < worst.score() { m } else { worst })
    }

    /// Mean fitness over valid individuals.
    pub fn mean_fitness(&self) -> Option<f64> {
        let (sum, n) = self
            .members
            .iter()
            .filter_map(|m| m.score())
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Member indices ordered best first. Invalid members rank last; ties
    /// keep population order.
    pub fn ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.members.len()).collect();
        order.sort_by(|&a, &b| rank_desc(&self.members[a], &self.members[b]));
        order
    }

    /// Snapshot for history and visualization.
    pub fn record(&self) -> GenerationRecord<P> {
        GenerationRecord {
            generation: self.generation,
            best: self.best().cloned(),
            worst: self.worst().cloned(),
            mean_fitness: self.mean_fitness(),
            invalid_count: self.invalid_count(),
            size: self.members.len(),
        }
    }

    fn valid(&self) -> impl Iterator<Item = &Arc<Individual<P>>> + '_ {
        self.members.iter().filter(|m| m.is_valid())
    }
}

fn rank_desc<P>(a: &Individual<P>, b: &Individual<P>) -> Ordering {
    match (a.fitness(), b.fitness()) {
        (Some(fa), Some(fb)) => fb.rank_cmp(fa),
        _ => Ordering::Equal,
    }
}

/// Per-generation summary.
///
/// `best` and `worst` ignore invalid individuals; both are `None` when the
/// whole generation is invalid (see [`all_invalid`](Self::all_invalid)).
#[derive(Debug)]
pub struct GenerationRecord<P> {
    pub generation: usize,
    pub best: Option<Arc<Individual<P>>>,
    pub worst: Option<Arc<Individual<P>>>,
    pub mean_fitness: Option<f64>,
    pub invalid_count: usize,
    pub size: usize,
}

impl<P> Clone for GenerationRecord<P> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            best: self.best.clone(),
            worst: self.worst.clone(),
            mean_fitness: self.mean_fitness,
            invalid_count: self.invalid_count,
            size: self.size,
        }
    }
}

impl<P> GenerationRecord<P> {
    pub fn all_invalid(&self) -> bool {
        self.best.is_none()
    }

    pub fn best_fitness(&self) -> Option<f64> {
        self.best.as_ref().and_then(|b| b.score())
    }

    pub fn worst_fitness(&self) -> Option<f64> {
        self.worst.as_ref().and_then(|w| w.score())
    }

    /// Genotype-and-fitness comparison, ignoring phenotypes. Used to check
    /// reproducibility between runs.
    pub fn same_outcome(&self, other: &GenerationRecord<P>) -> bool {
        fn same<P>(a: &Option<Arc<Individual<P>>>, b: &Option<Arc<Individual<P>>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a.genotype() == b.genotype() && a.score() == b.score(),
                (None, None) => true,
                _ => false,
            }
        }
        self.generation == other.generation
            && self.invalid_count == other.invalid_count
            && self.mean_fitness == other.mean_fitness
            && same(&self.best, &other.best)
            && same(&self.worst, &other.worst)
    }
}

/// Builds and advances populations for one run.
pub struct PopulationManager<T, L> {
    space: GenotypeSpace,
    evaluator: Evaluator<T, L>,
    config: EvolutionConfig,
    seed: u64,
}

impl<T, L> PopulationManager<T, L>
where
    T: TestFunction,
    L: LossFunction<T::Phenotype>,
{
    /// `config` is assumed valid; see [`EvolutionConfig::validate`].
    pub fn new(
        space: GenotypeSpace,
        evaluator: Evaluator<T, L>,
        config: EvolutionConfig,
        seed: u64,
    ) -> Self {
        Self {
            space,
            evaluator,
            config,
            seed,
        }
    }

    pub fn space(&self) -> &GenotypeSpace {
        &self.space
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Samples and evaluates generation 0.
    pub fn initialize<R: Rng>(&self, rng: &mut R) -> Population<T::Phenotype> {
        let genotypes = (0..self.config.population_size)
            .map(|_| self.space.sample(rng))
            .collect();
        let members = self
            .evaluator
            .evaluate_all(genotypes, self.config.parallel)
            .into_iter()
            .map(Arc::new)
            .collect();
        Population::new(0, members)
    }

    /// Produces the next generation and its record.
    ///
    /// Members of a [`Population`] are always evaluated; only the size is
    /// checked here.
    ///
    /// # Errors
    ///
    /// - [`AdvanceError::SizeMismatch`] if `population` does not have
    ///   `population_size` members, e.g. it came from another manager.
    /// - [`AdvanceError::Selection`] if `population` has no valid member;
    ///   no selection pressure can be applied.
    pub fn advance(
        &self,
        population: &Population<T::Phenotype>,
    ) -> Result<(Population<T::Phenotype>, GenerationRecord<T::Phenotype>), AdvanceError> {
        let n = self.config.population_size;
        if population.len() != n {
            return Err(AdvanceError::SizeMismatch {
                expected: n,
                actual: population.len(),
            });
        }

        let selector = self.config.selection.prepare(&population.scores())?;
        let next_index = population.generation() + 1;

        let mut next: Vec<Arc<Individual<T::Phenotype>>> = Vec::with_capacity(n);
        next.extend(self.elites(population));

        let needed = n - next.len();
        let pairings = needed.div_ceil(2);
        let breed = |i: usize| {
            let keep_both = 2 * i + 2 <= needed;
            self.breed(population, &selector, next_index, i, keep_both)
        };

        #[cfg(feature = "parallel")]
        let broods: Vec<Vec<Individual<T::Phenotype>>> = if self.config.parallel {
            (0..pairings).into_par_iter().map(breed).collect()
        } else {
            (0..pairings).map(breed).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let broods: Vec<Vec<Individual<T::Phenotype>>> = (0..pairings).map(breed).collect();

        next.extend(broods.into_iter().flatten().map(Arc::new));
        debug_assert_eq!(next.len(), n);

        let next = Population::new(next_index, next);
        let record = next.record();
        if record.invalid_count > 0 {
            log::warn!(
                "generation {next_index}: {}/{n} individuals invalid",
                record.invalid_count
            );
        }
        Ok((next, record))
    }

    fn elites(
        &self,
        population: &Population<T::Phenotype>,
    ) -> Vec<Arc<Individual<T::Phenotype>>> {
        let policy = self.config.elite_policy;
        population
            .ranking()
            .into_iter()
            .map(|i| Arc::clone(&population.members()[i]))
            .filter(|m| policy == ElitePolicy::IncludeInvalid || m.is_valid())
            .take(self.config.elite_count)
            .collect()
    }

    /// One pairing: select, cross over, mutate, evaluate. The second child
    /// is dropped when only one slot remains.
    fn breed(
        &self,
        population: &Population<T::Phenotype>,
        selector: &Selector,
        generation: usize,
        pairing: usize,
        keep_both: bool,
    ) -> Vec<Individual<T::Phenotype>> {
        let mut rng = stream_rng(self.seed, generation, pairing);
        let members = population.members();
        let a = members[selector.pick(&mut rng)].genotype();
        let b = members[selector.pick(&mut rng)].genotype();

        let (c1, c2) = self.config.crossover.apply(
            &self.space,
            a,
            b,
            self.config.crossover_rate,
            &mut rng,
        );
        let mutation = GaussianMutation::new(self.config.mutation_rate, self.config.mutation_scale);
        let c1 = mutation.apply(&self.space, c1, &mut rng);
        let c2 = mutation.apply(&self.space, c2, &mut rng);

        let mut brood = Vec::with_capacity(2);
        brood.push(self.evaluator.evaluate_genotype(c1));
        if keep_both {
            brood.push(self.evaluator.evaluate_genotype(c2));
        }
        brood
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, SelectionError};
    use crate::random::create_rng;
    use crate::space::{GeneSpec, Genotype};

    type Manager = PopulationManager<
        fn(&Genotype) -> Result<Vec<f64>, BoxError>,
        fn(&Vec<f64>) -> Result<f64, BoxError>,
    >;

    fn identity(g: &Genotype) -> Result<Vec<f64>, BoxError> {
        Ok(g.values().to_vec())
    }

    fn neg_sq(p: &Vec<f64>) -> Result<f64, BoxError> {
        Ok(-p.iter().map(|x| x * x).sum::<f64>())
    }

    fn positive_only(p: &Vec<f64>) -> Result<f64, BoxError> {
        if p[0] > 0.0 {
            Ok(p[0])
        } else {
            Err("negative".into())
        }
    }

    fn manager(config: EvolutionConfig, loss: fn(&Vec<f64>) -> Result<f64, BoxError>) -> Manager {
        let space = GenotypeSpace::new(vec![
            GeneSpec::continuous("x", -5.0, 5.0),
            GeneSpec::continuous("y", -5.0, 5.0),
        ])
        .unwrap();
        let test: fn(&Genotype) -> Result<Vec<f64>, BoxError> = identity;
        PopulationManager::new(space, Evaluator::new(test, loss), config, 42)
    }

    fn config() -> EvolutionConfig {
        EvolutionConfig::default()
            .with_population_size(11)
            .with_elite_count(2)
            .with_parallel(false)
    }

    #[test]
    fn test_size_is_preserved() {
        let m = manager(config(), neg_sq);
        let mut pop = m.initialize(&mut create_rng(1));
        assert_eq!(pop.len(), 11);
        for _ in 0..10 {
            let (next, record) = m.advance(&pop).unwrap();
            assert_eq!(next.len(), 11);
            assert_eq!(record.size, 11);
            assert_eq!(next.generation(), pop.generation() + 1);
            pop = next;
        }
    }

    #[test]
    fn test_odd_offspring_count_drops_last_second_child() {
        // N - E = 9: four full pairings plus one pairing keeping one child.
        let m = manager(config(), neg_sq);
        let pop = m.initialize(&mut create_rng(1));
        let (next, _) = m.advance(&pop).unwrap();
        assert_eq!(next.len(), 11);

        let selector = m.config.selection.prepare(&pop.scores()).unwrap();
        let offspring: Vec<Genotype> = (0..5)
            .flat_map(|i| m.breed(&pop, &selector, 1, i, true))
            .map(|ind| ind.genotype().clone())
            .collect();
        assert_eq!(offspring.len(), 10);

        // Slots after the two elites hold every child in pairing order,
        // except the second child of pairing 4.
        let bred: Vec<Genotype> = next.members()[2..]
            .iter()
            .map(|m| m.genotype().clone())
            .collect();
        assert_eq!(bred, offspring[..9]);
        assert_eq!(next.members()[10].genotype(), &offspring[8]);

        let last = m.breed(&pop, &selector, 1, 4, false);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].genotype(), &offspring[8]);
    }

    #[test]
    fn test_rejects_wrong_sized_population() {
        let small = manager(config().with_population_size(5).with_elite_count(1), neg_sq);
        let pop = small.initialize(&mut create_rng(1));
        let m = manager(config(), neg_sq);
        assert_eq!(
            m.advance(&pop).unwrap_err(),
            AdvanceError::SizeMismatch {
                expected: 11,
                actual: 5
            }
        );
    }

    #[test]
    fn test_elites_survive_unchanged() {
        let m = manager(config(), neg_sq);
        let pop = m.initialize(&mut create_rng(3));
        let ranking = pop.ranking();
        let (next, _) = m.advance(&pop).unwrap();

        for (slot, &idx) in ranking.iter().take(2).enumerate() {
            assert!(Arc::ptr_eq(&next.members()[slot], &pop.members()[idx]));
        }
    }

    #[test]
    fn test_best_and_worst() {
        let m = manager(config(), neg_sq);
        let pop = m.initialize(&mut create_rng(5));
        let scores: Vec<f64> = pop.scores().into_iter().flatten().collect();
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);

        let record = pop.record();
        assert_eq!(record.best_fitness(), Some(max));
        assert_eq!(record.worst_fitness(), Some(min));
        assert_eq!(record.invalid_count, 0);
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        assert!((record.mean_fitness.unwrap() - mean).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_members_are_not_elites_by_default() {
        let m = manager(config().with_elite_count(5), positive_only);
        let pop = m.initialize(&mut create_rng(8));
        let valid = pop.members().iter().filter(|i| i.is_valid()).count();
        assert!(valid > 0 && valid < 11, "seed should mix valid and invalid");

        let elites = m.elites(&pop);
        assert_eq!(elites.len(), valid.min(5));
        assert!(elites.iter().all(|e| e.is_valid()));
    }

    #[test]
    fn test_include_invalid_policy_fills_elite_slots() {
        let m = manager(
            config()
                .with_elite_count(10)
                .with_elite_policy(ElitePolicy::IncludeInvalid),
            positive_only,
        );
        let pop = m.initialize(&mut create_rng(8));
        assert_eq!(m.elites(&pop).len(), 10);
    }

    #[test]
    fn test_all_invalid_is_fatal() {
        fn always_fails(_: &Vec<f64>) -> Result<f64, BoxError> {
            Err("no".into())
        }
        let m = manager(config(), always_fails);
        let pop = m.initialize(&mut create_rng(1));
        let record = pop.record();
        assert!(record.all_invalid());
        assert_eq!(record.invalid_count, 11);
        assert!(record.mean_fitness.is_none());
        assert_eq!(
            m.advance(&pop).unwrap_err(),
            AdvanceError::Selection(SelectionError::NoValidIndividuals)
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let seq = manager(config(), neg_sq);
        let par = manager(config().with_parallel(true), neg_sq);
        let mut a = seq.initialize(&mut create_rng(9));
        let mut b = par.initialize(&mut create_rng(9));
        for _ in 0..5 {
            let (na, ra) = seq.advance(&a).unwrap();
            let (nb, rb) = par.advance(&b).unwrap();
            assert!(ra.same_outcome(&rb));
            let ga: Vec<_> = na.members().iter().map(|m| m.genotype().clone()).collect();
            let gb: Vec<_> = nb.members().iter().map(|m| m.genotype().clone()).collect();
            assert_eq!(ga, gb);
            a = na;
            b = nb;
        }
    }
}
