//! Parent selection.
//!
//! Selection turns the scores of an evaluated population into a
//! [`Selector`] that can draw parent indices. All strategies **maximize**
//! and keep a non-zero chance for every individual, including invalid
//! ones, so no sub-population is ever eliminated outright.
//!
//! # References
//!
//! - Goldberg & Deb (1991), "A Comparative Analysis of Selection Schemes
//!   Used in Genetic Algorithms"
//! - Baker (1985), "Adaptive Selection Methods for Genetic Algorithms"

use crate::error::SelectionError;
use rand::Rng;

/// Relative weight of an invalid individual, as a fraction of the weight
/// given to the worst valid individual.
const INVALID_WEIGHT_RATIO: f64 = 0.5;

/// Selection strategy for choosing parents.
///
/// # Examples
///
/// ```
/// use evo_optim::Selection;
/// use evo_optim::random::create_rng;
///
/// let scores = [Some(1.0), Some(5.0), None, Some(3.0)];
/// let selector = Selection::Rank.prepare(&scores).unwrap();
/// let mut rng = create_rng(42);
/// let parent = selector.pick(&mut rng);
/// assert!(parent < scores.len());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Selection {
    /// Fitness-proportionate (roulette wheel) selection.
    ///
    /// Scores are shifted so the worst valid individual keeps a small
    /// positive weight; invalid individuals get half of that.
    #[default]
    Roulette,

    /// Linear rank selection.
    ///
    /// Valid individuals are ranked worst to best (ties keep population
    /// order) and weighted `1..=v`; invalid ones get the lowest weight.
    /// Insensitive to the scale of the scores.
    Rank,

    /// Tournament selection: draw `k` contestants uniformly with
    /// replacement, keep the fittest. Ties go to the earlier index.
    Tournament(usize),
}

impl Selection {
    /// Builds a selector for one generation.
    ///
    /// `scores[i]` is the fitness of individual `i`, `None` when invalid.
    ///
    /// # Errors
    ///
    /// [`SelectionError::NoValidIndividuals`] if every score is `None`;
    /// [`SelectionError::EmptyPopulation`] if `scores` is empty.
    pub fn prepare(&self, scores: &[Option<f64>]) -> Result<Selector, SelectionError> {
        if scores.is_empty() {
            return Err(SelectionError::EmptyPopulation);
        }
        if scores.iter().all(Option::is_none) {
            return Err(SelectionError::NoValidIndividuals);
        }

        let inner = match *self {
            Selection::Roulette => weighted(roulette_weights(scores)),
            Selection::Rank => weighted(rank_weights(scores)),
            Selection::Tournament(k) => Inner::Tournament {
                size: k.max(1),
                scores: scores.to_vec(),
            },
        };
        Ok(Selector { inner })
    }
}

/// Parent sampler for one generation. Read-only, so it can be shared
/// across worker threads.
#[derive(Debug, Clone)]
pub struct Selector {
    inner: Inner,
}

#[derive(Debug, Clone)]
enum Inner {
    Weighted { cumulative: Vec<f64>, total: f64 },
    Tournament { size: usize, scores: Vec<Option<f64>> },
}

impl Selector {
    /// Draws one parent index.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> usize {
        match &self.inner {
            Inner::Weighted { cumulative, total } => {
                let threshold = rng.random_range(0.0..*total);
                cumulative
                    .partition_point(|&c| c <= threshold)
                    .min(cumulative.len() - 1)
            }
            Inner::Tournament { size, scores } => {
                let n = scores.len();
                let mut best = rng.random_range(0..n);
                for _ in 1..*size {
                    let idx = rng.random_range(0..n);
                    if beats(scores[idx], idx, scores[best], best) {
                        best = idx;
                    }
                }
                best
            }
        }
    }

    /// Selection probability of every individual. Tournament probabilities
    /// are not closed-form and are reported as `None`.
    pub fn probabilities(&self) -> Option<Vec<f64>> {
        match &self.inner {
            Inner::Weighted { cumulative, total } => {
                let mut prev = 0.0;
                Some(
                    cumulative
                        .iter()
                        .map(|&c| {
                            let p = (c - prev) / total;
                            prev = c;
                            p
                        })
                        .collect(),
                )
            }
            Inner::Tournament { .. } => None,
        }
    }
}

/// `true` if contestant `a` (at index `ia`) wins against `b` (at `ib`).
fn beats(a: Option<f64>, ia: usize, b: Option<f64>, ib: usize) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x > y || (x == y && ia < ib),
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => ia < ib,
    }
}

fn weighted(weights: Vec<f64>) -> Inner {
    let mut total = 0.0;
    let cumulative = weights
        .iter()
        .map(|w| {
            total += w;
            total
        })
        .collect();
    Inner::Weighted { cumulative, total }
}

/// weight_i = (s_i - s_min) / spread + 0.01, or 1 when every valid score
/// is equal. Scores are halved before differencing so that the spread of
/// any two finite values stays finite.
fn roulette_weights(scores: &[Option<f64>]) -> Vec<f64> {
    const FLOOR: f64 = 0.01;

    let valid = scores.iter().flatten();
    let min = valid.clone().copied().fold(f64::INFINITY, f64::min);
    let max = valid.copied().fold(f64::NEG_INFINITY, f64::max);
    let half_spread = max * 0.5 - min * 0.5;

    scores
        .iter()
        .map(|s| match s {
            Some(v) if half_spread > 0.0 => (v * 0.5 - min * 0.5) / half_spread + FLOOR,
            Some(_) => 1.0,
            None if half_spread > 0.0 => FLOOR * INVALID_WEIGHT_RATIO,
            None => INVALID_WEIGHT_RATIO,
        })
        .collect()
}

fn rank_weights(scores: &[Option<f64>]) -> Vec<f64> {
    let mut order: Vec<(usize, f64)> = scores
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.map(|v| (i, v)))
        .collect();
    // Stable: equal scores keep population order.
    order.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut weights = vec![INVALID_WEIGHT_RATIO; scores.len()];
    for (rank, &(idx, _)) in order.iter().enumerate() {
        weights[idx] = (rank + 1) as f64;
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;

    fn counts(selection: Selection, scores: &[Option<f64>], draws: usize) -> Vec<u32> {
        let selector = selection.prepare(scores).unwrap();
        let mut rng = create_rng(42);
        let mut counts = vec![0u32; scores.len()];
        for _ in 0..draws {
            counts[selector.pick(&mut rng)] += 1;
        }
        counts
    }

    #[test]
    fn test_roulette_favors_best() {
        let scores = [Some(-100.0), Some(-50.0), Some(-1.0), Some(-80.0)];
        let c = counts(Selection::Roulette, &scores, 10_000);
        assert!(
            c[2] > c[1] && c[1] > c[0],
            "expected higher scores to be picked more: {c:?}"
        );
    }

    #[test]
    fn test_rank_favors_best() {
        let scores = [Some(1.0), Some(50.0), Some(1000.0), Some(80.0)];
        let c = counts(Selection::Rank, &scores, 10_000);
        assert!(c[2] > c[0], "best={}, worst={}", c[2], c[0]);
    }

    #[test]
    fn test_tournament_favors_best() {
        let scores = [Some(10.0), Some(5.0), Some(1.0), Some(8.0)];
        let c = counts(Selection::Tournament(4), &scores, 10_000);
        assert!(c[0] > 6000, "expected best to dominate, got {c:?}");
    }

    #[test]
    fn test_tournament_size_one_is_uniform() {
        let scores = [Some(10.0), Some(5.0), Some(1.0), Some(8.0)];
        let c = counts(Selection::Tournament(1), &scores, 10_000);
        for &n in &c {
            assert!(n > 1500, "expected uniform, got {c:?}");
        }
    }

    #[test]
    fn test_invalid_keeps_nonzero_weight() {
        let scores = [Some(1.0), None, Some(2.0)];
        for selection in [Selection::Roulette, Selection::Rank] {
            let p = selection.prepare(&scores).unwrap().probabilities().unwrap();
            assert!(p[1] > 0.0, "{selection:?}: invalid must stay selectable");
            assert!(p[1] < p[0], "{selection:?}: invalid must be least likely");
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_roulette_handles_extreme_scores() {
        let scores = [Some(-1e308), Some(1e308), None];
        let selector = Selection::Roulette.prepare(&scores).unwrap();
        let p = selector.probabilities().unwrap();
        assert!(p.iter().all(|pi| pi.is_finite() && *pi > 0.0), "got {p:?}");
        assert!(p[1] > p[0] && p[0] > p[2], "got {p:?}");

        let mut rng = create_rng(1);
        for _ in 0..100 {
            assert!(selector.pick(&mut rng) < scores.len());
        }
    }

    #[test]
    fn test_equal_scores_are_uniform_under_roulette() {
        let scores = [Some(5.0); 4];
        let p = Selection::Roulette
            .prepare(&scores)
            .unwrap()
            .probabilities()
            .unwrap();
        for &pi in &p {
            assert!((pi - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rank_ties_follow_population_order() {
        let scores = [Some(3.0), Some(3.0), Some(1.0)];
        let p = Selection::Rank
            .prepare(&scores)
            .unwrap()
            .probabilities()
            .unwrap();
        assert!(p[1] > p[0] && p[0] > p[2], "got {p:?}");
    }

    #[test]
    fn test_tournament_tie_goes_to_earlier_index() {
        assert!(beats(Some(1.0), 0, Some(1.0), 3));
        assert!(!beats(Some(1.0), 3, Some(1.0), 0));
        assert!(beats(Some(-9.0), 5, None, 0));
    }

    #[test]
    fn test_single_individual() {
        let scores = [Some(5.0)];
        let mut rng = create_rng(42);
        for selection in [Selection::Roulette, Selection::Rank, Selection::Tournament(3)] {
            assert_eq!(selection.prepare(&scores).unwrap().pick(&mut rng), 0);
        }
    }

    #[test]
    fn test_all_invalid_is_fatal() {
        let scores = [None, None, None];
        for selection in [Selection::Roulette, Selection::Rank, Selection::Tournament(2)] {
            assert_eq!(
                selection.prepare(&scores).unwrap_err(),
                SelectionError::NoValidIndividuals
            );
        }
    }

    #[test]
    fn test_empty_population() {
        assert_eq!(
            Selection::Rank.prepare(&[]).unwrap_err(),
            SelectionError::EmptyPopulation
        );
    }
}
