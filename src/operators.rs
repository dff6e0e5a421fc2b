//! Variation operators over bounded real/integer genotypes.
//!
//! # Crossover
//!
//! - [`Crossover::Blend`]: arithmetic blend with a fresh `α ∈ [0, 1]` per gene
//! - [`Crossover::SinglePoint`]: exchange the tail after a cut point
//! - [`Crossover::Uniform`]: exchange each gene with probability 1/2
//!
//! # Mutation
//!
//! - [`GaussianMutation`]: per-gene Gaussian noise scaled to the gene's range
//!
//! Every output is passed through [`GenotypeSpace::clamp`], so operators
//! never leave the space and never change the gene set.
//!
//! # References
//!
//! - Michalewicz (1996), *Genetic Algorithms + Data Structures = Evolution Programs*
//! - Syswerda (1989), "Uniform Crossover in Genetic Algorithms"

use crate::space::{GeneKind, Genotype, GenotypeSpace};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Recombination scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Crossover {
    /// `c1 = a·α + b·(1-α)`, `c2 = b·α + a·(1-α)` with fresh `α` per gene.
    #[default]
    Blend,

    /// Cut at a point in `1..len` and swap the tails. The whole genotype is
    /// never swapped; single-gene genotypes are copied unchanged.
    SinglePoint,

    /// Swap each gene independently with probability 1/2.
    Uniform,
}

impl Crossover {
    /// Recombines two parents into two children.
    ///
    /// One draw decides whether recombination happens at all (probability
    /// `rate`); otherwise the children are copies of the parents.
    pub fn apply<R: Rng>(
        &self,
        space: &GenotypeSpace,
        a: &Genotype,
        b: &Genotype,
        rate: f64,
        rng: &mut R,
    ) -> (Genotype, Genotype) {
        if rng.random::<f64>() >= rate {
            return (a.clone(), b.clone());
        }

        let (xa, xb) = (a.values(), b.values());
        let n = xa.len();
        let mut c1 = Vec::with_capacity(n);
        let mut c2 = Vec::with_capacity(n);

        match self {
            Crossover::Blend => {
                for (&va, &vb) in xa.iter().zip(xb) {
                    let alpha: f64 = rng.random();
                    c1.push(va * alpha + vb * (1.0 - alpha));
                    c2.push(vb * alpha + va * (1.0 - alpha));
                }
            }
            Crossover::SinglePoint => {
                if n < 2 {
                    return (a.clone(), b.clone());
                }
                let point = rng.random_range(1..n);
                c1.extend_from_slice(&xa[..point]);
                c1.extend_from_slice(&xb[point..]);
                c2.extend_from_slice(&xb[..point]);
                c2.extend_from_slice(&xa[point..]);
            }
            Crossover::Uniform => {
                for (&va, &vb) in xa.iter().zip(xb) {
                    if rng.random_bool(0.5) {
                        c1.push(vb);
                        c2.push(va);
                    } else {
                        c1.push(va);
                        c2.push(vb);
                    }
                }
            }
        }

        (
            space.clamp(space.wrap(c1)),
            space.clamp(space.wrap(c2)),
        )
    }
}

/// Independent per-gene Gaussian perturbation.
///
/// Each gene is perturbed with probability `rate` by `N(0, σ²)` where
/// `σ = scale · (max - min)`. Integer genes use `σ ≥ 1` (when `scale > 0`)
/// so that a mutation can actually move them after rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianMutation {
    pub rate: f64,
    pub scale: f64,
}

impl GaussianMutation {
    pub fn new(rate: f64, scale: f64) -> Self {
        Self { rate, scale }
    }

    /// Returns a mutated, clamped copy of `genotype`.
    pub fn apply<R: Rng>(&self, space: &GenotypeSpace, genotype: Genotype, rng: &mut R) -> Genotype {
        let mut values = genotype.into_values();
        for (value, gene) in values.iter_mut().zip(space.genes()) {
            if rng.random::<f64>() >= self.rate {
                continue;
            }
            let mut sigma = self.scale * gene.span();
            if gene.kind == GeneKind::Integer && self.scale > 0.0 {
                sigma = sigma.max(1.0);
            }
            if sigma > 0.0 {
                if let Ok(noise) = Normal::new(0.0, sigma) {
                    *value += noise.sample(rng);
                }
            }
        }
        space.clamp(space.wrap(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;
    use crate::space::GeneSpec;

    fn space() -> GenotypeSpace {
        GenotypeSpace::new(vec![
            GeneSpec::continuous("a", -5.0, 5.0),
            GeneSpec::continuous("b", -5.0, 5.0),
            GeneSpec::integer("c", 0, 10),
            GeneSpec::continuous("d", 0.0, 1.0),
        ])
        .unwrap()
    }

    fn parents(space: &GenotypeSpace) -> (Genotype, Genotype) {
        (
            space.genotype(vec![-5.0, -5.0, 0.0, 0.0]).unwrap(),
            space.genotype(vec![5.0, 5.0, 10.0, 1.0]).unwrap(),
        )
    }

    #[test]
    fn test_rate_zero_copies_parents() {
        let space = space();
        let (a, b) = parents(&space);
        let mut rng = create_rng(42);
        for op in [Crossover::Blend, Crossover::SinglePoint, Crossover::Uniform] {
            let (c1, c2) = op.apply(&space, &a, &b, 0.0, &mut rng);
            assert_eq!(c1, a);
            assert_eq!(c2, b);
        }
    }

    #[test]
    fn test_blend_children_lie_between_parents() {
        let space = space();
        let (a, b) = parents(&space);
        let mut rng = create_rng(7);
        for _ in 0..200 {
            let (c1, c2) = Crossover::Blend.apply(&space, &a, &b, 1.0, &mut rng);
            for child in [&c1, &c2] {
                assert!(space.contains(child));
                for ((&v, &lo), &hi) in child.values().iter().zip(a.values()).zip(b.values()) {
                    assert!(v >= lo && v <= hi, "{v} outside [{lo}, {hi}]");
                }
            }
            // Blend is symmetric: the two children mirror around the midpoint.
            for ((&x, &y), (&p, &q)) in c1
                .values()
                .iter()
                .zip(c2.values())
                .zip(a.values().iter().zip(b.values()))
                .take(2)
            {
                assert!((x + y - (p + q)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_single_point_swaps_tails() {
        let space = space();
        let (a, b) = parents(&space);
        let mut rng = create_rng(3);
        for _ in 0..100 {
            let (c1, c2) = Crossover::SinglePoint.apply(&space, &a, &b, 1.0, &mut rng);
            let point = c1
                .values()
                .iter()
                .zip(a.values())
                .position(|(x, y)| x != y)
                .expect("a cut in 1..len always changes the tail");
            assert!(point >= 1, "whole genotype must never be swapped");
            assert_eq!(&c1.values()[..point], &a.values()[..point]);
            assert_eq!(&c1.values()[point..], &b.values()[point..]);
            assert_eq!(&c2.values()[point..], &a.values()[point..]);
        }
    }

    #[test]
    fn test_single_point_single_gene_copies() {
        let space = GenotypeSpace::new(vec![GeneSpec::continuous("x", 0.0, 1.0)]).unwrap();
        let a = space.genotype(vec![0.1]).unwrap();
        let b = space.genotype(vec![0.9]).unwrap();
        let (c1, c2) = Crossover::SinglePoint.apply(&space, &a, &b, 1.0, &mut create_rng(1));
        assert_eq!((c1, c2), (a, b));
    }

    #[test]
    fn test_uniform_conserves_genes() {
        let space = space();
        let (a, b) = parents(&space);
        let mut rng = create_rng(11);
        let (c1, c2) = Crossover::Uniform.apply(&space, &a, &b, 1.0, &mut rng);
        for i in 0..a.len() {
            let mut got = [c1.values()[i], c2.values()[i]];
            got.sort_by(f64::total_cmp);
            assert_eq!(got, [a.values()[i], b.values()[i]]);
        }
    }

    #[test]
    fn test_mutation_rate_zero_is_identity() {
        let space = space();
        let (a, _) = parents(&space);
        let m = GaussianMutation::new(0.0, 0.5);
        let out = m.apply(&space, a.clone(), &mut create_rng(5));
        assert_eq!(out, a);
    }

    #[test]
    fn test_mutation_stays_in_bounds_and_keeps_names() {
        let space = space();
        let (a, _) = parents(&space);
        let m = GaussianMutation::new(1.0, 2.0);
        let mut rng = create_rng(9);
        let mut g = a;
        for _ in 0..200 {
            g = m.apply(&space, g, &mut rng);
            assert!(space.contains(&g));
            assert_eq!(g.names(), space.genotype(vec![0.0; 4]).unwrap().names());
        }
    }

    #[test]
    fn test_mutation_moves_integer_genes() {
        let space = space();
        let start = space.genotype(vec![0.0, 0.0, 5.0, 0.5]).unwrap();
        let m = GaussianMutation::new(1.0, 0.01);
        let mut rng = create_rng(21);
        let moved = (0..100)
            .map(|_| m.apply(&space, start.clone(), &mut rng))
            .filter(|g| g.get("c") != Some(5.0))
            .count();
        assert!(moved > 20, "integer gene barely moved: {moved}/100");
    }
}
