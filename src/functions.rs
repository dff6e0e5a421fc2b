//! Ready-made test and loss functions.
//!
//! The benchmark surfaces map the leading genes of a genotype (in space
//! order) to a scalar phenotype. They are classic minimization problems,
//! so pair them with [`Minimize`] to turn them into fitness.
//!
//! ```
//! use evo_optim::functions::{Booth, Minimize};
//! use evo_optim::{Evolution, EvolutionConfig, GeneSpec};
//!
//! let genes = vec![
//!     GeneSpec::continuous("x", -10.0, 10.0),
//!     GeneSpec::continuous("y", -10.0, 10.0),
//! ];
//! let config = EvolutionConfig::fast().with_seed(1);
//! let result = Evolution::from_genes(genes, Booth, Minimize, config).unwrap().run();
//! assert!(result.best_fitness().unwrap() <= 0.0);
//! ```

use crate::error::BoxError;
use crate::space::Genotype;
use crate::types::{LossFunction, TestFunction};
use std::f64::consts::PI;

fn leading<const N: usize>(g: &Genotype, name: &str) -> Result<[f64; N], BoxError> {
    g.values()
        .get(..N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| format!("{name} needs at least {N} genes, got {}", g.len()).into())
}

/// Phenotype is the gene values themselves, in space order. Pairs with the
/// vector forms of [`Mse`] and [`L1`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl TestFunction for Identity {
    type Phenotype = Vec<f64>;

    fn express(&self, genotype: &Genotype) -> Result<Vec<f64>, BoxError> {
        Ok(genotype.values().to_vec())
    }
}

/// `Σ xᵢ²`, minimum 0 at the origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sphere;

impl TestFunction for Sphere {
    type Phenotype = f64;

    fn express(&self, g: &Genotype) -> Result<f64, BoxError> {
        Ok(g.values().iter().map(|x| x * x).sum())
    }
}

/// Booth: `(x + 2y - 7)² + (2x + y - 5)²`, minimum 0 at `(1, 3)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Booth;

impl TestFunction for Booth {
    type Phenotype = f64;

    fn express(&self, g: &Genotype) -> Result<f64, BoxError> {
        let [x, y] = leading::<2>(g, "booth")?;
        Ok((x + 2.0 * y - 7.0).powi(2) + (2.0 * x + y - 5.0).powi(2))
    }
}

/// Easom: `-cos x · cos y · exp(-((x-π)² + (y-π)²))`, minimum -1 at `(π, π)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Easom;

impl TestFunction for Easom {
    type Phenotype = f64;

    fn express(&self, g: &Genotype) -> Result<f64, BoxError> {
        let [x, y] = leading::<2>(g, "easom")?;
        Ok(-x.cos() * y.cos() * (-((x - PI).powi(2) + (y - PI).powi(2))).exp())
    }
}

/// Bukin N.6: `100·√|y - 0.01x²| + 0.01·|x + 10|`, minimum 0 at `(-10, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bukin;

impl TestFunction for Bukin {
    type Phenotype = f64;

    fn express(&self, g: &Genotype) -> Result<f64, BoxError> {
        let [x, y] = leading::<2>(g, "bukin")?;
        Ok(100.0 * (y - 0.01 * x * x).abs().sqrt() + 0.01 * (x + 10.0).abs())
    }
}

/// Goldstein–Price, minimum 3 at `(0, -1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoldsteinPrice;

impl TestFunction for GoldsteinPrice {
    type Phenotype = f64;

    fn express(&self, g: &Genotype) -> Result<f64, BoxError> {
        let [x, y] = leading::<2>(g, "goldstein-price")?;
        let a = 1.0
            + (x + y + 1.0).powi(2)
                * (19.0 - 14.0 * x + 3.0 * x * x - 14.0 * y + 6.0 * x * y + 3.0 * y * y);
        let b = 30.0
            + (2.0 * x - 3.0 * y).powi(2)
                * (18.0 - 32.0 * x + 12.0 * x * x + 48.0 * y - 36.0 * x * y + 27.0 * y * y);
        Ok(a * b)
    }
}

/// Rosenbrock over all genes: `Σ (1 - xᵢ)² + 100 (xᵢ₊₁ - xᵢ²)²`,
/// minimum 0 at `(1, …, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rosenbrock;

impl TestFunction for Rosenbrock {
    type Phenotype = f64;

    fn express(&self, g: &Genotype) -> Result<f64, BoxError> {
        leading::<2>(g, "rosenbrock")?;
        Ok(g.values()
            .windows(2)
            .map(|w| (1.0 - w[0]).powi(2) + 100.0 * (w[1] - w[0] * w[0]).powi(2))
            .sum())
    }
}

/// Fitness for minimization problems: `-x`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Minimize;

impl LossFunction<f64> for Minimize {
    fn score(&self, phenotype: &f64) -> Result<f64, BoxError> {
        Ok(-phenotype)
    }
}

/// Fitness for maximization problems: `x`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Maximize;

impl LossFunction<f64> for Maximize {
    fn score(&self, phenotype: &f64) -> Result<f64, BoxError> {
        Ok(*phenotype)
    }
}

/// Negated squared error against a target: `-(x - target)²`.
#[derive(Debug, Clone, Copy)]
pub struct Mse {
    pub target: f64,
}

impl LossFunction<f64> for Mse {
    fn score(&self, phenotype: &f64) -> Result<f64, BoxError> {
        Ok(-(phenotype - self.target).powi(2))
    }
}

/// Negated absolute error against a target: `-|x - target|`.
#[derive(Debug, Clone, Copy)]
pub struct L1 {
    pub target: f64,
}

impl LossFunction<f64> for L1 {
    fn score(&self, phenotype: &f64) -> Result<f64, BoxError> {
        Ok(-(phenotype - self.target).abs())
    }
}

/// Mean of `err` over every component, negated.
fn mean_error(values: &[f64], name: &str, err: impl Fn(f64) -> f64) -> Result<f64, BoxError> {
    if values.is_empty() {
        return Err(format!("{name} needs at least one value").into());
    }
    Ok(-values.iter().map(|&v| err(v)).sum::<f64>() / values.len() as f64)
}

impl LossFunction<Vec<f64>> for Mse {
    fn score(&self, phenotype: &Vec<f64>) -> Result<f64, BoxError> {
        mean_error(phenotype, "mse", |v| (v - self.target).powi(2))
    }
}

impl LossFunction<Vec<f64>> for L1 {
    fn score(&self, phenotype: &Vec<f64>) -> Result<f64, BoxError> {
        mean_error(phenotype, "l1", |v| (v - self.target).abs())
    }
}
