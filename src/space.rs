//! Genotype space: gene declarations, sampling and clamping.
//!
//! A [`GenotypeSpace`] is an ordered list of [`GeneSpec`]s. Declaration
//! order is the gene order used by every [`Genotype`], operator and
//! report in the crate.

use crate::error::SpaceError;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// How a gene's value is drawn and kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeneKind {
    /// Any real value in `[min, max]`.
    Continuous,
    /// Whole numbers in `[min, max]`, stored as `f64`.
    Integer,
}

/// Declaration of one gene.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneSpec {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub kind: GeneKind,
}

impl GeneSpec {
    /// A real-valued gene bounded by `[min, max]`.
    pub fn continuous(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            kind: GeneKind::Continuous,
        }
    }

    /// An integer gene bounded by `[min, max]`.
    pub fn integer(name: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            min: min as f64,
            max: max as f64,
            kind: GeneKind::Integer,
        }
    }

    /// Width of the admissible interval.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Draws one value uniformly from the gene's domain.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match self.kind {
            GeneKind::Continuous => {
                if self.min == self.max {
                    self.min
                } else {
                    rng.random_range(self.min..=self.max)
                }
            }
            GeneKind::Integer => {
                let (lo, hi) = self.integer_bounds();
                rng.random_range(lo..=hi) as f64
            }
        }
    }

    /// Maps any value into the gene's domain.
    ///
    /// Integer genes are rounded to the nearest whole number first. NaN maps
    /// to the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return match self.kind {
                GeneKind::Continuous => self.min,
                GeneKind::Integer => self.integer_bounds().0 as f64,
            };
        }
        match self.kind {
            GeneKind::Continuous => value.clamp(self.min, self.max),
            GeneKind::Integer => {
                let (lo, hi) = self.integer_bounds();
                value.round().clamp(lo as f64, hi as f64)
            }
        }
    }

    /// Returns `true` if `value` already satisfies bounds and kind.
    pub fn contains(&self, value: f64) -> bool {
        let in_bounds = value >= self.min && value <= self.max;
        match self.kind {
            GeneKind::Continuous => in_bounds,
            GeneKind::Integer => in_bounds && value.fract() == 0.0,
        }
    }

    fn integer_bounds(&self) -> (i64, i64) {
        (self.min.ceil() as i64, self.max.floor() as i64)
    }

    fn validate(&self) -> Result<(), SpaceError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(SpaceError::NonFiniteBounds(self.name.clone()));
        }
        if !self.span().is_finite() {
            return Err(SpaceError::RangeTooWide(self.name.clone()));
        }
        if self.min > self.max {
            return Err(SpaceError::InvalidBounds {
                name: self.name.clone(),
                min: self.min,
                max: self.max,
            });
        }
        if self.kind == GeneKind::Integer && self.min.ceil() > self.max.floor() {
            return Err(SpaceError::NoIntegerInRange(self.name.clone()));
        }
        Ok(())
    }
}

/// Ordered, validated set of gene declarations.
///
/// # Examples
///
/// ```
/// use evo_optim::{GeneSpec, GenotypeSpace};
///
/// let space = GenotypeSpace::new(vec![
///     GeneSpec::continuous("learning_rate", 1e-4, 1e-1),
///     GeneSpec::integer("max_depth", 2, 12),
/// ])
/// .unwrap();
/// assert_eq!(space.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct GenotypeSpace {
    genes: Vec<GeneSpec>,
    names: Arc<[String]>,
}

impl GenotypeSpace {
    /// Validates and builds a space. Names must be unique and the list
    /// non-empty.
    pub fn new(genes: Vec<GeneSpec>) -> Result<Self, SpaceError> {
        if genes.is_empty() {
            return Err(SpaceError::Empty);
        }
        for (i, gene) in genes.iter().enumerate() {
            gene.validate()?;
            if genes[..i].iter().any(|g| g.name == gene.name) {
                return Err(SpaceError::DuplicateGene(gene.name.clone()));
            }
        }
        let names: Arc<[String]> = genes.iter().map(|g| g.name.clone()).collect();
        Ok(Self { genes, names })
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Always `false`; an empty space cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn genes(&self) -> &[GeneSpec] {
        &self.genes
    }

    pub fn gene(&self, name: &str) -> Option<&GeneSpec> {
        self.genes.iter().find(|g| g.name == name)
    }

    /// Draws a genotype with every gene sampled independently.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Genotype {
        let values = self.genes.iter().map(|g| g.sample(rng)).collect();
        self.wrap(values)
    }

    /// Clips every gene of `genotype` into its bounds.
    pub fn clamp(&self, genotype: Genotype) -> Genotype {
        let values = self
            .genes
            .iter()
            .zip(genotype.values)
            .map(|(g, v)| g.clamp(v))
            .collect();
        self.wrap(values)
    }

    /// Builds a genotype from raw values in gene order, clamping each.
    ///
    /// Returns `None` if the number of values does not match the space.
    pub fn genotype(&self, values: impl Into<Vec<f64>>) -> Option<Genotype> {
        let values = values.into();
        if values.len() != self.genes.len() {
            return None;
        }
        Some(self.clamp(self.wrap(values)))
    }

    /// Returns `true` if `genotype` belongs to this space and every value is
    /// admissible.
    pub fn contains(&self, genotype: &Genotype) -> bool {
        genotype.names == self.names
            && self
                .genes
                .iter()
                .zip(&genotype.values)
                .all(|(g, &v)| g.contains(v))
    }

    pub(crate) fn wrap(&self, values: Vec<f64>) -> Genotype {
        debug_assert_eq!(values.len(), self.genes.len());
        Genotype {
            names: Arc::clone(&self.names),
            values,
        }
    }
}

/// Gene values keyed by the names of their space, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Genotype {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl Genotype {
    /// Value of the gene called `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    /// Values in gene order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates `(name, value)` pairs in gene order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub(crate) fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "     {name} : {value}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Genotype {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;
    use proptest::prelude::*;

    fn space() -> GenotypeSpace {
        GenotypeSpace::new(vec![
            GeneSpec::continuous("x", -5.0, 5.0),
            GeneSpec::integer("depth", 1, 8),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(GenotypeSpace::new(vec![]).unwrap_err(), SpaceError::Empty);
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = GenotypeSpace::new(vec![
            GeneSpec::continuous("x", 0.0, 1.0),
            GeneSpec::continuous("x", 0.0, 2.0),
        ])
        .unwrap_err();
        assert_eq!(err, SpaceError::DuplicateGene("x".into()));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let err = GenotypeSpace::new(vec![GeneSpec::continuous("x", 1.0, 0.0)]).unwrap_err();
        assert!(matches!(err, SpaceError::InvalidBounds { .. }));
    }

    #[test]
    fn test_rejects_integer_gene_without_integers() {
        let gene = GeneSpec {
            name: "k".into(),
            min: 0.2,
            max: 0.8,
            kind: GeneKind::Integer,
        };
        let err = GenotypeSpace::new(vec![gene]).unwrap_err();
        assert_eq!(err, SpaceError::NoIntegerInRange("k".into()));
    }

    #[test]
    fn test_rejects_infinite_bounds() {
        let err =
            GenotypeSpace::new(vec![GeneSpec::continuous("x", 0.0, f64::INFINITY)]).unwrap_err();
        assert_eq!(err, SpaceError::NonFiniteBounds("x".into()));
    }

    #[test]
    fn test_rejects_overflowing_range() {
        let err = GenotypeSpace::new(vec![GeneSpec::continuous("x", -1e308, 1e308)]).unwrap_err();
        assert_eq!(err, SpaceError::RangeTooWide("x".into()));

        // Wide but representable ranges still sample.
        let space = GenotypeSpace::new(vec![GeneSpec::continuous("x", -1e307, 1e307)]).unwrap();
        let mut rng = create_rng(3);
        for _ in 0..100 {
            assert!(space.contains(&space.sample(&mut rng)));
        }
    }

    #[test]
    fn test_degenerate_gene_samples_exact_value() {
        let space = GenotypeSpace::new(vec![GeneSpec::continuous("c", 3.25, 3.25)]).unwrap();
        let mut rng = create_rng(7);
        for _ in 0..100 {
            assert_eq!(space.sample(&mut rng).values(), &[3.25]);
        }

        let space = GenotypeSpace::new(vec![GeneSpec::integer("n", 4, 4)]).unwrap();
        for _ in 0..100 {
            assert_eq!(space.sample(&mut rng).values(), &[4.0]);
        }
    }

    #[test]
    fn test_integer_sampling_covers_range() {
        let space = GenotypeSpace::new(vec![GeneSpec::integer("n", 1, 4)]).unwrap();
        let mut rng = create_rng(42);
        let mut seen = [false; 4];
        for _ in 0..1000 {
            let v = space.sample(&mut rng).values()[0];
            assert_eq!(v.fract(), 0.0);
            seen[v as usize - 1] = true;
        }
        assert!(seen.iter().all(|&s| s), "expected every integer, got {seen:?}");
    }

    #[test]
    fn test_clamp_rounds_integers() {
        let space = space();
        let g = space.genotype(vec![7.5, 3.6]).unwrap();
        assert_eq!(g.values(), &[5.0, 4.0]);
        let g = space.genotype(vec![-9.0, -2.0]).unwrap();
        assert_eq!(g.values(), &[-5.0, 1.0]);
    }

    #[test]
    fn test_clamp_nan_goes_to_lower_bound() {
        let space = space();
        let g = space.genotype(vec![f64::NAN, f64::NAN]).unwrap();
        assert_eq!(g.values(), &[-5.0, 1.0]);
    }

    #[test]
    fn test_genotype_length_mismatch() {
        assert!(space().genotype(vec![1.0]).is_none());
    }

    #[test]
    fn test_lookup_and_display() {
        let g = space().genotype(vec![1.5, 2.0]).unwrap();
        assert_eq!(g.get("x"), Some(1.5));
        assert_eq!(g.get("depth"), Some(2.0));
        assert_eq!(g.get("missing"), None);
        assert_eq!(g.to_string(), "     x : 1.5\n     depth : 2\n");
    }

    #[test]
    fn test_contains_checks_space_identity() {
        let a = space();
        let b = space();
        let g = a.genotype(vec![0.0, 2.0]).unwrap();
        assert!(a.contains(&g));
        // Same declaration, equal names: still compatible.
        assert!(b.contains(&g));

        let other = GenotypeSpace::new(vec![
            GeneSpec::continuous("y", -5.0, 5.0),
            GeneSpec::integer("depth", 1, 8),
        ])
        .unwrap();
        assert!(!other.contains(&g));
    }

    proptest! {
        #[test]
        fn prop_clamp_is_idempotent(x in proptest::num::f64::ANY, d in proptest::num::f64::ANY) {
            let space = space();
            let once = space.genotype(vec![x, d]).unwrap();
            let twice = space.clamp(once.clone());
            prop_assert_eq!(&once, &twice);
            prop_assert!(space.contains(&once));
        }

        #[test]
        fn prop_samples_are_in_bounds(seed in any::<u64>()) {
            let space = space();
            let mut rng = create_rng(seed);
            let g = space.sample(&mut rng);
            prop_assert!(space.contains(&g));
        }
    }
}
