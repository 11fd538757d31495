//! Random source for the simulation
//!
//! A single [`SimRandom`] is owned by the intersection and passed by
//! reference to whatever needs to draw samples, so a seeded run is fully
//! reproducible.

use anyhow::{bail, Result};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Cumulative distribution of Binomial(n, p); entry `k` is P(X <= k)
type BinomialTable = Vec<f64>;

/// Seedable random source with a cache of binomial tables
pub struct SimRandom {
    rng: StdRng,
    binomial_tables: HashMap<(u32, OrderedFloat<f64>), BinomialTable>,
}

impl SimRandom {
    /// Seeded from OS entropy
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Deterministic random source for reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            binomial_tables: HashMap::new(),
        }
    }

    /// Uniform sample in [0, 1)
    pub fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform sample in [min, max]
    pub fn uniform(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    /// Exponentially distributed sample with the given rate
    pub fn exponential(&mut self, rate: f64) -> f64 {
        -(1.0 - self.unit()).ln() / rate
    }

    /// Binomial(n, p) sample by inverse-CDF lookup
    pub fn binomial(&mut self, n: u32, p: f64) -> u32 {
        let u = self.unit();
        let table = self
            .binomial_tables
            .entry((n, OrderedFloat(p)))
            .or_insert_with(|| binomial_table(n, p));

        // Smallest k whose cumulative mass exceeds u. Rounding can leave the
        // last entry a hair under 1.0, in which case k = n.
        let k = table.partition_point(|&cumulative| cumulative <= u);
        (k as u32).min(n)
    }

    /// Number of distinct (n, p) tables built so far
    pub fn cached_tables(&self) -> usize {
        self.binomial_tables.len()
    }

    /// Pick an item with probability proportional to its weight
    pub fn weighted_choice<'a, T>(&mut self, pairs: &'a [(u32, T)]) -> Result<&'a T> {
        if pairs.is_empty() {
            bail!("weighted choice over an empty list");
        }
        let total: u64 = pairs.iter().map(|(weight, _)| u64::from(*weight)).sum();
        if total == 0 {
            bail!("weighted choice with no positive weight");
        }

        let mut draw = self.rng.random_range(0..total);
        for (weight, item) in pairs {
            let weight = u64::from(*weight);
            if draw < weight {
                return Ok(item);
            }
            draw -= weight;
        }
        bail!("weighted choice draw fell outside every bucket")
    }
}

impl Default for SimRandom {
    fn default() -> Self {
        Self::new()
    }
}

fn binomial_table(n: u32, p: f64) -> BinomialTable {
    let mut table = Vec::with_capacity(n as usize + 1);
    let mut cumulative = 0.0;
    for k in 0..=n {
        cumulative += binomial_coefficient(n, k) * p.powi(k as i32) * (1.0 - p).powi((n - k) as i32);
        table.push(cumulative);
    }
    table
}

fn binomial_coefficient(n: u32, k: u32) -> f64 {
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * f64::from(n - i) / f64::from(i + 1))
}
