//! Traffic flow law: how many cars arrive on an entrance lane, where they
//! go, and how long until the next wave

use anyhow::{bail, ensure, Context, Result};
use std::collections::HashMap;

use super::random::SimRandom;
use super::types::{Car, LaneId, Side};

/// Selection weight of each movement out of an entrance lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnWeights {
    pub straight: u32,
    pub right: u32,
    pub left: u32,
}

impl Default for TurnWeights {
    fn default() -> Self {
        Self {
            straight: 2,
            right: 1,
            left: 1,
        }
    }
}

/// Parameters of a [`TrafficFlowLaw`]
#[derive(Debug, Clone, PartialEq)]
pub struct FlowLawConfig {
    /// Upper bound of cars in a single wave
    pub max_cars: u32,
    /// Expected cars per wave; `mean_cars / max_cars` is the binomial `p`
    pub mean_cars: f64,
    /// Arrival rate of the exponential inter-wave delay
    pub lambda: f64,
    pub min_delay: f64,
    pub max_delay: f64,
    pub min_crossing: f64,
    pub max_crossing: f64,
    pub turn_weights: TurnWeights,
}

impl Default for FlowLawConfig {
    fn default() -> Self {
        Self {
            max_cars: 12,
            mean_cars: 3.0,
            lambda: 1.0 / 80.0,
            min_delay: 20.0,
            max_delay: 240.0,
            min_crossing: 2.0,
            max_crossing: 5.0,
            turn_weights: TurnWeights::default(),
        }
    }
}

impl FlowLawConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_cars > 0, "max_cars must be positive");
        ensure!(
            (0.0..=f64::from(self.max_cars)).contains(&self.mean_cars),
            "mean_cars {} outside 0..={}",
            self.mean_cars,
            self.max_cars
        );
        ensure!(self.lambda > 0.0, "lambda must be positive, got {}", self.lambda);
        ensure!(
            self.min_delay >= 0.0 && self.min_delay <= self.max_delay,
            "invalid wave delay range {}..{}",
            self.min_delay,
            self.max_delay
        );
        ensure!(
            self.min_crossing > 0.0 && self.min_crossing <= self.max_crossing,
            "invalid crossing duration range {}..{}",
            self.min_crossing,
            self.max_crossing
        );
        Ok(())
    }
}

/// Per-lane arrival policy
///
/// A law may be shared by any number of entrance lanes. The legal-turn table
/// is installed once the lane topology is known, see
/// [`TrafficFlowLaw::set_topology`].
#[derive(Debug, Clone)]
pub struct TrafficFlowLaw {
    config: FlowLawConfig,
    p: f64,
    destinations: HashMap<LaneId, Vec<(u32, LaneId)>>,
}

impl TrafficFlowLaw {
    pub fn new(config: FlowLawConfig) -> Result<Self> {
        config.validate()?;
        let p = config.mean_cars / f64::from(config.max_cars);
        Ok(Self {
            config,
            p,
            destinations: HashMap::new(),
        })
    }

    pub fn config(&self) -> &FlowLawConfig {
        &self.config
    }

    /// Install the legal-turn table for every entrance lane
    ///
    /// `entrance_count` and `exit_count` give the number of lanes on each
    /// side. Fails if any entrance lane ends up with no reachable exit.
    pub fn set_topology(
        &mut self,
        entrance_count: impl Fn(Side) -> usize,
        exit_count: impl Fn(Side) -> usize,
    ) -> Result<()> {
        let weights = self.config.turn_weights;
        let mut destinations = HashMap::new();

        for side in Side::ALL {
            let lanes = entrance_count(side);
            for index in 0..lanes {
                let lane = LaneId::new(side, index);
                let mut table = Vec::new();
                let mut reach = |exit_side: Side, weight: u32| {
                    for exit_index in 0..exit_count(exit_side) {
                        table.push((weight, LaneId::new(exit_side, exit_index)));
                    }
                };

                reach(side.opposite(), weights.straight);
                // Index 0 is the curb lane, the last index the median lane
                if index == 0 {
                    reach(side.right_turn(), weights.right);
                }
                if index + 1 == lanes {
                    reach(side.left_turn(), weights.left);
                }
                table.retain(|(weight, _)| *weight > 0);

                if table.is_empty() {
                    bail!("entrance lane {} has no legal destination", lane);
                }
                destinations.insert(lane, table);
            }
        }

        self.destinations = destinations;
        Ok(())
    }

    /// Legal destinations of `lane` with their weights
    pub fn destinations(&self, lane: LaneId) -> Option<&[(u32, LaneId)]> {
        self.destinations.get(&lane).map(Vec::as_slice)
    }

    /// Delay until the next wave, a fresh clamped exponential sample
    pub fn wave_delay(&self, rng: &mut SimRandom) -> f64 {
        rng.exponential(self.config.lambda)
            .clamp(self.config.min_delay, self.config.max_delay)
    }

    pub fn crossing_duration(&self, rng: &mut SimRandom) -> f64 {
        rng.uniform(self.config.min_crossing, self.config.max_crossing)
    }

    /// A new wave of cars for `lane`
    pub fn cars_for(&self, lane: LaneId, rng: &mut SimRandom) -> Result<Vec<Car>> {
        let table = self
            .destinations
            .get(&lane)
            .with_context(|| format!("no legal-turn table for entrance lane {}", lane))?;

        let count = rng.binomial(self.config.max_cars, self.p);
        (0..count)
            .map(|_| {
                let destination = *rng.weighted_choice(table)?;
                Ok(Car::new(destination, self.crossing_duration(rng)))
            })
            .collect()
    }
}
