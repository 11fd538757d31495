//! Adaptive traffic light
//!
//! Runs the same two-phase cycle as [`FixedCycleLight`] but periodically
//! re-splits the cycle between horizontal and vertical green according to
//! the queueing recorded in its wait history. Re-tuning happens on a much
//! slower timescale than phase switching.

use anyhow::{ensure, Context, Result};
use log::info;

use super::events::Event;
use super::light::{FixedCycleLight, LightConfig, TrafficLight, WaitHistory};
use super::types::{LightMapping, Phase, QueuePressure};

/// Parameters of an [`AdaptiveTrafficLight`]
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveConfig {
    /// Total of horizontal and vertical green
    pub cycle: f64,
    pub min_green: f64,
    /// Seconds between two wait samples
    pub averaging_interval: f64,
    pub history_capacity: usize,
    /// Seconds between re-tunings when traffic is balanced
    pub optimize_interval: f64,
    /// Seconds between re-tunings after a saturated split
    pub saturated_interval: f64,
    /// Wait ratio beyond which one direction is treated as saturated
    pub saturation_ratio: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            cycle: 60.0,
            min_green: 5.0,
            averaging_interval: 5.0,
            history_capacity: 120,
            optimize_interval: 60.0,
            saturated_interval: 120.0,
            saturation_ratio: 5.0,
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.min_green > 0.0, "minimum green must be positive");
        ensure!(
            self.cycle > 2.0 * self.min_green,
            "cycle {} leaves no room above twice the minimum green {}",
            self.cycle,
            self.min_green
        );
        ensure!(
            self.optimize_interval > 0.0 && self.saturated_interval > 0.0,
            "optimization intervals must be positive"
        );
        ensure!(
            self.saturation_ratio >= 1.0,
            "saturation ratio must be at least 1"
        );
        Ok(())
    }
}

/// Outcome of splitting the cycle between the two directions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSplit {
    pub horizontal: f64,
    pub vertical: f64,
    /// One direction got the minimum green because the other dominated
    pub saturated: bool,
}

/// Split `config.cycle` according to the cumulative horizontal and vertical
/// waits. A horizontal direction that never waited gets the minimum green,
/// even when the vertical one did not wait either.
pub fn split_cycle(horizontal: f64, vertical: f64, config: &AdaptiveConfig) -> CycleSplit {
    let cycle = config.cycle;
    let min = config.min_green;
    let starve_horizontal = CycleSplit {
        horizontal: min,
        vertical: cycle - min,
        saturated: true,
    };
    let starve_vertical = CycleSplit {
        horizontal: cycle - min,
        vertical: min,
        saturated: true,
    };

    if horizontal <= 0.0 || vertical >= config.saturation_ratio * horizontal {
        return starve_horizontal;
    }
    if vertical <= 0.0 || horizontal >= config.saturation_ratio * vertical {
        return starve_vertical;
    }

    let share = cycle * horizontal / (horizontal + vertical);
    let horizontal = share.clamp(min, cycle - min);
    CycleSplit {
        horizontal,
        vertical: cycle - horizontal,
        saturated: false,
    }
}

/// Light that re-tunes its green durations from observed queueing
#[derive(Debug)]
pub struct AdaptiveTrafficLight {
    cycle: FixedCycleLight,
    config: AdaptiveConfig,
    time_until_optimize: f64,
    optimizations: usize,
}

impl AdaptiveTrafficLight {
    /// Starts with the cycle split evenly
    pub fn new(config: AdaptiveConfig) -> Result<Self> {
        config.validate()?;
        let half = config.cycle / 2.0;
        let cycle = FixedCycleLight::new(LightConfig {
            horizontal: half,
            vertical: half,
            averaging_interval: config.averaging_interval,
            history_capacity: config.history_capacity,
        })?;

        Ok(Self {
            cycle,
            time_until_optimize: config.optimize_interval,
            config,
            optimizations: 0,
        })
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    pub fn time_until_optimize(&self) -> f64 {
        self.time_until_optimize
    }

    /// Number of re-tunings performed so far
    pub fn optimizations(&self) -> usize {
        self.optimizations
    }

    /// Re-split the cycle from the cumulative waits of the retained history
    /// and schedule the next re-tuning
    pub fn optimize(&mut self) -> Result<()> {
        let history = self.cycle.history();
        let horizontal = history.horizontal_total();
        let vertical = history.vertical_total();
        self.optimizations += 1;

        let split = split_cycle(horizontal, vertical, &self.config);
        info!(
            "re-tuning light: waits {:.1}/{:.1} -> green {:.1}s/{:.1}s{}",
            horizontal,
            vertical,
            split.horizontal,
            split.vertical,
            if split.saturated { " (saturated)" } else { "" }
        );
        self.cycle.set_durations(split.horizontal, split.vertical)?;
        self.time_until_optimize = if split.saturated {
            self.config.saturated_interval
        } else {
            self.config.optimize_interval
        };
        Ok(())
    }
}

impl TrafficLight for AdaptiveTrafficLight {
    fn tick(&mut self, dt: f64, pressure: QueuePressure) -> Result<Option<LightMapping>> {
        let switched = self.cycle.tick(dt, pressure)?;

        self.time_until_optimize -= dt;
        if self.time_until_optimize <= 0.0 {
            let done = self.optimizations;
            self.optimize()
                .with_context(|| format!("re-tuning light after {} optimizations", done))?;
        }
        Ok(switched)
    }

    fn phase(&self) -> Phase {
        self.cycle.phase()
    }

    fn remaining(&self) -> f64 {
        self.cycle.remaining()
    }

    fn durations(&self) -> (f64, f64) {
        self.cycle.durations()
    }

    fn history(&self) -> &WaitHistory {
        self.cycle.history()
    }

    fn light_changed(&self) -> &Event<LightMapping> {
        self.cycle.light_changed()
    }
}
