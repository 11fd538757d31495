//! Traffic light: a two-phase cycle shared by every approach
//!
//! [`FixedCycleLight`] alternates horizontal and vertical green with fixed
//! durations. Both light kinds also record how much queueing each direction
//! suffered, see [`WaitRecorder`].

use anyhow::{ensure, Result};
use log::debug;
use ordered_float::OrderedFloat;
use std::collections::VecDeque;

use super::events::Event;
use super::types::{LightMapping, Phase, QueuePressure};

/// Interface the intersection drives its light through
pub trait TrafficLight {
    /// Advance by `dt` seconds with the queue lengths observed this frame.
    /// Returns the latest mapping if at least one phase switch happened.
    fn tick(&mut self, dt: f64, pressure: QueuePressure) -> Result<Option<LightMapping>>;

    fn phase(&self) -> Phase;

    /// Time left in the current phase
    fn remaining(&self) -> f64;

    /// Configured (horizontal, vertical) green durations
    fn durations(&self) -> (f64, f64);

    fn history(&self) -> &WaitHistory;

    fn light_changed(&self) -> &Event<LightMapping>;

    fn mapping(&self) -> LightMapping {
        self.phase().mapping()
    }
}

/// One point of the wait-time history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitSample {
    /// Simulation time at which the sample was taken
    pub elapsed: f64,
    /// Integral of the horizontal queue length over the sampling interval
    pub horizontal: f64,
    /// Integral of the vertical queue length over the sampling interval
    pub vertical: f64,
    pub average: f64,
}

impl WaitSample {
    pub fn new(elapsed: f64, horizontal: f64, vertical: f64) -> Self {
        Self {
            elapsed,
            horizontal,
            vertical,
            average: (horizontal + vertical) / 2.0,
        }
    }
}

/// Bounded history of wait samples; the oldest sample is evicted when full
#[derive(Debug, Clone)]
pub struct WaitHistory {
    samples: VecDeque<WaitSample>,
    capacity: usize,
}

impl WaitHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: WaitSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &WaitSample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&WaitSample> {
        self.samples.back()
    }

    /// Sum of horizontal waits over the retained window
    pub fn horizontal_total(&self) -> f64 {
        self.samples.iter().map(|s| s.horizontal).sum()
    }

    /// Sum of vertical waits over the retained window
    pub fn vertical_total(&self) -> f64 {
        self.samples.iter().map(|s| s.vertical).sum()
    }

    pub fn mean_average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().map(|s| s.average).sum::<f64>() / self.samples.len() as f64)
    }

    pub fn peak_average(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(|s| OrderedFloat(s.average))
            .max()
            .map(|peak| peak.0)
    }
}

/// Integrates queue lengths over time and snapshots them periodically
#[derive(Debug, Clone)]
pub struct WaitRecorder {
    interval: f64,
    time_until_sample: f64,
    elapsed: f64,
    horizontal: f64,
    vertical: f64,
    history: WaitHistory,
}

impl WaitRecorder {
    pub fn new(interval: f64, capacity: usize) -> Self {
        Self {
            interval,
            time_until_sample: interval,
            elapsed: 0.0,
            horizontal: 0.0,
            vertical: 0.0,
            history: WaitHistory::new(capacity),
        }
    }

    /// Integrate `pressure` over `dt` seconds, pushing one sample for every
    /// averaging interval that closes within the step
    pub fn record(&mut self, dt: f64, pressure: QueuePressure) {
        if dt < self.time_until_sample {
            self.accumulate(dt, pressure);
            self.time_until_sample -= dt;
            return;
        }

        let head = self.time_until_sample;
        self.accumulate(head, pressure);
        self.push_sample();

        let rest = dt - head;
        let full = (rest / self.interval).floor();
        // Intervals beyond the capacity would be evicted by the ones after them
        let skipped = (full - self.history.capacity() as f64).max(0.0);
        self.elapsed += skipped * self.interval;
        for _ in 0..(full - skipped) as usize {
            self.accumulate(self.interval, pressure);
            self.push_sample();
        }

        let tail = (rest - full * self.interval).max(0.0);
        self.accumulate(tail, pressure);
        self.time_until_sample = self.interval - tail;
    }

    fn accumulate(&mut self, dt: f64, pressure: QueuePressure) {
        self.elapsed += dt;
        self.horizontal += dt * pressure.horizontal as f64;
        self.vertical += dt * pressure.vertical as f64;
    }

    fn push_sample(&mut self) {
        self.history
            .push(WaitSample::new(self.elapsed, self.horizontal, self.vertical));
        self.horizontal = 0.0;
        self.vertical = 0.0;
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn history(&self) -> &WaitHistory {
        &self.history
    }
}

/// Parameters of a [`FixedCycleLight`]
#[derive(Debug, Clone, PartialEq)]
pub struct LightConfig {
    pub horizontal: f64,
    pub vertical: f64,
    /// Seconds between two wait samples
    pub averaging_interval: f64,
    pub history_capacity: usize,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            horizontal: 30.0,
            vertical: 30.0,
            averaging_interval: 5.0,
            history_capacity: 120,
        }
    }
}

/// Light with fixed green durations
#[derive(Debug)]
pub struct FixedCycleLight {
    phase: Phase,
    remaining: f64,
    horizontal: f64,
    vertical: f64,
    recorder: WaitRecorder,
    light_changed: Event<LightMapping>,
}

impl FixedCycleLight {
    /// Starts in horizontal green with the full horizontal duration left
    pub fn new(config: LightConfig) -> Result<Self> {
        ensure_durations(config.horizontal, config.vertical)?;
        ensure!(
            config.averaging_interval > 0.0,
            "averaging interval must be positive"
        );
        ensure!(config.history_capacity > 0, "history capacity must be positive");

        Ok(Self {
            phase: Phase::HorizontalGreen,
            remaining: config.horizontal,
            horizontal: config.horizontal,
            vertical: config.vertical,
            recorder: WaitRecorder::new(config.averaging_interval, config.history_capacity),
            light_changed: Event::new(),
        })
    }

    /// Replace the green durations; takes effect from the next phase
    pub fn set_durations(&mut self, horizontal: f64, vertical: f64) -> Result<()> {
        ensure_durations(horizontal, vertical)?;
        self.horizontal = horizontal;
        self.vertical = vertical;
        Ok(())
    }

    pub fn recorder(&self) -> &WaitRecorder {
        &self.recorder
    }

    fn duration_of(&self, phase: Phase) -> f64 {
        match phase {
            Phase::HorizontalGreen => self.horizontal,
            Phase::VerticalGreen => self.vertical,
        }
    }

    fn advance(&mut self, dt: f64) -> Option<LightMapping> {
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            // Whole cycles end in the current phase
            let cycle = self.horizontal + self.vertical;
            self.remaining += (-self.remaining).div_euclid(cycle) * cycle;
        }

        let mut latest = None;
        while self.remaining <= 0.0 {
            self.phase = self.phase.next();
            // Carry the overshoot so the cycle does not drift
            self.remaining += self.duration_of(self.phase);
            let mapping = self.phase.mapping();
            debug!("light switched to {:?} ({})", self.phase, mapping);
            self.light_changed.emit(&mapping);
            latest = Some(mapping);
        }
        latest
    }
}

impl TrafficLight for FixedCycleLight {
    fn tick(&mut self, dt: f64, pressure: QueuePressure) -> Result<Option<LightMapping>> {
        ensure!(dt.is_finite() && dt >= 0.0, "invalid light time step {}", dt);
        self.recorder.record(dt, pressure);
        Ok(self.advance(dt))
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn remaining(&self) -> f64 {
        self.remaining
    }

    fn durations(&self) -> (f64, f64) {
        (self.horizontal, self.vertical)
    }

    fn history(&self) -> &WaitHistory {
        self.recorder.history()
    }

    fn light_changed(&self) -> &Event<LightMapping> {
        &self.light_changed
    }
}

fn ensure_durations(horizontal: f64, vertical: f64) -> Result<()> {
    ensure!(
        horizontal > 0.0 && vertical > 0.0,
        "green durations must be positive, got {}/{}",
        horizontal,
        vertical
    );
    Ok(())
}
