//! Exit lanes: hold at most one car while it crosses the intersection

use anyhow::{bail, Result};
use log::trace;

use super::events::{CrosswalkSignal, Event};
use super::types::{Car, LaneId};

#[derive(Debug, Clone, Copy)]
struct Transit {
    car: Car,
    remaining: f64,
}

/// An exit lane of the intersection
#[derive(Debug)]
pub struct SimExitLane {
    pub id: LaneId,
    transit: Option<Transit>,
    blocked: bool,
    /// Fired when the car in transit has left the intersection
    pub car_consumed: Event<LaneId>,
}

impl SimExitLane {
    pub fn new(id: LaneId) -> Self {
        Self {
            id,
            transit: None,
            blocked: false,
            car_consumed: Event::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.transit.is_some()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Crossing time left for the car in transit, zero when idle
    pub fn remaining(&self) -> f64 {
        self.transit.map_or(0.0, |t| t.remaining)
    }

    /// Fraction of the crossing already done, in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        match self.transit {
            Some(t) if t.car.crossing_duration > 0.0 => {
                (1.0 - t.remaining / t.car.crossing_duration).clamp(0.0, 1.0)
            }
            Some(_) => 1.0,
            None => 0.0,
        }
    }

    pub fn car_in_transit(&self) -> Option<&Car> {
        self.transit.as_ref().map(|t| &t.car)
    }

    /// Start the crossing of `car`
    ///
    /// The caller must check [`SimExitLane::is_busy`] first; accepting into a
    /// busy lane is an error.
    pub fn accept(&mut self, car: Car) -> Result<()> {
        if self.is_busy() {
            bail!("exit lane {} is already busy", self.id);
        }
        self.transit = Some(Transit {
            car,
            remaining: car.crossing_duration.max(0.0),
        });
        Ok(())
    }

    pub fn tick(&mut self, dt: f64) {
        let Some(transit) = self.transit.as_mut() else {
            return;
        };

        transit.remaining = (transit.remaining - dt).max(0.0);
        if self.blocked || transit.remaining > 0.0 {
            return;
        }

        self.transit = None;
        trace!("exit lane {} cleared", self.id);
        self.car_consumed.emit(&self.id);
    }

    pub fn on_crosswalk_occupied(&mut self, signal: &CrosswalkSignal) {
        if signal.exits.contains(&self.id) {
            self.blocked = true;
        }
    }

    pub fn on_crosswalk_freed(&mut self, signal: &CrosswalkSignal) {
        if signal.exits.contains(&self.id) {
            self.blocked = false;
        }
    }
}
