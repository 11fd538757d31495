//! Entrance lanes: queue arriving cars and release them onto the
//! intersection

use anyhow::{Context, Result};
use log::{debug, trace};
use std::collections::VecDeque;
use std::rc::Rc;

use super::events::{CarEntered, CrosswalkSignal, Event};
use super::exit::SimExitLane;
use super::law::TrafficFlowLaw;
use super::random::SimRandom;
use super::types::{Car, LaneId, LaneSet, LightColor, LightMapping, RELEASE_SPACING};

/// An entrance lane of the intersection
#[derive(Debug)]
pub struct SimEntranceLane {
    pub id: LaneId,
    law: Rc<TrafficFlowLaw>,
    cars: VecDeque<Car>,
    /// `None` until the first light broadcast reaches this lane
    light: Option<LightColor>,
    release_timeout: f64,
    time_until_wave: f64,
    blocked: bool,
    /// Fired after a wave of cars has been queued
    pub wave_arrived: Event<LaneId>,
    /// Fired when the head car is handed to its exit lane
    pub car_entered: Event<CarEntered>,
}

impl SimEntranceLane {
    pub fn new(id: LaneId, law: Rc<TrafficFlowLaw>, rng: &mut SimRandom) -> Self {
        let time_until_wave = law.wave_delay(rng);
        Self {
            id,
            law,
            cars: VecDeque::new(),
            light: None,
            release_timeout: 0.0,
            time_until_wave,
            blocked: false,
            wave_arrived: Event::new(),
            car_entered: Event::new(),
        }
    }

    pub fn car_count(&self) -> usize {
        self.cars.len()
    }

    pub fn cars(&self) -> impl Iterator<Item = &Car> {
        self.cars.iter()
    }

    pub fn light(&self) -> Option<LightColor> {
        self.light
    }

    pub fn law(&self) -> &TrafficFlowLaw {
        &self.law
    }

    pub fn time_until_wave(&self) -> f64 {
        self.time_until_wave
    }

    pub fn release_timeout(&self) -> f64 {
        self.release_timeout
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Queue a car directly, bypassing the arrival law
    pub fn push_car(&mut self, car: Car) {
        self.cars.push_back(car);
    }

    pub fn on_light_changed(&mut self, mapping: &LightMapping) {
        self.light = Some(mapping.color(self.id.side));
    }

    pub fn on_crosswalk_occupied(&mut self, signal: &CrosswalkSignal) {
        if signal.entrances.contains(&self.id) {
            self.blocked = true;
        }
    }

    pub fn on_crosswalk_freed(&mut self, signal: &CrosswalkSignal) {
        if signal.entrances.contains(&self.id) {
            self.blocked = false;
        }
    }

    /// Advance the lane by `dt` seconds
    ///
    /// Fails if no light colour was ever broadcast to this lane, or if a
    /// queued car names an exit lane that does not exist.
    pub fn tick(
        &mut self,
        dt: f64,
        exits: &mut LaneSet<SimExitLane>,
        rng: &mut SimRandom,
    ) -> Result<()> {
        self.update_arrivals(dt, rng)?;

        let light = self
            .light
            .with_context(|| format!("entrance lane {} has no light colour", self.id))?;
        match light {
            LightColor::Green => self.green_light_tick(dt, exits),
            LightColor::Yellow | LightColor::Red => Ok(()),
        }
    }

    fn update_arrivals(&mut self, dt: f64, rng: &mut SimRandom) -> Result<()> {
        if self.time_until_wave > 0.0 {
            self.time_until_wave -= dt;
            return Ok(());
        }

        self.time_until_wave += self.law.wave_delay(rng);
        let wave = self.law.cars_for(self.id, rng)?;
        debug!(
            "wave of {} cars on lane {}, next in {:.1}s",
            wave.len(),
            self.id,
            self.time_until_wave
        );
        self.cars.extend(wave);
        self.wave_arrived.emit(&self.id);
        Ok(())
    }

    fn green_light_tick(&mut self, dt: f64, exits: &mut LaneSet<SimExitLane>) -> Result<()> {
        self.release_timeout -= dt;
        if self.release_timeout > 0.0 || self.blocked {
            return Ok(());
        }

        let Some(head) = self.cars.front() else {
            return Ok(());
        };
        let exit_id = head.destination;
        let destination = exits
            .get_mut(exit_id)
            .with_context(|| format!("lane {} routes to unknown exit {}", self.id, exit_id))?;
        if destination.is_busy() {
            return Ok(());
        }

        if let Some(car) = self.cars.pop_front() {
            destination.accept(car)?;
            self.release_timeout = RELEASE_SPACING;
            trace!("car from {} entered towards {}", self.id, exit_id);
            self.car_entered.emit(&CarEntered {
                entrance: self.id,
                exit: exit_id,
            });
        }
        Ok(())
    }
}
