//! The intersection: owns every lane, the flow laws, the light and the
//! random source, and advances them in a fixed order each frame.

use anyhow::{bail, ensure, Context, Result};
use log::warn;
use std::collections::HashMap;
use std::rc::Rc;

use super::adaptive::{AdaptiveConfig, AdaptiveTrafficLight};
use super::entrance::SimEntranceLane;
use super::events::{CarEntered, CrosswalkSignal, Event};
use super::exit::SimExitLane;
use super::law::{FlowLawConfig, TrafficFlowLaw};
use super::light::{FixedCycleLight, LightConfig, TrafficLight, WaitHistory};
use super::random::SimRandom;
use super::types::{LaneId, LaneSet, LightColor, LightMapping, QueuePressure, Side};

/// Which light controls the intersection
#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    Fixed(LightConfig),
    Adaptive(AdaptiveConfig),
}

impl Default for LightKind {
    fn default() -> Self {
        LightKind::Fixed(LightConfig::default())
    }
}

/// Everything needed to build a [`SimIntersection`]
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionConfig {
    /// Lanes on the top and bottom sides
    pub width: usize,
    /// Lanes on the left and right sides
    pub height: usize,
    /// Law shared by every entrance lane without an override
    pub law: FlowLawConfig,
    /// Per-lane law overrides
    pub lane_laws: Vec<(LaneId, FlowLawConfig)>,
    pub light: LightKind,
    /// Seed for reproducible runs; OS entropy when `None`
    pub seed: Option<u64>,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            width: 3,
            height: 3,
            law: FlowLawConfig::default(),
            lane_laws: Vec::new(),
            light: LightKind::default(),
            seed: None,
        }
    }
}

impl IntersectionConfig {
    pub fn lanes_on(&self, side: Side) -> usize {
        if side.is_horizontal() {
            self.height
        } else {
            self.width
        }
    }
}

/// Notifications published by the intersection
///
/// Subscribe to these to observe a running simulation. All of them fire
/// synchronously from inside [`SimIntersection::tick`] or the crosswalk
/// methods.
#[derive(Debug, Clone, Default)]
pub struct IntersectionEvents {
    pub wave_arrived: Event<LaneId>,
    pub car_entered: Event<CarEntered>,
    pub exit_cleared: Event<LaneId>,
    pub light_changed: Event<LightMapping>,
    pub crosswalk_occupied: Event<CrosswalkSignal>,
    pub crosswalk_freed: Event<CrosswalkSignal>,
}

/// A four-way intersection
pub struct SimIntersection {
    width: usize,
    height: usize,
    entrances: LaneSet<SimEntranceLane>,
    exits: LaneSet<SimExitLane>,
    light: Box<dyn TrafficLight>,
    rng: SimRandom,
    events: IntersectionEvents,
    crosswalks: [bool; 4],
    /// Simulation time
    time: f64,
}

impl SimIntersection {
    pub fn new(config: IntersectionConfig) -> Result<Self> {
        ensure!(
            config.width > 0 && config.height > 0,
            "intersection needs at least one lane per side, got {}x{}",
            config.width,
            config.height
        );

        let mut rng = match config.seed {
            Some(seed) => SimRandom::with_seed(seed),
            None => SimRandom::new(),
        };

        let count = |side: Side| config.lanes_on(side);
        let shared_law = Rc::new(build_law(&config.law, count).context("invalid shared flow law")?);

        let mut lane_laws = HashMap::new();
        for (lane, law_config) in &config.lane_laws {
            if lane.index >= count(lane.side) {
                bail!("law override for nonexistent entrance lane {}", lane);
            }
            let law = build_law(law_config, count)
                .with_context(|| format!("invalid flow law for lane {}", lane))?;
            lane_laws.insert(*lane, Rc::new(law));
        }

        let exits = LaneSet::build(count, SimExitLane::new);
        let entrances = LaneSet::build(count, |id| {
            let law = lane_laws
                .get(&id)
                .cloned()
                .unwrap_or_else(|| Rc::clone(&shared_law));
            SimEntranceLane::new(id, law, &mut rng)
        });

        let light: Box<dyn TrafficLight> = match &config.light {
            LightKind::Fixed(light_config) => Box::new(FixedCycleLight::new(light_config.clone())?),
            LightKind::Adaptive(adaptive_config) => {
                Box::new(AdaptiveTrafficLight::new(adaptive_config.clone())?)
            }
        };

        let mut intersection = Self {
            width: config.width,
            height: config.height,
            entrances,
            exits,
            light,
            rng,
            events: IntersectionEvents::default(),
            crosswalks: [false; 4],
            time: 0.0,
        };
        intersection.wire();
        Ok(intersection)
    }

    /// Forward component channels to the public ones and push the initial
    /// light colours to every entrance lane
    fn wire(&mut self) {
        for lane in self.entrances.iter() {
            lane.wave_arrived.forward_to(&self.events.wave_arrived);
            lane.car_entered.forward_to(&self.events.car_entered);
        }
        for lane in self.exits.iter() {
            lane.car_consumed.forward_to(&self.events.exit_cleared);
        }
        self.light
            .light_changed()
            .forward_to(&self.events.light_changed);

        let mapping = self.light.mapping();
        for lane in self.entrances.iter_mut() {
            lane.on_light_changed(&mapping);
        }
    }

    /// Advance the whole intersection by `dt` seconds
    ///
    /// The light goes first so lanes see this frame's colour, then entrance
    /// lanes, then exit lanes, each in side then index order.
    pub fn tick(&mut self, dt: f64) -> Result<()> {
        ensure!(dt.is_finite() && dt >= 0.0, "invalid time step {}", dt);
        self.time += dt;

        let pressure = self.queue_pressure();
        if let Some(mapping) = self.light.tick(dt, pressure)? {
            for lane in self.entrances.iter_mut() {
                lane.on_light_changed(&mapping);
            }
        }

        for lane in self.entrances.iter_mut() {
            lane.tick(dt, &mut self.exits, &mut self.rng)?;
        }
        for lane in self.exits.iter_mut() {
            lane.tick(dt);
        }
        Ok(())
    }

    fn crosswalk_signal(&self, side: Side) -> CrosswalkSignal {
        CrosswalkSignal {
            side,
            entrances: self.entrances.ids(side),
            exits: self.exits.ids(side),
        }
    }

    /// Mark the crosswalk on `side` as occupied, blocking that side's lanes
    pub fn occupy_crosswalk(&mut self, side: Side) {
        if self.crosswalks[side.index()] {
            warn!("crosswalk {} is already occupied", side);
        }
        self.crosswalks[side.index()] = true;

        let signal = self.crosswalk_signal(side);
        for lane in self.entrances.iter_mut() {
            lane.on_crosswalk_occupied(&signal);
        }
        for lane in self.exits.iter_mut() {
            lane.on_crosswalk_occupied(&signal);
        }
        self.events.crosswalk_occupied.emit(&signal);
    }

    /// Free the crosswalk on `side`
    pub fn free_crosswalk(&mut self, side: Side) {
        self.crosswalks[side.index()] = false;

        let signal = self.crosswalk_signal(side);
        for lane in self.entrances.iter_mut() {
            lane.on_crosswalk_freed(&signal);
        }
        for lane in self.exits.iter_mut() {
            lane.on_crosswalk_freed(&signal);
        }
        self.events.crosswalk_freed.emit(&signal);
    }

    pub fn is_crosswalk_occupied(&self, side: Side) -> bool {
        self.crosswalks[side.index()]
    }

    pub fn events(&self) -> &IntersectionEvents {
        &self.events
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn entrances(&self) -> &LaneSet<SimEntranceLane> {
        &self.entrances
    }

    pub fn exits(&self) -> &LaneSet<SimExitLane> {
        &self.exits
    }

    pub fn entrance(&self, id: LaneId) -> Option<&SimEntranceLane> {
        self.entrances.get(id)
    }

    /// Mutable access to an entrance lane, e.g. to queue cars by hand
    pub fn entrance_mut(&mut self, id: LaneId) -> Option<&mut SimEntranceLane> {
        self.entrances.get_mut(id)
    }

    pub fn exit(&self, id: LaneId) -> Option<&SimExitLane> {
        self.exits.get(id)
    }

    pub fn light(&self) -> &dyn TrafficLight {
        self.light.as_ref()
    }

    pub fn light_color(&self, side: Side) -> LightColor {
        self.light.mapping().color(side)
    }

    pub fn wait_history(&self) -> &WaitHistory {
        self.light.history()
    }

    pub fn queue_length(&self, id: LaneId) -> Option<usize> {
        self.entrances.get(id).map(SimEntranceLane::car_count)
    }

    pub fn side_queue(&self, side: Side) -> usize {
        self.entrances.side(side).iter().map(SimEntranceLane::car_count).sum()
    }

    pub fn queue_pressure(&self) -> QueuePressure {
        let mut pressure = QueuePressure::default();
        for side in Side::ALL {
            let queued = self.side_queue(side);
            if side.is_horizontal() {
                pressure.horizontal += queued;
            } else {
                pressure.vertical += queued;
            }
        }
        pressure
    }

    pub fn total_queued(&self) -> usize {
        self.entrances.iter().map(SimEntranceLane::car_count).sum()
    }

    pub fn cars_in_transit(&self) -> usize {
        self.exits.iter().filter(|lane| lane.is_busy()).count()
    }

    /// Print a text summary of the current state
    pub fn print_summary(&self) {
        let (horizontal, vertical) = self.light.durations();
        println!("=== Intersection Summary ===");
        println!("Time: {:.2}s", self.time);
        println!(
            "Light: {:?}, {:.1}s left (green H {:.1}s / V {:.1}s)",
            self.light.phase(),
            self.light.remaining(),
            horizontal,
            vertical
        );
        println!(
            "Queued: {} (horizontal {}, vertical {}), in transit: {}",
            self.total_queued(),
            self.queue_pressure().horizontal,
            self.queue_pressure().vertical,
            self.cars_in_transit()
        );
        if let Some(sample) = self.wait_history().latest() {
            println!(
                "Last wait sample at {:.1}s: H {:.1}, V {:.1}, avg {:.1}",
                sample.elapsed, sample.horizontal, sample.vertical, sample.average
            );
        }
    }

    /// Print one line per side: light, queue per entrance lane and exit
    /// lane occupancy (`.` idle, digit = crossing progress in tenths,
    /// `#` blocked)
    pub fn draw_map(&self) {
        println!("--- Lanes ---");
        for side in Side::ALL {
            let queues: Vec<String> = self
                .entrances
                .side(side)
                .iter()
                .map(|lane| format!("{:>3}", lane.car_count()))
                .collect();
            let exits: String = self
                .exits
                .side(side)
                .iter()
                .map(|lane| {
                    if lane.is_blocked() {
                        '#'
                    } else if lane.is_busy() {
                        let tenths = (lane.progress() * 10.0).floor().min(9.0) as u32;
                        char::from_digit(tenths, 10).unwrap_or('*')
                    } else {
                        '.'
                    }
                })
                .collect();
            println!(
                "  {} [{}] queue:{} | exits: {}",
                side,
                self.light_color(side).letter(),
                queues.join(""),
                exits
            );
        }
    }
}

fn build_law(config: &FlowLawConfig, count: impl Fn(Side) -> usize + Copy) -> Result<TrafficFlowLaw> {
    let mut law = TrafficFlowLaw::new(config.clone())?;
    law.set_topology(count, count)?;
    Ok(law)
}
