//! Intersection traffic simulation
//!
//! This module contains the whole simulation core. It has no notion of wall
//! clock time or rendering: a host calls [`SimIntersection::tick`] once per
//! frame and reads the state back through the query methods and events.

mod adaptive;
mod entrance;
mod events;
mod exit;
mod intersection;
mod law;
mod light;
mod random;
mod stats;
mod types;

pub use adaptive::{split_cycle, AdaptiveConfig, AdaptiveTrafficLight, CycleSplit};
pub use entrance::SimEntranceLane;
pub use events::{CarEntered, CrosswalkSignal, Event, SubscriptionId};
pub use exit::SimExitLane;
pub use intersection::{IntersectionConfig, IntersectionEvents, LightKind, SimIntersection};
pub use law::{FlowLawConfig, TrafficFlowLaw, TurnWeights};
pub use light::{
    FixedCycleLight, LightConfig, TrafficLight, WaitHistory, WaitRecorder, WaitSample,
};
pub use random::SimRandom;
pub use stats::{StatsSnapshot, TrafficStats};
pub use types::{
    Car, LaneId, LaneSet, LightColor, LightMapping, Phase, QueuePressure, Side, RELEASE_SPACING,
};
