//! Statistics collected by observing an intersection's events

use std::cell::RefCell;
use std::rc::Rc;

use super::intersection::IntersectionEvents;

/// Counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub waves: usize,
    pub cars_entered: usize,
    pub cars_consumed: usize,
    pub light_switches: usize,
    pub crosswalk_closures: usize,
}

/// Event counter attached to an intersection
///
/// Keeps counting for as long as the intersection keeps ticking, even after
/// the `TrafficStats` value itself is dropped.
#[derive(Debug, Clone, Default)]
pub struct TrafficStats {
    counts: Rc<RefCell<StatsSnapshot>>,
}

impl TrafficStats {
    pub fn attach(events: &IntersectionEvents) -> Self {
        let stats = Self::default();

        let counts = Rc::clone(&stats.counts);
        events
            .wave_arrived
            .subscribe(move |_| counts.borrow_mut().waves += 1);

        let counts = Rc::clone(&stats.counts);
        events
            .car_entered
            .subscribe(move |_| counts.borrow_mut().cars_entered += 1);

        let counts = Rc::clone(&stats.counts);
        events
            .exit_cleared
            .subscribe(move |_| counts.borrow_mut().cars_consumed += 1);

        let counts = Rc::clone(&stats.counts);
        events
            .light_changed
            .subscribe(move |_| counts.borrow_mut().light_switches += 1);

        let counts = Rc::clone(&stats.counts);
        events
            .crosswalk_occupied
            .subscribe(move |_| counts.borrow_mut().crosswalk_closures += 1);

        stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.counts.borrow()
    }
}
