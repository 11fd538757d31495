//! Entrance lane, exit lane and flow law tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use intersection_sim::simulation::{
    Car, CarEntered, CrosswalkSignal, FlowLawConfig, LaneId, LaneSet, Phase, SimEntranceLane,
    SimExitLane, SimRandom, Side, TrafficFlowLaw, TurnWeights, RELEASE_SPACING,
};

fn lane(side: Side, index: usize) -> LaneId {
    LaneId::new(side, index)
}

/// A law whose first wave only arrives after `delay` seconds
fn law_with_delay(delay: f64, max_cars: u32, mean_cars: f64) -> Rc<TrafficFlowLaw> {
    let mut law = TrafficFlowLaw::new(FlowLawConfig {
        max_cars,
        mean_cars,
        min_delay: delay,
        max_delay: delay,
        ..FlowLawConfig::default()
    })
    .unwrap();
    law.set_topology(|_| 1, |_| 1).unwrap();
    Rc::new(law)
}

fn single_lane_exits() -> LaneSet<SimExitLane> {
    LaneSet::build(|_| 1, SimExitLane::new)
}

fn crosswalk(side: Side, exits: Vec<LaneId>) -> CrosswalkSignal {
    CrosswalkSignal {
        side,
        entrances: Vec::new(),
        exits,
    }
}

fn count_events(lane: &SimExitLane) -> Rc<Cell<usize>> {
    let count = Rc::new(Cell::new(0));
    let counter = Rc::clone(&count);
    lane.car_consumed.subscribe(move |_| counter.set(counter.get() + 1));
    count
}

#[test]
fn test_exit_lane_clears_after_crossing_duration() {
    let mut exit = SimExitLane::new(lane(Side::Bottom, 0));
    let consumed = count_events(&exit);

    exit.accept(Car::new(exit.id, 3.0)).unwrap();
    exit.tick(1.0);
    assert!(exit.is_busy());
    exit.tick(1.0);
    assert!(exit.is_busy());
    exit.tick(1.0);
    assert!(!exit.is_busy());
    assert_eq!(consumed.get(), 1);

    exit.tick(1.0);
    assert_eq!(consumed.get(), 1);
}

#[test]
fn test_exit_lane_rejects_double_accept() {
    let mut exit = SimExitLane::new(lane(Side::Left, 0));
    exit.accept(Car::new(exit.id, 2.0)).unwrap();
    assert!(exit.accept(Car::new(exit.id, 2.0)).is_err());
}

#[test]
fn test_exit_lane_reports_progress() {
    let mut exit = SimExitLane::new(lane(Side::Top, 0));
    assert_eq!(exit.progress(), 0.0);

    exit.accept(Car::new(exit.id, 4.0)).unwrap();
    exit.tick(1.0);
    assert!((exit.progress() - 0.25).abs() < 1e-9);
    assert!((exit.remaining() - 3.0).abs() < 1e-9);
}

#[test]
fn test_blocked_exit_lane_stalls_at_zero_until_freed() {
    let id = lane(Side::Right, 1);
    let mut exit = SimExitLane::new(id);
    let consumed = count_events(&exit);
    exit.accept(Car::new(id, 2.0)).unwrap();

    exit.on_crosswalk_occupied(&crosswalk(Side::Right, vec![lane(Side::Right, 0), id]));
    assert!(exit.is_blocked());

    for _ in 0..5 {
        exit.tick(1.0);
        assert!(exit.remaining() >= 0.0);
    }
    assert!(exit.is_busy());
    assert_eq!(exit.remaining(), 0.0);
    assert_eq!(consumed.get(), 0);

    exit.on_crosswalk_freed(&crosswalk(Side::Right, vec![id]));
    assert!(!exit.is_blocked());
    exit.tick(0.0);
    assert!(!exit.is_busy());
    assert_eq!(consumed.get(), 1);
}

#[test]
fn test_crosswalk_signal_ignores_other_lanes() {
    let mut exit = SimExitLane::new(lane(Side::Top, 0));
    exit.on_crosswalk_occupied(&crosswalk(Side::Top, vec![lane(Side::Top, 1)]));
    assert!(!exit.is_blocked());
}

#[test]
fn test_entrance_lane_without_light_is_an_error() {
    let mut rng = SimRandom::with_seed(1);
    let mut exits = single_lane_exits();
    let mut entrance = SimEntranceLane::new(lane(Side::Top, 0), law_with_delay(1000.0, 4, 2.0), &mut rng);

    assert!(entrance.tick(0.1, &mut exits, &mut rng).is_err());
}

#[test]
fn test_empty_green_lane_releases_nothing() {
    let mut rng = SimRandom::with_seed(2);
    let mut exits = single_lane_exits();
    let mut entrance = SimEntranceLane::new(lane(Side::Top, 0), law_with_delay(1000.0, 4, 2.0), &mut rng);
    entrance.on_light_changed(&Phase::VerticalGreen.mapping());

    let entered = Rc::new(Cell::new(0));
    let counter = Rc::clone(&entered);
    entrance
        .car_entered
        .subscribe(move |_| counter.set(counter.get() + 1));

    for _ in 0..10 {
        entrance.tick(0.5, &mut exits, &mut rng).unwrap();
    }
    assert_eq!(entered.get(), 0);
    assert_eq!(entrance.car_count(), 0);
}

#[test]
fn test_green_lane_hands_head_car_to_free_exit() {
    let mut rng = SimRandom::with_seed(3);
    let mut exits = single_lane_exits();
    let top = lane(Side::Top, 0);
    let bottom = lane(Side::Bottom, 0);
    let mut entrance = SimEntranceLane::new(top, law_with_delay(1000.0, 4, 2.0), &mut rng);
    entrance.on_light_changed(&Phase::VerticalGreen.mapping());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    entrance
        .car_entered
        .subscribe(move |entered: &CarEntered| log.borrow_mut().push(*entered));

    entrance.push_car(Car::new(bottom, 3.0));
    entrance.tick(0.1, &mut exits, &mut rng).unwrap();

    assert_eq!(entrance.car_count(), 0);
    assert!(exits.get(bottom).unwrap().is_busy());
    assert_eq!(entrance.release_timeout(), RELEASE_SPACING);
    assert_eq!(
        seen.borrow().as_slice(),
        &[CarEntered {
            entrance: top,
            exit: bottom
        }]
    );
}

#[test]
fn test_red_lane_holds_its_cars() {
    let mut rng = SimRandom::with_seed(4);
    let mut exits = single_lane_exits();
    let mut entrance = SimEntranceLane::new(lane(Side::Top, 0), law_with_delay(1000.0, 4, 2.0), &mut rng);
    entrance.on_light_changed(&Phase::HorizontalGreen.mapping());

    entrance.push_car(Car::new(lane(Side::Bottom, 0), 3.0));
    for _ in 0..10 {
        entrance.tick(1.0, &mut exits, &mut rng).unwrap();
    }
    assert_eq!(entrance.car_count(), 1);
    assert!(!exits.get(lane(Side::Bottom, 0)).unwrap().is_busy());
}

#[test]
fn test_busy_destination_blocks_release() {
    let mut rng = SimRandom::with_seed(5);
    let mut exits = single_lane_exits();
    let bottom = lane(Side::Bottom, 0);
    exits
        .get_mut(bottom)
        .unwrap()
        .accept(Car::new(bottom, 100.0))
        .unwrap();

    let mut entrance = SimEntranceLane::new(lane(Side::Top, 0), law_with_delay(1000.0, 4, 2.0), &mut rng);
    entrance.on_light_changed(&Phase::VerticalGreen.mapping());
    entrance.push_car(Car::new(bottom, 3.0));

    entrance.tick(0.1, &mut exits, &mut rng).unwrap();
    assert_eq!(entrance.car_count(), 1);
}

#[test]
fn test_release_spacing_between_cars() {
    let mut rng = SimRandom::with_seed(6);
    let mut exits = single_lane_exits();
    let mut entrance = SimEntranceLane::new(lane(Side::Top, 0), law_with_delay(1000.0, 4, 2.0), &mut rng);
    entrance.on_light_changed(&Phase::VerticalGreen.mapping());
    entrance.push_car(Car::new(lane(Side::Bottom, 0), 10.0));
    entrance.push_car(Car::new(lane(Side::Left, 0), 10.0));

    entrance.tick(0.5, &mut exits, &mut rng).unwrap();
    assert_eq!(entrance.car_count(), 1);

    for _ in 0..3 {
        entrance.tick(0.5, &mut exits, &mut rng).unwrap();
    }
    assert_eq!(entrance.car_count(), 1);

    entrance.tick(0.5, &mut exits, &mut rng).unwrap();
    assert_eq!(entrance.car_count(), 0);
}

#[test]
fn test_wave_arrives_when_countdown_expires() {
    let mut rng = SimRandom::with_seed(7);
    let mut exits = single_lane_exits();
    let top = lane(Side::Top, 0);
    let mut entrance = SimEntranceLane::new(top, law_with_delay(5.0, 4, 4.0), &mut rng);
    entrance.on_light_changed(&Phase::HorizontalGreen.mapping());

    let waves = Rc::new(Cell::new(0));
    let counter = Rc::clone(&waves);
    entrance
        .wave_arrived
        .subscribe(move |_| counter.set(counter.get() + 1));

    for _ in 0..5 {
        entrance.tick(1.0, &mut exits, &mut rng).unwrap();
    }
    assert_eq!(entrance.car_count(), 0);

    entrance.tick(1.0, &mut exits, &mut rng).unwrap();
    assert_eq!(entrance.car_count(), 4);
    assert_eq!(waves.get(), 1);
    assert_eq!(entrance.time_until_wave(), 5.0);

    let legal = [lane(Side::Bottom, 0), lane(Side::Left, 0), lane(Side::Right, 0)];
    for car in entrance.cars() {
        assert!(legal.contains(&car.destination));
        assert!((2.0..=5.0).contains(&car.crossing_duration));
    }
}

#[test]
fn test_queue_only_shrinks_on_release() {
    let mut rng = SimRandom::with_seed(8);
    let mut exits = single_lane_exits();
    let mut entrance = SimEntranceLane::new(lane(Side::Left, 0), law_with_delay(3.0, 6, 3.0), &mut rng);

    let entered = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&entered);
    entrance
        .car_entered
        .subscribe(move |_| counter.set(counter.get() + 1));

    for step in 0..2000 {
        let phase = if (step / 40) % 2 == 0 {
            Phase::HorizontalGreen
        } else {
            Phase::VerticalGreen
        };
        entrance.on_light_changed(&phase.mapping());

        let before = entrance.car_count();
        let entered_before = entered.get();
        entrance.tick(0.25, &mut exits, &mut rng).unwrap();
        for exit in exits.iter_mut() {
            exit.tick(0.25);
        }

        if entrance.car_count() < before {
            assert_eq!(entered.get(), entered_before + 1);
            assert_eq!(entrance.car_count(), before - 1);
        }
    }
    assert!(entered.get() > 0);
}

#[test]
fn test_topology_follows_turn_rules() {
    let mut law = TrafficFlowLaw::new(FlowLawConfig::default()).unwrap();
    law.set_topology(|_| 3, |_| 3).unwrap();

    let sides_of = |id: LaneId| -> Vec<Side> {
        let mut sides: Vec<Side> = law
            .destinations(id)
            .unwrap()
            .iter()
            .map(|(_, exit)| exit.side)
            .collect();
        sides.dedup();
        sides
    };

    // Curb lane: straight and right
    assert_eq!(sides_of(lane(Side::Top, 0)), vec![Side::Bottom, Side::Left]);
    // Middle lane: straight only
    assert_eq!(sides_of(lane(Side::Top, 1)), vec![Side::Bottom]);
    // Median lane: straight and left
    assert_eq!(sides_of(lane(Side::Top, 2)), vec![Side::Bottom, Side::Right]);
    assert_eq!(sides_of(lane(Side::Left, 0)), vec![Side::Right, Side::Bottom]);

    for side in Side::ALL {
        for index in 0..3 {
            let table = law.destinations(lane(side, index)).unwrap();
            assert!(table.iter().all(|(_, exit)| exit.side != side));
        }
    }
}

#[test]
fn test_topology_without_legal_destination_fails() {
    let mut law = TrafficFlowLaw::new(FlowLawConfig {
        turn_weights: TurnWeights {
            straight: 0,
            right: 1,
            left: 1,
        },
        ..FlowLawConfig::default()
    })
    .unwrap();

    // The middle lane can only go straight, which has no weight
    assert!(law.set_topology(|_| 3, |_| 3).is_err());
}

#[test]
fn test_invalid_law_configs_are_rejected() {
    let bad = [
        FlowLawConfig {
            lambda: 0.0,
            ..FlowLawConfig::default()
        },
        FlowLawConfig {
            max_cars: 0,
            ..FlowLawConfig::default()
        },
        FlowLawConfig {
            mean_cars: 20.0,
            ..FlowLawConfig::default()
        },
        FlowLawConfig {
            min_delay: 50.0,
            max_delay: 10.0,
            ..FlowLawConfig::default()
        },
        FlowLawConfig {
            min_crossing: 6.0,
            max_crossing: 5.0,
            ..FlowLawConfig::default()
        },
    ];
    for config in bad {
        assert!(TrafficFlowLaw::new(config).is_err());
    }
}

#[test]
fn test_wave_delay_is_clamped() {
    let law = TrafficFlowLaw::new(FlowLawConfig::default()).unwrap();
    let mut rng = SimRandom::with_seed(9);
    for _ in 0..5000 {
        let delay = law.wave_delay(&mut rng);
        assert!((20.0..=240.0).contains(&delay));
    }
}

#[test]
fn test_cars_for_unknown_lane_fails() {
    let law = law_with_delay(10.0, 4, 2.0);
    let mut rng = SimRandom::with_seed(10);
    assert!(law.cars_for(lane(Side::Top, 5), &mut rng).is_err());
}

#[test]
fn test_cars_for_respects_wave_limits() {
    let mut law = TrafficFlowLaw::new(FlowLawConfig::default()).unwrap();
    law.set_topology(|_| 2, |_| 2).unwrap();
    let mut rng = SimRandom::with_seed(11);

    for _ in 0..500 {
        let cars = law.cars_for(lane(Side::Right, 1), &mut rng).unwrap();
        assert!(cars.len() <= 12);
        for car in cars {
            assert_ne!(car.destination.side, Side::Right);
            assert!((2.0..=5.0).contains(&car.crossing_duration));
        }
    }
}
