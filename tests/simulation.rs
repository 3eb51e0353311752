//! End-to-end simulation scenarios driven through the arena API

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use wormstake_server::config::Rules;
use wormstake_server::game::arena::Arena;
use wormstake_server::game::food::Food;
use wormstake_server::game::physics::{self, Point};
use wormstake_server::game::worm::Lifecycle;
use wormstake_server::settlement::{SettlementRecord, Value};

/// Rules with the random background (bots, ambient food, boost shedding)
/// switched off so outcomes are exact.
fn quiet_rules() -> Rules {
    Rules {
        bot_target: 0,
        food_target: 0,
        food_respawn_chance: 0.0,
        boost_shed_rate: 0.0,
        ..Rules::default()
    }
}

fn arena_with_stake(stake: Decimal) -> Arena {
    Arena::new(Value::new(stake).unwrap(), quiet_rules())
}

/// Point the worm's whole body along `heading` with its head at `head`
fn place_straight(arena: &mut Arena, worm_id: Uuid, head: Point, heading: f64) {
    let spacing = arena.rules.segment_spacing;
    let worm = arena.worms.get_mut(&worm_id).unwrap();
    worm.heading = heading;
    worm.desired_heading = heading;
    for (i, segment) in worm.segments.iter_mut().enumerate() {
        segment.x = head.x - heading.cos() * spacing * i as f64;
        segment.y = head.y - heading.sin() * spacing * i as f64;
    }
}

#[test]
fn scenario_a_ten_food_items_grow_value_and_body() {
    let mut arena = arena_with_stake(dec!(5.00));
    let worm_id = arena.join_player(Uuid::new_v4(), "eater".into()).unwrap();
    place_straight(&mut arena, worm_id, Point::new(1000.0, 1000.0), 0.0);

    // ten plain food items right on the head's next position
    let landing = Point::new(1000.0 + arena.rules.base_speed, 1000.0);
    for _ in 0..10 {
        let item = Food::drop_at(landing, Value::new(dec!(0.01)).unwrap(), "#FFFFFF".into());
        arena.food.insert(item.id, item);
    }

    arena.tick();

    let worm = &arena.worms[&worm_id];
    assert_eq!(worm.value.get(), dec!(5.10));
    assert_eq!(worm.segments.len(), arena.rules.spawn_segments + 10);
    assert_eq!(worm.score, 10);
    assert!(arena.food.is_empty());
}

#[test]
fn scenario_b_kill_pays_victim_value_minus_fee() {
    let mut arena = arena_with_stake(dec!(3.00));
    let a = arena.join_player(Uuid::new_v4(), "a".into()).unwrap();
    let b = arena.join_player(Uuid::new_v4(), "b".into()).unwrap();

    // b lies vertically; a runs head-first into b's mid-body
    place_straight(&mut arena, b, Point::new(2000.0, 2000.0), std::f64::consts::FRAC_PI_2);
    let target = arena.worms[&b].segments[8];
    place_straight(
        &mut arena,
        a,
        Point::new(target.x - arena.rules.base_speed, target.y),
        0.0,
    );

    let report = arena.tick();

    assert_eq!(report.deaths.len(), 1);
    assert_eq!(report.deaths[0].worm_id, a);
    match &report.settlements[0] {
        SettlementRecord::Kill {
            victim_value,
            fee,
            reward,
            ..
        } => {
            assert_eq!(victim_value.get(), dec!(3.00));
            assert_eq!(reward.get(), dec!(2.70));
            assert_eq!(fee.get(), dec!(0.30));
            // value conservation: the fee and the reward exhaust the victim
            assert_eq!(fee.get() + reward.get(), victim_value.get());
        }
        other => panic!("expected kill record, got {:?}", other),
    }
    assert_eq!(arena.worms[&b].value.get(), dec!(5.70));
}

#[test]
fn scenario_c_killerless_death_redistributes_below_par() {
    let mut arena = arena_with_stake(dec!(3.00));
    let worm_id = arena.join_player(Uuid::new_v4(), "lost".into()).unwrap();

    let (record, notice) = arena.forfeit(worm_id).unwrap();
    match record {
        SettlementRecord::Forfeit { value, .. } => assert_eq!(value.get(), dec!(3.00)),
        other => panic!("expected forfeit record, got {:?}", other),
    }
    assert!(notice.killer.is_none());

    // the body came back as food worth less than the forfeited value;
    // the difference is destroyed, never credited to any wallet
    let dropped: Decimal = arena.food.values().map(|f| f.value.get()).sum();
    assert!(dropped > Decimal::ZERO);
    assert!(dropped < dec!(3.00));
}

#[test]
fn scenario_d_full_hold_settles_the_exit() {
    let mut arena = arena_with_stake(dec!(8.00));
    let worm_id = arena.join_player(Uuid::new_v4(), "cashout".into()).unwrap();

    arena.set_exit_hold(worm_id, true);

    let mut exits = Vec::new();
    let mut settlements = Vec::new();
    for _ in 0..arena.rules.exit_hold_ticks {
        let report = arena.tick();
        exits.extend(report.exits);
        settlements.extend(report.settlements);
    }

    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].gross.get(), dec!(8.00));
    assert_eq!(exits[0].fee.get(), dec!(0.80));
    assert_eq!(exits[0].net.get(), dec!(7.20));
    assert!(matches!(settlements[0], SettlementRecord::Exit { .. }));
    // the worm is gone from the arena's active set
    assert!(!arena.worms.contains_key(&worm_id));

    // further ticks settle nothing more
    for _ in 0..10 {
        let report = arena.tick();
        assert!(report.exits.is_empty());
        assert!(report.settlements.is_empty());
    }
}

#[test]
fn scenario_e_released_hold_resets_progress() {
    let mut arena = arena_with_stake(dec!(8.00));
    let worm_id = arena.join_player(Uuid::new_v4(), "hesitant".into()).unwrap();

    // hold for half the threshold, then release
    arena.set_exit_hold(worm_id, true);
    for _ in 0..arena.rules.exit_hold_ticks / 2 {
        let report = arena.tick();
        assert!(report.exits.is_empty());
    }
    arena.set_exit_hold(worm_id, false);
    assert_eq!(arena.worms[&worm_id].lifecycle, Lifecycle::Alive);

    // a new hold starts from zero: half the threshold is again not enough
    arena.set_exit_hold(worm_id, true);
    for _ in 0..arena.rules.exit_hold_ticks / 2 {
        let report = arena.tick();
        assert!(report.exits.is_empty());
    }
    assert!(arena.worms.contains_key(&worm_id));
}

#[test]
fn settlement_is_idempotent_per_worm() {
    let mut arena = arena_with_stake(dec!(2.00));
    let worm_id = arena.join_player(Uuid::new_v4(), "once".into()).unwrap();

    assert!(arena.forfeit(worm_id).is_some());
    assert!(arena.forfeit(worm_id).is_none());
}

#[test]
fn heading_change_never_exceeds_turn_rate() {
    let mut arena = arena_with_stake(dec!(1.00));
    let worm_id = arena.join_player(Uuid::new_v4(), "twitchy".into()).unwrap();

    let mut rng_angle = 0.3_f64;
    for _ in 0..200 {
        // adversarial steering: large swings every tick
        rng_angle = physics::normalize_angle(rng_angle * -3.1 + 1.7);
        arena.steer(worm_id, rng_angle);

        let before = arena.worms[&worm_id].heading;
        arena.tick();
        let after = arena.worms[&worm_id].heading;

        let delta = physics::angle_delta(before, after).abs();
        assert!(
            delta <= arena.rules.turn_rate + 1e-9,
            "turn of {} exceeded bound {}",
            delta,
            arena.rules.turn_rate
        );
    }
}

#[test]
fn worm_value_never_negative_under_boost() {
    let mut rules = quiet_rules();
    // shed every tick to stress the boost burn
    rules.boost_shed_rate = 1.0;
    let mut arena = Arena::new(Value::new(dec!(0.10)).unwrap(), rules);
    let worm_id = arena.join_player(Uuid::new_v4(), "burner".into()).unwrap();

    arena.set_boost(worm_id, true);
    for _ in 0..50 {
        arena.tick();
        let worm = &arena.worms[&worm_id];
        assert!(worm.value.get() >= Decimal::ZERO);
        // boosting always leaves the minimum viable body
        assert!(worm.segments.len() >= arena.rules.min_segments);
    }
}
