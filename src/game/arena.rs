//! Arena: the single-writer state container for one stake tier
//!
//! An [`Arena`] owns every worm and food item in its world. It is only ever
//! mutated by the session task that owns it (see `game::session`), which
//! makes each per-tick phase sequential: movement, then food consumption,
//! then worm-vs-worm collisions, then settlements. In that order, a worm
//! that grew this tick collides with its updated body, and settlement
//! records append in the exact order collisions resolved.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::{Rules, BOT_NAMES, WORM_COLORS};
use crate::error::GameError;
use crate::game::bot::{self, WormSighting};
use crate::game::food::Food;
use crate::game::physics::Point;
use crate::game::worm::{Lifecycle, Worm};
use crate::protocol::{FoodFrame, LeaderboardEntry, ServerMessage, WormFrame};
use crate::settlement::{SettlementRecord, Value};
use crate::wallet::AccountId;

/// A worm died this tick
#[derive(Debug, Clone)]
pub struct DeathNotice {
    pub worm_id: Uuid,
    pub account_id: Option<AccountId>,
    /// Display name of the credited killer, if any
    pub killer: Option<String>,
    pub value_lost: Value,
}

/// A player completed an exit hold this tick
#[derive(Debug, Clone)]
pub struct ExitNotice {
    pub worm_id: Uuid,
    pub account_id: AccountId,
    pub gross: Value,
    pub fee: Value,
    pub net: Value,
}

/// Everything a tick produced beyond the state itself
#[derive(Debug, Default)]
pub struct TickReport {
    pub settlements: Vec<SettlementRecord>,
    pub deaths: Vec<DeathNotice>,
    pub exits: Vec<ExitNotice>,
}

/// One bounded world instance at a fixed stake tier
pub struct Arena {
    pub id: Uuid,
    pub stake: Value,
    pub rules: Rules,
    pub worms: BTreeMap<Uuid, Worm>,
    pub food: BTreeMap<Uuid, Food>,
    pub tick: u64,
}

impl Arena {
    /// Create an arena with a full food population
    pub fn new(stake: Value, rules: Rules) -> Self {
        let mut arena = Self {
            id: Uuid::new_v4(),
            stake,
            rules,
            worms: BTreeMap::new(),
            food: BTreeMap::new(),
            tick: 0,
        };
        let mut rng = rand::thread_rng();
        while arena.food.len() < arena.rules.food_target {
            let item = Food::spawn(&arena.rules, &mut rng);
            arena.food.insert(item.id, item);
        }
        arena
    }

    /// Live human players
    pub fn player_count(&self) -> usize {
        self.worms
            .values()
            .filter(|w| !w.is_bot() && w.is_live())
            .count()
    }

    /// Live house bots
    pub fn live_bot_count(&self) -> usize {
        self.worms
            .values()
            .filter(|w| w.is_bot() && w.is_live())
            .count()
    }

    /// Spawn a player worm staked at this arena's tier. Initial value equals
    /// the stake; segment count is the fixed spawn length.
    pub fn join_player(
        &mut self,
        account_id: AccountId,
        name: String,
    ) -> Result<Uuid, GameError> {
        if self.player_count() >= self.rules.max_players {
            return Err(GameError::ArenaFull {
                max: self.rules.max_players,
            });
        }

        let mut rng = rand::thread_rng();
        let origin = self.clear_spawn_point(&mut rng);
        let heading = rng.gen_range(0.0..TAU);
        let color = WORM_COLORS[rng.gen_range(0..WORM_COLORS.len())].to_string();

        let worm = Worm::spawn(
            Some(account_id),
            name,
            color,
            origin,
            heading,
            self.stake,
            self.rules.spawn_segments,
            self.rules.segment_spacing,
        );
        let worm_id = worm.id;
        self.worms.insert(worm_id, worm);
        Ok(worm_id)
    }

    /// Spawn a house bot with a randomized value around the stake tier
    pub fn spawn_bot(&mut self) {
        let mut rng = rand::thread_rng();
        // value uniform in 0.5 ..= 2 * stake + 0.5, quantized to cents
        let pct = Decimal::from(rng.gen_range(0u32..=200));
        let value = (self.stake.get() * pct / dec!(100) + dec!(0.5)).round_dp(2);
        let value = Value::new(value).unwrap_or(Value::ZERO);

        let segment_count = (value.get() * dec!(2))
            .floor()
            .to_usize()
            .unwrap_or(0)
            .max(self.rules.min_segments);

        let origin = self.clear_spawn_point(&mut rng);
        let heading = rng.gen_range(0.0..TAU);
        let name = BOT_NAMES[rng.gen_range(0..BOT_NAMES.len())].to_string();
        let color = WORM_COLORS[rng.gen_range(0..WORM_COLORS.len())].to_string();

        let worm = Worm::spawn(
            None,
            name,
            color,
            origin,
            heading,
            value,
            segment_count,
            self.rules.segment_spacing,
        );
        self.worms.insert(worm.id, worm);
    }

    fn clear_spawn_point(&self, rng: &mut impl Rng) -> Point {
        Point {
            x: rng.gen_range(self.rules.spawn_margin..self.rules.world_size - self.rules.spawn_margin),
            y: rng.gen_range(self.rules.spawn_margin..self.rules.world_size - self.rules.spawn_margin),
        }
    }

    /// Apply a steering intent. Unknown or settled worms are stale-message
    /// no-ops, not errors.
    pub fn steer(&mut self, worm_id: Uuid, heading: f64) {
        match self.worms.get_mut(&worm_id) {
            Some(worm) if worm.is_live() => worm.steer(heading),
            _ => debug!("steer intent for absent worm {}", worm_id),
        }
    }

    /// Apply a boost intent; silently capped by the length floor
    pub fn set_boost(&mut self, worm_id: Uuid, on: bool) {
        if let Some(worm) = self.worms.get_mut(&worm_id) {
            if worm.is_live() {
                worm.boosting = on && worm.can_boost(self.rules.min_segments);
            }
        }
    }

    /// Start or release an exit hold. Releasing resets progress to zero.
    pub fn set_exit_hold(&mut self, worm_id: Uuid, on: bool) {
        let tick = self.tick;
        if let Some(worm) = self.worms.get_mut(&worm_id) {
            if worm.is_bot() {
                return;
            }
            if on {
                worm.begin_exit(tick);
            } else {
                worm.cancel_exit();
            }
        }
    }

    /// Forfeit a live worm (disconnect, or any death without a credited
    /// killer). Idempotent: a worm that already settled returns None.
    pub fn forfeit(&mut self, worm_id: Uuid) -> Option<(SettlementRecord, DeathNotice)> {
        self.settle_death(worm_id, None)
    }

    /// Advance the arena by one tick. Phases run in a fixed order; see the
    /// module docs.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut rng = rand::thread_rng();
        let mut report = TickReport::default();

        let ids: Vec<Uuid> = self.worms.keys().copied().collect();

        // Movement. Bots steer against a pre-move snapshot of live worms.
        let sightings: Vec<WormSighting> = self
            .worms
            .values()
            .filter(|w| w.is_live())
            .map(|w| WormSighting {
                id: w.id,
                head: w.head(),
                segment_count: w.segments.len(),
            })
            .collect();

        for id in &ids {
            let Some(worm) = self.worms.get_mut(id) else { continue };
            if !worm.is_live() {
                continue;
            }
            if worm.is_bot() {
                bot::steer(worm, &self.food, &sightings, &self.rules, &mut rng);
            }
            worm.advance(&self.rules);
        }

        // Boost burn: a statistical chance per tick of shedding the tail
        // segment into a food crumb, paid for out of the worm's own value.
        for id in &ids {
            let Some(worm) = self.worms.get_mut(id) else { continue };
            if !worm.is_live() {
                continue;
            }
            if worm.boosting && !worm.can_boost(self.rules.min_segments) {
                worm.boosting = false;
            }
            if worm.boosting && rng.gen_bool(self.rules.boost_shed_rate) {
                let segment_count = worm.segments.len();
                if let Some(position) = worm.shed_tail() {
                    let burned = worm
                        .value
                        .drop_share(segment_count, self.rules.boost_shed_value_fraction);
                    worm.value = worm.value.saturating_sub(burned);
                    let crumb = Food::crumb(position, burned, &mut rng);
                    self.food.insert(crumb.id, crumb);
                }
            }
        }

        // Food consumption, before worm-vs-worm resolution. Removing the
        // item from the map is the atomic gate: one winner per food id.
        for id in &ids {
            let Some(worm) = self.worms.get_mut(id) else { continue };
            if !worm.is_live() {
                continue;
            }
            let head = worm.head();
            let radius = self.rules.worm_radius;
            let eaten: Vec<Uuid> = self
                .food
                .values()
                .filter(|f| head.distance_to(&f.position) < radius + f.size)
                .map(|f| f.id)
                .collect();
            for food_id in eaten {
                if let Some(item) = self.food.remove(&food_id) {
                    worm.value = worm.value.saturating_add(item.value);
                    worm.grow_one();
                    worm.score += 1;
                }
            }
        }

        // Worm-vs-worm collisions against this tick's settled positions.
        for (victim, killer) in self.detect_collisions() {
            if let Some((record, notice)) = self.settle_death(victim, killer) {
                report.settlements.push(record);
                report.deaths.push(notice);
            }
        }

        // Exit holds that reached the threshold
        let matured: Vec<Uuid> = self
            .worms
            .values()
            .filter_map(|w| match w.lifecycle {
                Lifecycle::Exiting { since_tick }
                    if self.tick.saturating_sub(since_tick) >= self.rules.exit_hold_ticks =>
                {
                    Some(w.id)
                }
                _ => None,
            })
            .collect();
        for worm_id in matured {
            if let Some((record, notice)) = self.settle_exit(worm_id) {
                report.settlements.push(record);
                report.exits.push(notice);
            }
        }

        // Keep the arena target-rich
        while self.live_bot_count() < self.rules.bot_target {
            self.spawn_bot();
        }
        if self.food.len() < self.rules.food_target
            && rng.gen_bool(self.rules.food_respawn_chance)
        {
            let item = Food::spawn(&self.rules, &mut rng);
            self.food.insert(item.id, item);
        }

        report
    }

    /// Head-vs-body hits for every live worm, in deterministic id order.
    /// The first `head_exclusion` segments of the other worm are exempt so
    /// head-to-head grazing is not an instant mutual kill.
    fn detect_collisions(&self) -> Vec<(Uuid, Option<Uuid>)> {
        let live: Vec<&Worm> = self.worms.values().filter(|w| w.is_live()).collect();
        let lethal_range = self.rules.worm_radius * 2.0;
        // On a straight body, segments are one movement step apart; skip
        // everything still within collision range of the head.
        let self_exclusion = self
            .rules
            .head_exclusion
            .max((lethal_range / self.rules.base_speed).ceil() as usize + 1);

        let mut hits = Vec::new();
        'worms: for worm in &live {
            let head = worm.head();
            if self.rules.self_collision_lethal {
                for segment in worm.segments.iter().skip(self_exclusion) {
                    if head.distance_to(segment) < lethal_range {
                        hits.push((worm.id, None));
                        continue 'worms;
                    }
                }
            }
            for other in &live {
                if other.id == worm.id {
                    continue;
                }
                for segment in other.segments.iter().skip(self.rules.head_exclusion) {
                    if head.distance_to(segment) < lethal_range {
                        hits.push((worm.id, Some(other.id)));
                        continue 'worms;
                    }
                }
            }
        }
        hits
    }

    /// Kill and settle a worm in one step. The lifecycle gate makes this
    /// idempotent: a worm that is not live settles nothing.
    ///
    /// With a credited killer the victim's value moves to the killer net of
    /// the fee and a thin trail of food drops; without one, most of the
    /// value is redistributed as food and the rest is the house rake.
    fn settle_death(
        &mut self,
        victim_id: Uuid,
        killer_id: Option<Uuid>,
    ) -> Option<(SettlementRecord, DeathNotice)> {
        let stride = self.rules.death_drop_stride.max(1);
        let (victim_value, victim_account, victim_color, sampled, segment_count) = {
            let Some(victim) = self.worms.get_mut(&victim_id) else {
                debug!("death settlement for absent worm {} is a no-op", victim_id);
                return None;
            };
            if !victim.is_live() {
                return None;
            }
            victim.kill();
            victim.settle();
            let sampled: Vec<Point> =
                victim.segments.iter().step_by(stride).copied().collect();
            (
                victim.value,
                victim.account_id,
                victim.color.clone(),
                sampled,
                victim.segments.len(),
            )
        };
        self.worms.remove(&victim_id);

        let killer = killer_id
            .and_then(|id| self.worms.get_mut(&id))
            .filter(|k| k.is_live());

        let (record, killer_name, drop_multiplier) = match killer {
            Some(killer) => {
                let split = victim_value.split_fee(self.rules.fee_rate);
                killer.value = killer.value.saturating_add(split.net);
                killer.kills += 1;
                let record = SettlementRecord::Kill {
                    arena_id: self.id,
                    killer_worm: killer.id,
                    victim_worm: victim_id,
                    victim_value,
                    fee: split.fee,
                    reward: split.net,
                    timestamp: Utc::now(),
                };
                (
                    record,
                    Some(killer.name.clone()),
                    self.rules.kill_drop_multiplier,
                )
            }
            None => {
                let record = SettlementRecord::Forfeit {
                    arena_id: self.id,
                    account_id: victim_account,
                    worm_id: victim_id,
                    value: victim_value,
                    timestamp: Utc::now(),
                };
                (record, None, self.rules.forfeit_drop_multiplier)
            }
        };

        let share = victim_value.drop_share(segment_count, drop_multiplier);
        for position in sampled {
            let item = Food::drop_at(position, share, victim_color.clone());
            self.food.insert(item.id, item);
        }

        let notice = DeathNotice {
            worm_id: victim_id,
            account_id: victim_account,
            killer: killer_name,
            value_lost: victim_value,
        };
        Some((record, notice))
    }

    /// Finalize a matured exit hold: settle the fee split and remove the
    /// worm. Idempotent through the lifecycle gate.
    fn settle_exit(&mut self, worm_id: Uuid) -> Option<(SettlementRecord, ExitNotice)> {
        let (account_id, gross) = {
            let worm = self.worms.get_mut(&worm_id)?;
            if !matches!(worm.lifecycle, Lifecycle::Exiting { .. }) {
                return None;
            }
            let Some(account_id) = worm.account_id else {
                // bots cannot hold an exit; refuse rather than pay nowhere
                error!("exit settlement refused for bot worm {}", worm_id);
                return None;
            };
            worm.settle();
            (account_id, worm.value)
        };
        self.worms.remove(&worm_id);

        let split = gross.split_fee(self.rules.fee_rate);
        let record = SettlementRecord::Exit {
            arena_id: self.id,
            account_id,
            worm_id,
            gross,
            fee: split.fee,
            net: split.net,
            timestamp: Utc::now(),
        };
        let notice = ExitNotice {
            worm_id,
            account_id,
            gross,
            fee: split.fee,
            net: split.net,
        };
        Some((record, notice))
    }

    /// Full-state frame for broadcast. Lagging subscribers recover from the
    /// next frame, so dropped deltas are harmless.
    pub fn snapshot(&self) -> ServerMessage {
        let worms: Vec<WormFrame> = self
            .worms
            .values()
            .filter(|w| w.is_live())
            .map(|w| WormFrame {
                id: w.id,
                name: w.name.clone(),
                color: w.color.clone(),
                value: w.value,
                boosting: w.boosting,
                exiting: matches!(w.lifecycle, Lifecycle::Exiting { .. }),
                segments: w.segments.iter().copied().collect(),
            })
            .collect();

        let food: Vec<FoodFrame> = self
            .food
            .values()
            .map(|f| FoodFrame {
                id: f.id,
                x: f.position.x,
                y: f.position.y,
                value: f.value,
                gold: f.gold,
                size: f.size,
                color: f.color.clone(),
            })
            .collect();

        let mut leaderboard: Vec<LeaderboardEntry> = self
            .worms
            .values()
            .filter(|w| w.is_live())
            .map(|w| LeaderboardEntry {
                name: w.name.clone(),
                value: w.value,
            })
            .collect();
        leaderboard.sort_by(|a, b| b.value.cmp(&a.value));
        leaderboard.truncate(10);

        ServerMessage::State {
            tick: self.tick,
            worms,
            food,
            leaderboard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rules with the random background (bots, ambient food) switched off
    /// so economic outcomes are exact.
    fn quiet_rules() -> Rules {
        Rules {
            bot_target: 0,
            food_target: 0,
            food_respawn_chance: 0.0,
            boost_shed_rate: 0.0,
            ..Rules::default()
        }
    }

    fn quiet_arena(stake: Decimal) -> Arena {
        Arena::new(Value::new(stake).unwrap(), quiet_rules())
    }

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
    fn test_join_spawns_with_clearance() {
        let mut arena = quiet_arena(dec!(5));
        let worm_id = arena.join_player(Uuid::new_v4(), "player".into()).unwrap();
        let worm = &arena.worms[&worm_id];
        assert_eq!(worm.segments.len(), arena.rules.spawn_segments);
        assert_eq!(worm.value.get(), dec!(5));
        let head = worm.head();
        assert!(head.x >= arena.rules.spawn_margin);
        assert!(head.x <= arena.rules.world_size - arena.rules.spawn_margin);
    }

    #[test]
    fn test_capacity_rejection() {
        let mut rules = quiet_rules();
        rules.max_players = 1;
        let mut arena = Arena::new(Value::new(dec!(1)).unwrap(), rules);
        arena.join_player(Uuid::new_v4(), "first".into()).unwrap();
        let err = arena
            .join_player(Uuid::new_v4(), "second".into())
            .unwrap_err();
        assert_eq!(err, GameError::ArenaFull { max: 1 });
    }

    #[test]
    fn test_food_consumed_at_most_once() {
        let mut arena = quiet_arena(dec!(5));
        let a = arena.join_player(Uuid::new_v4(), "a".into()).unwrap();
        let b = arena.join_player(Uuid::new_v4(), "b".into()).unwrap();
        // both heads converge on the same food item this tick, far apart
        // from each other's bodies
        place_straight(&mut arena, a, Point::new(1000.0, 1000.0), 0.0);
        place_straight(&mut arena, b, Point::new(1006.0, 1000.0), std::f64::consts::PI);

        let item = Food::drop_at(
            Point::new(1003.0, 1000.0),
            Value::new(dec!(0.01)).unwrap(),
            "#FFFFFF".into(),
        );
        arena.food.insert(item.id, item);

        arena.tick();

        let total: Decimal = arena
            .worms
            .values()
            .map(|w| w.value.get())
            .sum();
        // exactly one of them was credited
        assert_eq!(total, dec!(10.01));
        assert!(arena.food.is_empty());
    }

    #[test]
    fn test_kill_credits_killer_and_drops_food() {
        let mut arena = quiet_arena(dec!(3));
        let attacker = arena.join_player(Uuid::new_v4(), "attacker".into()).unwrap();
        let wall = arena.join_player(Uuid::new_v4(), "wall".into()).unwrap();

        // wall lies vertically; attacker's head runs into its mid-body
        place_straight(&mut arena, wall, Point::new(2000.0, 2000.0), std::f64::consts::FRAC_PI_2);
        let target = arena.worms[&wall].segments[8];
        place_straight(
            &mut arena,
            attacker,
            Point::new(target.x - arena.rules.base_speed, target.y),
            0.0,
        );

        let report = arena.tick();

        assert_eq!(report.deaths.len(), 1);
        let death = &report.deaths[0];
        assert_eq!(death.worm_id, attacker);
        assert_eq!(death.killer.as_deref(), Some("wall"));
        assert_eq!(death.value_lost.get(), dec!(3));

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
                assert_eq!(fee.get() + reward.get(), victim_value.get());
            }
            other => panic!("expected kill record, got {:?}", other),
        }

        assert_eq!(arena.worms[&wall].value.get(), dec!(5.70));
        assert_eq!(arena.worms[&wall].kills, 1);
        assert!(!arena.worms.contains_key(&attacker));
        // a thin trail of the victim's body came back as food
        assert!(!arena.food.is_empty());
    }

    #[test]
    fn test_forfeit_redistributes_less_than_value() {
        let mut arena = quiet_arena(dec!(3));
        let worm_id = arena.join_player(Uuid::new_v4(), "loner".into()).unwrap();

        let (record, notice) = arena.forfeit(worm_id).unwrap();
        assert!(matches!(record, SettlementRecord::Forfeit { .. }));
        assert!(notice.killer.is_none());

        let dropped: Decimal = arena.food.values().map(|f| f.value.get()).sum();
        assert!(dropped > Decimal::ZERO);
        // the rake-equivalent is destroyed, never credited anywhere
        assert!(dropped < dec!(3));
    }

    #[test]
    fn test_settlement_is_idempotent() {
        let mut arena = quiet_arena(dec!(3));
        let worm_id = arena.join_player(Uuid::new_v4(), "loner".into()).unwrap();

        assert!(arena.forfeit(worm_id).is_some());
        assert!(arena.forfeit(worm_id).is_none());
        // a later stale exit attempt settles nothing either
        assert!(arena.settle_exit(worm_id).is_none());
    }

    #[test]
    fn test_self_collision_toggle() {
        let mut rules = quiet_rules();
        rules.self_collision_lethal = true;
        let mut arena = Arena::new(Value::new(dec!(1)).unwrap(), rules);
        let worm_id = arena.join_player(Uuid::new_v4(), "coil".into()).unwrap();

        // fold the body back onto the head, past the exclusion window
        {
            let worm = arena.worms.get_mut(&worm_id).unwrap();
            let head = worm.head();
            let len = worm.segments.len();
            worm.segments[len - 1] = head;
        }
        let hits = arena.detect_collisions();
        assert_eq!(hits, vec![(worm_id, None)]);

        // the default ruleset ignores the same geometry
        arena.rules.self_collision_lethal = false;
        assert!(arena.detect_collisions().is_empty());
    }

    #[test]
    fn test_bot_population_is_maintained() {
        let mut rules = quiet_rules();
        rules.bot_target = 5;
        let mut arena = Arena::new(Value::new(dec!(1)).unwrap(), rules);
        arena.tick();
        assert_eq!(arena.live_bot_count(), 5);
        assert!(arena.worms.values().all(|w| w.is_bot()));
    }
}
