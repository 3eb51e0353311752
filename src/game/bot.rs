//! Bot steering heuristic
//!
//! Bots seek the nearest food within a detection radius, occasionally
//! switch to chasing a strictly smaller worm, wander at a low fixed
//! probability, and deflect off the arena walls. All decisions mutate only
//! the bot's own desired heading and boost flag; movement itself goes
//! through the same [`Worm::advance`] path as players.

use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};

use rand::Rng;
use uuid::Uuid;

use crate::config::Rules;
use crate::game::food::Food;
use crate::game::physics::{self, Point};
use crate::game::worm::Worm;

/// Read-only view of another live worm, snapshotted before steering
#[derive(Debug, Clone, Copy)]
pub struct WormSighting {
    pub id: Uuid,
    pub head: Point,
    pub segment_count: usize,
}

/// Pick the bot's desired heading and boost flag for this tick
pub fn steer(
    worm: &mut Worm,
    food: &BTreeMap<Uuid, Food>,
    others: &[WormSighting],
    rules: &Rules,
    rng: &mut impl Rng,
) {
    let head = worm.head();

    // Nearest food by Euclidean distance, first-found wins ties
    let mut nearest: Option<(&Food, f64)> = None;
    for item in food.values() {
        let dist = head.distance_to(&item.position);
        if nearest.map_or(true, |(_, best)| dist < best) {
            nearest = Some((item, dist));
        }
    }

    // Occasionally lock onto a strictly smaller worm nearby
    if rng.gen_bool(rules.bot_chase_chance) {
        for other in others {
            if other.id == worm.id {
                continue;
            }
            let small_enough = (other.segment_count as f64)
                < worm.segments.len() as f64 * rules.bot_chase_size_ratio;
            if small_enough && head.distance_to(&other.head) < rules.bot_chase_radius {
                worm.steer(head.angle_to(&other.head));
                break;
            }
        }
    }

    match nearest {
        Some((item, dist)) if dist < rules.bot_detection_radius => {
            worm.steer(head.angle_to(&item.position));
        }
        _ => {
            if rng.gen_bool(rules.bot_wander_chance) {
                worm.steer(rng.gen_range(0.0..TAU));
            }
        }
    }

    worm.boosting =
        rng.gen_bool(rules.bot_boost_chance) && worm.can_boost(rules.min_segments);

    deflect_at_walls(worm, rules);
}

/// Reflect the heading when the head is inside the wall margin, so bots
/// turn back into the arena instead of grinding along the clamp.
fn deflect_at_walls(worm: &mut Worm, rules: &Rules) {
    let head = worm.head();
    let margin = rules.bot_wall_margin;
    let mut heading = worm.heading;
    let mut deflected = false;

    if head.x < margin || head.x > rules.world_size - margin {
        heading = PI - heading;
        deflected = true;
    }
    if head.y < margin || head.y > rules.world_size - margin {
        heading = -heading;
        deflected = true;
    }
    if deflected {
        worm.heading = physics::normalize_angle(heading);
        worm.steer(heading);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::Value;
    use rust_decimal_macros::dec;

    fn bot_at(x: f64, y: f64) -> Worm {
        Worm::spawn(
            None,
            "SlitherKing".into(),
            "#FF6B6B".into(),
            Point::new(x, y),
            0.0,
            Value::new(dec!(1)).unwrap(),
            12,
            8.0,
        )
    }

    #[test]
    fn test_seeks_nearest_food() {
        let rules = Rules::default();
        let mut rng = rand::thread_rng();
        let mut bot = bot_at(2000.0, 2000.0);

        let mut food = BTreeMap::new();
        let near = Food::drop_at(
            Point::new(2100.0, 2000.0),
            Value::ZERO,
            "#FFFFFF".into(),
        );
        let far = Food::drop_at(
            Point::new(2400.0, 2000.0),
            Value::ZERO,
            "#FFFFFF".into(),
        );
        food.insert(near.id, near);
        food.insert(far.id, far);

        steer(&mut bot, &food, &[], &rules, &mut rng);
        // straight toward the near item at +x
        assert!(bot.desired_heading.abs() < 1e-9);
    }

    #[test]
    fn test_ignores_food_outside_detection_radius() {
        let mut rules = Rules::default();
        rules.bot_wander_chance = 0.0;
        let mut rng = rand::thread_rng();
        let mut bot = bot_at(2000.0, 2000.0);
        bot.steer(1.0);

        let mut food = BTreeMap::new();
        let distant = Food::drop_at(
            Point::new(3000.0, 2000.0),
            Value::ZERO,
            "#FFFFFF".into(),
        );
        food.insert(distant.id, distant);

        steer(&mut bot, &food, &[], &rules, &mut rng);
        // nothing in range, no wander roll: heading intent unchanged
        assert!((bot.desired_heading - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_wall_deflection() {
        let rules = Rules::default();
        let mut rng = rand::thread_rng();
        // heading straight at the left wall from inside the margin
        let mut bot = bot_at(60.0, 2000.0);
        bot.heading = PI;
        bot.desired_heading = PI;

        steer(&mut bot, &BTreeMap::new(), &[], &rules, &mut rng);
        // reflected back toward +x
        assert!(bot.heading.cos() > 0.0);
    }
}
