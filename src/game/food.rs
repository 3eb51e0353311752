//! Food items: ambient spawns, gold rolls, death drops, boost crumbs

use rand::Rng;
use uuid::Uuid;

use crate::config::Rules;
use crate::game::physics::Point;
use crate::settlement::Value;

const GOLD_COLOR: &str = "#FFD700";
const DROP_SIZE: f64 = 10.0;
const CRUMB_SIZE: f64 = 8.0;

/// A consumable item on the arena floor
#[derive(Debug, Clone)]
pub struct Food {
    pub id: Uuid,
    pub position: Point,
    pub value: Value,
    pub gold: bool,
    pub size: f64,
    pub color: String,
}

impl Food {
    /// Ambient spawn at a random position. The gold roll happens here, at
    /// spawn time, never at consumption time.
    pub fn spawn(rules: &Rules, rng: &mut impl Rng) -> Self {
        let gold = rng.gen_bool(rules.gold_food_probability);
        let value = if gold {
            rules.gold_food_value
        } else {
            rules.food_value
        };
        Self {
            id: Uuid::new_v4(),
            position: Point {
                x: rng.gen_range(0.0..rules.world_size),
                y: rng.gen_range(0.0..rules.world_size),
            },
            value: Value::new(value).unwrap_or(Value::ZERO),
            gold,
            size: if gold { 12.0 } else { 8.0 },
            color: if gold {
                GOLD_COLOR.to_string()
            } else {
                random_hue(rng)
            },
        }
    }

    /// A segment of a dead worm converted back into the world. Carries the
    /// dead worm's color and never rolls gold.
    pub fn drop_at(position: Point, value: Value, color: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            value,
            gold: false,
            size: DROP_SIZE,
            color,
        }
    }

    /// A tail segment burned off while boosting
    pub fn crumb(position: Point, value: Value, rng: &mut impl Rng) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            value,
            gold: false,
            size: CRUMB_SIZE,
            color: random_hue(rng),
        }
    }
}

fn random_hue(rng: &mut impl Rng) -> String {
    format!("hsl({}, 70%, 60%)", rng.gen_range(0..360))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_gold_roll_at_spawn() {
        let mut rules = Rules::default();
        let mut rng = rand::thread_rng();

        rules.gold_food_probability = 1.0;
        let food = Food::spawn(&rules, &mut rng);
        assert!(food.gold);
        assert_eq!(food.value.get(), dec!(0.05));
        assert_eq!(food.color, GOLD_COLOR);

        rules.gold_food_probability = 0.0;
        let food = Food::spawn(&rules, &mut rng);
        assert!(!food.gold);
        assert_eq!(food.value.get(), dec!(0.01));
    }

    #[test]
    fn test_spawn_inside_world() {
        let rules = Rules::default();
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let food = Food::spawn(&rules, &mut rng);
            assert!(food.position.x >= 0.0 && food.position.x < rules.world_size);
            assert!(food.position.y >= 0.0 && food.position.y < rules.world_size);
        }
    }

    #[test]
    fn test_drop_never_gold() {
        let food = Food::drop_at(
            Point::new(1.0, 2.0),
            Value::new(dec!(0.54)).unwrap(),
            "#FF6B6B".into(),
        );
        assert!(!food.gold);
        assert_eq!(food.color, "#FF6B6B");
        assert_eq!(food.value.get(), dec!(0.54));
    }
}
