//! Arena configuration: world constants and the tunable ruleset

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// WebSocket server port
pub const SERVER_PORT: u16 = 8080;

/// Broadcast channel capacity (per arena)
pub const BROADCAST_CAPACITY: usize = 64;

/// Arena command queue capacity
pub const COMMAND_CAPACITY: usize = 256;

/// Settlement ledger file path
pub const SETTLEMENT_LOG_FILE: &str = "data/settlements.jsonl";

/// Opening balance granted to unknown accounts by the in-memory wallet.
/// A production deployment replaces the wallet with a real service and
/// this never applies.
pub const DEMO_OPENING_BALANCE: Decimal = dec!(100);

/// Worm colors assigned at spawn (hex format)
pub const WORM_COLORS: &[&str] = &[
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7",
    "#DDA0DD", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E9",
    "#F8B500", "#00CED1", "#FF69B4", "#32CD32", "#FF4500",
];

/// Display names for house bots
pub const BOT_NAMES: &[&str] = &[
    "SlitherKing", "VenomBite", "CoilMaster", "ScaleHunter", "FangDanger",
    "NightCrawler", "ToxicTail", "ShadowStrike", "DeathCoil", "VipersNest",
    "CryptoSnake", "DiamondScale", "GoldFang", "SilverSlither", "PlatinumCoil",
    "ApexPredator", "AlphaWorm", "BetaBite", "GammaGlide", "DeltaDash",
    "SolanaSlayer", "BlockChainBite", "Web3Worm", "NFTNibbler", "DeFiDanger",
];

// =============================================================================
// Anti-cheat / Rate Limiting
// =============================================================================

/// Maximum steering/boost intents per second per connection
pub const MAX_INTENTS_PER_SECOND: u32 = 60;

/// Time window for rate limiting (in milliseconds)
pub const INTENT_WINDOW_MS: u64 = 1000;

/// Number of throttled intents before a connection is kicked
pub const MAX_RATE_VIOLATIONS: u32 = 20;

/// One ruleset per arena. All game-variant knobs live here so there is a
/// single engine instead of forked loops with drifting constants.
#[derive(Debug, Clone)]
pub struct Rules {
    // World geometry
    pub world_size: f64,
    pub spawn_margin: f64,
    pub wall_margin: f64,
    pub bot_wall_margin: f64,
    pub worm_radius: f64,

    // Kinematics (per tick)
    pub base_speed: f64,
    pub boost_speed: f64,
    pub turn_rate: f64,
    pub bot_turn_rate: f64,
    pub tick_rate: u64,

    // Body
    pub spawn_segments: usize,
    pub min_segments: usize,
    pub segment_spacing: f64,
    pub head_exclusion: usize,
    pub self_collision_lethal: bool,

    // Boost economics
    pub boost_shed_rate: f64,
    pub boost_shed_value_fraction: Decimal,

    // Food economics
    pub food_target: usize,
    pub food_value: Decimal,
    pub gold_food_value: Decimal,
    pub gold_food_probability: f64,
    pub food_respawn_chance: f64,

    // Settlement
    pub fee_rate: Decimal,
    pub kill_drop_multiplier: Decimal,
    pub forfeit_drop_multiplier: Decimal,
    pub death_drop_stride: usize,
    pub exit_hold_ticks: u64,

    // Population
    pub max_players: usize,
    pub bot_target: usize,
    pub bot_detection_radius: f64,
    pub bot_chase_radius: f64,
    pub bot_chase_chance: f64,
    pub bot_wander_chance: f64,
    pub bot_boost_chance: f64,
    pub bot_chase_size_ratio: f64,

    // Chat
    pub chat_max_len: usize,
}

impl Rules {
    /// Duration of one simulation tick
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(1000 / self.tick_rate)
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            world_size: 4000.0,
            spawn_margin: 200.0,
            wall_margin: 50.0,
            bot_wall_margin: 100.0,
            worm_radius: 12.0,

            base_speed: 3.0,
            boost_speed: 6.0,
            turn_rate: 0.25,
            bot_turn_rate: 0.15,
            tick_rate: 30,

            spawn_segments: 15,
            min_segments: 10,
            segment_spacing: 8.0,
            head_exclusion: 5,
            self_collision_lethal: false,

            boost_shed_rate: 0.02,
            boost_shed_value_fraction: dec!(0.5),

            food_target: 500,
            food_value: dec!(0.01),
            gold_food_value: dec!(0.05),
            gold_food_probability: 0.1,
            food_respawn_chance: 0.3,

            fee_rate: dec!(0.10),
            kill_drop_multiplier: dec!(0.3),
            forfeit_drop_multiplier: dec!(2.7),
            death_drop_stride: 3,
            exit_hold_ticks: 90,

            max_players: 50,
            bot_target: 25,
            bot_detection_radius: 500.0,
            bot_chase_radius: 300.0,
            bot_chase_chance: 0.01,
            bot_wander_chance: 0.02,
            bot_boost_chance: 0.05,
            bot_chase_size_ratio: 0.7,

            chat_max_len: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_sane() {
        let rules = Rules::default();
        assert!(rules.boost_speed > rules.base_speed);
        assert!(rules.fee_rate > Decimal::ZERO && rules.fee_rate < Decimal::ONE);
        assert!(rules.spawn_segments >= rules.min_segments);
        assert!(rules.spawn_margin >= rules.wall_margin);
    }

    #[test]
    fn test_tick_duration() {
        let rules = Rules::default();
        assert_eq!(rules.tick_duration(), Duration::from_millis(33));
    }
}
