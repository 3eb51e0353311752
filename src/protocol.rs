//! Protocol messages for WebSocket communication
//!
//! Clients send intents only: desired heading, boost and exit-hold
//! toggles, join requests, chat. The server simulation is the sole
//! authority for positions, growth and value; no client-supplied state is
//! ever written back. Monetary fields ride as exact decimal strings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::physics::Point;
use crate::settlement::Value;
use crate::wallet::AccountId;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Stake and enter an arena. Must be the first message on a connection.
    Join {
        account_id: AccountId,
        name: String,
        stake: Decimal,
    },
    /// Desired heading in radians; the server applies the turn-rate bound
    Steer { heading: f64 },
    /// Boost on/off
    Boost { on: bool },
    /// Exit-hold start/stop
    ExitHold { on: bool },
    /// Arena-scoped chat
    Chat { text: String },
    /// Keep-alive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join confirmed; the stake has been debited
    Joined {
        worm_id: Uuid,
        arena_id: Uuid,
        world_size: f64,
        stake: Value,
    },
    /// Authoritative full-state frame, once per tick
    State {
        tick: u64,
        worms: Vec<WormFrame>,
        food: Vec<FoodFrame>,
        leaderboard: Vec<LeaderboardEntry>,
    },
    /// A worm died; its owner forfeits unless a killer cashed it in
    Death {
        worm_id: Uuid,
        killer: Option<String>,
        value_lost: Value,
    },
    /// An exit hold completed and the wallet credit is on its way
    ExitSettled {
        worm_id: Uuid,
        gross: Value,
        fee: Value,
        net: Value,
    },
    /// Relayed chat line
    Chat {
        worm_id: Uuid,
        name: String,
        text: String,
    },
    /// A player disconnected
    PlayerLeft { worm_id: Uuid },
    /// Typed rejection; no game state changed
    Error { message: String },
}

impl ServerMessage {
    /// Serialize to a JSON string for the wire
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// One worm in a state frame
#[derive(Debug, Clone, Serialize)]
pub struct WormFrame {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub value: Value,
    pub boosting: bool,
    pub exiting: bool,
    pub segments: Vec<Point>,
}

/// One food item in a state frame
#[derive(Debug, Clone, Serialize)]
pub struct FoodFrame {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub value: Value,
    pub gold: bool,
    pub size: f64,
    pub color: String,
}

/// Leaderboard row, ordered by live value
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_join() {
        let json = r#"{"type":"join","account_id":"f3b5e2a0-6a3f-4a6e-9d8a-1c2b3d4e5f60","name":"player","stake":"5.00"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Join { name, stake, .. } => {
                assert_eq!(name, "player");
                assert_eq!(stake, dec!(5.00));
            }
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_intents() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"steer","heading":1.57}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Steer { .. }));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"exit_hold","on":true}"#).unwrap();
        assert!(matches!(msg, ClientMessage::ExitHold { on: true }));
    }

    #[test]
    fn test_server_message_json() {
        let msg = ServerMessage::Death {
            worm_id: Uuid::nil(),
            killer: None,
            value_lost: Value::new(dec!(3)).unwrap(),
        };
        let json = msg.to_json();
        assert!(json.contains("\"type\":\"death\""));
        assert!(json.contains("\"value_lost\":\"3\""));
    }
}
