//! Staked worm arena server
//!
//! A real-time multiplayer "worm battle royale" where players stake money,
//! grow by consuming food and other worms, and cash out through a held
//! safe-exit, minus a platform fee. The server simulation is the sole
//! authority over positions, growth and value; clients send intents only.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod game;
pub mod protocol;
pub mod rate_limiter;
pub mod settlement;
pub mod state;
pub mod wallet;
pub mod ws;
