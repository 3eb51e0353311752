//! Application state shared across all handlers

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::config::Rules;
use crate::game::session::{self, ArenaHandle};
use crate::rate_limiter::RateLimiter;
use crate::settlement::{SettlementLog, Value};
use crate::wallet::WalletService;

/// Shared application state
pub struct AppState {
    /// One running arena per stake tier, created on demand
    arenas: DashMap<Decimal, ArenaHandle>,
    /// External wallet boundary
    pub wallet: Arc<dyn WalletService>,
    /// Durable settlement ledger
    pub settlements: SettlementLog,
    /// Anti-cheat intent limiter
    pub rate_limiter: RateLimiter,
    rules: Rules,
}

impl AppState {
    pub fn new(
        wallet: Arc<dyn WalletService>,
        settlements: SettlementLog,
        rules: Rules,
    ) -> Self {
        Self {
            arenas: DashMap::new(),
            wallet,
            settlements,
            rate_limiter: RateLimiter::new(),
            rules,
        }
    }

    /// The arena for a stake tier, spawning its task on first use. The
    /// dashmap entry gates creation, so concurrent joins at a new tier
    /// still end up in one arena.
    pub fn arena_for_stake(&self, stake: Value) -> ArenaHandle {
        let stake = stake.normalized();
        self.arenas
            .entry(stake.get())
            .or_insert_with(|| {
                session::spawn_arena(
                    stake,
                    self.rules.clone(),
                    self.wallet.clone(),
                    self.settlements.clone(),
                )
            })
            .clone()
    }

    /// Number of running arenas
    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }
}
