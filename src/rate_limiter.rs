//! Intent rate limiting
//!
//! Steering arrives continuously from pointer movement, so the ceiling is
//! generous; a client pushing past it is a bot script or a flood, and
//! repeat offenders get kicked.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::{INTENT_WINDOW_MS, MAX_INTENTS_PER_SECOND, MAX_RATE_VIOLATIONS};

/// Outcome of admitting one intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentDecision {
    /// Within budget; process it
    Allow,
    /// Over budget; drop this intent
    Throttle,
    /// Sustained abuse; disconnect the client
    Kick,
}

/// Sliding-window counter for one connection
#[derive(Debug)]
struct ConnectionWindow {
    intents: VecDeque<Instant>,
    violations: u32,
}

impl ConnectionWindow {
    fn new() -> Self {
        Self {
            intents: VecDeque::with_capacity(MAX_INTENTS_PER_SECOND as usize + 8),
            violations: 0,
        }
    }

    fn admit(&mut self) -> IntentDecision {
        let now = Instant::now();
        let window_start = now - Duration::from_millis(INTENT_WINDOW_MS);

        while let Some(front) = self.intents.front() {
            if *front < window_start {
                self.intents.pop_front();
            } else {
                break;
            }
        }

        if self.intents.len() < MAX_INTENTS_PER_SECOND as usize {
            self.intents.push_back(now);
            IntentDecision::Allow
        } else {
            self.violations += 1;
            if self.violations >= MAX_RATE_VIOLATIONS {
                IntentDecision::Kick
            } else {
                IntentDecision::Throttle
            }
        }
    }
}

/// Rate limiter over all live connections
pub struct RateLimiter {
    connections: DashMap<Uuid, ConnectionWindow>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn register(&self, connection_id: Uuid) {
        self.connections.insert(connection_id, ConnectionWindow::new());
    }

    pub fn unregister(&self, connection_id: &Uuid) {
        self.connections.remove(connection_id);
    }

    /// Admit one intent from a connection
    pub fn admit(&self, connection_id: &Uuid) -> IntentDecision {
        match self.connections.get_mut(connection_id) {
            Some(mut window) => window.admit(),
            // unknown connection: allow but don't track
            None => IntentDecision::Allow,
        }
    }

    pub fn violations(&self, connection_id: &Uuid) -> u32 {
        self.connections
            .get(connection_id)
            .map(|w| w.violations)
            .unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_normal_usage() {
        let mut window = ConnectionWindow::new();
        for _ in 0..MAX_INTENTS_PER_SECOND {
            assert_eq!(window.admit(), IntentDecision::Allow);
        }
    }

    #[test]
    fn test_throttles_excess() {
        let mut window = ConnectionWindow::new();
        for _ in 0..MAX_INTENTS_PER_SECOND {
            window.admit();
        }
        assert_eq!(window.admit(), IntentDecision::Throttle);
        assert_eq!(window.violations, 1);
    }

    #[test]
    fn test_kicks_after_sustained_abuse() {
        let mut window = ConnectionWindow::new();
        for _ in 0..MAX_INTENTS_PER_SECOND {
            window.admit();
        }
        for i in 1..=MAX_RATE_VIOLATIONS {
            let decision = window.admit();
            if i >= MAX_RATE_VIOLATIONS {
                assert_eq!(decision, IntentDecision::Kick);
            } else {
                assert_eq!(decision, IntentDecision::Throttle);
            }
        }
    }

    #[test]
    fn test_unknown_connection_allowed() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.admit(&Uuid::new_v4()), IntentDecision::Allow);
    }
}
