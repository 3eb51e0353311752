//! Worm entity: segment chain, kinematics, lifecycle

use std::collections::VecDeque;

use uuid::Uuid;

use crate::config::Rules;
use crate::game::physics::{self, Point};
use crate::settlement::Value;
use crate::wallet::AccountId;

/// Per-worm settlement state machine.
///
/// `Alive → Exiting → Settled` is the safe-exit path, `Alive/Exiting →
/// Dead → Settled` the death path. `Settled` is terminal; every settlement
/// operation gates on the current state so a worm can be killed, exited or
/// forfeited at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Alive,
    Exiting { since_tick: u64 },
    Dead,
    Settled,
}

impl Lifecycle {
    pub fn label(&self) -> &'static str {
        match self {
            Lifecycle::Alive => "alive",
            Lifecycle::Exiting { .. } => "exiting",
            Lifecycle::Dead => "dead",
            Lifecycle::Settled => "settled",
        }
    }
}

/// A player- or bot-controlled worm
#[derive(Debug, Clone)]
pub struct Worm {
    pub id: Uuid,
    /// None for house bots
    pub account_id: Option<AccountId>,
    pub name: String,
    pub color: String,
    /// Head at the front, tail at the back
    pub segments: VecDeque<Point>,
    pub heading: f64,
    pub desired_heading: f64,
    pub boosting: bool,
    /// Money at risk; grows with food and kills
    pub value: Value,
    /// Food items eaten
    pub score: u32,
    pub kills: u32,
    pub lifecycle: Lifecycle,
}

impl Worm {
    /// Spawn a worm with `segment_count` segments trailing behind the head
    /// opposite its heading.
    pub fn spawn(
        account_id: Option<AccountId>,
        name: String,
        color: String,
        origin: Point,
        heading: f64,
        value: Value,
        segment_count: usize,
        spacing: f64,
    ) -> Self {
        let heading = physics::normalize_angle(heading);
        let mut segments = VecDeque::with_capacity(segment_count.max(1));
        for i in 0..segment_count.max(1) {
            segments.push_back(Point {
                x: origin.x - heading.cos() * spacing * i as f64,
                y: origin.y - heading.sin() * spacing * i as f64,
            });
        }

        Self {
            id: Uuid::new_v4(),
            account_id,
            name,
            color,
            segments,
            heading,
            desired_heading: heading,
            boosting: false,
            value,
            score: 0,
            kills: 0,
            lifecycle: Lifecycle::Alive,
        }
    }

    pub fn head(&self) -> Point {
        // Invariant: a worm always has at least one segment
        *self.segments.front().expect("worm has a head")
    }

    pub fn is_bot(&self) -> bool {
        self.account_id.is_none()
    }

    /// Still moving around the arena (alive or mid exit-hold)
    pub fn is_live(&self) -> bool {
        matches!(
            self.lifecycle,
            Lifecycle::Alive | Lifecycle::Exiting { .. }
        )
    }

    /// Record a new desired heading; the actual heading converges under the
    /// turn-rate bound in [`Worm::advance`].
    pub fn steer(&mut self, heading: f64) {
        self.desired_heading = physics::normalize_angle(heading);
    }

    /// Boosting is only possible above the minimum length floor
    pub fn can_boost(&self, min_segments: usize) -> bool {
        self.segments.len() > min_segments
    }

    /// Advance one tick: bounded turn toward the desired heading, move the
    /// head at the current speed tier, propagate the body by the rope rule,
    /// clamp to the arena interior.
    pub fn advance(&mut self, rules: &Rules) {
        let max_turn = if self.is_bot() {
            rules.bot_turn_rate
        } else {
            rules.turn_rate
        };
        self.heading = physics::turn_toward(self.heading, self.desired_heading, max_turn);

        let speed = if self.boosting {
            rules.boost_speed
        } else {
            rules.base_speed
        };
        let head = self.head();
        let new_head = Point {
            x: head.x + self.heading.cos() * speed,
            y: head.y + self.heading.sin() * speed,
        }
        .clamped(rules.wall_margin, rules.world_size);

        self.segments.push_front(new_head);
        self.segments.pop_back();
    }

    /// Grow by one segment (duplicate of the current tail)
    pub fn grow_one(&mut self) {
        if let Some(tail) = self.segments.back().copied() {
            self.segments.push_back(tail);
        }
    }

    /// Drop the tail segment, returning its position
    pub fn shed_tail(&mut self) -> Option<Point> {
        if self.segments.len() > 1 {
            self.segments.pop_back()
        } else {
            None
        }
    }

    /// Enter the death state. No-op unless currently live.
    pub fn kill(&mut self) {
        if self.is_live() {
            self.lifecycle = Lifecycle::Dead;
        }
    }

    /// Mark this worm's settlement as done. Terminal.
    pub fn settle(&mut self) {
        self.lifecycle = Lifecycle::Settled;
    }

    /// Start an exit hold at the given tick. Only valid from `Alive`.
    pub fn begin_exit(&mut self, tick: u64) {
        if self.lifecycle == Lifecycle::Alive {
            self.lifecycle = Lifecycle::Exiting { since_tick: tick };
        }
    }

    /// Release the exit hold; progress resets to zero, it never pauses.
    pub fn cancel_exit(&mut self) {
        if matches!(self.lifecycle, Lifecycle::Exiting { .. }) {
            self.lifecycle = Lifecycle::Alive;
        }
    }
}
