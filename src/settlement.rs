//! Monetary values and the append-only settlement ledger
//!
//! Every unit of money inside an arena is a [`Value`]: a non-negative
//! decimal, enforced at the type level. Money leaving the simulation
//! (kill rewards, exits, forfeitures) produces an immutable
//! [`SettlementRecord`] appended to a JSONL sink with at-least-once
//! delivery.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::wallet::AccountId;

/// Errors that can occur when constructing a [`Value`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("monetary value cannot be negative: {0}")]
    Negative(Decimal),
}

/// A non-negative monetary amount.
///
/// # Invariant
/// The inner decimal is always >= 0, enforced by the constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Value(Decimal);

impl Value {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new Value, rejecting negative decimals
    pub fn new(value: Decimal) -> Result<Self, ValueError> {
        if value < Decimal::ZERO {
            Err(ValueError::Negative(value))
        } else {
            Ok(Self(value))
        }
    }

    #[inline]
    pub const fn get(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Add, staying put on (practically impossible) decimal overflow
    pub fn saturating_add(&self, other: Value) -> Value {
        Value(self.0.checked_add(other.0).unwrap_or(self.0))
    }

    /// Subtract, flooring at zero
    pub fn saturating_sub(&self, other: Value) -> Value {
        Value((self.0 - other.0).max(Decimal::ZERO))
    }

    /// Strip trailing zeros so equal amounts compare and hash identically
    /// (5.00 and 5.0 are the same stake tier)
    pub fn normalized(&self) -> Value {
        Value(self.0.normalize())
    }

    /// Split this value into a net payout and a fee at `fee_rate`.
    ///
    /// The net side is rounded to 4 decimal places and the fee is the exact
    /// remainder, so `net + fee == gross` always holds.
    pub fn split_fee(&self, fee_rate: Decimal) -> FeeSplit {
        let net = (self.0 * (Decimal::ONE - fee_rate)).round_dp(4);
        let fee = self.0 - net;
        FeeSplit {
            net: Value(net),
            fee: Value(fee),
        }
    }

    /// Per-sampled-segment food value when a worm's body is converted back
    /// into the world: `total / segment_count * multiplier`, rounded to 6
    /// decimal places.
    pub fn drop_share(&self, segment_count: usize, multiplier: Decimal) -> Value {
        if segment_count == 0 {
            return Value::ZERO;
        }
        let share = (self.0 / Decimal::from(segment_count as u64) * multiplier).round_dp(6);
        Value(share.max(Decimal::ZERO))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Value {
    type Error = ValueError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Value> for Decimal {
    fn from(value: Value) -> Self {
        value.0
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Result of applying the platform fee to a gross amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub net: Value,
    pub fee: Value,
}

/// An immutable fact about money leaving a worm. Append-only; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementRecord {
    /// A worm was killed by another; the victim's value moved to the killer
    /// net of the platform fee.
    Kill {
        arena_id: Uuid,
        killer_worm: Uuid,
        victim_worm: Uuid,
        victim_value: Value,
        fee: Value,
        reward: Value,
        timestamp: DateTime<Utc>,
    },
    /// A player completed an exit hold and cashed out net of the fee.
    Exit {
        arena_id: Uuid,
        account_id: AccountId,
        worm_id: Uuid,
        gross: Value,
        fee: Value,
        net: Value,
        timestamp: DateTime<Utc>,
    },
    /// A worm died with no credited killer; its value was forfeited to the
    /// world. `account_id` is None for house bots.
    Forfeit {
        arena_id: Uuid,
        account_id: Option<AccountId>,
        worm_id: Uuid,
        value: Value,
        timestamp: DateTime<Utc>,
    },
}

/// Handle to the settlement ledger writer task.
///
/// Records queue on an unbounded channel; a dedicated task appends them as
/// JSON lines. An I/O failure blocks that record and retries with backoff:
/// settlement records represent money movement and are never dropped.
#[derive(Clone)]
pub struct SettlementLog {
    tx: mpsc::UnboundedSender<SettlementRecord>,
}

impl SettlementLog {
    /// Spawn a writer task appending to the given file
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path, rx));
        Self { tx }
    }

    /// A log whose records are captured on a channel instead of disk
    pub fn capture() -> (Self, mpsc::UnboundedReceiver<SettlementRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Append a record. Infallible from the caller's perspective; delivery
    /// is the writer task's responsibility.
    pub fn record(&self, record: SettlementRecord) {
        if self.tx.send(record).is_err() {
            error!("settlement log writer is gone; record lost");
        }
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<SettlementRecord>) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("could not create settlement log directory: {}", e);
        }
    }
    info!("settlement ledger at {}", path.display());

    while let Some(record) = rx.recv().await {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                error!("unserializable settlement record dropped: {}", e);
                continue;
            }
        };

        // At-least-once: retry until the line is on disk.
        let mut backoff = Duration::from_millis(100);
        loop {
            match append_line(&path, &line) {
                Ok(()) => break,
                Err(e) => {
                    warn!("settlement append failed ({}), retrying", e);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                }
            }
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    file.flush()
}
