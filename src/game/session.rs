//! Per-arena session task
//!
//! Each arena runs on its own tokio task, which exclusively owns the
//! [`Arena`] value. Everything outside the task (WebSocket handlers,
//! other arenas) talks to it through a command channel, so the
//! single-writer rule is enforced by structure, not convention. Arenas are
//! fully independent and run in parallel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::broadcast::{Broadcaster, InMemoryBroadcaster};
use crate::config::{Rules, COMMAND_CAPACITY};
use crate::error::GameError;
use crate::game::arena::{Arena, TickReport};
use crate::protocol::ServerMessage;
use crate::settlement::{SettlementLog, Value};
use crate::wallet::{AccountId, WalletService};

/// Commands accepted by an arena task
pub enum Command {
    Join {
        account_id: AccountId,
        name: String,
        reply: oneshot::Sender<Result<JoinAck, GameError>>,
    },
    Steer {
        worm_id: Uuid,
        heading: f64,
    },
    SetBoost {
        worm_id: Uuid,
        on: bool,
    },
    SetExitHold {
        worm_id: Uuid,
        on: bool,
    },
    Chat {
        worm_id: Uuid,
        text: String,
    },
    Leave {
        worm_id: Uuid,
    },
}

/// Successful join result
#[derive(Debug, Clone)]
pub struct JoinAck {
    pub worm_id: Uuid,
    pub arena_id: Uuid,
    pub world_size: f64,
    pub stake: Value,
}

/// Cheap, clonable handle to a running arena task
#[derive(Clone)]
pub struct ArenaHandle {
    pub arena_id: Uuid,
    pub stake: Value,
    pub broadcaster: Arc<dyn Broadcaster>,
    commands: mpsc::Sender<Command>,
}

impl ArenaHandle {
    /// Stake in and spawn a worm. The reply carries a typed rejection when
    /// the wallet or the arena refuses.
    pub async fn join(
        &self,
        account_id: AccountId,
        name: String,
    ) -> Result<JoinAck, GameError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Join {
                account_id,
                name,
                reply,
            })
            .await
            .map_err(|_| GameError::ArenaUnavailable)?;
        rx.await.map_err(|_| GameError::ArenaUnavailable)?
    }

    /// Fire-and-forget intent. A closed arena just drops it.
    pub async fn send(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            warn!("command dropped: arena {} is gone", self.arena_id);
        }
    }
}

/// Spawn an arena task and return its handle
pub fn spawn_arena(
    stake: Value,
    rules: Rules,
    wallet: Arc<dyn WalletService>,
    settlements: SettlementLog,
) -> ArenaHandle {
    let arena = Arena::new(stake, rules);
    let broadcaster: Arc<dyn Broadcaster> = Arc::new(InMemoryBroadcaster::new());
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);

    let handle = ArenaHandle {
        arena_id: arena.id,
        stake,
        broadcaster: broadcaster.clone(),
        commands: tx,
    };

    tokio::spawn(run(arena, rx, broadcaster, wallet, settlements));
    handle
}

async fn run(
    mut arena: Arena,
    mut commands: mpsc::Receiver<Command>,
    broadcaster: Arc<dyn Broadcaster>,
    wallet: Arc<dyn WalletService>,
    settlements: SettlementLog,
) {
    info!("arena {} open at stake {}", arena.id, arena.stake);
    let mut ticker = interval(arena.rules.tick_duration());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = arena.tick();
                publish_report(report, &broadcaster, &wallet, &settlements).await;
                broadcaster.send(arena.snapshot()).await;
            }
            command = commands.recv() => {
                match command {
                    Some(command) => {
                        handle_command(&mut arena, command, &broadcaster, &wallet, &settlements).await;
                    }
                    None => break,
                }
            }
        }
    }

    info!("arena {} closed", arena.id);
}

async fn handle_command(
    arena: &mut Arena,
    command: Command,
    broadcaster: &Arc<dyn Broadcaster>,
    wallet: &Arc<dyn WalletService>,
    settlements: &SettlementLog,
) {
    match command {
        Command::Join {
            account_id,
            name,
            reply,
        } => {
            let result = join(arena, wallet.as_ref(), account_id, name).await;
            let _ = reply.send(result);
        }
        Command::Steer { worm_id, heading } => arena.steer(worm_id, heading),
        Command::SetBoost { worm_id, on } => arena.set_boost(worm_id, on),
        Command::SetExitHold { worm_id, on } => arena.set_exit_hold(worm_id, on),
        Command::Chat { worm_id, text } => {
            let text: String = text
                .chars()
                .take(arena.rules.chat_max_len)
                .collect::<String>()
                .trim()
                .to_string();
            if text.is_empty() {
                return;
            }
            if let Some(worm) = arena.worms.get(&worm_id) {
                let name = worm.name.clone();
                broadcaster
                    .send(ServerMessage::Chat {
                        worm_id,
                        name,
                        text,
                    })
                    .await;
            }
        }
        Command::Leave { worm_id } => {
            // Disconnecting mid-game forfeits like a killerless death
            if let Some((record, notice)) = arena.forfeit(worm_id) {
                settlements.record(record);
                broadcaster
                    .send(ServerMessage::Death {
                        worm_id,
                        killer: None,
                        value_lost: notice.value_lost,
                    })
                    .await;
            }
            broadcaster
                .send(ServerMessage::PlayerLeft { worm_id })
                .await;
        }
    }
}

/// Debit the stake, then spawn. A spawn failure after the debit is
/// compensated by crediting the stake back, leaving no value in limbo.
async fn join(
    arena: &mut Arena,
    wallet: &dyn WalletService,
    account_id: AccountId,
    name: String,
) -> Result<JoinAck, GameError> {
    wallet.debit(account_id, arena.stake).await?;

    match arena.join_player(account_id, name) {
        Ok(worm_id) => {
            info!(
                "account {} joined arena {} as worm {} (stake {})",
                account_id, arena.id, worm_id, arena.stake
            );
            Ok(JoinAck {
                worm_id,
                arena_id: arena.id,
                world_size: arena.rules.world_size,
                stake: arena.stake,
            })
        }
        Err(e) => {
            if let Err(credit_err) = wallet.credit(account_id, arena.stake).await {
                error!(
                    "compensating credit of {} for {} failed: {}",
                    arena.stake, account_id, credit_err
                );
            }
            Err(e)
        }
    }
}

async fn publish_report(
    report: TickReport,
    broadcaster: &Arc<dyn Broadcaster>,
    wallet: &Arc<dyn WalletService>,
    settlements: &SettlementLog,
) {
    // Append in resolution order before anything is broadcast
    for record in report.settlements {
        settlements.record(record);
    }

    for death in report.deaths {
        broadcaster
            .send(ServerMessage::Death {
                worm_id: death.worm_id,
                killer: death.killer,
                value_lost: death.value_lost,
            })
            .await;
    }

    for exit in report.exits {
        broadcaster
            .send(ServerMessage::ExitSettled {
                worm_id: exit.worm_id,
                gross: exit.gross,
                fee: exit.fee,
                net: exit.net,
            })
            .await;
        // The external credit is money movement: retry until it lands
        tokio::spawn(credit_with_retry(
            wallet.clone(),
            exit.account_id,
            exit.net,
        ));
    }
}

async fn credit_with_retry(wallet: Arc<dyn WalletService>, account: AccountId, amount: Value) {
    let mut backoff = Duration::from_millis(200);
    loop {
        match wallet.credit(account, amount).await {
            Ok(()) => {
                info!("credited exit payout {} to {}", amount, account);
                return;
            }
            Err(e) => {
                warn!("exit credit to {} failed ({}), retrying", account, e);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(10));
            }
        }
    }
}
