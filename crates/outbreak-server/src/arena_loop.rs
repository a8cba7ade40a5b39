use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use outbreak_core::actions::HostAction;
use outbreak_core::events::{PlayerEvent, Verdict};
use outbreak_core::player::{Player, PlayerId};
use outbreak_infection::admission::{ArenaError, LeaveCause};
use outbreak_infection::{ArenaSnapshot, InfectionArena};

/// Which arena each player is in. Written by the arena tasks, read by the
/// manager to route events.
pub type PlayerIndex = Arc<Mutex<HashMap<PlayerId, String>>>;

pub(crate) fn lock_index(index: &PlayerIndex) -> MutexGuard<'_, HashMap<PlayerId, String>> {
    index.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Commands sent to an arena task. Processed strictly in arrival order.
#[derive(Debug)]
pub enum ArenaCommand {
    Event {
        event: PlayerEvent,
        reply: Option<oneshot::Sender<Verdict>>,
    },
    Join {
        player: Player,
        reply: oneshot::Sender<Result<usize, ArenaError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), ArenaError>>,
    },
    ForceRestart {
        reply: oneshot::Sender<Result<(), ArenaError>>,
    },
    Snapshot {
        reply: oneshot::Sender<ArenaSnapshot>,
    },
    Stop,
}

/// Output of an arena task.
#[derive(Debug, Clone)]
pub enum ArenaBroadcast {
    /// Host actions produced by one tick or command, in order.
    Actions(String, Vec<HostAction>),
    /// The arena task has exited.
    Stopped(String),
}

/// Spawn an arena's tick loop as a tokio task.
/// Returns the command sender and broadcast receiver.
pub fn spawn_arena_session(
    arena: InfectionArena,
    tick_interval: Duration,
    index: PlayerIndex,
) -> (
    mpsc::UnboundedSender<ArenaCommand>,
    mpsc::UnboundedReceiver<ArenaBroadcast>,
    JoinHandle<()>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        run_arena_loop(arena, tick_interval, index, cmd_rx, broadcast_tx).await;
    });

    (cmd_tx, broadcast_rx, handle)
}

/// Tracks the roster last published to the player index and forwards host
/// actions.
struct Publisher {
    name: String,
    index: PlayerIndex,
    roster: HashSet<PlayerId>,
    broadcast_tx: mpsc::UnboundedSender<ArenaBroadcast>,
}

impl Publisher {
    fn publish(&mut self, arena: &mut InfectionArena) {
        self.sync_roster(arena);
        let actions = arena.drain_actions();
        if actions.is_empty() {
            return;
        }
        if self
            .broadcast_tx
            .send(ArenaBroadcast::Actions(self.name.clone(), actions))
            .is_err()
        {
            tracing::debug!(arena = %self.name, "No host listening for arena actions");
        }
    }

    fn sync_roster(&mut self, arena: &InfectionArena) {
        let current: HashSet<PlayerId> = arena.session().occupant_ids().into_iter().collect();
        if current == self.roster {
            return;
        }
        let mut index = lock_index(&self.index);
        for id in self.roster.difference(&current) {
            if index.get(id).is_some_and(|a| *a == self.name) {
                index.remove(id);
            }
        }
        for id in current.difference(&self.roster) {
            index.insert(*id, self.name.clone());
        }
        drop(index);
        self.roster = current;
    }

    fn retire(&mut self) {
        let mut index = lock_index(&self.index);
        for id in self.roster.drain() {
            if index.get(&id).is_some_and(|a| *a == self.name) {
                index.remove(&id);
            }
        }
        drop(index);
        let _ = self
            .broadcast_tx
            .send(ArenaBroadcast::Stopped(self.name.clone()));
    }
}

fn reply<T>(arena: &str, tx: oneshot::Sender<T>, value: T) {
    if tx.send(value).is_err() {
        tracing::debug!(arena = %arena, "Command caller went away before the reply");
    }
}

/// The arena's single owner: ticks and commands never interleave.
async fn run_arena_loop(
    mut arena: InfectionArena,
    tick_interval: Duration,
    index: PlayerIndex,
    mut cmd_rx: mpsc::UnboundedReceiver<ArenaCommand>,
    broadcast_tx: mpsc::UnboundedSender<ArenaBroadcast>,
) {
    let name = arena.name().to_string();
    let mut publisher = Publisher {
        name: name.clone(),
        index,
        roster: HashSet::new(),
        broadcast_tx,
    };
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(arena = %name, tick_ms = tick_interval.as_millis() as u64, "Arena task started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                arena.tick();
                publisher.publish(&mut arena);
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ArenaCommand::Event { event, reply: tx }) => {
                        let verdict = arena.handle(event);
                        publisher.publish(&mut arena);
                        if let Some(tx) = tx {
                            reply(&name, tx, verdict);
                        }
                    },
                    Some(ArenaCommand::Join { player, reply: tx }) => {
                        let result = arena.join(player);
                        publisher.publish(&mut arena);
                        reply(&name, tx, result);
                    },
                    Some(ArenaCommand::Leave { player_id, reply: tx }) => {
                        let result = arena.leave(player_id, LeaveCause::Voluntary);
                        publisher.publish(&mut arena);
                        reply(&name, tx, result);
                    },
                    Some(ArenaCommand::ForceRestart { reply: tx }) => {
                        let result = arena.force_restart();
                        publisher.publish(&mut arena);
                        reply(&name, tx, result);
                    },
                    Some(ArenaCommand::Snapshot { reply: tx }) => {
                        reply(&name, tx, arena.snapshot());
                    },
                    Some(ArenaCommand::Stop) | None => {
                        break;
                    },
                }
            }
        }
    }

    publisher.retire();
    tracing::info!(arena = %name, "Arena task stopped");
}
