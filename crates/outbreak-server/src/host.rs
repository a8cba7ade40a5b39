use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use outbreak_core::actions::HostAction;
use outbreak_core::position::Destination;

use crate::arena_loop::ArenaBroadcast;

/// Stand-in game host: renders every arena action as a log event.
pub struct LoggingHost;

impl LoggingHost {
    /// Drain `rx` until every arena has stopped.
    pub fn spawn(mut rx: mpsc::UnboundedReceiver<ArenaBroadcast>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    ArenaBroadcast::Actions(arena, actions) => {
                        for action in &actions {
                            apply(&arena, action);
                        }
                    },
                    ArenaBroadcast::Stopped(arena) => {
                        tracing::info!(arena = %arena, "Arena stopped");
                    },
                }
            }
        })
    }
}

fn apply(arena: &str, action: &HostAction) {
    match action {
        // Sign refreshes and ambience repeat every tick.
        HostAction::UpdateSign { .. }
        | HostAction::SetLevelTime { .. }
        | HostAction::ApplyEffect { .. }
        | HostAction::PlaySound { .. } => {
            tracing::trace!(arena = %arena, action = %describe(action), "host");
        },
        HostAction::Notify {
            channel: outbreak_core::actions::Channel::Tip,
            ..
        } => {
            tracing::debug!(arena = %arena, action = %describe(action), "host");
        },
        _ => tracing::info!(arena = %arena, action = %describe(action), "host"),
    }
}

/// One-line rendering of a host action.
pub fn describe(action: &HostAction) -> String {
    match action {
        HostAction::Notify {
            recipients,
            text,
            channel,
        } => format!("{channel:?} to {recipients:?}: {text}"),
        HostAction::ServerBroadcast { text } => format!("broadcast: {text}"),
        HostAction::Teleport { player, to } => match to {
            Destination::ArenaSpawn { level, position } => {
                format!("teleport {player} to {position} in {level}")
            },
            Destination::ServerLobby => format!("teleport {player} to server lobby"),
        },
        HostAction::ResetPlayer { player, mode } => format!("reset {player} ({mode:?})"),
        HostAction::ClearInventory { player } => format!("clear inventory of {player}"),
        HostAction::SetGameMode { player, mode } => format!("game mode of {player}: {mode:?}"),
        HostAction::SetNameTag { player, tag } => match tag {
            Some(tag) => format!("name tag of {player}: {tag}"),
            None => format!("name tag of {player} cleared"),
        },
        HostAction::ApplyEffect {
            player,
            effect,
            seconds,
            amplifier,
        } => format!("{effect:?} {amplifier} for {seconds}s on {player}"),
        HostAction::PlaySound { player, sound } => format!("sound {sound:?} for {player}"),
        HostAction::SetLevelTime { level, time } => format!("time of {level}: {time}"),
        HostAction::UpdateSign { sign, lines } => {
            format!("sign at {} in {}: {}", sign.position, sign.level, lines.join(" | "))
        },
        HostAction::FillContainer {
            level,
            position,
            items,
        } => format!("fill chest at {position} in {level} with {} stacks", items.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbreak_core::actions::Channel;
    use outbreak_core::position::{BlockRef, Vec3};

    #[test]
    fn describes_notifications() {
        let action = HostAction::Notify {
            recipients: vec![1, 2],
            text: "> Steve joined the game! [2/12]".to_string(),
            channel: Channel::Chat,
        };
        assert_eq!(
            describe(&action),
            "Chat to [1, 2]: > Steve joined the game! [2/12]"
        );
    }

    #[test]
    fn describes_teleports() {
        assert_eq!(
            describe(&HostAction::Teleport {
                player: 4,
                to: Destination::ServerLobby
            }),
            "teleport 4 to server lobby"
        );
    }

    #[test]
    fn describes_sign() {
        let action = HostAction::UpdateSign {
            sign: BlockRef {
                level: "hub".to_string(),
                position: Vec3::new(5.0, 64.0, 5.0),
            },
            lines: [
                "OUTBREAK".to_string(),
                "[ 0 / 12 ]".to_string(),
                "Join".to_string(),
                "Map: zombies".to_string(),
            ],
        };
        assert!(describe(&action).ends_with("OUTBREAK | [ 0 / 12 ] | Join | Map: zombies"));
    }

    #[tokio::test]
    async fn host_exits_when_channel_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = LoggingHost::spawn(rx);
        tx.send(ArenaBroadcast::Stopped("alpha".to_string())).unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
