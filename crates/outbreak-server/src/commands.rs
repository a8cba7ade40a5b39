use std::collections::HashMap;

use outbreak_core::events::{PlayerEvent, Verdict};
use outbreak_core::player::{Player, PlayerId};
use outbreak_core::position::Vec3;
use outbreak_infection::ArenaSnapshot;

use crate::error::ServerError;
use crate::state::AppState;

pub const HELP: &str = "\
commands:
  join <arena> <id> <name>   admit a player to an arena
  leave <id>                 remove a player from their arena
  hit <attacker> <target>    melee contact between two players
  chat <id> <text...>        player chat message
  move <id> <x,y,z>          player movement
  die <id>                   player death
  respawn <id>               player respawn
  reset <arena>              force an arena into restart
  status [arena]             arena state
  arenas                     list arenas
  guarantee <name> <n>       grant guaranteed-infection credits
  help                       this text
  quit                       stop the server";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Join {
        arena: String,
        id: PlayerId,
        name: String,
    },
    Leave {
        id: PlayerId,
    },
    Hit {
        attacker: PlayerId,
        target: PlayerId,
    },
    Chat {
        id: PlayerId,
        text: String,
    },
    Move {
        id: PlayerId,
        position: Vec3,
    },
    Die {
        id: PlayerId,
    },
    Respawn {
        id: PlayerId,
    },
    Reset {
        arena: String,
    },
    Status {
        arena: Option<String>,
    },
    Arenas,
    Guarantee {
        name: String,
        credits: u32,
    },
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    InvalidArgument {
        argument: &'static str,
        value: String,
    },
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::Unknown(cmd) => write!(f, "unknown command '{cmd}', try 'help'"),
            Self::MissingArgument { command, argument } => {
                write!(f, "{command}: missing <{argument}>")
            },
            Self::InvalidArgument { argument, value } => {
                write!(f, "invalid <{argument}>: '{value}'")
            },
        }
    }
}

impl std::error::Error for CommandError {}

struct Args<'a> {
    command: &'static str,
    rest: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn word(&mut self, argument: &'static str) -> Result<&'a str, CommandError> {
        self.rest.next().ok_or(CommandError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    fn parse<T: std::str::FromStr>(&mut self, argument: &'static str) -> Result<T, CommandError> {
        let value = self.word(argument)?;
        value.parse().map_err(|_| CommandError::InvalidArgument {
            argument,
            value: value.to_string(),
        })
    }

    fn remainder(self, argument: &'static str) -> Result<String, CommandError> {
        let text = self.rest.collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(CommandError::MissingArgument {
                command: self.command,
                argument,
            });
        }
        Ok(text)
    }
}

/// Parse one console line.
pub fn parse(line: &str) -> Result<ConsoleCommand, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(CommandError::Empty);
    };
    let command: &'static str = match head.to_ascii_lowercase().as_str() {
        "join" => "join",
        "leave" => "leave",
        "hit" => "hit",
        "chat" => "chat",
        "move" => "move",
        "die" => "die",
        "respawn" => "respawn",
        "reset" => "reset",
        "status" => "status",
        "arenas" => "arenas",
        "guarantee" => "guarantee",
        "help" | "?" => "help",
        "quit" | "exit" => "quit",
        _ => return Err(CommandError::Unknown(head.to_string())),
    };
    let mut args = Args {
        command,
        rest: words,
    };

    let cmd = match command {
        "join" => ConsoleCommand::Join {
            arena: args.word("arena")?.to_string(),
            id: args.parse("id")?,
            name: args.word("name")?.to_string(),
        },
        "leave" => ConsoleCommand::Leave {
            id: args.parse("id")?,
        },
        "hit" => ConsoleCommand::Hit {
            attacker: args.parse("attacker")?,
            target: args.parse("target")?,
        },
        "chat" => ConsoleCommand::Chat {
            id: args.parse("id")?,
            text: args.remainder("text")?,
        },
        "move" => {
            let id = args.parse("id")?;
            let raw = args.word("x,y,z")?;
            let position = Vec3::parse(raw).ok_or_else(|| CommandError::InvalidArgument {
                argument: "x,y,z",
                value: raw.to_string(),
            })?;
            ConsoleCommand::Move { id, position }
        },
        "die" => ConsoleCommand::Die {
            id: args.parse("id")?,
        },
        "respawn" => ConsoleCommand::Respawn {
            id: args.parse("id")?,
        },
        "reset" => ConsoleCommand::Reset {
            arena: args.word("arena")?.to_string(),
        },
        "status" => ConsoleCommand::Status {
            arena: args.rest.next().map(str::to_string),
        },
        "arenas" => ConsoleCommand::Arenas,
        "guarantee" => ConsoleCommand::Guarantee {
            name: args.word("name")?.to_string(),
            credits: args.parse("n")?,
        },
        "help" => ConsoleCommand::Help,
        _ => ConsoleCommand::Quit,
    };
    Ok(cmd)
}

/// What the console loop should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleReply {
    Text(String),
    Quit,
}

/// Runs console commands against the arenas, acting as a stand-in game host.
pub struct Console {
    state: AppState,
    /// Names of players introduced with `join`, for death messages.
    names: HashMap<PlayerId, String>,
}

impl Console {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            names: HashMap::new(),
        }
    }

    pub async fn execute(&mut self, cmd: ConsoleCommand) -> Result<ConsoleReply, ServerError> {
        let arenas = self.state.arenas.read().await;
        let text = match cmd {
            ConsoleCommand::Join { arena, id, name } => {
                self.names.insert(id, name.clone());
                let slot = arenas.join(&arena, Player::new(id, name.clone())).await?;
                format!("{name} joined {arena} in slot {}", slot + 1)
            },
            ConsoleCommand::Leave { id } => {
                let arena = arenas.leave(id).await?;
                format!("player {id} left {arena}")
            },
            ConsoleCommand::Hit { attacker, target } => {
                let verdict = arenas
                    .dispatch(PlayerEvent::Damage { attacker, target })
                    .await?;
                describe_verdict(&verdict)
            },
            ConsoleCommand::Chat { id, text } => {
                let verdict = arenas
                    .dispatch(PlayerEvent::Chat {
                        player: id,
                        message: text,
                    })
                    .await?;
                describe_verdict(&verdict)
            },
            ConsoleCommand::Move { id, position } => {
                let verdict = arenas
                    .dispatch(PlayerEvent::Move {
                        player: id,
                        position,
                    })
                    .await?;
                describe_verdict(&verdict)
            },
            ConsoleCommand::Die { id } => {
                let name = self
                    .names
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| format!("#{id}"));
                let verdict = arenas
                    .dispatch(PlayerEvent::Death {
                        player: id,
                        message: format!("{name} died"),
                    })
                    .await?;
                describe_verdict(&verdict)
            },
            ConsoleCommand::Respawn { id } => {
                let verdict = arenas.dispatch(PlayerEvent::Respawn { player: id }).await?;
                describe_verdict(&verdict)
            },
            ConsoleCommand::Reset { arena } => {
                arenas.force_restart(&arena).await?;
                format!("{arena} is restarting")
            },
            ConsoleCommand::Status { arena: Some(arena) } => {
                format_snapshot(&arenas.snapshot(&arena).await?)
            },
            ConsoleCommand::Status { arena: None } => arenas
                .snapshots()
                .await
                .iter()
                .map(format_snapshot)
                .collect::<Vec<_>>()
                .join("\n"),
            ConsoleCommand::Arenas => arenas.arena_names().join(", "),
            ConsoleCommand::Guarantee { name, credits } => {
                self.state.stats.grant_guarantee(&name, credits);
                format!("{name} now has {} guarantee(s)", self.state.stats.get(&name).guarantees)
            },
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => return Ok(ConsoleReply::Quit),
        };
        Ok(ConsoleReply::Text(text))
    }
}

fn describe_verdict(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Allow => "allowed".to_string(),
        Verdict::Cancel => "cancelled".to_string(),
        Verdict::RespawnAt(to) => format!("respawn at {to:?}"),
    }
}

pub fn format_snapshot(s: &ArenaSnapshot) -> String {
    if s.setup {
        return format!("{}: setup", s.name);
    }
    format!(
        "{}: {:?} [{}/{}] infected={:?} healthy={:?} lobby={} game={} restart={}",
        s.name,
        s.phase,
        s.players.len(),
        s.slots,
        s.infected,
        s.healthy,
        s.countdowns.lobby,
        s.countdowns.game,
        s.countdowns.restart,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join() {
        assert_eq!(
            parse("join alpha 7 Steve"),
            Ok(ConsoleCommand::Join {
                arena: "alpha".to_string(),
                id: 7,
                name: "Steve".to_string(),
            })
        );
    }

    #[test]
    fn chat_keeps_the_whole_message() {
        assert_eq!(
            parse("chat 3 hello   there friend"),
            Ok(ConsoleCommand::Chat {
                id: 3,
                text: "hello there friend".to_string(),
            })
        );
        assert_eq!(
            parse("chat 3"),
            Err(CommandError::MissingArgument {
                command: "chat",
                argument: "text"
            })
        );
    }

    #[test]
    fn parses_move_position() {
        assert_eq!(
            parse("move 2 4.5,64,-1"),
            Ok(ConsoleCommand::Move {
                id: 2,
                position: Vec3::new(4.5, 64.0, -1.0),
            })
        );
        assert!(matches!(
            parse("move 2 4.5,64"),
            Err(CommandError::InvalidArgument { argument: "x,y,z", .. })
        ));
    }

    #[test]
    fn status_arena_is_optional() {
        assert_eq!(parse("status"), Ok(ConsoleCommand::Status { arena: None }));
        assert_eq!(
            parse("STATUS beta"),
            Ok(ConsoleCommand::Status {
                arena: Some("beta".to_string())
            })
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse("   "), Err(CommandError::Empty));
        assert_eq!(parse("fly 1"), Err(CommandError::Unknown("fly".to_string())));
        assert_eq!(
            parse("hit 1 x"),
            Err(CommandError::InvalidArgument {
                argument: "target",
                value: "x".to_string()
            })
        );
        assert_eq!(
            parse("leave"),
            Err(CommandError::MissingArgument {
                command: "leave",
                argument: "id"
            })
        );
    }

    #[test]
    fn aliases() {
        assert_eq!(parse("exit"), Ok(ConsoleCommand::Quit));
        assert_eq!(parse("?"), Ok(ConsoleCommand::Help));
        assert_eq!(
            parse("guarantee alex 2"),
            Ok(ConsoleCommand::Guarantee {
                name: "alex".to_string(),
                credits: 2
            })
        );
    }
}
