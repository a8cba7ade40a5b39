use outbreak_core::arena::ArenaPhase;
use outbreak_core::time::format_countdown;

pub const SIGN_TITLE: &str = "OUTBREAK";

/// What the join sign needs to know about an arena.
#[derive(Debug, Clone, Copy)]
pub struct SignView<'a> {
    pub setup: bool,
    pub phase: ArenaPhase,
    pub occupants: usize,
    pub slots: u32,
    pub game_countdown: u32,
    pub level: &'a str,
}

/// Render the four lines of the join sign.
pub fn sign_lines(view: &SignView<'_>) -> [String; 4] {
    if view.setup {
        return [
            SIGN_TITLE.to_string(),
            "[ ? / ? ]".to_string(),
            "Setup".to_string(),
            "Please wait...".to_string(),
        ];
    }
    let status = match view.phase {
        ArenaPhase::Lobby if view.occupants >= view.slots as usize => "Full".to_string(),
        ArenaPhase::Lobby => "Join".to_string(),
        ArenaPhase::Game => format!("In game: {}", format_countdown(view.game_countdown)),
        ArenaPhase::Restart => "Restarting...".to_string(),
    };
    [
        SIGN_TITLE.to_string(),
        format!("[ {} / {} ]", view.occupants, view.slots),
        status,
        format!("Map: {}", view.level),
    ]
}
