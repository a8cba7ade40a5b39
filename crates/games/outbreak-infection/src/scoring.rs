use serde::{Deserialize, Serialize};

use outbreak_core::player::Team;

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Won(Team),
    /// Nobody with a role was left to reward.
    Abandoned,
}

/// Whether the round is over given the team populations and the number of
/// active occupants.
pub fn is_round_over(infected: usize, healthy: usize, occupants: usize) -> bool {
    (infected > 0 && healthy == 0) || (healthy > 0 && infected == 0) || occupants <= 1
}

/// Decide the winner once a round ends. Survivors win whenever any are left,
/// which covers the timer running out.
pub fn decide_outcome(infected: usize, healthy: usize) -> RoundOutcome {
    if infected > 0 && healthy == 0 {
        RoundOutcome::Won(Team::Infected)
    } else if healthy > 0 {
        RoundOutcome::Won(Team::Healthy)
    } else {
        RoundOutcome::Abandoned
    }
}

/// Coins each winner receives: team size times the team's multiplier.
pub fn prize_per_winner(winners: usize, multiplier: u64) -> u64 {
    winners as u64 * multiplier
}
