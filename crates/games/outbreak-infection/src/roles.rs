use rand::Rng;

use outbreak_core::player::{Player, PlayerId};
use outbreak_core::services::StatsService;

/// Result of splitting the occupants into teams at the start of a round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAssignment {
    pub infected: Vec<PlayerId>,
    pub healthy: Vec<PlayerId>,
    /// Players who were infected because they spent a guarantee credit.
    pub guaranteed: Vec<PlayerId>,
}

/// Pick one occupant uniformly at random as the first infected, add every
/// holder of a guaranteed-infection credit (spending one credit each), and
/// make everyone else healthy. `players` must be in a stable order for the
/// result to be reproducible under a seeded `rng`.
pub fn assign_roles<R: Rng + ?Sized>(
    players: &[Player],
    stats: &dyn StatsService,
    rng: &mut R,
) -> RoleAssignment {
    let mut assignment = RoleAssignment::default();
    if players.is_empty() {
        return assignment;
    }
    let first = rng.random_range(0..players.len());
    for (i, player) in players.iter().enumerate() {
        let guaranteed = stats.has_guarantee(&player.name);
        if guaranteed {
            stats.reduce_guarantee(&player.name, 1);
            assignment.guaranteed.push(player.id);
        }
        if i == first || guaranteed {
            assignment.infected.push(player.id);
        } else {
            assignment.healthy.push(player.id);
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbreak_core::test_helpers::{RecordingStats, StatsCall, make_players};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn exactly_one_infected_without_credits() {
        let stats = RecordingStats::new();
        let players = make_players(6);
        let mut rng = StdRng::seed_from_u64(7);
        let roles = assign_roles(&players, &stats, &mut rng);
        assert_eq!(roles.infected.len(), 1);
        assert_eq!(roles.healthy.len(), 5);
        assert!(roles.guaranteed.is_empty());
        assert!(stats.calls().is_empty());
    }

    #[test]
    fn same_seed_same_choice() {
        let stats = RecordingStats::new();
        let players = make_players(8);
        let a = assign_roles(&players, &stats, &mut StdRng::seed_from_u64(42));
        let b = assign_roles(&players, &stats, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn guarantee_holders_are_infected_and_charged() {
        let stats = RecordingStats::new();
        let players = make_players(5);
        stats.grant_guarantee("Player2", 2);
        stats.grant_guarantee("Player4", 1);
        let roles = assign_roles(&players, &stats, &mut StdRng::seed_from_u64(1));

        assert!(roles.infected.contains(&2));
        assert!(roles.infected.contains(&4));
        assert_eq!(roles.guaranteed, vec![2, 4]);
        assert!(roles.infected.len() >= 2 && roles.infected.len() <= 3);
        assert_eq!(roles.infected.len() + roles.healthy.len(), 5);
        assert_eq!(stats.get("Player2").guarantees, 1);
        assert_eq!(stats.get("Player4").guarantees, 0);
        assert!(
            stats
                .calls()
                .contains(&StatsCall::ReduceGuarantee("Player4".to_string(), 1))
        );
    }

    #[test]
    fn everyone_guaranteed_leaves_no_healthy() {
        let stats = RecordingStats::new();
        let players = make_players(3);
        for p in &players {
            stats.grant_guarantee(&p.name, 1);
        }
        let roles = assign_roles(&players, &stats, &mut StdRng::seed_from_u64(3));
        assert_eq!(roles.infected.len(), 3);
        assert!(roles.healthy.is_empty());
    }

    #[test]
    fn first_infected_is_roughly_uniform() {
        let stats = RecordingStats::new();
        let players = make_players(4);
        let mut rng = StdRng::seed_from_u64(2024);
        let mut counts = [0u32; 4];
        for _ in 0..4000 {
            let roles = assign_roles(&players, &stats, &mut rng);
            counts[(roles.infected[0] - 1) as usize] += 1;
        }
        for c in counts {
            assert!((800..1200).contains(&c), "skewed selection: {counts:?}");
        }
    }

    #[test]
    fn empty_occupants_assign_nothing() {
        let stats = RecordingStats::new();
        let roles = assign_roles(&[], &stats, &mut StdRng::seed_from_u64(0));
        assert_eq!(roles, RoleAssignment::default());
    }
}
