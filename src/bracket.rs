use log::debug;
use olympiad_model::{Fixture, Phase};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::qualify::Seed;

// ---------------------------------------------------------------------------
// Bracket tree
// ---------------------------------------------------------------------------

/// Where a bracket slot's team comes from. Feeders are fixed at round
/// generation and never rewritten; only the resolved winner may later
/// populate the next round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feeder {
    /// A concrete qualified team, placed by seeding.
    Seeded { team_id: u32 },
    /// The winner of an earlier node, unknown until that node finishes.
    WinnerOf { phase: Phase, slot: u8 },
}

impl Feeder {
    /// Placeholder label for an unresolved slot: "Winner QF-2".
    pub fn label(&self) -> Option<String> {
        match self {
            Feeder::Seeded { .. } => None,
            Feeder::WinnerOf { phase, slot } => Some(format!("Winner {}-{slot}", phase.code())),
        }
    }
}

/// One node of the knockout tree. Persisted by the caller as a fixture in
/// the node's phase; the engine only derives and progresses the structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketNode {
    pub phase: Phase,
    /// 1-based slot within the phase.
    pub slot: u8,
    pub home: Feeder,
    pub away: Feeder,
    /// Resolved teams — immediately known for seeded feeders, filled from
    /// winners for `WinnerOf` feeders.
    pub home_team: Option<u32>,
    pub away_team: Option<u32>,
    /// The fixture recorded against this node, once matched.
    pub fixture_id: Option<u32>,
    pub winner: Option<u32>,
}

impl BracketNode {
    pub fn code(&self) -> String {
        format!("{}-{}", self.phase.code(), self.slot)
    }

    pub fn is_decided(&self) -> bool {
        self.winner.is_some()
    }
}

/// Lifecycle of one knockout round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    NotGenerated,
    /// Nodes exist but at least one is still undecided.
    Pending,
    /// Every node has a winner; the next round may be generated.
    Complete,
}

pub fn round_state(nodes: &[BracketNode], phase: Phase) -> RoundState {
    let round: Vec<&BracketNode> = nodes.iter().filter(|n| n.phase == phase).collect();
    if round.is_empty() {
        RoundState::NotGenerated
    } else if round.iter().all(|n| n.is_decided()) {
        RoundState::Complete
    } else {
        RoundState::Pending
    }
}

/// The round currently being played: the earliest knockout phase with an
/// undecided node, or the last generated phase once everything is decided.
pub fn active_round(nodes: &[BracketNode]) -> Option<Phase> {
    let order = [Phase::Quarterfinal, Phase::Semifinal, Phase::Final];
    let mut last_generated = None;
    for phase in order {
        match round_state(nodes, phase) {
            RoundState::NotGenerated => {}
            RoundState::Pending => return Some(phase),
            RoundState::Complete => last_generated = Some(phase),
        }
    }
    last_generated
}

// ---------------------------------------------------------------------------
// Seeding and first-round generation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeedingRule {
    /// 1 meets N, 2 meets N-1, and so on, then pairs are adjusted to avoid
    /// first-round rematches of group-stage opponents where group data
    /// allows it.
    #[default]
    CrossGroup,
    /// Plain 1-meets-N pairing with no same-group adjustment.
    SeedOrder,
}

/// The opening knockout phase for a field of this size.
pub fn opening_phase(team_count: usize) -> EngineResult<Phase> {
    match team_count {
        8 => Ok(Phase::Quarterfinal),
        4 => Ok(Phase::Semifinal),
        2 => Ok(Phase::Final),
        n => Err(EngineError::Validation(format!(
            "cannot open a knockout bracket with {n} teams: need 2, 4 or 8"
        ))),
    }
}

/// Build the first knockout round from seeded qualifiers.
///
/// Rejects generation when the opening round already exists in `existing`
/// — regeneration is an explicit administrative action, not an implicit
/// overwrite.
pub fn generate_bracket(
    seeds: &[Seed],
    rule: SeedingRule,
    existing: &[BracketNode],
) -> EngineResult<Vec<BracketNode>> {
    let phase = opening_phase(seeds.len())?;
    if round_state(existing, phase) != RoundState::NotGenerated {
        return Err(EngineError::State(format!(
            "{} bracket already generated; regeneration must be requested explicitly",
            phase.label()
        )));
    }

    // 1vN pairing over the seed order.
    let n = seeds.len();
    let mut pairs: Vec<(&Seed, &Seed)> =
        (0..n / 2).map(|i| (&seeds[i], &seeds[n - 1 - i])).collect();

    if rule == SeedingRule::CrossGroup {
        avoid_same_group_pairs(&mut pairs);
    }

    // Bridge slot layout: adjacent slots feed the same next-round node, so
    // the halves are 1v8/4v5 and 3v6/2v7 and the top two seeds cannot meet
    // before the final. Two-pair fields are already laid out that way.
    if pairs.len() == 4 {
        pairs.swap(1, 3);
    }

    debug!(
        "generating {} with {} nodes from {} seeds",
        phase.label(),
        pairs.len(),
        seeds.len()
    );

    Ok(pairs
        .into_iter()
        .enumerate()
        .map(|(i, (high, low))| BracketNode {
            phase,
            slot: (i + 1) as u8,
            home: Feeder::Seeded { team_id: high.team_id },
            away: Feeder::Seeded { team_id: low.team_id },
            home_team: Some(high.team_id),
            away_team: Some(low.team_id),
            fixture_id: None,
            winner: None,
        })
        .collect())
}

/// Swap away-side seeds between pairs until no pair holds two teams from
/// the same group, where such an arrangement exists. Single greedy pass;
/// a pairing that cannot be fixed is left alone.
fn avoid_same_group_pairs(pairs: &mut [(&Seed, &Seed)]) {
    let same_group = |a: &Seed, b: &Seed| a.group_id == b.group_id;
    for i in 0..pairs.len() {
        if !same_group(pairs[i].0, pairs[i].1) {
            continue;
        }
        for j in 0..pairs.len() {
            if i == j {
                continue;
            }
            let fixes_i = !same_group(pairs[i].0, pairs[j].1);
            let keeps_j = !same_group(pairs[j].0, pairs[i].1);
            if fixes_i && keeps_j {
                let (a, b) = (pairs[i].1, pairs[j].1);
                pairs[i].1 = b;
                pairs[j].1 = a;
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// Fold finished fixtures into their bracket nodes, resolving winners.
///
/// Fixtures are matched to nodes by (phase, slot). A finished knockout
/// fixture that produces no winner — a tie with no walkover — is rejected
/// under the sport no-draw rule for knockout play.
pub fn apply_results(nodes: &mut [BracketNode], fixtures: &[Fixture]) -> EngineResult<()> {
    for node in nodes.iter_mut() {
        let Some(fixture) = fixtures
            .iter()
            .find(|f| f.phase == node.phase && f.slot == Some(node.slot))
        else {
            continue;
        };
        node.fixture_id = Some(fixture.id);
        if !fixture.is_finished() {
            continue;
        }
        match fixture.winner_team_id() {
            Some(team_id) => node.winner = Some(team_id),
            None => {
                return Err(EngineError::Validation(format!(
                    "knockout fixture {} ({}) cannot end level: record a walkover or a decisive score",
                    fixture.id,
                    node.code()
                )));
            }
        }
    }
    Ok(())
}

/// Generate the next round's nodes from a completed round, pairing the
/// winners of adjacent slots. Rejected while any node of `phase` is
/// undecided, and when the next round already exists.
pub fn advance_round(nodes: &[BracketNode], phase: Phase) -> EngineResult<Vec<BracketNode>> {
    let Some(next_phase) = phase.next().filter(|p| p.is_knockout()) else {
        return Err(EngineError::State(format!(
            "{} has no following round",
            phase.label()
        )));
    };
    if round_state(nodes, next_phase) != RoundState::NotGenerated {
        return Err(EngineError::State(format!(
            "{} bracket already generated; regeneration must be requested explicitly",
            next_phase.label()
        )));
    }

    let mut round: Vec<&BracketNode> = nodes.iter().filter(|n| n.phase == phase).collect();
    round.sort_by_key(|n| n.slot);
    if round.is_empty() {
        return Err(EngineError::State(format!("{} has not been generated", phase.label())));
    }
    if let Some(open) = round.iter().find(|n| !n.is_decided()) {
        return Err(EngineError::State(format!(
            "cannot advance past {}: node {} is not finished",
            phase.label(),
            open.code()
        )));
    }

    debug!("advancing {} -> {}", phase.label(), next_phase.label());

    Ok(round
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            let top = pair[0];
            // An odd round never occurs with 2/4/8 fields, but stay total.
            let bottom = pair.get(1).copied().unwrap_or(top);
            BracketNode {
                phase: next_phase,
                slot: (i + 1) as u8,
                home: Feeder::WinnerOf { phase, slot: top.slot },
                away: Feeder::WinnerOf { phase, slot: bottom.slot },
                home_team: top.winner,
                away_team: bottom.winner,
                fixture_id: None,
                winner: None,
            }
        })
        .collect())
}

/// The tournament champion: the winner of the decided FINAL node.
pub fn champion(nodes: &[BracketNode]) -> Option<u32> {
    nodes
        .iter()
        .find(|n| n.phase == Phase::Final)
        .and_then(|n| n.winner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use olympiad_model::{MatchStatus, ResultCode, Side};

    fn seed(seed: usize, team_id: u32, group_id: u32) -> Seed {
        Seed { seed, team_id, team_name: format!("Team {team_id}"), group_id }
    }

    /// Eight seeds from three groups, in overall-ranking order.
    fn eight_seeds() -> Vec<Seed> {
        vec![
            seed(1, 11, 1),
            seed(2, 31, 3),
            seed(3, 21, 2),
            seed(4, 12, 1),
            seed(5, 32, 3),
            seed(6, 22, 2),
            seed(7, 23, 2),
            seed(8, 13, 1),
        ]
    }

    fn knockout_fixture(id: u32, phase: Phase, slot: u8, home: (u32, u16), away: (u32, u16)) -> Fixture {
        let (hr, ar) = if home.1 > away.1 {
            (ResultCode::Win, ResultCode::Loss)
        } else {
            (ResultCode::Loss, ResultCode::Win)
        };
        Fixture {
            id,
            tournament_id: 1,
            phase,
            group_id: None,
            slot: Some(slot),
            date: None,
            time: None,
            venue_id: None,
            referee_id: None,
            status: MatchStatus::Finished,
            home: Side { score: Some(home.1), result: Some(hr), ..Side::seeded(home.0) },
            away: Side { score: Some(away.1), result: Some(ar), ..Side::seeded(away.0) },
            events: Vec::new(),
            note: None,
        }
    }

    #[test]
    fn eight_seeds_open_quarterfinals_one_meets_eight() {
        let nodes = generate_bracket(&eight_seeds(), SeedingRule::SeedOrder, &[]).unwrap();
        assert_eq!(nodes.len(), 4);
        assert!(nodes.iter().all(|n| n.phase == Phase::Quarterfinal));
        assert_eq!((nodes[0].home_team, nodes[0].away_team), (Some(11), Some(13)));
        assert_eq!((nodes[1].home_team, nodes[1].away_team), (Some(12), Some(32)));
        assert_eq!((nodes[3].home_team, nodes[3].away_team), (Some(31), Some(23)));
    }

    #[test]
    fn top_two_seeds_meet_no_earlier_than_the_final() {
        let seeds = eight_seeds();
        let rank = |team: u32| seeds.iter().find(|s| s.team_id == team).unwrap().seed;

        let mut nodes = generate_bracket(&seeds, SeedingRule::SeedOrder, &[]).unwrap();
        let mut all_nodes = Vec::new();
        let mut fixture_id = 200;

        // The better seed wins every fixture.
        for phase in [Phase::Quarterfinal, Phase::Semifinal] {
            let fixtures: Vec<Fixture> = nodes
                .iter()
                .map(|n| {
                    fixture_id += 1;
                    let (home, away) = (n.home_team.unwrap(), n.away_team.unwrap());
                    let (hs, aws) = if rank(home) < rank(away) { (2, 1) } else { (1, 2) };
                    knockout_fixture(fixture_id, phase, n.slot, (home, hs), (away, aws))
                })
                .collect();
            apply_results(&mut nodes, &fixtures).unwrap();
            all_nodes.extend(nodes.clone());
            nodes = advance_round(&all_nodes, phase).unwrap();
        }

        assert_eq!(nodes.len(), 1);
        let finalists = [nodes[0].home_team, nodes[0].away_team];
        assert!(finalists.contains(&Some(11)));
        assert!(finalists.contains(&Some(31)));
    }

    #[test]
    fn cross_group_seeding_avoids_first_round_rematches() {
        // Plain 1v8 pairs seed 1 (group 1) with seed 8 (group 1).
        let nodes = generate_bracket(&eight_seeds(), SeedingRule::CrossGroup, &[]).unwrap();
        for node in &nodes {
            let home = eight_seeds().iter().find(|s| Some(s.team_id) == node.home_team).unwrap().group_id;
            let away = eight_seeds().iter().find(|s| Some(s.team_id) == node.away_team).unwrap().group_id;
            assert_ne!(home, away, "node {} pairs two teams of group {home}", node.code());
        }
    }

    #[test]
    fn unfixable_same_group_pair_is_left_alone() {
        // Every team in one group: no swap can help.
        let seeds: Vec<Seed> = (0..4).map(|i| seed(i + 1, 10 + i as u32, 1)).collect();
        let nodes = generate_bracket(&seeds, SeedingRule::CrossGroup, &[]).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!((nodes[0].home_team, nodes[0].away_team), (Some(10), Some(13)));
    }

    #[test]
    fn odd_field_size_is_rejected() {
        let seeds: Vec<Seed> = (0..6).map(|i| seed(i + 1, i as u32, i as u32)).collect();
        assert!(matches!(
            generate_bracket(&seeds, SeedingRule::CrossGroup, &[]),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn regenerating_an_existing_round_is_rejected() {
        let nodes = generate_bracket(&eight_seeds(), SeedingRule::CrossGroup, &[]).unwrap();
        let err = generate_bracket(&eight_seeds(), SeedingRule::CrossGroup, &nodes).unwrap_err();
        assert!(matches!(err, EngineError::State(ref m) if m.contains("already generated")));
    }

    #[test]
    fn results_resolve_winners_and_rounds_halve() {
        let mut nodes = generate_bracket(&eight_seeds(), SeedingRule::SeedOrder, &[]).unwrap();
        let fixtures: Vec<Fixture> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| {
                knockout_fixture(
                    100 + i as u32,
                    Phase::Quarterfinal,
                    n.slot,
                    (n.home_team.unwrap(), 2),
                    (n.away_team.unwrap(), 1),
                )
            })
            .collect();
        apply_results(&mut nodes, &fixtures).unwrap();
        assert!(nodes.iter().all(|n| n.is_decided()));
        assert_eq!(round_state(&nodes, Phase::Quarterfinal), RoundState::Complete);

        let semis = advance_round(&nodes, Phase::Quarterfinal).unwrap();
        assert_eq!(semis.len(), 2);
        assert_eq!(semis[0].home, Feeder::WinnerOf { phase: Phase::Quarterfinal, slot: 1 });
        assert_eq!(semis[0].home_team, nodes[0].winner);
        assert_eq!(semis[1].away_team, nodes[3].winner);
    }

    #[test]
    fn advancing_an_unfinished_round_is_rejected() {
        let mut nodes = generate_bracket(&eight_seeds(), SeedingRule::SeedOrder, &[]).unwrap();
        let one_result = vec![knockout_fixture(
            100,
            Phase::Quarterfinal,
            1,
            (nodes[0].home_team.unwrap(), 2),
            (nodes[0].away_team.unwrap(), 0),
        )];
        apply_results(&mut nodes, &one_result).unwrap();
        let err = advance_round(&nodes, Phase::Quarterfinal).unwrap_err();
        assert!(matches!(err, EngineError::State(ref m) if m.contains("QF-2")));
    }

    #[test]
    fn level_knockout_fixture_without_walkover_is_rejected() {
        let mut nodes = generate_bracket(&eight_seeds(), SeedingRule::SeedOrder, &[]).unwrap();
        let mut tie = knockout_fixture(
            100,
            Phase::Quarterfinal,
            1,
            (nodes[0].home_team.unwrap(), 1),
            (nodes[0].away_team.unwrap(), 1),
        );
        tie.home.result = Some(ResultCode::Draw);
        tie.away.result = Some(ResultCode::Draw);
        let err = apply_results(&mut nodes, &[tie]).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("cannot end level")));
    }

    #[test]
    fn walkover_decides_a_level_knockout_fixture() {
        let mut nodes = generate_bracket(&eight_seeds(), SeedingRule::SeedOrder, &[]).unwrap();
        let mut tie = knockout_fixture(
            100,
            Phase::Quarterfinal,
            1,
            (nodes[0].home_team.unwrap(), 0),
            (nodes[0].away_team.unwrap(), 0),
        );
        tie.home.result = Some(ResultCode::Walkover);
        tie.away.result = Some(ResultCode::Win);
        apply_results(&mut nodes, &[tie]).unwrap();
        assert_eq!(nodes[0].winner, nodes[0].away_team);
    }

    #[test]
    fn full_run_to_a_champion() {
        let mut nodes = generate_bracket(&eight_seeds(), SeedingRule::SeedOrder, &[]).unwrap();
        let mut all_nodes = Vec::new();
        let mut fixture_id = 100;

        for phase in [Phase::Quarterfinal, Phase::Semifinal, Phase::Final] {
            let fixtures: Vec<Fixture> = nodes
                .iter()
                .map(|n| {
                    fixture_id += 1;
                    // Higher seed (home slot) always wins 2-1.
                    knockout_fixture(
                        fixture_id,
                        phase,
                        n.slot,
                        (n.home_team.unwrap(), 2),
                        (n.away_team.unwrap(), 1),
                    )
                })
                .collect();
            apply_results(&mut nodes, &fixtures).unwrap();
            all_nodes.extend(nodes.clone());
            if phase != Phase::Final {
                nodes = advance_round(&all_nodes, phase).unwrap();
            }
        }

        assert_eq!(active_round(&all_nodes), Some(Phase::Final));
        assert_eq!(champion(&all_nodes), Some(11));
    }
}
