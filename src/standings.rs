use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;
use olympiad_model::{Fixture, Group, ResultCode, SportProfile, Team};
use serde::{Deserialize, Serialize};

/// One team's line in a group table. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub team_id: u32,
    pub team_name: String,
    pub played: u32,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    pub walkovers: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub goal_difference: i32,
    pub points: u32,
    /// Disciplinary penalty average, lower is better. 0 until the team
    /// has played.
    pub fair_play: f64,
}

/// What to do with teams still tied after all four ranking criteria.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TiePolicy {
    /// Leave residual ties in input order (stable sort).
    #[default]
    KeepInputOrder,
    /// Same ordering, but report each tied cluster for manual review.
    Flag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingsTable {
    pub group_id: u32,
    pub rows: Vec<StandingsRow>,
    /// Team-id clusters indistinguishable by all four criteria.
    /// Populated only under `TiePolicy::Flag`.
    pub unresolved_ties: Vec<Vec<u32>>,
}

/// Four-criterion ranking order: points, then goal difference, then goals
/// for (all descending), then fair-play average (ascending). Shared with
/// the qualification resolver for cross-group wildcard comparison.
pub fn compare_rows(a: &StandingsRow, b: &StandingsRow) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.goal_difference.cmp(&a.goal_difference))
        .then_with(|| b.goals_for.cmp(&a.goals_for))
        .then_with(|| a.fair_play.partial_cmp(&b.fair_play).unwrap_or(Ordering::Equal))
}

/// Recompute a group's table from its full set of FINISHED fixtures.
///
/// Always a from-scratch recompute, never an incremental patch: that is
/// what makes redundant or out-of-order recomputation converge to the same
/// table after any edit or deletion. Scheduled and postponed fixtures are
/// excluded. Points come from the result codes, not from re-comparing raw
/// scores, so walkover-driven results hold even with absent or zero scores.
pub fn compute_standings(
    group: &Group,
    teams: &[Team],
    fixtures: &[Fixture],
    sport: &SportProfile,
    policy: TiePolicy,
) -> StandingsTable {
    let names: HashMap<u32, &str> =
        teams.iter().map(|t| (t.id, t.name.as_str())).collect();

    // Every member team gets a zero row, in group membership order.
    let mut index: HashMap<u32, usize> = HashMap::new();
    let mut rows: Vec<StandingsRow> = Vec::with_capacity(group.team_ids.len());
    for &team_id in &group.team_ids {
        index.insert(team_id, rows.len());
        rows.push(StandingsRow {
            team_id,
            team_name: names
                .get(&team_id)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("Team {team_id}")),
            played: 0,
            won: 0,
            drawn: 0,
            lost: 0,
            walkovers: 0,
            goals_for: 0,
            goals_against: 0,
            goal_difference: 0,
            points: 0,
            fair_play: 0.0,
        });
    }

    let mut penalties: HashMap<u32, u32> = HashMap::new();

    for fixture in fixtures {
        if fixture.group_id != Some(group.id) || !fixture.is_finished() {
            continue;
        }
        let (Some(home_id), Some(away_id)) = (fixture.home.team_id, fixture.away.team_id) else {
            continue;
        };

        for event in &fixture.events {
            *penalties.entry(event.team_id).or_default() += event.kind.penalty_points;
        }

        let home_score = fixture.home.score.unwrap_or(0) as u32;
        let away_score = fixture.away.score.unwrap_or(0) as u32;

        for (team_id, own, opp, result) in [
            (home_id, home_score, away_score, fixture.home.result),
            (away_id, away_score, home_score, fixture.away.result),
        ] {
            let Some(&i) = index.get(&team_id) else {
                debug!("fixture {} references team {team_id} outside group {}", fixture.id, group.id);
                continue;
            };
            let row = &mut rows[i];
            row.played += 1;
            row.goals_for += own;
            row.goals_against += opp;
            match result {
                Some(ResultCode::Win) => {
                    row.won += 1;
                    row.points += sport.points_for_win;
                }
                Some(ResultCode::Draw) => {
                    row.drawn += 1;
                    row.points += sport.points_for_draw;
                }
                Some(ResultCode::Loss) => {
                    row.lost += 1;
                    row.points += sport.points_for_loss;
                }
                // A walkover loss scores nothing, even in sports where a
                // regular loss keeps a point.
                Some(ResultCode::Walkover) => {
                    row.lost += 1;
                    row.walkovers += 1;
                }
                None => {}
            }
        }
    }

    for row in &mut rows {
        row.goal_difference = row.goals_for as i32 - row.goals_against as i32;
        if row.played > 0 {
            row.fair_play =
                penalties.get(&row.team_id).copied().unwrap_or(0) as f64 / row.played as f64;
        }
    }

    rows.sort_by(compare_rows);

    let unresolved_ties = match policy {
        TiePolicy::KeepInputOrder => Vec::new(),
        TiePolicy::Flag => tied_clusters(&rows),
    };

    debug!(
        "standings recomputed for group {}: {} rows, {} unresolved tie cluster(s)",
        group.id,
        rows.len(),
        unresolved_ties.len()
    );

    StandingsTable { group_id: group.id, rows, unresolved_ties }
}

fn tied_clusters(rows: &[StandingsRow]) -> Vec<Vec<u32>> {
    let mut clusters = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        let still_tied =
            i < rows.len() && compare_rows(&rows[start], &rows[i]) == Ordering::Equal;
        if !still_tied {
            if i - start >= 2 {
                clusters.push(rows[start..i].iter().map(|r| r.team_id).collect());
            }
            start = i;
        }
    }
    clusters
}
