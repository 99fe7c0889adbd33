use log::debug;
use olympiad_model::{Fixture, Group, Phase};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::standings::{StandingsRow, StandingsTable, compare_rows};

/// How wildcard candidates are compared across groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WildcardRule {
    /// Same four-criterion ordering as within a group, over each
    /// candidate's full group-stage record.
    #[default]
    GroupCriteria,
}

/// Advancement rule: the top `advance_per_group` teams of every group
/// qualify; `wildcard_slots` more go to the best-ranked team left out of
/// each group ("best thirds" when `advance_per_group` is 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualificationRule {
    pub advance_per_group: usize,
    pub wildcard_slots: usize,
    pub wildcard: WildcardRule,
}

impl QualificationRule {
    /// Top 2 per group plus 2 best thirds — an 8-team knockout.
    pub fn top_two_plus_best_thirds() -> Self {
        Self { advance_per_group: 2, wildcard_slots: 2, wildcard: WildcardRule::GroupCriteria }
    }

    /// Top 2 per group, no wildcards — a 4-team knockout from 2 groups.
    pub fn top_two() -> Self {
        Self { advance_per_group: 2, wildcard_slots: 0, wildcard: WildcardRule::GroupCriteria }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualificationDecision {
    pub team_id: u32,
    pub team_name: String,
    pub group_id: u32,
    pub position_in_group: usize,
    pub qualified: bool,
    /// Human-readable qualifying slot: "1st Group A", "Best 3rd place (Group B)".
    pub reason: Option<String>,
}

/// A qualified team with its overall seed (1 = strongest), ready for
/// bracket generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seed {
    pub seed: usize,
    pub team_id: u32,
    pub team_name: String,
    pub group_id: u32,
}

// ---------------------------------------------------------------------------
// Group-stage completion gate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStageProgress {
    pub played: usize,
    pub total: usize,
    pub may_generate: bool,
    pub message: String,
}

/// Report group-stage progress and whether the knockout bracket may be
/// generated. `required_completion` is the fraction of group fixtures that
/// must be FINISHED; pass 1.0 to require the whole stage.
pub fn group_stage_progress(fixtures: &[Fixture], required_completion: f64) -> GroupStageProgress {
    let group_fixtures: Vec<&Fixture> =
        fixtures.iter().filter(|f| f.phase == Phase::Group).collect();
    let total = group_fixtures.len();
    let played = group_fixtures.iter().filter(|f| f.is_finished()).count();

    if total == 0 {
        return GroupStageProgress {
            played: 0,
            total: 0,
            may_generate: false,
            message: "no group-stage fixtures registered".into(),
        };
    }

    let required = required_completion.clamp(0.0, 1.0);
    let may_generate = played as f64 >= required * total as f64;
    let message = if may_generate {
        "group stage complete enough to generate the knockout bracket".into()
    } else {
        format!("{} group-stage fixture(s) still pending", total - played)
    };

    GroupStageProgress { played, total, may_generate, message }
}

// ---------------------------------------------------------------------------
// Qualification resolution
// ---------------------------------------------------------------------------

/// Apply the advancement rule to ranked group tables, producing one
/// decision per team. Tables must already be ranked (`compute_standings`
/// output); wildcard candidates are each group's first non-qualified row,
/// compared across groups with the shared four-criterion ordering.
pub fn resolve_qualification(
    groups: &[(Group, StandingsTable)],
    rule: &QualificationRule,
) -> EngineResult<Vec<QualificationDecision>> {
    if rule.advance_per_group == 0 && rule.wildcard_slots == 0 {
        return Err(EngineError::Validation(
            "qualification rule admits no teams".into(),
        ));
    }
    if groups.is_empty() {
        return Err(EngineError::NotFound("no groups to resolve qualification for".into()));
    }

    let wildcard_ids = wildcard_team_ids(groups, rule);

    let mut decisions = Vec::new();
    for (group, table) in groups {
        for (idx, row) in table.rows.iter().enumerate() {
            let position = idx + 1;
            let (qualified, reason) = if idx < rule.advance_per_group {
                (true, Some(format!("{} {}", ordinal(position), group.name)))
            } else if wildcard_ids.contains(&row.team_id) {
                (true, Some(format!("Best {} place ({})", ordinal(position), group.name)))
            } else {
                (false, None)
            };
            decisions.push(QualificationDecision {
                team_id: row.team_id,
                team_name: row.team_name.clone(),
                group_id: group.id,
                position_in_group: position,
                qualified,
                reason,
            });
        }
    }

    debug!(
        "qualification resolved: {} of {} teams advance",
        decisions.iter().filter(|d| d.qualified).count(),
        decisions.len()
    );

    Ok(decisions)
}

/// Order every qualified team by the shared four-criterion ranking and
/// assign overall seeds. This is the input to bracket generation: seed 1
/// meets the weakest seed in the first knockout round.
pub fn seeded_qualifiers(
    groups: &[(Group, StandingsTable)],
    rule: &QualificationRule,
) -> EngineResult<Vec<Seed>> {
    let decisions = resolve_qualification(groups, rule)?;

    let mut qualified_rows: Vec<(&Group, &StandingsRow)> = Vec::new();
    for (group, table) in groups {
        for row in &table.rows {
            let advanced = decisions
                .iter()
                .any(|d| d.team_id == row.team_id && d.group_id == group.id && d.qualified);
            if advanced {
                qualified_rows.push((group, row));
            }
        }
    }
    qualified_rows.sort_by(|a, b| compare_rows(a.1, b.1));

    Ok(qualified_rows
        .into_iter()
        .enumerate()
        .map(|(idx, (group, row))| Seed {
            seed: idx + 1,
            team_id: row.team_id,
            team_name: row.team_name.clone(),
            group_id: group.id,
        })
        .collect())
}

fn wildcard_team_ids(
    groups: &[(Group, StandingsTable)],
    rule: &QualificationRule,
) -> Vec<u32> {
    if rule.wildcard_slots == 0 {
        return Vec::new();
    }
    // One candidate per group: the first row left out by the top-K cut.
    let mut candidates: Vec<&StandingsRow> = groups
        .iter()
        .filter_map(|(_, table)| table.rows.get(rule.advance_per_group))
        .collect();
    match rule.wildcard {
        WildcardRule::GroupCriteria => candidates.sort_by(|a, b| compare_rows(a, b)),
    }
    candidates.iter().take(rule.wildcard_slots).map(|r| r.team_id).collect()
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
