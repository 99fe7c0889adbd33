use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, info};
use olympiad_model::{
    DisciplinaryEvent, EventKind, Fixture, Group, MatchStatus, Phase, Referee, ResultCode, Side,
    SportProfile, Team, Tournament, Venue,
};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::standings::{StandingsTable, TiePolicy, compute_standings};
use crate::validate::{ProposedSchedule, validate_schedule, validate_score_coherence};

// ---------------------------------------------------------------------------
// Change events
// ---------------------------------------------------------------------------

/// What a mutation touched. Every mutating operation on [`TournamentSet`]
/// returns the events it produced; the cache layer turns them into
/// invalidations, and embedders may fan them out to live subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    FixtureCreated { fixture_id: u32, group_id: Option<u32>, knockout: bool },
    FixtureRemoved { fixture_id: u32, group_id: Option<u32>, knockout: bool },
    TeamsAssigned { fixture_id: u32, knockout: bool },
    ScheduleChanged { fixture_id: u32 },
    ScoreRecorded { fixture_id: u32, group_id: Option<u32>, knockout: bool },
    StatusChanged { fixture_id: u32, group_id: Option<u32>, knockout: bool, status: MatchStatus },
    EventAdded { fixture_id: u32, group_id: Option<u32> },
    EventRemoved { fixture_id: u32, group_id: Option<u32> },
    /// A team's player list changed at the backend of record. Touches
    /// rosters, never standings.
    RosterChanged { team_id: u32 },
    /// The knockout tree was regenerated administratively.
    BracketRegenerated,
}

// ---------------------------------------------------------------------------
// Tournament snapshot
// ---------------------------------------------------------------------------

/// Input for [`TournamentSet::create_fixture`]. Teams and schedule may be
/// left open — knockout fixtures typically start with placeholders and get
/// both filled in later.
#[derive(Debug, Clone, Default)]
pub struct NewFixture {
    pub phase: Phase,
    pub group_id: Option<u32>,
    pub slot: Option<u8>,
    pub home_team: Option<u32>,
    pub away_team: Option<u32>,
    pub home_placeholder: Option<String>,
    pub away_placeholder: Option<String>,
    pub schedule: Option<ProposedSchedule>,
}

/// One tournament's complete record: teams, groups, officials and every
/// fixture. All derived data (standings, brackets) is recomputed from this
/// snapshot; the mutating operations validate first and never leave a
/// half-applied change behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentSet {
    pub tournament: Tournament,
    pub teams: Vec<Team>,
    pub groups: Vec<Group>,
    pub venues: Vec<Venue>,
    pub referees: Vec<Referee>,
    pub fixtures: Vec<Fixture>,
    next_fixture_id: u32,
    next_event_id: u32,
}

impl TournamentSet {
    pub fn new(tournament: Tournament) -> Self {
        Self {
            tournament,
            teams: Vec::new(),
            groups: Vec::new(),
            venues: Vec::new(),
            referees: Vec::new(),
            fixtures: Vec::new(),
            next_fixture_id: 1,
            next_event_id: 1,
        }
    }

    pub fn sport(&self) -> &SportProfile {
        &self.tournament.sport
    }

    fn zone(&self) -> EngineResult<FixedOffset> {
        self.tournament.zone().ok_or_else(|| {
            EngineError::Validation(format!(
                "tournament utc offset {} seconds is out of range",
                self.tournament.utc_offset_secs
            ))
        })
    }

    pub fn fixture(&self, id: u32) -> EngineResult<&Fixture> {
        self.fixtures
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("fixture {id} does not exist")))
    }

    fn fixture_index(&self, id: u32) -> EngineResult<usize> {
        self.fixtures
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("fixture {id} does not exist")))
    }

    pub fn group(&self, id: u32) -> EngineResult<&Group> {
        self.groups
            .iter()
            .find(|g| g.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("group {id} does not exist")))
    }

    pub fn team(&self, id: u32) -> EngineResult<&Team> {
        self.teams
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("team {id} does not exist")))
    }

    /// Recompute one group's table from the current snapshot.
    pub fn standings(&self, group_id: u32, policy: TiePolicy) -> EngineResult<StandingsTable> {
        let group = self.group(group_id)?;
        Ok(compute_standings(group, &self.teams, &self.fixtures, self.sport(), policy))
    }

    // -- fixture lifecycle --------------------------------------------------

    /// Register a fixture. Group fixtures need a group and both teams from
    /// it; knockout fixtures need a slot within the phase. A schedule, when
    /// given, is checked for venue/referee conflicts against every existing
    /// fixture.
    pub fn create_fixture(
        &mut self,
        new: NewFixture,
        now: DateTime<Utc>,
    ) -> EngineResult<(u32, Vec<ChangeEvent>)> {
        match new.phase {
            Phase::Group => {
                let Some(group_id) = new.group_id else {
                    return Err(EngineError::Validation(
                        "group-stage fixtures need a group".into(),
                    ));
                };
                let group = self.group(group_id)?;
                for team_id in [new.home_team, new.away_team].into_iter().flatten() {
                    if !group.team_ids.contains(&team_id) {
                        return Err(EngineError::Validation(format!(
                            "team {team_id} is not a member of {}",
                            group.name
                        )));
                    }
                }
            }
            phase => {
                let Some(slot) = new.slot else {
                    return Err(EngineError::Validation(format!(
                        "{} fixtures need a bracket slot",
                        phase.label()
                    )));
                };
                if slot == 0 || slot as usize > phase.slot_count() {
                    return Err(EngineError::Validation(format!(
                        "{} has slots 1..={}, got {slot}",
                        phase.label(),
                        phase.slot_count()
                    )));
                }
            }
        }

        if let (Some(h), Some(a)) = (new.home_team, new.away_team)
            && h == a
        {
            return Err(EngineError::Validation(format!(
                "team {h} cannot play itself"
            )));
        }
        for team_id in [new.home_team, new.away_team].into_iter().flatten() {
            self.team(team_id)?;
        }

        if let Some(schedule) = &new.schedule {
            validate_schedule(schedule, &self.fixtures, None, self.zone()?, now)?;
        }

        let side = |team: Option<u32>, placeholder: Option<String>| match team {
            Some(id) => Side::seeded(id),
            None => match placeholder {
                Some(label) => Side::tbd(label),
                None => Side::default(),
            },
        };

        let id = self.next_fixture_id;
        self.next_fixture_id += 1;
        let fixture = Fixture {
            id,
            tournament_id: self.tournament.id,
            phase: new.phase,
            group_id: new.group_id,
            slot: new.slot,
            date: new.schedule.as_ref().map(|s| s.date),
            time: new.schedule.as_ref().map(|s| s.time),
            venue_id: new.schedule.as_ref().map(|s| s.venue_id),
            referee_id: new.schedule.as_ref().map(|s| s.referee_id),
            status: MatchStatus::Scheduled,
            home: side(new.home_team, new.home_placeholder),
            away: side(new.away_team, new.away_placeholder),
            events: Vec::new(),
            note: None,
        };
        info!("fixture {id} created ({})", fixture.phase.label());
        let event = ChangeEvent::FixtureCreated {
            fixture_id: id,
            group_id: fixture.group_id,
            knockout: fixture.phase.is_knockout(),
        };
        self.fixtures.push(fixture);
        Ok((id, vec![event]))
    }

    /// Remove a fixture and everything recorded on it. Derived tables
    /// converge after the invalidations are processed.
    pub fn remove_fixture(&mut self, fixture_id: u32) -> EngineResult<Vec<ChangeEvent>> {
        let i = self.fixture_index(fixture_id)?;
        let fixture = self.fixtures.remove(i);
        info!("fixture {fixture_id} removed");
        Ok(vec![ChangeEvent::FixtureRemoved {
            fixture_id,
            group_id: fixture.group_id,
            knockout: fixture.phase.is_knockout(),
        }])
    }

    /// Put concrete teams into a fixture's slots, clearing placeholders.
    /// Rejected once the fixture is finished.
    pub fn assign_teams(
        &mut self,
        fixture_id: u32,
        home_team: u32,
        away_team: u32,
    ) -> EngineResult<Vec<ChangeEvent>> {
        if home_team == away_team {
            return Err(EngineError::Validation(format!(
                "team {home_team} cannot play itself"
            )));
        }
        self.team(home_team)?;
        self.team(away_team)?;

        let i = self.fixture_index(fixture_id)?;
        if self.fixtures[i].is_finished() {
            return Err(EngineError::State(format!(
                "fixture {fixture_id} is finished; teams can no longer change"
            )));
        }
        if let Some(group_id) = self.fixtures[i].group_id {
            let group = self.group(group_id)?;
            for team_id in [home_team, away_team] {
                if !group.team_ids.contains(&team_id) {
                    return Err(EngineError::Validation(format!(
                        "team {team_id} is not a member of {}",
                        group.name
                    )));
                }
            }
        }
        let knockout = self.fixtures[i].phase.is_knockout();
        self.fixtures[i].home = Side::seeded(home_team);
        self.fixtures[i].away = Side::seeded(away_team);
        debug!("fixture {fixture_id}: teams assigned {home_team} vs {away_team}");
        Ok(vec![ChangeEvent::TeamsAssigned { fixture_id, knockout }])
    }

    /// Re-schedule a fixture, conflict-checked with the fixture's own slot
    /// excluded.
    pub fn update_schedule(
        &mut self,
        fixture_id: u32,
        schedule: ProposedSchedule,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<ChangeEvent>> {
        let i = self.fixture_index(fixture_id)?;
        validate_schedule(&schedule, &self.fixtures, Some(fixture_id), self.zone()?, now)?;
        let fixture = &mut self.fixtures[i];
        fixture.date = Some(schedule.date);
        fixture.time = Some(schedule.time);
        fixture.venue_id = Some(schedule.venue_id);
        fixture.referee_id = Some(schedule.referee_id);
        Ok(vec![ChangeEvent::ScheduleChanged { fixture_id }])
    }

    // -- scores and results -------------------------------------------------

    /// Record a score, deriving result codes from it when none are given,
    /// and finish the fixture. Explicit codes are checked for coherence
    /// with the score; a tied score in a no-draw sport is rejected either
    /// way.
    pub fn record_score(
        &mut self,
        fixture_id: u32,
        home_score: u16,
        away_score: u16,
        results: Option<(ResultCode, ResultCode)>,
    ) -> EngineResult<Vec<ChangeEvent>> {
        let i = self.fixture_index(fixture_id)?;
        if self.fixtures[i].home.team_id.is_none() || self.fixtures[i].away.team_id.is_none() {
            return Err(EngineError::State(format!(
                "fixture {fixture_id} has unassigned teams; assign both before scoring"
            )));
        }

        let (home_result, away_result) = match results {
            Some((h, a)) => {
                validate_score_coherence(
                    Some(home_score),
                    Some(away_score),
                    Some(h),
                    Some(a),
                    self.sport(),
                )?;
                (h, a)
            }
            None => derive_results(home_score, away_score, self.sport())?,
        };

        let fixture = &mut self.fixtures[i];
        fixture.home.score = Some(home_score);
        fixture.home.result = Some(home_result);
        fixture.away.score = Some(away_score);
        fixture.away.result = Some(away_result);
        fixture.status = MatchStatus::Finished;
        debug!("fixture {fixture_id}: score {home_score}-{away_score}, finished");
        let group_id = fixture.group_id;
        let knockout = fixture.phase.is_knockout();
        Ok(vec![
            ChangeEvent::ScoreRecorded { fixture_id, group_id, knockout },
            ChangeEvent::StatusChanged {
                fixture_id,
                group_id,
                knockout,
                status: MatchStatus::Finished,
            },
        ])
    }

    /// Record a forfeit: the forfeiting side is marked W.O. with a zero
    /// score, the opponent wins, and the fixture finishes immediately.
    pub fn record_walkover(
        &mut self,
        fixture_id: u32,
        forfeiting_team_id: u32,
    ) -> EngineResult<Vec<ChangeEvent>> {
        let i = self.fixture_index(fixture_id)?;
        if self.fixtures[i].home.team_id.is_none() || self.fixtures[i].away.team_id.is_none() {
            return Err(EngineError::State(format!(
                "fixture {fixture_id} has unassigned teams; assign both before recording a walkover"
            )));
        }
        let fixture = &mut self.fixtures[i];
        let (forfeiter, opponent) = if fixture.home.team_id == Some(forfeiting_team_id) {
            (&mut fixture.home, &mut fixture.away)
        } else if fixture.away.team_id == Some(forfeiting_team_id) {
            (&mut fixture.away, &mut fixture.home)
        } else {
            return Err(EngineError::Validation(format!(
                "team {forfeiting_team_id} is not playing fixture {fixture_id}"
            )));
        };
        forfeiter.result = Some(ResultCode::Walkover);
        forfeiter.score.get_or_insert(0);
        opponent.result = Some(ResultCode::Win);
        opponent.score.get_or_insert(0);
        fixture.status = MatchStatus::Finished;
        info!("fixture {fixture_id}: walkover against team {forfeiting_team_id}");
        Ok(vec![
            ChangeEvent::ScoreRecorded {
                fixture_id,
                group_id: fixture.group_id,
                knockout: fixture.phase.is_knockout(),
            },
            ChangeEvent::StatusChanged {
                fixture_id,
                group_id: fixture.group_id,
                knockout: fixture.phase.is_knockout(),
                status: MatchStatus::Finished,
            },
        ])
    }

    /// Move a fixture between statuses. FINISHED requires both teams
    /// assigned and a complete, coherent result; the other transitions are
    /// unconditional. Reopening a finished fixture is allowed — standings
    /// recomputation absorbs it.
    pub fn set_status(
        &mut self,
        fixture_id: u32,
        status: MatchStatus,
    ) -> EngineResult<Vec<ChangeEvent>> {
        let i = self.fixture_index(fixture_id)?;

        if status == MatchStatus::Finished {
            let fixture = &self.fixtures[i];
            if fixture.home.team_id.is_none() || fixture.away.team_id.is_none() {
                return Err(EngineError::State(format!(
                    "fixture {fixture_id} cannot finish with unassigned teams"
                )));
            }
            if !fixture.has_walkover()
                && (fixture.home.score.is_none() || fixture.away.score.is_none())
            {
                return Err(EngineError::State(format!(
                    "fixture {fixture_id} cannot finish without a score"
                )));
            }
            if fixture.home.result.is_none() || fixture.away.result.is_none() {
                return Err(EngineError::State(format!(
                    "fixture {fixture_id} cannot finish without result codes"
                )));
            }
            validate_score_coherence(
                fixture.home.score,
                fixture.away.score,
                fixture.home.result,
                fixture.away.result,
                self.sport(),
            )?;
        }

        let fixture = &mut self.fixtures[i];
        fixture.status = status;
        info!("fixture {fixture_id}: status -> {}", status.label());
        Ok(vec![ChangeEvent::StatusChanged {
            fixture_id,
            group_id: fixture.group_id,
            knockout: fixture.phase.is_knockout(),
            status,
        }])
    }

    // -- disciplinary events ------------------------------------------------

    /// Charge a disciplinary event against one of the fixture's teams.
    /// Kinds that target a player require one.
    pub fn add_event(
        &mut self,
        fixture_id: u32,
        team_id: u32,
        kind: EventKind,
        player_id: Option<u32>,
        note: Option<String>,
    ) -> EngineResult<(u32, Vec<ChangeEvent>)> {
        let i = self.fixture_index(fixture_id)?;
        if !self.fixtures[i].involves(team_id) {
            return Err(EngineError::Validation(format!(
                "team {team_id} is not playing fixture {fixture_id}"
            )));
        }
        if kind.requires_player && player_id.is_none() {
            return Err(EngineError::Validation(format!(
                "event kind '{}' must name a player",
                kind.name
            )));
        }

        let id = self.next_event_id;
        self.next_event_id += 1;
        let group_id = self.fixtures[i].group_id;
        self.fixtures[i].events.push(DisciplinaryEvent { id, team_id, kind, player_id, note });
        debug!("fixture {fixture_id}: event {id} added for team {team_id}");
        Ok((id, vec![ChangeEvent::EventAdded { fixture_id, group_id }]))
    }

    pub fn remove_event(
        &mut self,
        fixture_id: u32,
        event_id: u32,
    ) -> EngineResult<Vec<ChangeEvent>> {
        let i = self.fixture_index(fixture_id)?;
        let fixture = &mut self.fixtures[i];
        let Some(pos) = fixture.events.iter().position(|e| e.id == event_id) else {
            return Err(EngineError::NotFound(format!(
                "event {event_id} does not exist on fixture {fixture_id}"
            )));
        };
        fixture.events.remove(pos);
        Ok(vec![ChangeEvent::EventRemoved { fixture_id, group_id: fixture.group_id }])
    }
}

/// Derive result codes from a bare score: a tie is a draw where the sport
/// allows one and an error where it does not, otherwise the higher score
/// wins.
pub fn derive_results(
    home_score: u16,
    away_score: u16,
    sport: &SportProfile,
) -> EngineResult<(ResultCode, ResultCode)> {
    use std::cmp::Ordering::*;
    match home_score.cmp(&away_score) {
        Greater => Ok((ResultCode::Win, ResultCode::Loss)),
        Less => Ok((ResultCode::Loss, ResultCode::Win)),
        Equal if sport.allows_draws => Ok((ResultCode::Draw, ResultCode::Draw)),
        Equal => Err(EngineError::Validation(format!(
            "draws are not allowed in {}: {home_score}-{away_score} needs a walkover on the forfeiting side",
            sport.name
        ))),
    }
}
