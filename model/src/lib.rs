use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Domain types — clean model, independent of the backend's wire format
// ---------------------------------------------------------------------------

/// Capability descriptor for a sport, attached to the tournament.
/// Scoring and draw rules live here instead of being inferred from
/// display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportProfile {
    pub name: String,
    pub allows_draws: bool,
    pub points_for_win: u32,
    pub points_for_draw: u32,
    pub points_for_loss: u32,
}

impl SportProfile {
    /// Football: 3/1/0, draws allowed.
    pub fn football() -> Self {
        Self {
            name: "Football".into(),
            allows_draws: true,
            points_for_win: 3,
            points_for_draw: 1,
            points_for_loss: 0,
        }
    }

    /// Basketball: 2/0/1, no draws. A regular loss still keeps one point;
    /// a walkover loss keeps none (see the standings calculator).
    pub fn basketball() -> Self {
        Self {
            name: "Basketball".into(),
            allows_draws: false,
            points_for_win: 2,
            points_for_draw: 0,
            points_for_loss: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: u32,
    pub name: String,
    pub sport: SportProfile,
    /// Fixed local zone for schedules, as an offset from UTC in seconds.
    /// Schedule-conflict matching normalizes every timestamp to this zone.
    pub utc_offset_secs: i32,
}

impl Tournament {
    /// The tournament's fixed local zone. None when the stored offset is
    /// outside chrono's ±24h range; callers surface that as an error
    /// rather than correcting it.
    pub fn zone(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: u32,
    pub name: String,
    /// None for knockout-only teams that never played a group stage.
    pub group_id: Option<u32>,
    /// Academic-program affiliation. Display metadata only.
    pub program: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: u32,
    pub tournament_id: u32,
    pub name: String,
    pub team_ids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referee {
    pub id: u32,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Phases, statuses, result codes
// ---------------------------------------------------------------------------

/// Tournament phase, ordered from group play to the final.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Group,
    Quarterfinal,
    Semifinal,
    Final,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Group => "Group Stage",
            Phase::Quarterfinal => "Quarterfinal",
            Phase::Semifinal => "Semifinal",
            Phase::Final => "Final",
        }
    }

    /// Short code used in slot labels ("QF-2", "Winner SF-1").
    pub fn code(&self) -> &'static str {
        match self {
            Phase::Group => "GR",
            Phase::Quarterfinal => "QF",
            Phase::Semifinal => "SF",
            Phase::Final => "F",
        }
    }

    pub fn is_knockout(&self) -> bool {
        !matches!(self, Phase::Group)
    }

    pub fn prev(self) -> Option<Self> {
        match self {
            Phase::Group => None,
            Phase::Quarterfinal => Some(Phase::Group),
            Phase::Semifinal => Some(Phase::Quarterfinal),
            Phase::Final => Some(Phase::Semifinal),
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Phase::Group => Some(Phase::Quarterfinal),
            Phase::Quarterfinal => Some(Phase::Semifinal),
            Phase::Semifinal => Some(Phase::Final),
            Phase::Final => None,
        }
    }

    /// Number of knockout fixtures this phase holds.
    pub fn slot_count(&self) -> usize {
        match self {
            Phase::Group => 0,
            Phase::Quarterfinal => 4,
            Phase::Semifinal => 2,
            Phase::Final => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    #[default]
    Scheduled,
    Finished,
    Postponed,
}

impl MatchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "Scheduled",
            MatchStatus::Finished => "Finished",
            MatchStatus::Postponed => "Postponed",
        }
    }
}

/// Per-side result code. Walkover is an administrative result that
/// overrides score-based win/loss/draw determination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Win,
    Loss,
    Draw,
    Walkover,
}

impl ResultCode {
    pub fn label(&self) -> &'static str {
        match self {
            ResultCode::Win => "Win",
            ResultCode::Loss => "Loss",
            ResultCode::Draw => "Draw",
            ResultCode::Walkover => "W.O.",
        }
    }
}

// ---------------------------------------------------------------------------
// Disciplinary events
// ---------------------------------------------------------------------------

/// Event-type descriptor. The penalty weight feeds the fair-play average;
/// team-level events such as a walkover carry no player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventKind {
    pub id: u32,
    pub name: String,
    pub penalty_points: u32,
    pub requires_player: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisciplinaryEvent {
    pub id: u32,
    /// The team in the owning fixture this event is charged against.
    pub team_id: u32,
    pub kind: EventKind,
    pub player_id: Option<u32>,
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// One side of a fixture. `team_id` is None until assigned — knockout
/// placeholders keep a human-readable label instead ("Winner QF-2").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Side {
    pub team_id: Option<u32>,
    pub placeholder: Option<String>,
    pub score: Option<u16>,
    pub result: Option<ResultCode>,
}

impl Side {
    pub fn seeded(team_id: u32) -> Self {
        Self { team_id: Some(team_id), ..Self::default() }
    }

    pub fn tbd(label: impl Into<String>) -> Self {
        Self { placeholder: Some(label.into()), ..Self::default() }
    }
}

/// The atomic fact of the engine: two teams, a schedule, a score, a pair
/// of result codes and the disciplinary events recorded during play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u32,
    pub tournament_id: u32,
    pub phase: Phase,
    /// Only set for GROUP-phase fixtures.
    pub group_id: Option<u32>,
    /// Bracket slot within the phase, for knockout fixtures.
    pub slot: Option<u8>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub venue_id: Option<u32>,
    pub referee_id: Option<u32>,
    pub status: MatchStatus,
    pub home: Side,
    pub away: Side,
    pub events: Vec<DisciplinaryEvent>,
    pub note: Option<String>,
}

impl Fixture {
    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    pub fn involves(&self, team_id: u32) -> bool {
        self.home.team_id == Some(team_id) || self.away.team_id == Some(team_id)
    }

    pub fn side_of(&self, team_id: u32) -> Option<&Side> {
        if self.home.team_id == Some(team_id) {
            Some(&self.home)
        } else if self.away.team_id == Some(team_id) {
            Some(&self.away)
        } else {
            None
        }
    }

    pub fn has_walkover(&self) -> bool {
        self.home.result == Some(ResultCode::Walkover)
            || self.away.result == Some(ResultCode::Walkover)
    }

    /// The local timestamp this fixture occupies, normalized to the
    /// tournament's fixed zone. None while the schedule is incomplete.
    pub fn scheduled_at(&self, zone: FixedOffset) -> Option<DateTime<FixedOffset>> {
        let date = self.date?;
        let time = self.time?;
        date.and_time(time).and_local_timezone(zone).single()
    }

    /// Winner by result codes and scores. A walkover loses outright;
    /// otherwise the higher score wins. None for draws or unplayed slots.
    pub fn winner_team_id(&self) -> Option<u32> {
        if self.home.result == Some(ResultCode::Walkover) {
            return self.away.team_id;
        }
        if self.away.result == Some(ResultCode::Walkover) {
            return self.home.team_id;
        }
        let (hs, aws) = (self.home.score?, self.away.score?);
        if hs > aws {
            self.home.team_id
        } else if aws > hs {
            self.away.team_id
        } else {
            None
        }
    }
}
