use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use olympiad_model::{Fixture, ResultCode, SportProfile};

use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Schedule conflicts
// ---------------------------------------------------------------------------

/// A proposed (date, time, venue, referee) slot for a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposedSchedule {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub venue_id: u32,
    pub referee_id: u32,
}

/// Check a proposed schedule against every existing fixture of the same
/// tournament. Matching is on the exact local timestamp in the tournament's
/// fixed zone — same venue or referee at a different minute does not
/// conflict. `exclude` skips the fixture being edited.
///
/// This check is advisory at the boundary: it exists to give specific,
/// early feedback, while the store of record stays the authority.
pub fn validate_schedule(
    proposed: &ProposedSchedule,
    existing: &[Fixture],
    exclude: Option<u32>,
    zone: FixedOffset,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let today = now.with_timezone(&zone).date_naive();
    if proposed.date < today {
        return Err(EngineError::Validation(format!(
            "cannot schedule a fixture on {}: date is in the past",
            proposed.date
        )));
    }

    let Some(at) = proposed.date.and_time(proposed.time).and_local_timezone(zone).single() else {
        return Err(EngineError::Validation(format!(
            "{} {} is not a valid local timestamp",
            proposed.date, proposed.time
        )));
    };

    for fixture in existing {
        if Some(fixture.id) == exclude {
            continue;
        }
        let Some(other_at) = fixture.scheduled_at(zone) else {
            continue;
        };
        if other_at != at {
            continue;
        }
        if fixture.venue_id == Some(proposed.venue_id) {
            return Err(EngineError::Validation(format!(
                "venue is already occupied at {at} by fixture {}",
                fixture.id
            )));
        }
        if fixture.referee_id == Some(proposed.referee_id) {
            return Err(EngineError::Validation(format!(
                "referee is already assigned at {at} to fixture {}",
                fixture.id
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Score / result coherence
// ---------------------------------------------------------------------------

/// Check that a score pair and a result-code pair tell the same story.
///
/// Rules, in order:
/// - a walkover on either side waives every other check;
/// - a tied score is rejected outright for sports that disallow draws;
/// - a tied score requires DRAW on both sides;
/// - otherwise the higher-scoring side must carry WIN and the other LOSS.
///
/// Incomplete input (a missing score or result code) is not an error here;
/// completeness is enforced when a fixture transitions to FINISHED.
pub fn validate_score_coherence(
    home_score: Option<u16>,
    away_score: Option<u16>,
    home_result: Option<ResultCode>,
    away_result: Option<ResultCode>,
    sport: &SportProfile,
) -> EngineResult<()> {
    if home_result == Some(ResultCode::Walkover) || away_result == Some(ResultCode::Walkover) {
        return Ok(());
    }

    let (Some(hs), Some(aws)) = (home_score, away_score) else {
        return Ok(());
    };

    if hs == aws && !sport.allows_draws {
        return Err(EngineError::Validation(format!(
            "draws are not allowed in {}: {hs}-{aws} needs a walkover on the forfeiting side",
            sport.name
        )));
    }

    let (Some(hr), Some(ar)) = (home_result, away_result) else {
        return Ok(());
    };

    if hs == aws {
        if hr != ResultCode::Draw || ar != ResultCode::Draw {
            return Err(EngineError::Validation(format!(
                "score is tied {hs}-{aws} but result codes are {} / {}, expected Draw on both sides",
                hr.label(),
                ar.label()
            )));
        }
        return Ok(());
    }

    let (winner, loser, ws, ls) = if hs > aws {
        (hr, ar, hs, aws)
    } else {
        (ar, hr, aws, hs)
    };
    if winner != ResultCode::Win {
        return Err(EngineError::Validation(format!(
            "side scoring {ws} against {ls} must carry Win, not {}",
            winner.label()
        )));
    }
    if loser != ResultCode::Loss {
        return Err(EngineError::Validation(format!(
            "side scoring {ls} against {ws} must carry Loss, not {}",
            loser.label()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use olympiad_model::{MatchStatus, Phase, Side};

    fn zone() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap()
    }

    fn scheduled(id: u32, date: (i32, u32, u32), time: (u32, u32), venue: u32, referee: u32) -> Fixture {
        Fixture {
            id,
            tournament_id: 1,
            phase: Phase::Group,
            group_id: Some(1),
            slot: None,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            time: NaiveTime::from_hms_opt(time.0, time.1, 0),
            venue_id: Some(venue),
            referee_id: Some(referee),
            status: MatchStatus::Scheduled,
            home: Side::seeded(10),
            away: Side::seeded(20),
            events: Vec::new(),
            note: None,
        }
    }

    fn proposal(time: (u32, u32), venue: u32, referee: u32) -> ProposedSchedule {
        ProposedSchedule {
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            time: NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
            venue_id: venue,
            referee_id: referee,
        }
    }

    #[test]
    fn same_venue_same_timestamp_conflicts() {
        let existing = vec![scheduled(7, (2025, 3, 1), (14, 0), 1, 1)];
        let err = validate_schedule(&proposal((14, 0), 1, 2), &existing, None, zone(), now())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("venue") && m.contains("fixture 7")));
    }

    #[test]
    fn same_venue_one_minute_later_does_not_conflict() {
        let existing = vec![scheduled(7, (2025, 3, 1), (14, 0), 1, 1)];
        assert!(validate_schedule(&proposal((14, 1), 1, 2), &existing, None, zone(), now()).is_ok());
    }

    #[test]
    fn same_referee_same_timestamp_conflicts() {
        let existing = vec![scheduled(7, (2025, 3, 1), (14, 0), 1, 3)];
        let err = validate_schedule(&proposal((14, 0), 2, 3), &existing, None, zone(), now())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("referee")));
    }

    #[test]
    fn editing_a_fixture_ignores_its_own_slot() {
        let existing = vec![scheduled(7, (2025, 3, 1), (14, 0), 1, 1)];
        assert!(
            validate_schedule(&proposal((14, 0), 1, 1), &existing, Some(7), zone(), now()).is_ok()
        );
    }

    #[test]
    fn past_dates_are_rejected() {
        let proposed = ProposedSchedule {
            date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            venue_id: 1,
            referee_id: 1,
        };
        let err = validate_schedule(&proposed, &[], None, zone(), now()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("past")));
    }

    #[test]
    fn today_in_the_local_zone_is_allowed() {
        // 2025-02-01 12:00 UTC is still 2025-02-01 at UTC-5.
        let proposed = ProposedSchedule {
            date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            venue_id: 1,
            referee_id: 1,
        };
        assert!(validate_schedule(&proposed, &[], None, zone(), now()).is_ok());
    }

    #[test]
    fn tied_score_requires_draw_on_both_sides() {
        let err = validate_score_coherence(
            Some(2),
            Some(2),
            Some(ResultCode::Win),
            Some(ResultCode::Loss),
            &SportProfile::football(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("Draw")));
    }

    #[test]
    fn higher_score_must_carry_win() {
        let err = validate_score_coherence(
            Some(3),
            Some(1),
            Some(ResultCode::Loss),
            Some(ResultCode::Win),
            &SportProfile::football(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn coherent_win_loss_passes() {
        assert!(
            validate_score_coherence(
                Some(3),
                Some(1),
                Some(ResultCode::Win),
                Some(ResultCode::Loss),
                &SportProfile::football(),
            )
            .is_ok()
        );
    }

    #[test]
    fn basketball_forbids_ties_even_without_result_codes() {
        let err = validate_score_coherence(Some(80), Some(80), None, None, &SportProfile::basketball())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("draws are not allowed")));
    }

    #[test]
    fn walkover_waives_the_no_draw_rule() {
        assert!(
            validate_score_coherence(
                Some(80),
                Some(80),
                Some(ResultCode::Walkover),
                Some(ResultCode::Win),
                &SportProfile::basketball(),
            )
            .is_ok()
        );
    }

    #[test]
    fn incomplete_input_is_not_validated() {
        assert!(
            validate_score_coherence(Some(2), None, None, None, &SportProfile::football()).is_ok()
        );
    }
}
