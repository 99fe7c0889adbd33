use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::record::ChangeEvent;

/// Key for one cached aggregate. A cache instance serves one tournament,
/// so the keys carry only the entity that scopes the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    /// The fixture list for the tournament.
    MatchList,
    /// One fixture in full.
    MatchDetail(u32),
    /// One group's standings table.
    Standings(u32),
    /// The disciplinary events of one fixture.
    MatchEvents(u32),
    /// The whole knockout tree.
    Bracket,
    /// One team's player roster.
    TeamRoster(u32),
}

/// The keys a change invalidates. This is the single source of truth for
/// which aggregates each mutation can stale: score and status changes on a
/// group fixture reach that group's standings, knockout changes reach the
/// bracket, disciplinary events reach standings through the fair-play
/// average.
pub fn invalidation_keys(event: &ChangeEvent) -> Vec<CacheKey> {
    let fixture = |id: u32| [CacheKey::MatchList, CacheKey::MatchDetail(id)];
    let mut keys = Vec::new();
    match *event {
        ChangeEvent::FixtureCreated { fixture_id, group_id, knockout }
        | ChangeEvent::FixtureRemoved { fixture_id, group_id, knockout }
        | ChangeEvent::ScoreRecorded { fixture_id, group_id, knockout }
        | ChangeEvent::StatusChanged { fixture_id, group_id, knockout, .. } => {
            keys.extend(fixture(fixture_id));
            if let Some(group_id) = group_id {
                keys.push(CacheKey::Standings(group_id));
            }
            if knockout {
                keys.push(CacheKey::Bracket);
            }
        }
        ChangeEvent::TeamsAssigned { fixture_id, knockout } => {
            keys.extend(fixture(fixture_id));
            if knockout {
                keys.push(CacheKey::Bracket);
            }
        }
        ChangeEvent::ScheduleChanged { fixture_id } => {
            keys.extend(fixture(fixture_id));
        }
        ChangeEvent::EventAdded { fixture_id, group_id }
        | ChangeEvent::EventRemoved { fixture_id, group_id } => {
            keys.extend(fixture(fixture_id));
            keys.push(CacheKey::MatchEvents(fixture_id));
            if let Some(group_id) = group_id {
                keys.push(CacheKey::Standings(group_id));
            }
        }
        // Roster edits never reach standings: points and fair-play are
        // charged to teams, not players.
        ChangeEvent::RosterChanged { team_id } => {
            keys.push(CacheKey::TeamRoster(team_id));
        }
        ChangeEvent::BracketRegenerated => {
            keys.push(CacheKey::Bracket);
        }
    }
    keys
}

/// A keyed store of derived aggregates with explicit invalidation. Readers
/// treat a miss as "recompute from the snapshot and insert"; writers feed
/// the change events of every mutation through [`AggregateCache::apply`].
#[derive(Debug, Clone, Default)]
pub struct AggregateCache<V> {
    entries: HashMap<CacheKey, V>,
}

impl<V> AggregateCache<V> {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: CacheKey, value: V) {
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry a batch of change events invalidates. Returns the
    /// number of entries actually evicted.
    pub fn apply(&mut self, events: &[ChangeEvent]) -> usize {
        let mut evicted = 0;
        for event in events {
            for key in invalidation_keys(event) {
                if self.entries.remove(&key).is_some() {
                    evicted += 1;
                    debug!("cache: evicted {key:?}");
                }
            }
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
