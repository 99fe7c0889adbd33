//! Standings and knockout progression engine for multi-sport tournament
//! programs.
//!
//! The engine is pure computation over an in-memory tournament snapshot
//! ([`record::TournamentSet`]): it validates schedules and scores, derives
//! group standings from finished fixtures, resolves who advances to the
//! knockout stage, runs the bracket to a champion, and maps every mutation
//! to the cached aggregates it stales. Persistence and transport live in
//! the embedding application.

pub mod bracket;
pub mod cache;
pub mod error;
pub mod qualify;
pub mod record;
pub mod standings;
pub mod validate;

pub use error::{EngineError, EngineResult};
