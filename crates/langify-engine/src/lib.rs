//! Langify progression and scoring rules.
//!
//! Everything here is pure: callers pass in the clock and the stored state,
//! and persist whatever comes back. No I/O, no store access.

pub mod progression;
pub mod scoring;

pub use progression::{StreakUpdate, level_for_points, points_to_next_level, update_streak, update_streak_in};
pub use scoring::{AnswerOutcome, FinalScore, LessonSession, SessionError, SessionState, is_correct, max_score, time_bonus};
