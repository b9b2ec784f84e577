//! crates/rc_practice_core/src/ledger.rs
//!
//! Experience and streak bookkeeping. Given the persisted stats and a scored
//! session, computes the record to write back.

use crate::domain::UserStats;
use chrono::NaiveDate;

/// Experience awarded for each correctly answered question.
pub const XP_PER_CORRECT: u64 = 10;

/// Computes the stats that follow a submitted session on `today`.
///
/// A second submission on the same calendar day leaves the streak untouched.
/// Practising the day after the last session extends it; any longer gap, or a
/// first-ever session, starts a new streak at 1.
pub fn next_stats(prev: &UserStats, today: NaiveDate, correct_count: u32) -> UserStats {
    let streak = match prev.last_practice_date {
        Some(last) if last == today => prev.streak,
        Some(last) if today.pred_opt() == Some(last) => prev.streak.saturating_add(1),
        _ => 1,
    };

    UserStats {
        xp: prev.xp.saturating_add(u64::from(correct_count) * XP_PER_CORRECT),
        streak,
        tests_taken: prev.tests_taken.saturating_add(1),
        last_practice_date: Some(today),
    }
}

/// The streak as it should be displayed on `today`.
///
/// A streak whose last practice is older than yesterday has already lapsed and
/// reads as 0. The stored value is not rewritten; the next submission resets it.
pub fn effective_streak(stats: &UserStats, today: NaiveDate) -> u32 {
    match stats.last_practice_date {
        Some(last) if last == today || today.pred_opt() == Some(last) => stats.streak,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn practised(last: &str) -> UserStats {
        UserStats {
            xp: 50,
            streak: 3,
            tests_taken: 5,
            last_practice_date: Some(day(last)),
        }
    }

    #[test]
    fn consecutive_day_extends_streak() {
        let next = next_stats(&practised("2025-11-24"), day("2025-11-25"), 3);
        assert_eq!(
            next,
            UserStats {
                xp: 80,
                streak: 4,
                tests_taken: 6,
                last_practice_date: Some(day("2025-11-25")),
            }
        );
    }

    #[test]
    fn gap_starts_new_streak() {
        let next = next_stats(&practised("2025-11-24"), day("2025-11-27"), 3);
        assert_eq!(next.streak, 1);
        assert_eq!(next.xp, 80);
        assert_eq!(next.tests_taken, 6);
    }

    #[test]
    fn first_session_starts_streak_at_one() {
        let next = next_stats(&UserStats::default(), day("2025-11-25"), 0);
        assert_eq!(next.streak, 1);
        assert_eq!(next.xp, 0);
        assert_eq!(next.tests_taken, 1);
        assert_eq!(next.last_practice_date, Some(day("2025-11-25")));
    }

    #[test]
    fn same_day_submission_keeps_streak() {
        let first = next_stats(&practised("2025-11-24"), day("2025-11-25"), 2);
        let second = next_stats(&first, day("2025-11-25"), 4);
        assert_eq!(second.streak, first.streak);
        assert_eq!(second.xp, first.xp + 40);
        assert_eq!(second.tests_taken, first.tests_taken + 1);
    }

    #[test]
    fn month_and_year_boundaries_count_as_consecutive() {
        assert_eq!(next_stats(&practised("2025-11-30"), day("2025-12-01"), 1).streak, 4);
        assert_eq!(next_stats(&practised("2025-12-31"), day("2026-01-01"), 1).streak, 4);
        assert_eq!(next_stats(&practised("2024-02-28"), day("2024-03-01"), 1).streak, 1);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let prev = practised("2025-11-24");
        assert_eq!(
            next_stats(&prev, day("2025-11-25"), 2),
            next_stats(&prev, day("2025-11-25"), 2)
        );
    }

    #[test]
    fn xp_grows_by_ten_per_correct_answer_and_never_drops() {
        let mut stats = UserStats::default();
        let mut today = day("2025-11-01");
        for correct in [0, 4, 1, 0, 3] {
            let next = next_stats(&stats, today, correct);
            assert_eq!(next.xp, stats.xp + 10 * u64::from(correct));
            assert!(next.xp >= stats.xp);
            stats = next;
            today = today.succ_opt().unwrap();
        }
        assert_eq!(stats.streak, 5);
    }

    #[test]
    fn effective_streak_lapses_after_missed_day() {
        let stats = practised("2025-11-24");
        assert_eq!(effective_streak(&stats, day("2025-11-24")), 3);
        assert_eq!(effective_streak(&stats, day("2025-11-25")), 3);
        assert_eq!(effective_streak(&stats, day("2025-11-26")), 0);
        assert_eq!(effective_streak(&UserStats::default(), day("2025-11-26")), 0);
    }
}
