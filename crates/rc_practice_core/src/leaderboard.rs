//! crates/rc_practice_core/src/leaderboard.rs
//!
//! Read-only ranking of users by experience.

use crate::domain::{LeaderboardEntry, StatsRecord};

/// How many users the leaderboard shows.
pub const LEADERBOARD_SIZE: usize = 5;

/// Ranks records by xp, highest first, keeping arrival order among equal xp,
/// and keeps the first `n`.
pub fn top_n<I>(records: I, n: usize) -> Vec<LeaderboardEntry>
where
    I: IntoIterator<Item = StatsRecord>,
{
    let mut records: Vec<StatsRecord> = records.into_iter().collect();
    // `sort_by` is stable, so ties keep their arrival order.
    records.sort_by(|a, b| b.stats.xp.cmp(&a.stats.xp));
    records
        .into_iter()
        .take(n)
        .map(|record| LeaderboardEntry {
            user_id: record.profile.user_id,
            display_name: record.profile.display_name,
            avatar_url: record.profile.avatar_url,
            xp: record.stats.xp,
            streak: record.stats.streak,
        })
        .collect()
}
