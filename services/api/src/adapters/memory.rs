//! services/api/src/adapters/memory.rs
//!
//! A process-local `StatsStore` used when no database is configured.
//! Records keep the order in which users were first seen, which the leaderboard
//! uses to break xp ties.

use async_trait::async_trait;
use rc_practice_core::domain::{StatsRecord, UserId, UserProfile, UserStats};
use rc_practice_core::ports::{PortResult, StatsStore};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStatsStore {
    records: RwLock<Vec<StatsRecord>>,
}

impl InMemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsStore for InMemoryStatsStore {
    async fn read_stats(&self, user_id: &UserId) -> PortResult<Option<UserStats>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| &r.profile.user_id == user_id)
            .map(|r| r.stats))
    }

    async fn write_stats(&self, profile: &UserProfile, stats: &UserStats) -> PortResult<()> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.profile.user_id == profile.user_id) {
            Some(existing) => {
                if profile.display_name.is_some() {
                    existing.profile.display_name = profile.display_name.clone();
                }
                if profile.avatar_url.is_some() {
                    existing.profile.avatar_url = profile.avatar_url.clone();
                }
                existing.stats = *stats;
            }
            None => records.push(StatsRecord {
                profile: profile.clone(),
                stats: *stats,
            }),
        }
        Ok(())
    }

    async fn query_top_by_xp(&self, limit: usize) -> PortResult<Vec<StatsRecord>> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| b.stats.xp.cmp(&a.stats.xp));
        records.truncate(limit);
        Ok(records)
    }
}
