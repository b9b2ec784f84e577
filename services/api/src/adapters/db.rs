//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `StatsStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::NaiveDate;
use rc_practice_core::domain::{StatsRecord, UserId, UserProfile, UserStats};
use rc_practice_core::ports::{PortError, PortResult, StatsStore};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StatsStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct StatsRow {
    xp: i64,
    streak: i32,
    tests_taken: i32,
    last_practice_date: Option<NaiveDate>,
}

impl StatsRow {
    fn to_domain(self) -> PortResult<UserStats> {
        let corrupt = |field: &str| PortError::Unexpected(format!("negative {} in user_stats", field));
        Ok(UserStats {
            xp: u64::try_from(self.xp).map_err(|_| corrupt("xp"))?,
            streak: u32::try_from(self.streak).map_err(|_| corrupt("streak"))?,
            tests_taken: u32::try_from(self.tests_taken).map_err(|_| corrupt("tests_taken"))?,
            last_practice_date: self.last_practice_date,
        })
    }
}

#[derive(FromRow)]
struct StatsRecordRow {
    user_id: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    #[sqlx(flatten)]
    stats: StatsRow,
}

impl StatsRecordRow {
    fn to_domain(self) -> PortResult<StatsRecord> {
        Ok(StatsRecord {
            profile: UserProfile {
                user_id: UserId::new(self.user_id),
                display_name: self.display_name,
                avatar_url: self.avatar_url,
            },
            stats: self.stats.to_domain()?,
        })
    }
}

fn to_column<T, U: TryFrom<T>>(value: T, field: &str) -> PortResult<U> {
    U::try_from(value).map_err(|_| PortError::Unexpected(format!("{} does not fit its column", field)))
}

//=========================================================================================
// `StatsStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl StatsStore for DbAdapter {
    async fn read_stats(&self, user_id: &UserId) -> PortResult<Option<UserStats>> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT xp, streak, tests_taken, last_practice_date FROM user_stats WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unavailable(e.to_string()))?;

        row.map(StatsRow::to_domain).transpose()
    }

    async fn write_stats(&self, profile: &UserProfile, stats: &UserStats) -> PortResult<()> {
        let xp: i64 = to_column(stats.xp, "xp")?;
        let streak: i32 = to_column(stats.streak, "streak")?;
        let tests_taken: i32 = to_column(stats.tests_taken, "tests_taken")?;

        sqlx::query(
            "INSERT INTO user_stats (user_id, display_name, avatar_url, xp, streak, tests_taken, last_practice_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (user_id) DO UPDATE SET
                display_name = COALESCE(EXCLUDED.display_name, user_stats.display_name),
                avatar_url = COALESCE(EXCLUDED.avatar_url, user_stats.avatar_url),
                xp = EXCLUDED.xp,
                streak = EXCLUDED.streak,
                tests_taken = EXCLUDED.tests_taken,
                last_practice_date = EXCLUDED.last_practice_date,
                updated_at = now()",
        )
        .bind(profile.user_id.as_str())
        .bind(profile.display_name.as_deref())
        .bind(profile.avatar_url.as_deref())
        .bind(xp)
        .bind(streak)
        .bind(tests_taken)
        .bind(stats.last_practice_date)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn query_top_by_xp(&self, limit: usize) -> PortResult<Vec<StatsRecord>> {
        let limit: i64 = to_column(limit, "limit")?;
        let records = sqlx::query_as::<_, StatsRecordRow>(
            "SELECT user_id, display_name, avatar_url, xp, streak, tests_taken, last_practice_date
             FROM user_stats ORDER BY xp DESC, created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unavailable(e.to_string()))?;

        records.into_iter().map(StatsRecordRow::to_domain).collect()
    }
}
