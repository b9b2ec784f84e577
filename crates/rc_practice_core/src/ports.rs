//! crates/rc_practice_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the generative-text API and the hosted stats store.

use crate::domain::{GenerationRequest, Passage, StatsRecord, UserId, UserProfile, UserStats};
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed payload: {0}")]
    Malformed(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Short label used in logs when strategies are chained.
    fn name(&self) -> &str;

    /// Produces a passage with its question set. Implementations return
    /// `PortError::Malformed` when the upstream payload does not have the passage shape.
    async fn generate_passage(&self, request: &GenerationRequest) -> PortResult<Passage>;
}

#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Returns `None` when the user has no stats record yet.
    async fn read_stats(&self, user_id: &UserId) -> PortResult<Option<UserStats>>;

    /// Creates or replaces the user's record, refreshing the display attributes.
    async fn write_stats(&self, profile: &UserProfile, stats: &UserStats) -> PortResult<()>;

    /// Returns at most `limit` records ordered by xp, highest first.
    async fn query_top_by_xp(&self, limit: usize) -> PortResult<Vec<StatsRecord>>;
}
