//! crates/rc_practice_core/src/generation.rs
//!
//! Chains several `ContentGenerator` strategies so a failing one falls through
//! to the next.

use crate::domain::{GenerationRequest, Passage};
use crate::ports::{ContentGenerator, PortError, PortResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Tries each strategy in order until one produces a passage.
///
/// When one strategy fails and another succeeds, later calls start from the
/// strategy that worked and wrap around to the others, so every strategy is
/// still tried on each call.
pub struct FallbackGenerator {
    strategies: Vec<Arc<dyn ContentGenerator>>,
    preferred: AtomicUsize,
}

impl FallbackGenerator {
    pub fn new(strategies: Vec<Arc<dyn ContentGenerator>>) -> Self {
        Self {
            strategies,
            preferred: AtomicUsize::new(0),
        }
    }

    /// Name of the strategy the next call will try first.
    pub fn preferred_strategy(&self) -> Option<&str> {
        self.strategies
            .get(self.preferred.load(Ordering::Relaxed))
            .map(|s| s.name())
    }
}

#[async_trait]
impl ContentGenerator for FallbackGenerator {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn generate_passage(&self, request: &GenerationRequest) -> PortResult<Passage> {
        let count = self.strategies.len();
        let start = self.preferred.load(Ordering::Relaxed);
        let mut last_error = None;

        for index in (0..count).map(|offset| (start + offset) % count) {
            let strategy = &self.strategies[index];
            match strategy.generate_passage(request).await {
                Ok(passage) => {
                    if index != start {
                        info!("Generator '{}' succeeded; preferring it from now on.", strategy.name());
                        self.preferred.store(index, Ordering::Relaxed);
                    }
                    return Ok(passage);
                }
                Err(e) => {
                    warn!("Generator '{}' failed: {}", strategy.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| PortError::Unavailable("no content generator configured".to_string())))
    }
}
