//! Two-tier admission control
//!
//! Plain HTTP fetches and browser renders draw from separate semaphores so a
//! burst of escalations cannot starve the cheap tier, and the browser never
//! holds more contexts than its pool allows.

use std::fmt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::harvest::FetchError;

/// Fetch tier a permit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Light,
    Heavy,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Heavy => write!(f, "heavy"),
        }
    }
}

/// A held admission slot; the slot is returned on [`TierPermit::release`] or drop
#[derive(Debug)]
pub struct TierPermit {
    tier: Tier,
    _permit: OwnedSemaphorePermit,
}

impl TierPermit {
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Returns the slot to its pool
    pub fn release(self) {}
}

/// Bounded admission for the light and heavy fetch tiers
#[derive(Debug)]
pub struct ConcurrencyGovernor {
    light: Arc<Semaphore>,
    heavy: Arc<Semaphore>,
    light_capacity: usize,
    heavy_capacity: usize,
}

impl ConcurrencyGovernor {
    /// Creates a governor with fixed per-tier capacities
    ///
    /// A capacity of zero would deadlock every caller, so it is raised to one.
    pub fn new(light_capacity: usize, heavy_capacity: usize) -> Self {
        let light_capacity = light_capacity.max(1);
        let heavy_capacity = heavy_capacity.max(1);
        Self {
            light: Arc::new(Semaphore::new(light_capacity)),
            heavy: Arc::new(Semaphore::new(heavy_capacity)),
            light_capacity,
            heavy_capacity,
        }
    }

    /// Waits until a slot of `tier` is free and takes it
    pub async fn acquire(&self, tier: Tier) -> Result<TierPermit, FetchError> {
        let permit = self
            .pool(tier)
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::GovernorClosed(tier))?;
        tracing::trace!("Acquired {} permit", tier);
        Ok(TierPermit {
            tier,
            _permit: permit,
        })
    }

    pub fn capacity(&self, tier: Tier) -> usize {
        match tier {
            Tier::Light => self.light_capacity,
            Tier::Heavy => self.heavy_capacity,
        }
    }

    /// Number of slots of `tier` currently held
    pub fn in_use(&self, tier: Tier) -> usize {
        self.capacity(tier) - self.pool(tier).available_permits()
    }

    fn pool(&self, tier: Tier) -> &Arc<Semaphore> {
        match tier {
            Tier::Light => &self.light,
            Tier::Heavy => &self.heavy,
        }
    }
}
