//! Per-category hourly caps on engine actions (GCRA via governor)

use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateCategory {
    /// New position entries
    Entry,
    /// Outbound trade notifications
    Notification,
}

/// Hourly caps; a missing or zero cap means unlimited
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_entries_per_hour: Option<u32>,
    pub max_notifications_per_hour: Option<u32>,
}

type DirectLimiter<C> =
    RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Budget check the position lifecycle consults before spending
pub trait ActionLimiter: Send + Sync {
    /// Consume one unit of `category`'s budget; false when exhausted
    fn check(&self, category: RateCategory) -> bool;

    /// True while an earlier denial for `category` still holds. Consumes nothing.
    fn is_exhausted(&self, category: RateCategory) -> bool;
}

/// Rate limiters keyed by action category.
///
/// Exits are never routed through here: a position must always be closable.
pub struct RateLimits<C: Clock = DefaultClock> {
    limiters: HashMap<RateCategory, DirectLimiter<C>>,
    clock: C,
    // Earliest instant a denied category can pass again
    blocked_until: Mutex<HashMap<RateCategory, C::Instant>>,
}

impl RateLimits<DefaultClock> {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, &DefaultClock::default())
    }

    pub fn unlimited() -> Self {
        Self::with_clock(&RateLimitConfig::default(), &DefaultClock::default())
    }
}

impl<C: Clock> RateLimits<C> {
    pub fn with_clock(config: &RateLimitConfig, clock: &C) -> Self {
        let mut limiters = HashMap::new();

        let caps = [
            (RateCategory::Entry, config.max_entries_per_hour),
            (RateCategory::Notification, config.max_notifications_per_hour),
        ];
        for (category, cap) in caps {
            if let Some(per_hour) = cap.and_then(NonZeroU32::new) {
                limiters.insert(
                    category,
                    RateLimiter::direct_with_clock(Quota::per_hour(per_hour), clock),
                );
            }
        }

        Self {
            limiters,
            clock: clock.clone(),
            blocked_until: Mutex::new(HashMap::new()),
        }
    }
}

impl<C> ActionLimiter for RateLimits<C>
where
    C: Clock + Send + Sync,
    C::Instant: Send + Sync,
{
    /// Unconfigured categories always pass
    fn check(&self, category: RateCategory) -> bool {
        let Some(limiter) = self.limiters.get(&category) else {
            return true;
        };
        match limiter.check() {
            Ok(()) => true,
            Err(not_until) => {
                if let Ok(mut blocked) = self.blocked_until.lock() {
                    blocked.insert(category, not_until.earliest_possible());
                }
                false
            }
        }
    }

    fn is_exhausted(&self, category: RateCategory) -> bool {
        let Ok(mut blocked) = self.blocked_until.lock() else {
            return false;
        };
        match blocked.get(&category) {
            Some(until) if self.clock.now() < *until => true,
            Some(_) => {
                blocked.remove(&category);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;
    use std::time::Duration;

    #[test]
    fn test_entry_cap_refills_over_time() {
        let clock = FakeRelativeClock::default();
        let config = RateLimitConfig {
            max_entries_per_hour: Some(2),
            max_notifications_per_hour: None,
        };
        let limits = RateLimits::with_clock(&config, &clock);

        assert!(limits.check(RateCategory::Entry));
        assert!(limits.check(RateCategory::Entry));
        assert!(!limits.check(RateCategory::Entry));

        // One cell replenishes every 30 minutes at 2/hour
        clock.advance(Duration::from_secs(30 * 60));
        assert!(limits.check(RateCategory::Entry));
        assert!(!limits.check(RateCategory::Entry));
    }

    #[test]
    fn test_denial_reported_until_refill() {
        let clock = FakeRelativeClock::default();
        let config = RateLimitConfig {
            max_entries_per_hour: Some(1),
            max_notifications_per_hour: None,
        };
        let limits = RateLimits::with_clock(&config, &clock);

        assert!(!limits.is_exhausted(RateCategory::Entry));
        assert!(limits.check(RateCategory::Entry));
        // Nothing denied yet, so nothing to report
        assert!(!limits.is_exhausted(RateCategory::Entry));
        assert!(!limits.check(RateCategory::Entry));
        assert!(limits.is_exhausted(RateCategory::Entry));
        assert!(!limits.is_exhausted(RateCategory::Notification));

        clock.advance(Duration::from_secs(60 * 60));
        assert!(!limits.is_exhausted(RateCategory::Entry));
        assert!(limits.check(RateCategory::Entry));
    }

    #[test]
    fn test_unconfigured_category_unlimited() {
        let clock = FakeRelativeClock::default();
        let config = RateLimitConfig {
            max_entries_per_hour: Some(1),
            max_notifications_per_hour: Some(0),
        };
        let limits = RateLimits::with_clock(&config, &clock);

        for _ in 0..100 {
            assert!(limits.check(RateCategory::Notification));
        }
        assert!(RateLimits::unlimited().check(RateCategory::Entry));
    }
}
