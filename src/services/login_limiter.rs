//! Per-address login throttling.
//!
//! Every source address moves through `Clean -> Tracking -> Blocked -> Clean`:
//!
//! - **Clean**: no entry stored.
//! - **Tracking**: `1..max_attempts` failures inside the window opened by the
//!   first failure.
//! - **Blocked**: `max_attempts` reached; rejected until `blocked_until`. The next
//!   check after that instant deletes the entry.
//!
//! All transitions go through [`Collection::update`], so concurrent failures for
//! the same address are serialized and never undercounted.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::LoginThrottleConfig;
use crate::db::{Collection, StoreError};
use crate::entities::login_attempts::Model as LoginAttempt;

/// Longest window or block accepted from configuration (one year).
const MAX_POLICY_DURATION_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterPolicy {
    pub max_attempts: u32,
    pub window: Duration,
    pub block_duration: Duration,
}

impl LimiterPolicy {
    fn seconds(secs: u64) -> Duration {
        let secs = i64::try_from(secs)
            .unwrap_or(MAX_POLICY_DURATION_SECS)
            .clamp(1, MAX_POLICY_DURATION_SECS);
        Duration::seconds(secs)
    }
}

impl Default for LimiterPolicy {
    fn default() -> Self {
        Self::from(&LoginThrottleConfig::default())
    }
}

impl From<&LoginThrottleConfig> for LimiterPolicy {
    fn from(config: &LoginThrottleConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            window: Self::seconds(config.window_seconds),
            block_duration: Self::seconds(config.block_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Clear,
    Blocked {
        blocked_until: DateTime<Utc>,
        remaining_minutes: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Allowed { attempts_left: u32 },
    Blocked { blocked_until: DateTime<Utc> },
}

/// Whole minutes left until `until`, rounded up and never below one.
#[must_use]
pub fn remaining_minutes(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (until - now).num_seconds().max(0);
    ((secs + 59) / 60).max(1)
}

#[derive(Clone)]
pub struct LoginLimiter {
    attempts: Collection<LoginAttempt>,
    policy: LimiterPolicy,
}

impl LoginLimiter {
    #[must_use]
    pub const fn new(attempts: Collection<LoginAttempt>, policy: LimiterPolicy) -> Self {
        Self { attempts, policy }
    }

    pub async fn check_blocked(&self, address: &str) -> Result<BlockStatus, StoreError> {
        self.check_blocked_at(address, Utc::now()).await
    }

    /// Reject while a block is active; prune the entry once the block has elapsed.
    pub async fn check_blocked_at(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<BlockStatus, StoreError> {
        let entry = self
            .attempts
            .update(address, |entry| match entry {
                Some(e) if e.block_elapsed_at(now) => {
                    debug!("Block on {} expired, clearing entry", e.address);
                    None
                }
                other => other,
            })
            .await?;

        Ok(match entry.and_then(|e| e.blocked_until) {
            Some(until) if until > now => BlockStatus::Blocked {
                blocked_until: until,
                remaining_minutes: remaining_minutes(until, now),
            },
            _ => BlockStatus::Clear,
        })
    }

    pub async fn record_failure(&self, address: &str) -> Result<FailureOutcome, StoreError> {
        self.record_failure_at(address, Utc::now()).await
    }

    pub async fn record_failure_at(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, StoreError> {
        let policy = self.policy;
        let mut newly_blocked = false;

        let entry = self
            .attempts
            .update(address, |entry| {
                let mut e = match entry {
                    None => LoginAttempt::first_failure(address, now),
                    // An active block is never extended or reset by further failures.
                    Some(mut e) if e.is_blocked_at(now) => {
                        e.last_attempt = now;
                        return Some(e);
                    }
                    Some(mut e)
                        if e.first_attempt + policy.window <= now || e.block_elapsed_at(now) =>
                    {
                        e.attempts = 1;
                        e.first_attempt = now;
                        e.blocked_until = None;
                        e
                    }
                    Some(mut e) => {
                        e.attempts = e.attempts.saturating_add(1);
                        e
                    }
                };

                e.last_attempt = now;
                if e.attempts >= policy.max_attempts {
                    e.blocked_until = Some(now + policy.block_duration);
                    newly_blocked = true;
                }
                Some(e)
            })
            .await?;

        let Some(entry) = entry else {
            return Ok(FailureOutcome::Allowed {
                attempts_left: policy.max_attempts,
            });
        };

        if newly_blocked {
            metrics::counter!("login_blocks_total").increment(1);
            warn!(
                "Blocking {} until {} after {} failed login attempts",
                entry.address,
                entry.blocked_until.map(|t| t.to_rfc3339()).unwrap_or_default(),
                entry.attempts
            );
        }

        Ok(match entry.blocked_until {
            Some(blocked_until) if blocked_until > now => FailureOutcome::Blocked { blocked_until },
            _ => FailureOutcome::Allowed {
                attempts_left: policy.max_attempts.saturating_sub(entry.attempts),
            },
        })
    }

    /// Any successful login fully resets the address.
    pub async fn record_success(&self, address: &str) -> Result<bool, StoreError> {
        self.attempts.delete(address).await
    }

    pub async fn status(&self, address: &str) -> Result<Option<LoginAttempt>, StoreError> {
        self.attempts.get(address).await
    }

    pub async fn list(&self) -> Result<Vec<LoginAttempt>, StoreError> {
        self.attempts.all().await
    }

    pub async fn cleanup(&self) -> Result<usize, StoreError> {
        self.cleanup_at(Utc::now()).await
    }

    /// Drop entries idle for more than twice the window, unless still blocked.
    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let stale_before = now - self.policy.window * 2;

        let removed = self
            .attempts
            .retain(|e| e.is_blocked_at(now) || e.last_attempt >= stale_before)
            .await?;

        if removed > 0 {
            info!("Pruned {} stale login attempt entries", removed);
        }

        Ok(removed)
    }
}
