//! # Rate Limiting
//!
//! Fixed-window token buckets keyed by (endpoint, caller key), persisted in
//! the shared database so every server instance enforces the same budget.
//! When the store is unreachable the endpoint's failure mode decides.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;

use crate::config::{FailureMode, RateLimitConfig, RateLimitRule};
use crate::error::{CoreError, RepositoryError};

/// Retry hint returned when a fail-closed endpoint cannot reach the store.
const STORE_FAILURE_RETRY_SECS: u64 = 1;
const MAX_CHECK_ATTEMPTS: usize = 3;

/// Endpoints with their own bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitedEndpoint {
    /// Unauthenticated invite preview
    InviteValidation,
    /// Invite redemption
    InviteAccept,
    /// Profile-creating calls such as landlord onboarding
    Auth,
    /// Everything else behind authentication
    Api,
}

impl RateLimitedEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitedEndpoint::InviteValidation => "invite_validation",
            RateLimitedEndpoint::InviteAccept => "invite_accept",
            RateLimitedEndpoint::Auth => "auth",
            RateLimitedEndpoint::Api => "api",
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Seconds until the bucket refills; set on denial
    pub retry_after_secs: Option<u64>,
}

impl RateLimitDecision {
    fn allow(remaining: i32) -> Self {
        Self {
            allowed: true,
            remaining: remaining.max(0) as u32,
            retry_after_secs: None,
        }
    }

    fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_secs: Some(retry_after_secs.max(1)),
        }
    }
}

/// Persistent bucket storage. Every method must be a single atomic
/// conditional statement against the shared store.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Takes one token from a bucket whose window is still open and which
    /// has tokens left. Returns whether a token was taken.
    async fn consume(&self, endpoint: &str, caller_key: &str, now_ms: i64) -> Result<bool, RepositoryError>;

    /// Starts a new window on a bucket whose window has elapsed.
    async fn reset_window(
        &self,
        endpoint: &str,
        caller_key: &str,
        tokens_after: i32,
        resets_at_ms: i64,
        now_ms: i64,
    ) -> Result<bool, RepositoryError>;

    /// Creates the bucket. Returns `false` if it already exists.
    async fn insert_bucket(
        &self,
        endpoint: &str,
        caller_key: &str,
        tokens_after: i32,
        resets_at_ms: i64,
    ) -> Result<bool, RepositoryError>;

    /// Current `(tokens_remaining, window_resets_at_ms)`, if the bucket exists.
    async fn snapshot(&self, endpoint: &str, caller_key: &str) -> Result<Option<(i32, i64)>, RepositoryError>;
}

/// Shared limiter handle; cheap to clone.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn BucketStore>,
    rules: RateLimitConfig,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(store: Arc<dyn BucketStore>, rules: RateLimitConfig) -> Self {
        Self { store, rules }
    }

    pub fn rule(&self, endpoint: RateLimitedEndpoint) -> RateLimitRule {
        match endpoint {
            RateLimitedEndpoint::InviteValidation => self.rules.invite_validation,
            RateLimitedEndpoint::InviteAccept => self.rules.invite_accept,
            RateLimitedEndpoint::Auth => self.rules.auth,
            RateLimitedEndpoint::Api => self.rules.api,
        }
    }

    pub async fn check(&self, endpoint: RateLimitedEndpoint, caller_key: &str) -> RateLimitDecision {
        self.check_at(endpoint, caller_key, Utc::now().timestamp_millis())
            .await
    }

    /// Same as [`check`](Self::check) with an explicit clock, in epoch milliseconds.
    pub async fn check_at(
        &self,
        endpoint: RateLimitedEndpoint,
        caller_key: &str,
        now_ms: i64,
    ) -> RateLimitDecision {
        let rule = self.rule(endpoint);

        let decision = match self.try_check(endpoint, rule, caller_key, now_ms).await {
            Ok(decision) => decision,
            Err(error) => {
                counter!(
                    "rate_limit_store_failures_total",
                    "endpoint" => endpoint.as_str(),
                    "mode" => rule.failure_mode.as_str()
                )
                .increment(1);
                tracing::warn!(
                    endpoint = endpoint.as_str(),
                    failure_mode = %rule.failure_mode,
                    %error,
                    "Rate limit store unavailable"
                );
                match rule.failure_mode {
                    FailureMode::FailClosed => RateLimitDecision::deny(STORE_FAILURE_RETRY_SECS),
                    FailureMode::FailOpen => RateLimitDecision::allow(0),
                }
            }
        };

        counter!(
            "rate_limit_decisions_total",
            "endpoint" => endpoint.as_str(),
            "outcome" => if decision.allowed { "allowed" } else { "denied" }
        )
        .increment(1);

        if !decision.allowed {
            tracing::info!(
                endpoint = endpoint.as_str(),
                caller_key,
                retry_after_secs = decision.retry_after_secs,
                "Rate limit exceeded"
            );
        }

        decision
    }

    /// Checks and converts a denial into [`CoreError::RateLimited`].
    pub async fn enforce(
        &self,
        endpoint: RateLimitedEndpoint,
        caller_key: &str,
    ) -> Result<RateLimitDecision, CoreError> {
        let decision = self.check(endpoint, caller_key).await;
        if decision.allowed {
            Ok(decision)
        } else {
            Err(CoreError::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(STORE_FAILURE_RETRY_SECS),
            })
        }
    }

    async fn try_check(
        &self,
        endpoint: RateLimitedEndpoint,
        rule: RateLimitRule,
        caller_key: &str,
        now_ms: i64,
    ) -> Result<RateLimitDecision, RepositoryError> {
        let name = endpoint.as_str();
        let capacity = i32::try_from(rule.capacity).unwrap_or(i32::MAX);
        let window_ms = i64::try_from(rule.window_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        let resets_at_ms = now_ms.saturating_add(window_ms);

        for _ in 0..MAX_CHECK_ATTEMPTS {
            if self.store.consume(name, caller_key, now_ms).await? {
                let remaining = self
                    .store
                    .snapshot(name, caller_key)
                    .await?
                    .map_or(0, |(tokens, _)| tokens);
                return Ok(RateLimitDecision::allow(remaining));
            }

            if self
                .store
                .reset_window(name, caller_key, capacity - 1, resets_at_ms, now_ms)
                .await?
            {
                return Ok(RateLimitDecision::allow(capacity - 1));
            }

            if self
                .store
                .insert_bucket(name, caller_key, capacity - 1, resets_at_ms)
                .await?
            {
                return Ok(RateLimitDecision::allow(capacity - 1));
            }

            // The bucket exists with an open window; deny only if it is
            // really empty, otherwise another instance changed it under us.
            if let Some((tokens, window_resets_at_ms)) = self.store.snapshot(name, caller_key).await?
                && tokens <= 0
                && window_resets_at_ms > now_ms
            {
                let wait_ms = window_resets_at_ms - now_ms;
                let retry_after = (wait_ms as u64).div_ceil(1000);
                return Ok(RateLimitDecision::deny(retry_after));
            }
        }

        Ok(RateLimitDecision::deny(STORE_FAILURE_RETRY_SECS))
    }
}
