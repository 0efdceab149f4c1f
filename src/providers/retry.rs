use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;

use crate::error::FailureKind;

pub(crate) const RATE_LIMIT_MAX_ATTEMPTS: u32 = 5;
pub(crate) const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(2);
pub(crate) const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(60);
pub(crate) const TRANSPORT_MAX_ATTEMPTS: u32 = 2;
pub(crate) const TRANSPORT_DELAY: Duration = Duration::from_secs(1);

/// How often and how patiently a failure kind is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total calls allowed, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub retryable_kinds: Vec<FailureKind>,
}

impl RetryPolicy {
    /// Exponential backoff for rate-limit signals.
    pub fn rate_limit() -> Self {
        Self {
            max_attempts: RATE_LIMIT_MAX_ATTEMPTS,
            base_delay: RATE_LIMIT_BASE_DELAY,
            backoff_multiplier: 2.0,
            max_delay: RATE_LIMIT_MAX_DELAY,
            retryable_kinds: vec![FailureKind::RateLimited],
        }
    }

    /// One retry after a short fixed delay.
    pub fn transport() -> Self {
        Self {
            max_attempts: TRANSPORT_MAX_ATTEMPTS,
            base_delay: TRANSPORT_DELAY,
            backoff_multiplier: 1.0,
            max_delay: TRANSPORT_DELAY,
            retryable_kinds: vec![FailureKind::Transport],
        }
    }

    pub fn without_delay(mut self) -> Self {
        self.base_delay = Duration::ZERO;
        self.max_delay = Duration::ZERO;
        self
    }

    pub fn covers(&self, kind: FailureKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }

    /// Delay before retry number `retry_index` (0 for the first retry).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let multiplier = self.backoff_multiplier.max(1.0);
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * multiplier.powi(exponent);
        match Duration::try_from_secs_f64(secs) {
            Ok(delay) if delay < self.max_delay => delay,
            _ => self.max_delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicies {
    policies: Vec<RetryPolicy>,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self::new(vec![RetryPolicy::rate_limit(), RetryPolicy::transport()])
    }
}

impl RetryPolicies {
    pub fn new(policies: Vec<RetryPolicy>) -> Self {
        Self { policies }
    }

    /// Same kinds and attempt counts, no waiting. Used by tests and dry runs.
    pub fn immediate() -> Self {
        Self::new(
            Self::default()
                .policies
                .into_iter()
                .map(RetryPolicy::without_delay)
                .collect(),
        )
    }

    pub fn for_kind(&self, kind: FailureKind) -> Option<&RetryPolicy> {
        self.policies.iter().find(|policy| policy.covers(kind))
    }

    /// Returns the wait before the next attempt, or `None` when `kind` must not
    /// be retried again. `attempts` counts calls that already failed with `kind`.
    /// A server hint can lengthen the wait up to the policy's `max_delay`.
    pub fn next_delay(
        &self,
        kind: FailureKind,
        attempts: u32,
        retry_after: Option<Duration>,
    ) -> Option<Duration> {
        let policy = self.for_kind(kind)?;
        if attempts >= policy.max_attempts {
            return None;
        }
        let delay = policy.delay_for(attempts.saturating_sub(1));
        Some(match retry_after {
            Some(hint) if hint > delay => hint.min(policy.max_delay.max(delay)),
            _ => delay,
        })
    }

    pub fn max_attempts(&self, kind: FailureKind) -> u32 {
        self.for_kind(kind)
            .map(|policy| policy.max_attempts)
            .unwrap_or(1)
    }
}

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let code = status.as_u16();
    if code == 529 || code == 503 {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("resource_exhausted")
        || lower.contains("quota")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn rate_limit_backoff_doubles_and_caps() {
        let policy = RetryPolicy::rate_limit();
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), RATE_LIMIT_MAX_DELAY);
        assert_eq!(policy.delay_for(u32::MAX), RATE_LIMIT_MAX_DELAY);
    }

    #[test]
    fn transport_retries_once_with_fixed_delay() {
        let policies = RetryPolicies::default();
        assert_eq!(
            policies.next_delay(FailureKind::Transport, 1, None),
            Some(TRANSPORT_DELAY)
        );
        assert_eq!(policies.next_delay(FailureKind::Transport, 2, None), None);
    }

    #[test]
    fn unsupported_is_never_retried() {
        let policies = RetryPolicies::default();
        assert_eq!(policies.next_delay(FailureKind::Unsupported, 1, None), None);
        assert_eq!(policies.max_attempts(FailureKind::Unsupported), 1);
    }

    #[test]
    fn rate_limit_attempts_are_bounded() {
        let policies = RetryPolicies::default();
        for attempts in 1..RATE_LIMIT_MAX_ATTEMPTS {
            assert!(policies
                .next_delay(FailureKind::RateLimited, attempts, None)
                .is_some());
        }
        assert_eq!(
            policies.next_delay(FailureKind::RateLimited, RATE_LIMIT_MAX_ATTEMPTS, None),
            None
        );
    }

    #[test]
    fn server_hint_raises_the_delay() {
        let policies = RetryPolicies::default();
        assert_eq!(
            policies.next_delay(FailureKind::RateLimited, 1, Some(Duration::from_secs(30))),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            policies.next_delay(FailureKind::RateLimited, 1, Some(Duration::from_secs(1))),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn server_hint_is_capped_at_max_delay() {
        let policies = RetryPolicies::default();
        assert_eq!(
            policies.next_delay(FailureKind::RateLimited, 1, Some(Duration::from_secs(86_400))),
            Some(RATE_LIMIT_MAX_DELAY)
        );
        assert_eq!(
            policies.next_delay(FailureKind::Transport, 1, Some(Duration::from_secs(600))),
            Some(TRANSPORT_DELAY)
        );
    }

    #[test]
    fn immediate_policies_keep_attempt_counts() {
        let policies = RetryPolicies::immediate();
        assert_eq!(
            policies.next_delay(FailureKind::RateLimited, 3, None),
            Some(Duration::ZERO)
        );
        assert_eq!(
            policies.max_attempts(FailureKind::RateLimited),
            RATE_LIMIT_MAX_ATTEMPTS
        );
    }

    #[test]
    fn classifies_rate_limit_responses() {
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_rate_limited(StatusCode::SERVICE_UNAVAILABLE, ""));
        assert!(is_rate_limited(StatusCode::FORBIDDEN, "Daily quota exceeded"));
        assert!(!is_rate_limited(StatusCode::BAD_REQUEST, "invalid tl"));
    }

    #[test]
    fn parses_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert("retry-after", HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }
}
