//! Retry policy: how many times and how long to wait.

use std::time::Duration;

/// What to do with an item that just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put it on the retry queue.
    Retry,
    /// Out of budget: log and drop.
    GiveUp,
}

/// Retry policy for failed deliveries.
///
/// Fixed delay, no jitter, same treatment for every failure cause. With the
/// defaults an item gets 1 initial attempt + 3 retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,

    /// Wait before every retry.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Decide based on the attempt count *after* recording the failure.
    ///
    /// - 1..=max_retries → Retry
    /// - above → GiveUp
    pub fn decide(&self, attempt_count: u32) -> RetryDecision {
        if attempt_count <= self.max_retries {
            RetryDecision::Retry
        } else {
            RetryDecision::GiveUp
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_policy_has_expected_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay, Duration::from_secs(30));
    }

    #[rstest]
    #[case::first_failure(1, RetryDecision::Retry)]
    #[case::second_failure(2, RetryDecision::Retry)]
    #[case::third_failure(3, RetryDecision::Retry)]
    #[case::fourth_failure(4, RetryDecision::GiveUp)]
    fn decide_follows_counter(#[case] attempt_count: u32, #[case] expected: RetryDecision) {
        assert_eq!(RetryPolicy::default().decide(attempt_count), expected);
    }

    #[test]
    fn zero_retries_gives_up_immediately() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.decide(1), RetryDecision::GiveUp);
    }
}
