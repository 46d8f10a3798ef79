//! Retry policy engine.

use std::time::Duration;

use photon_config::RetryPolicy;
use photon_workflow::matches_error;

/// Outcome of consulting the retry policies for one failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
  RetryAfter(Duration),
  Exhausted,
}

/// The first policy, in declaration order, whose error list matches `error_class`.
pub fn matching_policy<'a>(
  error_class: &str,
  policies: &'a [RetryPolicy],
) -> Option<(usize, &'a RetryPolicy)> {
  policies
    .iter()
    .enumerate()
    .find(|(_, policy)| matches_error(&policy.errors, error_class))
}

/// Decide whether a failure is retried.
///
/// `attempt` counts the failures governed by the matching policy, this one
/// included (1 for the first failure). Only the first matching policy is
/// consulted, so a `max_attempts = 0` policy for a specific class shadows a
/// later wildcard.
pub fn decide(error_class: &str, attempt: u32, policies: &[RetryPolicy]) -> RetryDecision {
  match matching_policy(error_class, policies) {
    Some((_, policy)) if attempt <= policy.max_attempts => {
      RetryDecision::RetryAfter(backoff_delay(policy, attempt))
    }
    _ => RetryDecision::Exhausted,
  }
}

/// `interval * rate^(attempt - 1)`, capped by `max_delay_seconds`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
  let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
  let mut seconds = policy.interval_seconds * policy.backoff_rate.powi(exponent);
  if let Some(max_delay) = policy.max_delay_seconds {
    seconds = seconds.min(max_delay);
  }
  Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn policy(errors: &[&str], max_attempts: u32, interval: f64, rate: f64) -> RetryPolicy {
    RetryPolicy {
      errors: errors.iter().map(|e| e.to_string()).collect(),
      interval_seconds: interval,
      max_attempts,
      backoff_rate: rate,
      max_delay_seconds: None,
    }
  }

  #[test]
  fn test_backoff_sequence() {
    let policies = vec![policy(&["States.ALL"], 3, 1.0, 2.0)];

    assert_eq!(
      decide("States.TaskFailed", 1, &policies),
      RetryDecision::RetryAfter(Duration::from_secs(1))
    );
    assert_eq!(
      decide("States.TaskFailed", 2, &policies),
      RetryDecision::RetryAfter(Duration::from_secs(2))
    );
    assert_eq!(
      decide("States.TaskFailed", 3, &policies),
      RetryDecision::RetryAfter(Duration::from_secs(4))
    );
    assert_eq!(
      decide("States.TaskFailed", 4, &policies),
      RetryDecision::Exhausted
    );
  }

  #[test]
  fn test_fractional_backoff_rate() {
    let policies = vec![policy(&["States.ALL"], 2, 1.0, 1.5)];
    assert_eq!(
      decide("Boom", 2, &policies),
      RetryDecision::RetryAfter(Duration::from_millis(1500))
    );
  }

  #[test]
  fn test_zero_attempts_shadows_wildcard() {
    let policies = vec![
      policy(&["ImageIdentifyError"], 0, 1.0, 2.0),
      policy(&["States.ALL"], 2, 1.0, 1.5),
    ];

    assert_eq!(
      decide("ImageIdentifyError", 1, &policies),
      RetryDecision::Exhausted
    );
    assert_eq!(matching_policy("ImageIdentifyError", &policies).map(|(i, _)| i), Some(0));
    assert_eq!(matching_policy("States.Timeout", &policies).map(|(i, _)| i), Some(1));
  }

  #[test]
  fn test_no_matching_policy() {
    let policies = vec![policy(&["States.Timeout"], 5, 1.0, 2.0)];
    assert_eq!(decide("ImageIdentifyError", 1, &policies), RetryDecision::Exhausted);
    assert_eq!(decide("anything", 1, &[]), RetryDecision::Exhausted);
  }

  #[test]
  fn test_max_delay_caps_backoff() {
    let mut capped = policy(&["States.ALL"], 10, 1.0, 10.0);
    capped.max_delay_seconds = Some(30.0);

    assert_eq!(backoff_delay(&capped, 2), Duration::from_secs(10));
    assert_eq!(backoff_delay(&capped, 3), Duration::from_secs(30));
    assert_eq!(backoff_delay(&capped, 9), Duration::from_secs(30));
  }

  #[test]
  fn test_zero_interval() {
    let policies = vec![policy(&["States.ALL"], 1, 0.0, 2.0)];
    assert_eq!(
      decide("Boom", 1, &policies),
      RetryDecision::RetryAfter(Duration::ZERO)
    );
  }
}
