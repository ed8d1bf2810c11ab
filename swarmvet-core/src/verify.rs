//! Convergence verification after state-mutating operations
//!
//! A join, promote, or label update against a distributed control plane is
//! not instantaneously visible cluster-wide; single-shot verification
//! produces false negatives. The verifier therefore polls with a bounded
//! retry budget and capped exponential backoff, and supports external
//! cancellation that preempts the backoff sleep.

use std::time::Duration;
use swarmvet_common::{DesiredState, Entity, QueryError, RetryBudget, Verdict};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::evaluate::evaluate;
use crate::query::StateQuery;

/// Terminal outcome of one verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The entity reached its desired state
    Converged { attempts: u32 },
    /// The retry budget ran out (or the caller cancelled); carries the
    /// last observed reason
    Exhausted { attempts: u32, last_reason: String },
}

impl VerifyOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, VerifyOutcome::Converged { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            VerifyOutcome::Converged { attempts } => *attempts,
            VerifyOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Per-call verification states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerifyState {
    Polling,
    Converged,
    Exhausted,
}

pub struct JoinVerifier<'a> {
    query: &'a dyn StateQuery,
    query_timeout: Duration,
}

impl<'a> JoinVerifier<'a> {
    pub fn new(query: &'a dyn StateQuery, query_timeout: Duration) -> Self {
        Self {
            query,
            query_timeout,
        }
    }

    /// Verify convergence with bounded retries and no external cancellation.
    pub async fn verify(
        &self,
        entity: &Entity,
        desired: &DesiredState,
        budget: &RetryBudget,
    ) -> VerifyOutcome {
        let (_tx, rx) = watch::channel(false);
        self.verify_cancellable(entity, desired, budget, rx).await
    }

    /// Verify convergence; a `true` on the cancellation channel immediately
    /// ends the call in Exhausted without waiting out the backoff sleep.
    pub async fn verify_cancellable(
        &self,
        entity: &Entity,
        desired: &DesiredState,
        budget: &RetryBudget,
        mut cancel: watch::Receiver<bool>,
    ) -> VerifyOutcome {
        let mut state = VerifyState::Polling;
        let mut last_reason = String::from("no attempts made");
        let mut attempts = 0u32;

        while state == VerifyState::Polling {
            if *cancel.borrow() {
                state = VerifyState::Exhausted;
                last_reason = format!("cancelled; last state: {}", last_reason);
                break;
            }

            let verdict = self.poll_once(entity, desired).await;
            attempts += 1;
            debug!(entity = %entity, attempt = attempts, verdict = %verdict, "verification attempt");

            match verdict {
                Verdict::Converged => {
                    state = VerifyState::Converged;
                }
                Verdict::Diverged(reason) | Verdict::Unknown(reason) => {
                    last_reason = reason;
                    if attempts >= budget.max_attempts {
                        state = VerifyState::Exhausted;
                    } else {
                        let delay = budget.delay_for(attempts - 1);
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancelled(&mut cancel) => {
                                state = VerifyState::Exhausted;
                                last_reason = format!("cancelled; last state: {}", last_reason);
                            }
                        }
                    }
                }
            }
        }

        match state {
            VerifyState::Converged => {
                info!(entity = %entity, attempts, "entity converged");
                VerifyOutcome::Converged { attempts }
            }
            _ => {
                warn!(entity = %entity, attempts, reason = %last_reason, "verification exhausted");
                VerifyOutcome::Exhausted {
                    attempts,
                    last_reason,
                }
            }
        }
    }

    async fn poll_once(&self, entity: &Entity, desired: &DesiredState) -> Verdict {
        match tokio::time::timeout(self.query_timeout, self.query.fetch(entity)).await {
            Err(_) => Verdict::Unknown(QueryError::Timeout(self.query_timeout).to_string()),
            Ok(Err(err)) => Verdict::Unknown(err.to_string()),
            Ok(Ok(observed)) => evaluate(&observed, desired),
        }
    }
}

/// Resolves once the cancellation flag flips to true; pends forever when
/// the sender side is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use swarmvet_common::{Expectation, FieldValue, ObservedState};

    /// Returns a scripted sequence of states, one per fetch call.
    struct SequenceQuery {
        states: Mutex<VecDeque<Result<ObservedState, QueryError>>>,
    }

    impl SequenceQuery {
        fn new(states: Vec<Result<ObservedState, QueryError>>) -> Self {
            Self {
                states: Mutex::new(states.into()),
            }
        }
    }

    #[async_trait]
    impl StateQuery for SequenceQuery {
        async fn fetch(&self, entity: &Entity) -> Result<ObservedState, QueryError> {
            self.states
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(QueryError::Malformed(format!(
                        "sequence exhausted for {}",
                        entity
                    )))
                })
        }
    }

    fn node_with_role(role: &str) -> ObservedState {
        ObservedState::new(Entity::node("n1"))
            .with_field("role", FieldValue::Str(role.to_string()))
    }

    fn want_manager() -> DesiredState {
        DesiredState::new(Entity::node("n1"))
            .expect("role", Expectation::Equals("manager".to_string()))
    }

    fn budget_3() -> RetryBudget {
        RetryBudget::new(3, Duration::from_secs(1), Duration::from_secs(4))
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_on_third_attempt() {
        let query = SequenceQuery::new(vec![
            Ok(node_with_role("worker")),
            Ok(node_with_role("worker")),
            Ok(node_with_role("manager")),
        ]);

        let verifier = JoinVerifier::new(&query, Duration::from_secs(5));
        let outcome = verifier
            .verify(&Entity::node("n1"), &want_manager(), &budget_3())
            .await;

        assert_eq!(outcome, VerifyOutcome::Converged { attempts: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_carries_last_reason() {
        let query = SequenceQuery::new(vec![
            Ok(node_with_role("worker")),
            Ok(node_with_role("worker")),
            Ok(node_with_role("worker")),
        ]);

        let verifier = JoinVerifier::new(&query, Duration::from_secs(5));
        let outcome = verifier
            .verify(&Entity::node("n1"), &want_manager(), &budget_3())
            .await;

        match outcome {
            VerifyOutcome::Exhausted {
                attempts,
                last_reason,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_reason.contains("role expected manager got worker"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_errors_consume_budget_as_unknown() {
        let query = SequenceQuery::new(vec![
            Err(QueryError::Unreachable("connection refused".to_string())),
            Err(QueryError::Unreachable("connection refused".to_string())),
        ]);

        let budget = RetryBudget::new(2, Duration::from_secs(1), Duration::from_secs(4));
        let verifier = JoinVerifier::new(&query, Duration::from_secs(5));
        let outcome = verifier
            .verify(&Entity::node("n1"), &want_manager(), &budget)
            .await;

        match outcome {
            VerifyOutcome::Exhausted { last_reason, .. } => {
                assert!(last_reason.contains("unreachable"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_needs_no_backoff() {
        let query = SequenceQuery::new(vec![Ok(node_with_role("manager"))]);

        let verifier = JoinVerifier::new(&query, Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        let outcome = verifier
            .verify(&Entity::node("n1"), &want_manager(), &budget_3())
            .await;

        assert_eq!(outcome, VerifyOutcome::Converged { attempts: 1 });
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_preempts_backoff() {
        // Always diverged with a long backoff; cancellation must end the
        // call without waiting out the sleep
        let query = SequenceQuery::new(vec![
            Ok(node_with_role("worker")),
            Ok(node_with_role("worker")),
            Ok(node_with_role("worker")),
        ]);
        let budget = RetryBudget::new(3, Duration::from_secs(600), Duration::from_secs(600));

        let (tx, rx) = watch::channel(false);
        let verifier = JoinVerifier::new(&query, Duration::from_secs(5));
        let entity = Entity::node("n1");
        let desired = want_manager();

        let verify = verifier.verify_cancellable(&entity, &desired, &budget, rx);
        tokio::pin!(verify);

        let canceller = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(true).unwrap();
            std::future::pending::<VerifyOutcome>().await
        };
        tokio::pin!(canceller);

        let start = tokio::time::Instant::now();
        let outcome = tokio::select! {
            o = &mut verify => o,
            o = &mut canceller => o,
        };

        match outcome {
            VerifyOutcome::Exhausted {
                attempts,
                last_reason,
            } => {
                assert_eq!(attempts, 1);
                assert!(last_reason.starts_with("cancelled"));
                assert!(last_reason.contains("role expected manager got worker"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert!(start.elapsed() < Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_is_capped() {
        let query = SequenceQuery::new(vec![
            Ok(node_with_role("worker")),
            Ok(node_with_role("worker")),
            Ok(node_with_role("worker")),
            Ok(node_with_role("worker")),
        ]);
        let budget = RetryBudget::new(4, Duration::from_secs(1), Duration::from_secs(4));

        let verifier = JoinVerifier::new(&query, Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        let outcome = verifier
            .verify(&Entity::node("n1"), &want_manager(), &budget)
            .await;

        assert!(!outcome.is_converged());
        // Sleeps between the 4 attempts: 1s + 2s + 4s (capped)
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }
}
