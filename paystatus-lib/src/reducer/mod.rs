//! Status derivation.
//!
//! [`PaymentStatusReducer`] is a pure function from a [`RawStatusEvent`] to a
//! [`PaymentStatus`]. [`StatusPublisher`] wraps it with the settle window the
//! UI observes through `is_updating`.

mod publisher;

pub use publisher::{StatusCallback, StatusPublisher};

use crate::config::{CompletionPolicy, ReducerConfig, StatusCodeTable};
use crate::status::{PaymentStatus, RawStatusEvent};

/// Maps raw status events onto [`PaymentStatus`].
///
/// # Example
///
/// ```
/// use paystatus_lib::{PaymentStatus, PaymentStatusReducer, RawStatusEvent};
///
/// let reducer = PaymentStatusReducer::default();
/// let event = RawStatusEvent::new("CO").with_confirmed_amount(25.5);
/// assert_eq!(reducer.reduce(&event), PaymentStatus::Completed);
///
/// // The completion code alone is not enough.
/// assert_eq!(reducer.reduce(&RawStatusEvent::new("CO")), PaymentStatus::Pending);
/// ```
#[derive(Clone, Debug, Default)]
pub struct PaymentStatusReducer {
    codes: StatusCodeTable,
    policy: CompletionPolicy,
}

impl PaymentStatusReducer {
    /// Create a reducer from config.
    pub fn new(config: &ReducerConfig) -> Self {
        Self {
            codes: config.codes.clone(),
            policy: config.completion_policy,
        }
    }

    /// Active completion policy.
    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Derive the status for one event.
    pub fn reduce(&self, event: &RawStatusEvent) -> PaymentStatus {
        let code = event.code();

        if code == self.codes.completed.trim() {
            return match self.policy {
                CompletionPolicy::StatusCodeOnly => PaymentStatus::Completed,
                CompletionPolicy::RequireConfirmedAmount => {
                    if event.confirmed_amount.is_some_and(|amount| amount > 0.0) {
                        PaymentStatus::Completed
                    } else {
                        PaymentStatus::Pending
                    }
                }
            };
        }

        if matches_any(&self.codes.expired, code) {
            PaymentStatus::Expired
        } else if matches_any(&self.codes.failed, code) {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Pending
        }
    }
}

fn matches_any(codes: &[String], code: &str) -> bool {
    codes.iter().any(|c| c.trim() == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::codes;
    use proptest::prelude::*;

    #[test]
    fn test_completed_requires_positive_amount() {
        let reducer = PaymentStatusReducer::default();
        let co = |amount: Option<f64>| {
            let mut event = RawStatusEvent::new(codes::COMPLETED);
            event.confirmed_amount = amount;
            reducer.reduce(&event)
        };

        assert_eq!(co(Some(25.5)), PaymentStatus::Completed);
        assert_eq!(co(Some(0.0001)), PaymentStatus::Completed);
        assert_eq!(co(Some(0.0)), PaymentStatus::Pending);
        assert_eq!(co(Some(-1.0)), PaymentStatus::Pending);
        assert_eq!(co(None), PaymentStatus::Pending);
    }

    #[test]
    fn test_status_code_only_policy() {
        let config =
            ReducerConfig::default().with_completion_policy(CompletionPolicy::StatusCodeOnly);
        let reducer = PaymentStatusReducer::new(&config);
        assert_eq!(
            reducer.reduce(&RawStatusEvent::new(codes::COMPLETED)),
            PaymentStatus::Completed
        );
        assert_eq!(
            reducer.reduce(&RawStatusEvent::new(codes::PENDING)),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_code_table() {
        let reducer = PaymentStatusReducer::default();
        let reduce = |code: &str| reducer.reduce(&RawStatusEvent::new(code));

        assert_eq!(reduce(codes::EXPIRED), PaymentStatus::Expired);
        assert_eq!(reduce(codes::FAILED), PaymentStatus::Failed);
        assert_eq!(reduce(codes::CANCELLED), PaymentStatus::Failed);
        assert_eq!(reduce(codes::OUT_OF_CONDITION), PaymentStatus::Failed);
        assert_eq!(reduce(codes::PENDING), PaymentStatus::Pending);
        assert_eq!(reduce(codes::NOT_READY), PaymentStatus::Pending);
        assert_eq!(reduce(codes::AWAITING_COMPLETION), PaymentStatus::Pending);
        assert_eq!(reduce(codes::INSUFFICIENT_AMOUNT), PaymentStatus::Pending);
        assert_eq!(reduce("??"), PaymentStatus::Pending);
        assert_eq!(reduce(" EX "), PaymentStatus::Expired);
        assert_eq!(reduce("ex"), PaymentStatus::Pending);
    }

    #[test]
    fn test_terminal_status_is_reobserved() {
        let reducer = PaymentStatusReducer::default();
        let event = RawStatusEvent::new(codes::COMPLETED).with_confirmed_amount(1.0);
        assert_eq!(reducer.reduce(&event), PaymentStatus::Completed);
        assert_eq!(reducer.reduce(&event), PaymentStatus::Completed);
    }

    proptest! {
        #[test]
        fn prop_non_completion_code_never_completes(
            code in "[A-Z]{0,3}",
            amount in proptest::option::of(-1000.0f64..1000.0),
        ) {
            prop_assume!(code != codes::COMPLETED);
            let reducer = PaymentStatusReducer::default();
            let mut event = RawStatusEvent::new(code);
            event.confirmed_amount = amount;
            prop_assert_ne!(reducer.reduce(&event), PaymentStatus::Completed);
        }

        #[test]
        fn prop_non_positive_amount_stays_pending(amount in -1000.0f64..=0.0) {
            let reducer = PaymentStatusReducer::default();
            let event = RawStatusEvent::new(codes::COMPLETED).with_confirmed_amount(amount);
            prop_assert_eq!(reducer.reduce(&event), PaymentStatus::Pending);
        }
    }
}
