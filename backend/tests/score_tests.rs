//! Tests for farmer reliability scoring
//! Verifies the success-ratio formula, the verified bonus and its cap,
//! and the default for farmers with no history.

use proptest::prelude::*;
use rust_decimal::Decimal;

use tracesafe_backend::services::score::{reliability_score, DEFAULT_SCORE};

/// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

mod formula {
    use super::*;

    #[test]
    fn no_batches_keeps_the_default() {
        assert_eq!(reliability_score(0, 0, false), DEFAULT_SCORE);
        assert_eq!(reliability_score(0, 0, true), DEFAULT_SCORE);
    }

    #[test]
    fn score_is_the_success_percentage() {
        assert_eq!(reliability_score(4, 3, false), dec("75.00"));
        assert_eq!(reliability_score(10, 10, false), dec("100.00"));
        assert_eq!(reliability_score(5, 0, false), dec("0.00"));
    }

    #[test]
    fn verified_farmers_get_a_flat_bonus() {
        assert_eq!(reliability_score(4, 3, true), dec("80.00"));
        assert_eq!(reliability_score(5, 0, true), dec("5.00"));
    }

    #[test]
    fn bonus_never_pushes_past_one_hundred() {
        assert_eq!(reliability_score(10, 10, true), dec("100.00"));
        assert_eq!(reliability_score(100, 98, true), dec("100.00"));
    }

    #[test]
    fn score_rounds_to_two_decimals() {
        assert_eq!(reliability_score(3, 1, false), dec("33.33"));
        assert_eq!(reliability_score(3, 2, false), dec("66.67"));
    }
}

mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The score is always within [0, 100].
        #[test]
        fn score_stays_in_range(
            total in 0i64..10_000,
            ratio in 0.0f64..=1.0,
            verified in any::<bool>(),
        ) {
            let successful = (total as f64 * ratio) as i64;
            let score = reliability_score(total, successful, verified);
            prop_assert!(score >= Decimal::ZERO);
            prop_assert!(score <= Decimal::from(100));
        }

        /// Recomputing from the same counters yields the same score.
        #[test]
        fn scoring_is_idempotent(
            total in 0i64..10_000,
            ratio in 0.0f64..=1.0,
            verified in any::<bool>(),
        ) {
            let successful = (total as f64 * ratio) as i64;
            let first = reliability_score(total, successful, verified);
            let second = reliability_score(total, successful, verified);
            prop_assert_eq!(first, second);
        }

        /// Verification never lowers a score.
        #[test]
        fn verification_never_hurts(
            total in 1i64..10_000,
            ratio in 0.0f64..=1.0,
        ) {
            let successful = (total as f64 * ratio) as i64;
            let unverified = reliability_score(total, successful, false);
            let verified = reliability_score(total, successful, true);
            prop_assert!(verified >= unverified);
        }

        /// More successes never lower the score.
        #[test]
        fn score_is_monotone_in_successes(
            total in 2i64..1_000,
            successful in 0i64..999,
        ) {
            let successful = successful.min(total - 1);
            let lower = reliability_score(total, successful, false);
            let higher = reliability_score(total, successful + 1, false);
            prop_assert!(higher >= lower);
        }
    }
}
