//! Confidence scoring for validated payments.
//!
//! The score is advisory metadata in the 0–100 range (higher is more
//! confident) attached to a verification result. It never gates
//! acceptance — gating is the verifier's sequential checks. The trait is
//! the extension point: deployments can fold in external reputation
//! signals without touching the verifier's contract.

use rust_decimal::Decimal;
use std::time::Duration;

/// Signals available to a scorer for one validated payment.
#[derive(Debug, Clone)]
pub struct RiskSignals {
    /// Confirmation depth at fetch time.
    pub confirmations: u64,
    /// The chain's configured minimum confirmations.
    pub min_confirmations: u64,
    /// Transaction age at verification time.
    pub age: Duration,
    /// The chain's configured maximum accepted age.
    pub max_age: Duration,
    /// Normalized transfer amount.
    pub amount: Decimal,
}

/// Deterministic confidence scoring of a validated payment.
pub trait RiskScorer: Send + Sync {
    /// Scores the payment in 0–100; higher means more confidence.
    fn score(&self, signals: &RiskSignals) -> u8;
}

/// Default scorer weighing confirmation depth beyond the minimum and the
/// transaction's position inside the accepted age window.
///
/// Depth beyond the minimum raises the score; sitting right at the
/// minimum, being seconds old, or crowding the stale boundary lowers it.
/// Unusually large payments get a mild haircut.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthScorer;

impl RiskScorer for DepthScorer {
    fn score(&self, signals: &RiskSignals) -> u8 {
        let mut score: i32 = 70;

        let min = signals.min_confirmations.max(1);
        if signals.confirmations >= min * 3 {
            score += 25;
        } else if signals.confirmations >= min * 2 {
            score += 15;
        } else if signals.confirmations > min {
            score += 10;
        } else {
            score += 5;
        }

        let age = signals.age.as_secs();
        let max_age = signals.max_age.as_secs().max(1);
        if age < 30 {
            score -= 5;
        } else if age > max_age * 3 / 4 {
            score -= 10;
        } else {
            score += 5;
        }

        if signals.amount > Decimal::from(100) {
            score -= 5;
        }

        u8::try_from(score.clamp(0, 100)).unwrap_or(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn signals(confirmations: u64, age_secs: u64) -> RiskSignals {
        RiskSignals {
            confirmations,
            min_confirmations: 6,
            age: Duration::from_secs(age_secs),
            max_age: Duration::from_secs(3 * 24 * 3600),
            amount: Decimal::from_str("1.00").unwrap(),
        }
    }

    #[test]
    fn test_score_is_deterministic() {
        let s = signals(8, 600);
        assert_eq!(DepthScorer.score(&s), DepthScorer.score(&s));
    }

    #[test]
    fn test_depth_beyond_minimum_scores_above_70() {
        assert!(DepthScorer.score(&signals(8, 600)) > 70);
    }

    #[test]
    fn test_deeper_confirmations_score_higher() {
        let shallow = DepthScorer.score(&signals(6, 600));
        let medium = DepthScorer.score(&signals(13, 600));
        let deep = DepthScorer.score(&signals(20, 600));
        assert!(shallow < medium);
        assert!(medium < deep);
    }

    #[test]
    fn test_very_fresh_and_near_stale_are_penalized() {
        let fresh = DepthScorer.score(&signals(8, 5));
        let settled = DepthScorer.score(&signals(8, 600));
        let near_stale = DepthScorer.score(&signals(8, 3 * 24 * 3600 - 60));
        assert!(fresh < settled);
        assert!(near_stale < settled);
    }

    #[test]
    fn test_score_stays_in_range() {
        let mut s = signals(1000, 600);
        s.amount = Decimal::from(1);
        assert!(DepthScorer.score(&s) <= 100);
        let mut s = signals(6, 5);
        s.amount = Decimal::from(10_000);
        let score = DepthScorer.score(&s);
        assert!(score <= 100);
    }

    #[test]
    fn test_large_amount_haircut() {
        let small = DepthScorer.score(&signals(8, 600));
        let mut big_signals = signals(8, 600);
        big_signals.amount = Decimal::from(500);
        assert!(DepthScorer.score(&big_signals) < small);
    }
}
