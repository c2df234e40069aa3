//! §4.2 ConsensusCalculator — a pure, stateless Byzantine-FT tally over a
//! request's current vote counts. Safe to call on every vote; O(1).

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConsensusResult {
    pub reached: bool,
    pub approved: bool,
    pub rejected: bool,
    pub impossible: bool,
    pub percent: f64,
    pub min_for_majority: u32,
}

/// Evaluate consensus over `(approval, rejection, abstain, total, threshold_percent)`
/// per §4.2's formula.
pub fn evaluate(
    approval: u32,
    rejection: u32,
    abstain: u32,
    total: u32,
    threshold_percent: f64,
) -> ConsensusResult {
    let active = total.saturating_sub(abstain);

    if active == 0 {
        return ConsensusResult {
            reached: false,
            approved: false,
            rejected: false,
            impossible: true,
            percent: 0.0,
            min_for_majority: 0,
        };
    }

    let min_for_majority = ((active as f64) * threshold_percent / 100.0).floor() as u32 + 1;

    let approved = approval >= min_for_majority;
    let rejected = rejection >= min_for_majority;
    let reached = approved || rejected;

    let remaining = total.saturating_sub(approval + rejection + abstain);
    let approval_can_win = approval + remaining >= min_for_majority;
    let rejection_can_win = rejection + remaining >= min_for_majority;
    let impossible = !approval_can_win && !rejection_can_win;

    let percent = (approval as f64) * 100.0 / (active as f64);

    ConsensusResult {
        reached,
        approved,
        rejected,
        impossible,
        percent,
        min_for_majority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_validator_yes_is_approved() {
        let r = evaluate(1, 0, 0, 1, 66.67);
        assert!(r.approved);
        assert!(r.reached);
    }

    #[test]
    fn single_validator_no_is_rejected() {
        let r = evaluate(0, 1, 0, 1, 66.67);
        assert!(r.rejected);
        assert!(r.reached);
    }

    #[test]
    fn all_abstain_is_impossible_not_approved() {
        let r = evaluate(0, 0, 5, 5, 66.67);
        assert!(r.impossible);
        assert!(!r.approved);
    }

    #[test]
    fn early_impossibility_does_not_wait_for_remaining_votes() {
        // S3: 5 validators, threshold 66.67 -> min_for_majority = floor(5*0.6667)+1 = 4
        let r = evaluate(1, 3, 0, 5, 66.67);
        assert_eq!(r.min_for_majority, 4);
        assert!(r.impossible, "approval can reach at most 2, rejection already has 3 votes but remaining 1 still caps at 4");
    }

    #[test]
    fn min_for_majority_matches_two_thirds_rule_at_default_threshold() {
        // floor(active/3)+1 agrees with floor(active*66.67/100)+1 at this threshold.
        for active in 1u32..200 {
            let spec_formula = ((active as f64) * 66.67 / 100.0).floor() as u32 + 1;
            let legacy_formula = active / 3 + 1;
            assert_eq!(spec_formula, legacy_formula, "diverged at active={active}");
        }
    }

    proptest! {
        #[test]
        fn approved_implies_bound_is_met(
            approval in 0u32..200,
            rejection in 0u32..200,
            abstain in 0u32..200,
            extra in 0u32..50,
            threshold in 1.0f64..100.0,
        ) {
            let total = approval + rejection + abstain + extra;
            let r = evaluate(approval, rejection, abstain, total, threshold);
            if r.approved {
                prop_assert!(approval >= r.min_for_majority);
            }
        }

        #[test]
        fn impossible_implies_neither_side_can_still_win(
            approval in 0u32..200,
            rejection in 0u32..200,
            abstain in 0u32..200,
            extra in 0u32..50,
            threshold in 1.0f64..100.0,
        ) {
            let total = approval + rejection + abstain + extra;
            let active = total.saturating_sub(abstain);
            let r = evaluate(approval, rejection, abstain, total, threshold);
            if r.impossible && active > 0 {
                let remaining = total.saturating_sub(approval + rejection + abstain);
                prop_assert!(approval + remaining < r.min_for_majority);
                prop_assert!(rejection + remaining < r.min_for_majority);
            }
        }

        #[test]
        fn deterministic_for_same_inputs(
            approval in 0u32..50,
            rejection in 0u32..50,
            abstain in 0u32..50,
            total in 0u32..150,
            threshold in 1.0f64..100.0,
        ) {
            let a = evaluate(approval, rejection, abstain, total, threshold);
            let b = evaluate(approval, rejection, abstain, total, threshold);
            prop_assert_eq!(a, b);
        }
    }
}
