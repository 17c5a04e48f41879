//! Property-based tests for the step state machine

use proptest::prelude::*;

use crate::wizard::StepStateMachine;

/// Totals and a request that falls outside `1..=total`
fn arb_out_of_range() -> impl Strategy<Value = (u32, i64)> {
    (1u32..50).prop_flat_map(|total| {
        let request = prop_oneof![
            i64::MIN..1i64,
            (i64::from(total) + 1)..i64::MAX,
        ];
        (Just(total), request)
    })
}

proptest! {
    #[test]
    fn out_of_range_request_resets_to_first_step(
        (total, request) in arb_out_of_range(),
        start in 1u32..50,
    ) {
        let mut machine = StepStateMachine::new(total);
        machine.set_step(i64::from(start.min(total)));

        prop_assert_eq!(machine.set_step(request), 1);
        prop_assert_eq!(machine.current_step(), 1);
    }

    #[test]
    fn current_step_stays_in_range(
        total in 1u32..20,
        requests in prop::collection::vec(-5i64..30, 0..50),
    ) {
        let mut machine = StepStateMachine::new(total);
        for request in requests {
            let applied = machine.set_step(request);
            prop_assert!(applied >= 1 && applied <= total);
            if machine.contains(request) {
                prop_assert_eq!(i64::from(applied), request);
            }
        }
    }

    #[test]
    fn can_advance_to_matches_completed_prefix(
        total in 1u32..12,
        completed in prop::collection::vec(any::<bool>(), 12),
        target in 1u32..12,
    ) {
        let machine = StepStateMachine::new(total);
        let expected = target <= total && (1..target).all(|s| completed[s as usize - 1]);
        let actual = machine.can_advance_to(i64::from(target), |s| completed[s as usize - 1]);
        prop_assert_eq!(actual, expected);
    }
}
