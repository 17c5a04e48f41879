//! Property-based tests for history synchronization

use std::sync::Arc;

use proptest::prelude::*;

use crate::wizard::{
    EntryTag, HistoryBridge, HistoryPort, MemoryHistory, Navigation, PopOutcome, StepStateMachine,
};

#[derive(Debug, Clone)]
enum Move {
    Navigate(i64),
    Back,
    Forward,
}

fn arb_move(total: u32) -> impl Strategy<Value = Move> {
    prop_oneof![
        (0i64..=i64::from(total) + 1).prop_map(Move::Navigate),
        Just(Move::Back),
        Just(Move::Forward),
    ]
}

fn arb_walk() -> impl Strategy<Value = (u32, Vec<Move>)> {
    (1u32..6).prop_flat_map(|total| (Just(total), prop::collection::vec(arb_move(total), 0..40)))
}

proptest! {
    #[test]
    fn navigate_then_back_restores_previous_step(total in 2u32..10, from in 1u32..10, to in 1u32..10) {
        let from = from.min(total);
        let to = to.min(total);
        prop_assume!(from != to);

        let history = Arc::new(MemoryHistory::new("/profiles/new"));
        let mut bridge = HistoryBridge::new(history.clone(), "step");
        let mut machine = StepStateMachine::new(total);
        machine.set_step(i64::from(from));
        bridge.mount(&machine);

        prop_assert_eq!(bridge.navigate_to_step(&mut machine, i64::from(to)), Navigation::Moved(to));
        let pop = history.back().unwrap();
        prop_assert_eq!(bridge.handle_pop_state(&mut machine, &pop), PopOutcome::Synced(from));
        prop_assert_eq!(machine.current_step(), from);
    }

    #[test]
    fn walks_keep_state_and_history_in_agreement((total, moves) in arb_walk()) {
        let history = Arc::new(MemoryHistory::new("/profiles/new"));
        let mut bridge = HistoryBridge::new(history.clone(), "step");
        let mut machine = StepStateMachine::new(total);
        bridge.mount(&machine);

        for step in moves {
            let pop = match step {
                Move::Navigate(n) => {
                    let len_before = history.len();
                    let before = machine.current_step();
                    match bridge.navigate_to_step(&mut machine, n) {
                        Navigation::Rejected | Navigation::Unchanged => {
                            prop_assert_eq!(machine.current_step(), before);
                            prop_assert_eq!(history.len(), len_before);
                        }
                        Navigation::Moved(_) => {}
                    }
                    None
                }
                Move::Back => history.back(),
                Move::Forward => history.forward(),
            };
            if let Some(pop) = pop {
                bridge.handle_pop_state(&mut machine, &pop);
            }

            // Every entry the wizard can pop into is its own
            prop_assert_eq!(
                EntryTag::classify(&history.state()),
                EntryTag::Wizard(Some(i64::from(machine.current_step())))
            );

            // Never two consecutive entries for the same step
            let entries = history.entries();
            for pair in entries.windows(2) {
                prop_assert_ne!(&pair[0].state, &pair[1].state);
            }
        }
    }
}
