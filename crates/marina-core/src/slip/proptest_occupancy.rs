//! Property-based tests for slip occupancy invariants.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use super::document::SlipDocument;
use super::state::{BoatId, DepartedBoat, Occupancy, Slip, SlipId, SlipNumber};
use super::store::SlipStore;
use crate::clock::DockDate;
use crate::storage::{Entity, InMemoryGateway};

#[derive(Debug, Clone)]
enum Op {
    Arrive(u8),
    Depart,
    Forget(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4).prop_map(Op::Arrive),
        Just(Op::Depart),
        (0u8..4).prop_map(Op::Forget),
    ]
}

fn boat(n: u8) -> BoatId {
    BoatId::new(format!("boat-{n}")).unwrap()
}

fn today() -> DockDate {
    DockDate::from_ymd(2024, 6, 1).unwrap()
}

fn apply(slip: &mut Slip, op: &Op) {
    match op {
        Op::Arrive(n) => {
            let _ = slip.arrive(boat(*n), today());
        },
        Op::Depart => {
            slip.depart(today());
        },
        Op::Forget(n) => {
            slip.forget_boat(&boat(*n), today());
        },
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    /// Property: the stored `current_boat` is empty iff `arrival_date` is
    /// empty, after any sequence of transitions.
    #[test]
    fn prop_occupancy_and_date_are_coupled(ops in prop::collection::vec(op_strategy(), 0..32)) {
        let mut slip = Slip {
            id: SlipId::from("slip-1"),
            version: 1,
            number: SlipNumber(1),
            occupancy: Occupancy::Vacant,
            departure_history: Vec::new(),
        };

        for op in &ops {
            apply(&mut slip, op);
            let document = SlipDocument::from(&slip);
            prop_assert_eq!(document.current_boat.is_empty(), document.arrival_date.is_empty());
        }

        // The stored form decodes back to the same slip.
        let entity = Entity {
            id: slip.id.entity_id().clone(),
            version: slip.version,
            data: serde_json::to_value(SlipDocument::from(&slip)).unwrap(),
        };
        prop_assert_eq!(Slip::try_from(entity).unwrap(), slip);
    }

    /// Property: departures grow history by exactly one and keep prior
    /// entries intact; forgetting never removes entries.
    #[test]
    fn prop_history_only_grows_by_prepending(ops in prop::collection::vec(op_strategy(), 0..32)) {
        let mut slip = Slip {
            id: SlipId::from("slip-1"),
            version: 1,
            number: SlipNumber(1),
            occupancy: Occupancy::Vacant,
            departure_history: Vec::new(),
        };

        for op in &ops {
            let before = slip.clone();
            apply(&mut slip, op);

            match op {
                Op::Depart if !before.is_vacant() => {
                    prop_assert_eq!(slip.departure_history.len(), before.departure_history.len() + 1);
                    prop_assert_eq!(&slip.departure_history[1..], &before.departure_history[..]);
                    prop_assert_eq!(
                        &slip.departure_history[0].departed_boat,
                        &DepartedBoat::Known(before.current_boat().unwrap().clone())
                    );
                },
                Op::Forget(n) => {
                    prop_assert!(!slip.references(&boat(*n)));
                    prop_assert!(slip.departure_history.len() >= before.departure_history.len());
                },
                _ => prop_assert!(slip.departure_history.len() >= before.departure_history.len()),
            }
        }
    }

    /// Property: `is_unique(n)` is false iff a slip with number `n` exists.
    #[test]
    fn prop_is_unique_matches_existing_numbers(
        existing in prop::collection::vec(0u32..20, 0..10),
        candidate in 0u32..20,
    ) {
        let numbers: BTreeSet<u32> = existing.iter().copied().collect();
        let unique = runtime().block_on(async {
            let store = SlipStore::new(Arc::new(InMemoryGateway::new()));
            for number in &existing {
                store.create(SlipNumber(*number)).await.unwrap();
            }
            store.is_unique(SlipNumber(candidate)).await.unwrap()
        });
        prop_assert_eq!(unique, !numbers.contains(&candidate));
    }
}
