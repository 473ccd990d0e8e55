//! Sale allocation against batches.
//!
//! Allocation is split from application: `allocate` only decides which batches a
//! sale draws from (and fails before anything changes), `apply_allocations`
//! performs the decrement and pruning. The aggregate decides in `handle` and
//! applies in `apply`, so a failed sale never touches state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lotstock_core::{DomainError, DomainResult};

use crate::batch::{self, Batch, BatchSelector};

/// Units drawn from one batch by a sale.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAllocation {
    pub expiry: Option<NaiveDate>,
    pub quantity: i64,
}

/// Decide how a sale of `requested` units is served.
///
/// With a selector the sale is served from that batch only (guided selection);
/// without one, batches are consumed in FEFO order.
pub fn allocate(
    batches: &[Batch],
    requested: i64,
    selector: Option<BatchSelector>,
) -> DomainResult<Vec<BatchAllocation>> {
    if requested <= 0 {
        return Err(DomainError::validation("sale quantity must be positive"));
    }
    match selector {
        Some(selector) => allocate_guided(batches, requested, selector),
        None => allocate_fefo(batches, requested),
    }
}

fn allocate_guided(
    batches: &[Batch],
    requested: i64,
    selector: BatchSelector,
) -> DomainResult<Vec<BatchAllocation>> {
    let selected = batches
        .iter()
        .find(|b| selector.matches(b) && !b.is_exhausted())
        .ok_or_else(|| DomainError::not_found(format!("batch {selector}")))?;

    if selected.quantity < requested {
        return Err(DomainError::InsufficientBatchStock {
            expiry: selected.expiry,
            requested,
            available: selected.quantity,
        });
    }

    Ok(vec![BatchAllocation {
        expiry: selected.expiry,
        quantity: requested,
    }])
}

fn allocate_fefo(batches: &[Batch], requested: i64) -> DomainResult<Vec<BatchAllocation>> {
    let available = batch::total_quantity(batches);
    if available < requested {
        return Err(DomainError::InsufficientStock {
            requested,
            available,
        });
    }

    let mut remaining = requested;
    let mut allocations = Vec::new();
    for idx in batch::fefo_order(batches) {
        if remaining == 0 {
            break;
        }
        let b = &batches[idx];
        let take = b.quantity.min(remaining);
        if take == 0 {
            continue;
        }
        allocations.push(BatchAllocation {
            expiry: b.expiry,
            quantity: take,
        });
        remaining -= take;
    }

    Ok(allocations)
}

/// Apply allocations to a batch list, returning the remaining active batches.
///
/// Batches keep their relative order; any batch that reaches zero is pruned.
pub fn apply_allocations(batches: &[Batch], allocations: &[BatchAllocation]) -> Vec<Batch> {
    let mut remaining = batches.to_vec();
    for allocation in allocations {
        if let Some(target) = remaining
            .iter_mut()
            .find(|b| b.expiry == allocation.expiry && b.quantity > 0)
        {
            target.quantity = (target.quantity - allocation.quantity).max(0);
        }
    }
    batch::prune_exhausted(&mut remaining);
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn mixed_batches() -> Vec<Batch> {
        vec![
            Batch::dated(d(2025, 1, 1), 5),
            Batch::dated(d(2024, 6, 1), 3),
            Batch::without_expiry(10),
        ]
    }

    #[test]
    fn fefo_consumes_earliest_expiry_first() {
        let batches = mixed_batches();
        let allocations = allocate(&batches, 6, None).unwrap();

        assert_eq!(
            allocations,
            vec![
                BatchAllocation { expiry: Some(d(2024, 6, 1)), quantity: 3 },
                BatchAllocation { expiry: Some(d(2025, 1, 1)), quantity: 3 },
            ]
        );
        assert_eq!(
            apply_allocations(&batches, &allocations),
            vec![Batch::dated(d(2025, 1, 1), 2), Batch::without_expiry(10)]
        );
    }

    #[test]
    fn fefo_reaches_undated_batches_only_after_dated_ones() {
        let batches = mixed_batches();
        let allocations = allocate(&batches, 9, None).unwrap();
        assert_eq!(
            allocations.last(),
            Some(&BatchAllocation { expiry: None, quantity: 1 })
        );
        assert_eq!(
            apply_allocations(&batches, &allocations),
            vec![Batch::without_expiry(9)]
        );
    }

    #[test]
    fn fefo_shortfall_is_detected_before_allocating() {
        let err = allocate(&mixed_batches(), 19, None).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock { requested: 19, available: 18 }
        );
    }

    #[test]
    fn non_positive_requests_are_rejected() {
        assert!(matches!(
            allocate(&mixed_batches(), 0, None),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            allocate(&mixed_batches(), -3, Some(BatchSelector::no_expiry())),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn guided_selection_draws_from_exactly_one_batch() {
        let batches = mixed_batches();
        let allocations =
            allocate(&batches, 4, Some(BatchSelector::expiring(d(2025, 1, 1)))).unwrap();
        assert_eq!(
            allocations,
            vec![BatchAllocation { expiry: Some(d(2025, 1, 1)), quantity: 4 }]
        );
        assert_eq!(
            apply_allocations(&batches, &allocations),
            vec![
                Batch::dated(d(2025, 1, 1), 1),
                Batch::dated(d(2024, 6, 1), 3),
                Batch::without_expiry(10),
            ]
        );
    }

    #[test]
    fn guided_selection_does_not_spill_into_other_batches() {
        let err = allocate(
            &mixed_batches(),
            4,
            Some(BatchSelector::expiring(d(2024, 6, 1))),
        )
        .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientBatchStock {
                expiry: Some(d(2024, 6, 1)),
                requested: 4,
                available: 3,
            }
        );
    }

    #[test]
    fn guided_selection_of_unknown_batch_is_not_found() {
        let err = allocate(
            &mixed_batches(),
            1,
            Some(BatchSelector::expiring(d(2030, 1, 1))),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn guided_selection_can_target_the_undated_batch() {
        let batches = mixed_batches();
        let allocations = allocate(&batches, 10, Some(BatchSelector::no_expiry())).unwrap();
        assert_eq!(
            apply_allocations(&batches, &allocations),
            vec![Batch::dated(d(2025, 1, 1), 5), Batch::dated(d(2024, 6, 1), 3)]
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_batches() -> impl Strategy<Value = Vec<Batch>> {
            prop::collection::vec(
                (prop::option::of(0u32..3650), 0i64..50).prop_map(|(days, qty)| {
                    Batch::new(
                        days.map(|n| d(2024, 1, 1) + chrono::Days::new(u64::from(n))),
                        qty,
                    )
                }),
                0..8,
            )
            .prop_map(|raw| batch::normalize(&raw).unwrap())
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: a successful FEFO sale removes exactly the requested units.
            #[test]
            fn fefo_conserves_units(batches in arb_batches(), requested in 1i64..200) {
                let before = batch::total_quantity(&batches);
                match allocate(&batches, requested, None) {
                    Ok(allocations) => {
                        let drawn: i64 = allocations.iter().map(|a| a.quantity).sum();
                        prop_assert_eq!(drawn, requested);
                        let after = apply_allocations(&batches, &allocations);
                        prop_assert_eq!(batch::total_quantity(&after), before - requested);
                        prop_assert!(after.iter().all(|b| b.quantity > 0));
                    }
                    Err(DomainError::InsufficientStock { requested: r, available }) => {
                        prop_assert_eq!(r, requested);
                        prop_assert_eq!(available, before);
                        prop_assert!(before < requested);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }

            /// Property: no undated unit is sold while dated stock remains.
            #[test]
            fn fefo_prefers_dated_stock(batches in arb_batches(), requested in 1i64..200) {
                let dated: i64 = batches
                    .iter()
                    .filter(|b| b.expiry.is_some())
                    .map(|b| b.quantity)
                    .sum();
                if let Ok(allocations) = allocate(&batches, requested, None) {
                    let undated: i64 = allocations
                        .iter()
                        .filter(|a| a.expiry.is_none())
                        .map(|a| a.quantity)
                        .sum();
                    prop_assert_eq!(undated, (requested - dated).max(0));
                }
            }
        }
    }
}
