//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Bucket conservation: moving money between buckets preserves the total
//! - Non-negative deltas: negative input never mutates a balance
//! - Transition table: Paid is reachable only through the forward path
//! - Amount conversion: cents round-trip through Decimal exactly

use chrono::Utc;
use ledger_core::{
    cents_from_decimal, decimal_from_cents, Currency, Error, SellerBalance, SellerBalanceKey,
    SellerTransactionStatus, TerritoryId, TransactionAction, UserId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating valid amounts (non-negative cents)
fn amount_strategy() -> impl Strategy<Value = i64> {
    0i64..10_000_000_00i64
}

/// Strategy for generating currencies
fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![Just(Currency::USD), Just(Currency::EUR), Just(Currency::GBP)]
}

fn action_strategy() -> impl Strategy<Value = TransactionAction> {
    prop_oneof![
        Just(TransactionAction::MarkReady),
        Just(TransactionAction::StartPayout),
        Just(TransactionAction::CompletePayout),
        Just(TransactionAction::FailPayout),
        Just(TransactionAction::Cancel),
    ]
}

#[derive(Debug, Clone)]
enum BalanceOp {
    AddPending(i64),
    MoveToReady(i64),
    MarkAsPaid(i64),
    RemovePending(i64),
    RemoveReady(i64),
}

fn balance_op_strategy() -> impl Strategy<Value = BalanceOp> {
    let amount = -1_000i64..100_000i64;
    prop_oneof![
        amount.clone().prop_map(BalanceOp::AddPending),
        amount.clone().prop_map(BalanceOp::MoveToReady),
        amount.clone().prop_map(BalanceOp::MarkAsPaid),
        amount.clone().prop_map(BalanceOp::RemovePending),
        amount.prop_map(BalanceOp::RemoveReady),
    ]
}

fn empty_balance(currency: Currency) -> SellerBalance {
    let key = SellerBalanceKey::new(TerritoryId::new_v4(), UserId::new_v4(), currency);
    SellerBalance::new(key, Utc::now())
}

proptest! {
    /// Moving pending → ready conserves the total and never goes negative
    #[test]
    fn prop_move_to_ready_conserves_total(
        pending in amount_strategy(),
        moved in amount_strategy(),
        currency in currency_strategy(),
    ) {
        let mut balance = empty_balance(currency);
        balance.add_pending(pending, Utc::now()).unwrap();
        let total = balance.total_cents();

        let result = balance.move_to_ready_for_payout(moved, Utc::now());
        if moved > pending {
            let is_insufficient = matches!(result, Err(Error::InsufficientFunds { .. }));
            prop_assert!(is_insufficient);
            prop_assert_eq!(balance.pending_cents, pending);
            prop_assert_eq!(balance.ready_for_payout_cents, 0);
        } else {
            prop_assert!(result.is_ok());
            prop_assert_eq!(balance.pending_cents, pending - moved);
            prop_assert_eq!(balance.ready_for_payout_cents, moved);
        }
        prop_assert_eq!(balance.total_cents(), total);
    }

    /// Negative deltas are always rejected without touching the balance
    #[test]
    fn prop_negative_add_pending_never_mutates(
        start in amount_strategy(),
        negative in i64::MIN..0i64,
    ) {
        let mut balance = empty_balance(Currency::USD);
        balance.add_pending(start, Utc::now()).unwrap();
        let before = balance.clone();

        let is_invalid = matches!(
            balance.add_pending(negative, Utc::now()),
            Err(Error::InvalidAmount(_))
        );
        prop_assert!(is_invalid);
        prop_assert_eq!(balance, before);
    }

    /// Under any op sequence, buckets stay non-negative and failed ops change nothing
    #[test]
    fn prop_buckets_never_negative(ops in prop::collection::vec(balance_op_strategy(), 1..50)) {
        let mut balance = empty_balance(Currency::EUR);

        for op in ops {
            let before = balance.clone();
            let result = match op {
                BalanceOp::AddPending(x) => balance.add_pending(x, Utc::now()),
                BalanceOp::MoveToReady(x) => balance.move_to_ready_for_payout(x, Utc::now()),
                BalanceOp::MarkAsPaid(x) => balance.mark_as_paid(x, Utc::now()),
                BalanceOp::RemovePending(x) => balance.remove_pending(x, Utc::now()),
                BalanceOp::RemoveReady(x) => balance.remove_ready_for_payout(x, Utc::now()),
            };

            if result.is_err() {
                prop_assert_eq!(&balance, &before);
            }
            prop_assert!(balance.pending_cents >= 0);
            prop_assert!(balance.ready_for_payout_cents >= 0);
            prop_assert!(balance.paid_cents >= 0);
        }
    }

    /// Paid is only reachable through Pending → ReadyForPayout → ProcessingPayout → Paid
    #[test]
    fn prop_paid_requires_forward_path(actions in prop::collection::vec(action_strategy(), 0..10)) {
        let mut status = SellerTransactionStatus::Pending;
        let mut path = vec![status];

        for action in actions {
            if let Ok(next) = status.apply(action) {
                prop_assert!(!status.is_terminal());
                status = next;
                path.push(status);
            }
        }

        if status == SellerTransactionStatus::Paid {
            prop_assert_eq!(
                path,
                vec![
                    SellerTransactionStatus::Pending,
                    SellerTransactionStatus::ReadyForPayout,
                    SellerTransactionStatus::ProcessingPayout,
                    SellerTransactionStatus::Paid,
                ]
            );
        }
    }

    /// Cents survive the Decimal edge exactly
    #[test]
    fn prop_cents_decimal_exact(cents in -1_000_000_000_00i64..1_000_000_000_00i64) {
        prop_assert_eq!(cents_from_decimal(decimal_from_cents(cents)).unwrap(), cents);
    }

    /// Sub-cent inputs round to the nearest cent
    #[test]
    fn prop_cents_rounding_is_nearest(mills in 0i64..10_000_000i64) {
        let cents = cents_from_decimal(Decimal::new(mills, 3)).unwrap();
        let diff = (cents * 10 - mills).abs();
        prop_assert!(diff <= 5);
    }
}

#[test]
fn test_complete_payout_rejected_before_processing() {
    for status in [
        SellerTransactionStatus::Pending,
        SellerTransactionStatus::ReadyForPayout,
    ] {
        assert!(matches!(
            status.apply(TransactionAction::CompletePayout),
            Err(Error::InvalidTransition { .. })
        ));
    }
}
