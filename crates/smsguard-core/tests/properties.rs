//! Property-based tests for the retention rules.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Duration;
use proptest::prelude::*;

use smsguard_core::{
    BlockOutcome, BlocklistEngine, Error, MockClock, SqliteRetentionStore, days_remaining,
};

const MS_PER_DAY: i64 = 86_400_000;

async fn engine() -> (
    BlocklistEngine<SqliteRetentionStore, Arc<MockClock>>,
    Arc<MockClock>,
) {
    let clock = MockClock::shared();
    let store = SqliteRetentionStore::in_memory().await.unwrap();
    (BlocklistEngine::new(store, Arc::clone(&clock)), clock)
}

/// Phone-number-like identifiers, with or without a leading plus.
fn arb_identifier() -> impl Strategy<Value = String> {
    "\\+?[0-9]{5,15}"
}

proptest! {
    #[test]
    fn days_remaining_is_ceiling_of_days(ms in 1i64..(3650 * MS_PER_DAY)) {
        let days = days_remaining(Duration::milliseconds(ms));
        prop_assert_eq!(days, (ms + MS_PER_DAY - 1) / MS_PER_DAY);
    }

    #[test]
    fn whole_days_are_not_rounded(days in 1i64..3650) {
        prop_assert_eq!(days_remaining(Duration::days(days)), days);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn block_is_idempotent(id in arb_identifier(), repeats in 2usize..5) {
        tokio_test::block_on(async {
            let (engine, _) = engine().await;

            prop_assert_eq!(engine.block(&id).await.unwrap(), BlockOutcome::Blocked);
            for _ in 1..repeats {
                prop_assert_eq!(engine.block(&id).await.unwrap(), BlockOutcome::AlreadyBlocked);
            }
            prop_assert_eq!(engine.list_active().await.unwrap(), vec![id.clone()]);
            Ok(())
        })?;
    }

    #[test]
    fn scheduled_block_holds_until_the_instant(
        id in arb_identifier(),
        retention_ms in 1i64..(30 * MS_PER_DAY),
    ) {
        tokio_test::block_on(async {
            let (engine, clock) = engine().await;
            engine.block(&id).await.unwrap();

            let retention = Duration::milliseconds(retention_ms);
            engine.schedule_unblock(&id, retention).await.unwrap();
            prop_assert!(engine.is_blocked(&id).await.unwrap());

            clock.advance(retention - Duration::milliseconds(1));
            prop_assert!(engine.is_blocked(&id).await.unwrap());

            clock.advance(Duration::milliseconds(1));
            prop_assert!(!engine.is_blocked(&id).await.unwrap());
            Ok(())
        })?;
    }

    #[test]
    fn pending_window_is_never_replaced(
        id in arb_identifier(),
        first_days in 1i64..30,
        second_days in 1i64..30,
        elapsed_ms in 0i64..MS_PER_DAY,
    ) {
        tokio_test::block_on(async {
            let (engine, clock) = engine().await;
            engine.block(&id).await.unwrap();

            let first = engine
                .schedule_unblock(&id, Duration::days(first_days))
                .await
                .unwrap();
            clock.advance(Duration::milliseconds(elapsed_ms));

            let second = engine.schedule_unblock(&id, Duration::days(second_days)).await;
            prop_assert!(
                matches!(second, Err(Error::RetentionAlreadySet { .. })),
                "second schedule was not rejected: {:?}",
                second
            );

            let record = engine.status(&id).await.unwrap().unwrap();
            prop_assert_eq!(record.unblock_at, Some(first.unblock_at));
            Ok(())
        })?;
    }

    #[test]
    fn non_positive_retention_is_rejected(id in arb_identifier(), ms in i64::MIN / 2..=0) {
        tokio_test::block_on(async {
            let (engine, _) = engine().await;
            let result = engine.schedule_unblock(&id, Duration::milliseconds(ms)).await;

            prop_assert!(
                matches!(result, Err(Error::InvalidArgument(_))),
                "non-positive retention was accepted: {:?}",
                result
            );
            prop_assert!(!engine.is_blocked(&id).await.unwrap());
            Ok(())
        })?;
    }
}
