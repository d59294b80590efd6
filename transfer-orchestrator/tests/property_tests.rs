//! Property-based tests for the transfer saga
//!
//! - Rolling back any partially executed transfer leaves every balance at zero
//! - Step execution never breaks ledger conservation
//! - Converted amounts are rounded to the target currency's minor units

use ledger_core::{AccountId, Currency, InMemoryLedger, LedgerStore};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use transfer_orchestrator::{
    Config, ExecuteStepParams, InMemoryAccountDirectory, InMemoryTransferRepository,
    MemoryAuditSink, Ports, RollbackAction, StaticRateOracle, TransferOrchestrator,
    TransferRequest, TransferStatus,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn orchestrator(ledger: Arc<InMemoryLedger>, rate: Decimal) -> TransferOrchestrator {
    let directory = InMemoryAccountDirectory::new();
    directory.add_account("hub", Currency::EUR, "hub-eur", true);
    directory.add_account("dest", Currency::EUR, "dest-eur", true);

    let ports = Ports {
        ledger,
        rates: Arc::new(StaticRateOracle::new().with_rate(Currency::USD, Currency::EUR, rate)),
        directory: Arc::new(directory),
        repository: Arc::new(InMemoryTransferRepository::new()),
        audit: Arc::new(MemoryAuditSink::new()),
    };
    TransferOrchestrator::new(Config::default(), ports).unwrap()
}

fn request(amount: Decimal) -> TransferRequest {
    TransferRequest {
        source_amount: amount,
        source_currency: Currency::USD,
        target_currency: Currency::EUR,
        intermediate_provider: "hub".to_string(),
        target_provider: "dest".to_string(),
        source_card: None,
    }
}

/// Strategy for generating valid amounts (positive decimals)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (100u64..10_000_000u64).prop_map(|cents| Decimal::new(cents as i64, 2))
}

/// Strategy for generating rates between 0.5 and 1.5
fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (5_000u64..15_000u64).prop_map(|bp| Decimal::new(bp as i64, 4))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: rollback after any prefix of the saga restores balances
    #[test]
    fn prop_rollback_restores_balances(
        amount in amount_strategy(),
        rate in rate_strategy(),
        executed in 0u32..=2,
        shortfall in prop::bool::ANY,
    ) {
        let (statuses, outcomes, hub, dest, conserved) = runtime().block_on(async {
            let ledger = Arc::new(InMemoryLedger::new());
            let orchestrator = orchestrator(ledger.clone(), rate);
            let transfer = orchestrator.create_transfer(request(amount), None).await.unwrap();
            let converted = transfer.steps[0].converted_amount;

            for step in 1..=executed {
                let params = if step == 1 && shortfall {
                    // Provider delivers less than expected; step 2 then fails
                    ExecuteStepParams::with_amount((converted / Decimal::TWO).max(Decimal::new(1, 2)))
                } else {
                    ExecuteStepParams::default()
                };
                let _ = orchestrator.execute_step(transfer.id, step, params).await;
            }

            let before = orchestrator.get(transfer.id).await.unwrap().status;
            let outcomes = match before {
                TransferStatus::Completed => None,
                _ => Some(orchestrator.rollback(transfer.id, "property", 1).await.unwrap().outcomes),
            };

            let hub = ledger.get_balance(&AccountId::new("hub-eur"), Currency::EUR).await.unwrap();
            let dest = ledger.get_balance(&AccountId::new("dest-eur"), Currency::EUR).await.unwrap();
            (before, outcomes, hub, dest, ledger.verify_conservation().is_ok())
        });

        prop_assert!(conserved);
        match outcomes {
            None => {
                prop_assert_eq!(statuses, TransferStatus::Completed);
                prop_assert_eq!(hub, Decimal::ZERO);
                prop_assert!(dest > Decimal::ZERO);
            }
            Some(outcomes) => {
                prop_assert!(outcomes.iter().all(|o| o.action != RollbackAction::RollbackFailed));
                prop_assert_eq!(hub, Decimal::ZERO);
                prop_assert_eq!(dest, Decimal::ZERO);
            }
        }
    }

    /// Property: converted amount is round(amount x rate) at two decimals
    #[test]
    fn prop_conversion_is_rounded(
        amount in amount_strategy(),
        rate in rate_strategy(),
    ) {
        let converted = runtime().block_on(async {
            let orchestrator = orchestrator(Arc::new(InMemoryLedger::new()), rate);
            orchestrator
                .create_transfer(request(amount), None)
                .await
                .unwrap()
                .steps[0]
                .converted_amount
        });

        prop_assert!(converted.scale() <= 2);
        prop_assert_eq!(converted, Currency::EUR.round(amount * rate));
        prop_assert!((converted - amount * rate).abs() <= Decimal::new(5, 3));
    }
}
