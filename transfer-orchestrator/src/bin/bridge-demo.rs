//! Bridge demo binary
//!
//! Wires the orchestrator to in-memory collaborators and runs one
//! IDR -> EUR transfer end to end, plus a route suggestion and a card
//! action check.

use anyhow::Context;
use chrono::Utc;
use ledger_core::{Currency, InMemoryLedger};
use risk_engine::ActivityType;
use route_optimizer::{
    Hop, MinimumAmountTable, NewRoute, RiskTier, RouteCatalog, RoutePreferences, SuggestRequest,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use transfer_orchestrator::{
    Config, ExecuteStepParams, InMemoryAccountDirectory, InMemoryTransferRepository, Ports,
    StaticRateOracle, TracingAuditSink, TransferOrchestrator, TransferRequest,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match std::env::var("BRIDGE_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?
            .with_env()?,
        Err(_) => Config::from_env()?,
    };
    config.validate()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    if config.logging.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!("Starting bridge demo");

    let directory = InMemoryAccountDirectory::new();
    directory.add_account("wallet-id", Currency::EUR, "hub-eur", true);
    directory.add_account("wallet-eu", Currency::EUR, "user-eur", true);

    let rates = StaticRateOracle::new().with_rate(
        Currency::IDR,
        Currency::EUR,
        Decimal::new(58, 6),
    );

    let ledger = Arc::new(InMemoryLedger::new());
    let ports = Ports {
        ledger: ledger.clone(),
        rates: Arc::new(rates),
        directory: Arc::new(directory),
        repository: Arc::new(InMemoryTransferRepository::new()),
        audit: Arc::new(TracingAuditSink),
    };

    let catalog = RouteCatalog::new();
    catalog.create_route(NewRoute {
        name: "ID wallet to EU wallet".to_string(),
        target_provider: "wallet-eu".to_string(),
        target_currency: Currency::EUR,
        hops: vec![
            Hop {
                provider: "wallet-id".to_string(),
                method: "e_wallet".to_string(),
                estimated_fee: Decimal::new(150, 2),
                estimated_time_minutes: 10,
                risk_tier: RiskTier::Low,
            },
            Hop {
                provider: "wallet-eu".to_string(),
                method: "e_wallet".to_string(),
                estimated_fee: Decimal::new(100, 2),
                estimated_time_minutes: 20,
                risk_tier: RiskTier::Medium,
            },
        ],
        catalog_fee: Decimal::new(250, 2),
        catalog_reference_amount: Decimal::new(100, 0),
        catalog_time_minutes: 30,
        reliability_score: 97.5,
        minimum_amount: Decimal::ONE,
        maximum_amount: Decimal::new(10_000, 0),
    })?;
    let minimums = MinimumAmountTable::builder()
        .entry("wallet-id", "e_wallet", Decimal::ONE)
        .build()?;

    let orchestrator = TransferOrchestrator::with_routes(config, ports, catalog, minimums)?;

    let suggestions = orchestrator.suggest_routes(&SuggestRequest {
        amount: Decimal::new(58, 0),
        source_currency: "EUR".to_string(),
        target_currency: "EUR".to_string(),
        target_provider: None,
        preferences: RoutePreferences::default(),
    })?;
    for suggestion in &suggestions {
        info!(
            route = %suggestion.name,
            fee = %suggestion.actual_fee,
            score = suggestion.overall_score,
            "Route suggestion"
        );
    }

    let decision =
        orchestrator.authorize_card_action("user-eur", "wallet-eu", ActivityType::Creation, Utc::now());
    info!(
        allowed = decision.allowed,
        level = %decision.assessment.risk_level,
        "Card action checked"
    );

    let transfer = orchestrator
        .create_transfer(
            TransferRequest {
                source_amount: Decimal::new(1_000_000, 0),
                source_currency: Currency::IDR,
                target_currency: Currency::EUR,
                intermediate_provider: "wallet-id".to_string(),
                target_provider: "wallet-eu".to_string(),
                source_card: None,
            },
            None,
        )
        .await?;

    for step in 1..=transfer.steps.len() as u32 {
        orchestrator
            .execute_step(transfer.id, step, ExecuteStepParams::default())
            .await
            .with_context(|| format!("executing step {} of {}", step, transfer.id))?;
    }

    let status = orchestrator.status(transfer.id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    ledger.verify_conservation()?;
    info!("Bridge demo finished");

    Ok(())
}
