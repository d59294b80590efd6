//! Multi-step transfer orchestrator
//!
//! Drives a transfer through its steps one at a time and compensates
//! completed steps on rollback.
//!
//! Every mutating operation on a transfer runs under that transfer's
//! single-writer lock and saves through the repository's version check.
//! A step is persisted as `processing` before the ledger is touched, so a
//! crash mid-step leaves a marker that halts the transfer for review.

use crate::{
    AccountDirectory, AuditEvent, AuditEventType, AuditSeverity, AuditSink, CardActionDecision,
    Config, Error, ExecuteStepParams, RateOracle, Result, RollbackAction, RollbackReport,
    StatusView, Step, StepKind, StepRollbackOutcome, StepStatus, TransferAggregate, TransferId,
    TransferRepository, TransferRequest, TransferStatus,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ledger_core::{Currency, LedgerStore, LedgerTransaction, TransactionDraft};
use risk_engine::{ActivityType, FraudRiskEngine, RiskAssessment};
use route_optimizer::{
    MinimumAmountTable, RouteCatalog, RouteOptimizer, RouteSuggestion, SuggestRequest,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

/// Provider name used for step 1 when no card funds the transfer
pub const EXTERNAL_SOURCE: &str = "external";

/// Collaborators the orchestrator talks to
#[derive(Clone)]
pub struct Ports {
    /// Balance store
    pub ledger: Arc<dyn LedgerStore>,
    /// Conversion rates
    pub rates: Arc<dyn RateOracle>,
    /// Account and card lookup
    pub directory: Arc<dyn AccountDirectory>,
    /// Aggregate storage
    pub repository: Arc<dyn TransferRepository>,
    /// Audit trail
    pub audit: Arc<dyn AuditSink>,
}

impl fmt::Debug for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}

/// Transfer orchestrator
pub struct TransferOrchestrator {
    config: Config,
    ports: Ports,
    risk: FraudRiskEngine,
    routes: RouteOptimizer,
    // Map: transfer -> single-writer lock
    locks: DashMap<TransferId, Arc<Mutex<()>>>,
}

impl fmt::Debug for TransferOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferOrchestrator")
            .field("config", &self.config)
            .field("routes", &self.routes.catalog().len())
            .field("locked_transfers", &self.locks.len())
            .finish()
    }
}

/// Held single-writer lock on one transfer
///
/// Dropping it releases the lock and removes the map entry once no other
/// caller holds or waits on it.
struct TransferLease<'a> {
    id: TransferId,
    locks: &'a DashMap<TransferId, Arc<Mutex<()>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TransferLease<'_> {
    fn drop(&mut self) {
        // The guard owns a clone of the entry; release it before counting
        self.guard.take();
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl TransferOrchestrator {
    /// Create new orchestrator with an empty route catalog
    pub fn new(config: Config, ports: Ports) -> Result<Self> {
        Self::with_routes(
            config,
            ports,
            RouteCatalog::new(),
            MinimumAmountTable::default(),
        )
    }

    /// Create new orchestrator over an existing route catalog
    pub fn with_routes(
        config: Config,
        ports: Ports,
        catalog: RouteCatalog,
        minimums: MinimumAmountTable,
    ) -> Result<Self> {
        config.validate()?;
        let risk = FraudRiskEngine::new(config.risk.clone())?;
        let routes = RouteOptimizer::new(catalog, minimums, config.routing.clone())?;

        Ok(Self {
            config,
            ports,
            risk,
            routes,
            locks: DashMap::new(),
        })
    }

    /// Transfers that currently hold or await a lock entry
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fraud risk engine
    pub fn risk_engine(&self) -> &FraudRiskEngine {
        &self.risk
    }

    /// Route catalog
    pub fn route_catalog(&self) -> &RouteCatalog {
        self.routes.catalog()
    }

    // ===== Transfers =====

    /// Resolve accounts, convert the amount and persist a two-step transfer
    ///
    /// A failing or slow rate oracle is absorbed with a rate of 1.
    pub async fn create_transfer(
        &self,
        request: TransferRequest,
        deadline: Option<Instant>,
    ) -> Result<TransferAggregate> {
        validate_request(&request)?;
        ensure_not_expired(deadline)?;

        let id = TransferId::new();
        let directory = &self.ports.directory;

        let intermediate = directory
            .find_active_account(&request.intermediate_provider, request.target_currency)
            .await?;
        let target = directory
            .find_active_account(&request.target_provider, request.target_currency)
            .await?;
        if intermediate.id == target.id {
            return Err(Error::Validation(format!(
                "intermediate and target resolve to the same account {}",
                target.id
            )));
        }

        let source_provider = match &request.source_card {
            Some(card_ref) => {
                let card = directory.find_card(card_ref).await?;
                if !card.active {
                    return Err(Error::Precondition(format!(
                        "card {} is not active",
                        card_ref
                    )));
                }
                card.provider
            }
            None => EXTERNAL_SOURCE.to_string(),
        };

        let (rate, fallback) = self
            .fetch_rate(id, request.source_currency, request.target_currency, deadline)
            .await?;
        let converted = request
            .target_currency
            .round(convert(request.source_amount, rate)?);
        if converted <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "{} {} converts to nothing in {}",
                request.source_amount, request.source_currency, request.target_currency
            )));
        }

        let steps = vec![
            Step::planned(
                1,
                StepKind::ExternalFunding,
                (source_provider, None, request.source_currency),
                (
                    request.intermediate_provider.clone(),
                    intermediate.id.clone(),
                    request.target_currency,
                ),
                request.source_amount,
                converted,
                rate,
            ),
            Step::planned(
                2,
                StepKind::InternalTransfer,
                (
                    request.intermediate_provider.clone(),
                    Some(intermediate.id),
                    request.target_currency,
                ),
                (
                    request.target_provider.clone(),
                    target.id,
                    request.target_currency,
                ),
                converted,
                converted,
                Decimal::ONE,
            ),
        ];

        let now = Utc::now();
        let aggregate = TransferAggregate {
            id,
            request,
            status: TransferStatus::Pending,
            steps,
            version: 0,
            halted_for_review: false,
            rate_fallback_used: fallback,
            created_at: now,
            updated_at: now,
            completed_at: None,
            failed_at: None,
            failure_reason: None,
        };
        let aggregate = self.ports.repository.insert(aggregate).await?;

        info!(
            transfer_id = %id,
            amount = %aggregate.request.source_amount,
            source = %aggregate.request.source_currency,
            target = %aggregate.request.target_currency,
            rate = %rate,
            converted = %converted,
            "Transfer created"
        );
        self.audit(
            AuditEvent::new(AuditEventType::TransferCreated, id.to_string())
                .transition(None::<TransferStatus>, aggregate.status)
                .context(json!({
                    "source_amount": aggregate.request.source_amount,
                    "converted_amount": converted,
                    "exchange_rate": rate,
                    "rate_fallback": fallback,
                    "steps": aggregate.steps.len(),
                })),
        );

        Ok(aggregate)
    }

    /// Execute one step
    ///
    /// Only the first step that is not completed may run. A failed step may
    /// be run again. Ledger rejections and timeouts fail the step, leave the
    /// transfer pending and are returned to the caller.
    pub async fn execute_step(
        &self,
        id: TransferId,
        step_number: u32,
        params: ExecuteStepParams,
    ) -> Result<TransferAggregate> {
        validate_params(&params)?;

        let _lease = self.lock_transfer(id).await;

        let aggregate = self.ports.repository.get(id).await?;
        ensure_not_expired(params.deadline)?;

        if aggregate.halted_for_review {
            return Err(Error::Precondition(format!(
                "transfer {} is halted pending review",
                id
            )));
        }
        if let Some(stuck) = aggregate.processing_step().map(|s| s.step_number) {
            return Err(self.halt_for_review(aggregate, stuck).await);
        }
        if aggregate.status != TransferStatus::Pending {
            return Err(Error::Precondition(format!(
                "transfer {} is {:?}",
                id, aggregate.status
            )));
        }

        let step = aggregate.step(step_number).ok_or_else(|| {
            Error::NotFound(format!("step {} of transfer {}", step_number, id))
        })?;
        if !step.status.can_transition_to(StepStatus::Processing) {
            return Err(Error::Precondition(format!(
                "step {} is {}",
                step_number, step.status
            )));
        }
        match aggregate.next_step() {
            Some(next) if next.step_number == step_number => {}
            Some(next) => {
                return Err(Error::Precondition(format!(
                    "step {} must complete before step {}",
                    next.step_number, step_number
                )))
            }
            None => {
                return Err(Error::Precondition(format!(
                    "transfer {} has no step left to execute",
                    id
                )))
            }
        }
        let previous = step.status;

        let mut aggregate = aggregate;
        let now = Utc::now();
        let step = step_mut(&mut aggregate, step_number)?;
        step.status = StepStatus::Processing;
        step.attempts += 1;
        step.started_at = Some(now);
        let attempt = step.attempts;

        let expected = aggregate.version;
        let mut aggregate = self.ports.repository.save(aggregate, expected).await?;
        debug!(transfer_id = %id, step = step_number, attempt, "Step started");
        self.audit(
            AuditEvent::new(AuditEventType::StepStarted, id.to_string())
                .transition(previous, StepStatus::Processing)
                .context(json!({ "step": step_number, "attempt": attempt })),
        );

        let planned = step_mut(&mut aggregate, step_number)?.clone();
        let outcome = self.perform_step(id, &planned, &params).await;

        let now = Utc::now();
        match outcome {
            Ok(tx) => {
                let step = step_mut(&mut aggregate, step_number)?;
                step.status = StepStatus::Completed;
                step.completed_at = Some(now);
                step.ledger_transaction = Some(tx.id);
                step.actual_amount = Some(tx.amount);
                step.actual_fee = Some(tx.fee);
                step.failure_reason = None;

                let finished = aggregate.all_completed();
                if finished {
                    aggregate.status = TransferStatus::Completed;
                    aggregate.completed_at = Some(now);
                }

                let expected = aggregate.version;
                let aggregate = self.ports.repository.save(aggregate, expected).await?;

                info!(
                    transfer_id = %id,
                    step = step_number,
                    ledger_tx = %tx.id,
                    amount = %tx.amount,
                    "Step completed"
                );
                self.audit(
                    AuditEvent::new(AuditEventType::StepCompleted, id.to_string())
                        .transition(StepStatus::Processing, StepStatus::Completed)
                        .context(json!({
                            "step": step_number,
                            "ledger_transaction": tx.id.to_string(),
                            "amount": tx.amount,
                            "converted_amount": tx.converted_amount,
                            "fee": tx.fee,
                        })),
                );
                if finished {
                    info!(transfer_id = %id, "Transfer completed");
                    self.audit(
                        AuditEvent::new(AuditEventType::TransferCompleted, id.to_string())
                            .transition(TransferStatus::Pending, TransferStatus::Completed),
                    );
                }

                Ok(aggregate)
            }
            Err(err) => {
                let reason = err.to_string();
                let step = step_mut(&mut aggregate, step_number)?;
                step.status = StepStatus::Failed;
                step.failed_at = Some(now);
                step.failure_reason = Some(reason.clone());

                let expected = aggregate.version;
                if let Err(save_err) = self.ports.repository.save(aggregate, expected).await {
                    error!(
                        transfer_id = %id,
                        step = step_number,
                        error = %save_err,
                        "Failed to persist step failure; step stays processing"
                    );
                }

                warn!(transfer_id = %id, step = step_number, error = %reason, "Step failed");
                self.audit(
                    AuditEvent::new(AuditEventType::StepFailed, id.to_string())
                        .severity(AuditSeverity::Error)
                        .transition(StepStatus::Processing, StepStatus::Failed)
                        .context(json!({ "step": step_number, "reason": reason })),
                );

                Err(err)
            }
        }
    }

    /// Reverse completed steps from the last one down to `from_step`
    ///
    /// Best-effort: a step that cannot be reversed is reported and the
    /// remaining steps are still processed. The transfer always ends failed.
    pub async fn rollback(
        &self,
        id: TransferId,
        reason: &str,
        from_step: u32,
    ) -> Result<RollbackReport> {
        if reason.trim().is_empty() {
            return Err(Error::Validation("rollback reason is required".to_string()));
        }

        let _lease = self.lock_transfer(id).await;

        let mut aggregate = self.ports.repository.get(id).await?;
        if aggregate.status == TransferStatus::Completed {
            return Err(Error::Precondition(format!(
                "transfer {} is completed and cannot be rolled back",
                id
            )));
        }
        if from_step == 0 || from_step as usize > aggregate.steps.len() {
            return Err(Error::Validation(format!(
                "from_step {} outside 1..={}",
                from_step,
                aggregate.steps.len()
            )));
        }

        let mut numbers: Vec<u32> = aggregate
            .steps
            .iter()
            .map(|s| s.step_number)
            .filter(|n| *n >= from_step)
            .collect();
        numbers.sort_unstable_by(|a, b| b.cmp(a));

        let mut outcomes = Vec::with_capacity(numbers.len());
        for step_number in numbers {
            let outcome = self.reverse_step(&mut aggregate, step_number, reason).await;
            let severity = match outcome.action {
                RollbackAction::RollbackFailed => AuditSeverity::Error,
                _ => AuditSeverity::Info,
            };
            self.audit(
                AuditEvent::new(AuditEventType::RollbackStep, id.to_string())
                    .severity(severity)
                    .context(json!({
                        "step": step_number,
                        "action": outcome.action,
                        "reason": outcome.reason,
                    })),
            );
            outcomes.push(outcome);
        }

        let previous = aggregate.status;
        let now = Utc::now();
        aggregate.status = TransferStatus::Failed;
        aggregate.failed_at = Some(now);
        aggregate.failure_reason = Some(format!("Rollback: {}", reason));

        let expected = aggregate.version;
        let aggregate = self.ports.repository.save(aggregate, expected).await?;

        let failed = outcomes
            .iter()
            .filter(|o| o.action == RollbackAction::RollbackFailed)
            .count();
        if failed > 0 {
            warn!(transfer_id = %id, failed, "Rollback finished with unreversed steps");
        } else {
            info!(transfer_id = %id, steps = outcomes.len(), "Rollback finished");
        }
        self.audit(
            AuditEvent::new(AuditEventType::RollbackCompleted, id.to_string())
                .severity(if failed > 0 {
                    AuditSeverity::Critical
                } else {
                    AuditSeverity::Info
                })
                .transition(previous, TransferStatus::Failed)
                .context(json!({ "reason": reason, "outcomes": outcomes })),
        );

        Ok(RollbackReport {
            transfer: aggregate,
            outcomes,
        })
    }

    /// Progress view
    pub async fn status(&self, id: TransferId) -> Result<StatusView> {
        Ok(self.ports.repository.get(id).await?.status_view())
    }

    /// Transfer by ID
    pub async fn get(&self, id: TransferId) -> Result<TransferAggregate> {
        self.ports.repository.get(id).await
    }

    /// All transfers, oldest first
    pub async fn list(&self) -> Result<Vec<TransferAggregate>> {
        self.ports.repository.list().await
    }

    /// Lift a review hold after manual inspection
    ///
    /// Steps left in `processing` are marked failed so they can be retried
    /// or rolled back.
    pub async fn clear_review_hold(&self, id: TransferId, note: &str) -> Result<TransferAggregate> {
        let _lease = self.lock_transfer(id).await;

        let mut aggregate = self.ports.repository.get(id).await?;
        if !aggregate.halted_for_review {
            return Err(Error::Precondition(format!(
                "transfer {} is not halted",
                id
            )));
        }

        let now = Utc::now();
        for step in aggregate
            .steps
            .iter_mut()
            .filter(|s| s.status == StepStatus::Processing)
        {
            step.status = StepStatus::Failed;
            step.failed_at = Some(now);
            step.failure_reason = Some(format!("Interrupted; cleared on review: {}", note));
        }
        aggregate.halted_for_review = false;

        let expected = aggregate.version;
        let aggregate = self.ports.repository.save(aggregate, expected).await?;

        info!(transfer_id = %id, "Review hold cleared");
        self.audit(
            AuditEvent::new(AuditEventType::ReviewCleared, id.to_string())
                .context(json!({ "note": note })),
        );
        Ok(aggregate)
    }

    // ===== Risk and routing =====

    /// Gate a card action through the fraud engine
    ///
    /// The action is recorded whether or not it is allowed.
    pub fn authorize_card_action(
        &self,
        account: &str,
        provider: &str,
        activity_type: ActivityType,
        now: DateTime<Utc>,
    ) -> CardActionDecision {
        let outcome = self
            .risk
            .record_activity(Some(account), Some(provider), activity_type, now);
        let assessment = outcome.assessment;
        let allowed = assessment.risk_level < self.config.risk.block_level;

        let (event_type, severity) = if allowed {
            (AuditEventType::CardActionAssessed, AuditSeverity::Info)
        } else {
            warn!(
                account,
                provider,
                activity = ?activity_type,
                level = %assessment.risk_level,
                "Card action blocked"
            );
            (AuditEventType::CardActionBlocked, AuditSeverity::Warning)
        };
        self.audit(
            AuditEvent::new(event_type, account)
                .severity(severity)
                .context(json!({
                    "provider": provider,
                    "activity": activity_type,
                    "risk_score": assessment.risk_score.score(),
                    "risk_level": assessment.risk_level,
                    "risk_factors": assessment.risk_factors,
                    "alert_type": assessment.alert_type,
                })),
        );

        CardActionDecision {
            allowed,
            assessment,
            record: outcome.record,
        }
    }

    /// Score a card action without recording it
    pub fn assess_risk(
        &self,
        account: &str,
        provider: &str,
        activity_type: ActivityType,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        self.risk
            .assess_risk(Some(account), Some(provider), activity_type, now)
    }

    /// Ranked routes for a request
    pub fn suggest_routes(&self, request: &SuggestRequest) -> Result<Vec<RouteSuggestion>> {
        Ok(self.routes.suggest_routes(request)?)
    }

    // ===== Internals =====

    async fn lock_transfer(&self, id: TransferId) -> TransferLease<'_> {
        let lock = self.locks.entry(id).or_default().clone();
        let guard = lock.lock_owned().await;
        TransferLease {
            id,
            locks: &self.locks,
            guard: Some(guard),
        }
    }

    fn audit(&self, event: AuditEvent) {
        self.ports.audit.record(event);
    }

    async fn perform_step(
        &self,
        id: TransferId,
        step: &Step,
        params: &ExecuteStepParams,
    ) -> Result<LedgerTransaction> {
        let reference = format!("{}:step-{}", id, step.step_number);
        let fee = params.actual_fee.unwrap_or(Decimal::ZERO);
        let ledger = &self.ports.ledger;

        match step.kind {
            StepKind::ExternalFunding => {
                // actual_amount is trusted as reported by the operator
                let amount = step
                    .to_currency
                    .round(params.actual_amount.unwrap_or(step.converted_amount));
                let draft = TransactionDraft {
                    from_account: None,
                    to_account: step.to_account.clone(),
                    currency: step.to_currency,
                    converted_currency: step.to_currency,
                    amount,
                    converted_amount: amount,
                    fee,
                    reference,
                };
                self.ledger_call(params.deadline, "post", ledger.post_transaction(draft))
                    .await
            }
            StepKind::InternalTransfer => {
                let from = step.from_account.clone().ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "step {} moves funds but has no source account",
                        step.step_number
                    ))
                })?;
                let amount = params.actual_amount.unwrap_or(step.requested_amount);

                let balance = self
                    .ledger_call(
                        params.deadline,
                        "balance read",
                        ledger.get_balance(&from, step.from_currency),
                    )
                    .await?;
                if balance < amount {
                    return Err(Error::InsufficientFunds(format!(
                        "account {} holds {} {}, step {} needs {}",
                        from, balance, step.from_currency, step.step_number, amount
                    )));
                }

                let draft = TransactionDraft {
                    from_account: Some(from),
                    to_account: step.to_account.clone(),
                    currency: step.from_currency,
                    converted_currency: step.to_currency,
                    amount,
                    converted_amount: step
                        .to_currency
                        .round(convert(amount, step.exchange_rate)?),
                    fee,
                    reference,
                };
                self.ledger_call(params.deadline, "post", ledger.post_transaction(draft))
                    .await
            }
        }
    }

    async fn reverse_step(
        &self,
        aggregate: &mut TransferAggregate,
        step_number: u32,
        reason: &str,
    ) -> StepRollbackOutcome {
        let id = aggregate.id;
        let Some(step) = aggregate.step_mut(step_number) else {
            return StepRollbackOutcome {
                step_number,
                action: RollbackAction::Skipped,
                reason: "step does not exist".to_string(),
            };
        };

        if step.status != StepStatus::Completed {
            return StepRollbackOutcome {
                step_number,
                action: RollbackAction::Skipped,
                reason: format!("step was {}", step.status),
            };
        }

        let Some(tx_id) = step.ledger_transaction else {
            error!(transfer_id = %id, step = step_number, "Completed step has no ledger transaction");
            return StepRollbackOutcome {
                step_number,
                action: RollbackAction::RollbackFailed,
                reason: "no ledger transaction linked to completed step".to_string(),
            };
        };

        let cancelled = self
            .ledger_call(None, "cancel", self.ports.ledger.cancel_transaction(tx_id))
            .await;
        match cancelled {
            Ok(_) => {
                step.status = StepStatus::Cancelled;
                step.rolled_back_at = Some(Utc::now());
                step.rollback_reason = Some(reason.to_string());
                info!(transfer_id = %id, step = step_number, ledger_tx = %tx_id, "Step reversed");
                StepRollbackOutcome {
                    step_number,
                    action: RollbackAction::Reversed,
                    reason: format!("ledger transaction {} cancelled", tx_id),
                }
            }
            Err(err) => {
                warn!(
                    transfer_id = %id,
                    step = step_number,
                    error = %err,
                    "Step reversal failed; continuing with remaining steps"
                );
                StepRollbackOutcome {
                    step_number,
                    action: RollbackAction::RollbackFailed,
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn fetch_rate(
        &self,
        id: TransferId,
        source: Currency,
        target: Currency,
        deadline: Option<Instant>,
    ) -> Result<(Decimal, bool)> {
        if source == target {
            return Ok((Decimal::ONE, false));
        }

        let budget = time_budget(self.config.timeouts.rate_oracle(), deadline)?;
        let failure = match timeout(budget, self.ports.rates.get_rate(source, target)).await {
            Ok(Ok(rate)) if rate > Decimal::ZERO => return Ok((rate, false)),
            Ok(Ok(rate)) => format!("non-positive rate {}", rate),
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("timed out after {}ms", budget.as_millis()),
        };
        // No fallback for a caller whose deadline has passed
        ensure_not_expired(deadline)?;

        warn!(
            transfer_id = %id,
            source = %source,
            target = %target,
            reason = %failure,
            "Rate oracle unavailable, falling back to rate 1"
        );
        self.audit(
            AuditEvent::new(AuditEventType::RateFallback, id.to_string())
                .severity(AuditSeverity::Warning)
                .context(json!({
                    "source": source,
                    "target": target,
                    "reason": failure,
                    "fallback_rate": Decimal::ONE,
                })),
        );
        Ok((Decimal::ONE, true))
    }

    async fn ledger_call<T, F>(&self, deadline: Option<Instant>, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = ledger_core::Result<T>>,
    {
        let budget = time_budget(self.config.timeouts.ledger(), deadline)?;
        match timeout(budget, call).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::UpstreamUnavailable(format!(
                "ledger {} timed out after {}ms",
                what,
                budget.as_millis()
            ))),
        }
    }

    async fn halt_for_review(&self, mut aggregate: TransferAggregate, stuck: u32) -> Error {
        let id = aggregate.id;
        let reason = format!("step {} of transfer {} found in processing", stuck, id);
        error!(transfer_id = %id, step = stuck, "Invariant violation, halting transfer for review");

        if !aggregate.halted_for_review {
            aggregate.halted_for_review = true;
            let expected = aggregate.version;
            if let Err(err) = self.ports.repository.save(aggregate, expected).await {
                error!(transfer_id = %id, error = %err, "Failed to persist review hold");
            }
            self.audit(
                AuditEvent::new(AuditEventType::InvariantViolation, id.to_string())
                    .severity(AuditSeverity::Critical)
                    .context(json!({ "step": stuck, "reason": reason })),
            );
        }

        Error::InvariantViolation(reason)
    }
}

fn step_mut(aggregate: &mut TransferAggregate, step_number: u32) -> Result<&mut Step> {
    let id = aggregate.id;
    aggregate
        .step_mut(step_number)
        .ok_or_else(|| Error::NotFound(format!("step {} of transfer {}", step_number, id)))
}

fn convert(amount: Decimal, rate: Decimal) -> Result<Decimal> {
    amount.checked_mul(rate).ok_or_else(|| {
        Error::Validation(format!("{} at rate {} is out of range", amount, rate))
    })
}

fn validate_request(request: &TransferRequest) -> Result<()> {
    if request.source_amount <= Decimal::ZERO {
        return Err(Error::Validation(format!(
            "source amount must be positive, got {}",
            request.source_amount
        )));
    }
    if request.intermediate_provider.trim().is_empty() {
        return Err(Error::Validation(
            "intermediate provider is required".to_string(),
        ));
    }
    if request.target_provider.trim().is_empty() {
        return Err(Error::Validation("target provider is required".to_string()));
    }
    if matches!(&request.source_card, Some(card) if card.trim().is_empty()) {
        return Err(Error::Validation("source card reference is blank".to_string()));
    }
    Ok(())
}

fn validate_params(params: &ExecuteStepParams) -> Result<()> {
    if let Some(amount) = params.actual_amount {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "actual amount must be positive, got {}",
                amount
            )));
        }
    }
    if let Some(fee) = params.actual_fee {
        if fee < Decimal::ZERO {
            return Err(Error::Validation(format!(
                "actual fee must not be negative, got {}",
                fee
            )));
        }
    }
    Ok(())
}

fn ensure_not_expired(deadline: Option<Instant>) -> Result<()> {
    match deadline {
        Some(deadline) if deadline <= Instant::now() => Err(Error::UpstreamUnavailable(
            "caller deadline already expired".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Configured timeout, shortened to the caller's remaining time
fn time_budget(configured: Duration, deadline: Option<Instant>) -> Result<Duration> {
    let Some(deadline) = deadline else {
        return Ok(configured);
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(Error::UpstreamUnavailable(
            "caller deadline expired".to_string(),
        ));
    }
    Ok(configured.min(remaining))
}
