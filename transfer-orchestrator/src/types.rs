//! Core types for the transfer orchestrator

use chrono::{DateTime, Utc};
use ledger_core::{AccountId, Currency, LedgerTransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

/// Transfer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferId(Uuid);

impl TransferId {
    /// Generate new transfer ID (time-ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller's request to move money; immutable once steps exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Amount the sender pays
    pub source_amount: Decimal,
    /// Currency the sender pays in
    pub source_currency: Currency,
    /// Currency delivered
    pub target_currency: Currency,
    /// Provider holding the intermediate account
    pub intermediate_provider: String,
    /// Provider holding the target account
    pub target_provider: String,
    /// Card funding step 1, if any
    pub source_card: Option<String>,
}

/// Aggregate status
///
/// The stored status is `Pending`, `Completed` or `Failed`; `Processing` is
/// only ever derived for status views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Awaiting steps
    Pending,
    /// Some steps done, more to go
    Processing,
    /// Every step completed
    Completed,
    /// Rolled back
    Failed,
}

/// Step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started
    Pending,
    /// Started, outcome not yet recorded
    Processing,
    /// Done
    Completed,
    /// Failed; may be retried
    Failed,
    /// Reversed by rollback
    Cancelled,
}

impl StepStatus {
    /// Whether `self -> next` is an allowed transition
    ///
    /// `Failed -> Processing` is the retry path; `Completed -> Cancelled`
    /// happens only in rollback.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Failed, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Cancelled)
        )
    }

    /// snake_case label
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Processing => "processing",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a step does to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Manual funding from outside; credits the intermediate account
    ExternalFunding,
    /// Ledger transfer from the intermediate to the target account
    InternalTransfer,
}

/// One hop of a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position
    pub step_number: u32,
    /// Ledger effect
    pub kind: StepKind,
    /// Sending provider
    pub from_provider: String,
    /// Receiving provider
    pub to_provider: String,
    /// Debited account; `None` for external funding
    pub from_account: Option<AccountId>,
    /// Credited account
    pub to_account: AccountId,
    /// Currency sent
    pub from_currency: Currency,
    /// Currency received
    pub to_currency: Currency,
    /// Planned amount in `from_currency`
    pub requested_amount: Decimal,
    /// Planned amount in `to_currency`
    pub converted_amount: Decimal,
    /// Rate applied between the two
    pub exchange_rate: Decimal,
    /// Amount actually moved
    pub actual_amount: Option<Decimal>,
    /// Fee actually charged
    pub actual_fee: Option<Decimal>,
    /// Status
    pub status: StepStatus,
    /// Executions attempted
    pub attempts: u32,
    /// Last execution start
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
    /// Last failure time
    pub failed_at: Option<DateTime<Utc>>,
    /// Last failure reason
    pub failure_reason: Option<String>,
    /// Ledger transaction this step posted; set only once completed
    pub ledger_transaction: Option<LedgerTransactionId>,
    /// Reversal time
    pub rolled_back_at: Option<DateTime<Utc>>,
    /// Reversal reason
    pub rollback_reason: Option<String>,
}

impl Step {
    pub(crate) fn planned(
        step_number: u32,
        kind: StepKind,
        from: (String, Option<AccountId>, Currency),
        to: (String, AccountId, Currency),
        requested_amount: Decimal,
        converted_amount: Decimal,
        exchange_rate: Decimal,
    ) -> Self {
        Self {
            step_number,
            kind,
            from_provider: from.0,
            to_provider: to.0,
            from_account: from.1,
            to_account: to.1,
            from_currency: from.2,
            to_currency: to.2,
            requested_amount,
            converted_amount,
            exchange_rate,
            actual_amount: None,
            actual_fee: None,
            status: StepStatus::Pending,
            attempts: 0,
            started_at: None,
            completed_at: None,
            failed_at: None,
            failure_reason: None,
            ledger_transaction: None,
            rolled_back_at: None,
            rollback_reason: None,
        }
    }
}

/// Transfer aggregate; owns its steps and persists as one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferAggregate {
    /// Transfer ID
    pub id: TransferId,
    /// Original request
    pub request: TransferRequest,
    /// Stored status
    pub status: TransferStatus,
    /// Steps, ascending by number
    pub steps: Vec<Step>,
    /// Optimistic concurrency version, bumped on every save
    pub version: u64,
    /// Automated execution stopped pending manual review
    pub halted_for_review: bool,
    /// The rate oracle failed and a rate of 1 was used
    pub rate_fallback_used: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure time
    pub failed_at: Option<DateTime<Utc>>,
    /// Failure reason
    pub failure_reason: Option<String>,
}

impl TransferAggregate {
    /// Step by number
    pub fn step(&self, step_number: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_number == step_number)
    }

    pub(crate) fn step_mut(&mut self, step_number: u32) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.step_number == step_number)
    }

    /// First step not yet completed; the only one allowed to execute
    pub fn next_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| s.status != StepStatus::Completed)
    }

    /// Completed steps
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// Every step completed
    pub fn all_completed(&self) -> bool {
        !self.steps.is_empty() && self.completed_steps() == self.steps.len()
    }

    /// Step found mid-execution, if any
    pub fn processing_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::Processing)
    }

    /// Rollback would reverse something
    pub fn can_rollback(&self) -> bool {
        self.completed_steps() > 0 && self.status != TransferStatus::Completed
    }

    /// Derived progress view
    pub fn status_view(&self) -> StatusView {
        let completed = self.completed_steps();
        let total = self.steps.len();
        let overall_status = match self.status {
            TransferStatus::Pending
                if completed > 0 || self.processing_step().is_some() =>
            {
                TransferStatus::Processing
            }
            status => status,
        };
        let current_step = match self.status {
            TransferStatus::Pending => self
                .steps
                .iter()
                .find(|s| matches!(s.status, StepStatus::Pending | StepStatus::Failed))
                .map(|s| s.step_number),
            _ => None,
        };

        StatusView {
            id: self.id,
            overall_status,
            current_step,
            completed_steps: completed,
            total_steps: total,
            progress_pct: if total == 0 {
                0.0
            } else {
                completed as f64 / total as f64 * 100.0
            },
            can_rollback: self.can_rollback(),
            halted_for_review: self.halted_for_review,
            failure_reason: self.failure_reason.clone(),
        }
    }
}

/// Progress of a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    /// Transfer ID
    pub id: TransferId,
    /// Derived overall status
    pub overall_status: TransferStatus,
    /// First step awaiting execution
    pub current_step: Option<u32>,
    /// Completed steps
    pub completed_steps: usize,
    /// All steps
    pub total_steps: usize,
    /// Completed share, 0-100
    pub progress_pct: f64,
    /// Completed steps exist and the transfer is not completed
    pub can_rollback: bool,
    /// Halted pending review
    pub halted_for_review: bool,
    /// Failure reason, if failed
    pub failure_reason: Option<String>,
}

/// Inputs to one step execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteStepParams {
    /// Amount actually moved; defaults to the planned amount
    pub actual_amount: Option<Decimal>,
    /// Fee actually charged
    pub actual_fee: Option<Decimal>,
    /// Caller deadline
    pub deadline: Option<Instant>,
}

impl ExecuteStepParams {
    /// Params with an actual amount
    pub fn with_amount(amount: Decimal) -> Self {
        Self {
            actual_amount: Some(amount),
            ..Default::default()
        }
    }
}

/// What rollback did to one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RollbackAction {
    /// Ledger effect reversed, step cancelled
    #[serde(rename = "reversed")]
    Reversed,
    /// Step was not completed; left untouched
    #[serde(rename = "skipped")]
    Skipped,
    /// Reversal attempted and failed; step left completed
    #[serde(rename = "rollback failed")]
    RollbackFailed,
}

/// Per-step rollback outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRollbackOutcome {
    /// Step number
    pub step_number: u32,
    /// Action taken
    pub action: RollbackAction,
    /// Explanation
    pub reason: String,
}

/// Full rollback result; partial failures are listed, never swallowed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackReport {
    /// Transfer after rollback
    pub transfer: TransferAggregate,
    /// One outcome per visited step, highest number first
    pub outcomes: Vec<StepRollbackOutcome>,
}

impl RollbackReport {
    /// Every visited completed step was reversed
    pub fn fully_reversed(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.action != RollbackAction::RollbackFailed)
    }
}

/// Verdict on a gated card action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardActionDecision {
    /// Action may proceed
    pub allowed: bool,
    /// Assessment behind the verdict
    pub assessment: risk_engine::RiskAssessment,
    /// Activity record appended for the action
    pub record: Option<risk_engine::ActivityRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn aggregate(statuses: &[StepStatus]) -> TransferAggregate {
        let steps = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let mut step = Step::planned(
                    i as u32 + 1,
                    StepKind::InternalTransfer,
                    ("a".into(), Some(AccountId::new("a")), Currency::EUR),
                    ("b".into(), AccountId::new("b"), Currency::EUR),
                    dec!(10),
                    dec!(10),
                    dec!(1),
                );
                step.status = *status;
                step
            })
            .collect();
        let now = Utc::now();
        TransferAggregate {
            id: TransferId::new(),
            request: TransferRequest {
                source_amount: dec!(10),
                source_currency: Currency::EUR,
                target_currency: Currency::EUR,
                intermediate_provider: "a".into(),
                target_provider: "b".into(),
                source_card: None,
            },
            status: TransferStatus::Pending,
            steps,
            version: 0,
            halted_for_review: false,
            rate_fallback_used: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
            failed_at: None,
            failure_reason: None,
        }
    }

    #[test]
    fn test_step_transitions() {
        use StepStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Failed.can_transition_to(Processing));
        assert!(Completed.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_status_view_progress() {
        use StepStatus::*;
        let view = aggregate(&[Pending, Pending]).status_view();
        assert_eq!(view.overall_status, TransferStatus::Pending);
        assert_eq!(view.current_step, Some(1));
        assert!(!view.can_rollback);

        let view = aggregate(&[Completed, Pending]).status_view();
        assert_eq!(view.overall_status, TransferStatus::Processing);
        assert_eq!(view.current_step, Some(2));
        assert_eq!(view.progress_pct, 50.0);
        assert!(view.can_rollback);

        let view = aggregate(&[Completed, Failed]).status_view();
        assert_eq!(view.current_step, Some(2));
    }

    #[test]
    fn test_rollback_action_labels() {
        assert_eq!(
            serde_json::to_string(&RollbackAction::RollbackFailed).unwrap(),
            "\"rollback failed\""
        );
        assert_eq!(
            serde_json::to_string(&RollbackAction::Reversed).unwrap(),
            "\"reversed\""
        );
    }
}
