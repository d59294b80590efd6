//! Append-only activity log, bucketed by account and local calendar day

use crate::{ActivityCounters, ActivityRecord, ActivityType};
use chrono::NaiveDate;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One account's records, grouped by day
#[derive(Debug, Default)]
struct AccountActivity {
    days: BTreeMap<NaiveDate, Vec<ActivityRecord>>,
}

impl AccountActivity {
    fn counters(&self, day: NaiveDate) -> ActivityCounters {
        self.days
            .get(&day)
            .map(|records| {
                records
                    .iter()
                    .fold(ActivityCounters::default(), |acc, r| acc.with(r.activity_type))
            })
            .unwrap_or_default()
    }
}

/// Activity log shared by every assessment
///
/// Records are never mutated once appended.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    // Map: account -> day -> records
    accounts: Arc<DashMap<String, AccountActivity>>,
}

impl ActivityLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for an account on a day
    pub fn daily_counters(&self, account: &str, day: NaiveDate) -> ActivityCounters {
        self.accounts
            .get(account)
            .map(|entry| entry.counters(day))
            .unwrap_or_default()
    }

    /// Counters as they would be after one more activity of `activity_type`
    pub fn prospective_counters(
        &self,
        account: &str,
        day: NaiveDate,
        activity_type: ActivityType,
    ) -> ActivityCounters {
        self.daily_counters(account, day).with(activity_type)
    }

    /// Append a record built from the day's prospective counters
    ///
    /// The account entry stays locked between reading the counters and
    /// appending, so concurrent actions on one account are counted in
    /// sequence.
    pub fn append_with<F>(
        &self,
        account: &str,
        day: NaiveDate,
        activity_type: ActivityType,
        build: F,
    ) -> ActivityRecord
    where
        F: FnOnce(ActivityCounters) -> ActivityRecord,
    {
        let mut entry = self
            .accounts
            .entry(account.to_string())
            .or_insert_with(AccountActivity::default);
        let counters = entry.counters(day).with(activity_type);
        let record = build(counters);
        entry
            .value_mut()
            .days
            .entry(day)
            .or_default()
            .push(record.clone());
        record
    }

    /// Records for an account on a day, oldest first
    pub fn records_for(&self, account: &str, day: NaiveDate) -> Vec<ActivityRecord> {
        self.accounts
            .get(account)
            .and_then(|entry| entry.days.get(&day).cloned())
            .unwrap_or_default()
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.accounts
            .iter()
            .map(|entry| entry.days.values().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// No records at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of accounts with at least one record
    pub fn tracked_accounts(&self) -> usize {
        self.accounts.len()
    }
}
