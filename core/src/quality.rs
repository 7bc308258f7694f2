//! Raw-data quality checks, run before a scoring pass.
//!
//! Each check is a single probe against the store. A check either passes
//! (count zero) or yields a finding with a severity:
//!   - Error:   scoring would reject or misread the affected rows
//!   - Warning: rows score, but the result is probably misleading
//!   - Info:    worth knowing, no action required

use crate::{config::QualityConfig, error::ScoreResult, store::ScoringStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QualityFinding {
    pub check:    &'static str,
    pub severity: Severity,
    pub count:    i64,
    pub detail:   String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct QualityReport {
    pub as_of:    Option<NaiveDate>,
    pub findings: Vec<QualityFinding>,
}

impl QualityReport {
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn finding(&self, check: &str) -> Option<&QualityFinding> {
        self.findings.iter().find(|f| f.check == check)
    }
}

pub const UNKNOWN_SEGMENT: &str = "unknown_segment";
pub const NEGATIVE_ENGAGEMENT: &str = "negative_engagement";
pub const FUTURE_TRANSACTION: &str = "future_transaction";
pub const STALE_TRANSACTIONS: &str = "stale_transactions";
pub const NO_ACTIVE_ACCOUNT: &str = "verified_without_active_account";
pub const NEGATIVE_BALANCE: &str = "negative_relationship_balance";

pub fn run_checks(
    store: &ScoringStore,
    as_of: NaiveDate,
    config: &QualityConfig,
) -> ScoreResult<QualityReport> {
    let mut report = QualityReport { as_of: Some(as_of), findings: Vec::new() };
    let mut record = |check: &'static str, severity: Severity, count: i64, detail: String| {
        if count > 0 {
            log::warn!("quality as_of={as_of} {check}: {detail}");
            report.findings.push(QualityFinding { check, severity, count, detail });
        }
    };

    let n = store.unknown_segment_count()?;
    record(UNKNOWN_SEGMENT, Severity::Error, n, format!("{n} customers carry an unrecognised segment"));

    let n = store.negative_engagement_count()?;
    record(NEGATIVE_ENGAGEMENT, Severity::Error, n, format!("{n} engagement snapshots have negative counters"));

    let n = store.future_transaction_count(as_of)?;
    record(FUTURE_TRANSACTION, Severity::Warning, n, format!("{n} transactions are dated after {as_of}"));

    match store.latest_transaction_date(as_of)? {
        Some(latest) => {
            let age = as_of.signed_duration_since(latest).num_days();
            if age > config.max_transaction_staleness_days {
                record(
                    STALE_TRANSACTIONS,
                    Severity::Warning,
                    age,
                    format!("newest transaction is {age} days old ({latest})"),
                );
            }
        }
        None => record(STALE_TRANSACTIONS, Severity::Warning, 1, "no transactions on or before as-of".into()),
    }

    let n = store.verified_without_active_account_count()?;
    record(NO_ACTIVE_ACCOUNT, Severity::Info, n, format!("{n} verified customers hold no active account"));

    let n = store.negative_relationship_balance_count()?;
    record(NEGATIVE_BALANCE, Severity::Info, n, format!("{n} customers have a negative total balance"));

    log::info!("quality as_of={as_of}: {} findings", report.findings.len());
    Ok(report)
}
