//! Aggregation step: raw event-level records to per-customer aggregates.
//!
//! Every aggregate is anchored to a single explicit as-of date:
//!   - accounts:     ACTIVE accounts only
//!   - transactions: two equal sub-windows ending at as-of (recent, prior)
//!   - engagement:   latest snapshot on or before as-of
//!   - complaints:   trailing complaint window ending at as-of
//!
//! RULE: a customer absent from a raw source is not an error. It receives
//! the fully defaulted aggregate (zero counts, zero balances, flags false,
//! sentinel days-since-last-transaction). Re-running over the same rows
//! yields the same aggregates.

use crate::{
    config::{AggregationConfig, EngagementWeights, TrendBands},
    error::ScoringError,
    types::{CustomerId, EntityId},
};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, str::FromStr};

// ── Raw records ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Current,
    Savings,
    CreditCard,
    Mortgage,
    Loan,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Dormant,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    Open,
    InProgress,
    Escalated,
    Resolved,
    Closed,
}

impl ComplaintStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress | Self::Escalated)
    }
}

macro_rules! text_enum {
    ($ty:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = ScoringError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ScoringError::Other(anyhow::anyhow!(
                        "unknown {} '{other}'", $label
                    ))),
                }
            }
        }
    };
}

text_enum!(AccountType, "account type", {
    Current    => "CURRENT",
    Savings    => "SAVINGS",
    CreditCard => "CREDIT_CARD",
    Mortgage   => "MORTGAGE",
    Loan       => "LOAN",
});

text_enum!(AccountStatus, "account status", {
    Active  => "ACTIVE",
    Dormant => "DORMANT",
    Closed  => "CLOSED",
});

text_enum!(ComplaintStatus, "complaint status", {
    Open       => "OPEN",
    InProgress => "IN_PROGRESS",
    Escalated  => "ESCALATED",
    Resolved   => "RESOLVED",
    Closed     => "CLOSED",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountRecord {
    pub account_id:   EntityId,
    pub customer_id:  CustomerId,
    pub account_type: AccountType,
    pub status:       AccountStatus,
    pub balance:      f64,
    pub is_primary:   bool,
    pub opened_on:    NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    pub txn_id:      EntityId,
    pub account_id:  EntityId,
    pub customer_id: CustomerId,
    pub txn_date:    NaiveDate,
    pub amount:      f64,
    pub channel:     String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngagementSnapshot {
    pub snapshot_id:           i64,
    pub customer_id:           CustomerId,
    pub measured_on:           NaiveDate,
    pub login_count_30d:       i64,
    pub mobile_app_active:     bool,
    pub online_banking_active: bool,
    pub features_used_count:   i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplaintRecord {
    pub complaint_id: EntityId,
    pub customer_id:  CustomerId,
    pub filed_on:     NaiveDate,
    pub category:     String,
    pub status:       ComplaintStatus,
    pub resolved_on:  Option<NaiveDate>,
}

impl ComplaintRecord {
    /// Open at `as_of` if still open now, or resolved only after `as_of`.
    pub fn was_open_at(&self, as_of: NaiveDate) -> bool {
        self.status.is_open() || self.resolved_on.map_or(false, |r| r > as_of)
    }
}

/// The four raw streams supplied by the data store for one as-of date.
#[derive(Debug, Clone, Default)]
pub struct RawRecords {
    pub accounts:     Vec<AccountRecord>,
    pub transactions: Vec<TransactionRecord>,
    pub engagement:   Vec<EngagementSnapshot>,
    pub complaints:   Vec<ComplaintRecord>,
}

// ── Aggregates ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionTrend {
    Increasing,
    Stable,
    Declining,
    SeverelyDeclining,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountAggregate {
    pub total_products_held:        i64,
    pub primary_account_balance:    f64,
    pub total_relationship_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionAggregate {
    pub recent_count:                i64,
    pub prior_count:                 i64,
    pub days_since_last_transaction: i64,
    pub trend:                       TransactionTrend,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngagementAggregate {
    pub login_count_30d:          i64,
    pub mobile_app_active:        bool,
    pub online_banking_active:    bool,
    pub features_used_count:      i64,
    pub digital_engagement_score: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComplaintAggregate {
    pub open_complaints_count:    i64,
    pub complaints_last_12m:      i64,
    pub has_unresolved_complaint: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerAggregates {
    pub accounts:     AccountAggregate,
    pub transactions: TransactionAggregate,
    pub engagement:   EngagementAggregate,
    pub complaints:   ComplaintAggregate,
}

impl CustomerAggregates {
    /// The default-filled aggregate for a customer with no raw rows at all.
    pub fn empty(no_activity_sentinel_days: i64) -> Self {
        Self {
            accounts: AccountAggregate::default(),
            transactions: TransactionAggregate {
                recent_count: 0,
                prior_count: 0,
                days_since_last_transaction: no_activity_sentinel_days,
                trend: TransactionTrend::Stable,
            },
            engagement: EngagementAggregate::default(),
            complaints: ComplaintAggregate::default(),
        }
    }
}

// ── Windows ──────────────────────────────────────────────────────────────────

fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

/// Left-open, right-closed date windows ending at as-of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityWindows {
    pub as_of:           NaiveDate,
    pub recent_start:    NaiveDate,
    pub prior_start:     NaiveDate,
    pub complaint_start: NaiveDate,
}

impl ActivityWindows {
    pub fn new(as_of: NaiveDate, config: &AggregationConfig) -> Self {
        Self {
            as_of,
            recent_start:    months_before(as_of, config.activity_window_months),
            prior_start:     months_before(as_of, config.activity_window_months * 2),
            complaint_start: months_before(as_of, config.complaint_window_months),
        }
    }

    pub fn is_recent(&self, date: NaiveDate) -> bool {
        date > self.recent_start && date <= self.as_of
    }

    pub fn is_prior(&self, date: NaiveDate) -> bool {
        date > self.prior_start && date <= self.recent_start
    }

    pub fn in_transaction_horizon(&self, date: NaiveDate) -> bool {
        date > self.prior_start && date <= self.as_of
    }

    pub fn in_complaint_window(&self, date: NaiveDate) -> bool {
        date > self.complaint_start && date <= self.as_of
    }
}

// ── Formulas ─────────────────────────────────────────────────────────────────

/// Ordered, first match wins.
pub fn classify_trend(recent_count: i64, prior_count: i64, bands: &TrendBands) -> TransactionTrend {
    let recent = recent_count as f64;
    let prior = prior_count as f64;
    if prior_count == 0 {
        TransactionTrend::Stable
    } else if recent > prior * bands.increasing_ratio {
        TransactionTrend::Increasing
    } else if recent >= prior * bands.stable_ratio {
        TransactionTrend::Stable
    } else if recent >= prior * bands.declining_ratio {
        TransactionTrend::Declining
    } else {
        TransactionTrend::SeverelyDeclining
    }
}

/// Weighted sum with an upper clamp only. Saturates rather than overflowing.
pub fn digital_engagement_score(
    login_count_30d: i64,
    mobile_app_active: bool,
    online_banking_active: bool,
    features_used_count: i64,
    weights: &EngagementWeights,
) -> i64 {
    let sum = login_count_30d
        .saturating_mul(weights.per_login)
        .saturating_add(if mobile_app_active { weights.mobile_app } else { 0 })
        .saturating_add(if online_banking_active { weights.online_banking } else { 0 })
        .saturating_add(features_used_count.saturating_mul(weights.per_feature));
    sum.min(weights.cap)
}

// ── Aggregation ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct TxnAccumulator {
    recent: i64,
    prior:  i64,
    latest: Option<NaiveDate>,
}

#[derive(Default)]
struct AccountAccumulator<'a> {
    aggregate: AccountAggregate,
    primary:   Option<&'a str>,
}

/// Produce exactly one aggregate per requested customer.
///
/// Rows belonging to customers outside `customer_ids` are ignored.
pub fn aggregate(
    as_of: NaiveDate,
    config: &AggregationConfig,
    customer_ids: &[CustomerId],
    raw: &RawRecords,
) -> BTreeMap<CustomerId, CustomerAggregates> {
    let windows = ActivityWindows::new(as_of, config);

    let mut accounts: BTreeMap<&str, AccountAccumulator<'_>> = BTreeMap::new();
    let mut txns: BTreeMap<&str, TxnAccumulator> = BTreeMap::new();
    let mut latest_snapshot: BTreeMap<&str, &EngagementSnapshot> = BTreeMap::new();
    let mut complaints: BTreeMap<&str, ComplaintAggregate> = BTreeMap::new();

    // Accounts opened after as-of did not exist yet.
    for account in raw
        .accounts
        .iter()
        .filter(|a| a.status == AccountStatus::Active && a.opened_on <= as_of)
    {
        let acc = accounts.entry(account.customer_id.as_str()).or_default();
        acc.aggregate.total_products_held += 1;
        acc.aggregate.total_relationship_balance += account.balance;

        if account.account_type == AccountType::Current && account.is_primary {
            let replace = acc
                .primary
                .map_or(true, |current| account.account_id.as_str() < current);
            if replace {
                acc.primary = Some(account.account_id.as_str());
                acc.aggregate.primary_account_balance = account.balance;
            }
        }
    }

    for txn in &raw.transactions {
        if !windows.in_transaction_horizon(txn.txn_date) {
            continue;
        }
        let acc = txns.entry(txn.customer_id.as_str()).or_default();
        if windows.is_recent(txn.txn_date) {
            acc.recent += 1;
        } else if windows.is_prior(txn.txn_date) {
            acc.prior += 1;
        }
        acc.latest = acc.latest.max(Some(txn.txn_date));
    }

    for snapshot in raw.engagement.iter().filter(|s| s.measured_on <= as_of) {
        latest_snapshot
            .entry(snapshot.customer_id.as_str())
            .and_modify(|current| {
                if (snapshot.measured_on, snapshot.snapshot_id) > (current.measured_on, current.snapshot_id) {
                    *current = snapshot;
                }
            })
            .or_insert(snapshot);
    }

    for complaint in raw.complaints.iter().filter(|c| windows.in_complaint_window(c.filed_on)) {
        let acc = complaints.entry(complaint.customer_id.as_str()).or_default();
        acc.complaints_last_12m += 1;
        if complaint.was_open_at(as_of) {
            acc.open_complaints_count += 1;
            acc.has_unresolved_complaint = true;
        }
    }

    customer_ids
        .iter()
        .map(|id| {
            let mut out = CustomerAggregates::empty(config.no_activity_sentinel_days);

            if let Some(acc) = accounts.remove(id.as_str()) {
                out.accounts = acc.aggregate;
            }

            if let Some(acc) = txns.get(id.as_str()) {
                out.transactions = TransactionAggregate {
                    recent_count: acc.recent,
                    prior_count: acc.prior,
                    days_since_last_transaction: acc
                        .latest
                        .map(|d| as_of.signed_duration_since(d).num_days())
                        .unwrap_or(config.no_activity_sentinel_days),
                    trend: classify_trend(acc.recent, acc.prior, &config.trend),
                };
            }

            if let Some(s) = latest_snapshot.get(id.as_str()) {
                out.engagement = EngagementAggregate {
                    login_count_30d:       s.login_count_30d,
                    mobile_app_active:     s.mobile_app_active,
                    online_banking_active: s.online_banking_active,
                    features_used_count:   s.features_used_count,
                    digital_engagement_score: digital_engagement_score(
                        s.login_count_30d,
                        s.mobile_app_active,
                        s.online_banking_active,
                        s.features_used_count,
                        &config.engagement,
                    ),
                };
            }

            if let Some(c) = complaints.get(id.as_str()) {
                out.complaints = c.clone();
            }

            (id.clone(), out)
        })
        .collect()
}

/// Aggregate a single customer's rows. Convenience over [`aggregate`].
pub fn aggregate_customer(
    as_of: NaiveDate,
    config: &AggregationConfig,
    customer_id: &str,
    raw: &RawRecords,
) -> CustomerAggregates {
    let ids = vec![customer_id.to_string()];
    aggregate(as_of, config, &ids, raw)
        .remove(customer_id)
        .unwrap_or_else(|| CustomerAggregates::empty(config.no_activity_sentinel_days))
}
