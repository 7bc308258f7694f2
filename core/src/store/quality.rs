use super::ScoringStore;
use crate::{
    aggregation::AccountStatus,
    customer::{CustomerSegment, KycStatus},
    error::ScoreResult,
};
use chrono::NaiveDate;
use rusqlite::params;

impl ScoringStore {
    // ── Data quality probes ───────────────────────────────────────

    /// Customers whose stored segment is none of the recognised values.
    pub fn unknown_segment_count(&self) -> ScoreResult<i64> {
        let known: Vec<String> = CustomerSegment::ALL
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect();
        self.conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM customer WHERE segment NOT IN ({})",
                    known.join(", ")
                ),
                [],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Engagement snapshots carrying a negative counter.
    pub fn negative_engagement_count(&self) -> ScoreResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM digital_engagement
                 WHERE login_count_30d < 0 OR features_used_count < 0",
                [],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn future_transaction_count(&self, as_of: NaiveDate) -> ScoreResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM transactions WHERE txn_date > ?1",
                params![as_of],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Newest transaction date on or before `as_of`, if any.
    pub fn latest_transaction_date(&self, as_of: NaiveDate) -> ScoreResult<Option<NaiveDate>> {
        self.conn
            .query_row(
                "SELECT MAX(txn_date) FROM transactions WHERE txn_date <= ?1",
                params![as_of],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn verified_without_active_account_count(&self) -> ScoreResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM customer c
                 WHERE c.kyc_status = ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM account a
                       WHERE a.customer_id = c.customer_id AND a.status = ?2
                   )",
                params![KycStatus::Verified.as_str(), AccountStatus::Active.as_str()],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Customers whose ACTIVE balances sum below zero.
    pub fn negative_relationship_balance_count(&self) -> ScoreResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM (
                     SELECT customer_id FROM account
                     WHERE status = ?1
                     GROUP BY customer_id
                     HAVING SUM(balance) < 0
                 )",
                params![AccountStatus::Active.as_str()],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}
