use super::{flag, text_column, ScoringStore};
use crate::{
    aggregation::{ComplaintRecord, EngagementSnapshot, TransactionRecord},
    error::ScoreResult,
};
use chrono::NaiveDate;
use rusqlite::params;

impl ScoringStore {
    // ── Transactions ──────────────────────────────────────────────

    pub fn insert_transactions(&self, txns: &[TransactionRecord]) -> ScoreResult<()> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO transactions (txn_id, account_id, customer_id, txn_date, amount, channel)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for t in txns {
                stmt.execute(params![
                    &t.txn_id,
                    &t.account_id,
                    &t.customer_id,
                    t.txn_date,
                    t.amount,
                    &t.channel,
                ])?;
            }
            Ok(())
        })
    }

    /// Transactions dated in `(after, until]`.
    pub fn transactions_between(
        &self,
        after: NaiveDate,
        until: NaiveDate,
    ) -> ScoreResult<Vec<TransactionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT txn_id, account_id, customer_id, txn_date, amount, channel
             FROM transactions
             WHERE txn_date > ?1 AND txn_date <= ?2
             ORDER BY txn_id ASC",
        )?;
        let rows = stmt.query_map(params![after, until], |row| {
            Ok(TransactionRecord {
                txn_id:      row.get(0)?,
                account_id:  row.get(1)?,
                customer_id: row.get(2)?,
                txn_date:    row.get(3)?,
                amount:      row.get(4)?,
                channel:     row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn transaction_count(&self) -> ScoreResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))
            .map_err(Into::into)
    }

    // ── Digital engagement ────────────────────────────────────────

    pub fn insert_engagement_snapshots(&self, snapshots: &[EngagementSnapshot]) -> ScoreResult<()> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO digital_engagement (
                    snapshot_id, customer_id, measured_on, login_count_30d,
                    mobile_app_active, online_banking_active, features_used_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for s in snapshots {
                stmt.execute(params![
                    s.snapshot_id,
                    &s.customer_id,
                    s.measured_on,
                    s.login_count_30d,
                    flag(s.mobile_app_active),
                    flag(s.online_banking_active),
                    s.features_used_count,
                ])?;
            }
            Ok(())
        })
    }

    /// Every snapshot measured on or before `as_of`.
    pub fn engagement_snapshots_until(&self, as_of: NaiveDate) -> ScoreResult<Vec<EngagementSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT snapshot_id, customer_id, measured_on, login_count_30d,
                    mobile_app_active, online_banking_active, features_used_count
             FROM digital_engagement
             WHERE measured_on <= ?1
             ORDER BY snapshot_id ASC",
        )?;
        let rows = stmt.query_map(params![as_of], |row| {
            Ok(EngagementSnapshot {
                snapshot_id:           row.get(0)?,
                customer_id:           row.get(1)?,
                measured_on:           row.get(2)?,
                login_count_30d:       row.get(3)?,
                mobile_app_active:     row.get::<_, i32>(4)? != 0,
                online_banking_active: row.get::<_, i32>(5)? != 0,
                features_used_count:   row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Complaints ────────────────────────────────────────────────

    pub fn insert_complaints(&self, complaints: &[ComplaintRecord]) -> ScoreResult<()> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO complaint (complaint_id, customer_id, filed_on, category, status, resolved_on)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for c in complaints {
                stmt.execute(params![
                    &c.complaint_id,
                    &c.customer_id,
                    c.filed_on,
                    &c.category,
                    c.status.as_str(),
                    c.resolved_on,
                ])?;
            }
            Ok(())
        })
    }

    /// Complaints filed in `(after, until]`.
    pub fn complaints_between(
        &self,
        after: NaiveDate,
        until: NaiveDate,
    ) -> ScoreResult<Vec<ComplaintRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT complaint_id, customer_id, filed_on, category, status, resolved_on
             FROM complaint
             WHERE filed_on > ?1 AND filed_on <= ?2
             ORDER BY complaint_id ASC",
        )?;
        let rows = stmt.query_map(params![after, until], |row| {
            Ok(ComplaintRecord {
                complaint_id: row.get(0)?,
                customer_id:  row.get(1)?,
                filed_on:     row.get(2)?,
                category:     row.get(3)?,
                status:       text_column(row, 4)?,
                resolved_on:  row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn resolve_complaint(&self, complaint_id: &str, resolved_on: NaiveDate) -> ScoreResult<()> {
        self.conn.execute(
            "UPDATE complaint SET status = 'RESOLVED', resolved_on = ?1 WHERE complaint_id = ?2",
            params![resolved_on, complaint_id],
        )?;
        Ok(())
    }
}
