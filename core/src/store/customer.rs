use super::{text_column, ScoringStore};
use crate::{
    customer::{CustomerRecord, KycStatus},
    error::ScoreResult,
};
use rusqlite::params;

fn customer_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<CustomerRecord> {
    Ok(CustomerRecord {
        customer_id:   row.get(0)?,
        customer_name: row.get(1)?,
        segment:       row.get(2)?,
        region:        row.get(3)?,
        onboarded_on:  row.get(4)?,
        kyc_status:    text_column(row, 5)?,
    })
}

impl ScoringStore {
    // ── Customer ──────────────────────────────────────────────────

    pub fn insert_customers(&self, customers: &[CustomerRecord]) -> ScoreResult<()> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO customer (
                    customer_id, customer_name, segment, region, onboarded_on, kyc_status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for c in customers {
                stmt.execute(params![
                    &c.customer_id,
                    &c.customer_name,
                    &c.segment,
                    &c.region,
                    c.onboarded_on,
                    c.kyc_status.as_str(),
                ])?;
            }
            Ok(())
        })
    }

    /// KYC-verified customers onboarded on or before `as_of`, by customer id.
    pub fn scorable_customers(&self, as_of: chrono::NaiveDate) -> ScoreResult<Vec<CustomerRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, customer_name, segment, region, onboarded_on, kyc_status
             FROM customer
             WHERE kyc_status = ?1 AND onboarded_on <= ?2
             ORDER BY customer_id ASC",
        )?;
        let rows = stmt.query_map(
            params![KycStatus::Verified.as_str(), as_of],
            customer_row_mapper,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn get_customer(&self, customer_id: &str) -> ScoreResult<Option<CustomerRecord>> {
        use rusqlite::OptionalExtension;
        self.conn
            .query_row(
                "SELECT customer_id, customer_name, segment, region, onboarded_on, kyc_status
                 FROM customer WHERE customer_id = ?1",
                params![customer_id],
                customer_row_mapper,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn customer_count(&self) -> ScoreResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM customer", [], |row| row.get(0))
            .map_err(Into::into)
    }
}
