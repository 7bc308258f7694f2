use super::{flag, text_column, ScoringStore};
use crate::{
    aggregation::{AccountRecord, AccountStatus},
    error::ScoreResult,
};
use rusqlite::params;

impl ScoringStore {
    // ── Account ───────────────────────────────────────────────────

    pub fn insert_accounts(&self, accounts: &[AccountRecord]) -> ScoreResult<()> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO account (
                    account_id, customer_id, account_type, status, balance, is_primary, opened_on
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for a in accounts {
                stmt.execute(params![
                    &a.account_id,
                    &a.customer_id,
                    a.account_type.as_str(),
                    a.status.as_str(),
                    a.balance,
                    flag(a.is_primary),
                    a.opened_on,
                ])?;
            }
            Ok(())
        })
    }

    /// All ACTIVE accounts, by account id.
    pub fn active_accounts(&self) -> ScoreResult<Vec<AccountRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, customer_id, account_type, status, balance, is_primary, opened_on
             FROM account
             WHERE status = ?1
             ORDER BY account_id ASC",
        )?;
        let rows = stmt.query_map(params![AccountStatus::Active.as_str()], |row| {
            Ok(AccountRecord {
                account_id:   row.get(0)?,
                customer_id:  row.get(1)?,
                account_type: text_column(row, 2)?,
                status:       text_column(row, 3)?,
                balance:      row.get(4)?,
                is_primary:   row.get::<_, i32>(5)? != 0,
                opened_on:    row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn update_account_status(
        &self,
        account_id: &str,
        status: AccountStatus,
    ) -> ScoreResult<()> {
        self.conn.execute(
            "UPDATE account SET status = ?1 WHERE account_id = ?2",
            params![status.as_str(), account_id],
        )?;
        Ok(())
    }
}
