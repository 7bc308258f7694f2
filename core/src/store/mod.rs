//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Aggregation and scoring never execute SQL directly; they receive rows
//! loaded here and hand back assessments to be written here.

use crate::{
    error::{ScoreResult, ScoringError},
    event::{EventLogEntry, ScoringEvent},
};
use rusqlite::{params, types::Type, Connection, Row, Transaction};
use std::str::FromStr;

mod account;
mod activity;
mod assessment;
mod customer;
mod quality;

pub struct ScoringStore {
    conn: Connection,
}

impl ScoringStore {
    /// Open (or create) the scoring database at `path`.
    pub fn open(path: &str) -> ScoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only matters for real files; :memory: reports "memory".
        match conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0)) {
            Ok(mode) => log::debug!("store {path}: journal_mode={mode}"),
            Err(e) => log::warn!("store {path}: could not enable WAL journal: {e}"),
        }
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ScoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Idempotent.
    pub fn migrate(&self) -> ScoreResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_raw_data.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_scoring.sql"))?;
        Ok(())
    }

    /// Run `f` inside a single transaction; commits only if `f` succeeds.
    pub(crate) fn in_transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> ScoreResult<T>,
    ) -> ScoreResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &ScoringEvent) -> ScoreResult<()> {
        write_event(&self.conn, event)
    }

    pub fn events_for_run(&self, run_id: &str) -> ScoreResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    event_type: row.get(2)?,
                    payload:    row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// Read a TEXT column into one of the crate's text-coded enums.
pub(crate) fn text_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ScoringError>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn flag(value: bool) -> i32 {
    if value { 1 } else { 0 }
}

pub(crate) fn write_event(conn: &Connection, event: &ScoringEvent) -> ScoreResult<()> {
    let entry = EventLogEntry::from_event(event)?;
    conn.execute(
        "INSERT INTO event_log (run_id, event_type, payload) VALUES (?1, ?2, ?3)",
        params![entry.run_id, entry.event_type, entry.payload],
    )?;
    Ok(())
}
