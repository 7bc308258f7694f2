use super::{flag, text_column, write_event, ScoringStore};
use crate::{
    batch::Rejection,
    engine::{RunStatus, ScoringRunRecord},
    error::{ScoreResult, ScoringError},
    event::ScoringEvent,
    scoring::{ProtectiveSignals, RiskAssessment, RiskTier},
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

const ASSESSMENT_COLUMNS: &str = "customer_id, as_of, churn_risk_score, raw_score, risk_tier,
    declining_balance_flag, reduced_activity_flag, low_engagement_flag, complaint_flag, dormancy_flag,
    multi_product_flag, long_tenure_flag, highly_engaged_digital_flag,
    primary_risk_driver, recommended_intervention, intervention_priority,
    calculated_at, model_version";

const RUN_COLUMNS: &str = "run_id, as_of, model_version, calculated_at, status,
    scored_count, rejected_count, tier_counts, is_current";

fn assessment_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<RiskAssessment> {
    read_assessment(row, 0)
}

/// Decode the `ASSESSMENT_COLUMNS` block starting at column `base`.
fn read_assessment(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<RiskAssessment> {
    let bit = |offset: usize| row.get::<_, i32>(base + offset).map(|v| v != 0);
    Ok(RiskAssessment {
        customer_id:            row.get(base)?,
        as_of_date:             row.get(base + 1)?,
        churn_risk_score:       row.get(base + 2)?,
        raw_score:              row.get(base + 3)?,
        risk_tier:              text_column(row, base + 4)?,
        declining_balance_flag: bit(5)?,
        reduced_activity_flag:  bit(6)?,
        low_engagement_flag:    bit(7)?,
        complaint_flag:         bit(8)?,
        dormancy_flag:          bit(9)?,
        protective: ProtectiveSignals {
            multi_product:          bit(10)?,
            long_tenure:            bit(11)?,
            highly_engaged_digital: bit(12)?,
        },
        primary_risk_driver:      text_column(row, base + 13)?,
        recommended_intervention: text_column(row, base + 14)?,
        intervention_priority:    row.get(base + 15)?,
        calculated_at:            row.get(base + 16)?,
        model_version:            row.get(base + 17)?,
    })
}

fn run_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScoringRunRecord> {
    let tier_json: String = row.get(7)?;
    let tier_counts: BTreeMap<RiskTier, usize> = serde_json::from_str(&tier_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ScoringRunRecord {
        run_id:         row.get(0)?,
        as_of:          row.get(1)?,
        model_version:  row.get(2)?,
        calculated_at:  row.get(3)?,
        status:         text_column(row, 4)?,
        scored_count:   row.get(5)?,
        rejected_count: row.get(6)?,
        tier_counts,
        is_current:     row.get::<_, i32>(8)? != 0,
    })
}

impl ScoringStore {
    // ── Scoring runs ───────────────────────────────────────────

    pub fn insert_run(&self, run: &ScoringRunRecord) -> ScoreResult<()> {
        self.conn.execute(
            "INSERT INTO scoring_run (
                run_id, as_of, model_version, calculated_at, status,
                scored_count, rejected_count, tier_counts, is_current
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &run.run_id,
                run.as_of,
                &run.model_version,
                run.calculated_at,
                run.status.as_str(),
                run.scored_count,
                run.rejected_count,
                serde_json::to_string(&run.tier_counts)?,
                flag(run.is_current),
            ],
        )?;
        Ok(())
    }

    pub fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        scored_count: i64,
        rejected_count: i64,
        tier_counts: &BTreeMap<RiskTier, usize>,
    ) -> ScoreResult<()> {
        write_run_status(&self.conn, run_id, status, scored_count, rejected_count, tier_counts)
    }

    /// Write a run's assessments and rejections, mark it COMPLETED and append
    /// `events`, all in one transaction. Nothing is kept if any write fails.
    pub fn complete_run(
        &self,
        run_id: &str,
        assessments: &[RiskAssessment],
        rejections: &[Rejection],
        tier_counts: &BTreeMap<RiskTier, usize>,
        events: &[ScoringEvent],
    ) -> ScoreResult<()> {
        self.in_transaction(|tx| {
            write_assessments(tx, run_id, assessments)?;
            write_rejections(tx, run_id, rejections)?;
            write_run_status(
                tx,
                run_id,
                RunStatus::Completed,
                assessments.len() as i64,
                rejections.len() as i64,
                tier_counts,
            )?;
            events.iter().try_for_each(|event| write_event(tx, event))
        })
    }

    pub fn get_run(&self, run_id: &str) -> ScoreResult<Option<ScoringRunRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM scoring_run WHERE run_id = ?1"),
                params![run_id],
                run_row_mapper,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Every run, oldest first.
    pub fn list_runs(&self) -> ScoreResult<Vec<ScoringRunRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RUN_COLUMNS} FROM scoring_run ORDER BY seq ASC"))?;
        let rows = stmt.query_map([], run_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn current_run_id(&self) -> ScoreResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT run_id FROM scoring_run WHERE is_current = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Move the current pointer to `run_id`. Returns the previously current run.
    /// Only completed runs can be promoted. History is untouched.
    pub fn promote_run(&self, run_id: &str) -> ScoreResult<Option<String>> {
        let run = self
            .get_run(run_id)?
            .ok_or_else(|| ScoringError::RunNotFound { run_id: run_id.to_string() })?;
        if run.status != RunStatus::Completed {
            return Err(ScoringError::Other(anyhow::anyhow!(
                "run {run_id} is {} and cannot be promoted",
                run.status.as_str()
            )));
        }

        let previous = self.current_run_id()?;
        self.in_transaction(|tx| {
            tx.execute("UPDATE scoring_run SET is_current = 0 WHERE is_current = 1", [])?;
            tx.execute(
                "UPDATE scoring_run SET is_current = 1 WHERE run_id = ?1",
                params![run_id],
            )?;
            Ok(())
        })?;
        Ok(previous)
    }

    // ── Assessments ────────────────────────────────────────────

    pub fn assessments_for_run(&self, run_id: &str) -> ScoreResult<Vec<RiskAssessment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM risk_assessment
             WHERE run_id = ?1 ORDER BY customer_id ASC"
        ))?;
        let rows = stmt.query_map(params![run_id], assessment_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Assessments of the run behind the current pointer.
    pub fn current_assessments(&self) -> ScoreResult<Vec<RiskAssessment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM current_risk_assessment ORDER BY customer_id ASC"
        ))?;
        let rows = stmt.query_map([], assessment_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Every stored assessment for one customer, oldest run first.
    pub fn assessment_history(&self, customer_id: &str) -> ScoreResult<Vec<(String, RiskAssessment)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT a.run_id, {} FROM risk_assessment a
             JOIN scoring_run r ON r.run_id = a.run_id
             WHERE a.customer_id = ?1
             ORDER BY r.seq ASC",
            ASSESSMENT_COLUMNS
                .split(',')
                .map(|c| format!("a.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        ))?;
        let rows = stmt.query_map(params![customer_id], |row| {
            let run_id: String = row.get(0)?;
            let assessment = read_assessment(row, 1)?;
            Ok((run_id, assessment))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn assessment_count(&self, run_id: &str) -> ScoreResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM risk_assessment WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    // ── Rejections ─────────────────────────────────────────────

    pub fn rejections_for_run(&self, run_id: &str) -> ScoreResult<Vec<Rejection>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, reason FROM rejected_record
             WHERE run_id = ?1 ORDER BY customer_id ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(Rejection {
                customer_id: row.get(0)?,
                reason:      row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

// ── Writers shared by single and transactional paths ──────────

fn write_run_status(
    conn: &Connection,
    run_id: &str,
    status: RunStatus,
    scored_count: i64,
    rejected_count: i64,
    tier_counts: &BTreeMap<RiskTier, usize>,
) -> ScoreResult<()> {
    let updated = conn.execute(
        "UPDATE scoring_run
         SET status = ?1, scored_count = ?2, rejected_count = ?3, tier_counts = ?4
         WHERE run_id = ?5",
        params![
            status.as_str(),
            scored_count,
            rejected_count,
            serde_json::to_string(tier_counts)?,
            run_id,
        ],
    )?;
    if updated == 0 {
        return Err(ScoringError::RunNotFound { run_id: run_id.to_string() });
    }
    Ok(())
}

fn write_assessments(conn: &Connection, run_id: &str, assessments: &[RiskAssessment]) -> ScoreResult<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO risk_assessment (run_id, {ASSESSMENT_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
    ))?;
    for a in assessments {
        stmt.execute(params![
            run_id,
            &a.customer_id,
            a.as_of_date,
            a.churn_risk_score,
            a.raw_score,
            a.risk_tier.as_str(),
            flag(a.declining_balance_flag),
            flag(a.reduced_activity_flag),
            flag(a.low_engagement_flag),
            flag(a.complaint_flag),
            flag(a.dormancy_flag),
            flag(a.protective.multi_product),
            flag(a.protective.long_tenure),
            flag(a.protective.highly_engaged_digital),
            a.primary_risk_driver.as_str(),
            a.recommended_intervention.as_str(),
            a.intervention_priority,
            a.calculated_at,
            &a.model_version,
        ])?;
    }
    Ok(())
}

fn write_rejections(conn: &Connection, run_id: &str, rejections: &[Rejection]) -> ScoreResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO rejected_record (run_id, customer_id, reason) VALUES (?1, ?2, ?3)",
    )?;
    for r in rejections {
        stmt.execute(params![run_id, &r.customer_id, &r.reason])?;
    }
    Ok(())
}
