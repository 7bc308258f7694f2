//! The scoring engine: one scoring run, end to end.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Register the run (status RUNNING) and log RunStarted
//!   2. Load scorable customers and the raw rows inside the activity windows
//!   3. Aggregate per customer
//!   4. Score the batch in parallel under the requested FailurePolicy
//!   5. Persist assessments and rejections and mark the run COMPLETED,
//!      in one transaction
//!   6. Optionally promote it to current
//!
//! A failure anywhere in steps 2 to 5 leaves the run ABORTED with a
//! RunAborted event; it is never left RUNNING.
//!
//! RULES:
//!   - Runs are append-only. Re-scoring never overwrites an earlier run.
//!   - The current pointer only ever moves to a COMPLETED run.
//!   - `as_of` and `calculated_at` come from the request, never the clock.
//!   - Every state change of a run is recorded in the event log.

use crate::{
    aggregation::{aggregate, ActivityWindows, CustomerAggregates, RawRecords},
    batch::{score_jobs, FailurePolicy, ScoringJob},
    config::RiskModelConfig,
    customer::CustomerRecord,
    error::{ScoreResult, ScoringError},
    event::ScoringEvent,
    scoring::{AssessmentContext, Intervention, RiskAssessment, RiskTier},
    store::ScoringStore,
    types::{CustomerId, RunId},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, str::FromStr};
use uuid::Uuid;

// ── Run metadata ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running   => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Aborted   => "ABORTED",
        }
    }
}

impl FromStr for RunStatus {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING"   => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "ABORTED"   => Ok(Self::Aborted),
            other => Err(ScoringError::Other(anyhow::anyhow!("unknown run status '{other}'"))),
        }
    }
}

/// One row of `scoring_run`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringRunRecord {
    pub run_id:         RunId,
    pub as_of:          NaiveDate,
    pub model_version:  String,
    pub calculated_at:  DateTime<Utc>,
    pub status:         RunStatus,
    pub scored_count:   i64,
    pub rejected_count: i64,
    pub tier_counts:    BTreeMap<RiskTier, usize>,
    pub is_current:     bool,
}

/// What the caller asks one run to do.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_id:        RunId,
    pub as_of:         NaiveDate,
    pub calculated_at: DateTime<Utc>,
    pub policy:        FailurePolicy,
    /// Move the current pointer to this run once it completes.
    pub promote:       bool,
}

impl RunRequest {
    /// A promoting, skip-and-log run with a fresh run id.
    pub fn new(as_of: NaiveDate, calculated_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            as_of,
            calculated_at,
            policy: FailurePolicy::SkipAndLog,
            promote: true,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<RunId>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn without_promotion(mut self) -> Self {
        self.promote = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub run_id:              RunId,
    pub as_of:               NaiveDate,
    pub model_version:       String,
    pub scored:              usize,
    pub rejected:            usize,
    pub tier_counts:         BTreeMap<RiskTier, usize>,
    pub intervention_counts: BTreeMap<Intervention, usize>,
    pub mean_score:          f64,
    pub promoted:            bool,
}

/// Per-tier counts. Every tier is present, even at zero.
pub fn tier_distribution(assessments: &[RiskAssessment]) -> BTreeMap<RiskTier, usize> {
    let mut counts: BTreeMap<RiskTier, usize> = RiskTier::ALL.iter().map(|t| (*t, 0)).collect();
    for a in assessments {
        *counts.entry(a.risk_tier).or_insert(0) += 1;
    }
    counts
}

fn intervention_distribution(assessments: &[RiskAssessment]) -> BTreeMap<Intervention, usize> {
    let mut counts = BTreeMap::new();
    for a in assessments {
        *counts.entry(a.recommended_intervention).or_insert(0) += 1;
    }
    counts
}

fn mean_score(assessments: &[RiskAssessment]) -> f64 {
    if assessments.is_empty() {
        return 0.0;
    }
    let total: u64 = assessments.iter().map(|a| u64::from(a.churn_risk_score)).sum();
    total as f64 / assessments.len() as f64
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct ScoringEngine {
    config: RiskModelConfig,
    store:  ScoringStore,
}

impl ScoringEngine {
    pub fn new(config: RiskModelConfig, store: ScoringStore) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &RiskModelConfig {
        &self.config
    }

    pub fn store(&self) -> &ScoringStore {
        &self.store
    }

    /// Execute one scoring run. If any step after the run is registered
    /// fails, the run is kept with status ABORTED, a RunAborted event is
    /// logged and nothing is written to `risk_assessment`.
    pub fn run(&self, request: &RunRequest) -> ScoreResult<RunSummary> {
        let as_of = request.as_of;
        let run_id = request.run_id.clone();
        let customers = self.store.scorable_customers(as_of)?;

        self.store.insert_run(&ScoringRunRecord {
            run_id:         run_id.clone(),
            as_of,
            model_version:  self.config.model_version.clone(),
            calculated_at:  request.calculated_at,
            status:         RunStatus::Running,
            scored_count:   0,
            rejected_count: 0,
            tier_counts:    BTreeMap::new(),
            is_current:     false,
        })?;

        let summary = match self.score_and_persist(request, customers) {
            Ok(summary) => summary,
            Err(err) => {
                let (customer_id, reason) = match &err {
                    ScoringError::RunAborted { customer_id, reason, .. } => {
                        (Some(customer_id.clone()), reason.clone())
                    }
                    other => (None, other.to_string()),
                };
                self.mark_aborted(&run_id, customer_id, reason);
                return Err(err);
            }
        };

        // A failed promotion leaves a COMPLETED run that is simply not current.
        if request.promote {
            self.promote(&run_id)?;
        }
        Ok(summary)
    }

    /// Steps 2 to 5. Any error here aborts the run.
    fn score_and_persist(
        &self,
        request: &RunRequest,
        customers: Vec<CustomerRecord>,
    ) -> ScoreResult<RunSummary> {
        let as_of = request.as_of;
        let run_id = request.run_id.clone();

        self.store.append_event(&ScoringEvent::RunStarted {
            run_id:        run_id.clone(),
            as_of,
            model_version: self.config.model_version.clone(),
            customers:     customers.len(),
        })?;
        log::info!(
            "run={run_id} as_of={as_of} model={} customers={}: started",
            self.config.model_version,
            customers.len()
        );

        let raw = self.load_raw(as_of)?;
        let ids: Vec<CustomerId> = customers.iter().map(|c| c.customer_id.clone()).collect();
        let mut aggregates = aggregate(as_of, &self.config.aggregation, &ids, &raw);
        log::debug!(
            "run={run_id}: aggregated {} accounts, {} transactions, {} snapshots, {} complaints",
            raw.accounts.len(),
            raw.transactions.len(),
            raw.engagement.len(),
            raw.complaints.len()
        );

        let sentinel = self.config.aggregation.no_activity_sentinel_days;
        let jobs: Vec<ScoringJob> = customers
            .into_iter()
            .map(|record| {
                let aggregates = aggregates
                    .remove(&record.customer_id)
                    .unwrap_or_else(|| CustomerAggregates::empty(sentinel));
                ScoringJob { record, aggregates }
            })
            .collect();

        let ctx = AssessmentContext {
            as_of,
            calculated_at: request.calculated_at,
            model_version: self.config.model_version.clone(),
        };
        let outcome = score_jobs(&jobs, &self.config, &ctx, request.policy);

        if let Some(failed) = outcome.aborted_at {
            return Err(ScoringError::RunAborted {
                run_id,
                customer_id: failed.customer_id,
                reason:      failed.reason,
            });
        }

        let tier_counts = tier_distribution(&outcome.assessments);
        let scored = outcome.assessments.len();
        let rejected = outcome.rejections.len();

        let mut events: Vec<ScoringEvent> = outcome
            .rejections
            .iter()
            .map(|rejection| ScoringEvent::RecordRejected {
                run_id:      run_id.clone(),
                customer_id: rejection.customer_id.clone(),
                reason:      rejection.reason.clone(),
            })
            .collect();
        events.push(ScoringEvent::RunCompleted {
            run_id:      run_id.clone(),
            scored,
            rejected,
            tier_counts: tier_counts.clone(),
        });
        self.store.complete_run(
            &run_id,
            &outcome.assessments,
            &outcome.rejections,
            &tier_counts,
            &events,
        )?;

        let summary = RunSummary {
            run_id,
            as_of,
            model_version:       self.config.model_version.clone(),
            scored,
            rejected,
            tier_counts,
            intervention_counts: intervention_distribution(&outcome.assessments),
            mean_score:          mean_score(&outcome.assessments),
            promoted:            request.promote,
        };
        log::info!(
            "run={} as_of={as_of}: scored={scored} rejected={rejected} mean_score={:.1}",
            summary.run_id,
            summary.mean_score
        );
        Ok(summary)
    }

    /// Record a terminal ABORTED state. The original error is what the
    /// caller sees, so failures here are only logged.
    fn mark_aborted(&self, run_id: &str, customer_id: Option<CustomerId>, reason: String) {
        log::error!(
            "run={run_id}: aborted at {}: {reason}",
            customer_id.as_deref().unwrap_or("-")
        );
        if let Err(e) = self
            .store
            .finish_run(run_id, RunStatus::Aborted, 0, 0, &BTreeMap::new())
        {
            log::error!("run={run_id}: could not mark run aborted: {e}");
        }
        let event = ScoringEvent::RunAborted {
            run_id: run_id.to_string(),
            customer_id,
            reason,
        };
        if let Err(e) = self.store.append_event(&event) {
            log::error!("run={run_id}: could not log abort: {e}");
        }
    }

    /// Point the current view at `run_id`. Also used to roll back to an
    /// earlier run. Returns the previously current run.
    pub fn promote(&self, run_id: &str) -> ScoreResult<Option<RunId>> {
        let previous = self.store.promote_run(run_id)?;
        self.store.append_event(&ScoringEvent::RunPromoted {
            run_id:   run_id.to_string(),
            previous: previous.clone(),
        })?;
        log::info!(
            "run={run_id}: promoted to current (previous={})",
            previous.as_deref().unwrap_or("none")
        );
        Ok(previous)
    }

    /// Raw rows relevant to `as_of`: only what the windows can reach.
    fn load_raw(&self, as_of: NaiveDate) -> ScoreResult<RawRecords> {
        let windows = ActivityWindows::new(as_of, &self.config.aggregation);
        Ok(RawRecords {
            accounts:     self.store.active_accounts()?,
            transactions: self.store.transactions_between(windows.prior_start, as_of)?,
            engagement:   self.store.engagement_snapshots_until(as_of)?,
            complaints:   self.store.complaints_between(windows.complaint_start, as_of)?,
        })
    }
}
