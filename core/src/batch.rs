//! Batch scoring across many customers.
//!
//! Each customer's assessment depends only on that customer's own
//! aggregates, so the batch is mapped in parallel with rayon. Collection
//! preserves input order, making a parallel run indistinguishable from a
//! sequential one.
//!
//! Whether a bad record skips or aborts is the caller's choice (FailurePolicy),
//! never the scoring function's.

use crate::{
    aggregation::CustomerAggregates,
    config::RiskModelConfig,
    customer::{CustomerProfile, CustomerRecord},
    error::{ScoreResult, ScoringError},
    scoring::{assess, AssessmentContext, RiskAssessment, ScoringInput},
    types::CustomerId,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the rejection, log it, keep scoring.
    #[default]
    SkipAndLog,
    /// Stop at the first rejected record.
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" | "skip_and_log" => Ok(Self::SkipAndLog),
            "abort" => Ok(Self::Abort),
            other => Err(ScoringError::Other(anyhow::anyhow!(
                "unknown failure policy '{other}' (expected skip|abort)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rejection {
    pub customer_id: CustomerId,
    pub reason:      String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub assessments: Vec<RiskAssessment>,
    pub rejections:  Vec<Rejection>,
    /// Set under `FailurePolicy::Abort`: the first failing record in input order.
    /// When present, `assessments` must not be persisted.
    pub aborted_at:  Option<Rejection>,
}

impl BatchOutcome {
    pub fn is_aborted(&self) -> bool {
        self.aborted_at.is_some()
    }
}

/// One customer's raw identity plus its aggregates, ready to score.
#[derive(Debug, Clone)]
pub struct ScoringJob {
    pub record:     CustomerRecord,
    pub aggregates: CustomerAggregates,
}

impl ScoringJob {
    fn run(&self, config: &RiskModelConfig, ctx: &AssessmentContext) -> ScoreResult<RiskAssessment> {
        let profile = CustomerProfile::from_record(&self.record, ctx.as_of)?;
        let input = ScoringInput::assemble(&profile, &self.aggregates);
        assess(&input, config, ctx)
    }
}

/// Type, assemble and score every job.
pub fn score_jobs(
    jobs: &[ScoringJob],
    config: &RiskModelConfig,
    ctx: &AssessmentContext,
    policy: FailurePolicy,
) -> BatchOutcome {
    let results: Vec<(CustomerId, ScoreResult<RiskAssessment>)> = jobs
        .par_iter()
        .map(|job| (job.record.customer_id.clone(), job.run(config, ctx)))
        .collect();
    collect_outcome(results, policy)
}

/// Score already-assembled inputs.
pub fn score_inputs(
    inputs: &[ScoringInput],
    config: &RiskModelConfig,
    ctx: &AssessmentContext,
    policy: FailurePolicy,
) -> BatchOutcome {
    let results: Vec<(CustomerId, ScoreResult<RiskAssessment>)> = inputs
        .par_iter()
        .map(|input| (input.customer_id.clone(), assess(input, config, ctx)))
        .collect();
    collect_outcome(results, policy)
}

fn collect_outcome(
    results: Vec<(CustomerId, ScoreResult<RiskAssessment>)>,
    policy: FailurePolicy,
) -> BatchOutcome {
    let mut outcome = BatchOutcome {
        assessments: Vec::with_capacity(results.len()),
        rejections:  Vec::new(),
        aborted_at:  None,
    };

    for (customer_id, result) in results {
        match result {
            Ok(assessment) => outcome.assessments.push(assessment),
            Err(e) if policy == FailurePolicy::Abort => {
                log::error!("batch: aborting at {customer_id}: {e}");
                outcome.aborted_at = Some(Rejection {
                    customer_id,
                    reason: e.to_string(),
                });
                return outcome;
            }
            Err(e) => {
                log::warn!("batch: skipping {customer_id}: {e}");
                outcome.rejections.push(Rejection {
                    customer_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    outcome
}
