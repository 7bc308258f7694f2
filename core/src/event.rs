//! The scoring audit log.
//!
//! RULE: every state change of a scoring run is recorded as an event.
//! Variants are append-only and are never removed or reordered: old
//! payloads must keep deserializing.

use crate::{
    scoring::RiskTier,
    types::{CustomerId, RunId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoringEvent {
    RunStarted {
        run_id:        RunId,
        as_of:         NaiveDate,
        model_version: String,
        customers:     usize,
    },
    RecordRejected {
        run_id:      RunId,
        customer_id: CustomerId,
        reason:      String,
    },
    RunCompleted {
        run_id:      RunId,
        scored:      usize,
        rejected:    usize,
        tier_counts: BTreeMap<RiskTier, usize>,
    },
    /// `customer_id` is set when a single record stopped the run, and empty
    /// when a load or write step failed.
    RunAborted {
        run_id:      RunId,
        #[serde(default)]
        customer_id: Option<CustomerId>,
        reason:      String,
    },
    RunPromoted {
        run_id:   RunId,
        previous: Option<RunId>,
    },
}

impl ScoringEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. }     => "run_started",
            Self::RecordRejected { .. } => "record_rejected",
            Self::RunCompleted { .. }   => "run_completed",
            Self::RunAborted { .. }     => "run_aborted",
            Self::RunPromoted { .. }    => "run_promoted",
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::RecordRejected { run_id, .. }
            | Self::RunCompleted { run_id, .. }
            | Self::RunAborted { run_id, .. }
            | Self::RunPromoted { run_id, .. } => run_id,
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub run_id:     RunId,
    pub event_type: String,
    pub payload:    String, // JSON-serialized ScoringEvent
}

impl EventLogEntry {
    pub fn from_event(event: &ScoringEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id:         None,
            run_id:     event.run_id().to_string(),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
        })
    }

    pub fn decode(&self) -> serde_json::Result<ScoringEvent> {
        serde_json::from_str(&self.payload)
    }
}
