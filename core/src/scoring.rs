//! Churn risk scoring: the pure per-customer rule engine.
//!
//! Pipeline for one customer:
//!   1. Validate the aggregated input (fail fast, never coerce)
//!   2. Raise the five risk-driver flags and three protective signals
//!   3. Sum the rule table: base + signal points + segment adjustment
//!   4. Clamp once, last, to [0, 100]
//!   5. Tier, primary driver and intervention from the clamped score
//!
//! RULE: no I/O, no clock, no randomness. The same input, config and
//! context always produce an identical RiskAssessment.

use crate::{
    aggregation::CustomerAggregates,
    config::{RiskModelConfig, RiskSignal, RiskThresholds, TierBands},
    customer::{CustomerProfile, CustomerSegment},
    error::{ScoreResult, ScoringError},
    types::CustomerId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

// ── Input ────────────────────────────────────────────────────────────────────

/// The per-customer input record. All fields are required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringInput {
    pub customer_id:                CustomerId,
    pub customer_segment:           CustomerSegment,
    pub tenure_months:              i64,
    pub total_products_held:        i64,
    pub primary_account_balance:    f64,
    pub total_relationship_balance: f64,
    pub recent_txn_count:           i64,
    pub prior_txn_count:            i64,
    pub days_since_last_txn:        i64,
    pub login_count_30d:            i64,
    pub mobile_app_active:          bool,
    pub digital_engagement_score:   i64,
    pub open_complaints_count:      i64,
    pub complaints_last_12m:        i64,
}

impl ScoringInput {
    pub fn assemble(profile: &CustomerProfile, aggregates: &CustomerAggregates) -> Self {
        Self {
            customer_id:                profile.customer_id.clone(),
            customer_segment:           profile.customer_segment,
            tenure_months:              profile.tenure_months,
            total_products_held:        aggregates.accounts.total_products_held,
            primary_account_balance:    aggregates.accounts.primary_account_balance,
            total_relationship_balance: aggregates.accounts.total_relationship_balance,
            recent_txn_count:           aggregates.transactions.recent_count,
            prior_txn_count:            aggregates.transactions.prior_count,
            days_since_last_txn:        aggregates.transactions.days_since_last_transaction,
            login_count_30d:            aggregates.engagement.login_count_30d,
            mobile_app_active:          aggregates.engagement.mobile_app_active,
            digital_engagement_score:   aggregates.engagement.digital_engagement_score,
            open_complaints_count:      aggregates.complaints.open_complaints_count,
            complaints_last_12m:        aggregates.complaints.complaints_last_12m,
        }
    }

    /// Reject anything outside the declared input domain.
    pub fn validate(&self) -> ScoreResult<()> {
        let id = self.customer_id.as_str();
        let counts = [
            ("tenure_months",         self.tenure_months),
            ("total_products_held",   self.total_products_held),
            ("recent_txn_count",      self.recent_txn_count),
            ("prior_txn_count",       self.prior_txn_count),
            ("days_since_last_txn",   self.days_since_last_txn),
            ("login_count_30d",       self.login_count_30d),
            ("open_complaints_count", self.open_complaints_count),
            ("complaints_last_12m",   self.complaints_last_12m),
        ];
        for (field, value) in counts {
            if value < 0 {
                return Err(ScoringError::invalid(id, field, format!("must be >= 0, got {value}")));
            }
        }

        if !(0..=100).contains(&self.digital_engagement_score) {
            return Err(ScoringError::invalid(
                id,
                "digital_engagement_score",
                format!("must be within [0, 100], got {}", self.digital_engagement_score),
            ));
        }

        for (field, value) in [
            ("primary_account_balance",    self.primary_account_balance),
            ("total_relationship_balance", self.total_relationship_balance),
        ] {
            if !value.is_finite() {
                return Err(ScoringError::invalid(id, field, format!("must be finite, got {value}")));
            }
        }

        Ok(())
    }
}

/// Run metadata stamped onto every assessment. Supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssessmentContext {
    pub as_of:         NaiveDate,
    pub calculated_at: DateTime<Utc>,
    pub model_version: String,
}

// ── Signals ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskFlags {
    pub declining_balance: bool,
    pub reduced_activity:  bool,
    pub low_engagement:    bool,
    pub complaint:         bool,
    pub dormancy:          bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtectiveSignals {
    pub multi_product:          bool,
    pub long_tenure:            bool,
    pub highly_engaged_digital: bool,
}

/// Each flag is evaluated on its own; flags are not mutually exclusive.
pub fn risk_flags(input: &ScoringInput, t: &RiskThresholds) -> RiskFlags {
    RiskFlags {
        declining_balance: input.total_relationship_balance < t.low_total_balance
            || input.primary_account_balance < t.low_primary_balance,
        reduced_activity: input.prior_txn_count > 0
            && (input.recent_txn_count as f64) < input.prior_txn_count as f64 * t.activity_drop_ratio,
        low_engagement: input.login_count_30d < t.low_login_count && !input.mobile_app_active,
        complaint: input.open_complaints_count > 0
            || input.complaints_last_12m >= t.repeat_complaint_count,
        dormancy: input.days_since_last_txn > t.dormancy_days,
    }
}

pub fn protective_signals(input: &ScoringInput, t: &RiskThresholds) -> ProtectiveSignals {
    ProtectiveSignals {
        multi_product:          input.total_products_held >= t.multi_product_min,
        long_tenure:            input.tenure_months > t.long_tenure_months,
        highly_engaged_digital: input.digital_engagement_score > t.digital_engagement_high,
    }
}

fn raised_signals(flags: &RiskFlags, protective: &ProtectiveSignals) -> [(RiskSignal, bool); 8] {
    [
        (RiskSignal::DecliningBalance,     flags.declining_balance),
        (RiskSignal::ReducedActivity,      flags.reduced_activity),
        (RiskSignal::LowEngagement,        flags.low_engagement),
        (RiskSignal::Complaint,            flags.complaint),
        (RiskSignal::Dormancy,             flags.dormancy),
        (RiskSignal::MultiProduct,         protective.multi_product),
        (RiskSignal::LongTenure,           protective.long_tenure),
        (RiskSignal::HighlyEngagedDigital, protective.highly_engaged_digital),
    ]
}

// ── Score ────────────────────────────────────────────────────────────────────

/// Unclamped additive score.
pub fn raw_score(
    segment: CustomerSegment,
    flags: &RiskFlags,
    protective: &ProtectiveSignals,
    config: &RiskModelConfig,
) -> i32 {
    let signal_points: i32 = raised_signals(flags, protective)
        .into_iter()
        .filter(|(_, raised)| *raised)
        .map(|(signal, _)| config.points_for(signal))
        .sum();
    config.base_score + signal_points + config.segment_adjustment(segment)
}

pub fn clamp_score(raw: i32) -> u8 {
    raw.clamp(MIN_SCORE, MAX_SCORE) as u8
}

// ── Classification ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Upper-inclusive bands: (.., low_max] LOW, (low_max, medium_max] MEDIUM, ...
    pub fn from_score(score: u8, bands: &TierBands) -> Self {
        if score <= bands.low_max {
            Self::Low
        } else if score <= bands.medium_max {
            Self::Medium
        } else if score <= bands.high_max {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low      => "LOW",
            Self::Medium   => "MEDIUM",
            Self::High     => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrimaryDriver {
    Dormancy,
    BalanceDecline,
    ActivityReduction,
    Complaints,
    LowEngagement,
    MultiFactor,
    None,
}

impl PrimaryDriver {
    pub const ALL: [PrimaryDriver; 7] = [
        Self::Dormancy,
        Self::BalanceDecline,
        Self::ActivityReduction,
        Self::Complaints,
        Self::LowEngagement,
        Self::MultiFactor,
        Self::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dormancy          => "DORMANCY",
            Self::BalanceDecline    => "BALANCE_DECLINE",
            Self::ActivityReduction => "ACTIVITY_REDUCTION",
            Self::Complaints        => "COMPLAINTS",
            Self::LowEngagement     => "LOW_ENGAGEMENT",
            Self::MultiFactor       => "MULTI_FACTOR",
            Self::None              => "NONE",
        }
    }
}

/// Fixed priority order, first match wins.
pub fn primary_driver(
    input: &ScoringInput,
    flags: &RiskFlags,
    score: u8,
    config: &RiskModelConfig,
) -> PrimaryDriver {
    let t = &config.thresholds;
    if flags.dormancy && input.days_since_last_txn > t.severe_dormancy_days {
        PrimaryDriver::Dormancy
    } else if flags.declining_balance && input.primary_account_balance < t.low_primary_balance {
        PrimaryDriver::BalanceDecline
    } else if flags.reduced_activity {
        PrimaryDriver::ActivityReduction
    } else if flags.complaint && input.open_complaints_count > 0 {
        PrimaryDriver::Complaints
    } else if flags.low_engagement {
        PrimaryDriver::LowEngagement
    } else if score > config.tier_bands.medium_max {
        PrimaryDriver::MultiFactor
    } else {
        PrimaryDriver::None
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intervention {
    UrgentEscalation,
    RelationshipCall,
    RetentionOffer,
    DigitalEngagement,
    BranchMeeting,
    NoAction,
}

impl Intervention {
    pub const ALL: [Intervention; 6] = [
        Self::UrgentEscalation,
        Self::RelationshipCall,
        Self::RetentionOffer,
        Self::DigitalEngagement,
        Self::BranchMeeting,
        Self::NoAction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrgentEscalation  => "URGENT_ESCALATION",
            Self::RelationshipCall  => "RELATIONSHIP_CALL",
            Self::RetentionOffer    => "RETENTION_OFFER",
            Self::DigitalEngagement => "DIGITAL_ENGAGEMENT",
            Self::BranchMeeting     => "BRANCH_MEETING",
            Self::NoAction          => "NO_ACTION",
        }
    }
}

macro_rules! parse_by_label {
    ($($ty:ident => $label:literal),+ $(,)?) => {
        $(
            impl FromStr for $ty {
                type Err = ScoringError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Self::ALL
                        .into_iter()
                        .find(|v| v.as_str() == s)
                        .ok_or_else(|| ScoringError::Other(anyhow::anyhow!(
                            "unknown {} '{s}'", $label
                        )))
                }
            }
        )+
    };
}

parse_by_label! {
    RiskTier      => "risk tier",
    PrimaryDriver => "primary risk driver",
    Intervention  => "intervention",
}

/// Action and priority (1 = most urgent).
pub fn recommend_intervention(score: u8, flags: &RiskFlags, bands: &TierBands) -> (Intervention, u8) {
    if score > bands.high_max {
        (Intervention::UrgentEscalation, 1)
    } else if score > bands.medium_max && flags.complaint {
        (Intervention::RelationshipCall, 2)
    } else if score > bands.medium_max {
        (Intervention::RetentionOffer, 2)
    } else if score > bands.low_max && flags.low_engagement {
        (Intervention::DigitalEngagement, 3)
    } else if score > bands.low_max {
        (Intervention::BranchMeeting, 3)
    } else {
        (Intervention::NoAction, 4)
    }
}

// ── Assessment ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub customer_id:              CustomerId,
    pub churn_risk_score:         u8,
    pub raw_score:                i32,
    pub risk_tier:                RiskTier,
    pub declining_balance_flag:   bool,
    pub reduced_activity_flag:    bool,
    pub low_engagement_flag:      bool,
    pub complaint_flag:           bool,
    pub dormancy_flag:            bool,
    pub protective:               ProtectiveSignals,
    pub primary_risk_driver:      PrimaryDriver,
    pub recommended_intervention: Intervention,
    pub intervention_priority:    u8,
    pub calculated_at:            DateTime<Utc>,
    pub as_of_date:               NaiveDate,
    pub model_version:            String,
}

impl RiskAssessment {
    pub fn flags(&self) -> RiskFlags {
        RiskFlags {
            declining_balance: self.declining_balance_flag,
            reduced_activity:  self.reduced_activity_flag,
            low_engagement:    self.low_engagement_flag,
            complaint:         self.complaint_flag,
            dormancy:          self.dormancy_flag,
        }
    }
}

/// Score one customer. Fails only on an out-of-domain input.
pub fn assess(
    input: &ScoringInput,
    config: &RiskModelConfig,
    ctx: &AssessmentContext,
) -> ScoreResult<RiskAssessment> {
    input.validate()?;

    let flags = risk_flags(input, &config.thresholds);
    let protective = protective_signals(input, &config.thresholds);
    let raw = raw_score(input.customer_segment, &flags, &protective, config);
    let score = clamp_score(raw);
    let tier = RiskTier::from_score(score, &config.tier_bands);
    let driver = primary_driver(input, &flags, score, config);
    let (intervention, priority) = recommend_intervention(score, &flags, &config.tier_bands);

    Ok(RiskAssessment {
        customer_id:              input.customer_id.clone(),
        churn_risk_score:         score,
        raw_score:                raw,
        risk_tier:                tier,
        declining_balance_flag:   flags.declining_balance,
        reduced_activity_flag:    flags.reduced_activity,
        low_engagement_flag:      flags.low_engagement,
        complaint_flag:           flags.complaint,
        dormancy_flag:            flags.dormancy,
        protective,
        primary_risk_driver:      driver,
        recommended_intervention: intervention,
        intervention_priority:    priority,
        calculated_at:            ctx.calculated_at,
        as_of_date:               ctx.as_of,
        model_version:            ctx.model_version.clone(),
    })
}
