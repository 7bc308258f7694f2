use crate::{
    customer::CustomerSegment,
    error::{ScoreResult, ScoringError},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── Rule table ─────────────────────────────────────────────────────

/// Every boolean signal the point model can award points for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskSignal {
    // Risk drivers
    DecliningBalance,
    ReducedActivity,
    LowEngagement,
    Complaint,
    Dormancy,
    // Protective
    MultiProduct,
    LongTenure,
    HighlyEngagedDigital,
}

/// One row of the rule table: when `signal` is raised, add `points`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PointRule {
    pub signal: RiskSignal,
    pub points: i32,
}

// ── Thresholds ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskThresholds {
    pub low_total_balance:       f64,
    pub low_primary_balance:     f64,
    pub activity_drop_ratio:     f64,
    pub low_login_count:         i64,
    pub repeat_complaint_count:  i64,
    pub dormancy_days:           i64,
    pub severe_dormancy_days:    i64,
    pub multi_product_min:       i64,
    pub long_tenure_months:      i64,
    pub digital_engagement_high: i64,
}

/// Upper-inclusive score bands. Anything above `high_max` is CRITICAL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierBands {
    pub low_max:    u8,
    pub medium_max: u8,
    pub high_max:   u8,
}

// ── Aggregation ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendBands {
    pub increasing_ratio: f64,
    pub stable_ratio:     f64,
    pub declining_ratio:  f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngagementWeights {
    pub per_login:      i64,
    pub mobile_app:     i64,
    pub online_banking: i64,
    pub per_feature:    i64,
    pub cap:            i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationConfig {
    /// Length of each activity sub-window. The transaction horizon is twice this.
    pub activity_window_months:    u32,
    pub complaint_window_months:   u32,
    pub no_activity_sentinel_days: i64,
    pub trend:                     TrendBands,
    pub engagement:                EngagementWeights,
}

// ── Model ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskModelConfig {
    pub model_version:       String,
    pub base_score:          i32,
    pub thresholds:          RiskThresholds,
    pub point_rules:         Vec<PointRule>,
    #[serde(default)]
    pub segment_adjustments: BTreeMap<CustomerSegment, i32>,
    pub tier_bands:          TierBands,
    pub aggregation:         AggregationConfig,
}

impl RiskModelConfig {
    /// Load a rule table from a JSON file and validate it.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: RiskModelConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::info!(
            "risk model {} loaded from {path} ({} point rules)",
            config.model_version,
            config.point_rules.len(),
        );
        Ok(config)
    }

    /// The v1 rule set: tenure protection above 60 months, digital
    /// engagement protection above 60.
    pub fn canonical() -> Self {
        Self {
            model_version: "churn-rules-v1".into(),
            base_score: 20,
            thresholds: RiskThresholds {
                low_total_balance:       500.0,
                low_primary_balance:     100.0,
                activity_drop_ratio:     0.7,
                low_login_count:         3,
                repeat_complaint_count:  2,
                dormancy_days:           45,
                severe_dormancy_days:    60,
                multi_product_min:       3,
                long_tenure_months:      60,
                digital_engagement_high: 60,
            },
            point_rules: vec![
                PointRule { signal: RiskSignal::DecliningBalance,     points:  20 },
                PointRule { signal: RiskSignal::ReducedActivity,      points:  20 },
                PointRule { signal: RiskSignal::LowEngagement,        points:  15 },
                PointRule { signal: RiskSignal::Complaint,            points:  15 },
                PointRule { signal: RiskSignal::Dormancy,             points:  25 },
                PointRule { signal: RiskSignal::MultiProduct,         points: -10 },
                PointRule { signal: RiskSignal::LongTenure,           points: -10 },
                PointRule { signal: RiskSignal::HighlyEngagedDigital, points: -10 },
            ],
            segment_adjustments: BTreeMap::from([
                (CustomerSegment::MassMarket,    5),
                (CustomerSegment::HighNetWorth, -5),
            ]),
            tier_bands: TierBands {
                low_max:    25,
                medium_max: 50,
                high_max:   75,
            },
            aggregation: AggregationConfig {
                activity_window_months:    3,
                complaint_window_months:   12,
                no_activity_sentinel_days: 999,
                trend: TrendBands {
                    increasing_ratio: 1.1,
                    stable_ratio:     0.9,
                    declining_ratio:  0.5,
                },
                engagement: EngagementWeights {
                    per_login:      2,
                    mobile_app:     20,
                    online_banking: 10,
                    per_feature:    2,
                    cap:            100,
                },
            },
        }
    }

    /// The later retail rule set: tenure protection from 36 months, digital
    /// protection only above 70. Weights are unchanged.
    pub fn evolved() -> Self {
        let mut config = Self::canonical();
        config.model_version = "churn-rules-v2-retail".into();
        config.thresholds.long_tenure_months = 36;
        config.thresholds.digital_engagement_high = 70;
        config
    }

    pub fn validate(&self) -> ScoreResult<()> {
        let bands = &self.tier_bands;
        if !(bands.low_max < bands.medium_max && bands.medium_max < bands.high_max && bands.high_max < 100) {
            return Err(ScoringError::InvalidConfig(format!(
                "tier bands must be strictly ascending below 100, got {}/{}/{}",
                bands.low_max, bands.medium_max, bands.high_max
            )));
        }

        let mut seen = BTreeSet::new();
        for rule in &self.point_rules {
            if !seen.insert(rule.signal) {
                return Err(ScoringError::InvalidConfig(format!(
                    "signal {:?} appears in more than one point rule",
                    rule.signal
                )));
            }
        }

        let t = &self.thresholds;
        if !(0.0..=1.0).contains(&t.activity_drop_ratio) {
            return Err(ScoringError::InvalidConfig(format!(
                "activity_drop_ratio must be within [0, 1], got {}",
                t.activity_drop_ratio
            )));
        }
        if t.severe_dormancy_days < t.dormancy_days {
            return Err(ScoringError::InvalidConfig(
                "severe_dormancy_days must not be below dormancy_days".into(),
            ));
        }

        let agg = &self.aggregation;
        if agg.activity_window_months == 0 || agg.complaint_window_months == 0 {
            return Err(ScoringError::InvalidConfig(
                "aggregation windows must be at least one month".into(),
            ));
        }
        let trend = &agg.trend;
        if !(trend.declining_ratio <= trend.stable_ratio && trend.stable_ratio <= trend.increasing_ratio) {
            return Err(ScoringError::InvalidConfig(
                "trend ratios must satisfy declining <= stable <= increasing".into(),
            ));
        }
        Ok(())
    }

    /// Points awarded when `signal` is raised. Signals without a rule score zero.
    pub fn points_for(&self, signal: RiskSignal) -> i32 {
        self.point_rules
            .iter()
            .find(|r| r.signal == signal)
            .map(|r| r.points)
            .unwrap_or(0)
    }

    pub fn segment_adjustment(&self, segment: CustomerSegment) -> i32 {
        self.segment_adjustments.get(&segment).copied().unwrap_or(0)
    }
}

// ── Data quality ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityConfig {
    /// Newest transaction older than this (relative to as-of) is reported stale.
    pub max_transaction_staleness_days: i64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { max_transaction_staleness_days: 2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rule_sets_are_valid() {
        RiskModelConfig::canonical().validate().unwrap();
        RiskModelConfig::evolved().validate().unwrap();
    }

    #[test]
    fn duplicate_signal_rejected() {
        let mut config = RiskModelConfig::canonical();
        config.point_rules.push(PointRule { signal: RiskSignal::Dormancy, points: 5 });
        assert!(matches!(config.validate(), Err(ScoringError::InvalidConfig(_))));
    }

    #[test]
    fn unordered_tier_bands_rejected() {
        let mut config = RiskModelConfig::canonical();
        config.tier_bands.medium_max = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unlisted_segment_has_no_adjustment() {
        let config = RiskModelConfig::canonical();
        assert_eq!(config.segment_adjustment(CustomerSegment::Affluent), 0);
        assert_eq!(config.segment_adjustment(CustomerSegment::MassMarket), 5);
    }
}
