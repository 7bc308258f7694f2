//! Customer identity and relationship data.
//!
//! A `CustomerRecord` is the raw row held by the store (segment as free text,
//! exactly as the upstream system wrote it). A `CustomerProfile` is the typed
//! view the scoring step consumes, anchored to an as-of date.

use crate::{
    error::{ScoreResult, ScoringError},
    types::CustomerId,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerSegment {
    MassMarket,
    MassAffluent,
    Affluent,
    HighNetWorth,
}

impl CustomerSegment {
    pub const ALL: [CustomerSegment; 4] = [
        Self::MassMarket,
        Self::MassAffluent,
        Self::Affluent,
        Self::HighNetWorth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MassMarket   => "MASS_MARKET",
            Self::MassAffluent => "MASS_AFFLUENT",
            Self::Affluent     => "AFFLUENT",
            Self::HighNetWorth => "HIGH_NET_WORTH",
        }
    }
}

impl fmt::Display for CustomerSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerSegment {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|seg| seg.as_str() == s)
            .ok_or_else(|| ScoringError::UnknownSegment(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    Verified,
    Pending,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::Pending  => "PENDING",
            Self::Rejected => "REJECTED",
        }
    }
}

impl FromStr for KycStatus {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Verified, Self::Pending, Self::Rejected]
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ScoringError::Other(anyhow::anyhow!("unknown KYC status '{s}'")))
    }
}

/// Raw customer row as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerRecord {
    pub customer_id:   CustomerId,
    pub customer_name: String,
    pub segment:       String,
    pub region:        String,
    pub onboarded_on:  NaiveDate,
    pub kyc_status:    KycStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerProfile {
    pub customer_id:      CustomerId,
    pub customer_name:    String,
    pub customer_segment: CustomerSegment,
    pub region:           String,
    pub tenure_months:    i64,
}

impl CustomerProfile {
    /// Type the raw record against `as_of`. Fails on an unrecognised segment.
    pub fn from_record(record: &CustomerRecord, as_of: NaiveDate) -> ScoreResult<Self> {
        let customer_segment = record.segment.parse::<CustomerSegment>()?;
        Ok(Self {
            customer_id:   record.customer_id.clone(),
            customer_name: record.customer_name.clone(),
            customer_segment,
            region:        record.region.clone(),
            tenure_months: months_between(record.onboarded_on, as_of),
        })
    }
}

/// Whole calendar months elapsed from `start` to `end`, floored at zero.
/// The last day of a short month completes a month started on a later day
/// (Jan 31 to Feb 29 is one month).
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    if end <= start {
        return 0;
    }
    let mut months = i64::from(end.year() - start.year()) * 12
        + i64::from(end.month()) - i64::from(start.month());
    let end_of_month = end.succ_opt().map_or(true, |next| next.month() != end.month());
    if end.day() < start.day() && !end_of_month {
        months -= 1;
    }
    months.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn tenure_counts_whole_months_only() {
        assert_eq!(months_between(d(2020, 1, 15), d(2020, 2, 14)), 0);
        assert_eq!(months_between(d(2020, 1, 15), d(2020, 2, 15)), 1);
        assert_eq!(months_between(d(2015, 6, 30), d(2025, 6, 30)), 120);
    }

    #[test]
    fn short_month_end_completes_the_month() {
        assert_eq!(months_between(d(2024, 1, 31), d(2024, 2, 29)), 1);
        assert_eq!(months_between(d(2023, 1, 30), d(2023, 2, 28)), 1);
        assert_eq!(months_between(d(2024, 3, 31), d(2024, 4, 30)), 1);
        assert_eq!(months_between(d(2024, 1, 31), d(2024, 2, 28)), 0);
        assert_eq!(months_between(d(2024, 1, 31), d(2024, 3, 30)), 1);
    }

    #[test]
    fn tenure_never_negative() {
        assert_eq!(months_between(d(2026, 1, 1), d(2025, 1, 1)), 0);
        assert_eq!(months_between(d(2025, 1, 1), d(2025, 1, 1)), 0);
    }

    #[test]
    fn segment_round_trips_through_text() {
        for seg in CustomerSegment::ALL {
            assert_eq!(seg.as_str().parse::<CustomerSegment>().unwrap(), seg);
        }
        assert!(matches!(
            "PLATINUM".parse::<CustomerSegment>(),
            Err(ScoringError::UnknownSegment(s)) if s == "PLATINUM"
        ));
    }
}
