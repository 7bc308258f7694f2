//! Synthetic retail-banking population.
//!
//! Generates customers, accounts, transactions, engagement snapshots and
//! complaints relative to one as-of date, so the engine can be exercised
//! end to end without a production feed.
//!
//! Each customer is assigned a behaviour persona that shapes its raw rows:
//!   - Engaged:    steady transactions, active digital use, few complaints
//!   - Drifting:   activity tails off in the recent window, app use fades
//!   - Dormant:    no transactions for the last two months or more
//!   - Distressed: thin balances and open complaints
//!
//! RULE: same GeneratorConfig (seed included) = byte-identical rows.
//! Nothing here reads the clock.

use crate::{
    aggregation::{
        AccountRecord, AccountStatus, AccountType, ComplaintRecord, ComplaintStatus,
        EngagementSnapshot, RawRecords, TransactionRecord,
    },
    customer::{CustomerRecord, CustomerSegment, KycStatus},
    error::ScoreResult,
    names::NameGenerator,
    rng::{RngBank, StreamRng, TableSlot},
    store::ScoringStore,
};
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Segment population shares, in `CustomerSegment::ALL` order.
const SEGMENT_SHARES: [f64; 4] = [0.55, 0.25, 0.15, 0.05];
/// Persona shares, in `Persona::ALL` order.
const PERSONA_SHARES: [f64; 4] = [0.55, 0.20, 0.15, 0.10];
const VERIFIED_SHARE: f64 = 0.97;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    pub customers:      usize,
    pub seed:           u64,
    pub as_of:          NaiveDate,
    /// Months of transaction history generated before as-of.
    pub history_months: u32,
}

impl GeneratorConfig {
    pub fn new(customers: usize, seed: u64, as_of: NaiveDate) -> Self {
        Self { customers, seed, as_of, history_months: 9 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Engaged,
    Drifting,
    Dormant,
    Distressed,
}

impl Persona {
    pub const ALL: [Persona; 4] = [Self::Engaged, Self::Drifting, Self::Dormant, Self::Distressed];

    /// Monthly transaction volume `months_ago` months before as-of.
    fn monthly_transactions(&self, months_ago: u32, rng: &mut StreamRng) -> i64 {
        match self {
            Self::Engaged => rng.range_inclusive(12, 30),
            Self::Drifting if months_ago < 3 => rng.range_inclusive(1, 6),
            Self::Drifting => rng.range_inclusive(10, 22),
            Self::Dormant if months_ago < 3 => 0,
            Self::Dormant => rng.range_inclusive(2, 8),
            Self::Distressed if months_ago < 3 => rng.range_inclusive(3, 9),
            Self::Distressed => rng.range_inclusive(6, 14),
        }
    }
}

/// Everything one generation pass produces.
#[derive(Debug, Clone, Default)]
pub struct GeneratedData {
    pub customers: Vec<CustomerRecord>,
    pub personas:  BTreeMap<String, Persona>,
    pub raw:       RawRecords,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopulationSummary {
    pub customers:            usize,
    pub accounts:             usize,
    pub transactions:         usize,
    pub engagement_snapshots: usize,
    pub complaints:           usize,
    pub personas:             BTreeMap<Persona, usize>,
}

pub struct SyntheticBank {
    config: GeneratorConfig,
}

fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_sub_days(Days::new(days.max(0) as u64))
        .unwrap_or(NaiveDate::MIN)
}

impl SyntheticBank {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate every raw row in memory.
    pub fn generate(&self) -> GeneratedData {
        let bank = RngBank::new(self.config.seed);
        let mut customer_rng = bank.for_table(TableSlot::Customers);
        let mut persona_rng = bank.for_table(TableSlot::Personas);
        let mut account_rng = bank.for_table(TableSlot::Accounts);
        let mut txn_rng = bank.for_table(TableSlot::Transactions);
        let mut engagement_rng = bank.for_table(TableSlot::Engagement);
        let mut complaint_rng = bank.for_table(TableSlot::Complaints);

        let mut data = GeneratedData::default();
        let mut txn_seq: u64 = 0;
        let mut snapshot_seq: i64 = 0;
        let mut complaint_seq: u64 = 0;

        for i in 1..=self.config.customers {
            let (customer, segment) = self.generate_customer(i, &mut customer_rng);
            let persona = Persona::ALL[persona_rng.weighted_index(&PERSONA_SHARES)];

            let accounts = self.generate_accounts(&customer, segment, persona, &mut account_rng);
            if let Some(primary) = accounts.iter().find(|a| a.is_primary) {
                let primary_id = primary.account_id.clone();
                self.generate_transactions(
                    &customer,
                    &primary_id,
                    persona,
                    &mut txn_rng,
                    &mut txn_seq,
                    &mut data.raw.transactions,
                );
            }
            self.generate_engagement(
                &customer,
                persona,
                &mut engagement_rng,
                &mut snapshot_seq,
                &mut data.raw.engagement,
            );
            self.generate_complaints(
                &customer,
                persona,
                &mut complaint_rng,
                &mut complaint_seq,
                &mut data.raw.complaints,
            );

            data.raw.accounts.extend(accounts);
            data.personas.insert(customer.customer_id.clone(), persona);
            data.customers.push(customer);
        }

        data
    }

    /// Generate and write everything into `store`.
    pub fn populate(&self, store: &ScoringStore) -> ScoreResult<PopulationSummary> {
        let data = self.generate();
        store.insert_customers(&data.customers)?;
        store.insert_accounts(&data.raw.accounts)?;
        store.insert_transactions(&data.raw.transactions)?;
        store.insert_engagement_snapshots(&data.raw.engagement)?;
        store.insert_complaints(&data.raw.complaints)?;

        let mut personas: BTreeMap<Persona, usize> = BTreeMap::new();
        for persona in data.personas.values() {
            *personas.entry(*persona).or_insert(0) += 1;
        }

        let summary = PopulationSummary {
            customers:            data.customers.len(),
            accounts:             data.raw.accounts.len(),
            transactions:         data.raw.transactions.len(),
            engagement_snapshots: data.raw.engagement.len(),
            complaints:           data.raw.complaints.len(),
            personas,
        };
        log::info!(
            "generator seed={} as_of={}: {} customers, {} accounts, {} transactions",
            self.config.seed,
            self.config.as_of,
            summary.customers,
            summary.accounts,
            summary.transactions
        );
        Ok(summary)
    }

    // ── Per-table generation ─────────────────────────────────────────────

    fn generate_customer(&self, index: usize, rng: &mut StreamRng) -> (CustomerRecord, CustomerSegment) {
        let segment = CustomerSegment::ALL[rng.weighted_index(&SEGMENT_SHARES)];
        let kyc_status = if rng.chance(VERIFIED_SHARE) {
            KycStatus::Verified
        } else if rng.chance(0.5) {
            KycStatus::Pending
        } else {
            KycStatus::Rejected
        };
        let tenure_months = rng.range_inclusive(1, 180) as u32;
        let onboarded_on = self
            .config
            .as_of
            .checked_sub_months(Months::new(tenure_months))
            .unwrap_or(self.config.as_of);

        let record = CustomerRecord {
            customer_id:   format!("CUST-{index:06}"),
            customer_name: NameGenerator::full_name(rng),
            segment:       segment.as_str().to_string(),
            region:        NameGenerator::region(rng).to_string(),
            onboarded_on,
            kyc_status,
        };
        (record, segment)
    }

    fn generate_accounts(
        &self,
        customer: &CustomerRecord,
        segment: CustomerSegment,
        persona: Persona,
        rng: &mut StreamRng,
    ) -> Vec<AccountRecord> {
        let balance_floor = match segment {
            CustomerSegment::MassMarket   => 250.0,
            CustomerSegment::MassAffluent => 2_500.0,
            CustomerSegment::Affluent     => 15_000.0,
            CustomerSegment::HighNetWorth => 80_000.0,
        };
        let extra_products = match persona {
            Persona::Engaged    => rng.range_inclusive(1, 4),
            Persona::Drifting   => rng.range_inclusive(0, 2),
            Persona::Dormant    => rng.range_inclusive(0, 1),
            Persona::Distressed => rng.range_inclusive(0, 1),
        };
        // A small share of customers have closed everything.
        let closed_out = rng.chance(0.02);

        let primary_balance = match persona {
            Persona::Distressed => rng.range_inclusive(0, 90) as f64,
            Persona::Dormant    => rng.pareto(balance_floor * 0.2, 2.0),
            _                   => rng.pareto(balance_floor, 1.8),
        };
        let mut accounts = vec![AccountRecord {
            account_id:   format!("{}-ACC-01", customer.customer_id),
            customer_id:  customer.customer_id.clone(),
            account_type: AccountType::Current,
            status:       if closed_out { AccountStatus::Closed } else { AccountStatus::Active },
            balance:      round_pennies(primary_balance),
            is_primary:   true,
            opened_on:    customer.onboarded_on,
        }];

        const PRODUCTS: [AccountType; 4] = [
            AccountType::Savings,
            AccountType::CreditCard,
            AccountType::Mortgage,
            AccountType::Loan,
        ];
        for n in 0..extra_products {
            let account_type = PRODUCTS[rng.next_u64_below(PRODUCTS.len() as u64) as usize];
            let balance = match account_type {
                AccountType::Savings => rng.pareto(balance_floor * 2.0, 1.6),
                _                    => -rng.pareto(balance_floor, 2.2),
            };
            let status = if closed_out {
                AccountStatus::Closed
            } else if persona == Persona::Dormant && rng.chance(0.4) {
                AccountStatus::Dormant
            } else {
                AccountStatus::Active
            };
            accounts.push(AccountRecord {
                account_id: format!("{}-ACC-{:02}", customer.customer_id, n + 2),
                customer_id: customer.customer_id.clone(),
                account_type,
                status,
                balance: round_pennies(balance),
                is_primary: false,
                opened_on: customer.onboarded_on,
            });
        }
        accounts
    }

    fn generate_transactions(
        &self,
        customer: &CustomerRecord,
        account_id: &str,
        persona: Persona,
        rng: &mut StreamRng,
        seq: &mut u64,
        out: &mut Vec<TransactionRecord>,
    ) {
        let as_of = self.config.as_of;
        // Dormant customers go quiet 50-120 days before as-of.
        let quiet_days = match persona {
            Persona::Dormant => rng.range_inclusive(50, 120),
            _ => 0,
        };

        for months_ago in 0..self.config.history_months {
            let count = persona.monthly_transactions(months_ago, rng);
            for _ in 0..count {
                let offset = i64::from(months_ago) * 30 + rng.range_inclusive(0, 29);
                if offset < quiet_days {
                    continue;
                }
                let txn_date = days_before(as_of, offset);
                if txn_date < customer.onboarded_on {
                    continue;
                }
                *seq += 1;
                out.push(TransactionRecord {
                    txn_id:      format!("TXN-{:08}", *seq),
                    account_id:  account_id.to_string(),
                    customer_id: customer.customer_id.clone(),
                    txn_date,
                    amount:      round_pennies(rng.pareto(5.0, 1.4).min(5_000.0)),
                    channel:     NameGenerator::channel(rng).to_string(),
                });
            }
        }
    }

    fn generate_engagement(
        &self,
        customer: &CustomerRecord,
        persona: Persona,
        rng: &mut StreamRng,
        seq: &mut i64,
        out: &mut Vec<EngagementSnapshot>,
    ) {
        // Three monthly snapshots, oldest first.
        for months_ago in (0..3i64).rev() {
            let measured_on = days_before(self.config.as_of, months_ago * 30);
            if measured_on < customer.onboarded_on {
                continue;
            }
            let (logins, mobile_p, online_p, features) = match persona {
                Persona::Engaged    => (rng.range_inclusive(10, 30), 0.9, 0.8, rng.range_inclusive(4, 12)),
                Persona::Drifting   => (rng.range_inclusive(1, 8), 0.4, 0.5, rng.range_inclusive(1, 5)),
                Persona::Dormant    => (rng.range_inclusive(0, 2), 0.05, 0.1, rng.range_inclusive(0, 1)),
                Persona::Distressed => (rng.range_inclusive(0, 6), 0.3, 0.4, rng.range_inclusive(0, 3)),
            };
            *seq += 1;
            out.push(EngagementSnapshot {
                snapshot_id:           *seq,
                customer_id:           customer.customer_id.clone(),
                measured_on,
                login_count_30d:       logins,
                mobile_app_active:     rng.chance(mobile_p),
                online_banking_active: rng.chance(online_p),
                features_used_count:   features,
            });
        }
    }

    fn generate_complaints(
        &self,
        customer: &CustomerRecord,
        persona: Persona,
        rng: &mut StreamRng,
        seq: &mut u64,
        out: &mut Vec<ComplaintRecord>,
    ) {
        let as_of = self.config.as_of;
        let (count, open_p) = match persona {
            Persona::Engaged    => (if rng.chance(0.05) { 1 } else { 0 }, 0.1),
            Persona::Drifting   => (if rng.chance(0.2) { 1 } else { 0 }, 0.3),
            Persona::Dormant    => (if rng.chance(0.05) { 1 } else { 0 }, 0.2),
            Persona::Distressed => (rng.range_inclusive(1, 3), 0.7),
        };

        const OPEN: [ComplaintStatus; 3] = [
            ComplaintStatus::Open,
            ComplaintStatus::InProgress,
            ComplaintStatus::Escalated,
        ];
        for _ in 0..count {
            let filed_on = days_before(as_of, rng.range_inclusive(1, 330));
            if filed_on < customer.onboarded_on {
                continue;
            }
            let (status, resolved_on) = if rng.chance(open_p) {
                (OPEN[rng.next_u64_below(OPEN.len() as u64) as usize], None)
            } else {
                let resolved = filed_on
                    .checked_add_days(Days::new(rng.range_inclusive(1, 30) as u64))
                    .unwrap_or(as_of)
                    .min(as_of);
                (ComplaintStatus::Resolved, Some(resolved))
            };
            *seq += 1;
            out.push(ComplaintRecord {
                complaint_id: format!("CMP-{:07}", *seq),
                customer_id:  customer.customer_id.clone(),
                filed_on,
                category:     NameGenerator::complaint_category(rng).to_string(),
                status,
                resolved_on,
            });
        }
    }
}

fn round_pennies(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn same_seed_same_population() {
        let a = SyntheticBank::new(GeneratorConfig::new(50, 11, as_of())).generate();
        let b = SyntheticBank::new(GeneratorConfig::new(50, 11, as_of())).generate();
        assert_eq!(a.customers, b.customers);
        assert_eq!(a.raw.transactions, b.raw.transactions);
        assert_eq!(a.raw.complaints, b.raw.complaints);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = SyntheticBank::new(GeneratorConfig::new(50, 1, as_of())).generate();
        let b = SyntheticBank::new(GeneratorConfig::new(50, 2, as_of())).generate();
        assert_ne!(a.customers, b.customers);
    }

    #[test]
    fn nothing_is_dated_after_as_of() {
        let data = SyntheticBank::new(GeneratorConfig::new(100, 5, as_of())).generate();
        assert!(data.raw.transactions.iter().all(|t| t.txn_date <= as_of()));
        assert!(data.raw.engagement.iter().all(|s| s.measured_on <= as_of()));
        assert!(data.raw.complaints.iter().all(|c| c.filed_on <= as_of()));
        assert!(data.customers.iter().all(|c| c.onboarded_on <= as_of()));
    }

    #[test]
    fn dormant_customers_have_no_recent_transactions() {
        let data = SyntheticBank::new(GeneratorConfig::new(200, 8, as_of())).generate();
        let cutoff = days_before(as_of(), 50);
        for (id, persona) in &data.personas {
            if *persona == Persona::Dormant {
                assert!(data
                    .raw
                    .transactions
                    .iter()
                    .filter(|t| &t.customer_id == id)
                    .all(|t| t.txn_date <= cutoff));
            }
        }
    }

    #[test]
    fn every_customer_has_exactly_one_primary_current_account() {
        let data = SyntheticBank::new(GeneratorConfig::new(80, 3, as_of())).generate();
        for c in &data.customers {
            let primaries = data
                .raw
                .accounts
                .iter()
                .filter(|a| a.customer_id == c.customer_id && a.is_primary)
                .count();
            assert_eq!(primaries, 1, "{}", c.customer_id);
        }
    }
}
