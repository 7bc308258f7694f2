use churn_risk_core::{
    aggregation::{AccountRecord, AccountStatus, AccountType, EngagementSnapshot, TransactionRecord},
    config::QualityConfig,
    customer::{CustomerRecord, KycStatus},
    quality::{self, Severity},
    store::ScoringStore,
};
use chrono::NaiveDate;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn as_of() -> NaiveDate {
    d(2024, 6, 30)
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn customer(id: &str, segment: &str) -> CustomerRecord {
    CustomerRecord {
        customer_id:   id.into(),
        customer_name: format!("Customer {id}"),
        segment:       segment.into(),
        region:        "Wales".into(),
        onboarded_on:  d(2020, 2, 2),
        kyc_status:    KycStatus::Verified,
    }
}

fn account(id: &str, customer: &str, balance: f64) -> AccountRecord {
    AccountRecord {
        account_id:   id.into(),
        customer_id:  customer.into(),
        account_type: AccountType::Current,
        status:       AccountStatus::Active,
        balance,
        is_primary:   true,
        opened_on:    d(2020, 2, 2),
    }
}

fn txn(id: &str, date: NaiveDate) -> TransactionRecord {
    TransactionRecord {
        txn_id:      id.into(),
        account_id:  "A1".into(),
        customer_id: "C1".into(),
        txn_date:    date,
        amount:      10.0,
        channel:     "ATM".into(),
    }
}

fn clean_store() -> ScoringStore {
    let store = ScoringStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.insert_customers(&[customer("C1", "MASS_MARKET")]).unwrap();
    store.insert_accounts(&[account("A1", "C1", 800.0)]).unwrap();
    store.insert_transactions(&[txn("T1", d(2024, 6, 29))]).unwrap();
    store
}

#[test]
fn clean_data_has_no_findings() {
    init_logging();
    let report = quality::run_checks(&clean_store(), as_of(), &QualityConfig::default()).unwrap();
    assert!(report.is_clean(), "{:?}", report.findings);
    assert!(!report.has_errors());
}

#[test]
fn each_problem_is_reported_with_its_severity() {
    init_logging();
    let store = clean_store();
    store
        .insert_customers(&[customer("C2", "PRIVATE_BANKING"), customer("C3", "AFFLUENT")])
        .unwrap();
    store.insert_accounts(&[account("A2", "C2", -50.0)]).unwrap();
    store.insert_transactions(&[txn("T2", d(2024, 7, 3))]).unwrap();
    store
        .insert_engagement_snapshots(&[EngagementSnapshot {
            snapshot_id:           1,
            customer_id:           "C1".into(),
            measured_on:           d(2024, 6, 1),
            login_count_30d:       -4,
            mobile_app_active:     false,
            online_banking_active: false,
            features_used_count:   0,
        }])
        .unwrap();

    let report = quality::run_checks(&store, as_of(), &QualityConfig::default()).unwrap();
    assert!(report.has_errors());

    let expect = |check: &str, severity: Severity, count: i64| {
        let f = report
            .finding(check)
            .unwrap_or_else(|| panic!("missing finding {check}: {:?}", report.findings));
        assert_eq!(f.severity, severity, "{check}");
        assert_eq!(f.count, count, "{check}");
    };
    expect(quality::UNKNOWN_SEGMENT, Severity::Error, 1);
    expect(quality::NEGATIVE_ENGAGEMENT, Severity::Error, 1);
    expect(quality::FUTURE_TRANSACTION, Severity::Warning, 1);
    expect(quality::NO_ACTIVE_ACCOUNT, Severity::Info, 1);
    expect(quality::NEGATIVE_BALANCE, Severity::Info, 1);
    assert!(report.finding(quality::STALE_TRANSACTIONS).is_none());
}

#[test]
fn stale_feed_is_a_warning() {
    let report = quality::run_checks(&clean_store(), d(2024, 7, 10), &QualityConfig::default()).unwrap();
    let stale = report.finding(quality::STALE_TRANSACTIONS).expect("stale finding");
    assert_eq!(stale.severity, Severity::Warning);
    assert_eq!(stale.count, 11);
    assert!(!report.has_errors());
}

#[test]
fn empty_feed_is_stale() {
    let store = ScoringStore::in_memory().unwrap();
    store.migrate().unwrap();
    let report = quality::run_checks(&store, as_of(), &QualityConfig::default()).unwrap();
    assert!(report.finding(quality::STALE_TRANSACTIONS).is_some());
}
