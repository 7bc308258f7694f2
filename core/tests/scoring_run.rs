use churn_risk_core::{
    aggregation::{
        AccountRecord, AccountStatus, AccountType, ComplaintRecord, ComplaintStatus,
        EngagementSnapshot, TransactionRecord,
    },
    batch::FailurePolicy,
    config::RiskModelConfig,
    customer::{CustomerRecord, KycStatus},
    engine::{RunRequest, RunStatus, ScoringEngine},
    error::ScoringError,
    event::ScoringEvent,
    generator::{GeneratorConfig, SyntheticBank},
    scoring::{Intervention, PrimaryDriver, RiskTier},
    store::ScoringStore,
};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn as_of() -> NaiveDate {
    d(2024, 6, 30)
}

fn calculated_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 3, 0, 0).unwrap()
}

fn request(run_id: &str) -> RunRequest {
    RunRequest::new(as_of(), calculated_at()).with_run_id(run_id)
}

fn customer(id: &str, segment: &str, onboarded_on: NaiveDate, kyc_status: KycStatus) -> CustomerRecord {
    CustomerRecord {
        customer_id:   id.into(),
        customer_name: format!("Customer {id}"),
        segment:       segment.into(),
        region:        "London".into(),
        onboarded_on,
        kyc_status,
    }
}

fn account(id: &str, customer: &str, kind: AccountType, balance: f64, primary: bool) -> AccountRecord {
    AccountRecord {
        account_id:   id.into(),
        customer_id:  customer.into(),
        account_type: kind,
        status:       AccountStatus::Active,
        balance,
        is_primary:   primary,
        opened_on:    d(2020, 1, 1),
    }
}

/// C1: long-standing, multi-product, active. Scores LOW.
/// C2: one thin account, silent, open complaint. Scores CRITICAL.
/// C3: KYC pending. C4: onboarded after as-of. Neither is scored.
fn seeded_store() -> ScoringStore {
    let store = ScoringStore::in_memory().expect("in-memory store");
    seed(&store);
    store
}

fn seed(store: &ScoringStore) {
    store.migrate().expect("migration");

    store
        .insert_customers(&[
            customer("C1", "MASS_MARKET", d(2015, 1, 15), KycStatus::Verified),
            customer("C2", "AFFLUENT", d(2023, 1, 10), KycStatus::Verified),
            customer("C3", "MASS_AFFLUENT", d(2019, 5, 1), KycStatus::Pending),
            customer("C4", "HIGH_NET_WORTH", d(2024, 8, 1), KycStatus::Verified),
        ])
        .unwrap();
    store
        .insert_accounts(&[
            account("C1-A1", "C1", AccountType::Current, 2_500.0, true),
            account("C1-A2", "C1", AccountType::Savings, 10_000.0, false),
            account("C1-A3", "C1", AccountType::CreditCard, -200.0, false),
            account("C2-A1", "C2", AccountType::Current, 40.0, true),
        ])
        .unwrap();

    let mut txns = Vec::new();
    for (start, prefix) in [(d(2024, 6, 28), "R"), (d(2024, 3, 20), "P")] {
        for k in 0..10u64 {
            txns.push(TransactionRecord {
                txn_id:      format!("T-{prefix}{k:02}"),
                account_id:  "C1-A1".into(),
                customer_id: "C1".into(),
                txn_date:    start.checked_sub_days(Days::new(k * 7)).unwrap(),
                amount:      42.0,
                channel:     "CARD".into(),
            });
        }
    }
    store.insert_transactions(&txns).unwrap();

    store
        .insert_engagement_snapshots(&[EngagementSnapshot {
            snapshot_id:           1,
            customer_id:           "C1".into(),
            measured_on:           d(2024, 6, 1),
            login_count_30d:       15,
            mobile_app_active:     true,
            online_banking_active: false,
            features_used_count:   0,
        }])
        .unwrap();
    store
        .insert_complaints(&[ComplaintRecord {
            complaint_id: "K1".into(),
            customer_id:  "C2".into(),
            filed_on:     d(2024, 5, 2),
            category:     "FEES".into(),
            status:       ComplaintStatus::Open,
            resolved_on:  None,
        }])
        .unwrap();
}

fn engine(store: ScoringStore) -> ScoringEngine {
    ScoringEngine::new(RiskModelConfig::canonical(), store)
}

fn with_unknown_segment(store: &ScoringStore) {
    store
        .insert_customers(&[customer("C5", "PRIVATE_BANKING", d(2018, 3, 3), KycStatus::Verified)])
        .unwrap();
}

// ── Runs ─────────────────────────────────────────────────────────────────────

#[test]
fn run_scores_verified_onboarded_customers() {
    let engine = engine(seeded_store());
    let summary = engine.run(&request("run-1")).unwrap();

    assert_eq!(summary.scored, 2);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.tier_counts[&RiskTier::Low], 1);
    assert_eq!(summary.tier_counts[&RiskTier::Critical], 1);
    assert_eq!(summary.tier_counts[&RiskTier::Medium], 0);
    assert_eq!(summary.intervention_counts[&Intervention::UrgentEscalation], 1);
    assert_eq!(summary.intervention_counts[&Intervention::NoAction], 1);

    let stored = engine.store().assessments_for_run("run-1").unwrap();
    let ids: Vec<&str> = stored.iter().map(|a| a.customer_id.as_str()).collect();
    assert_eq!(ids, vec!["C1", "C2"]);

    let run = engine.store().get_run("run-1").unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.scored_count, 2);
    assert!(run.is_current);
    assert_eq!(run.calculated_at, calculated_at());
}

#[test]
fn aggregates_flow_from_raw_rows_into_assessments() {
    let engine = engine(seeded_store());
    engine.run(&request("run-1")).unwrap();
    let stored = engine.store().assessments_for_run("run-1").unwrap();

    let c1 = &stored[0];
    assert!(c1.protective.multi_product && c1.protective.long_tenure);
    assert!(!c1.protective.highly_engaged_digital);
    assert_eq!(c1.raw_score, 5);
    assert_eq!(c1.risk_tier, RiskTier::Low);
    assert_eq!(c1.primary_risk_driver, PrimaryDriver::None);

    // No transactions at all: sentinel days, severe dormancy leads.
    let c2 = &stored[1];
    assert!(c2.declining_balance_flag && c2.dormancy_flag && c2.complaint_flag && c2.low_engagement_flag);
    assert!(!c2.reduced_activity_flag);
    assert_eq!(c2.raw_score, 95);
    assert_eq!(c2.primary_risk_driver, PrimaryDriver::Dormancy);
    assert_eq!(c2.recommended_intervention, Intervention::UrgentEscalation);
    assert_eq!(c2.as_of_date, as_of());
    assert_eq!(c2.model_version, "churn-rules-v1");
}

#[test]
fn stored_assessments_match_what_was_scored() {
    let engine = engine(seeded_store());
    engine.run(&request("run-1")).unwrap();
    assert_eq!(
        engine.store().current_assessments().unwrap(),
        engine.store().assessments_for_run("run-1").unwrap()
    );
    assert_eq!(engine.store().assessment_count("run-1").unwrap(), 2);
}

// ── Failure policies ─────────────────────────────────────────────────────────

#[test]
fn skip_policy_rejects_bad_record_and_scores_the_rest() {
    let store = seeded_store();
    with_unknown_segment(&store);
    let engine = engine(store);

    let summary = engine.run(&request("run-skip")).unwrap();
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.rejected, 1);

    let rejections = engine.store().rejections_for_run("run-skip").unwrap();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].customer_id, "C5");
    assert!(rejections[0].reason.contains("PRIVATE_BANKING"));

    let events = engine.store().events_for_run("run-skip").unwrap();
    assert!(events.iter().any(|e| e.event_type == "record_rejected"));
}

#[test]
fn abort_policy_stops_the_run_and_writes_nothing() {
    let store = seeded_store();
    with_unknown_segment(&store);
    let engine = engine(store);

    let err = engine
        .run(&request("run-abort").with_policy(FailurePolicy::Abort))
        .unwrap_err();
    match err {
        ScoringError::RunAborted { run_id, customer_id, .. } => {
            assert_eq!(run_id, "run-abort");
            assert_eq!(customer_id, "C5");
        }
        other => panic!("expected RunAborted, got {other:?}"),
    }

    let run = engine.store().get_run("run-abort").unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
    assert!(!run.is_current);
    assert_eq!(engine.store().assessment_count("run-abort").unwrap(), 0);
    assert_eq!(engine.store().current_run_id().unwrap(), None);
    assert!(engine.promote("run-abort").is_err());

    let last = engine.store().events_for_run("run-abort").unwrap().pop().unwrap();
    match last.decode().unwrap() {
        ScoringEvent::RunAborted { customer_id, .. } => assert_eq!(customer_id.as_deref(), Some("C5")),
        other => panic!("expected RunAborted, got {other:?}"),
    }
}

#[test]
fn failed_load_leaves_run_aborted_not_running() {
    let path = std::env::temp_dir().join(format!("churn-run-load-failure-{}.db", std::process::id()));
    let db = path.to_str().unwrap().to_string();
    let cleanup = || {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{db}{suffix}"));
        }
    };
    cleanup();

    let store = ScoringStore::open(&db).unwrap();
    seed(&store);
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute("UPDATE complaint SET status = 'MISLAID'", [])
        .unwrap();

    let engine = engine(store);
    let err = engine.run(&request("run-broken")).unwrap_err();
    assert!(matches!(err, ScoringError::Database(_)), "{err:?}");

    let run = engine.store().get_run("run-broken").unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
    assert!(!run.is_current);
    assert_eq!(engine.store().assessment_count("run-broken").unwrap(), 0);

    let events: Vec<ScoringEvent> = engine
        .store()
        .events_for_run("run-broken")
        .unwrap()
        .iter()
        .map(|e| e.decode().unwrap())
        .collect();
    let kinds: Vec<&str> = events.iter().map(|e| e.type_name()).collect();
    assert_eq!(kinds, vec!["run_started", "run_aborted"]);
    match &events[1] {
        ScoringEvent::RunAborted { customer_id, reason, .. } => {
            assert_eq!(*customer_id, None);
            assert!(!reason.is_empty());
        }
        other => panic!("expected RunAborted, got {other:?}"),
    }

    drop(engine);
    cleanup();
}

// ── Versioning ───────────────────────────────────────────────────────────────

#[test]
fn promotion_and_rollback_move_only_the_pointer() {
    let engine = engine(seeded_store());
    engine.run(&request("run-1")).unwrap();
    let second = engine
        .run(&request("run-2").without_promotion())
        .unwrap();
    assert!(!second.promoted);
    assert_eq!(engine.store().current_run_id().unwrap().as_deref(), Some("run-1"));

    let previous = engine.promote("run-2").unwrap();
    assert_eq!(previous.as_deref(), Some("run-1"));
    assert_eq!(engine.store().current_run_id().unwrap().as_deref(), Some("run-2"));

    // Rollback.
    let previous = engine.promote("run-1").unwrap();
    assert_eq!(previous.as_deref(), Some("run-2"));
    assert_eq!(engine.store().current_run_id().unwrap().as_deref(), Some("run-1"));

    let runs = engine.store().list_runs().unwrap();
    assert_eq!(runs.iter().map(|r| r.run_id.as_str()).collect::<Vec<_>>(), vec!["run-1", "run-2"]);
    assert_eq!(runs.iter().filter(|r| r.is_current).count(), 1);

    let history = engine.store().assessment_history("C2").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].0, "run-1");
    assert_eq!(history[1].0, "run-2");
}

#[test]
fn promoting_an_unknown_run_fails() {
    let engine = engine(seeded_store());
    assert!(matches!(
        engine.promote("nope"),
        Err(ScoringError::RunNotFound { .. })
    ));
}

#[test]
fn run_lifecycle_is_logged_in_order() {
    let engine = engine(seeded_store());
    engine.run(&request("run-1")).unwrap();

    let events: Vec<ScoringEvent> = engine
        .store()
        .events_for_run("run-1")
        .unwrap()
        .iter()
        .map(|e| e.decode().unwrap())
        .collect();
    let kinds: Vec<&str> = events.iter().map(|e| e.type_name()).collect();
    assert_eq!(kinds, vec!["run_started", "run_completed", "run_promoted"]);

    match &events[0] {
        ScoringEvent::RunStarted { customers, as_of: started, .. } => {
            assert_eq!(*customers, 2);
            assert_eq!(*started, as_of());
        }
        other => panic!("unexpected first event {other:?}"),
    }
}

// ── Determinism ──────────────────────────────────────────────────────────────

fn generated_store(seed: u64) -> ScoringStore {
    let store = ScoringStore::in_memory().unwrap();
    store.migrate().unwrap();
    SyntheticBank::new(GeneratorConfig::new(120, seed, as_of()))
        .populate(&store)
        .unwrap();
    store
}

#[test]
fn same_data_same_assessments() {
    let a = engine(generated_store(77));
    let b = engine(generated_store(77));
    let summary_a = a.run(&request("det")).unwrap();
    let summary_b = b.run(&request("det")).unwrap();
    assert_eq!(summary_a, summary_b);

    let json_a = serde_json::to_string(&a.store().assessments_for_run("det").unwrap()).unwrap();
    let json_b = serde_json::to_string(&b.store().assessments_for_run("det").unwrap()).unwrap();
    assert_eq!(json_a, json_b);
}

#[test]
fn rerun_over_unchanged_data_is_identical() {
    let engine = engine(generated_store(5));
    engine.run(&request("first")).unwrap();
    engine.run(&request("second")).unwrap();
    assert_eq!(
        engine.store().assessments_for_run("first").unwrap(),
        engine.store().assessments_for_run("second").unwrap()
    );
}

#[test]
fn generated_population_spans_tiers() {
    let engine = engine(generated_store(2024));
    let summary = engine.run(&request("spread")).unwrap();
    assert!(summary.scored > 100);
    let populated = summary.tier_counts.values().filter(|n| **n > 0).count();
    assert!(populated >= 3, "tier spread too narrow: {:?}", summary.tier_counts);
}

// ── Re-scoring after data changes ────────────────────────────────────────────

#[test]
fn rescoring_after_data_change_keeps_history() {
    let engine = engine(seeded_store());
    engine.run(&request("before")).unwrap();

    engine.store().update_account_status("C1-A3", AccountStatus::Closed).unwrap();
    engine.store().resolve_complaint("K1", d(2024, 6, 10)).unwrap();
    engine.run(&request("after")).unwrap();

    let history = engine.store().assessment_history("C1").unwrap();
    let (before, after) = (&history[0].1, &history[1].1);
    assert!(before.protective.multi_product);
    assert!(!after.protective.multi_product);
    assert_eq!(after.raw_score, before.raw_score + 10);

    let c2 = engine.store().assessment_history("C2").unwrap();
    assert!(c2[0].1.complaint_flag);
    assert!(!c2[1].1.complaint_flag);
    assert_eq!(c2[1].1.raw_score, 80);

    assert_eq!(engine.store().current_run_id().unwrap().as_deref(), Some("after"));
}

#[test]
fn populate_writes_every_generated_row() {
    let store = ScoringStore::in_memory().unwrap();
    store.migrate().unwrap();
    let summary = SyntheticBank::new(GeneratorConfig::new(40, 9, as_of()))
        .populate(&store)
        .unwrap();

    assert_eq!(store.customer_count().unwrap(), 40);
    assert_eq!(store.transaction_count().unwrap(), summary.transactions as i64);
    assert_eq!(summary.personas.values().sum::<usize>(), 40);

    let first = store.get_customer("CUST-000001").unwrap().expect("first customer");
    assert!(first.onboarded_on <= as_of());
    assert!(store.get_customer("CUST-999999").unwrap().is_none());
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[test]
fn batch_policies_over_assembled_inputs() {
    use churn_risk_core::{
        batch::score_inputs,
        customer::CustomerSegment,
        scoring::{AssessmentContext, ScoringInput},
    };

    let good = ScoringInput {
        customer_id:                "G".into(),
        customer_segment:           CustomerSegment::Affluent,
        tenure_months:              10,
        total_products_held:        1,
        primary_account_balance:    900.0,
        total_relationship_balance: 900.0,
        recent_txn_count:           4,
        prior_txn_count:            4,
        days_since_last_txn:        3,
        login_count_30d:            8,
        mobile_app_active:          true,
        digital_engagement_score:   36,
        open_complaints_count:      0,
        complaints_last_12m:        0,
    };
    let mut bad = good.clone();
    bad.customer_id = "B".into();
    bad.prior_txn_count = -1;
    let inputs = vec![good.clone(), bad, good];

    let config = RiskModelConfig::canonical();
    let ctx = AssessmentContext {
        as_of:         as_of(),
        calculated_at: calculated_at(),
        model_version: config.model_version.clone(),
    };

    let skipped = score_inputs(&inputs, &config, &ctx, FailurePolicy::SkipAndLog);
    assert_eq!(skipped.assessments.len(), 2);
    assert_eq!(skipped.rejections.len(), 1);
    assert_eq!(skipped.rejections[0].customer_id, "B");
    assert!(!skipped.is_aborted());

    let aborted = score_inputs(&inputs, &config, &ctx, FailurePolicy::Abort);
    assert!(aborted.is_aborted());
    assert_eq!(aborted.aborted_at.unwrap().customer_id, "B");
}
