//! risk-runner: headless churn-risk scoring runner.
//!
//! Usage:
//!   risk-runner --db bank.db --as-of 2024-06-30
//!   risk-runner --db :memory: --as-of 2024-06-30 --generate 5000 --seed 42
//!   risk-runner --db bank.db --as-of 2024-06-30 --model data/risk_model/evolved.json --no-promote
//!   risk-runner --db bank.db --promote-run <run_id>

use anyhow::{bail, Context, Result};
use churn_risk_core::{
    batch::FailurePolicy,
    config::{QualityConfig, RiskModelConfig},
    engine::{RunRequest, RunSummary, ScoringEngine},
    generator::{GeneratorConfig, SyntheticBank},
    quality,
    store::ScoringStore,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let seed = parse_arg(&args, "--seed", 42u64);
    let generate = parse_arg(&args, "--generate", 0usize);
    let no_promote = has_flag(&args, "--no-promote");
    let strict_quality = has_flag(&args, "--strict-quality");

    let store = ScoringStore::open(db).with_context(|| format!("opening {db}"))?;
    store.migrate()?;

    let config = match string_arg(&args, "--model") {
        Some(path) => RiskModelConfig::load(path)?,
        None => RiskModelConfig::canonical(),
    };

    if let Some(run_id) = string_arg(&args, "--promote-run") {
        let engine = ScoringEngine::new(config, store);
        let previous = engine.promote(run_id)?;
        println!("promoted {run_id} (previous: {})", previous.as_deref().unwrap_or("none"));
        return Ok(());
    }

    let as_of = match string_arg(&args, "--as-of") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("--as-of must be YYYY-MM-DD, got {raw}"))?,
        None => bail!("--as-of YYYY-MM-DD is required"),
    };
    let calculated_at = match string_arg(&args, "--calculated-at") {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("--calculated-at must be RFC 3339, got {raw}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let policy: FailurePolicy = match string_arg(&args, "--policy") {
        Some(raw) => raw.parse()?,
        None => FailurePolicy::default(),
    };

    println!("risk-runner");
    println!("  db:        {db}");
    println!("  as_of:     {as_of}");
    println!("  model:     {}", config.model_version);
    println!("  policy:    {policy:?}");
    println!();

    if generate > 0 {
        let bank = SyntheticBank::new(GeneratorConfig::new(generate, seed, as_of));
        let population = bank.populate(&store)?;
        println!("generated {} customers (seed {seed})", population.customers);
        for (persona, count) in &population.personas {
            println!("  {persona:?}: {count}");
        }
        println!();
    }

    let report = quality::run_checks(&store, as_of, &QualityConfig::default())?;
    if report.is_clean() {
        println!("data quality: clean");
    } else {
        println!("=== DATA QUALITY ===");
        for f in &report.findings {
            println!("  [{:?}] {}: {}", f.severity, f.check, f.detail);
        }
    }
    println!();
    if strict_quality && report.has_errors() {
        bail!("data quality errors present; refusing to score (--strict-quality)");
    }

    let engine = ScoringEngine::new(config, store);
    let mut request = RunRequest::new(as_of, calculated_at).with_policy(policy);
    if no_promote {
        request = request.without_promotion();
    }
    let summary = engine.run(&request)?;
    print_summary(&summary);

    if let Some(path) = string_arg(&args, "--export") {
        let written = export_jsonl(&engine, &summary.run_id, path)?;
        println!("exported {written} assessments to {path}");
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:     {}", summary.run_id);
    println!("  as_of:      {}", summary.as_of);
    println!("  model:      {}", summary.model_version);
    println!("  scored:     {}", summary.scored);
    println!("  rejected:   {}", summary.rejected);
    println!("  mean score: {:.1}", summary.mean_score);
    println!("  current:    {}", if summary.promoted { "yes" } else { "no" });
    println!();
    println!("=== TIERS ===");
    for (tier, count) in &summary.tier_counts {
        println!("  {:<10} {count}", tier.as_str());
    }
    println!();
    println!("=== INTERVENTIONS ===");
    for (intervention, count) in &summary.intervention_counts {
        println!("  {:<20} {count}", intervention.as_str());
    }
}

/// One JSON object per line, in customer id order.
fn export_jsonl(engine: &ScoringEngine, run_id: &str, path: &str) -> Result<usize> {
    let assessments = engine.store().assessments_for_run(run_id)?;
    let file = File::create(path).with_context(|| format!("creating {path}"))?;
    let mut out = BufWriter::new(file);
    for a in &assessments {
        serde_json::to_writer(&mut out, a)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    log::info!("run={run_id}: exported {} assessments to {path}", assessments.len());
    Ok(assessments.len())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
