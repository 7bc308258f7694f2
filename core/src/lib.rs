//! Deterministic churn-risk scoring for retail banking customers.
//!
//! Raw account, transaction, engagement and complaint rows are aggregated
//! against an explicit as-of date, scored by a weighted point model, tiered,
//! explained and mapped to a recommended retention action.

pub mod aggregation;
pub mod batch;
pub mod config;
pub mod customer;
pub mod engine;
pub mod error;
pub mod event;
pub mod generator;
pub mod names;
pub mod quality;
pub mod rng;
pub mod scoring;
pub mod store;
pub mod types;
