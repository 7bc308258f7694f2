//! Shared primitive types used across the scoring engine.

/// A stable, unique customer identifier. Immutable once assigned.
pub type CustomerId = String;

/// A stable, unique identifier for any raw record (account, transaction, complaint).
pub type EntityId = String;

/// The identifier of one scoring run.
pub type RunId = String;
