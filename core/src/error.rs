use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input for customer '{customer_id}': {field} {reason}")]
    InvalidInput {
        customer_id: String,
        field:       &'static str,
        reason:      String,
    },

    #[error("Unknown customer segment '{0}'")]
    UnknownSegment(String),

    #[error("Invalid risk model configuration: {0}")]
    InvalidConfig(String),

    #[error("Scoring run '{run_id}' not found")]
    RunNotFound { run_id: String },

    #[error("Scoring run '{run_id}' aborted at customer '{customer_id}': {reason}")]
    RunAborted {
        run_id:      String,
        customer_id: String,
        reason:      String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScoringError {
    pub(crate) fn invalid(customer_id: &str, field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            customer_id: customer_id.to_string(),
            field,
            reason: reason.into(),
        }
    }
}

pub type ScoreResult<T> = Result<T, ScoringError>;
