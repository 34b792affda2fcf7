use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown scenario '{name}'")]
    UnknownScenario { name: String },

    #[error("Missing prerequisite result file {path}: run the '{producer}' harness first")]
    MissingPrerequisite { path: String, producer: &'static str },

    #[error("Malformed result table {path} at line {line}: {reason}")]
    MalformedTable { path: String, line: usize, reason: String },

    #[error("Invalid run plan: {0}")]
    InvalidPlan(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
