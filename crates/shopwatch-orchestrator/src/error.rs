use shopwatch_core::ports::IndexError;
use shopwatch_core::types::OperationType;
use thiserror::Error;

/// Errors that abort an orchestration run.
///
/// Per-shop and per-batch failures never surface here; they are folded
/// into the run summary. Only request validation and index failures are
/// fatal for the invocation.
#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("invalid operation type: {requested:?}")]
    InvalidOperation { requested: String },

    #[error("cutoff_days {0} is out of range")]
    InvalidCutoffDays(i64),

    #[error("no queue configured for operation {0}")]
    QueueNotConfigured(OperationType),

    #[error("eligibility query failed: {0}")]
    Query(#[from] IndexError),
}

impl OrchestrateError {
    /// True for errors caused by the request rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidOperation { .. } | Self::InvalidCutoffDays(_)
        )
    }
}

pub type OrchestrateResult<T> = Result<T, OrchestrateError>;
