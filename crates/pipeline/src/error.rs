use spedition_classify::ClassifyError;
use spedition_store::StoreError;
use thiserror::Error;

/// Errors that abort a whole import run.
///
/// Per-record insert failures never surface here: the processor isolates
/// them into [`spedition_core::ImportError`] entries on the report and the
/// run keeps going.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The run cannot start: empty or malformed input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// The backend dropped out mid-run. Batches already committed stay
    /// committed; nothing after the failure point was attempted.
    #[error(transparent)]
    Store(#[from] StoreError),
}
