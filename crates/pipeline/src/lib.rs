//! Import pipeline: row transforms, adaptive batch writes and the run
//! coordinator that ties classification, validation and loading together.
//!
//! One import run is one sequential control loop. Batch N's size depends
//! on batch N-1's outcome, so batches within a run are never parallel;
//! independent runs (other tenants, other files) each own their own
//! [`batch::BatchRunState`] and may run concurrently against the shared
//! connection pool.

pub mod batch;
pub mod coordinator;
pub mod error;
pub mod processor;
pub mod transform;

pub use batch::BatchRunState;
pub use coordinator::{ImportCoordinator, ImportRunResult, RunOptions, RunStatus};
pub use error::PipelineError;
pub use processor::{BatchProcessor, BatchReport, ProgressFn};
pub use transform::apply_mappings;
