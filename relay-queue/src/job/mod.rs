pub mod builtin;
pub mod kind;
pub mod registry;

pub use kind::JobKind;
pub use registry::{JobHandler, JobRegistry};

use crate::JobError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A typed job handler.
///
/// Handlers are pure functions of their input: no state is shared between
/// invocations, and each one may run in a different process.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Input payload, decoded from the job's `input_data`
    type Input: DeserializeOwned + Send + 'static;

    /// Output payload, stored as the job's `output_data`
    type Output: Serialize + Send + 'static;

    /// Job name used for dispatch
    const JOB_TYPE: &'static str;

    /// Execute the job
    async fn execute(&self, input: Self::Input) -> Result<Self::Output, JobError>;

    /// Get the job type identifier for dispatch
    fn job_type(&self) -> &'static str {
        Self::JOB_TYPE
    }
}
