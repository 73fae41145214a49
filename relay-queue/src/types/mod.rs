pub mod ids;
pub mod record;

pub use ids::{JobId, WorkerId};
pub use record::{CompletionStatus, JobCompletion, JobRecord, JobStatus, NewJob};
