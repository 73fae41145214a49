use std::sync::Arc;

use relay_queue::{JobGateway, JobStore};

/// Shared state for the process-jobs handlers.
#[derive(Clone)]
pub struct RelayState {
    pub gateway: JobGateway,
}

impl RelayState {
    pub fn new(gateway: JobGateway) -> Self {
        Self { gateway }
    }

    pub fn from_store(store: Arc<dyn JobStore>) -> Self {
        Self::new(JobGateway::new(store))
    }
}
