use domain::saga::record::DEFAULT_MAX_RETRIES;

/// Tunables for the saga orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaConfig {
    /// Automatic retries granted to each new saga.
    pub max_retries: u32,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl SagaConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}
