//! Core configuration

use serde::{Deserialize, Serialize};

/// Configuration for the versioning core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Maximum number of migration jobs executing at the same time
    ///
    /// Jobs beyond the cap stay queued. The single-writer rule per
    /// (release, container) pair holds independently of this value.
    pub max_concurrent_jobs: usize,
}

impl CoreConfig {
    /// Create the default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a job concurrency cap
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_concurrency() {
        assert_eq!(CoreConfig::new().max_concurrent_jobs, 8);
    }

    #[test]
    fn concurrency_floor_is_one() {
        let config = CoreConfig::new().with_max_concurrent_jobs(0);
        assert_eq!(config.max_concurrent_jobs, 1);
    }
}
