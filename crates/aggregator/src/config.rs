//! Aggregator configuration

use anytrust_types::Committee;
use std::time::Duration;

/// Aggregator configuration
#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    /// Committee members, quorum and identities
    pub committee: Committee,
    /// Deadline for each member call, for both sign and fetch (default: 5s)
    pub member_timeout: Duration,
}

impl AggregatorConfig {
    /// Create a new configuration with defaults
    pub fn new(committee: Committee) -> Self {
        Self {
            committee,
            member_timeout: Duration::from_millis(5000),
        }
    }

    /// Set per-member timeout
    pub fn with_member_timeout(mut self, timeout: Duration) -> Self {
        self.member_timeout = timeout;
        self
    }
}
