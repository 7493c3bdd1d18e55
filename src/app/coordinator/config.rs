//! Configuration for the cache coordinator

use serde::{Deserialize, Serialize};

/// Configuration for the cache coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Abort a shared fetch once every waiter has cancelled
    ///
    /// When disabled, an orphaned fetch still runs to completion and warms
    /// both tiers for the next caller.
    pub abort_orphaned_fetches: bool,
}

impl CoordinatorConfig {
    /// Enable or disable aborting orphaned fetches
    pub fn with_abort_orphaned_fetches(mut self, enabled: bool) -> Self {
        self.abort_orphaned_fetches = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keeps_orphaned_fetches() {
        let config = CoordinatorConfig::default();
        assert!(!config.abort_orphaned_fetches);
        assert!(config.with_abort_orphaned_fetches(true).abort_orphaned_fetches);
    }

    #[test]
    fn test_empty_section_uses_defaults() {
        let config: CoordinatorConfig = toml::from_str("").unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }
}
