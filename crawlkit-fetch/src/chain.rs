//! Mode chains.
//!
//! A mode names an ordered list of backends to try. The orchestrator reads a
//! snapshot of the chain at the start of every fetch and may reorder the
//! shared table afterwards when a later entry succeeded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::BackendDescriptor;
use crate::config::EngineConfig;
use crate::error::ConfigError;

// ============================================================================
// Mode
// ============================================================================

/// Fetch mode, selecting which chain the orchestrator walks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Cheap first: plain HTTP, then heavier backends.
    #[default]
    Standard,
    /// Headless browser first.
    Headless,
    /// Full browser first.
    Full,
}

impl Mode {
    /// Config name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Headless => "headless",
            Self::Full => "full",
        }
    }

    /// Returns all modes.
    pub fn all() -> &'static [Mode] {
        &[Self::Standard, Self::Headless, Self::Full]
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "headless" => Ok(Self::Headless),
            "full" => Ok(Self::Full),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

// ============================================================================
// Mode Chain
// ============================================================================

/// Ordered backend descriptors for one mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeChain {
    entries: Vec<BackendDescriptor>,
}

impl ModeChain {
    /// Creates a chain from descriptors in priority order.
    pub fn new(entries: Vec<BackendDescriptor>) -> Self {
        Self { entries }
    }

    /// Looks a descriptor up by name.
    pub fn get(&self, name: &str) -> Option<&BackendDescriptor> {
        self.entries.iter().find(|d| d.name == name)
    }

    /// Index of a descriptor by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|d| d.name == name)
    }

    /// Moves the named descriptor to index 0, keeping the others in order.
    ///
    /// Returns `true` if the chain changed.
    pub fn bring_to_front(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(0) | None => false,
            Some(index) => {
                let descriptor = self.entries.remove(index);
                self.entries.insert(0, descriptor);
                true
            }
        }
    }

    /// Iterates enabled descriptors in order.
    pub fn enabled(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.entries.iter().filter(|d| d.enabled)
    }

    /// Iterates all descriptors in order.
    pub fn iter(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.entries.iter()
    }

    /// Names in order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.name.as_str()).collect()
    }

    /// Number of descriptors, enabled or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the chain has no descriptors.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<BackendDescriptor> for ModeChain {
    fn from_iter<I: IntoIterator<Item = BackendDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ============================================================================
// Mode Table
// ============================================================================

/// Shared chains for every mode.
///
/// Readers take a snapshot; reordering and reloads take the write lock, so a
/// fetch in flight keeps walking the order it started with.
#[derive(Debug, Default)]
pub struct ModeTable {
    chains: RwLock<BTreeMap<Mode, ModeChain>>,
}

impl ModeTable {
    /// Creates a table from explicit chains.
    pub fn new(chains: BTreeMap<Mode, ModeChain>) -> Self {
        Self {
            chains: RwLock::new(chains),
        }
    }

    /// Creates a table from the configured chains.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.modes.clone())
    }

    /// Returns a copy of the chain for `mode` (empty if unconfigured).
    pub async fn snapshot(&self, mode: Mode) -> ModeChain {
        self.chains.read().await.get(&mode).cloned().unwrap_or_default()
    }

    /// Reorders the chain for `mode`. Returns `true` if it changed.
    pub async fn bring_to_front(&self, mode: Mode, name: &str) -> bool {
        let mut chains = self.chains.write().await;
        let changed = chains
            .get_mut(&mode)
            .is_some_and(|chain| chain.bring_to_front(name));
        if changed {
            debug!(mode = %mode, backend = name, "Promoted backend to front of chain");
        }
        changed
    }

    /// Replaces every chain with the configured ones.
    pub async fn reload(&self, config: &EngineConfig) {
        *self.chains.write().await = config.modes.clone();
        debug!("Reloaded mode chains");
    }

    /// Modes that have a chain.
    pub async fn modes(&self) -> Vec<Mode> {
        self.chains.read().await.keys().copied().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;

    fn chain_of(names: &[&str]) -> ModeChain {
        names
            .iter()
            .map(|name| BackendDescriptor::new(*name, BackendKind::Http))
            .collect()
    }

    #[test]
    fn test_bring_to_front_preserves_relative_order() {
        let mut chain = chain_of(&["a", "b", "c"]);
        assert!(chain.bring_to_front("b"));
        assert_eq!(chain.names(), vec!["b", "a", "c"]);

        let mut chain = chain_of(&["a", "b", "c", "d"]);
        chain.bring_to_front("d");
        assert_eq!(chain.names(), vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_bring_to_front_first_is_noop() {
        let mut chain = chain_of(&["a", "b", "c"]);
        assert!(!chain.bring_to_front("a"));
        assert_eq!(chain.names(), vec!["a", "b", "c"]);
        assert!(!chain.bring_to_front("missing"));
        assert_eq!(chain.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_get_returns_none_for_unknown() {
        let chain = chain_of(&["a"]);
        assert!(chain.get("a").is_some());
        assert!(chain.get("z").is_none());
    }

    #[test]
    fn test_enabled_skips_disabled() {
        let chain = ModeChain::new(vec![
            BackendDescriptor::new("a", BackendKind::Http).disabled(),
            BackendDescriptor::new("b", BackendKind::Headless),
        ]);
        let names: Vec<_> = chain.enabled().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Headless".parse::<Mode>().unwrap(), Mode::Headless);
        assert_eq!(" full ".parse::<Mode>().unwrap(), Mode::Full);
        assert!("turbo".parse::<Mode>().is_err());
    }

    #[tokio::test]
    async fn test_table_reorder_and_reload() {
        let config = EngineConfig::default();
        let table = ModeTable::from_config(&config);
        let original = table.snapshot(Mode::Standard).await;

        let second = original.names()[1].to_string();
        assert!(table.bring_to_front(Mode::Standard, &second).await);
        assert_eq!(table.snapshot(Mode::Standard).await.names()[0], second);

        table.reload(&config).await;
        assert_eq!(table.snapshot(Mode::Standard).await, original);
    }
}
