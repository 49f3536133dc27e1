//! Shared, atomically replaceable source of component config values.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Merged configuration values, keyed by section prefix.
///
/// Cloning shares the same underlying source. `replace` swaps the whole
/// table at once; components started afterwards see the new values.
#[derive(Clone)]
pub struct ConfigSource {
    values: Arc<ArcSwap<toml::Table>>,
}

impl ConfigSource {
    pub fn new(values: toml::Table) -> Self {
        Self {
            values: Arc::new(ArcSwap::from_pointee(values)),
        }
    }

    pub fn empty() -> Self {
        Self::new(toml::Table::new())
    }

    /// Current values.
    pub fn snapshot(&self) -> Arc<toml::Table> {
        self.values.load_full()
    }

    /// Replace all values.
    pub fn replace(&self, values: toml::Table) {
        let sections = values.len();
        self.values.store(Arc::new(values));
        tracing::info!(sections, "Component configuration replaced");
    }
}

impl Default for ConfigSource {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigSource")
            .field("sections", &self.values.load().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_visible_to_clones() {
        let source = ConfigSource::empty();
        let shared = source.clone();
        let before = source.snapshot();

        let mut table = toml::Table::new();
        table.insert("db".into(), toml::Value::Table(toml::Table::new()));
        shared.replace(table);

        assert!(before.is_empty());
        assert!(source.snapshot().contains_key("db"));
    }
}
