//! Process-wide mapping from a tenant's `scraper_version` string to the
//! plugin instance that knows how to drive it.

use dashmap::DashMap;
use std::sync::Arc;

use crate::plugin::ScraperPlugin;

#[derive(Default)]
pub struct ScraperRegistry {
    plugins: DashMap<String, Arc<dyn ScraperPlugin>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, version: impl Into<String>, plugin: Arc<dyn ScraperPlugin>) {
        self.plugins.insert(version.into(), plugin);
    }

    pub fn get(&self, version: &str) -> Option<Arc<dyn ScraperPlugin>> {
        self.plugins.get(version).map(|entry| entry.value().clone())
    }

    pub fn versions(&self) -> Vec<String> {
        self.plugins.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Wires up every plugin this binary ships with. Onboarding a new
    /// upstream version means adding one `register` call here.
    pub fn with_builtin_plugins() -> Self {
        let registry = Self::new();
        registry.register(
            "4.2.0",
            Arc::new(crate::plugin_4_2_0::Sei420Scraper::default()) as Arc<dyn ScraperPlugin>,
        );
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_version() {
        let registry = ScraperRegistry::with_builtin_plugins();
        let plugin = registry.get("4.2.0").expect("4.2.0 plugin registered");
        assert_eq!(plugin.version(), "4.2.0");
    }

    #[test]
    fn unknown_version_returns_none() {
        let registry = ScraperRegistry::with_builtin_plugins();
        assert!(registry.get("9.9.9").is_none());
    }
}
