//! Composition root wiring
//!
//! [`Preloader`] bundles one registry, metrics store, load cache and
//! scheduler that share state. Tests and embedders construct their own;
//! [`global`] offers a lazily built process-wide instance for applications
//! that want one.

use once_cell::sync::OnceCell;
use tracing::info;

use crate::{
    cache::LoadCache,
    config::PreloadConfig,
    metrics::MetricsStore,
    registry::ComponentRegistry,
    scheduler::PreloadScheduler,
};

/// Wired preload subsystem
#[derive(Clone)]
pub struct Preloader {
    metrics: MetricsStore,
    scheduler: PreloadScheduler,
}

impl Preloader {
    /// Build with default configuration
    pub fn new() -> Self {
        Self::from_config(&PreloadConfig::default())
    }

    /// Build from configuration
    pub fn from_config(config: &PreloadConfig) -> Self {
        let metrics = MetricsStore::new();
        let cache = LoadCache::with_metrics(metrics.clone());
        let mut scheduler = PreloadScheduler::new(ComponentRegistry::new(), cache)
            .with_routes(config.routes.clone())
            .with_policy(config.smart);
        if let Some(timeout) = config.load_timeout() {
            scheduler = scheduler.with_load_timeout(timeout);
        }

        Self { metrics, scheduler }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        self.scheduler.registry()
    }

    pub fn cache(&self) -> &LoadCache {
        self.scheduler.cache()
    }

    pub fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }

    pub fn scheduler(&self) -> &PreloadScheduler {
        &self.scheduler
    }
}

impl Default for Preloader {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceCell<Preloader> = OnceCell::new();

/// Install the process-wide preloader. Returns `false` if one already exists.
pub fn init_global(config: &PreloadConfig) -> bool {
    let installed = GLOBAL.set(Preloader::from_config(config)).is_ok();
    if installed {
        info!(routes = config.routes.len(), "Installed global preloader");
    }
    installed
}

/// Process-wide preloader, built with defaults on first use
pub fn global() -> &'static Preloader {
    GLOBAL.get_or_init(Preloader::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{loader, module};
    use crate::registry::{Category, RegistryEntry};
    use crate::routes::RouteTable;

    #[tokio::test]
    async fn test_components_share_state() {
        let preloader = Preloader::from_config(&PreloadConfig {
            routes: RouteTable::new().with_route("/", ["Shell"]),
            ..Default::default()
        });
        preloader.registry().register(RegistryEntry::new(
            "Shell",
            Category::Ui,
            loader(|| async { Ok(module(())) }),
        ));

        let report = preloader.scheduler().preload_for_route("/").await;

        assert!(report.all_loaded());
        assert!(preloader.cache().is_preloaded("Shell"));
        assert!(preloader.metrics().get("preload.Shell").is_some());
    }

    #[test]
    fn test_global_is_singleton() {
        let a = global() as *const Preloader;
        let b = global() as *const Preloader;
        assert_eq!(a, b);
        assert!(!init_global(&PreloadConfig::default()));
    }
}
