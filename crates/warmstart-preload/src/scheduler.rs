//! Preload selection strategies
//!
//! The scheduler decides which registry entries to load and hands each one
//! to the [`LoadCache`]. Batches are best-effort: every constituent settles
//! and failures are reported per unit, never as a failure of the batch.

use std::{sync::Arc, time::Duration};

use futures::future::{join_all, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    cache::LoadCache,
    error::{PreloadError, Result},
    loader::{LoadResult, ModuleValue},
    policy::{DeviceContext, SmartPolicy},
    registry::{Category, ComponentRegistry, RegistryEntry},
    routes::RouteTable,
};

/// Per-unit result of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum PreloadOutcome {
    Loaded,
    Failed(String),
    NotFound,
}

/// Summary of a batch preload, in invocation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<(String, PreloadOutcome)>,
}

impl BatchReport {
    /// Names in the order their loads were started
    pub fn names(&self) -> Vec<&str> {
        self.outcomes.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn loaded(&self) -> Vec<&str> {
        self.filter(|o| matches!(o, PreloadOutcome::Loaded))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.filter(|o| matches!(o, PreloadOutcome::Failed(_)))
    }

    pub fn not_found(&self) -> Vec<&str> {
        self.filter(|o| matches!(o, PreloadOutcome::NotFound))
    }

    fn filter(&self, pred: impl Fn(&PreloadOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| pred(outcome))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True when nothing failed or was missing
    pub fn all_loaded(&self) -> bool {
        self.outcomes
            .iter()
            .all(|(_, outcome)| *outcome == PreloadOutcome::Loaded)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Schedules preloads from the registry through the load cache
#[derive(Clone)]
pub struct PreloadScheduler {
    registry: ComponentRegistry,
    cache: LoadCache,
    routes: Arc<RouteTable>,
    policy: SmartPolicy,
    load_timeout: Option<Duration>,
}

impl PreloadScheduler {
    pub fn new(registry: ComponentRegistry, cache: LoadCache) -> Self {
        Self {
            registry,
            cache,
            routes: Arc::new(RouteTable::default()),
            policy: SmartPolicy::default(),
            load_timeout: None,
        }
    }

    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = Arc::new(routes);
        self
    }

    pub fn with_policy(mut self, policy: SmartPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stop waiting on any single unit after `timeout`
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &LoadCache {
        &self.cache
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn policy(&self) -> SmartPolicy {
        self.policy
    }

    /// Register an entry, preloading it right away if it is eager.
    ///
    /// An eager preload failure is logged and does not undo the
    /// registration.
    pub async fn register(&self, entry: RegistryEntry) {
        let eager = entry.eager.then(|| entry.name.clone());
        self.registry.register(entry);

        if let Some(name) = eager {
            if let Err(err) = self.preload_one(&name).await {
                warn!(name = %name, error = %err, "Eager preload failed");
            }
        }
    }

    /// Preload a single named unit
    pub async fn preload_one(&self, name: &str) -> Result<ModuleValue> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| PreloadError::NotFound {
                name: name.to_string(),
            })?;

        self.start(&entry).await
    }

    /// Preload an explicit set of names
    pub async fn preload_batch<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        let mut outcomes = Vec::with_capacity(names.len());
        let mut loads = Vec::new();

        for name in names {
            let name = name.as_ref();
            match self.registry.get(name) {
                Some(entry) => {
                    loads.push((outcomes.len(), self.start(&entry)));
                    outcomes.push((name.to_string(), PreloadOutcome::Loaded));
                }
                None => {
                    debug!(name, "Skipping unregistered unit");
                    outcomes.push((name.to_string(), PreloadOutcome::NotFound));
                }
            }
        }

        self.settle(outcomes, loads).await
    }

    /// Preload every entry with `priority >= min_priority`, highest first
    pub async fn preload_by_priority(&self, min_priority: i32) -> BatchReport {
        let entries = select_by_priority(&self.registry.get_all(), min_priority);
        info!(min_priority, count = entries.len(), "Preloading by priority");
        self.preload_entries(entries).await
    }

    /// Preload every entry in a category, in registration order
    pub async fn preload_by_category(&self, category: Category) -> BatchReport {
        let entries: Vec<_> = self
            .registry
            .get_all()
            .into_iter()
            .filter(|e| e.category == category)
            .collect();
        info!(category = %category, count = entries.len(), "Preloading by category");
        self.preload_entries(entries).await
    }

    /// Preload the units mapped to a route; unknown routes preload nothing
    pub async fn preload_for_route(&self, route: &str) -> BatchReport {
        let names = self.routes.names_for(route);
        if names.is_empty() {
            debug!(route, "No units mapped to route");
            return BatchReport::default();
        }
        self.preload_batch(names).await
    }

    /// Pick a priority threshold from device signals and preload by it
    pub async fn smart_preload(&self, context: DeviceContext) -> BatchReport {
        let min_priority = self.policy.min_priority(context);
        debug!(?context, min_priority, "Smart preload");
        self.preload_by_priority(min_priority).await
    }

    async fn preload_entries(&self, entries: Vec<Arc<RegistryEntry>>) -> BatchReport {
        let mut outcomes = Vec::with_capacity(entries.len());
        let mut loads = Vec::with_capacity(entries.len());

        for entry in &entries {
            loads.push((outcomes.len(), self.start(entry)));
            outcomes.push((entry.name.clone(), PreloadOutcome::Loaded));
        }

        self.settle(outcomes, loads).await
    }

    /// Invoke (or join) the load for an entry right now
    fn start(&self, entry: &RegistryEntry) -> BoxFuture<'static, Result<ModuleValue>> {
        let name = entry.name.clone();

        match self.load_timeout {
            Some(timeout) => {
                let cache = self.cache.clone();
                let load = self.cache.preload(&entry.name, &entry.loader);
                async move {
                    match tokio::time::timeout(timeout, load).await {
                        Ok(result) => into_preload_result(&name, result),
                        Err(_) => {
                            debug!(name = %name, in_flight = cache.in_flight(), "Load wait timed out");
                            Err(PreloadError::Timeout {
                                name,
                                timeout_ms: timeout.as_millis() as u64,
                            })
                        }
                    }
                }
                .boxed()
            }
            None => self
                .cache
                .preload(&entry.name, &entry.loader)
                .map(move |result| into_preload_result(&name, result))
                .boxed(),
        }
    }

    async fn settle(
        &self,
        mut outcomes: Vec<(String, PreloadOutcome)>,
        loads: Vec<(usize, BoxFuture<'static, Result<ModuleValue>>)>,
    ) -> BatchReport {
        let (indices, futures): (Vec<_>, Vec<_>) = loads.into_iter().unzip();
        let results = join_all(futures).await;

        for (index, result) in indices.into_iter().zip(results) {
            if let Err(err) = result {
                let (name, outcome) = &mut outcomes[index];
                warn!(name = %name, error = %err, "Preload failed");
                *outcome = PreloadOutcome::Failed(err.to_string());
            }
        }

        let report = BatchReport { outcomes };
        debug!(
            total = report.len(),
            failed = report.failed().len(),
            "Batch settled"
        );
        report
    }
}

fn into_preload_result(name: &str, result: LoadResult) -> Result<ModuleValue> {
    result.map_err(|failure| PreloadError::LoaderFailure {
        name: name.to_string(),
        message: failure.message,
    })
}

/// Entries with `priority >= min_priority`, sorted by priority descending.
/// Ties keep their input order.
pub fn select_by_priority(
    entries: &[Arc<RegistryEntry>],
    min_priority: i32,
) -> Vec<Arc<RegistryEntry>> {
    let mut selected: Vec<_> = entries
        .iter()
        .filter(|e| e.priority >= min_priority)
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.priority.cmp(&a.priority));
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{loader, module, LoadFailure, LoaderRef};
    use crate::policy::{Connection, MemoryClass};
    use parking_lot::Mutex;

    fn recording_loader(log: Arc<Mutex<Vec<String>>>, name: &str) -> LoaderRef {
        let name = name.to_string();
        loader(move || {
            log.lock().push(name.clone());
            async { Ok(module(())) }
        })
    }

    fn scheduler_with(entries: &[(&str, i32, Category)]) -> (PreloadScheduler, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ComponentRegistry::new();
        for (name, priority, category) in entries {
            registry.register(
                RegistryEntry::new(*name, *category, recording_loader(Arc::clone(&log), name))
                    .with_priority(*priority),
            );
        }
        (PreloadScheduler::new(registry, LoadCache::new()), log)
    }

    #[tokio::test]
    async fn test_priority_selection_and_order() {
        let (scheduler, log) = scheduler_with(&[
            ("A", 10, Category::Ui),
            ("B", 5, Category::Ui),
            ("C", 7, Category::Ui),
        ]);

        let report = scheduler.preload_by_priority(7).await;

        assert_eq!(report.names(), vec!["A", "C"]);
        assert_eq!(*log.lock(), vec!["A", "C"]);
        assert!(report.all_loaded());
        assert!(!scheduler.cache().is_preloaded("B"));
    }

    #[tokio::test]
    async fn test_priority_ties_keep_registration_order() {
        let (scheduler, log) = scheduler_with(&[
            ("X", 3, Category::Ui),
            ("Y", 8, Category::Ui),
            ("Z", 3, Category::Ui),
        ]);

        scheduler.preload_by_priority(1).await;
        assert_eq!(*log.lock(), vec!["Y", "X", "Z"]);
    }

    #[tokio::test]
    async fn test_preload_one_not_found() {
        let (scheduler, _) = scheduler_with(&[]);
        let err = scheduler.preload_one("Ghost").await.unwrap_err();
        assert_eq!(
            err,
            PreloadError::NotFound {
                name: "Ghost".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_preload_one_propagates_loader_failure() {
        let registry = ComponentRegistry::new();
        registry.register(RegistryEntry::new(
            "Broken",
            Category::Feature,
            loader(|| async { Err(LoadFailure::new("404")) }),
        ));
        let scheduler = PreloadScheduler::new(registry, LoadCache::new());

        let err = scheduler.preload_one("Broken").await.unwrap_err();
        assert!(matches!(err, PreloadError::LoaderFailure { ref message, .. } if message == "404"));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let registry = ComponentRegistry::new();
        registry.register(RegistryEntry::new(
            "Good",
            Category::Ui,
            loader(|| async { Ok(module(1)) }),
        ));
        registry.register(RegistryEntry::new(
            "Bad",
            Category::Ui,
            loader(|| async { Err(LoadFailure::new("nope")) }),
        ));
        let scheduler = PreloadScheduler::new(registry, LoadCache::new());

        let report = scheduler.preload_batch(&["Bad", "Good", "Missing"]).await;

        assert_eq!(report.loaded(), vec!["Good"]);
        assert_eq!(report.failed(), vec!["Bad"]);
        assert_eq!(report.not_found(), vec!["Missing"]);
        assert!(scheduler.cache().is_preloaded("Good"));
    }

    #[tokio::test]
    async fn test_category_selection() {
        let (scheduler, log) = scheduler_with(&[
            ("Home", 1, Category::Page),
            ("Button", 9, Category::Ui),
            ("About", 2, Category::Page),
        ]);

        let report = scheduler.preload_by_category(Category::Page).await;
        assert_eq!(report.names(), vec!["Home", "About"]);
        assert_eq!(*log.lock(), vec!["Home", "About"]);
    }

    #[tokio::test]
    async fn test_route_mapping() {
        let (scheduler, log) = scheduler_with(&[
            ("DataTable", 1, Category::Feature),
            ("Chart", 1, Category::Feature),
            ("StatCard", 1, Category::Ui),
            ("Settings", 1, Category::Page),
        ]);
        let scheduler = scheduler.with_routes(
            RouteTable::new().with_route("/dashboard", ["DataTable", "Chart", "StatCard"]),
        );

        let report = scheduler.preload_for_route("/dashboard").await;
        assert_eq!(report.names(), vec!["DataTable", "Chart", "StatCard"]);
        assert_eq!(log.lock().len(), 3);

        let report = scheduler.preload_for_route("/unknown").await;
        assert!(report.is_empty());
        assert_eq!(log.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_smart_preload_policies() {
        let entries = [
            ("Critical", 9, Category::Ui),
            ("Nice", 2, Category::Ui),
            ("Zero", 0, Category::Ui),
        ];

        let (slow, _) = scheduler_with(&entries);
        let report = slow
            .smart_preload(DeviceContext::new(Connection::Slow, MemoryClass::Low))
            .await;
        assert_eq!(report.names(), vec!["Critical"]);

        let (fast, _) = scheduler_with(&entries);
        let report = fast
            .smart_preload(DeviceContext::new(Connection::Fast, MemoryClass::High))
            .await;
        assert_eq!(report.names(), vec!["Critical", "Nice"]);
    }

    #[tokio::test]
    async fn test_eager_registration_preloads() {
        let (scheduler, log) = scheduler_with(&[]);
        scheduler
            .register(
                RegistryEntry::new("Shell", Category::Ui, recording_loader(Arc::clone(&log), "Shell"))
                    .eager(),
            )
            .await;
        scheduler
            .register(RegistryEntry::new(
                "Lazy",
                Category::Ui,
                recording_loader(Arc::clone(&log), "Lazy"),
            ))
            .await;

        assert!(scheduler.cache().is_preloaded("Shell"));
        assert!(!scheduler.cache().is_preloaded("Lazy"));
        assert_eq!(*log.lock(), vec!["Shell"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_timeout_reports_unit() {
        let registry = ComponentRegistry::new();
        registry.register(RegistryEntry::new(
            "Hung",
            Category::Ui,
            loader(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(module(()))
            }),
        ));
        let scheduler = PreloadScheduler::new(registry, LoadCache::new())
            .with_load_timeout(Duration::from_millis(100));

        let report = scheduler.preload_batch(&["Hung"]).await;
        assert_eq!(report.failed(), vec!["Hung"]);
        assert_eq!(scheduler.cache().in_flight(), 1);
    }
}
