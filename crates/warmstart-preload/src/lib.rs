//! # Warmstart Preload
//!
//! Adaptive preload scheduling for lazily loaded units.
//!
//! ## Features
//!
//! - **Deduplicated loads**: at most one loader invocation in flight per key,
//!   shared by every concurrent caller
//! - **Registry**: named units with priority, category and render flags
//! - **Selection strategies**: by name, batch, priority, category, route, or
//!   a device-aware smart policy
//! - **Best-effort batches**: one failing unit never aborts its siblings
//! - **Timing metrics**: every settled load is recorded in a metrics store

pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod policy;
pub mod preloader;
pub mod registry;
pub mod routes;
pub mod scheduler;

pub use cache::{LoadCache, LoadStats, LoadStatus};
pub use config::PreloadConfig;
pub use error::PreloadError;
pub use loader::{loader, module, LoadFailure, LoadResult, Loader, LoaderRef, ModuleValue};
pub use metrics::{MetricSample, MetricsStore, OperationTimer, SampleOutcome};
pub use policy::{Connection, DeviceContext, MemoryClass, SmartPolicy};
pub use preloader::{global, init_global, Preloader};
pub use registry::{Category, ComponentRegistry, RegistryEntry};
pub use routes::RouteTable;
pub use scheduler::{BatchReport, PreloadOutcome, PreloadScheduler};

/// Re-export commonly used types
pub type Result<T> = std::result::Result<T, PreloadError>;
