//! Catalog of named preloadable units

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loader::LoaderRef;

/// Category of a preloadable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ui,
    Page,
    Feature,
    Utility,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Ui => "ui",
            Category::Page => "page",
            Category::Feature => "feature",
            Category::Utility => "utility",
        };
        f.write_str(name)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ui" => Ok(Category::Ui),
            "page" => Ok(Category::Page),
            "feature" => Ok(Category::Feature),
            "utility" => Ok(Category::Utility),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// A registered preloadable unit
#[derive(Clone)]
pub struct RegistryEntry {
    /// Unique name
    pub name: String,
    /// Loader producing the unit's value
    pub loader: LoaderRef,
    /// Higher loads earlier
    pub priority: i32,
    pub category: Category,
    /// Names this unit depends on. Informational only.
    pub dependencies: Vec<String>,
    /// Whether the unit can be rendered server-side
    pub renderable: bool,
    /// Preload as soon as the entry is registered through the scheduler
    pub eager: bool,
}

impl RegistryEntry {
    /// Create an entry with default priority 0, no dependencies, renderable
    pub fn new(name: impl Into<String>, category: Category, loader: LoaderRef) -> Self {
        Self {
            name: name.into(),
            loader,
            priority: 0,
            category,
            dependencies: Vec::new(),
            renderable: true,
            eager: false,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn client_only(mut self) -> Self {
        self.renderable = false;
        self
    }

    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("category", &self.category)
            .field("dependencies", &self.dependencies)
            .field("renderable", &self.renderable)
            .field("eager", &self.eager)
            .finish_non_exhaustive()
    }
}

struct Slot {
    seq: u64,
    entry: Arc<RegistryEntry>,
}

#[derive(Default)]
struct Entries {
    slots: HashMap<String, Slot>,
    next_seq: u64,
}

/// Thread-safe registry of preloadable units.
///
/// Registering an existing name replaces the entry but keeps its original
/// registration position.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    entries: Arc<RwLock<Entries>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry
    pub fn register(&self, entry: RegistryEntry) {
        let mut entries = self.entries.write();
        let name = entry.name.clone();
        let entry = Arc::new(entry);

        if let Some(slot) = entries.slots.get_mut(&name) {
            debug!(name = %name, "Replacing registry entry");
            slot.entry = entry;
            return;
        }

        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries.slots.insert(name, Slot { seq, entry });
    }

    /// Insert or replace several entries in order
    pub fn register_batch<I>(&self, batch: I)
    where
        I: IntoIterator<Item = RegistryEntry>,
    {
        for entry in batch {
            self.register(entry);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegistryEntry>> {
        self.entries
            .read()
            .slots
            .get(name)
            .map(|slot| Arc::clone(&slot.entry))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().slots.contains_key(name)
    }

    /// All entries in registration order
    pub fn get_all(&self) -> Vec<Arc<RegistryEntry>> {
        let entries = self.entries.read();
        let mut slots: Vec<&Slot> = entries.slots.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| Arc::clone(&slot.entry)).collect()
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.get_all().iter().map(|e| e.name.clone()).collect()
    }

    /// Remove an entry, returning it if present
    pub fn unregister(&self, name: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.write().slots.remove(name).map(|slot| slot.entry)
    }

    /// Entries that can be rendered server-side, in registration order
    pub fn server_renderable(&self) -> Vec<Arc<RegistryEntry>> {
        self.get_all().into_iter().filter(|e| e.renderable).collect()
    }

    /// Declared dependencies of a unit
    pub fn dependencies_of(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(|e| e.dependencies.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
