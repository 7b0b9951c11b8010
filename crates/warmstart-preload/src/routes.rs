//! Static route to unit-name mapping
//!
//! Serialized as a list of `{ route, units }` entries rather than a map, so
//! routes are values and keep their case through config loaders that
//! normalize keys.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One route and the units it needs, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub route: String,
    #[serde(default)]
    pub units: Vec<String>,
}

/// Maps a route to the ordered list of units it needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RouteEntry>", into = "Vec<RouteEntry>")]
pub struct RouteTable {
    routes: HashMap<String, Vec<String>>,
}

impl From<Vec<RouteEntry>> for RouteTable {
    /// A route listed twice keeps its last entry
    fn from(entries: Vec<RouteEntry>) -> Self {
        entries.into_iter().map(|e| (e.route, e.units)).collect()
    }
}

impl From<RouteTable> for Vec<RouteEntry> {
    fn from(table: RouteTable) -> Self {
        let mut entries: Vec<RouteEntry> = table
            .routes
            .into_iter()
            .map(|(route, units)| RouteEntry { route, units })
            .collect();
        entries.sort_by(|a, b| a.route.cmp(&b.route));
        entries
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_route<I, S>(mut self, route: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(route, names);
        self
    }

    /// Insert or replace the names for a route
    pub fn insert<I, S>(&mut self, route: impl Into<String>, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes
            .insert(route.into(), names.into_iter().map(Into::into).collect());
    }

    /// Names for a route; unknown routes map to nothing
    pub fn names_for(&self, route: &str) -> &[String] {
        self.routes.get(route).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Known routes, sorted
    pub fn routes(&self) -> Vec<&str> {
        let mut routes: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        routes.sort_unstable();
        routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<String>)> for RouteTable {
    fn from_iter<T: IntoIterator<Item = (S, Vec<String>)>>(iter: T) -> Self {
        Self {
            routes: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
