//! Device-aware preload policy

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    Slow,
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryClass {
    Low,
    High,
}

/// Device signals supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceContext {
    pub connection: Connection,
    pub memory: MemoryClass,
}

impl DeviceContext {
    pub fn new(connection: Connection, memory: MemoryClass) -> Self {
        Self { connection, memory }
    }

    /// Fast connection and plenty of memory
    pub fn is_capable(&self) -> bool {
        self.connection == Connection::Fast && self.memory == MemoryClass::High
    }
}

/// Priority thresholds used by smart preloading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartPolicy {
    /// Threshold on capable devices
    pub aggressive_min_priority: i32,
    /// Threshold everywhere else
    pub conservative_min_priority: i32,
}

impl Default for SmartPolicy {
    fn default() -> Self {
        Self {
            aggressive_min_priority: 1,
            conservative_min_priority: 5,
        }
    }
}

impl SmartPolicy {
    /// Minimum priority to preload for a device
    pub fn min_priority(&self, context: DeviceContext) -> i32 {
        if context.is_capable() {
            self.aggressive_min_priority
        } else {
            self.conservative_min_priority
        }
    }
}
