//! Memory probes
//!
//! Probes report the resident memory of the current process. Hosts where
//! that is unavailable report `None`, which the runner records as `0`.

use parking_lot::Mutex;
use sysinfo::{Pid, System};

/// Source of process memory readings
pub trait MemoryProbe: Send + Sync {
    /// Current memory usage in bytes, if known
    fn sample(&self) -> Option<u64>;

    /// Current memory usage in bytes, `0` when unknown
    fn sample_or_zero(&self) -> u64 {
        self.sample().unwrap_or(0)
    }
}

/// Reads the current process's resident memory through `sysinfo`
pub struct SystemMemoryProbe {
    system: Mutex<System>,
    process_id: Option<Pid>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            process_id: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn sample(&self) -> Option<u64> {
        let pid = self.process_id?;
        let mut system = self.system.lock();
        if !system.refresh_process(pid) {
            return None;
        }
        // Already in bytes
        system.process(pid).map(|process| process.memory())
    }
}

/// Probe for hosts without memory introspection
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProbe;

impl MemoryProbe for NullProbe {
    fn sample(&self) -> Option<u64> {
        None
    }
}
