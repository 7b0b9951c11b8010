//! Preload configuration
//!
//! Loaded from an optional TOML file plus `WARMSTART_PRELOAD__*`
//! environment overrides.

use std::{path::Path, time::Duration};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    error::{PreloadError, Result},
    policy::SmartPolicy,
    routes::RouteTable,
};

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "WARMSTART_PRELOAD";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Route to unit names
    pub routes: RouteTable,
    /// Smart preload thresholds
    pub smart: SmartPolicy,
    /// Stop waiting on a unit after this many milliseconds
    pub load_timeout_ms: Option<u64>,
}

impl PreloadConfig {
    /// Load from a file (if it exists) layered under environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let parsed: PreloadConfig = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        if self.load_timeout_ms == Some(0) {
            return Err(PreloadError::Config(
                "load_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}
