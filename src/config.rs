//! Simulator configuration.
//!
//! Loaded from JSON by hosts; missing fields fall back to defaults, and the
//! default width can be overridden with `ADDSUB_WIDTH`.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::debug;

use crate::error::SimError;
use crate::logic::{Width, MAX_WIDTH};

/// Options for the VCD tracer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Start tracing as soon as the simulator is created.
    pub enabled: bool,
    /// VCD `$timescale`, one unit per clock step.
    pub timescale: String,
    /// VCD `$scope module` name.
    pub module_name: String,
    /// Stream to this file instead of buffering in memory.
    pub path: Option<String>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timescale: "1ns".to_string(),
            module_name: "addsub".to_string(),
            path: None,
        }
    }
}

/// Top-level simulator options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Operand width in bits. Validated when the simulator is built, not here.
    pub width: u32,
    pub trace: TraceConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        let width = env::var("ADDSUB_WIDTH").map_or(MAX_WIDTH, |s| {
            s.parse::<u32>().unwrap_or(MAX_WIDTH)
        });
        debug!("default operand width: {}", width);

        Self {
            width,
            trace: TraceConfig::default(),
        }
    }
}

impl SimConfig {
    /// Config with an explicit width and no tracing.
    pub fn with_width(width: u32) -> Self {
        Self {
            width,
            trace: TraceConfig::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn width(&self) -> Result<Width, SimError> {
        Width::new(self.width)
    }
}
