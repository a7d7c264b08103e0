//! Runtime configuration for the reduced model.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// How much of the element rotation enters forces and tangent stiffness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarpMode {
    /// Small-strain linear elasticity, no rotation extraction
    Linear,
    /// Corotated force with tangent `R K0 Rᵀ`
    Rotated,
    /// Corotated force with the exact tangent, including the rotation derivative
    #[default]
    Full,
}

impl WarpMode {
    /// Legacy integer code (0 = linear, 1 = rotated, 2 = full)
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(WarpMode::Linear),
            1 => Some(WarpMode::Rotated),
            2 => Some(WarpMode::Full),
            _ => None,
        }
    }
}

/// Reduced model configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducedModelConfig {
    /// Corotational warp mode
    pub warp: WarpMode,
    /// Evaluate elements on the rayon pool
    pub parallel: bool,
    /// Below this element count evaluation stays serial
    pub parallel_threshold: usize,
}

impl Default for ReducedModelConfig {
    fn default() -> Self {
        Self {
            warp: WarpMode::Full,
            parallel: true,
            parallel_threshold: 64,
        }
    }
}

impl ReducedModelConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether a run over `num_elements` should use the rayon pool
    pub fn use_parallel(&self, num_elements: usize) -> bool {
        self.parallel && num_elements >= self.parallel_threshold
    }
}
