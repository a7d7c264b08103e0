//! Error types for corot-reduced

use corot_mesh::MeshError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReductionError>;

#[derive(Error, Debug)]
pub enum ReductionError {
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("element index {index} out of range (mesh has {len} elements)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("stiffness pattern has no slot at ({row}, {col}) needed by element {element}")]
    PatternMismatch {
        element: usize,
        row: usize,
        col: usize,
    },

    #[error("material factor {value} at element {index} is not a finite non-negative number")]
    InvalidMaterialFactor { index: usize, value: f64 },

    #[error("element {element} is degenerate (rest volume {volume:e})")]
    DegenerateElement { element: usize, volume: f64 },

    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    #[error("invalid sparsity pattern: {0}")]
    InvalidPattern(String),

    #[error("mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReductionError {
    pub(crate) fn dimension(what: &'static str, expected: usize, actual: usize) -> Self {
        ReductionError::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }
}
