//! Reduced-order corotational elasticity for tetrahedral meshes.
//!
//! Per-element energies, internal forces and tangent stiffness blocks of a
//! corotational linear tetrahedron model are evaluated at full-space
//! displacements and condensed into reduced matrices through caller-supplied
//! bases. Each element can be scaled by a material factor, and the global
//! tangent stiffness is assembled into a sparse buffer with a fixed pattern.
//!
//! The entry point is the [`ReducedModel`] trait, implemented by
//! [`ReducedModelWrapper`] over any [`ElementKernel`].

pub mod config;
pub mod elements;
pub mod error;
pub mod material_factor;
pub mod materials;
pub mod projection;
pub mod reduced_model;
pub mod stiffness_buffer;

pub use config::{ReducedModelConfig, WarpMode};
pub use elements::{
    CorotationalTet4, ElementForce, ElementKernel, ElementTangent, PolarDecomposition,
    polar_decomposition,
};
pub use error::{ReductionError, Result};
pub use material_factor::MaterialFactorTable;
pub use materials::{Material, MaterialTable};
pub use projection::ReductionProjector;
pub use reduced_model::{CorotationalReducedModel, ReducedModel, ReducedModelWrapper};
pub use stiffness_buffer::StiffnessBuffer;
