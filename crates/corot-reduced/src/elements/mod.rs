//! Element kernels for corotational elasticity.

use crate::error::Result;
use crate::stiffness_buffer::StiffnessBuffer;
use corot_mesh::{DOFS_PER_VERTEX, ELEMENT_DOFS};
use nalgebra::{DMatrix, DVector, Matrix3};

pub mod polar;
pub mod tet4;

pub use polar::{PolarDecomposition, polar_decomposition};
pub use tet4::CorotationalTet4;

/// Force contribution of one element
#[derive(Debug, Clone)]
pub struct ElementForce {
    /// Local internal force, vertex-major (length 12)
    pub force: DVector<f64>,
    /// Extracted rotation frame
    pub rotation: Matrix3<f64>,
}

/// Force and tangent stiffness contribution of one element
#[derive(Debug, Clone)]
pub struct ElementTangent {
    /// Local internal force, vertex-major (length 12)
    pub force: DVector<f64>,
    /// Local tangent stiffness block (12 × 12)
    pub stiffness: DMatrix<f64>,
    /// Extracted rotation frame
    pub rotation: Matrix3<f64>,
}

/// Per-element elasticity evaluator
///
/// Element indices passed to the evaluation methods must be in
/// `0..num_elements()`; displacement slices must hold `num_dofs()` values.
pub trait ElementKernel: Send + Sync {
    /// Number of elements
    fn num_elements(&self) -> usize;

    /// Number of mesh vertices
    fn num_vertices(&self) -> usize;

    /// Total DOF count of the full space
    fn num_dofs(&self) -> usize {
        self.num_vertices() * DOFS_PER_VERTEX
    }

    /// Global DOF indices of an element, vertex-major
    fn element_dofs(&self, element: usize) -> [usize; ELEMENT_DOFS];

    /// Strain energy stored in the element
    fn element_energy(&self, element: usize, displacements: &[f64]) -> f64;

    /// Internal force and rotation of the element
    fn element_force(&self, element: usize, displacements: &[f64]) -> ElementForce;

    /// Internal force, tangent stiffness and rotation of the element
    fn element_tangent(&self, element: usize, displacements: &[f64]) -> ElementTangent;

    /// Add `scale * stiffness` into the buffer at the element's pattern slots
    fn accumulate_stiffness(
        &self,
        element: usize,
        stiffness: &DMatrix<f64>,
        scale: f64,
        buffer: &mut StiffnessBuffer,
    ) -> Result<()> {
        buffer.scatter(element, stiffness, scale)
    }
}
