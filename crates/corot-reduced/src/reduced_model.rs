//! Reduced-order evaluation of element energies, forces and Hessians.
//!
//! # Pipeline
//!
//! For every element `i` the kernel is evaluated at the current
//! displacements, the contribution is scaled by material factor `cᵢ`, and the
//! projector condenses it into one output column:
//!
//! ```text
//! energy        E      = Σ cᵢ·Eᵢ
//! force matrix  A[:,i] = T · embed(cᵢ·fᵢ)
//! hessian       B[:,i] = vec(cᵢ · Rᵢ·Hᵢ·Rᵢᵀ)      (column-major)
//! ```
//!
//! Columns are independent, so the per-element map runs on the rayon pool
//! when the configuration allows it. Every dimension and pattern check runs
//! before any output or buffer value is written.
//!
//! # Example
//!
//! ```no_run
//! use corot_mesh::TetMesh;
//! use corot_reduced::{
//!     CorotationalReducedModel, Material, MaterialTable, ReducedModel, ReducedModelConfig,
//!     StiffnessBuffer,
//! };
//! use nalgebra::DMatrix;
//!
//! # fn example(mesh: TetMesh, basis: DMatrix<f64>) -> corot_reduced::Result<()> {
//! let materials = MaterialTable::uniform(Material::elastic("GEL", 5.0e4, 0.45), mesh.num_elements());
//! let model = CorotationalReducedModel::from_mesh(&mesh, &materials, ReducedModelConfig::default())?;
//! let mut buffer = StiffnessBuffer::for_mesh(&mesh)?;
//!
//! let u = vec![0.0; mesh.num_dofs()];
//! let forces = model.compute_reduced_force_matrix(&u, &basis)?;
//! let hessians = model.compute_reduced_hessian_matrix(&u, &basis, &mut buffer)?;
//! println!("{} x {} / {} x {}", forces.nrows(), forces.ncols(), hessians.nrows(), hessians.ncols());
//! # Ok(())
//! # }
//! ```

use crate::config::{ReducedModelConfig, WarpMode};
use crate::elements::{CorotationalTet4, ElementKernel, ElementTangent};
use crate::error::{ReductionError, Result};
use crate::material_factor::MaterialFactorTable;
use crate::materials::MaterialTable;
use crate::projection::ReductionProjector;
use crate::stiffness_buffer::StiffnessBuffer;
use corot_mesh::{ELEMENT_DOFS, TetMesh};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// Model-agnostic reduced-order capability interface
pub trait ReducedModel {
    /// Total elastic energy, each element weighted by its material factor
    fn compute_elastic_energy(&self, displacements: &[f64]) -> Result<f64>;

    /// `A = [T·f₁, T·f₂, …, T·fₙ]` with `fᵢ` the factor-scaled force of element `i`
    fn compute_reduced_force_matrix(
        &self,
        displacements: &[f64],
        basis: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>>;

    /// Column `i` is the column-major flattening of `cᵢ·Rᵢ·Hᵢ·Rᵢᵀ`
    ///
    /// `stiffness_buffer` must carry a pattern covering every element block;
    /// on success it holds the factor-scaled global tangent stiffness.
    fn compute_reduced_hessian_matrix(
        &self,
        displacements: &[f64],
        rotation_basis: &DMatrix<f64>,
        stiffness_buffer: &mut StiffnessBuffer,
    ) -> Result<DMatrix<f64>>;

    /// Replace all per-element factors; nothing changes on failure
    fn set_element_material_factor(&mut self, factor: &[f64]) -> Result<()>;

    /// Factor of one element, 1.0 when no table is set
    fn element_material_factor(&self, element: usize) -> Result<f64>;

    /// Return every element to the unscaled default
    fn clear_element_material_factor(&mut self);
}

/// Reduced-order driver over any element kernel
#[derive(Debug, Clone)]
pub struct ReducedModelWrapper<K: ElementKernel> {
    kernel: K,
    factors: MaterialFactorTable,
    config: ReducedModelConfig,
}

/// Reduced model over corotational linear tetrahedra
pub type CorotationalReducedModel = ReducedModelWrapper<CorotationalTet4>;

impl CorotationalReducedModel {
    /// Precompute the element kernel for a mesh and wrap it
    pub fn from_mesh(
        mesh: &TetMesh,
        materials: &MaterialTable,
        config: ReducedModelConfig,
    ) -> Result<Self> {
        let kernel = CorotationalTet4::new(mesh, materials, config.warp)?;
        Ok(Self::new(kernel, config))
    }

    /// Switch the corotational warp mode
    pub fn set_warp(&mut self, warp: WarpMode) {
        self.kernel.set_warp(warp);
        self.config.warp = warp;
    }
}

impl<K: ElementKernel> ReducedModelWrapper<K> {
    pub fn new(kernel: K, config: ReducedModelConfig) -> Self {
        let factors = MaterialFactorTable::new(kernel.num_elements());
        Self {
            kernel,
            factors,
            config,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn config(&self) -> &ReducedModelConfig {
        &self.config
    }

    pub fn material_factors(&self) -> &MaterialFactorTable {
        &self.factors
    }

    pub fn num_elements(&self) -> usize {
        self.kernel.num_elements()
    }

    pub fn num_dofs(&self) -> usize {
        self.kernel.num_dofs()
    }

    fn check_displacements(&self, displacements: &[f64]) -> Result<()> {
        if displacements.len() != self.num_dofs() {
            return Err(ReductionError::dimension(
                "displacement length",
                self.num_dofs(),
                displacements.len(),
            ));
        }
        Ok(())
    }

    /// Per-element map, parallel when configured and large enough
    fn map_elements<T, F>(&self, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        let n = self.num_elements();
        if self.config.use_parallel(n) {
            (0..n).into_par_iter().map(f).collect()
        } else {
            (0..n).map(f).collect()
        }
    }

    fn element_dofs(&self) -> Vec<[usize; ELEMENT_DOFS]> {
        (0..self.num_elements())
            .map(|e| self.kernel.element_dofs(e))
            .collect()
    }

    /// Factor-scaled tangents of all elements; disabled elements are skipped
    fn scaled_tangents(&self, displacements: &[f64]) -> Vec<(f64, Option<ElementTangent>)> {
        self.map_elements(|e| {
            let scale = self.factors.scale(e);
            let tangent = (scale != 0.0).then(|| self.kernel.element_tangent(e, displacements));
            (scale, tangent)
        })
    }

    /// Overwrite the buffer with the factor-scaled global tangent stiffness
    fn assemble_into(
        &self,
        tangents: &[(f64, Option<ElementTangent>)],
        buffer: &mut StiffnessBuffer,
    ) -> Result<()> {
        buffer.reset_values();
        for (e, (scale, tangent)) in tangents.iter().enumerate() {
            if let Some(tangent) = tangent {
                self.kernel
                    .accumulate_stiffness(e, &tangent.stiffness, *scale, buffer)?;
            }
        }
        Ok(())
    }

    /// Global internal force vector, factor-scaled
    pub fn compute_internal_forces(&self, displacements: &[f64]) -> Result<DVector<f64>> {
        self.check_displacements(displacements)?;

        let forces = self.map_elements(|e| {
            let scale = self.factors.scale(e);
            (scale != 0.0).then(|| self.kernel.element_force(e, displacements).force * scale)
        });

        let mut global = DVector::zeros(self.num_dofs());
        for (e, force) in forces.into_iter().enumerate() {
            if let Some(force) = force {
                for (local, &dof) in self.kernel.element_dofs(e).iter().enumerate() {
                    global[dof] += force[local];
                }
            }
        }
        Ok(global)
    }

    /// Global internal force vector plus the assembled tangent stiffness
    ///
    /// The buffer is overwritten with `Σ cᵢ·Hᵢ` in its fixed pattern.
    pub fn compute_force_and_stiffness(
        &self,
        displacements: &[f64],
        buffer: &mut StiffnessBuffer,
    ) -> Result<DVector<f64>> {
        self.check_displacements(displacements)?;
        buffer.check_dimensions(self.num_dofs())?;
        buffer.bind(&self.element_dofs())?;

        let tangents = self.scaled_tangents(displacements);
        self.assemble_into(&tangents, buffer)?;

        let mut global = DVector::zeros(self.num_dofs());
        for (e, (scale, tangent)) in tangents.iter().enumerate() {
            if let Some(tangent) = tangent {
                for (local, &dof) in self.kernel.element_dofs(e).iter().enumerate() {
                    global[dof] += scale * tangent.force[local];
                }
            }
        }
        Ok(global)
    }
}

impl<K: ElementKernel> ReducedModel for ReducedModelWrapper<K> {
    fn compute_elastic_energy(&self, displacements: &[f64]) -> Result<f64> {
        self.check_displacements(displacements)?;

        let energies = self.map_elements(|e| {
            let scale = self.factors.scale(e);
            if scale == 0.0 {
                0.0
            } else {
                scale * self.kernel.element_energy(e, displacements)
            }
        });
        Ok(energies.iter().sum())
    }

    fn compute_reduced_force_matrix(
        &self,
        displacements: &[f64],
        basis: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>> {
        self.check_displacements(displacements)?;
        let projector = ReductionProjector::new(basis, self.num_dofs(), "reduction basis columns")?;
        tracing::debug!(
            reduced_dim = projector.reduced_dim(),
            elements = self.num_elements(),
            "computing reduced force matrix"
        );

        let columns = self.map_elements(|e| {
            let scale = self.factors.scale(e);
            if scale == 0.0 {
                return DVector::zeros(projector.reduced_dim());
            }
            let force = self.kernel.element_force(e, displacements);
            projector.project_vector(&self.kernel.element_dofs(e), &force.force, scale)
        });

        let mut reduced = DMatrix::zeros(projector.reduced_dim(), self.num_elements());
        for (e, column) in columns.iter().enumerate() {
            reduced.set_column(e, column);
        }
        Ok(reduced)
    }

    fn compute_reduced_hessian_matrix(
        &self,
        displacements: &[f64],
        rotation_basis: &DMatrix<f64>,
        stiffness_buffer: &mut StiffnessBuffer,
    ) -> Result<DMatrix<f64>> {
        self.check_displacements(displacements)?;
        let projector =
            ReductionProjector::new(rotation_basis, self.num_dofs(), "rotation basis columns")?;
        stiffness_buffer.check_dimensions(self.num_dofs())?;
        stiffness_buffer.bind(&self.element_dofs())?;
        tracing::debug!(
            reduced_dim = projector.reduced_dim(),
            elements = self.num_elements(),
            nnz = stiffness_buffer.nnz(),
            "computing reduced hessian matrix"
        );

        let tangents = self.scaled_tangents(displacements);
        self.assemble_into(&tangents, stiffness_buffer)?;

        let column_len = projector.block_column_len();
        let columns = self.map_elements(|e| match &tangents[e] {
            (scale, Some(tangent)) => {
                projector.project_block(&self.kernel.element_dofs(e), &tangent.stiffness, *scale)
            }
            (_, None) => DVector::zeros(column_len),
        });

        let mut reduced = DMatrix::zeros(column_len, self.num_elements());
        for (e, column) in columns.iter().enumerate() {
            reduced.set_column(e, column);
        }
        Ok(reduced)
    }

    fn set_element_material_factor(&mut self, factor: &[f64]) -> Result<()> {
        self.factors.set(factor)
    }

    fn element_material_factor(&self, element: usize) -> Result<f64> {
        self.factors.get(element)
    }

    fn clear_element_material_factor(&mut self) {
        self.factors.clear();
    }
}
