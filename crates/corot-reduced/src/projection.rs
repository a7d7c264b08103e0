//! Projection of element contributions through a reduction basis.
//!
//! An element only touches its own 12 DOFs, so `T · embed(f)` reduces to
//! `Tₑ · f` with `Tₑ` the 12 basis columns at the element's DOFs. The same
//! restriction gives `Rₑ · H · Rₑᵀ` for stiffness blocks.

use crate::error::{ReductionError, Result};
use corot_mesh::ELEMENT_DOFS;
use nalgebra::{DMatrix, DVector};

/// Projects element vectors and blocks through a dense basis with
/// full-space columns
#[derive(Debug, Clone, Copy)]
pub struct ReductionProjector<'a> {
    basis: &'a DMatrix<f64>,
}

impl<'a> ReductionProjector<'a> {
    /// Wrap a basis, checking it spans the full DOF space
    pub fn new(basis: &'a DMatrix<f64>, num_dofs: usize, what: &'static str) -> Result<Self> {
        if basis.ncols() != num_dofs {
            return Err(ReductionError::dimension(what, num_dofs, basis.ncols()));
        }
        Ok(Self { basis })
    }

    /// Number of basis rows
    pub fn reduced_dim(&self) -> usize {
        self.basis.nrows()
    }

    /// Length of a projected block column
    pub fn block_column_len(&self) -> usize {
        self.reduced_dim() * self.reduced_dim()
    }

    fn restrict(&self, dofs: &[usize; ELEMENT_DOFS]) -> DMatrix<f64> {
        self.basis.select_columns(dofs.iter())
    }

    /// `scale · Tₑ · f`
    pub fn project_vector(
        &self,
        dofs: &[usize; ELEMENT_DOFS],
        local: &DVector<f64>,
        scale: f64,
    ) -> DVector<f64> {
        self.restrict(dofs) * local * scale
    }

    /// Column-major flattening of `scale · Rₑ · H · Rₑᵀ`
    pub fn project_block(
        &self,
        dofs: &[usize; ELEMENT_DOFS],
        block: &DMatrix<f64>,
        scale: f64,
    ) -> DVector<f64> {
        let restricted = self.restrict(dofs);
        let reduced = &restricted * block * restricted.transpose() * scale;
        DVector::from_column_slice(reduced.as_slice())
    }
}
