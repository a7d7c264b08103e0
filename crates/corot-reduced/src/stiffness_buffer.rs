//! Sparse stiffness buffer with a fixed nonzero pattern.
//!
//! The CSR pattern is established once (usually from mesh adjacency) and
//! then reused for every assembly. For each element the buffer caches the
//! positions of its 12 × 12 block inside the CSR value array, so repeated
//! assemblies only add into known slots.

use crate::error::{ReductionError, Result};
use corot_mesh::{DOFS_PER_VERTEX, ELEMENT_DOFS, TetMesh};
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use nalgebra_sparse::pattern::SparsityPattern;

const BLOCK_ENTRIES: usize = ELEMENT_DOFS * ELEMENT_DOFS;

/// Caller-owned CSR stiffness matrix reused across assemblies
#[derive(Debug, Clone)]
pub struct StiffnessBuffer {
    matrix: CsrMatrix<f64>,
    /// Element DOF lists the slot cache was resolved for
    bound_elements: Vec<[usize; ELEMENT_DOFS]>,
    /// Per element, CSR value index of local entry (i, j) at `i * 12 + j`
    element_slots: Vec<[usize; BLOCK_ENTRIES]>,
}

impl StiffnessBuffer {
    /// Wrap an existing CSR matrix; its pattern is kept as is
    pub fn from_csr(matrix: CsrMatrix<f64>) -> Self {
        Self {
            matrix,
            bound_elements: Vec::new(),
            element_slots: Vec::new(),
        }
    }

    /// Build the pattern coupling every pair of vertices that share an element
    pub fn for_mesh(mesh: &TetMesh) -> Result<Self> {
        let num_dofs = mesh.num_dofs();
        let neighbors = mesh.vertex_neighbors();

        let mut offsets = Vec::with_capacity(num_dofs + 1);
        let mut indices = Vec::new();
        offsets.push(0);
        for vertex_neighbors in &neighbors {
            for _axis in 0..DOFS_PER_VERTEX {
                for &w in vertex_neighbors {
                    indices.extend((0..DOFS_PER_VERTEX).map(|b| w * DOFS_PER_VERTEX + b));
                }
                offsets.push(indices.len());
            }
        }

        let nnz = indices.len();
        let pattern = SparsityPattern::try_from_offsets_and_indices(num_dofs, num_dofs, offsets, indices)
            .map_err(|e| ReductionError::InvalidPattern(format!("{:?}", e)))?;
        let matrix = CsrMatrix::try_from_pattern_and_values(pattern, vec![0.0; nnz])
            .map_err(|e| ReductionError::InvalidPattern(format!("{:?}", e)))?;

        tracing::debug!(num_dofs, nnz, "built stiffness pattern from mesh adjacency");
        Ok(Self::from_csr(matrix))
    }

    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    pub fn into_matrix(self) -> CsrMatrix<f64> {
        self.matrix
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Check the buffer is `num_dofs × num_dofs`
    pub fn check_dimensions(&self, num_dofs: usize) -> Result<()> {
        if self.nrows() != num_dofs {
            return Err(ReductionError::dimension("stiffness buffer rows", num_dofs, self.nrows()));
        }
        if self.ncols() != num_dofs {
            return Err(ReductionError::dimension("stiffness buffer columns", num_dofs, self.ncols()));
        }
        Ok(())
    }

    /// Position of (row, col) in the CSR value array
    fn slot(&self, row: usize, col: usize) -> Option<usize> {
        let offsets = self.matrix.row_offsets();
        if row + 1 >= offsets.len() {
            return None;
        }
        let (start, end) = (offsets[row], offsets[row + 1]);
        self.matrix.col_indices()[start..end]
            .binary_search(&col)
            .ok()
            .map(|pos| start + pos)
    }

    /// Resolve (or reuse) the value slots of every element
    ///
    /// Fails with `PatternMismatch` on the first entry the pattern cannot hold;
    /// the previous cache and all values are left untouched in that case.
    pub fn bind(&mut self, element_dofs: &[[usize; ELEMENT_DOFS]]) -> Result<()> {
        if self.bound_elements.as_slice() == element_dofs {
            return Ok(());
        }

        let slots = element_dofs
            .iter()
            .enumerate()
            .map(|(element, dofs)| {
                let mut slots = [0usize; BLOCK_ENTRIES];
                for (i, &row) in dofs.iter().enumerate() {
                    for (j, &col) in dofs.iter().enumerate() {
                        slots[i * ELEMENT_DOFS + j] = self
                            .slot(row, col)
                            .ok_or(ReductionError::PatternMismatch { element, row, col })?;
                    }
                }
                Ok(slots)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(elements = element_dofs.len(), "resolved stiffness pattern slots");
        self.bound_elements = element_dofs.to_vec();
        self.element_slots = slots;
        Ok(())
    }

    /// Zero every stored value, keeping the pattern
    pub fn reset_values(&mut self) {
        self.matrix.values_mut().fill(0.0);
    }

    /// Add `scale * block` into the bound slots of `element`
    pub fn scatter(&mut self, element: usize, block: &DMatrix<f64>, scale: f64) -> Result<()> {
        let slots = self
            .element_slots
            .get(element)
            .ok_or(ReductionError::IndexOutOfRange {
                index: element,
                len: self.element_slots.len(),
            })?;
        if block.shape() != (ELEMENT_DOFS, ELEMENT_DOFS) {
            return Err(ReductionError::dimension("element block rows", ELEMENT_DOFS, block.nrows()));
        }

        let values = self.matrix.values_mut();
        for i in 0..ELEMENT_DOFS {
            for j in 0..ELEMENT_DOFS {
                values[slots[i * ELEMENT_DOFS + j]] += scale * block[(i, j)];
            }
        }
        Ok(())
    }

    /// Stored value at (row, col); `None` outside the pattern
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.slot(row, col).map(|s| self.matrix.values()[s])
    }

    /// Matrix-vector product K·x
    pub fn multiply(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.ncols() {
            return Err(ReductionError::dimension("vector length", self.ncols(), x.len()));
        }
        Ok(self
            .matrix
            .row_iter()
            .map(|row| {
                row.col_indices()
                    .iter()
                    .zip(row.values())
                    .map(|(&col, &value)| value * x[col])
                    .sum::<f64>()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corot_mesh::{Tetrahedron, Vertex};

    fn two_tets() -> TetMesh {
        let mut mesh = TetMesh::new();
        mesh.add_vertex(Vertex::new(0.0, 0.0, 0.0));
        mesh.add_vertex(Vertex::new(1.0, 0.0, 0.0));
        mesh.add_vertex(Vertex::new(0.0, 1.0, 0.0));
        mesh.add_vertex(Vertex::new(0.0, 0.0, 1.0));
        mesh.add_vertex(Vertex::new(1.0, 1.0, 1.0));
        mesh.add_element([0, 1, 2, 3]).unwrap();
        mesh.add_element([1, 2, 3, 4]).unwrap();
        mesh
    }

    fn element_dofs(mesh: &TetMesh) -> Vec<[usize; ELEMENT_DOFS]> {
        mesh.elements().iter().map(|e| e.dof_indices()).collect()
    }

    #[test]
    fn mesh_pattern_couples_shared_vertices_only() {
        let mesh = two_tets();
        let buffer = StiffnessBuffer::for_mesh(&mesh).unwrap();

        assert_eq!(buffer.nrows(), 15);
        // vertices 0 and 4 have 4 neighbors, 1..3 have 5
        assert_eq!(buffer.nnz(), 3 * 3 * (4 + 4 + 5 + 5 + 5));
        assert_eq!(buffer.get(0, 12), None);
        assert_eq!(buffer.get(3, 14), Some(0.0));
    }

    #[test]
    fn scatter_accumulates_into_shared_slots() {
        let mesh = two_tets();
        let mut buffer = StiffnessBuffer::for_mesh(&mesh).unwrap();
        buffer.bind(&element_dofs(&mesh)).unwrap();

        let ones = DMatrix::from_element(12, 12, 1.0);
        buffer.scatter(0, &ones, 1.0).unwrap();
        buffer.scatter(1, &ones, 0.5).unwrap();

        assert_eq!(buffer.get(0, 0), Some(1.0));
        assert_eq!(buffer.get(3, 6), Some(1.5));
        assert_eq!(buffer.get(12, 12), Some(0.5));

        buffer.reset_values();
        assert!(buffer.matrix().values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn missing_slot_is_pattern_mismatch() {
        let mesh = two_tets();
        let mut buffer = StiffnessBuffer::for_mesh(&mesh).unwrap();

        let mut dofs = element_dofs(&mesh);
        dofs[1] = Tetrahedron::new([0, 2, 3, 4]).dof_indices();
        let err = buffer.bind(&dofs).unwrap_err();
        assert!(matches!(
            err,
            ReductionError::PatternMismatch { element: 1, row: 0, col: 12 }
        ));
        assert!(buffer.scatter(0, &DMatrix::zeros(12, 12), 1.0).is_err());
    }

    #[test]
    fn multiply_uses_stored_values() {
        let mesh = two_tets();
        let mut buffer = StiffnessBuffer::for_mesh(&mesh).unwrap();
        buffer.bind(&element_dofs(&mesh)).unwrap();
        buffer
            .scatter(0, &DMatrix::identity(12, 12), 2.0)
            .unwrap();

        let x: Vec<f64> = (0..15).map(|i| i as f64).collect();
        let y = buffer.multiply(&x).unwrap();
        assert_eq!(y[5], 10.0);
        assert_eq!(y[13], 0.0);
        assert!(buffer.multiply(&[1.0]).is_err());
    }
}
