//! Tetrahedral mesh model consumed by the reduced corotational solver.
//!
//! The mesh is immutable once built: the solver only reads vertex rest
//! positions, element connectivity and vertex adjacency.

pub mod error;
pub mod mesh;

pub use error::{MeshError, Result};
pub use mesh::{
    DOFS_PER_VERTEX, ELEMENT_DOFS, MeshStatistics, Tetrahedron, TetMesh, VERTICES_PER_ELEMENT,
    Vertex,
};
