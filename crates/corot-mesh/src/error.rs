//! Error types for corot-mesh

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MeshError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("element {element} references vertex {vertex} but the mesh has {num_vertices} vertices")]
    VertexOutOfRange {
        element: usize,
        vertex: usize,
        num_vertices: usize,
    },

    #[error("element {element} repeats vertex {vertex}")]
    RepeatedVertex { element: usize, vertex: usize },

    #[error("element index {index} out of range (mesh has {num_elements} elements)")]
    ElementOutOfRange { index: usize, num_elements: usize },
}
