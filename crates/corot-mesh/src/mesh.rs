//! Mesh data structures for tetrahedral finite element models.
//!
//! Vertices and elements are addressed by 0-based position. Every vertex
//! carries three translational DOFs, so vertex `v` owns global DOFs
//! `3v`, `3v + 1` and `3v + 2`.

use crate::error::{MeshError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Translational DOFs per vertex (ux, uy, uz)
pub const DOFS_PER_VERTEX: usize = 3;
/// Vertices per linear tetrahedron
pub const VERTICES_PER_ELEMENT: usize = 4;
/// DOFs per linear tetrahedron
pub const ELEMENT_DOFS: usize = DOFS_PER_VERTEX * VERTICES_PER_ELEMENT;

/// A vertex of the undeformed (rest) mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Get coordinates as an array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// A 4-node tetrahedron, vertex indices into the mesh vertex array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tetrahedron {
    pub vertices: [usize; VERTICES_PER_ELEMENT],
}

impl Tetrahedron {
    pub fn new(vertices: [usize; VERTICES_PER_ELEMENT]) -> Self {
        Self { vertices }
    }

    /// Global DOF indices in vertex-major order: `[v0x, v0y, v0z, v1x, ...]`
    pub fn dof_indices(&self) -> [usize; ELEMENT_DOFS] {
        let mut dofs = [0usize; ELEMENT_DOFS];
        for (local, &vertex) in self.vertices.iter().enumerate() {
            for axis in 0..DOFS_PER_VERTEX {
                dofs[local * DOFS_PER_VERTEX + axis] = vertex * DOFS_PER_VERTEX + axis;
            }
        }
        dofs
    }
}

/// Tetrahedral mesh: rest-shape vertices plus element connectivity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TetMesh {
    vertices: Vec<Vertex>,
    elements: Vec<Tetrahedron>,
}

impl TetMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mesh from vertex and element arrays, validating connectivity
    pub fn from_parts(vertices: Vec<Vertex>, elements: Vec<Tetrahedron>) -> Result<Self> {
        let mesh = Self { vertices, elements };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> usize {
        self.vertices.push(vertex);
        self.vertices.len() - 1
    }

    /// Add an element and return its index
    ///
    /// Vertices must already exist and must be pairwise distinct.
    pub fn add_element(&mut self, vertices: [usize; VERTICES_PER_ELEMENT]) -> Result<usize> {
        let element = Tetrahedron::new(vertices);
        let index = self.elements.len();
        self.check_element(index, &element)?;
        self.elements.push(element);
        Ok(index)
    }

    fn check_element(&self, index: usize, element: &Tetrahedron) -> Result<()> {
        for (slot, &vertex) in element.vertices.iter().enumerate() {
            if vertex >= self.vertices.len() {
                return Err(MeshError::VertexOutOfRange {
                    element: index,
                    vertex,
                    num_vertices: self.vertices.len(),
                });
            }
            if element.vertices[..slot].contains(&vertex) {
                return Err(MeshError::RepeatedVertex {
                    element: index,
                    vertex,
                });
            }
        }
        Ok(())
    }

    /// Validate every element against the vertex array
    ///
    /// Meshes built through `add_element` are always valid; deserialized
    /// meshes should be checked before use.
    pub fn validate(&self) -> Result<()> {
        self.elements
            .iter()
            .enumerate()
            .try_for_each(|(index, element)| self.check_element(index, element))
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Total degrees of freedom (3 per vertex)
    pub fn num_dofs(&self) -> usize {
        self.vertices.len() * DOFS_PER_VERTEX
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn elements(&self) -> &[Tetrahedron] {
        &self.elements
    }

    /// Get an element by index
    pub fn element(&self, index: usize) -> Result<&Tetrahedron> {
        self.elements
            .get(index)
            .ok_or(MeshError::ElementOutOfRange {
                index,
                num_elements: self.elements.len(),
            })
    }

    /// Rest positions of the element's four vertices
    pub fn element_vertices(&self, index: usize) -> Result<[Vertex; VERTICES_PER_ELEMENT]> {
        let element = self.element(index)?;
        Ok(element.vertices.map(|v| self.vertices[v]))
    }

    /// Global DOF indices of an element
    pub fn element_dofs(&self, index: usize) -> Result<[usize; ELEMENT_DOFS]> {
        Ok(self.element(index)?.dof_indices())
    }

    /// Signed rest volume of an element
    ///
    /// Positive when (v1 - v0, v2 - v0, v3 - v0) is right-handed.
    pub fn signed_volume(&self, index: usize) -> Result<f64> {
        let [p0, p1, p2, p3] = self.element_vertices(index)?;
        let a = [p1.x - p0.x, p1.y - p0.y, p1.z - p0.z];
        let b = [p2.x - p0.x, p2.y - p0.y, p2.z - p0.z];
        let c = [p3.x - p0.x, p3.y - p0.y, p3.z - p0.z];
        let triple = a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0]);
        Ok(triple / 6.0)
    }

    /// For each vertex, the sorted set of vertices sharing an element with it
    /// (the vertex itself included)
    pub fn vertex_neighbors(&self) -> Vec<BTreeSet<usize>> {
        let mut neighbors = vec![BTreeSet::new(); self.vertices.len()];
        for element in &self.elements {
            for &a in &element.vertices {
                neighbors[a].extend(element.vertices.iter().copied());
            }
        }
        neighbors
    }

    /// Get mesh statistics
    pub fn statistics(&self) -> MeshStatistics {
        let volumes: Vec<f64> = (0..self.elements.len())
            .filter_map(|i| self.signed_volume(i).ok())
            .collect();

        MeshStatistics {
            num_vertices: self.vertices.len(),
            num_elements: self.elements.len(),
            num_dofs: self.num_dofs(),
            total_volume: volumes.iter().map(|v| v.abs()).sum(),
            min_volume: volumes.iter().map(|v| v.abs()).fold(f64::INFINITY, f64::min),
            num_inverted: volumes.iter().filter(|&&v| v < 0.0).count(),
        }
    }
}

/// Mesh statistics for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct MeshStatistics {
    pub num_vertices: usize,
    pub num_elements: usize,
    pub num_dofs: usize,
    /// Sum of absolute element volumes
    pub total_volume: f64,
    /// Smallest absolute element volume (infinity for an empty mesh)
    pub min_volume: f64,
    /// Elements with negative orientation
    pub num_inverted: usize,
}

impl MeshStatistics {
    /// Format as a human-readable string
    pub fn format(&self) -> String {
        [
            format!("Vertices: {}", self.num_vertices),
            format!("Elements: {}", self.num_elements),
            format!("DOFs: {}", self.num_dofs),
            format!("Volume: {:.6e}", self.total_volume),
            format!("Min element volume: {:.6e}", self.min_volume),
            format!("Inverted elements: {}", self.num_inverted),
        ]
        .join("\n")
    }
}
