//! Corotational linear 4-node tetrahedron.
//!
//! Each element keeps its rest stiffness K0 = V·Bᵀ·D·B. At the current
//! configuration the deformation gradient F = Σ xₐ ∇Nₐᵀ is split as F = R·S
//! and the element behaves linearly in the rotated frame:
//!
//! ```text
//! d = Rᵀx − X
//! f = R·K0·d
//! E = ½ dᵀ·K0·d
//! ```
//!
//! `WarpMode::Full` differentiates f including dR/dx; `WarpMode::Rotated`
//! keeps only R·K0·Rᵀ; `WarpMode::Linear` skips the rotation entirely.

use crate::config::WarpMode;
use crate::elements::{ElementForce, ElementKernel, ElementTangent, polar_decomposition};
use crate::error::{ReductionError, Result};
use crate::materials::MaterialTable;
use corot_mesh::{ELEMENT_DOFS, TetMesh, VERTICES_PER_ELEMENT};
use nalgebra::{DMatrix, DVector, Matrix3, SMatrix, Vector3};

type Blocks = [Vector3<f64>; VERTICES_PER_ELEMENT];

/// Rest-state data of one element
#[derive(Debug, Clone)]
struct RestElement {
    dofs: [usize; ELEMENT_DOFS],
    positions: Blocks,
    /// Shape function gradients ∇Nₐ in rest coordinates
    gradients: Blocks,
    volume: f64,
    /// Rest stiffness K0 (12 × 12)
    stiffness: DMatrix<f64>,
}

/// Corotational linear tetrahedral element kernel
#[derive(Debug, Clone)]
pub struct CorotationalTet4 {
    elements: Vec<RestElement>,
    num_vertices: usize,
    warp: WarpMode,
}

impl CorotationalTet4 {
    /// Precompute rest gradients and stiffness for every element
    ///
    /// # Errors
    /// - `DimensionMismatch` if the material table does not cover every element
    /// - `DegenerateElement` for (near) zero-volume elements
    /// - `InvalidMaterial` for incomplete or inadmissible materials
    pub fn new(mesh: &TetMesh, materials: &MaterialTable, warp: WarpMode) -> Result<Self> {
        if materials.num_elements() != mesh.num_elements() {
            return Err(ReductionError::dimension(
                "material assignments",
                mesh.num_elements(),
                materials.num_elements(),
            ));
        }

        let elements = (0..mesh.num_elements())
            .map(|e| {
                let material = materials.element_material(e)?;
                Self::rest_element(mesh, e, &material.constitutive_matrix()?)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            elements = elements.len(),
            vertices = mesh.num_vertices(),
            ?warp,
            "precomputed corotational tet4 rest state"
        );

        Ok(Self {
            elements,
            num_vertices: mesh.num_vertices(),
            warp,
        })
    }

    fn rest_element(mesh: &TetMesh, element: usize, d: &SMatrix<f64, 6, 6>) -> Result<RestElement> {
        let positions: Blocks = mesh
            .element_vertices(element)?
            .map(|v| Vector3::from(v.coords()));
        let [p0, p1, p2, p3] = positions;

        let edges = Matrix3::from_columns(&[p1 - p0, p2 - p0, p3 - p0]);
        let volume = edges.determinant() / 6.0;
        let longest = [p1 - p0, p2 - p0, p3 - p0, p2 - p1, p3 - p1, p3 - p2]
            .iter()
            .map(|e| e.norm())
            .fold(0.0, f64::max);

        let degenerate = ReductionError::DegenerateElement { element, volume };
        if volume.abs() <= 1e-12 * longest.powi(3) {
            return Err(degenerate);
        }
        let edges_inv = edges.try_inverse().ok_or(degenerate)?;

        // Rows of Dm⁻¹ are ∇N₁..∇N₃; ∇N₀ closes the partition of unity
        let g1 = edges_inv.row(0).transpose();
        let g2 = edges_inv.row(1).transpose();
        let g3 = edges_inv.row(2).transpose();
        let gradients = [-(g1 + g2 + g3), g1, g2, g3];

        let b = strain_displacement_matrix(&gradients);
        let k0 = b.transpose() * d * b * volume.abs();

        Ok(RestElement {
            dofs: mesh.element_dofs(element)?,
            positions,
            gradients,
            volume: volume.abs(),
            stiffness: DMatrix::from_column_slice(ELEMENT_DOFS, ELEMENT_DOFS, k0.as_slice()),
        })
    }

    pub fn warp(&self) -> WarpMode {
        self.warp
    }

    pub fn set_warp(&mut self, warp: WarpMode) {
        self.warp = warp;
    }

    /// Rest stiffness K0 of an element
    pub fn rest_stiffness(&self, element: usize) -> &DMatrix<f64> {
        &self.elements[element].stiffness
    }

    /// Rest volume of an element
    pub fn rest_volume(&self, element: usize) -> f64 {
        self.elements[element].volume
    }

    fn deformed_positions(rest: &RestElement, displacements: &[f64]) -> Blocks {
        std::array::from_fn(|a| {
            let base = &rest.dofs[3 * a..3 * a + 3];
            rest.positions[a]
                + Vector3::new(
                    displacements[base[0]],
                    displacements[base[1]],
                    displacements[base[2]],
                )
        })
    }

    /// Rotation frame of the element, identity in linear mode
    fn rotation(&self, element: usize, rest: &RestElement, x: &Blocks) -> (Matrix3<f64>, Matrix3<f64>) {
        if self.warp == WarpMode::Linear {
            return (Matrix3::identity(), Matrix3::identity());
        }

        let f = x
            .iter()
            .zip(rest.gradients.iter())
            .fold(Matrix3::zeros(), |acc, (xa, ga)| acc + xa * ga.transpose());

        match polar_decomposition(&f) {
            Some(polar) => (polar.rotation, polar.stretch),
            None => {
                tracing::warn!(element, "polar decomposition failed, using identity rotation");
                (Matrix3::identity(), f)
            }
        }
    }

    /// Corotated local displacement d = Rᵀx − X
    fn local_displacement(rest: &RestElement, r: &Matrix3<f64>, x: &Blocks) -> DVector<f64> {
        let rt = r.transpose();
        stack(&std::array::from_fn(|a| rt * x[a] - rest.positions[a]))
    }

    /// Derivative of the rotation-dependent force terms (zero outside full warp)
    ///
    /// Column j is dR·K0·d + R·K0·dRᵀ·x for a unit perturbation of local DOF j.
    fn rotation_correction(
        element: usize,
        rest: &RestElement,
        r: &Matrix3<f64>,
        s: &Matrix3<f64>,
        x: &Blocks,
        k0_d: &DVector<f64>,
    ) -> DMatrix<f64> {
        let mut correction = DMatrix::zeros(ELEMENT_DOFS, ELEMENT_DOFS);

        // Rᵀ dF − dFᵀ R = [(tr(S) I − S) ω]×  with dR = R [ω]×
        let g = Matrix3::identity() * s.trace() - s;
        let Some(g_inv) = g.try_inverse() else {
            tracing::warn!(element, "singular stretch in rotation derivative, dropping correction");
            return correction;
        };

        let rt = r.transpose();
        for j in 0..ELEMENT_DOFS {
            let (a, c) = (j / 3, j % 3);
            let df = Vector3::ith(c, 1.0) * rest.gradients[a].transpose();
            let m = rt * df - df.transpose() * r;
            let omega = g_inv * Vector3::new(m[(2, 1)], m[(0, 2)], m[(1, 0)]);
            let dr = r * omega.cross_matrix();

            let dr_t = dr.transpose();
            let dr_t_x = stack(&std::array::from_fn(|b| dr_t * x[b]));
            let column = rotate(&dr, k0_d) + rotate(r, &(&rest.stiffness * dr_t_x));
            correction.set_column(j, &column);
        }
        correction
    }
}

impl ElementKernel for CorotationalTet4 {
    fn num_elements(&self) -> usize {
        self.elements.len()
    }

    fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    fn element_dofs(&self, element: usize) -> [usize; ELEMENT_DOFS] {
        self.elements[element].dofs
    }

    fn element_energy(&self, element: usize, displacements: &[f64]) -> f64 {
        let rest = &self.elements[element];
        let x = Self::deformed_positions(rest, displacements);
        let (r, _) = self.rotation(element, rest, &x);
        let d = Self::local_displacement(rest, &r, &x);
        0.5 * d.dot(&(&rest.stiffness * &d))
    }

    fn element_force(&self, element: usize, displacements: &[f64]) -> ElementForce {
        let rest = &self.elements[element];
        let x = Self::deformed_positions(rest, displacements);
        let (r, _) = self.rotation(element, rest, &x);
        let d = Self::local_displacement(rest, &r, &x);

        ElementForce {
            force: rotate(&r, &(&rest.stiffness * d)),
            rotation: r,
        }
    }

    fn element_tangent(&self, element: usize, displacements: &[f64]) -> ElementTangent {
        let rest = &self.elements[element];
        let x = Self::deformed_positions(rest, displacements);
        let (r, s) = self.rotation(element, rest, &x);
        let d = Self::local_displacement(rest, &r, &x);
        let k0_d = &rest.stiffness * d;

        let stiffness = match self.warp {
            WarpMode::Linear => rest.stiffness.clone(),
            WarpMode::Rotated => {
                let rb = block_diagonal(&r);
                &rb * &rest.stiffness * rb.transpose()
            }
            WarpMode::Full => {
                let rb = block_diagonal(&r);
                &rb * &rest.stiffness * rb.transpose()
                    + Self::rotation_correction(element, rest, &r, &s, &x, &k0_d)
            }
        };

        ElementTangent {
            force: rotate(&r, &k0_d),
            stiffness,
            rotation: r,
        }
    }
}

/// Constant strain-displacement matrix B (6 × 12), Voigt `[xx, yy, zz, xy, yz, zx]`
fn strain_displacement_matrix(gradients: &Blocks) -> SMatrix<f64, 6, 12> {
    let mut b = SMatrix::<f64, 6, 12>::zeros();
    for (a, g) in gradients.iter().enumerate() {
        let col = 3 * a;
        b[(0, col)] = g.x;
        b[(1, col + 1)] = g.y;
        b[(2, col + 2)] = g.z;
        b[(3, col)] = g.y;
        b[(3, col + 1)] = g.x;
        b[(4, col + 1)] = g.z;
        b[(4, col + 2)] = g.y;
        b[(5, col + 2)] = g.x;
        b[(5, col)] = g.z;
    }
    b
}

fn stack(blocks: &Blocks) -> DVector<f64> {
    DVector::from_iterator(ELEMENT_DOFS, blocks.iter().flat_map(|v| v.iter().copied()))
}

/// Apply a 3×3 frame to every vertex block of a 12-vector
fn rotate(r: &Matrix3<f64>, v: &DVector<f64>) -> DVector<f64> {
    stack(&std::array::from_fn(|a| {
        r * Vector3::new(v[3 * a], v[3 * a + 1], v[3 * a + 2])
    }))
}

fn block_diagonal(r: &Matrix3<f64>) -> DMatrix<f64> {
    let mut m = DMatrix::zeros(ELEMENT_DOFS, ELEMENT_DOFS);
    for a in 0..VERTICES_PER_ELEMENT {
        m.fixed_view_mut::<3, 3>(3 * a, 3 * a).copy_from(r);
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::Material;
    use approx::assert_relative_eq;
    use corot_mesh::Vertex;
    use nalgebra::Rotation3;

    fn single_tet() -> TetMesh {
        let mut mesh = TetMesh::new();
        mesh.add_vertex(Vertex::new(0.0, 0.0, 0.0));
        mesh.add_vertex(Vertex::new(1.0, 0.0, 0.0));
        mesh.add_vertex(Vertex::new(0.0, 1.0, 0.0));
        mesh.add_vertex(Vertex::new(0.0, 0.0, 1.0));
        mesh.add_element([0, 1, 2, 3]).unwrap();
        mesh
    }

    fn kernel(warp: WarpMode) -> CorotationalTet4 {
        let mesh = single_tet();
        let materials = MaterialTable::uniform(Material::elastic("SOFT", 1000.0, 0.3), 1);
        CorotationalTet4::new(&mesh, &materials, warp).unwrap()
    }

    /// Vertex positions of the single tet, flattened
    fn rest_positions() -> Vec<f64> {
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
    }

    fn stretched() -> Vec<f64> {
        vec![
            0.01, -0.02, 0.0, 0.15, 0.03, -0.01, -0.02, 0.08, 0.04, 0.05, -0.03, 0.12,
        ]
    }

    #[test]
    fn rest_stiffness_is_symmetric_and_kills_translation() {
        let k = kernel(WarpMode::Full);
        let k0 = k.rest_stiffness(0);

        assert_relative_eq!(k0.clone(), k0.transpose(), epsilon = 1e-9);
        assert_relative_eq!(k.rest_volume(0), 1.0 / 6.0, epsilon = 1e-15);

        let translation = DVector::from_iterator(12, (0..12).map(|i| [0.3, -0.2, 0.5][i % 3]));
        let residual = k0 * translation;
        assert!(residual.amax() < 1e-10, "residual = {}", residual.amax());
    }

    #[test]
    fn rigid_rotation_stores_no_energy() {
        let k = kernel(WarpMode::Full);
        let q = Rotation3::from_euler_angles(0.4, -1.1, 2.0);
        let rest = rest_positions();
        let u: Vec<f64> = (0..4)
            .flat_map(|a| {
                let p = Vector3::new(rest[3 * a], rest[3 * a + 1], rest[3 * a + 2]);
                let moved = q * p + Vector3::new(0.5, 0.0, -1.0) - p;
                [moved.x, moved.y, moved.z]
            })
            .collect();

        assert!(k.element_energy(0, &u).abs() < 1e-10);
        let force = k.element_force(0, &u);
        assert!(force.force.amax() < 1e-10);
        assert_relative_eq!(force.rotation, q.into_inner(), epsilon = 1e-10);
    }

    #[test]
    fn linear_mode_matches_k0_times_u() {
        let k = kernel(WarpMode::Linear);
        let u = stretched();
        let expected = k.rest_stiffness(0) * DVector::from_column_slice(&u);

        let tangent = k.element_tangent(0, &u);
        assert_relative_eq!(tangent.force, expected, epsilon = 1e-10);
        assert_relative_eq!(tangent.stiffness, k.rest_stiffness(0).clone(), epsilon = 1e-12);
        assert_eq!(tangent.rotation, Matrix3::identity());
    }

    #[test]
    fn full_tangent_matches_finite_difference() {
        let k = kernel(WarpMode::Full);
        let u = stretched();
        let tangent = k.element_tangent(0, &u);
        let h = 1e-6;

        for j in 0..12 {
            let mut plus = u.clone();
            let mut minus = u.clone();
            plus[j] += h;
            minus[j] -= h;
            let fd = (k.element_force(0, &plus).force - k.element_force(0, &minus).force) / (2.0 * h);
            for i in 0..12 {
                assert_relative_eq!(tangent.stiffness[(i, j)], fd[i], epsilon = 1e-4, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn rotated_tangent_omits_rotation_derivative() {
        let full = kernel(WarpMode::Full).element_tangent(0, &stretched());
        let rotated = kernel(WarpMode::Rotated).element_tangent(0, &stretched());

        assert_relative_eq!(full.force, rotated.force, epsilon = 1e-12);
        let difference = (&full.stiffness - &rotated.stiffness).amax();
        assert!(difference > 1e-6, "expected a rotation correction, got {}", difference);
    }

    #[test]
    fn degenerate_element_is_rejected() {
        let mut mesh = TetMesh::new();
        mesh.add_vertex(Vertex::new(0.0, 0.0, 0.0));
        mesh.add_vertex(Vertex::new(1.0, 0.0, 0.0));
        mesh.add_vertex(Vertex::new(0.0, 1.0, 0.0));
        mesh.add_vertex(Vertex::new(1.0, 1.0, 0.0));
        mesh.add_element([0, 1, 2, 3]).unwrap();
        let materials = MaterialTable::uniform(Material::elastic("M", 1.0, 0.3), 1);

        let err = CorotationalTet4::new(&mesh, &materials, WarpMode::Full).unwrap_err();
        assert!(matches!(err, ReductionError::DegenerateElement { element: 0, .. }));
    }

    #[test]
    fn material_table_must_cover_mesh() {
        let materials = MaterialTable::uniform(Material::elastic("M", 1.0, 0.3), 2);
        let err = CorotationalTet4::new(&single_tet(), &materials, WarpMode::Full).unwrap_err();
        assert!(matches!(
            err,
            ReductionError::DimensionMismatch { expected: 1, actual: 2, .. }
        ));
    }
}
