//! Polar decomposition F = R·S of a 3×3 deformation gradient.

use nalgebra::Matrix3;

/// Result of a polar decomposition
#[derive(Debug, Clone, Copy)]
pub struct PolarDecomposition {
    /// Proper rotation (det = +1)
    pub rotation: Matrix3<f64>,
    /// Symmetric stretch; has one negative eigenvalue for inverted elements
    pub stretch: Matrix3<f64>,
}

/// Compute F = R·S through the SVD F = U Σ Vᵀ, with R = U Vᵀ and S = V Σ Vᵀ.
///
/// When U Vᵀ is a reflection, the smallest singular value and the matching
/// column of U are negated so that R stays a proper rotation.
///
/// Returns `None` for non-finite input or when the SVD does not produce
/// its factors.
pub fn polar_decomposition(f: &Matrix3<f64>) -> Option<PolarDecomposition> {
    if !f.iter().all(|v| v.is_finite()) {
        return None;
    }

    let svd = f.svd(true, true);
    let (mut u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return None,
    };
    let mut sigma = svd.singular_values;

    if (u * v_t).determinant() < 0.0 {
        let k = sigma.imin();
        let flipped = -u.column(k);
        u.set_column(k, &flipped);
        sigma[k] = -sigma[k];
    }

    Some(PolarDecomposition {
        rotation: u * v_t,
        stretch: v_t.transpose() * Matrix3::from_diagonal(&sigma) * v_t,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Vector3};

    #[test]
    fn recovers_rotation_and_stretch() {
        let q = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.7).into_inner();
        let s = Matrix3::new(1.2, 0.1, 0.0, 0.1, 0.9, 0.05, 0.0, 0.05, 1.1);
        let polar = polar_decomposition(&(q * s)).unwrap();

        assert_relative_eq!(polar.rotation, q, epsilon = 1e-12);
        assert_relative_eq!(polar.stretch, s, epsilon = 1e-12);
    }

    #[test]
    fn inverted_gradient_keeps_proper_rotation() {
        let f = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -0.5));
        let polar = polar_decomposition(&f).unwrap();

        assert_relative_eq!(polar.rotation.determinant(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(polar.rotation * polar.stretch, f, epsilon = 1e-12);
    }

    #[test]
    fn rejects_nan() {
        let mut f = Matrix3::identity();
        f[(1, 2)] = f64::NAN;
        assert!(polar_decomposition(&f).is_none());
    }
}
