//! Material properties for corotational linear elasticity.

use crate::error::{ReductionError, Result};
use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};

/// An isotropic linear-elastic material
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Material {
    /// Material name
    pub name: String,
    /// Young's modulus (E)
    pub elastic_modulus: Option<f64>,
    /// Poisson's ratio (ν)
    pub poissons_ratio: Option<f64>,
    /// Density (ρ), unused by the stiffness path
    pub density: Option<f64>,
}

impl Material {
    /// Create a new material with a given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a fully specified elastic material
    pub fn elastic(name: impl Into<String>, elastic_modulus: f64, poissons_ratio: f64) -> Self {
        Self {
            name: name.into(),
            elastic_modulus: Some(elastic_modulus),
            poissons_ratio: Some(poissons_ratio),
            density: None,
        }
    }

    /// Check if material has minimum required properties for structural analysis
    pub fn is_valid_for_structural(&self) -> bool {
        matches!(
            (self.elastic_modulus, self.poissons_ratio),
            (Some(e), Some(nu)) if e > 0.0 && e.is_finite() && nu > -1.0 && nu < 0.5
        )
    }

    fn elastic_constants(&self) -> Result<(f64, f64)> {
        let e = self
            .elastic_modulus
            .ok_or_else(|| ReductionError::InvalidMaterial(format!("{}: missing elastic modulus", self.name)))?;
        let nu = self
            .poissons_ratio
            .ok_or_else(|| ReductionError::InvalidMaterial(format!("{}: missing Poisson's ratio", self.name)))?;
        if !self.is_valid_for_structural() {
            return Err(ReductionError::InvalidMaterial(format!(
                "{}: E = {}, nu = {} outside the admissible range",
                self.name, e, nu
            )));
        }
        Ok((e, nu))
    }

    /// Lamé parameters (λ, μ)
    pub fn lame_parameters(&self) -> Result<(f64, f64)> {
        let (e, nu) = self.elastic_constants()?;
        let lambda = e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let mu = e / (2.0 * (1.0 + nu));
        Ok((lambda, mu))
    }

    /// Constitutive matrix D for 3D isotropic elasticity, {σ} = [D]{ε}
    ///
    /// Voigt order `[εxx, εyy, εzz, γxy, γyz, γzx]` with engineering shear strain.
    pub fn constitutive_matrix(&self) -> Result<SMatrix<f64, 6, 6>> {
        let (lambda, mu) = self.lame_parameters()?;

        let mut d = SMatrix::<f64, 6, 6>::zeros();
        for i in 0..3 {
            for j in 0..3 {
                d[(i, j)] = lambda;
            }
            d[(i, i)] = lambda + 2.0 * mu;
            d[(i + 3, i + 3)] = mu;
        }
        Ok(d)
    }
}

/// Materials and their element assignments
#[derive(Debug, Clone)]
pub struct MaterialTable {
    materials: Vec<Material>,
    element_materials: Vec<usize>,
}

impl MaterialTable {
    /// Assign one material to every element
    pub fn uniform(material: Material, num_elements: usize) -> Self {
        Self {
            materials: vec![material],
            element_materials: vec![0; num_elements],
        }
    }

    /// Build from a material list and a per-element index into it
    pub fn with_assignments(materials: Vec<Material>, element_materials: Vec<usize>) -> Result<Self> {
        if let Some(&bad) = element_materials.iter().find(|&&m| m >= materials.len()) {
            return Err(ReductionError::InvalidMaterial(format!(
                "material index {} out of range ({} materials)",
                bad,
                materials.len()
            )));
        }
        Ok(Self {
            materials,
            element_materials,
        })
    }

    pub fn num_elements(&self) -> usize {
        self.element_materials.len()
    }

    /// Get the material for an element
    pub fn element_material(&self, element: usize) -> Result<&Material> {
        let index = self
            .element_materials
            .get(element)
            .ok_or(ReductionError::IndexOutOfRange {
                index: element,
                len: self.element_materials.len(),
            })?;
        Ok(&self.materials[*index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lame_parameters_of_steel() {
        let steel = Material::elastic("STEEL", 210_000.0, 0.3);
        let (lambda, mu) = steel.lame_parameters().unwrap();
        assert!((mu - 80_769.230_769).abs() < 1e-3);
        assert!((lambda - 121_153.846_154).abs() < 1e-3);
    }

    #[test]
    fn constitutive_matrix_is_symmetric_with_shear_diagonal() {
        let d = Material::elastic("M", 1000.0, 0.25).constitutive_matrix().unwrap();
        assert_eq!(d, d.transpose());
        assert!((d[(3, 3)] - 400.0).abs() < 1e-12);
        assert_eq!(d[(0, 3)], 0.0);
    }

    #[test]
    fn missing_properties_are_rejected() {
        let err = Material::new("EMPTY").constitutive_matrix().unwrap_err();
        assert!(err.to_string().contains("missing elastic modulus"));

        let incompressible = Material::elastic("RUBBER", 1.0, 0.5);
        assert!(!incompressible.is_valid_for_structural());
        assert!(incompressible.lame_parameters().is_err());
    }

    #[test]
    fn table_lookup() {
        let table = MaterialTable::with_assignments(
            vec![Material::elastic("A", 1.0, 0.3), Material::elastic("B", 2.0, 0.3)],
            vec![1, 0],
        )
        .unwrap();
        assert_eq!(table.element_material(0).unwrap().name, "B");
        assert!(matches!(
            table.element_material(2),
            Err(ReductionError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(MaterialTable::with_assignments(vec![], vec![0]).is_err());
    }
}
