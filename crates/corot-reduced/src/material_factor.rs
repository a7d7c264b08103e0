//! Per-element material stiffness factors.

use crate::error::{ReductionError, Result};

/// Per-element multiplier on energy, force and stiffness contributions
///
/// Every element reads 1.0 until a full table is set.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialFactorTable {
    num_elements: usize,
    factors: Option<Vec<f64>>,
}

impl MaterialFactorTable {
    pub fn new(num_elements: usize) -> Self {
        Self {
            num_elements,
            factors: None,
        }
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// Whether a factor table is currently stored
    pub fn is_set(&self) -> bool {
        self.factors.is_some()
    }

    /// Replace the whole table
    ///
    /// Nothing is applied unless the length matches the element count and
    /// every entry is finite and non-negative.
    pub fn set(&mut self, factor: &[f64]) -> Result<()> {
        if factor.len() != self.num_elements {
            return Err(ReductionError::dimension(
                "material factor length",
                self.num_elements,
                factor.len(),
            ));
        }
        if let Some((index, &value)) = factor
            .iter()
            .enumerate()
            .find(|&(_, &v)| !(v.is_finite() && v >= 0.0))
        {
            return Err(ReductionError::InvalidMaterialFactor { index, value });
        }

        self.factors = Some(factor.to_vec());
        Ok(())
    }

    /// Factor of element `index`
    pub fn get(&self, index: usize) -> Result<f64> {
        if index >= self.num_elements {
            return Err(ReductionError::IndexOutOfRange {
                index,
                len: self.num_elements,
            });
        }
        Ok(self.scale(index))
    }

    /// Reset to the unscaled default
    pub fn clear(&mut self) {
        self.factors = None;
    }

    /// Factor of an element already known to be in range
    pub(crate) fn scale(&self, index: usize) -> f64 {
        self.factors.as_ref().map_or(1.0, |f| f[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_unit_factor() {
        let table = MaterialFactorTable::new(3);
        assert!(!table.is_set());
        assert_eq!(table.get(2).unwrap(), 1.0);
    }

    #[test]
    fn set_then_clear() {
        let mut table = MaterialFactorTable::new(2);
        table.set(&[0.5, 3.0]).unwrap();
        assert_eq!(table.get(0).unwrap(), 0.5);
        assert_eq!(table.get(1).unwrap(), 3.0);

        table.clear();
        assert_eq!(table.get(0).unwrap(), 1.0);
        assert_eq!(table.get(1).unwrap(), 1.0);
    }

    #[test]
    fn wrong_length_keeps_previous_table() {
        let mut table = MaterialFactorTable::new(2);
        table.set(&[2.0, 0.0]).unwrap();

        let err = table.set(&[1.0, 1.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            ReductionError::DimensionMismatch { expected: 2, actual: 3, .. }
        ));
        assert_eq!(table.get(0).unwrap(), 2.0);
        assert_eq!(table.get(1).unwrap(), 0.0);
    }

    #[test]
    fn negative_or_nan_factor_rejected() {
        let mut table = MaterialFactorTable::new(2);
        assert!(matches!(
            table.set(&[1.0, -0.1]),
            Err(ReductionError::InvalidMaterialFactor { index: 1, .. })
        ));
        assert!(table.set(&[f64::NAN, 1.0]).is_err());
        assert!(!table.is_set());
    }

    #[test]
    fn index_out_of_range() {
        let table = MaterialFactorTable::new(2);
        assert!(matches!(
            table.get(2),
            Err(ReductionError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }
}
