//! Named host fields, looked up by patch.
//!
//! Stands in for the flow solver's object registry: scalar face fields are
//! stored per parallel partition of each patch, vector fields hold the
//! patch-internal (cell-adjacent) values, and scalar properties such as `rho`
//! are global.

use crate::error::{SimError, SimResult};
use nalgebra::Vector3;
use rayon::prelude::*;
use std::collections::HashMap;

type PatchMap<T> = HashMap<String, T>;

#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    face_scalars: HashMap<String, PatchMap<Vec<Vec<f64>>>>,
    internal_vectors: HashMap<String, PatchMap<Vec<Vector3<f64>>>>,
    properties: HashMap<String, f64>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a scalar face field on `patch`, one slice per partition.
    pub fn set_face_scalar(&mut self, field: &str, patch: &str, partitions: Vec<Vec<f64>>) {
        self.face_scalars
            .entry(field.to_string())
            .or_default()
            .insert(patch.to_string(), partitions);
    }

    pub fn set_patch_internal(&mut self, field: &str, patch: &str, values: Vec<Vector3<f64>>) {
        self.internal_vectors
            .entry(field.to_string())
            .or_default()
            .insert(patch.to_string(), values);
    }

    pub fn set_property(&mut self, name: &str, value: f64) {
        self.properties.insert(name.to_string(), value);
    }

    pub fn property(&self, name: &str) -> Option<f64> {
        self.properties.get(name).copied()
    }

    fn partitions(&self, field: &str, patch: &str) -> SimResult<&[Vec<f64>]> {
        self.face_scalars
            .get(field)
            .and_then(|by_patch| by_patch.get(patch))
            .map(Vec::as_slice)
            .ok_or_else(|| SimError::MissingField {
                field: field.to_string(),
                patch: patch.to_string(),
            })
    }

    /// Total of `field` over every partition of `patch`.
    ///
    /// Partition sums run in parallel; the partials are then added in
    /// partition order so the result does not depend on scheduling.
    pub fn patch_sum(&self, field: &str, patch: &str) -> SimResult<f64> {
        let partials: Vec<f64> = self
            .partitions(field, patch)?
            .par_iter()
            .map(|part| part.iter().sum::<f64>())
            .collect();
        Ok(partials.iter().sum())
    }

    /// Face values of `field` on `patch`, partitions concatenated in order.
    pub fn face_values(&self, field: &str, patch: &str) -> SimResult<Vec<f64>> {
        Ok(self.partitions(field, patch)?.concat())
    }

    pub fn patch_internal(&self, field: &str, patch: &str) -> SimResult<&[Vector3<f64>]> {
        self.internal_vectors
            .get(field)
            .and_then(|by_patch| by_patch.get(patch))
            .map(Vec::as_slice)
            .ok_or_else(|| SimError::MissingField {
                field: field.to_string(),
                patch: patch.to_string(),
            })
    }
}

/// Split `n` faces into `parts` contiguous, near-equal ranges.
pub fn partition_ranges(n: usize, parts: usize) -> Vec<std::ops::Range<usize>> {
    let parts = parts.clamp(1, n.max(1));
    let base = n / parts;
    let extra = n % parts;
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flux_is_summed_over_partitions() {
        let mut reg = FieldRegistry::new();
        reg.set_face_scalar("phi", "outlet", vec![vec![1.0, 2.0], vec![3.0], vec![]]);
        assert_eq!(reg.patch_sum("phi", "outlet").unwrap(), 6.0);
        assert_eq!(
            reg.face_values("phi", "outlet").unwrap(),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn missing_field_names_field_and_patch() {
        let mut reg = FieldRegistry::new();
        reg.set_face_scalar("phi", "outlet", vec![vec![1.0]]);
        let err = reg.patch_sum("phiMean", "outlet").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("phiMean") && msg.contains("outlet"));
        assert!(reg.patch_sum("phi", "inlet").is_err());
        assert!(reg.patch_internal("U", "outlet").is_err());
    }

    #[test]
    fn partition_ranges_cover_all_faces() {
        let ranges = partition_ranges(7, 3);
        assert_eq!(ranges, vec![0..3, 3..5, 5..7]);
        assert_eq!(partition_ranges(2, 5).len(), 2);
        assert_eq!(partition_ranges(0, 4), vec![0..0]);
    }

    #[test]
    fn properties() {
        let mut reg = FieldRegistry::new();
        assert!(reg.property("rho").is_none());
        reg.set_property("rho", 1060.0);
        assert_eq!(reg.property("rho"), Some(1060.0));
    }
}
