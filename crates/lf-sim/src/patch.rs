//! Boundary patch geometry.

use lf_case::FacesDef;
use lf_core::PatchId;
use nalgebra::Vector3;

#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub id: PatchId,
    pub name: String,
    areas: Vec<f64>,
    normals: Vec<Vector3<f64>>,
    weights: Vec<f64>,
}

impl Patch {
    /// Build from case geometry; normals are rescaled to unit length.
    pub fn new(id: PatchId, name: &str, faces: &FacesDef) -> Self {
        Self {
            id,
            name: name.to_string(),
            areas: faces.areas.clone(),
            normals: faces
                .normals
                .iter()
                .map(|n| Vector3::from(*n).normalize())
                .collect(),
            weights: vec![1.0; faces.areas.len()],
        }
    }

    pub fn n_faces(&self) -> usize {
        self.areas.len()
    }

    pub fn face_areas(&self) -> &[f64] {
        &self.areas
    }

    /// Dimensionless interpolation weights of the boundary faces; always 1
    /// on a boundary patch.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    /// Total patch area.
    pub fn area(&self) -> f64 {
        self.areas.iter().sum()
    }

    /// Area-weighted mean of `v·n`, the patch-averaged outflow speed.
    pub fn mean_normal_velocity(&self, values: &[Vector3<f64>]) -> f64 {
        let flux: f64 = values
            .iter()
            .zip(&self.normals)
            .zip(&self.areas)
            .map(|((v, n), a)| v.dot(n) * a)
            .sum();
        flux / self.area()
    }
}
