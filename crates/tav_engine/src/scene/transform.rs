//! Entity transforms and per-instance model matrices
//!
//! A [`Transform`] stores position, an axis-angle rotation in degrees and a
//! scale, and caches the model matrix built from them:
//!
//! ```text
//! model = translate(position) * rotate(angle, axis) * scale(effective_scale)
//! ```
//!
//! Every setter marks the cache dirty, so the matrix is never read stale after
//! a mutation. An all-zero scale means "unset" and renders at unit scale.

use crate::foundation::math::{utils, Mat3, Mat4, Mat4Ext, Quat, Vec3};
use crate::scene::bounds::BoundingBox;

/// Position, rotation and scale of one instance
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    position: Vec3,
    rotation_axis: Vec3,
    rotation_degrees: f32,
    scale: Vec3,
    model: Mat4,
    dirty: bool,
    bounding_box: Option<BoundingBox>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation_axis: Vec3::zeros(),
            rotation_degrees: 0.0,
            scale: Vec3::zeros(),
            model: Mat4::identity(),
            dirty: true,
            bounding_box: None,
        }
    }
}

impl Transform {
    /// Identity transform (scale unset)
    pub fn identity() -> Self {
        Self::default()
    }

    /// Transform at `position`
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::default() }
    }

    /// Builder: set the position
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    /// Builder: set the rotation
    #[must_use]
    pub fn with_rotation(mut self, axis: Vec3, degrees: f32) -> Self {
        self.set_rotation(axis, degrees);
        self
    }

    /// Builder: set the scale
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.set_scale(scale);
        self
    }

    /// Builder: uniform scale
    #[must_use]
    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vec3::repeat(scale))
    }

    /// Position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Rotation axis (not necessarily normalized)
    pub fn rotation_axis(&self) -> Vec3 {
        self.rotation_axis
    }

    /// Rotation angle in degrees
    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    /// Stored scale, possibly the all-zero "unset" value
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Scale actually applied to the model matrix
    pub fn effective_scale(&self) -> Vec3 {
        if utils::is_zero_vec(&self.scale) {
            Vec3::repeat(1.0)
        } else {
            self.scale
        }
    }

    /// Set the position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    /// Move by `delta`
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.dirty = true;
    }

    /// Set the rotation
    pub fn set_rotation(&mut self, axis: Vec3, degrees: f32) {
        self.rotation_axis = axis;
        self.rotation_degrees = degrees;
        self.dirty = true;
    }

    /// Set the scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty = true;
    }

    /// True when the cached matrix needs rebuilding
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild the cached matrix if anything changed
    pub fn refresh(&mut self) -> Mat4 {
        if self.dirty {
            self.model = self.compute_matrix();
            self.dirty = false;
        }
        self.model
    }

    /// Model matrix, rebuilt on demand
    pub fn model_matrix(&mut self) -> Mat4 {
        self.refresh()
    }

    /// Model matrix without touching the cache
    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * Mat4::rotation_degrees(&self.rotation_axis, self.rotation_degrees)
            * Mat4::new_nonuniform_scaling(&self.effective_scale())
    }

    /// Attached bounding box
    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.bounding_box.as_ref()
    }

    /// Mutable access to the attached bounding box
    pub fn bounding_box_mut(&mut self) -> Option<&mut BoundingBox> {
        self.bounding_box.as_mut()
    }

    /// Attach a bounding box, returning the previous one
    pub fn set_bounding_box(&mut self, bounding_box: Option<BoundingBox>) -> Option<BoundingBox> {
        std::mem::replace(&mut self.bounding_box, bounding_box)
    }

    /// Detach the bounding box
    pub fn take_bounding_box(&mut self) -> Option<BoundingBox> {
        self.bounding_box.take()
    }

    /// Radius of a sphere around `position` that encloses the scaled box
    pub fn bounding_radius(&self) -> f32 {
        self.scaled_radius(self.bounding_box.as_ref().map(BoundingBox::radius))
    }

    /// `local_radius` grown by this transform's largest scale component
    ///
    /// Instances share one mesh, so they pass the radius of the box carried
    /// by instance 0. Without a box the mesh is taken as unit-sized.
    pub fn scaled_radius(&self, local_radius: Option<f32>) -> f32 {
        let scale = self.effective_scale().abs().max();
        local_radius.map_or(scale, |radius| radius * scale)
    }

    /// Split a model matrix back into position, rotation and scale
    ///
    /// Assumes the matrix has no shear and positive scale.
    pub fn decompose(matrix: &Mat4) -> Decomposed {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let basis = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let scale = Vec3::new(
            basis.column(0).norm(),
            basis.column(1).norm(),
            basis.column(2).norm(),
        );
        let rotation_matrix = Mat3::from_columns(&[
            basis.column(0) / scale.x,
            basis.column(1) / scale.y,
            basis.column(2) / scale.z,
        ]);
        let rotation = Quat::from_matrix(&rotation_matrix);
        let (axis, degrees) = rotation
            .axis_angle()
            .map_or((Vec3::zeros(), 0.0), |(axis, angle)| (axis.into_inner(), utils::rad_to_deg(angle)));

        Decomposed { position, rotation_axis: axis, rotation_degrees: degrees, scale }
    }
}

/// Components recovered from a model matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposed {
    /// Translation
    pub position: Vec3,
    /// Unit rotation axis (zero for no rotation)
    pub rotation_axis: Vec3,
    /// Rotation angle in degrees, in `[0, 180]`
    pub rotation_degrees: f32,
    /// Per-axis scale
    pub scale: Vec3,
}

/// Build one model matrix per instance, refreshing each cache
pub fn instance_matrices(transforms: &mut [Transform]) -> Vec<Mat4> {
    transforms.iter_mut().map(Transform::refresh).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_trip_position_scale_yaw() {
        let mut transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Vec3::y(), 90.0)
            .with_uniform_scale(2.0);

        let parts = Transform::decompose(&transform.model_matrix());
        assert_relative_eq!(parts.position, Vec3::new(1.0, 2.0, 3.0), epsilon = 1e-4);
        assert_relative_eq!(parts.scale, Vec3::new(2.0, 2.0, 2.0), epsilon = 1e-4);
        assert_relative_eq!(parts.rotation_degrees, 90.0, epsilon = 1e-3);
        assert_relative_eq!(parts.rotation_axis, Vec3::y(), epsilon = 1e-4);
    }

    #[test]
    fn test_zero_scale_means_unit() {
        let mut transform = Transform::from_position(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(transform.effective_scale(), Vec3::repeat(1.0));
        assert_eq!(transform.model_matrix(), Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0)));

        // Only the all-zero vector is the sentinel.
        transform.set_scale(Vec3::new(0.0, 1.0, 1.0));
        assert_eq!(transform.effective_scale(), Vec3::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn test_mutation_marks_dirty() {
        let mut transform = Transform::identity();
        let before = transform.model_matrix();
        assert!(!transform.is_dirty());

        transform.translate(Vec3::new(0.0, 1.0, 0.0));
        assert!(transform.is_dirty());
        let after = transform.model_matrix();
        assert_ne!(before, after);
        assert_relative_eq!(after.m24, 1.0);
    }

    #[test]
    fn test_translation_applied_after_rotation_and_scale() {
        let mut transform = Transform::from_position(Vec3::new(0.0, 0.0, -10.0))
            .with_rotation(Vec3::x(), -90.0)
            .with_uniform_scale(100.0);
        let corner = transform.model_matrix().transform_point(&crate::foundation::math::Point3::new(0.5, 0.5, 0.0));
        assert_relative_eq!(corner.coords, Vec3::new(50.0, 0.0, -60.0), epsilon = 1e-3);
    }

    #[test]
    fn test_instance_matrices_one_per_transform() {
        let mut transforms = vec![
            Transform::from_position(Vec3::x()),
            Transform::from_position(Vec3::y()),
        ];
        let matrices = instance_matrices(&mut transforms);
        assert_eq!(matrices.len(), 2);
        assert_relative_eq!(matrices[1].m24, 1.0);
    }
}
