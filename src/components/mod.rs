pub mod lighting;

use glam::{Mat4, Vec3};

/// Placement of a model instance as written in the scene file.
/// `rotation` holds Euler angles in degrees, applied X then Y then Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTransform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl LocalTransform {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }

    /// Translation and static rotation, without scale.
    pub fn placement(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(self.rotation.x.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_z(self.rotation.z.to_radians())
    }

    pub fn matrix(&self) -> Mat4 {
        self.placement() * Mat4::from_scale(self.scale)
    }
}

/// Computed world-space transform matrix, updated by the transform system.
pub struct GlobalTransform(pub Mat4);

/// Index into the ModelStore resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelHandle(pub usize);

/// Axial tilt about Z followed by a continuous spin about the tilted Y axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    pub tilt_degrees: f32,
    pub degrees_per_second: f32,
}

impl Spin {
    /// Tilt plus the spin reached after `seconds`. `animate = false` freezes
    /// the spin at zero so baked lighting stays aligned with the geometry.
    pub fn matrix(&self, seconds: f32, animate: bool) -> Mat4 {
        let tilt = Mat4::from_rotation_z(self.tilt_degrees.to_radians());
        if animate {
            tilt * Mat4::from_rotation_y((seconds * self.degrees_per_second).to_radians())
        } else {
            tilt
        }
    }
}

/// World matrix of an instance: placement, optional spin, then scale.
pub fn instance_matrix(local: &LocalTransform, spin: Option<&Spin>, seconds: f32, animate: bool) -> Mat4 {
    match spin {
        Some(spin) => local.placement() * spin.matrix(seconds, animate) * Mat4::from_scale(local.scale),
        None => local.matrix(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_applies_scale_before_translation() {
        let mut local = LocalTransform::new(Vec3::new(1.0, 2.0, 3.0));
        local.scale = Vec3::new(2.0, 2.0, 2.0);
        let p = local.matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(3.0, 2.0, 3.0), 1e-5));
    }

    #[test]
    fn frozen_spin_keeps_only_tilt() {
        let local = LocalTransform::new(Vec3::ZERO);
        let spin = Spin {
            tilt_degrees: 23.433,
            degrees_per_second: 10.0,
        };
        let frozen_early = instance_matrix(&local, Some(&spin), 0.0, false);
        let frozen_late = instance_matrix(&local, Some(&spin), 42.0, false);
        assert_eq!(frozen_early, frozen_late);

        let spinning = instance_matrix(&local, Some(&spin), 9.0, true);
        assert_ne!(spinning, frozen_early);
    }
}
