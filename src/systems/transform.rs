use hecs::World;

use crate::components::{instance_matrix, GlobalTransform, LocalTransform, Spin};

/// Recompute every instance's GlobalTransform from its LocalTransform and,
/// for spinning instances, the spin reached after `seconds`. With
/// `animate = false` spinning instances hold their tilt only.
pub fn transform_system(world: &mut World, seconds: f32, animate: bool) {
    for (_entity, (local, spin, global)) in world.query_mut::<(&LocalTransform, Option<&Spin>, &mut GlobalTransform)>() {
        global.0 = instance_matrix(local, spin, seconds, animate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn static_instances_ignore_time() {
        let mut world = World::new();
        let local = LocalTransform::new(Vec3::new(0.0, -1.0, 0.0));
        let entity = world.spawn((local, GlobalTransform(Mat4::IDENTITY)));

        transform_system(&mut world, 5.0, true);
        assert_eq!(world.get::<&GlobalTransform>(entity).unwrap().0, local.matrix());
    }

    #[test]
    fn spinning_instances_follow_time_only_when_animated() {
        let mut world = World::new();
        let spin = Spin {
            tilt_degrees: 23.433,
            degrees_per_second: 10.0,
        };
        let entity = world.spawn((LocalTransform::new(Vec3::ZERO), GlobalTransform(Mat4::IDENTITY), spin));

        transform_system(&mut world, 3.0, false);
        let frozen = world.get::<&GlobalTransform>(entity).unwrap().0;
        transform_system(&mut world, 7.0, false);
        assert_eq!(world.get::<&GlobalTransform>(entity).unwrap().0, frozen);

        transform_system(&mut world, 7.0, true);
        let expected = Mat4::from_rotation_z(23.433f32.to_radians()) * Mat4::from_rotation_y(70f32.to_radians());
        assert!(world.get::<&GlobalTransform>(entity).unwrap().0.abs_diff_eq(expected, 1e-5));
    }
}
