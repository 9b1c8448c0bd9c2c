use glam::{Mat4, Vec3};

/// Bounds of the soft clamp applied to a directional light's direction.
pub const DIRECTION_Y_LIMIT: f32 = 2.0;
pub const DIRECTION_Z_LIMIT: f32 = 3.0;

/// Directional light (sun-like). Casts shadows through the shadow pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    direction: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub light_color: Vec3,
    /// Projection × view of the light; derived, refreshed every frame.
    pub light_space_matrix: Mat4,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, ambient: Vec3, diffuse: Vec3, specular: Vec3, light_color: Vec3) -> Self {
        Self {
            direction: clamp_direction(direction),
            ambient,
            diffuse,
            specular,
            light_color,
            light_space_matrix: Mat4::IDENTITY,
        }
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = clamp_direction(direction);
    }

    /// Shift the direction's y and z components, then clamp.
    pub fn nudge(&mut self, dy: f32, dz: f32) {
        self.set_direction(self.direction + Vec3::new(0.0, dy, dz));
    }
}

fn clamp_direction(direction: Vec3) -> Vec3 {
    Vec3::new(
        direction.x,
        direction.y.clamp(-DIRECTION_Y_LIMIT, DIRECTION_Y_LIMIT),
        direction.z.clamp(-DIRECTION_Z_LIMIT, DIRECTION_Z_LIMIT),
    )
}

/// Point light with distance attenuation. Never casts shadows.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub light_color: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sun(direction: Vec3) -> DirectionalLight {
        DirectionalLight::new(direction, Vec3::splat(0.1), Vec3::splat(0.8), Vec3::ONE, Vec3::ONE)
    }

    #[test]
    fn construction_clamps_direction() {
        let light = sun(Vec3::new(7.0, -9.0, 9.0));
        assert_eq!(light.direction(), Vec3::new(7.0, -2.0, 3.0));
    }

    #[test]
    fn clamp_holds_after_any_nudge_sequence() {
        let mut light = sun(Vec3::new(0.0, -1.0, 0.0));
        let steps = [(-0.01, 0.0), (0.01, 0.0), (0.0, -0.01), (0.0, 0.01), (0.37, -0.53), (-1.9, 2.2)];
        for i in 0..2_000 {
            let (dy, dz) = steps[i % steps.len()];
            light.nudge(dy * (i % 7) as f32, dz * (i % 5) as f32);
            let d = light.direction();
            assert!((-2.0..=2.0).contains(&d.y), "y escaped: {}", d.y);
            assert!((-3.0..=3.0).contains(&d.z), "z escaped: {}", d.z);
        }
    }

    #[test]
    fn nudge_stops_at_limits() {
        let mut light = sun(Vec3::new(0.0, 1.995, -2.995));
        light.nudge(0.01, -0.01);
        assert_eq!(light.direction().y, 2.0);
        assert_eq!(light.direction().z, -3.0);
    }
}
