use glam::{Mat4, Vec3};

/// Below this |cos| between the light direction and +Y, +Y is a usable up vector.
const UP_PARALLEL_COS: f32 = 0.999;

/// Fixed orthographic volume a directional shadow map covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightProjection {
    pub near: f32,
    pub far: f32,
    /// Half extent of the square ortho window, in world units.
    pub edge: f32,
}

impl LightProjection {
    pub fn new(near: f32, far: f32, edge: f32) -> Self {
        Self { near, far, edge }
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::orthographic_rh_gl(-self.edge, self.edge, -self.edge, self.edge, self.near, self.far)
    }

    /// View from `-direction` looking at the origin.
    pub fn view(&self, direction: Vec3) -> Mat4 {
        let eye = -direction;
        let up = match direction.try_normalize() {
            Some(d) if d.dot(Vec3::Y).abs() < UP_PARALLEL_COS => Vec3::Y,
            Some(_) => Vec3::Z,
            None => Vec3::Y,
        };
        // A zero direction would put the eye on the target.
        let eye = if eye.length_squared() > 0.0 { eye } else { Vec3::Y };
        Mat4::look_at_rh(eye, Vec3::ZERO, up)
    }

    /// Projection × view: world space to the light's clip space.
    pub fn light_space_matrix(&self, direction: Vec3) -> Mat4 {
        self.projection() * self.view(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn projection() -> LightProjection {
        LightProjection::new(2.0, 120.0, 120.0)
    }

    #[test]
    fn identical_inputs_give_bit_identical_matrices() {
        let p = projection();
        let d = Vec3::new(-0.3, -1.0, 0.45);
        let a = p.light_space_matrix(d).to_cols_array();
        let b = p.light_space_matrix(d).to_cols_array();
        assert_eq!(a.map(f32::to_bits), b.map(f32::to_bits));
    }

    #[test]
    fn straight_down_light_stays_finite() {
        let m = projection().light_space_matrix(Vec3::new(0.0, -1.0, 0.0));
        assert!(m.is_finite());
        let m = projection().light_space_matrix(Vec3::ZERO);
        assert!(m.is_finite());
    }

    #[test]
    fn origin_lands_at_eye_distance_depth() {
        // The eye sits at -direction, one unit from the origin along the ray.
        let p = projection();
        let clip = p.light_space_matrix(Vec3::new(1.0, -1.0, 0.0).normalize()).project_point3(Vec3::ZERO);
        assert_relative_eq!(clip.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y, 0.0, epsilon = 1e-5);
        // view-space distance 1.0 mapped into [near, far] -> NDC
        let expected = (2.0 * (1.0 - p.near) / (p.far - p.near)) - 1.0;
        assert_relative_eq!(clip.z, expected, epsilon = 1e-5);
    }

    #[test]
    fn edge_bounds_the_covered_window() {
        let p = projection();
        let m = p.light_space_matrix(Vec3::new(0.0, -1.0, 0.2));
        let inside = m.project_point3(Vec3::new(100.0, 0.0, 0.0));
        let outside = m.project_point3(Vec3::new(130.0, 0.0, 0.0));
        assert!(inside.x.abs() <= 1.0 && inside.y.abs() <= 1.0);
        assert!(outside.x.abs() > 1.0 || outside.y.abs() > 1.0);
    }
}
