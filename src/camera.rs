use glam::{Mat4, Vec3};
use sdl2::keyboard::Scancode;

use crate::engine::input::InputState;

const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 1000.0;

/// Free-fly camera: WASD moves in the view plane, Q/E move down/up along
/// world Y, the captured mouse looks around.
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub speed: f32,
    pub sensitivity: f32,
    pub fov: f32,
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: -90.0_f32,
            pitch: 0.0,
            speed: 5.0,
            sensitivity: 0.1,
            fov: 45.0,
        }
    }

    pub fn look(&mut self, mouse_dx: f32, mouse_dy: f32) {
        self.yaw += mouse_dx * self.sensitivity;
        self.pitch -= mouse_dy * self.sensitivity;
        self.pitch = self.pitch.clamp(-89.0, 89.0);
    }

    pub fn move_wasd(&mut self, input: &InputState, dt: f32) {
        let front = self.front();
        let right = front.cross(Vec3::Y).normalize();
        let velocity = self.speed * dt;

        if input.is_key_held(Scancode::W) {
            self.position += front * velocity;
        }
        if input.is_key_held(Scancode::S) {
            self.position -= front * velocity;
        }
        if input.is_key_held(Scancode::A) {
            self.position -= right * velocity;
        }
        if input.is_key_held(Scancode::D) {
            self.position += right * velocity;
        }
        if input.is_key_held(Scancode::E) {
            self.position += Vec3::Y * velocity;
        }
        if input.is_key_held(Scancode::Q) {
            self.position -= Vec3::Y * velocity;
        }
    }

    pub fn front(&self) -> Vec3 {
        let yaw_rad = self.yaw.to_radians();
        let pitch_rad = self.pitch.to_radians();
        Vec3::new(
            yaw_rad.cos() * pitch_rad.cos(),
            pitch_rad.sin(),
            yaw_rad.sin() * pitch_rad.cos(),
        )
        .normalize()
    }

    pub fn view_matrix(&self) -> Mat4 {
        let front = self.front();
        Mat4::look_at_rh(self.position, self.position + front, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov.to_radians(), aspect, NEAR_PLANE, FAR_PLANE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::new(Vec3::new(0.0, 1.0, 5.0));
        let front = camera.front();
        assert_relative_eq!(front.z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(front.x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new(Vec3::ZERO);
        camera.look(0.0, -10_000.0);
        assert_eq!(camera.pitch, 89.0);
        camera.look(0.0, 10_000.0);
        assert_eq!(camera.pitch, -89.0);
    }

    #[test]
    fn view_matrix_moves_eye_to_origin() {
        let camera = Camera::new(Vec3::new(2.0, 3.0, 4.0));
        let eye = camera.view_matrix().transform_point3(camera.position);
        assert_relative_eq!(eye.length(), 0.0, epsilon = 1e-5);
    }
}
