use glam::{Mat4, Vec3};

/// Orbit camera around the model, driven by mouse drag and wheel.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    /// Horizontal rotation angle (radians)
    pub yaw: f32,
    /// Vertical rotation angle (radians)
    pub pitch: f32,
    /// Distance from target
    pub distance: f32,
    /// Camera target point
    pub target: Vec3,
    /// Vertical field of view (radians)
    pub fov: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitCamera {
    /// Looking down -Z at the origin from 5 units away.
    pub fn new() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: 5.0,
            target: Vec3::ZERO,
            fov: 75.0_f32.to_radians(),
        }
    }

    /// Rotate by a drag of `dx`, `dy` degrees.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx.to_radians();
        self.pitch = (self.pitch + dy.to_radians()).clamp(-1.5, 1.5);
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance * (1.0 - delta)).clamp(0.5, 100.0);
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        let offset = self.right_vector() * dx + self.up_vector() * dy;
        self.target += offset;
    }

    /// Camera position in world space
    pub fn eye_position(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();

        self.target + Vec3::new(self.distance * cp * sy, self.distance * sp, self.distance * cp * cy)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, aspect, 0.1, 1000.0)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    fn right_vector(&self) -> Vec3 {
        let fwd = (self.target - self.eye_position()).normalize_or_zero();
        fwd.cross(Vec3::Y).normalize_or_zero()
    }

    fn up_vector(&self) -> Vec3 {
        let fwd = (self.target - self.eye_position()).normalize_or_zero();
        self.right_vector().cross(fwd).normalize_or_zero()
    }
}

/// Continuous rotation of the model about its vertical axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpin {
    /// Radians per second.
    pub speed: f32,
    pub angle: f32,
}

impl ModelSpin {
    pub fn new(speed: f32) -> Self {
        Self { speed, angle: 0.0 }
    }

    /// Advance by `dt` seconds and return the new angle.
    pub fn advance(&mut self, dt: f32) -> f32 {
        // Large gaps (a hidden tab) should not jump the model around.
        let dt = dt.clamp(0.0, 0.1);
        self.angle = (self.angle + dt * self.speed) % std::f32::consts::TAU;
        self.angle
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_default_eye_is_on_positive_z() {
        let camera = OrbitCamera::new();
        assert!(close(camera.eye_position(), Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = OrbitCamera::new();
        camera.rotate(0.0, 500.0);
        assert_eq!(camera.pitch, 1.5);
        camera.rotate(0.0, -1000.0);
        assert_eq!(camera.pitch, -1.5);
    }

    #[test]
    fn test_zoom_is_bounded() {
        let mut camera = OrbitCamera::new();
        camera.zoom(0.5);
        assert!((camera.distance - 2.5).abs() < 1e-6);
        for _ in 0..100 {
            camera.zoom(0.9);
        }
        assert_eq!(camera.distance, 0.5);
    }

    #[test]
    fn test_pan_moves_target_sideways() {
        let mut camera = OrbitCamera::new();
        camera.pan(1.0, 0.0);
        assert!(close(camera.target, Vec3::new(1.0, 0.0, 0.0)));
        camera.pan(0.0, 1.0);
        assert!(close(camera.target, Vec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_spin_advances_half_radian_per_second() {
        let mut spin = ModelSpin::new(0.5);
        for _ in 0..10 {
            spin.advance(0.1);
        }
        assert!((spin.angle - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_spin_ignores_long_pauses() {
        let mut spin = ModelSpin::new(0.5);
        spin.advance(30.0);
        assert!((spin.angle - 0.05).abs() < 1e-6);
        spin.advance(-1.0);
        assert!((spin.angle - 0.05).abs() < 1e-6);
    }
}
