use cgmath::*;

use super::camera_utils::{ViewProjection, OPENGL_TO_WGPU_MATRIX};

/// Default camera values
pub const YAW: f32 = -90.0;
pub const PITCH: f32 = 0.0;
pub const SPEED: f32 = 2.5;
pub const SENSITIVITY: f32 = 0.1;
pub const ZOOM: f32 = 45.0;

pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 45.0;
pub const PITCH_LIMIT: f32 = 89.0;

/// Possible options for camera movement.
///
/// Used as an abstraction to stay away from window-system specific input methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// A first-person camera driven by Euler angles.
///
/// Angles are stored in degrees. `front`, `right` and `up` are derived from
/// `yaw`, `pitch` and `world_up` every time one of the `process_*` methods changes
/// the orientation. The `with_*` mutators write fields directly and skip that
/// recomputation; callers using them are responsible for keeping the basis sane.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    position: Vector3<f32>,
    front: Vector3<f32>,
    up: Vector3<f32>,
    right: Vector3<f32>,
    world_up: Vector3<f32>,

    yaw: f32,
    pitch: f32,

    movement_speed: f32,
    mouse_sensitivity: f32,
    zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vector3::zero(), Vector3::unit_y(), YAW, PITCH)
    }
}

impl ViewProjection for Camera {
    fn build_view_projection_matrix(&self, aspect: f32) -> Matrix4<f32> {
        self.projection_matrix(aspect, 0.1, 100.0) * self.view_matrix()
    }
}

impl Camera {
    /// Creates a camera from a position, a world-up reference and Euler angles.
    pub fn new(position: Vector3<f32>, world_up: Vector3<f32>, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position,
            front: -Vector3::unit_z(),
            up: Vector3::unit_y(),
            right: Vector3::unit_x(),
            world_up,
            yaw,
            pitch,
            movement_speed: SPEED,
            mouse_sensitivity: SENSITIVITY,
            zoom: ZOOM,
        };
        camera.update_camera_vectors();
        camera
    }

    /// Creates a camera from scalar components.
    #[allow(clippy::too_many_arguments)]
    pub fn from_scalars(
        pos_x: f32,
        pos_y: f32,
        pos_z: f32,
        up_x: f32,
        up_y: f32,
        up_z: f32,
        yaw: f32,
        pitch: f32,
    ) -> Self {
        Self::new(
            Vector3::new(pos_x, pos_y, pos_z),
            Vector3::new(up_x, up_y, up_z),
            yaw,
            pitch,
        )
    }

    /// Returns the view matrix looking from `position` along `front`.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let eye = Point3::from_vec(self.position);
        let target = Point3::from_vec(self.position + self.front);
        Matrix4::look_at_rh(eye, target, self.up)
    }

    /// Perspective projection using `zoom` as the vertical field of view.
    pub fn projection_matrix(&self, aspect: f32, znear: f32, zfar: f32) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(Deg(self.zoom), aspect, znear, zfar)
    }

    /// Moves the camera along its front or right vector.
    pub fn process_movement(&mut self, direction: CameraMovement, elapsed: f32) {
        let velocity = self.movement_speed * elapsed;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    /// Applies a look offset, typically the cursor delta since the last sample.
    pub fn process_look_delta(&mut self, x_offset: f32, y_offset: f32, constrain_pitch: bool) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;

        // Past the poles the view flips.
        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }

        self.update_camera_vectors();
    }

    /// Applies a vertical scroll offset to the zoom.
    ///
    /// The offset is only applied while the zoom is inside `[MIN_ZOOM, MAX_ZOOM]`;
    /// the result is clamped afterwards, so one large offset lands exactly on a bound.
    pub fn process_zoom_delta(&mut self, y_offset: f32) {
        if (MIN_ZOOM..=MAX_ZOOM).contains(&self.zoom) {
            self.zoom -= y_offset;
        }
        if self.zoom <= MIN_ZOOM {
            self.zoom = MIN_ZOOM;
        }
        if self.zoom >= MAX_ZOOM {
            self.zoom = MAX_ZOOM;
        }
    }

    /// Recomputes front, then right, then up. The order matters for non-trivial world-up.
    fn update_camera_vectors(&mut self) {
        let (yaw, pitch) = (Deg(self.yaw), Deg(self.pitch));
        let front = Vector3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        );
        self.front = front.normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }

    pub fn with_position(&mut self, position: Vector3<f32>) -> &mut Self {
        self.position = position;
        self
    }

    pub fn with_front(&mut self, front: Vector3<f32>) -> &mut Self {
        self.front = front;
        self
    }

    pub fn with_up(&mut self, up: Vector3<f32>) -> &mut Self {
        self.up = up;
        self
    }

    pub fn with_right(&mut self, right: Vector3<f32>) -> &mut Self {
        self.right = right;
        self
    }

    pub fn with_world_up(&mut self, world_up: Vector3<f32>) -> &mut Self {
        self.world_up = world_up;
        self
    }

    pub fn with_yaw(&mut self, yaw: f32) -> &mut Self {
        self.yaw = yaw;
        self
    }

    pub fn with_pitch(&mut self, pitch: f32) -> &mut Self {
        self.pitch = pitch;
        self
    }

    pub fn with_movement_speed(&mut self, speed: f32) -> &mut Self {
        self.movement_speed = speed;
        self
    }

    pub fn with_mouse_sensitivity(&mut self, sensitivity: f32) -> &mut Self {
        self.mouse_sensitivity = sensitivity;
        self
    }

    pub fn with_zoom(&mut self, zoom: f32) -> &mut Self {
        self.zoom = zoom;
        self
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn world_up(&self) -> Vector3<f32> {
        self.world_up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn movement_speed(&self) -> f32 {
        self.movement_speed
    }

    pub fn mouse_sensitivity(&self) -> f32 {
        self.mouse_sensitivity
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }
}
