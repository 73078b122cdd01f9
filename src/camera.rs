//! Perspective camera and orbit controls.
//!
//! The camera always looks at a target point. [`OrbitController`] stores the
//! camera's offset from that target in spherical coordinates and turns pointer
//! input into pending deltas; [`OrbitController::update`] applies and clamps
//! them once per frame, right before the view-projection matrix is uploaded.

use std::f32::consts::{PI, TAU};

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, Zero, perspective};
use wgpu::util::DeviceExt;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::config::{CameraConfig, OrbitLimits};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

// keeps phi away from the poles where look_at degenerates
const POLE_EPSILON: f32 = 1e-6;
// pixel scroll deltas (touchpads) are converted to wheel "lines"
const PIXELS_PER_LINE: f32 = 40.0;
const ZOOM_BASE: f32 = 0.95;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }
}

impl From<&CameraConfig> for Camera {
    fn from(config: &CameraConfig) -> Self {
        Camera::new(config.position, config.target)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// The camera data as laid out in the uniform buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the renderer needs to bind the camera.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(
        device: &wgpu::Device,
        config: &CameraConfig,
        limits: OrbitLimits,
        projection: &Projection,
        viewport_height: u32,
    ) -> Self {
        let mut camera = Camera::from(config);
        let mut controller =
            OrbitController::new(&camera, projection.fovy(), limits, viewport_height);
        // moves the start pose into the orbit limits
        controller.update(&mut camera);

        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Applies pending orbit input and uploads the new view-projection.
    pub fn update(&mut self, projection: &Projection, queue: &wgpu::Queue) {
        self.controller.update(&mut self.camera);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

/// Offset from the orbit target: `radius`, azimuth `theta` around +Y and
/// polar angle `phi` measured from +Y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius == 0.0 {
            return Self {
                radius,
                theta: 0.0,
                phi: 0.0,
            };
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_offset(&self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DragMode {
    None,
    Rotate,
    Pan,
}

/// Orbit-style camera controls: left drag rotates around the target, right
/// drag pans the target, the wheel zooms.
#[derive(Debug)]
pub struct OrbitController {
    limits: OrbitLimits,
    fovy: Rad<f32>,
    viewport_height: f32,
    target: Point3<f32>,
    spherical: Spherical,
    // pending input, consumed by `update`
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vector3<f32>,
    drag: DragMode,
    last_cursor: Option<(f64, f64)>,
}

impl OrbitController {
    pub fn new(camera: &Camera, fovy: Rad<f32>, limits: OrbitLimits, viewport_height: u32) -> Self {
        let mut controller = Self {
            limits,
            fovy,
            viewport_height: viewport_height.max(1) as f32,
            target: camera.target,
            spherical: Spherical::from_offset(camera.position - camera.target),
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vector3::zero(),
            drag: DragMode::None,
            last_cursor: None,
        };
        controller.clamp();
        controller
    }

    pub fn target(&self) -> Point3<f32> {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.spherical.radius
    }

    pub fn polar_angle(&self) -> f32 {
        self.spherical.phi
    }

    pub fn azimuth(&self) -> f32 {
        self.spherical.theta
    }

    pub fn limits(&self) -> &OrbitLimits {
        &self.limits
    }

    /// Drag distances are measured relative to the viewport height.
    pub fn resize(&mut self, height: u32) {
        if height > 0 {
            self.viewport_height = height as f32;
        }
    }

    /// Queue a rotation for a pointer drag of `dx`/`dy` pixels. Dragging over
    /// the full viewport height turns the camera once around the target.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let speed = TAU * self.limits.rotate_speed / self.viewport_height;
        self.delta_theta -= dx * speed;
        self.delta_phi -= dy * speed;
    }

    /// Queue a zoom of `steps` wheel lines; positive steps move closer.
    pub fn zoom(&mut self, steps: f32) {
        let zoom_scale = ZOOM_BASE.powf(self.limits.zoom_speed);
        self.scale *= zoom_scale.powf(steps);
    }

    /// Queue a pan of the target for a pointer drag of `dx`/`dy` pixels, so
    /// that the point under the cursor roughly follows it.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let offset = self.spherical.to_offset();
        let forward = -offset.normalize();
        let right = forward.cross(Vector3::unit_y());
        if right.magnitude2() == 0.0 {
            return;
        }
        let right = right.normalize();
        let up = right.cross(forward).normalize();
        let target_distance = offset.magnitude() * (self.fovy.0 / 2.0).tan();
        let scale = 2.0 * target_distance * self.limits.pan_speed / self.viewport_height;
        self.pan_offset += right * (-dx * scale) + up * (dy * scale);
    }

    /// Feed a winit window event. Returns whether the controller used it.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = *state == ElementState::Pressed;
                match (button, pressed) {
                    (MouseButton::Left, true) => self.drag = DragMode::Rotate,
                    (MouseButton::Right, true) => self.drag = DragMode::Pan,
                    (MouseButton::Left | MouseButton::Right, false) => self.drag = DragMode::None,
                    _ => return false,
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let current = (position.x, position.y);
                let last = self.last_cursor.replace(current);
                let Some((last_x, last_y)) = last else {
                    return false;
                };
                let dx = (current.0 - last_x) as f32;
                let dy = (current.1 - last_y) as f32;
                match self.drag {
                    DragMode::Rotate => self.rotate(dx, dy),
                    DragMode::Pan => self.pan(dx, dy),
                    DragMode::None => return false,
                }
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.last_cursor = None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
                self.zoom(steps);
                true
            }
            _ => false,
        }
    }

    /// Apply the pending input, clamp to the limits and move `camera`.
    pub fn update(&mut self, camera: &mut Camera) {
        self.spherical.theta += self.delta_theta;
        self.spherical.phi += self.delta_phi;
        self.spherical.radius *= self.scale;
        self.target += self.pan_offset;
        self.clamp();

        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vector3::zero();

        camera.target = self.target;
        camera.position = self.target + self.spherical.to_offset();
    }

    fn clamp(&mut self) {
        let limits = &self.limits;
        self.spherical.phi = self
            .spherical
            .phi
            .clamp(limits.min_polar_angle, limits.max_polar_angle)
            .clamp(POLE_EPSILON, PI - POLE_EPSILON);
        self.spherical.radius = self
            .spherical
            .radius
            .clamp(limits.min_distance, limits.max_distance);
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use cgmath::{Deg, MetricSpace};

    use super::*;

    fn controller() -> (Camera, OrbitController) {
        let config = CameraConfig::default();
        let camera = Camera::from(&config);
        let controller =
            OrbitController::new(&camera, Deg(config.fovy).into(), OrbitLimits::default(), 600);
        (camera, controller)
    }

    #[test]
    fn starts_at_the_configured_pose() {
        let (mut camera, mut controller) = controller();
        let start = camera.position;
        controller.update(&mut camera);
        assert!(camera.position.distance(start) < 1e-4);
        assert!((controller.distance() - 43.5f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn zoom_is_clamped_to_the_distance_limits() {
        let (mut camera, mut controller) = controller();
        for _ in 0..200 {
            controller.zoom(3.0);
            controller.update(&mut camera);
            assert!(controller.distance() >= 3.0);
        }
        assert!((controller.distance() - 3.0).abs() < 1e-5);
        for _ in 0..200 {
            controller.zoom(-3.0);
            controller.update(&mut camera);
            assert!(controller.distance() <= 8.0);
        }
        assert!((controller.distance() - 8.0).abs() < 1e-5);
        assert!((camera.position.distance(camera.target) - 8.0).abs() < 1e-4);
    }

    #[test]
    fn polar_angle_never_goes_below_the_horizon() {
        let (mut camera, mut controller) = controller();
        for dy in [-5000.0, 100.0, -20.0, 7000.0, 12.5, -90000.0] {
            controller.rotate(0.0, dy);
            controller.update(&mut camera);
            assert!(controller.polar_angle() <= FRAC_PI_2);
            assert!(camera.position.y >= camera.target.y - 1e-4);
        }
    }

    #[test]
    fn full_height_drag_turns_once_around() {
        let (mut camera, mut controller) = controller();
        let azimuth = controller.azimuth();
        controller.rotate(600.0, 0.0);
        controller.update(&mut camera);
        assert!((controller.azimuth() - (azimuth - TAU)).abs() < 1e-4);
    }

    #[test]
    fn input_is_applied_only_on_update() {
        let (mut camera, mut controller) = controller();
        let before = camera;
        controller.rotate(40.0, 10.0);
        controller.zoom(1.0);
        assert_eq!(camera, before);
        controller.update(&mut camera);
        assert_ne!(camera, before);
        let after = camera;
        controller.update(&mut camera);
        assert_eq!(camera, after);
    }

    #[test]
    fn pan_moves_the_target_and_keeps_the_distance() {
        let (mut camera, mut controller) = controller();
        let distance = controller.distance();
        controller.pan(100.0, 0.0);
        controller.update(&mut camera);
        assert!(controller.target().distance(Point3::new(0.0, 0.0, 0.0)) > 0.0);
        assert!((camera.position.distance(camera.target) - distance).abs() < 1e-4);
    }

    #[test]
    fn spherical_round_trips_offsets() {
        let offset = Vector3::new(-5.0, 2.5, -3.5);
        let back = Spherical::from_offset(offset).to_offset();
        assert!((back - offset).magnitude() < 1e-4);
    }

    #[test]
    fn resize_updates_the_aspect() {
        let mut projection = Projection::new(800, 600, Deg(40.0), 1.0, 100.0);
        for (w, h) in [(1, 1), (1920, 1080), (333, 1024), (4096, 7)] {
            projection.resize(w, h);
            assert_eq!(projection.aspect(), w as f32 / h as f32);
        }
        projection.resize(0, 300);
        assert_eq!(projection.aspect(), 4096.0 / 7.0);
    }
}
