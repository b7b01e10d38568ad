//! Orbit camera, perspective projection and a damped orbit controller.
//!
//! The controller works on a spherical offset around the target: pointer
//! input accumulates rotation, pan and dolly requests, and [`OrbitController::update`]
//! applies a fraction of them every frame when damping is enabled, so the
//! camera keeps gliding after the pointer stops.

use std::f32::consts::{PI, TAU};

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, Zero, perspective};
use wgpu::util::DeviceExt;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

use crate::config::CameraConfig;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const POLE_EPSILON: f32 = 1e-6;
/// Dolly factor of one wheel notch.
const ZOOM_SCALE: f32 = 0.95;

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl OrbitCamera {
    pub fn new<P: Into<Point3<f32>>>(position: P, target: P) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }
}

#[derive(Debug, Clone)]
pub struct Projection {
    aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
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

    /// Zero sizes keep the previous aspect.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drag {
    Rotate,
    Pan,
}

/// Polar coordinates of the camera around its target, `theta` measured
/// from +Z towards +X and `phi` from +Y.
#[derive(Debug, Clone, Copy, PartialEq)]
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

    pub fn to_offset(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Debug)]
pub struct OrbitController {
    pub damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pending_pan: (f32, f32),
    pan_offset: Vector3<f32>,
    drag: Option<Drag>,
    cursor: Option<PhysicalPosition<f64>>,
    viewport_height: f32,
}

impl OrbitController {
    pub fn new(damping: bool, damping_factor: f32) -> Self {
        Self {
            damping,
            damping_factor: damping_factor.clamp(0.0, 1.0),
            rotate_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pending_pan: (0.0, 0.0),
            pan_offset: Vector3::zero(),
            drag: None,
            cursor: None,
            viewport_height: 1.0,
        }
    }

    /// Height of the drawing surface in physical pixels; pointer deltas are
    /// measured against it.
    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.theta_delta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.phi_delta -= angle;
    }

    /// Positive notches move the camera towards the target.
    pub fn dolly(&mut self, notches: f32) {
        self.scale *= ZOOM_SCALE.powf(notches);
    }

    /// Screen-space pan request in pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pending_pan.0 += dx * self.pan_speed;
        self.pending_pan.1 += dy * self.pan_speed;
    }

    /// Whether a rotation or pan is still decaying.
    pub fn is_moving(&self) -> bool {
        const REST: f32 = 1e-5;
        self.theta_delta.abs() > REST
            || self.phi_delta.abs() > REST
            || self.pan_offset.magnitude() > REST
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (state, button) {
                    (ElementState::Pressed, MouseButton::Left) => Some(Drag::Rotate),
                    (ElementState::Pressed, MouseButton::Right) => Some(Drag::Pan),
                    (ElementState::Released, _) => None,
                    _ => self.drag,
                };
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (Some(drag), Some(last)) = (self.drag, self.cursor) {
                    let dx = (position.x - last.x) as f32;
                    let dy = (position.y - last.y) as f32;
                    match drag {
                        Drag::Rotate => {
                            self.rotate_left(TAU * dx * self.rotate_speed / self.viewport_height);
                            self.rotate_up(TAU * dy * self.rotate_speed / self.viewport_height);
                        }
                        Drag::Pan => self.pan(dx, dy),
                    }
                }
                self.cursor = Some(*position);
            }
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 / 100.0,
                };
                self.dolly(notches);
            }
            _ => (),
        }
    }

    /// Applies pending input to the camera. Called once per frame.
    pub fn update(&mut self, camera: &mut OrbitCamera, projection: &Projection) {
        let offset = camera.position - camera.target;
        let mut spherical = Spherical::from_offset(offset);

        if self.pending_pan != (0.0, 0.0) {
            let (dx, dy) = std::mem::take(&mut self.pending_pan);
            let forward = -offset.normalize();
            let right = forward.cross(camera.up).normalize();
            let up = right.cross(forward);
            let target_distance = offset.magnitude() * (projection.fovy.0 / 2.0).tan();
            let pixels_to_world = 2.0 * target_distance / self.viewport_height;
            if right.x.is_finite() {
                self.pan_offset += right * (-dx * pixels_to_world) + up * (dy * pixels_to_world);
            }
        }

        let factor = if self.damping { self.damping_factor } else { 1.0 };
        spherical.theta += self.theta_delta * factor;
        spherical.phi += self.phi_delta * factor;
        spherical.phi = spherical.phi.clamp(POLE_EPSILON, PI - POLE_EPSILON);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        camera.target += self.pan_offset * factor;
        camera.position = camera.target + spherical.to_offset();

        if self.damping {
            self.theta_delta *= 1.0 - self.damping_factor;
            self.phi_delta *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
            self.pan_offset = Vector3::zero();
        }
        self.scale = 1.0;
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &OrbitCamera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub camera: OrbitCamera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, config: &CameraConfig, projection: &Projection) -> Self {
        let camera = OrbitCamera::new(config.position, config.target);
        let controller = OrbitController::new(config.damping, config.damping_factor);

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

    /// Advances the controller and uploads the new view-projection.
    pub fn update(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.controller.update(&mut self.camera, projection);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(damping: bool) -> (OrbitCamera, OrbitController, Projection) {
        let camera = OrbitCamera::new((4.0, 2.0, 5.0), (0.0, 0.0, 0.0));
        let mut controller = OrbitController::new(damping, 0.05);
        controller.set_viewport_height(600);
        let projection = Projection::new(800, 600, cgmath::Deg(75.0), 0.1, 100.0);
        (camera, controller, projection)
    }

    fn theta(camera: &OrbitCamera) -> f32 {
        Spherical::from_offset(camera.position - camera.target).theta
    }

    #[test]
    fn spherical_round_trips_offsets() {
        let offset = Vector3::new(4.0, 2.0, 5.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!((back - offset).magnitude() < 1e-5);
    }

    #[test]
    fn damped_rotation_converges_to_the_requested_angle() {
        let (mut camera, mut controller, projection) = setup(true);
        let start = theta(&camera);
        controller.rotate_left(-0.5);

        controller.update(&mut camera, &projection);
        let first_step = theta(&camera) - start;
        assert!((first_step - 0.5 * 0.05).abs() < 1e-4);

        for _ in 0..1000 {
            controller.update(&mut camera, &projection);
        }
        assert!(!controller.is_moving());
        assert!((theta(&camera) - start - 0.5).abs() < 1e-3);
        assert!((camera.distance() - 45f32.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn undamped_rotation_applies_at_once() {
        let (mut camera, mut controller, projection) = setup(false);
        let start = theta(&camera);
        controller.rotate_left(-0.25);
        controller.update(&mut camera, &projection);
        assert!((theta(&camera) - start - 0.25).abs() < 1e-4);
        assert!(!controller.is_moving());
    }

    #[test]
    fn polar_angle_never_crosses_the_poles() {
        let (mut camera, mut controller, projection) = setup(true);
        let start = theta(&camera);
        controller.rotate_up(100.0);
        for _ in 0..200 {
            controller.update(&mut camera, &projection);
            let offset = camera.position - camera.target;
            assert!(offset.y > 0.0);
            assert!(offset.x.hypot(offset.z) > 0.0);
            assert!((theta(&camera) - start).abs() < 1e-3);
        }
        controller.rotate_up(-1000.0);
        for _ in 0..200 {
            controller.update(&mut camera, &projection);
            let offset = camera.position - camera.target;
            assert!(offset.x.hypot(offset.z) > 0.0);
            assert!((theta(&camera) - start).abs() < 1e-3);
        }
        assert!((camera.position - camera.target).y < 0.0);
    }

    #[test]
    fn wheel_dollies_towards_the_target() {
        let (mut camera, mut controller, projection) = setup(true);
        let before = camera.distance();
        controller.dolly(1.0);
        controller.update(&mut camera, &projection);
        assert!((camera.distance() - before * ZOOM_SCALE).abs() < 1e-4);
    }

    #[test]
    fn pan_moves_target_and_position_together() {
        let (mut camera, mut controller, projection) = setup(false);
        let offset_before = camera.position - camera.target;
        controller.pan(30.0, 0.0);
        controller.update(&mut camera, &projection);
        let offset_after = camera.position - camera.target;
        assert!(camera.target.to_homogeneous().truncate().magnitude() > 0.0);
        assert!((offset_after - offset_before).magnitude() < 1e-4);
    }

    #[test]
    fn projection_ignores_zero_sizes() {
        let mut projection = Projection::new(800, 600, cgmath::Deg(75.0), 0.1, 100.0);
        projection.resize(0, 600);
        assert!((projection.aspect() - 800.0 / 600.0).abs() < 1e-6);
        projection.resize(1920, 1080);
        assert!((projection.aspect() - 1920.0 / 1080.0).abs() < 1e-6);
    }
}
