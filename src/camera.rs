//! Orbit camera, projection and the camera uniform.
//!
//! The camera circles a target point. Mouse input is accumulated by the
//! [`CameraController`] and applied with damping once per frame, so the view
//! keeps gliding for a moment after the drag ends.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::config::CameraConfig;

pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::from_cols(
    cgmath::Vector4::new(1.0, 0.0, 0.0, 0.0),
    cgmath::Vector4::new(0.0, 1.0, 0.0, 0.0),
    cgmath::Vector4::new(0.0, 0.0, 0.5, 0.0),
    cgmath::Vector4::new(0.0, 0.0, 0.5, 1.0),
);

/// Keeps the polar angle off the poles where `look_at` degenerates.
const POLAR_EPSILON: f32 = 1e-6;

/// Camera position in spherical coordinates around `target`.
///
/// `theta` is the azimuth around +Y measured from +Z, `phi` the polar angle
/// from +Y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub target: Point3<f32>,
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        let position = position.into();
        let target = target.into();
        let offset = position - target;
        let radius = offset.magnitude();
        let (theta, phi) = if radius == 0.0 {
            (0.0, PI / 2.0)
        } else {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        };
        Self {
            target,
            radius,
            theta,
            phi,
        }
    }

    pub fn position(&self) -> Point3<f32> {
        let sin_phi = self.phi.sin();
        self.target
            + Vector3::new(
                self.radius * sin_phi * self.theta.sin(),
                self.radius * self.phi.cos(),
                self.radius * sin_phi * self.theta.cos(),
            )
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position(), self.target, Vector3::unit_y())
    }
}

pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Damped orbit input: left-drag rotates, the wheel zooms, panning is disabled.
#[derive(Debug)]
pub struct CameraController {
    damping_factor: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    min_distance: f32,
    max_distance: f32,
    viewport_height: f32,
    // pending spherical change, decays every update
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    dragging: bool,
    cursor: Option<(f64, f64)>,
}

impl CameraController {
    pub fn new(damping_factor: f32, rotate_speed: f32, zoom_speed: f32) -> Self {
        Self {
            damping_factor,
            rotate_speed,
            zoom_speed,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            viewport_height: 1.0,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            dragging: false,
            cursor: None,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        let mut controller =
            Self::new(config.damping_factor, config.rotate_speed, config.zoom_speed);
        controller.min_distance = config.min_distance;
        controller.max_distance = config.max_distance.max(config.min_distance);
        controller
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Feeds a pointer movement in pixels into the pending rotation.
    pub fn handle_mouse(&mut self, dx: f64, dy: f64) {
        let per_pixel = 2.0 * PI * self.rotate_speed / self.viewport_height;
        self.theta_delta -= dx as f32 * per_pixel;
        self.phi_delta -= dy as f32 * per_pixel;
    }

    /// Positive steps zoom in.
    pub fn handle_scroll(&mut self, steps: f32) {
        if steps == 0.0 {
            return;
        }
        let zoom_scale = 0.95_f32.powf(self.zoom_speed);
        if steps > 0.0 {
            self.scale *= zoom_scale;
        } else {
            self.scale /= zoom_scale;
        }
    }

    /// Returns `true` if the event was camera input.
    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let current = (position.x, position.y);
                if let (true, Some((x, y))) = (self.dragging, self.cursor) {
                    self.handle_mouse(current.0 - x, current.1 - y);
                }
                self.cursor = Some(current);
                self.dragging
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                self.handle_scroll(steps);
                true
            }
            _ => false,
        }
    }

    /// Applies a damped share of the pending input to the camera.
    pub fn update(&mut self, camera: &mut Camera) {
        camera.theta += self.theta_delta * self.damping_factor;
        camera.phi = (camera.phi + self.phi_delta * self.damping_factor)
            .clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        camera.radius = (camera.radius * self.scale).clamp(self.min_distance, self.max_distance);

        self.theta_delta *= 1.0 - self.damping_factor;
        self.phi_delta *= 1.0 - self.damping_factor;
        self.scale = 1.0;
    }
}

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
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position().to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CameraResources {
    pub camera: Camera,
    pub controller: CameraController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(
        device: &wgpu::Device,
        camera: Camera,
        controller: CameraController,
        projection: &Projection,
    ) -> Self {
        use wgpu::util::DeviceExt;

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

    /// Runs the controller and uploads the resulting view.
    pub fn update(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.controller.update(&mut self.camera);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn spherical_state_reproduces_the_position() {
        let camera = Camera::new((5.0, 2.0, 8.0), (0.0, 0.5, 0.0));
        let position = camera.position();
        assert!(close(position.x, 5.0));
        assert!(close(position.y, 2.0));
        assert!(close(position.z, 8.0));
    }

    #[test]
    fn drag_input_is_applied_with_damping() {
        let mut camera = Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0));
        let mut controller = CameraController::new(0.05, 1.0, 1.0);
        controller.set_viewport_height(100);
        let start = camera.theta;

        // 100px across a 100px viewport is one full turn
        controller.handle_mouse(-100.0, 0.0);
        controller.update(&mut camera);
        assert!(close(camera.theta - start, 2.0 * PI * 0.05));

        controller.update(&mut camera);
        assert!(close(camera.theta - start, 2.0 * PI * (0.05 + 0.05 * 0.95)));
    }

    #[test]
    fn polar_angle_stays_off_the_poles() {
        let mut camera = Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0));
        let mut controller = CameraController::new(1.0, 1.0, 1.0);
        controller.set_viewport_height(10);
        controller.handle_mouse(0.0, 1000.0);
        controller.update(&mut camera);
        assert_eq!(camera.phi, POLAR_EPSILON);
        assert!(camera.calc_matrix().x.x.is_finite());
    }

    #[test]
    fn zoom_respects_distance_limits() {
        let mut camera = Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0));
        let mut controller = CameraController::new(0.05, 1.0, 1.0);
        controller.min_distance = 9.8;

        controller.handle_scroll(1.0);
        controller.update(&mut camera);
        assert!(close(camera.radius, 9.8));

        controller.handle_scroll(-1.0);
        controller.update(&mut camera);
        assert!(close(camera.radius, 9.8 / 0.95));
    }
}
