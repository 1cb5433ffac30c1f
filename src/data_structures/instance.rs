//! Node transformation data for GPU rendering.
//!
//! Every scene node carries a local and a world [`Instance`]. The world
//! instance is packed into an [`InstanceRaw`] and uploaded as a per-instance
//! vertex buffer so the vertex shader can place the node's meshes.

use std::ops::Mul;

use cgmath::{Matrix, One, SquareMatrix};

use crate::data_structures::model;

/// Transformation as position, rotation (quaternion) and per-axis scale.
///
/// Applied in the order scale, rotate, translate.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = cgmath::Vector3::new(scale, scale, scale);
    }

    /// Maps a point from this transform's local space into its parent space.
    pub fn transform_point(&self, point: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
        let scaled = cgmath::Vector3::new(
            self.scale.x * point.x,
            self.scale.y * point.y,
            self.scale.z * point.z,
        );
        self.position + self.rotation * scaled
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Inverse transpose of the linear part, so normals stay perpendicular to
    /// surfaces under non-uniform scale. Degenerate scales fall back to the
    /// rotation alone.
    pub fn normal_matrix(&self) -> cgmath::Matrix3<f32> {
        let m = self.to_matrix();
        let linear = cgmath::Matrix3::from_cols(m.x.truncate(), m.y.truncate(), m.z.truncate());
        linear
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(|| cgmath::Matrix3::from(self.rotation))
    }

    pub fn to_raw(&self) -> InstanceRaw {
        let world_matrix = self.to_matrix();
        let handedness = world_matrix.determinant().signum();
        InstanceRaw {
            model: world_matrix.into(),
            normal: self.normal_matrix().into(),
            handedness,
        }
    }
}

impl<'a, 'b> Mul<&'b Instance> for &'a Instance {
    type Output = Instance;

    /// Composes `self` (parent) with `rhs` (child) into the child's world transform.
    fn mul(self, rhs: &'b Instance) -> Self::Output {
        let scale = cgmath::Vector3::new(
            self.scale.x * rhs.scale.x,
            self.scale.y * rhs.scale.y,
            self.scale.z * rhs.scale.z,
        );
        Instance {
            position: self.transform_point(rhs.position),
            rotation: self.rotation * rhs.rotation,
            scale,
        }
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    handedness: f32,
}

/**
 * Stride layout: the model matrix as four vec4 slots, the normal matrix as three
 * vec3 slots and the handedness sign of the world matrix.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // The shader only advances to the next element when it starts a new instance
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Rad, Rotation3, Vector3};

    use super::*;

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).x.abs() < 1e-5 && (a - b).y.abs() < 1e-5 && (a - b).z.abs() < 1e-5
    }

    #[test]
    fn parent_scale_applies_to_child_offset() {
        let mut parent = Instance::new();
        parent.set_uniform_scale(0.5);
        parent.position = Vector3::new(1.0, 0.0, 0.0);
        let child = Instance::from(Vector3::new(4.0, 2.0, 0.0));

        let world = &parent * &child;
        assert!(close(world.position, Vector3::new(3.0, 1.0, 0.0)));
        assert!(close(world.scale, Vector3::new(0.5, 0.5, 0.5)));
    }

    #[test]
    fn normals_stay_perpendicular_under_non_uniform_scale() {
        use cgmath::InnerSpace;

        let mut t = Instance::new();
        t.rotation = cgmath::Quaternion::from_angle_z(Rad(0.4));
        t.scale = Vector3::new(3.0, 1.0, 1.0);

        // a 45 degree slope in the XY plane and its normal
        let along = Vector3::new(1.0, 1.0, 0.0);
        let normal = Vector3::new(-1.0, 1.0, 0.0);

        let m = t.to_matrix();
        let world_along = (m * along.extend(0.0)).truncate();
        let world_normal = t.normal_matrix() * normal;
        assert!(world_along.dot(world_normal).abs() < 1e-5);

        let rotated_only = cgmath::Matrix3::from(t.rotation) * normal;
        assert!(world_along.dot(rotated_only).abs() > 0.1);
    }

    #[test]
    fn zero_scale_falls_back_to_the_rotation() {
        let mut t = Instance::new();
        t.rotation = cgmath::Quaternion::from_angle_y(Rad(1.0));
        t.set_uniform_scale(0.0);
        assert_eq!(t.normal_matrix(), cgmath::Matrix3::from(t.rotation));
    }

    #[test]
    fn transform_point_matches_matrix() {
        let mut t = Instance::new();
        t.position = Vector3::new(0.0, 1.0, -2.0);
        t.rotation = cgmath::Quaternion::from_angle_y(Rad(0.7));
        t.scale = Vector3::new(2.0, 1.0, 3.0);
        let p = Vector3::new(0.3, -1.0, 2.0);

        let by_matrix = (t.to_matrix() * p.extend(1.0)).truncate();
        assert!(close(t.transform_point(p), by_matrix));
    }
}
