//! Skeletal skinning.
//!
//! A [`Skin`] binds the vertices of a mesh node to joint nodes. Every frame
//! the joint matrices are recomputed from the joints' world transforms; the
//! vertex shader blends up to four of them per vertex, weighted by the
//! vertex's `weights`.

use cgmath::{Matrix4, SquareMatrix, Vector3, Zero};
use wgpu::util::DeviceExt;

use crate::data_structures::model::ModelVertex;

/// Joints the shader's uniform array holds. Must match `basic.wgsl`.
pub const MAX_JOINTS: usize = 128;

#[derive(Clone, Debug, PartialEq)]
pub struct Skin {
    /// glTF node indices of the joints, in the order vertex joint indices use.
    joints: Vec<usize>,
    inverse_bind_matrices: Vec<Matrix4<f32>>,
    joint_matrices: Vec<Matrix4<f32>>,
}

impl Skin {
    /// Missing inverse bind matrices are identity, as in glTF.
    pub fn new(joints: Vec<usize>, mut inverse_bind_matrices: Vec<Matrix4<f32>>) -> Self {
        inverse_bind_matrices.resize(joints.len(), Matrix4::identity());
        Self {
            joint_matrices: vec![Matrix4::identity(); joints.len()],
            joints,
            inverse_bind_matrices,
        }
    }

    pub fn joints(&self) -> &[usize] {
        &self.joints
    }

    pub fn joint_matrices(&self) -> &[Matrix4<f32>] {
        &self.joint_matrices
    }

    /// Recomputes the joint matrices relative to the skinned node.
    ///
    /// `mesh_world` is the world matrix of the node that owns the skinned
    /// mesh, `joint_world` looks up the world matrix of a joint by glTF node
    /// index. Joints that cannot be found keep the bind pose.
    pub fn update(
        &mut self,
        mesh_world: Matrix4<f32>,
        joint_world: impl Fn(usize) -> Option<Matrix4<f32>>,
    ) {
        let to_mesh = mesh_world.invert().unwrap_or_else(Matrix4::identity);
        for (i, &joint) in self.joints.iter().enumerate() {
            self.joint_matrices[i] = match joint_world(joint) {
                Some(world) => to_mesh * world * self.inverse_bind_matrices[i],
                None => Matrix4::identity(),
            };
        }
    }

    /// Blend of the joint matrices a vertex is bound to.
    ///
    /// Vertices without weight are not deformed.
    pub fn skin_matrix(&self, joints: [u32; 4], weights: [f32; 4]) -> Matrix4<f32> {
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            return Matrix4::identity();
        }
        joints
            .iter()
            .zip(weights)
            .filter(|(_, weight)| *weight != 0.0)
            .map(|(&joint, weight)| {
                let matrix = self
                    .joint_matrices
                    .get(joint as usize)
                    .copied()
                    .unwrap_or_else(Matrix4::identity);
                matrix * weight
            })
            .fold(Matrix4::zero(), |sum, m| sum + m)
    }

    /// Where `vertex` ends up in the skinned node's local space.
    pub fn skin_position(&self, vertex: &ModelVertex) -> Vector3<f32> {
        let position = Vector3::from(vertex.position).extend(1.0);
        (self.skin_matrix(vertex.joints, vertex.weights) * position).truncate()
    }

    fn to_raw(&self) -> SkinUniform {
        let mut joints = [IDENTITY; MAX_JOINTS];
        for (slot, matrix) in joints.iter_mut().zip(&self.joint_matrices) {
            *slot = (*matrix).into();
        }
        SkinUniform { joints }
    }
}

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SkinUniform {
    joints: [[[f32; 4]; 4]; MAX_JOINTS],
}

/// Joint matrix buffer and its bind group (group 3 of the basic pipeline).
pub struct GpuSkin {
    buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl GpuSkin {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, skin: &Skin) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skin Buffer"),
            contents: bytemuck::cast_slice(&[skin.to_raw()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("skin_bind_group"),
        });
        Self { buffer, bind_group }
    }

    /// Bound for meshes without a skin; their vertices carry no weights.
    pub fn unskinned(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        Self::new(device, layout, &Skin::new(Vec::new(), Vec::new()))
    }

    pub fn update(&self, queue: &wgpu::Queue, skin: &Skin) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[skin.to_raw()]));
    }
}

pub fn skin_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("skin_bind_group_layout"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(position: [f32; 3], joints: [u32; 4], weights: [f32; 4]) -> ModelVertex {
        ModelVertex {
            position,
            joints,
            weights,
            ..Default::default()
        }
    }

    #[test]
    fn bind_pose_leaves_vertices_in_place() {
        let bind = Matrix4::from_translation(Vector3::new(0.0, 1.0, 0.0));
        let mut skin = Skin::new(vec![4], vec![bind.invert().unwrap()]);
        skin.update(Matrix4::identity(), |_| Some(bind));

        let v = vertex([0.0, 2.0, 0.0], [0, 0, 0, 0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(skin.skin_position(&v), Vector3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn weights_blend_joint_motion() {
        let mut skin = Skin::new(vec![0, 1], Vec::new());
        skin.update(Matrix4::identity(), |joint| {
            Some(Matrix4::from_translation(Vector3::new(joint as f32 * 2.0, 0.0, 0.0)))
        });

        let v = vertex([0.0, 0.0, 0.0], [0, 1, 0, 0], [0.5, 0.5, 0.0, 0.0]);
        assert_eq!(skin.skin_position(&v), Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn joint_motion_is_relative_to_the_skinned_node() {
        let node = Matrix4::from_translation(Vector3::new(5.0, 0.0, 0.0));
        let mut skin = Skin::new(vec![0], Vec::new());
        skin.update(node, |_| Some(node));
        assert_eq!(skin.joint_matrices()[0], Matrix4::identity());
    }

    #[test]
    fn unweighted_vertices_and_unknown_joints_stay_put() {
        let mut skin = Skin::new(vec![7], Vec::new());
        skin.update(Matrix4::identity(), |_| None);

        let unweighted = vertex([1.0, 2.0, 3.0], [0, 0, 0, 0], [0.0; 4]);
        assert_eq!(skin.skin_position(&unweighted), Vector3::new(1.0, 2.0, 3.0));
        let orphaned = vertex([1.0, 2.0, 3.0], [0, 0, 0, 0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(skin.skin_position(&orphaned), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn joint_uniform_fits_webgl_limits() {
        assert!(std::mem::size_of::<SkinUniform>() <= 16 * 1024);
    }
}
