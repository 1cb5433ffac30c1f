//! Mesh and material data.
//!
//! Decoded geometry lives on the CPU in [`Primitive`]s so that loading,
//! placement and bounds work without a GPU. Buffers and bind groups are created
//! lazily the first time a node is written to the GPU.

use std::{ops::Range, sync::Arc, sync::OnceLock};

use cgmath::Vector3;
use wgpu::util::DeviceExt;

use crate::data_structures::{bounds::Aabb, texture::Texture};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    /// Skin joint indices, only meaningful where the matching weight is set.
    pub joints: [u32; 4],
    /// All zero for vertices that are not skinned.
    pub weights: [f32; 4],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Uint32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct MaterialUniform {
    base_color: [f32; 4],
}

/// GPU side of a [`Material`].
pub struct GpuMaterial {
    pub bind_group: wgpu::BindGroup,
    _uniform: wgpu::Buffer,
    _texture: Texture,
}

/// Unlit surface description; lighting happens in the shader.
///
/// Shared by all primitives that reference it, so the texture is uploaded once.
pub struct Material {
    pub name: String,
    /// Linear RGBA multiplier.
    pub base_color: [f32; 4],
    /// Decoded sRGB base colour image.
    pub base_color_texture: Option<image::RgbaImage>,
    gpu: OnceLock<GpuMaterial>,
}

impl Material {
    pub fn new(
        name: impl Into<String>,
        base_color: [f32; 4],
        base_color_texture: Option<image::RgbaImage>,
    ) -> Self {
        Self {
            name: name.into(),
            base_color,
            base_color_texture,
            gpu: OnceLock::new(),
        }
    }

    /// Material with a flat sRGB colour given as `0xRRGGBB`.
    pub fn from_hex(name: impl Into<String>, rgb: u32) -> Self {
        let [r, g, b] = hex_to_linear(rgb);
        Self::new(name, [r, g, b, 1.0], None)
    }

    pub fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
    ) -> &GpuMaterial {
        self.gpu.get_or_init(|| {
            let texture = match &self.base_color_texture {
                Some(img) => Texture::from_rgba(device, queue, img, Some(&self.name)),
                None => Texture::white(device, queue),
            };
            let sampler = texture
                .sampler
                .clone()
                .unwrap_or_else(|| crate::data_structures::texture::create_default_sampler(device));
            let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Material Buffer", self.name)),
                contents: bytemuck::cast_slice(&[MaterialUniform {
                    base_color: self.base_color,
                }]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniform.as_entire_binding(),
                    },
                ],
                label: Some(&self.name),
            });
            GpuMaterial {
                bind_group,
                _uniform: uniform,
                _texture: texture,
            }
        })
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("name", &self.name)
            .field("base_color", &self.base_color)
            .field("textured", &self.base_color_texture.is_some())
            .finish()
    }
}

/// Layout of the per-material bind group (group 0 of the basic pipeline).
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

/// One drawable piece of a mesh: triangle list plus its material.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Arc<Material>,
}

impl Primitive {
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|v| Vector3::from(v.position)))
    }

    /// Horizontal plane centred on the origin, facing +Y.
    pub fn plane(width: f32, depth: f32, material: Arc<Material>) -> Self {
        let (hw, hd) = (width / 2.0, depth / 2.0);
        let vertex = |x: f32, z: f32, u: f32, v: f32| ModelVertex {
            position: [x, 0.0, z],
            tex_coords: [u, v],
            normal: [0.0, 1.0, 0.0],
            ..Default::default()
        };
        Self {
            vertices: vec![
                vertex(-hw, -hd, 0.0, 0.0),
                vertex(-hw, hd, 0.0, 1.0),
                vertex(hw, hd, 1.0, 1.0),
                vertex(hw, -hd, 1.0, 0.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
            material,
        }
    }

    pub fn upload(&self, label: &str, device: &wgpu::Device) -> GpuPrimitive {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", label)),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", label)),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        GpuPrimitive {
            vertex_buffer,
            index_buffer,
            num_elements: self.indices.len() as u32,
            material: self.material.clone(),
        }
    }
}

pub struct GpuPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material: Arc<Material>,
}

pub trait DrawModel {
    fn draw_primitive_instanced(
        &mut self,
        primitive: &GpuPrimitive,
        material: &GpuMaterial,
        instances: Range<u32>,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
        skin_bind_group: &wgpu::BindGroup,
    );
}

impl DrawModel for wgpu::RenderPass<'_> {
    fn draw_primitive_instanced(
        &mut self,
        primitive: &GpuPrimitive,
        material: &GpuMaterial,
        instances: Range<u32>,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
        skin_bind_group: &wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
        self.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, light_bind_group, &[]);
        self.set_bind_group(3, skin_bind_group, &[]);
        self.draw_indexed(0..primitive.num_elements, 0, instances);
    }
}

/// Converts an sRGB `0xRRGGBB` colour into linear RGB components.
pub fn hex_to_linear(rgb: u32) -> [f32; 3] {
    let channel = |shift: u32| {
        let c = ((rgb >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0)]
}
