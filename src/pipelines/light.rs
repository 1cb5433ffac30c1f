//! Scene lights and their GPU uniform.
//!
//! The [`LightRig`] is plain data edited through the panel; every change is
//! packed into a [`LightUniform`] and written to the light buffer.

use cgmath::Vector3;
use wgpu::util::DeviceExt;

#[derive(Clone, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub visible: bool,
    /// The light shines from here towards the origin.
    pub position: Vector3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub visible: bool,
    pub position: Vector3<f32>,
    /// Range after which the light has no effect, 0 means unlimited.
    pub distance: f32,
}

/// The three lights of the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct LightRig {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
    pub point: PointLight,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            ambient: AmbientLight {
                color: [1.0, 1.0, 1.0],
                intensity: 0.5,
                visible: true,
            },
            directional: DirectionalLight {
                color: [1.0, 1.0, 1.0],
                intensity: 1.0,
                visible: true,
                position: Vector3::new(5.0, 10.0, 7.5),
            },
            point: PointLight {
                color: [1.0, 1.0, 1.0],
                intensity: 1.0,
                visible: true,
                position: Vector3::new(-5.0, 5.0, 0.0),
                distance: 50.0,
            },
        }
    }
}

fn radiance(color: [f32; 3], intensity: f32, visible: bool) -> [f32; 4] {
    let intensity = if visible { intensity } else { 0.0 };
    [color[0] * intensity, color[1] * intensity, color[2] * intensity, 0.0]
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    ambient: [f32; 4],
    directional_color: [f32; 4],
    directional_position: [f32; 4],
    point_color: [f32; 4],
    /// w holds the cut-off distance.
    point_position: [f32; 4],
    /// w holds the environment intensity.
    sky_color: [f32; 4],
    ground_color: [f32; 4],
}

impl LightUniform {
    pub fn new(rig: &LightRig, environment_intensity: f32) -> Self {
        let d = rig.directional.position;
        let p = rig.point.position;
        Self {
            ambient: radiance(rig.ambient.color, rig.ambient.intensity, rig.ambient.visible),
            directional_color: radiance(
                rig.directional.color,
                rig.directional.intensity,
                rig.directional.visible,
            ),
            directional_position: [d.x, d.y, d.z, 0.0],
            point_color: radiance(rig.point.color, rig.point.intensity, rig.point.visible),
            point_position: [p.x, p.y, p.z, rig.point.distance],
            sky_color: [1.0, 1.0, 1.0, environment_intensity],
            ground_color: [0.45, 0.42, 0.40, environment_intensity],
        }
    }

    pub fn ambient(&self) -> [f32; 3] {
        [self.ambient[0], self.ambient[1], self.ambient[2]]
    }

    pub fn point_color(&self) -> [f32; 3] {
        [self.point_color[0], self.point_color[1], self.point_color[2]]
    }
}

pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, uniform: LightUniform) -> Self {
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn update(&mut self, queue: &wgpu::Queue, rig: &LightRig, environment_intensity: f32) {
        self.uniform = LightUniform::new(rig, environment_intensity);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}
