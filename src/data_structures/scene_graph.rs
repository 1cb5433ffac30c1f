//! Scene graph and hierarchical scene organization.
//!
//! A loaded model is a tree of [`SceneNode`]s: [`ContainerNode`]s only group
//! and transform their children, [`ModelNode`]s additionally own mesh
//! primitives. The [`Scene`] hosts the independent roots (the floor and the
//! current model) and hands out [`NodeId`]s so that the owner of a root can
//! take it out again.

use std::collections::HashMap;

use cgmath::{Matrix4, Rad, Rotation3};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        bounds::Aabb,
        instance::{Instance, InstanceRaw},
        model::{GpuPrimitive, Primitive},
        skin::{GpuSkin, Skin},
    },
    render::Instanced,
};

pub trait SceneNode {
    fn name(&self) -> &str;

    /// Index of the glTF node this was built from, used to route animation channels.
    fn node_index(&self) -> Option<usize>;

    fn local_transform(&self) -> &Instance;

    fn local_transform_mut(&mut self) -> &mut Instance;

    fn world_transform(&self) -> &Instance;

    /// Recomputes this node's and all descendants' world transforms from the parent's.
    fn update_world_transforms(&mut self, parent: &Instance);

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    /// Bounds of the node's own geometry in its local space.
    fn local_bounds(&self) -> Option<Aabb> {
        None
    }

    /// Mesh primitives owned by this node itself.
    fn primitives(&self) -> &[Primitive] {
        &[]
    }

    /// Joints deforming this node's primitives.
    fn skin(&self) -> Option<&Skin> {
        None
    }

    fn skin_mut(&mut self) -> Option<&mut Skin> {
        None
    }

    /// Nodes that spin on their own when no clip animates the model.
    fn as_rotatable_mut(&mut self) -> Option<&mut dyn Rotatable> {
        None
    }

    /// Creates or refreshes the GPU buffers of this node and its descendants.
    ///
    /// `skin_layout` is the layout of the basic pipeline's joint matrix group.
    fn write_to_buffers(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        skin_layout: &wgpu::BindGroupLayout,
    );

    fn get_render(&self) -> Vec<Instanced<'_>>;
}

/// A node that turns around its local Y axis by a fixed amount every frame.
pub trait Rotatable {
    /// Radians per frame.
    fn rotation_speed(&self) -> f32;

    fn spin(&mut self);
}

/// State every node variant shares.
struct NodeCore {
    name: String,
    index: Option<usize>,
    local: Instance,
    world: Instance,
    children: Vec<Box<dyn SceneNode>>,
}

impl NodeCore {
    fn new(name: impl Into<String>, index: Option<usize>) -> Self {
        Self {
            name: name.into(),
            index,
            local: Instance::default(),
            world: Instance::default(),
            children: Vec::new(),
        }
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&self.world);
        }
    }
}

pub struct ContainerNode {
    core: NodeCore,
}

impl ContainerNode {
    pub fn new(name: impl Into<String>, index: Option<usize>) -> Self {
        Self {
            core: NodeCore::new(name, index),
        }
    }
}

impl SceneNode for ContainerNode {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn node_index(&self) -> Option<usize> {
        self.core.index
    }

    fn local_transform(&self) -> &Instance {
        &self.core.local
    }

    fn local_transform_mut(&mut self) -> &mut Instance {
        &mut self.core.local
    }

    fn world_transform(&self) -> &Instance {
        &self.core.world
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.core.update_world_transforms(parent);
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.core.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.core.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.core.children.push(child);
    }

    fn write_to_buffers(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        skin_layout: &wgpu::BindGroupLayout,
    ) {
        self.core
            .children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(device, queue, skin_layout));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.core
            .children
            .iter()
            .flat_map(|child| child.get_render())
            .collect()
    }
}

struct GpuNode {
    instance_buffer: wgpu::Buffer,
    primitives: Vec<GpuPrimitive>,
    skin: Option<GpuSkin>,
}

/// A node with mesh primitives.
pub struct ModelNode {
    core: NodeCore,
    primitives: Vec<Primitive>,
    rotation_speed: Option<f32>,
    skin: Option<Skin>,
    gpu: Option<GpuNode>,
}

impl ModelNode {
    pub fn new(name: impl Into<String>, index: Option<usize>, primitives: Vec<Primitive>) -> Self {
        Self {
            core: NodeCore::new(name, index),
            primitives,
            rotation_speed: None,
            skin: None,
            gpu: None,
        }
    }

    pub fn with_rotation_speed(mut self, speed: f32) -> Self {
        self.rotation_speed = Some(speed);
        self
    }

    pub fn with_skin(mut self, skin: Skin) -> Self {
        self.skin = Some(skin);
        self
    }
}

impl Rotatable for ModelNode {
    fn rotation_speed(&self) -> f32 {
        self.rotation_speed.unwrap_or(0.0)
    }

    fn spin(&mut self) {
        let step = cgmath::Quaternion::from_angle_y(Rad(self.rotation_speed()));
        self.core.local.rotation = self.core.local.rotation * step;
    }
}

impl SceneNode for ModelNode {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn node_index(&self) -> Option<usize> {
        self.core.index
    }

    fn local_transform(&self) -> &Instance {
        &self.core.local
    }

    fn local_transform_mut(&mut self) -> &mut Instance {
        &mut self.core.local
    }

    fn world_transform(&self) -> &Instance {
        &self.core.world
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.core.update_world_transforms(parent);
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.core.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.core.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.core.children.push(child);
    }

    fn local_bounds(&self) -> Option<Aabb> {
        self.primitives
            .iter()
            .filter_map(Primitive::bounds)
            .reduce(Aabb::union)
    }

    fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    fn skin(&self) -> Option<&Skin> {
        self.skin.as_ref()
    }

    fn skin_mut(&mut self) -> Option<&mut Skin> {
        self.skin.as_mut()
    }

    fn as_rotatable_mut(&mut self) -> Option<&mut dyn Rotatable> {
        if self.rotation_speed.is_some() {
            Some(self as &mut dyn Rotatable)
        } else {
            None
        }
    }

    fn write_to_buffers(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        skin_layout: &wgpu::BindGroupLayout,
    ) {
        let raw: [InstanceRaw; 1] = [self.core.world.to_raw()];
        if let Some(gpu) = &self.gpu {
            queue.write_buffer(&gpu.instance_buffer, 0, bytemuck::cast_slice(&raw));
            if let (Some(gpu_skin), Some(skin)) = (&gpu.skin, &self.skin) {
                gpu_skin.update(queue, skin);
            }
        } else {
            let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Instance Buffer"),
                contents: bytemuck::cast_slice(&raw),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
            let primitives = self
                .primitives
                .iter()
                .map(|primitive| primitive.upload(&self.core.name, device))
                .collect();
            let skin = self
                .skin
                .as_ref()
                .map(|skin| GpuSkin::new(device, skin_layout, skin));
            self.gpu = Some(GpuNode {
                instance_buffer,
                primitives,
                skin,
            });
        }
        self.core
            .children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(device, queue, skin_layout));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        let own = self.gpu.iter().flat_map(|gpu| {
            gpu.primitives.iter().map(move |primitive| Instanced {
                instance: &gpu.instance_buffer,
                primitive,
                amount: 1,
                skin: gpu.skin.as_ref().map(|skin| &skin.bind_group),
            })
        });
        self.core
            .children
            .iter()
            .flat_map(|child| child.get_render())
            .chain(own)
            .collect()
    }
}

/// Visits `node` and all of its descendants, parents first.
pub fn for_each_node_mut(node: &mut dyn SceneNode, f: &mut dyn FnMut(&mut dyn SceneNode)) {
    f(node);
    for child in node.get_children_mut().iter_mut() {
        for_each_node_mut(child.as_mut(), f);
    }
}

/// Recomputes the joint matrices of every skin under `root`.
///
/// Joints are looked up by glTF node index among `root`'s descendants, so
/// world transforms must be current.
pub fn update_skins(root: &mut dyn SceneNode) {
    let mut joint_worlds: HashMap<usize, Matrix4<f32>> = HashMap::new();
    let mut skinned = false;
    for_each_node_mut(root, &mut |node| {
        if let Some(index) = node.node_index() {
            joint_worlds.insert(index, node.world_transform().to_matrix());
        }
        skinned |= node.skin().is_some();
    });
    if !skinned {
        return;
    }
    for_each_node_mut(root, &mut |node| {
        let mesh_world = node.world_transform().to_matrix();
        if let Some(skin) = node.skin_mut() {
            skin.update(mesh_world, |joint| joint_worlds.get(&joint).copied());
        }
    });
}

/// Union of all geometry under `node` in world space.
///
/// Uses the world transforms as of the last [`SceneNode::update_world_transforms`].
pub fn world_bounds(node: &dyn SceneNode) -> Option<Aabb> {
    let own = node
        .local_bounds()
        .map(|bounds| bounds.transformed(node.world_transform()));
    node.get_children()
        .iter()
        .filter_map(|child| world_bounds(child.as_ref()))
        .chain(own)
        .reduce(Aabb::union)
}

/// Scales `root` uniformly, then moves it so that its bounds rest on the
/// ground plane (min Y = 0) and are centred on the X/Z origin.
pub fn place_on_ground(root: &mut dyn SceneNode, scale: f32) {
    let local = root.local_transform_mut();
    local.set_uniform_scale(scale);
    local.position = cgmath::Vector3::new(0.0, 0.0, 0.0);
    root.update_world_transforms(&Instance::new());

    if let Some(bounds) = world_bounds(root) {
        let center = bounds.center();
        root.local_transform_mut().position =
            cgmath::Vector3::new(-center.x, -bounds.min.y, -center.z);
        root.update_world_transforms(&Instance::new());
    }
}

/// Handle to a root node hosted by a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

/// The scene host: an ordered set of independent root nodes.
#[derive(Default)]
pub struct Scene {
    roots: Vec<(NodeId, Box<dyn SceneNode>)>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: Box<dyn SceneNode>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.roots.push((id, node));
        id
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Box<dyn SceneNode>> {
        let pos = self.roots.iter().position(|(root_id, _)| *root_id == id)?;
        Some(self.roots.remove(pos).1)
    }

    pub fn get(&self, id: NodeId) -> Option<&dyn SceneNode> {
        self.roots
            .iter()
            .find(|(root_id, _)| *root_id == id)
            .map(|(_, node)| node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut dyn SceneNode> {
        self.roots
            .iter_mut()
            .find(|(root_id, _)| *root_id == id)
            .map(|(_, node)| node.as_mut() as &mut dyn SceneNode)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.roots.iter().map(|(id, _)| *id)
    }

    /// Advances every rotatable node by one step and returns how many turned.
    pub fn spin_rotatables(&mut self) -> usize {
        let mut spun = 0;
        for (_, root) in self.roots.iter_mut() {
            for_each_node_mut(root.as_mut(), &mut |node| {
                if let Some(rotatable) = node.as_rotatable_mut() {
                    rotatable.spin();
                    spun += 1;
                }
            });
        }
        spun
    }

    /// Recomputes world transforms, then the skins that depend on them.
    pub fn update_world_transforms(&mut self) {
        let identity = Instance::new();
        for (_, root) in self.roots.iter_mut() {
            root.update_world_transforms(&identity);
            update_skins(root.as_mut());
        }
    }

    pub fn write_to_buffers(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        skin_layout: &wgpu::BindGroupLayout,
    ) {
        for (_, root) in self.roots.iter_mut() {
            root.write_to_buffers(device, queue, skin_layout);
        }
    }

    pub fn get_render(&self) -> Vec<Instanced<'_>> {
        self.roots
            .iter()
            .flat_map(|(_, root)| root.get_render())
            .collect()
    }
}
