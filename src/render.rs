//! Render composition.
//!
//! Flows describe what to draw with a [`Render`] value. The context flattens
//! it into one batch of [`Instanced`] draws for the basic pipeline.

use crate::data_structures::{model::GpuPrimitive, scene_graph::Scene};

/// One primitive drawn with an instance buffer.
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub primitive: &'a GpuPrimitive,
    pub amount: usize,
    /// Joint matrices for skinned primitives.
    pub skin: Option<&'a wgpu::BindGroup>,
}

/// Specifies what a flow wants drawn this frame.
///
/// - `None` renders nothing
/// - `Defaults(Vec<Instanced>)` renders a batch of opaque instanced primitives
/// - `Composed(Vec<Render>)` recursively renders a composition of renders
pub enum Render<'a> {
    None,
    Defaults(Vec<Instanced<'a>>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn collect_into(self, basics: &mut Vec<Instanced<'a>>) {
        match self {
            Render::Defaults(mut vec) => basics.append(&mut vec),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.collect_into(basics)),
            Render::None => (),
        }
    }
}

impl<'a> From<&'a Scene> for Render<'a> {
    fn from(scene: &'a Scene) -> Self {
        Render::Defaults(scene.get_render())
    }
}
