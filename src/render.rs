//! Render composition and pipeline batching.
//!
//! Scene nodes describe themselves as a [`Render`]. Each frame the flow loop
//! flattens all renders into [`Batches`]: opaque and transparent instanced
//! draws plus custom closures. The shadow passes reuse the same batches and
//! draw everything flagged with `cast_shadow`.

use wgpu::RenderPass;

use crate::{
    context::Context,
    data_structures::{model::Model, scene_graph::SceneNode},
};

/// Data for instanced object rendering: a model and its instance buffer.
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub amount: usize,
    pub cast_shadow: bool,
    pub transparent: bool,
}

/// Specifies how a scene object should be rendered.
///
/// - `None` renders nothing
/// - `Default(Instanced)` / `Defaults(Vec<Instanced>)` render opaque objects
/// - `Transparent(Instanced)` / `Transparents(Vec<Instanced>)` render blended
///   objects after the opaque batch, in submission order
/// - `Composed(Vec<Render>)` recursively renders a composition
/// - `Custom(...)` runs a closure inside the main pass after both batches
pub enum Render<'a, 'pass>
where
    'pass: 'a,
{
    None,
    Default(Instanced<'a>),
    Defaults(Vec<Instanced<'a>>),
    Transparent(Instanced<'a>),
    Transparents(Vec<Instanced<'a>>),
    Composed(Vec<Render<'a, 'pass>>),
    Custom(Box<dyn 'a + FnOnce(&Context, &mut wgpu::RenderPass<'pass>)>),
}

/// Flattened draws of one frame.
pub struct Batches<'a, 'pass> {
    pub basics: Vec<Instanced<'a>>,
    pub trans: Vec<Instanced<'a>>,
    pub customs: Vec<Box<dyn 'a + FnOnce(&Context, &mut RenderPass<'pass>)>>,
}

impl<'a, 'pass> Default for Batches<'a, 'pass> {
    fn default() -> Self {
        Self {
            basics: Vec::new(),
            trans: Vec::new(),
            customs: Vec::new(),
        }
    }
}

impl<'a, 'pass> Batches<'a, 'pass> {
    pub fn shadow_casters(&self) -> Vec<&Instanced<'a>> {
        self.basics
            .iter()
            .chain(self.trans.iter())
            .filter(|instanced| instanced.cast_shadow)
            .collect()
    }
}

impl<'a, 'pass> Render<'a, 'pass> {
    pub(crate) fn set_pipelines(self, batches: &mut Batches<'a, 'pass>) {
        match self {
            Render::Default(instanced) => batches.basics.push(instanced),
            Render::Defaults(mut vec) => batches.basics.append(&mut vec),
            Render::Transparent(instanced) => batches.trans.push(instanced),
            Render::Transparents(mut vec) => batches.trans.append(&mut vec),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(batches)),
            Render::Custom(f) => batches.customs.push(f),
            Render::None => (),
        }
    }
}

impl<'a, 'pass> From<&'a dyn SceneNode> for Render<'a, 'pass> {
    fn from(sn: &'a dyn SceneNode) -> Self {
        let (trans, basics): (Vec<_>, Vec<_>) = sn
            .get_render()
            .into_iter()
            .partition(|instanced| instanced.transparent);
        Render::Composed(vec![Render::Defaults(basics), Render::Transparents(trans)])
    }
}
