use crate::{
    data_structures::{
        instance::InstanceRaw,
        model::{ModelVertex, Vertex},
        texture::Texture,
    },
    pipelines::basic::{SceneLayouts, mk_render_pipeline, pbr_shader},
};

/// Same shading as the basic pipeline, blended over what is already drawn.
/// Alpha comes from the colour map, the tint and the optional alpha map.
pub fn mk_transparent_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    layouts: &SceneLayouts,
) -> wgpu::RenderPipeline {
    let layout = layouts.pipeline_layout(device, "Transparent Pipeline Layout");
    mk_render_pipeline(
        device,
        &layout,
        color_format,
        Some(wgpu::BlendState::ALPHA_BLENDING),
        Some(Texture::DEPTH_FORMAT),
        &[ModelVertex::desc(), InstanceRaw::desc()],
        pbr_shader(),
    )
}
