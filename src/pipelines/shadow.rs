//! Shadow maps for the directional light and the cube shadows of point lights.
//!
//! All maps share one layered depth texture: layer 0 belongs to the
//! directional light, layers `1 + 6k .. 1 + 6k + 6` to the six cube faces of
//! point shadow `k`. The lit shaders read the same matrices from
//! [`ShadowUniform`] that the depth passes rendered with.

use cgmath::{Deg, Matrix4, Point3, Vector3, ortho, perspective};
use wgpu::util::DeviceExt;

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    config::ShadowConfig,
    data_structures::{
        instance::InstanceRaw,
        model::{DrawShadow, ModelVertex, Vertex},
        texture::Texture,
    },
    render::Instanced,
};

pub const MAX_SHADOWED_POINT_LIGHTS: usize = 3;
pub const SHADOW_LAYERS: usize = 1 + 6 * MAX_SHADOWED_POINT_LIGHTS;
const DEPTH_BIAS: f32 = 0.0005;

/// Viewing direction and up vector of each cube face, in +X, -X, +Y, -Y, +Z, -Z order.
const CUBE_FACES: [([f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, -1.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
    ([0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
];

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniform {
    pub matrices: [[[f32; 4]; 4]; SHADOW_LAYERS],
    /// x: enabled, y: texel size, z: depth bias
    pub params: [f32; 4],
}

pub fn directional_matrix(position: Point3<f32>, config: &ShadowConfig) -> Matrix4<f32> {
    let e = config.directional_extent;
    let view = Matrix4::look_at_rh(position, Point3::new(0.0, 0.0, 0.0), Vector3::unit_y());
    OPENGL_TO_WGPU_MATRIX * ortho(-e, e, -e, e, config.directional_near, config.directional_far) * view
}

pub fn cube_face_matrices(position: Point3<f32>, near: f32, far: f32) -> [Matrix4<f32>; 6] {
    let projection = OPENGL_TO_WGPU_MATRIX * perspective(Deg(90.0), 1.0, near, far);
    CUBE_FACES.map(|(direction, up)| {
        let view = Matrix4::look_at_rh(position, position + Vector3::from(direction), up.into());
        projection * view
    })
}

/// The face of a cube shadow whose frustum contains `direction` (light to fragment).
pub fn cube_face(direction: Vector3<f32>) -> usize {
    let a = direction.map(f32::abs);
    if a.x >= a.y && a.x >= a.z {
        if direction.x > 0.0 { 0 } else { 1 }
    } else if a.y >= a.z {
        if direction.y > 0.0 { 2 } else { 3 }
    } else if direction.z > 0.0 {
        4
    } else {
        5
    }
}

pub struct ShadowResources {
    pub enabled: bool,
    config: ShadowConfig,
    pub maps: Texture,
    layer_views: Vec<wgpu::TextureView>,
    view_buffers: Vec<wgpu::Buffer>,
    view_bind_groups: Vec<wgpu::BindGroup>,
    pub uniform: ShadowUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    point_shadows: usize,
}

impl std::fmt::Debug for ShadowResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowResources")
            .field("enabled", &self.enabled)
            .field("map_size", &self.config.map_size)
            .field("point_shadows", &self.point_shadows)
            .finish()
    }
}

impl ShadowResources {
    pub fn new(device: &wgpu::Device, config: &ShadowConfig, directional_position: Point3<f32>) -> Self {
        let (maps, layer_views) =
            Texture::create_shadow_array(device, config.map_size, SHADOW_LAYERS as u32, "shadow maps");

        let mut uniform = ShadowUniform {
            matrices: [[[0.0; 4]; 4]; SHADOW_LAYERS],
            params: [
                if config.enabled { 1.0 } else { 0.0 },
                1.0 / config.map_size.max(1) as f32,
                DEPTH_BIAS,
                0.0,
            ],
        };
        uniform.matrices[0] = directional_matrix(directional_position, config).into();

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Shadow Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        sample_type: wgpu::TextureSampleType::Depth,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
            label: Some("shadow_bind_group_layout"),
        });
        let fallback_sampler;
        let sampler = match &maps.sampler {
            Some(sampler) => sampler,
            None => {
                fallback_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                    compare: Some(wgpu::CompareFunction::LessEqual),
                    ..Default::default()
                });
                &fallback_sampler
            }
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&maps.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some("shadow_bind_group"),
        });

        let view_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
            label: Some("shadow_view_bind_group_layout"),
        });
        let view_buffers: Vec<_> = uniform
            .matrices
            .iter()
            .enumerate()
            .map(|(layer, matrix)| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("Shadow View Buffer {layer}")),
                    contents: bytemuck::cast_slice(&[*matrix]),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                })
            })
            .collect();
        let view_bind_groups = view_buffers
            .iter()
            .map(|buffer| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &view_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                    label: Some("shadow_view_bind_group"),
                })
            })
            .collect();

        let pipeline = mk_shadow_pipeline(device, &view_layout);

        Self {
            enabled: config.enabled,
            config: config.clone(),
            maps,
            layer_views,
            view_buffers,
            view_bind_groups,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
            pipeline,
            point_shadows: 0,
        }
    }

    /// Moves cube shadow `index`; indices past [`MAX_SHADOWED_POINT_LIGHTS`] are ignored.
    pub fn set_point(&mut self, index: usize, position: Point3<f32>) {
        if index >= MAX_SHADOWED_POINT_LIGHTS {
            return;
        }
        self.point_shadows = self.point_shadows.max(index + 1);
        let faces = cube_face_matrices(position, self.config.point_near, self.config.point_far);
        for (face, matrix) in faces.into_iter().enumerate() {
            self.uniform.matrices[1 + 6 * index + face] = matrix.into();
        }
    }

    fn active_layers(&self) -> usize {
        1 + 6 * self.point_shadows
    }

    pub fn write_to_buffer(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
        for (buffer, matrix) in self.view_buffers.iter().zip(&self.uniform.matrices).take(self.active_layers()) {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[*matrix]));
        }
    }

    /// Renders every active shadow layer with the given casters.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, casters: &[&Instanced<'_>]) {
        if !self.enabled {
            return;
        }
        for layer in 0..self.active_layers() {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.layer_views[layer],
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.pipeline);
            for instanced in casters {
                if instanced.amount == 0 {
                    continue;
                }
                pass.set_vertex_buffer(1, instanced.instance.slice(..));
                pass.draw_model_shadow(instanced.model, 0..instanced.amount as u32, &self.view_bind_groups[layer]);
            }
        }
    }
}

fn mk_shadow_pipeline(device: &wgpu::Device, view_layout: &wgpu::BindGroupLayout) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Shadow Pipeline Layout"),
        bind_group_layouts: &[view_layout],
        immediate_size: 0,
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Shadow Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shadow.wgsl").into()),
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Shadow Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[ModelVertex::desc(), InstanceRaw::desc()],
            compilation_options: Default::default(),
        },
        fragment: None,
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // back faces only, which keeps lit surfaces free of acne
            cull_mode: Some(wgpu::Face::Front),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Transform};

    fn project(matrix: Matrix4<f32>, p: Point3<f32>) -> Vector3<f32> {
        let clip = matrix * p.to_homogeneous();
        clip.truncate() / clip.w
    }

    fn inside(ndc: Vector3<f32>) -> bool {
        ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0 && (0.0..=1.0).contains(&ndc.z)
    }

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<ShadowUniform>(), SHADOW_LAYERS * 64 + 16);
    }

    #[test]
    fn selected_cube_face_contains_the_fragment() {
        let light = Point3::new(4.0, 0.5, 0.0);
        let faces = cube_face_matrices(light, 0.5, 10.0);
        let directions = [
            Vector3::new(1.0, 0.2, -0.3),
            Vector3::new(-2.0, 1.0, 1.5),
            Vector3::new(0.1, 3.0, 0.2),
            Vector3::new(0.4, -1.0, -0.9),
            Vector3::new(-0.5, 0.3, 2.0),
            Vector3::new(0.9, -0.2, -1.0),
        ];
        for direction in directions {
            let p = light + direction.normalize() * 3.0;
            let face = cube_face(direction);
            assert!(inside(project(faces[face], p)), "{direction:?} not on face {face}");
        }
    }

    #[test]
    fn directional_box_covers_the_house() {
        let config = ShadowConfig::default();
        let matrix = directional_matrix(Point3::new(3.0, 2.0, -8.0), &config);
        for corner in [
            Point3::new(-2.0, 0.0, -2.0),
            Point3::new(2.0, 4.0, 2.0),
            Point3::new(-2.0, 2.5, 2.0),
        ] {
            assert!(inside(project(matrix, corner)));
        }
        let origin_depth = project(matrix, Point3::new(0.0, 0.0, 0.0)).z;
        let far_depth = project(matrix, Point3::new(-3.0, -2.0, 8.0)).z;
        assert!(origin_depth < far_depth);
        // the matrix is a proper transform
        assert!(matrix.inverse_transform().is_some());
    }
}
