//! Physically based daylight backdrop (Preetham scattering model).

use cgmath::{InnerSpace, Vector3};
use wgpu::util::DeviceExt;

use crate::{config::SkyConfig, data_structures::texture::Texture};

const TOTAL_RAYLEIGH: [f64; 3] = [5.804542996261093e-6, 1.3562911419845635e-5, 3.0265902468824876e-5];
const MIE_CONST: [f64; 3] = [1.8399918514433978e14, 2.7798023919660528e14, 4.0790479543861094e14];
const CUTOFF_ANGLE: f64 = 1.6110731556870734;
const STEEPNESS: f64 = 1.5;
const EE: f64 = 1000.0;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkyUniform {
    pub sun: [f32; 4],
    pub beta_r: [f32; 4],
    pub beta_m: [f32; 4],
    pub up: [f32; 4],
}

/// Irradiance of the sun for the cosine of its zenith angle.
pub fn sun_intensity(zenith_angle_cos: f64) -> f64 {
    let zenith_angle_cos = zenith_angle_cos.clamp(-1.0, 1.0);
    EE * (1.0 - (-((CUTOFF_ANGLE - zenith_angle_cos.acos()) / STEEPNESS)).exp()).max(0.0)
}

fn total_mie(turbidity: f64) -> [f64; 3] {
    let c = (0.2 * turbidity) * 10e-18;
    MIE_CONST.map(|k| 0.434 * c * k)
}

impl SkyUniform {
    pub fn new(config: &SkyConfig) -> Self {
        let [x, y, z] = config.sun_position.map(f64::from);
        let position = Vector3::new(x, y, z);
        let direction = if position.magnitude2() > 0.0 {
            position.normalize()
        } else {
            Vector3::unit_y()
        };
        let sun_e = sun_intensity(direction.y);
        let sun_fade = 1.0 - (1.0 - (y / 450000.0).exp()).clamp(0.0, 1.0);
        let rayleigh = f64::from(config.rayleigh) - (1.0 - sun_fade);
        let beta_r = TOTAL_RAYLEIGH.map(|k| k * rayleigh);
        let beta_m = total_mie(f64::from(config.turbidity)).map(|k| k * f64::from(config.mie_coefficient));

        Self {
            sun: [direction.x as f32, direction.y as f32, direction.z as f32, sun_e as f32],
            beta_r: [beta_r[0] as f32, beta_r[1] as f32, beta_r[2] as f32, sun_fade as f32],
            beta_m: [
                beta_m[0] as f32,
                beta_m[1] as f32,
                beta_m[2] as f32,
                config.mie_directional_g,
            ],
            up: [0.0, 1.0, 0.0, config.scale * 0.5],
        }
    }
}

#[derive(Debug)]
pub struct SkyResources {
    pub uniform: SkyUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub pipeline: wgpu::RenderPipeline,
}

impl SkyResources {
    pub fn new(
        device: &wgpu::Device,
        config: &SkyConfig,
        camera_layout: &wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let uniform = SkyUniform::new(config);
        log::debug!("sky: sun {:?}, fade {}", uniform.sun, uniform.beta_r[3]);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sky Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
            label: Some("sky_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("sky_bind_group"),
        });
        let pipeline = mk_sky_pipeline(device, camera_layout, &layout, color_format);
        Self {
            uniform,
            buffer,
            bind_group,
            pipeline,
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, camera_bind_group: &wgpu::BindGroup) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera_bind_group, &[]);
        pass.set_bind_group(1, &self.bind_group, &[]);
        pass.draw(0..36, 0..1);
    }
}

fn mk_sky_pipeline(
    device: &wgpu::Device,
    camera_layout: &wgpu::BindGroupLayout,
    sky_layout: &wgpu::BindGroupLayout,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Sky Pipeline Layout"),
        bind_group_layouts: &[camera_layout, sky_layout],
        immediate_size: 0,
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Sky Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("sky.wgsl").into()),
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Sky Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            // seen from inside
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<SkyUniform>(), 64);
    }

    #[test]
    fn sun_just_below_the_horizon() {
        let config = SkyConfig::default();
        let sky = SkyUniform::new(&config);
        let direction = Vector3::new(sky.sun[0], sky.sun[1], sky.sun[2]);
        assert!((direction.magnitude() - 1.0).abs() < 1e-5);
        // fade is ~1 for a sun this close to the horizon
        assert!((sky.beta_r[3] - 1.0).abs() < 1e-4);
        for (beta, total) in sky.beta_r.iter().zip(TOTAL_RAYLEIGH) {
            let expected = (total * 3.0) as f32;
            assert!((beta - expected).abs() <= expected * 1e-3);
        }
        assert!(sky.sun[3] > 0.0 && sky.sun[3] < 10.0);
        assert_eq!(sky.up[3], 50.0);
        assert_eq!(sky.beta_m[3], 0.95);
    }

    #[test]
    fn overhead_sun_is_brighter() {
        let overhead = SkyConfig {
            sun_position: [0.0, 1.0, 0.0],
            ..SkyConfig::default()
        };
        let low = SkyUniform::new(&SkyConfig::default()).sun[3];
        let high = SkyUniform::new(&overhead).sun[3];
        assert!(high > low);
        assert!(high <= EE as f32);
        assert_eq!(sun_intensity(-1.0), 0.0);
    }

    #[test]
    fn mie_scales_with_turbidity() {
        let clear = SkyConfig {
            turbidity: 2.0,
            ..SkyConfig::default()
        };
        let hazy = SkyUniform::new(&SkyConfig::default());
        let clear = SkyUniform::new(&clear);
        assert!((hazy.beta_m[0] / clear.beta_m[0] - 5.0).abs() < 1e-3);
    }
}
