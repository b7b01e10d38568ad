//! Light and fog uniforms (bind group 2 of the lit pipelines).

use cgmath::{InnerSpace, Vector3};
use wgpu::util::DeviceExt;

use crate::config::{FogConfig, LightingConfig};

pub const MAX_POINT_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightRaw {
    pub position: [f32; 3],
    pub intensity: f32,
    pub color: [f32; 3],
    /// Index of the cube shadow map, -1 without shadow.
    pub shadow_index: i32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    pub ambient: [f32; 4],
    pub directional_direction: [f32; 4],
    pub directional_color: [f32; 4],
    pub fog: [f32; 4],
    pub point_lights: [PointLightRaw; MAX_POINT_LIGHTS],
    pub point_light_count: u32,
    _padding: [u32; 3],
}

impl LightsUniform {
    pub fn new(lighting: &LightingConfig, fog: &FogConfig) -> Self {
        let ambient = lighting.ambient.color.to_linear().map(|c| c * lighting.ambient.intensity);
        let fog_color = fog.color.to_linear();
        let mut uniform = Self {
            ambient: [ambient[0], ambient[1], ambient[2], 1.0],
            directional_direction: [0.0, 1.0, 0.0, 0.0],
            directional_color: [0.0; 4],
            fog: [fog_color[0], fog_color[1], fog_color[2], fog.density],
            point_lights: [PointLightRaw::default(); MAX_POINT_LIGHTS],
            point_light_count: 0,
            _padding: [0; 3],
        };
        let directional = &lighting.directional;
        uniform.set_directional(
            directional.position.into(),
            directional.color.to_linear(),
            directional.intensity,
        );
        uniform
    }

    /// A directional light shining from `position` towards the origin.
    pub fn set_directional(&mut self, position: Vector3<f32>, color: [f32; 3], intensity: f32) {
        let direction = if position.magnitude2() > 0.0 {
            position.normalize()
        } else {
            Vector3::unit_y()
        };
        self.directional_direction = direction.extend(0.0).into();
        self.directional_color = [color[0], color[1], color[2], intensity];
    }

    /// Appends a point light and returns its slot, `None` when all slots are taken.
    pub fn push_point_light(&mut self, light: PointLightRaw) -> Option<usize> {
        let idx = self.point_light_count as usize;
        let slot = self.point_lights.get_mut(idx)?;
        *slot = light;
        self.point_light_count += 1;
        Some(idx)
    }

    pub fn set_point_position(&mut self, idx: usize, position: Vector3<f32>) {
        if let Some(light) = self.point_lights[..self.point_light_count as usize].get_mut(idx) {
            light.position = position.into();
        }
    }

    pub fn point_lights(&self) -> &[PointLightRaw] {
        &self.point_lights[..self.point_light_count as usize]
    }
}

#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightsUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, uniform: LightsUniform) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("light_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write_to_buffer(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<PointLightRaw>(), 32);
        assert_eq!(std::mem::size_of::<LightsUniform>(), 208);
    }

    #[test]
    fn directional_light_points_towards_its_position() {
        let config = SceneConfig::default();
        let uniform = LightsUniform::new(&config.lighting, &config.fog);
        let d = Vector3::new(
            uniform.directional_direction[0],
            uniform.directional_direction[1],
            uniform.directional_direction[2],
        );
        assert!((d.magnitude() - 1.0).abs() < 1e-5);
        assert!(d.dot(Vector3::new(3.0, 2.0, -8.0)) > 0.0);
        assert_eq!(uniform.directional_color[3], config.lighting.directional.intensity);
        assert_eq!(uniform.fog[3], config.fog.density);
    }

    #[test]
    fn point_light_slots_are_bounded() {
        let config = SceneConfig::default();
        let mut uniform = LightsUniform::new(&config.lighting, &config.fog);
        for i in 0..MAX_POINT_LIGHTS {
            assert_eq!(uniform.push_point_light(PointLightRaw::default()), Some(i));
        }
        assert_eq!(uniform.push_point_light(PointLightRaw::default()), None);
        uniform.set_point_position(1, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(uniform.point_lights()[1].position, [1.0, 2.0, 3.0]);
        // out of range is ignored
        uniform.set_point_position(9, Vector3::new(1.0, 2.0, 3.0));
    }
}
