use std::sync::Arc;

use anyhow::Context as _;
use cgmath::{Deg, Point3};
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    camera::{CameraResources, Projection},
    config::SceneConfig,
    data_structures::{model, texture},
    pipelines::{
        basic::{SceneLayouts, mk_basic_pipeline},
        light::{LightResources, LightsUniform},
        shadow::ShadowResources,
        sky::SkyResources,
        transparent::mk_transparent_pipeline,
    },
};

/// Size of the drawing buffer derived from the window's logical size.
///
/// The pixel ratio follows the display scale factor but is capped at
/// [`Viewport::MAX_PIXEL_RATIO`], trading sharpness for fill rate on very
/// dense displays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub logical_width: f64,
    pub logical_height: f64,
    pub pixel_ratio: f64,
}

impl Viewport {
    pub const MAX_PIXEL_RATIO: f64 = 2.0;

    pub fn new(logical_width: f64, logical_height: f64, scale_factor: f64) -> Self {
        Self {
            logical_width,
            logical_height,
            pixel_ratio: scale_factor.min(Self::MAX_PIXEL_RATIO),
        }
    }

    /// From the physical size winit reports for a window.
    pub fn from_window(size: PhysicalSize<u32>, scale_factor: f64) -> Self {
        let logical = size.to_logical::<f64>(scale_factor);
        Self::new(logical.width, logical.height, scale_factor)
    }

    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.logical_width * self.pixel_ratio).round() as u32,
            (self.logical_height * self.pixel_ratio).round() as u32,
        )
    }

    pub fn aspect(&self) -> f32 {
        (self.logical_width / self.logical_height) as f32
    }

    pub fn is_empty(&self) -> bool {
        let (width, height) = self.physical_size();
        width == 0 || height == 0
    }
}

#[derive(Debug)]
pub struct Pipelines {
    pub basic: wgpu::RenderPipeline,
    pub transparent: wgpu::RenderPipeline,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub viewport: Viewport,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub shadows: ShadowResources,
    pub sky: SkyResources,
    pub material_layout: wgpu::BindGroupLayout,
    pub pipelines: Pipelines,
    pub clear_colour: wgpu::Color,
    pub tick_duration_millis: u64,
}

impl Context {
    pub async fn new(window: Arc<Window>, scene: &SceneConfig) -> anyhow::Result<Self> {
        let viewport = Viewport::from_window(window.inner_size(), window.scale_factor());
        // A canvas may not be laid out yet; the first resize sets the real size
        let (width, height) = viewport.physical_size();
        let (width, height) = (width.max(1), height.max(1));

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible graphics adapter")?;
        log::info!("adapter: {:?}", adapter.get_info().name);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("failed to request a device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders write linear colour and rely on an sRGB surface for the encoding
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface reports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let projection = Projection::new(
            width,
            height,
            Deg(scene.camera.fovy_degrees),
            scene.camera.znear,
            scene.camera.zfar,
        );
        let mut camera = CameraResources::new(&device, &scene.camera, &projection);
        camera.controller.set_viewport_height(height);

        let depth_texture = texture::Texture::create_depth_texture(&device, [width, height], "depth_texture");

        let light = LightResources::new(&device, LightsUniform::new(&scene.lighting, &scene.fog));
        let shadows = ShadowResources::new(
            &device,
            &scene.shadows,
            Point3::from(scene.lighting.directional.position),
        );
        let sky = SkyResources::new(&device, &scene.sky, &camera.bind_group_layout, config.format);

        let material_layout = model::material_layout(&device);
        let layouts = SceneLayouts {
            material: &material_layout,
            camera: &camera.bind_group_layout,
            light: &light.bind_group_layout,
            shadow: &shadows.bind_group_layout,
        };
        let pipelines = Pipelines {
            basic: mk_basic_pipeline(&device, config.format, &layouts),
            transparent: mk_transparent_pipeline(&device, config.format, &layouts),
        };
        let fog = scene.fog.color.to_linear();

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            viewport,
            camera,
            projection,
            light,
            shadows,
            sky,
            material_layout,
            pipelines,
            clear_colour: wgpu::Color {
                r: fog[0] as f64,
                g: fog[1] as f64,
                b: fog[2] as f64,
                a: 1.0,
            },
            tick_duration_millis: 1000,
        })
    }

    /// Follows a new window size or scale factor. Returns `false` for empty
    /// sizes, which leave the surface untouched.
    pub fn resize(&mut self, size: PhysicalSize<u32>, scale_factor: f64) -> bool {
        let viewport = Viewport::from_window(size, scale_factor);
        if viewport.is_empty() {
            return false;
        }
        let (width, height) = viewport.physical_size();
        self.viewport = viewport;
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.projection.resize(width, height);
        self.camera.controller.set_viewport_height(height);
        self.depth_texture = texture::Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
        log::debug!("resized to {width}x{height} (pixel ratio {})", viewport.pixel_ratio);
        true
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

/// The part of the [`Context`] flows need to build GPU resources while loading.
///
/// Cloning only clones handles.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub material_layout: wgpu::BindGroupLayout,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            material_layout: ctx.material_layout.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_ratio_is_capped() {
        let viewport = Viewport::new(800.0, 600.0, 3.0);
        assert_eq!(viewport.pixel_ratio, 2.0);
        assert_eq!(viewport.physical_size(), (1600, 1200));
        let viewport = Viewport::new(800.0, 600.0, 1.25);
        assert_eq!(viewport.physical_size(), (1000, 750));
    }

    #[test]
    fn aspect_matches_output_size() {
        for (w, h, scale) in [(1280.0, 720.0, 1.0), (333.0, 777.0, 1.5), (1920.0, 1080.0, 4.0)] {
            let viewport = Viewport::new(w, h, scale);
            let (pw, ph) = viewport.physical_size();
            let physical_aspect = pw as f32 / ph as f32;
            assert!((physical_aspect - viewport.aspect()).abs() < 0.01);
            assert!((viewport.aspect() - (w / h) as f32).abs() < 1e-6);
        }
    }

    #[test]
    fn window_sizes_are_converted_through_the_scale_factor() {
        // a 3x display reports 3x the logical size, drawn at 2x
        let viewport = Viewport::from_window(PhysicalSize::new(2400, 1500), 3.0);
        assert_eq!(viewport.logical_width, 800.0);
        assert_eq!(viewport.physical_size(), (1600, 1000));
        let viewport = Viewport::from_window(PhysicalSize::new(1024, 768), 1.0);
        assert_eq!(viewport.physical_size(), (1024, 768));
    }

    #[test]
    fn zero_sizes_are_empty() {
        assert!(Viewport::new(0.0, 600.0, 1.0).is_empty());
        assert!(Viewport::from_window(PhysicalSize::new(800, 0), 2.0).is_empty());
        assert!(!Viewport::new(1.0, 1.0, 1.0).is_empty());
    }
}
