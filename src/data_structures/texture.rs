//! GPU textures, samplers and texture creation utilities.
//!
//! [`Texture`] wraps a WGPU texture with its default view. Colour maps are
//! uploaded as sRGB, data maps (ARM, normal, alpha, displacement) as linear.
//! Image textures get a full mip chain built on the CPU so that heavily
//! repeated maps such as the floor stay stable at grazing angles.

use image::{DynamicImage, GenericImageView, RgbaImage, imageops::FilterType};

/// How texel values are interpreted by the sampler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    Linear,
}

impl ColorSpace {
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

/// Behaviour of texture coordinates outside of `[0, 1]`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Wrap {
    #[default]
    Clamp,
    Repeat,
}

impl From<Wrap> for wgpu::AddressMode {
    fn from(wrap: Wrap) -> Self {
        match wrap {
            Wrap::Clamp => wgpu::AddressMode::ClampToEdge,
            Wrap::Repeat => wgpu::AddressMode::Repeat,
        }
    }
}

/// Per-material sampler description. `wrap_s` is the horizontal axis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SamplerSettings {
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
}

impl SamplerSettings {
    pub const REPEAT: Self = Self {
        wrap_s: Wrap::Repeat,
        wrap_t: Wrap::Repeat,
    };

    pub fn create(&self, device: &wgpu::Device) -> wgpu::Sampler {
        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material sampler"),
            address_mode_u: self.wrap_s.into(),
            address_mode_v: self.wrap_t.into(),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        })
    }
}

#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Depth buffer of the main colour passes, sized like the surface.
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// A layered depth texture for shadow mapping.
    ///
    /// Returns the texture (its `view` spans every layer as a `D2Array`, its
    /// sampler compares with `LessEqual`) together with one render view per
    /// layer.
    pub fn create_shadow_array(
        device: &wgpu::Device,
        size: u32,
        layers: u32,
        label: &str,
    ) -> (Self, Vec<wgpu::TextureView>) {
        let layers = layers.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.max(1),
                height: size.max(1),
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            array_layer_count: Some(layers),
            ..Default::default()
        });
        let layer_views = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("{label} layer {layer}")),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        let sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        }));

        (
            Self {
                texture,
                view,
                sampler,
            },
            layer_views,
        )
    }

    /// A 1x1 texture of a single colour. Used wherever an optional map is absent
    /// or an asset failed to load, so shaders never need a variant without it.
    pub fn solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        srgb: bool,
        label: &str,
    ) -> Self {
        let space = if srgb { ColorSpace::Srgb } else { ColorSpace::Linear };
        let image = RgbaImage::from_pixel(1, 1, image::Rgba(rgba));
        Self::from_rgba(device, queue, &image, Some(label), space, false)
    }

    /// The neutral tangent-space normal (no deformation).
    pub fn default_normal_map(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::solid(device, queue, [127, 127, 255, 255], false, "default normal map")
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &DynamicImage,
        label: Option<&str>,
        space: ColorSpace,
    ) -> Self {
        Self::from_rgba(device, queue, &img.to_rgba8(), label, space, true)
    }

    fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &RgbaImage,
        label: Option<&str>,
        space: ColorSpace,
        mipmapped: bool,
    ) -> Self {
        let (width, height) = rgba.dimensions();
        let mip_level_count = if mipmapped {
            mip_level_count(width, height)
        } else {
            1
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: space.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let mut level_image = rgba.clone();
        for mip_level in 0..mip_level_count {
            if mip_level > 0 {
                let (w, h) = level_image.dimensions();
                level_image =
                    image::imageops::resize(&level_image, (w / 2).max(1), (h / 2).max(1), FilterType::Triangle);
            }
            let (w, h) = level_image.dimensions();
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level,
                    origin: wgpu::Origin3d::ZERO,
                },
                &level_image,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * w),
                    rows_per_image: Some(h),
                },
                wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            sampler: None,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }
}

/// Number of levels down to 1x1 for a `width` x `height` image.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Dimensions of an image as loaded, for logging.
pub fn describe(img: &DynamicImage) -> String {
    let (w, h) = img.dimensions();
    format!("{w}x{h} {:?}", img.color())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_reaches_one_texel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(1024, 1024), 11);
        assert_eq!(mip_level_count(1024, 512), 11);
        assert_eq!(mip_level_count(3, 1), 2);
    }

    #[test]
    fn wrap_maps_to_address_modes() {
        assert_eq!(wgpu::AddressMode::from(Wrap::Clamp), wgpu::AddressMode::ClampToEdge);
        assert_eq!(wgpu::AddressMode::from(Wrap::Repeat), wgpu::AddressMode::Repeat);
    }

    #[test]
    fn colour_maps_are_srgb() {
        assert!(ColorSpace::Srgb.format().is_srgb());
        assert!(!ColorSpace::Linear.format().is_srgb());
    }
}
