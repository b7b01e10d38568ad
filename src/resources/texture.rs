use image::{DynamicImage, GenericImageView, RgbaImage, imageops::FilterType};

use crate::{
    context::InitContext,
    data_structures::{
        model::{Material, MaterialMaps, MaterialUniform},
        texture::{ColorSpace, SamplerSettings, Texture},
    },
    resources::Assets,
};

/// Source of the ambient occlusion, roughness and metalness channels.
#[derive(Debug, Clone, PartialEq)]
pub enum ArmSource {
    /// One texture with AO in R, roughness in G, metalness in B.
    Packed(&'static str),
    /// Separate maps, packed into one texture at load time.
    Separate {
        ao: &'static str,
        roughness: &'static str,
        metalness: &'static str,
    },
}

/// The files and sampling parameters of one material.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSet {
    pub color: &'static str,
    pub arm: ArmSource,
    pub normal: &'static str,
    pub alpha: Option<&'static str>,
    pub displacement: Option<&'static str>,
    pub repeat: [f32; 2],
    pub sampler: SamplerSettings,
}

/// Packs separate AO, roughness and metalness images into one ARM image.
///
/// AO is read from the red, roughness from the green and metalness from the
/// blue channel of their images. Missing maps leave their channel at full
/// value. The result has the largest width and height among the inputs.
pub fn pack_arm(
    ao: Option<&DynamicImage>,
    roughness: Option<&DynamicImage>,
    metalness: Option<&DynamicImage>,
) -> RgbaImage {
    let sources = [ao, roughness, metalness];
    let (width, height) = sources
        .iter()
        .flatten()
        .map(|img| img.dimensions())
        .fold((1, 1), |(w, h), (iw, ih)| (w.max(iw), h.max(ih)));
    let resized = sources.map(|img| {
        img.map(|img| {
            let rgba = img.to_rgba8();
            if rgba.dimensions() == (width, height) {
                rgba
            } else {
                image::imageops::resize(&rgba, width, height, FilterType::Triangle)
            }
        })
    });

    RgbaImage::from_fn(width, height, |x, y| {
        let mut texel = [255u8; 4];
        for (channel, img) in resized.iter().enumerate() {
            if let Some(img) = img {
                texel[channel] = img.get_pixel(x, y)[channel];
            }
        }
        image::Rgba(texel)
    })
}

async fn load_or_warn(assets: &Assets, file_name: &str) -> Option<DynamicImage> {
    match assets.load_image(file_name).await {
        Ok(img) => Some(img),
        Err(e) => {
            log::warn!("texture {file_name} unavailable, using a neutral fallback: {e:#}");
            None
        }
    }
}

/// Loads every map of `set` and builds the material.
///
/// Missing or undecodable files never fail the load: required maps fall back
/// to neutral 1x1 textures, optional ones are left out.
pub async fn load_material(
    init: &InitContext,
    assets: &Assets,
    name: &str,
    set: &TextureSet,
    mut uniform: MaterialUniform,
) -> Material {
    let device = &init.device;
    let queue = &init.queue;
    let texture = |img: Option<DynamicImage>, label: &str, space: ColorSpace, fallback: [u8; 4]| match img {
        Some(img) => Texture::from_image(device, queue, &img, Some(label), space),
        None => Texture::solid(device, queue, fallback, space == ColorSpace::Srgb, label),
    };

    let (color, normal, alpha, displacement) = futures::join!(
        load_or_warn(assets, set.color),
        load_or_warn(assets, set.normal),
        async {
            match set.alpha {
                Some(file) => load_or_warn(assets, file).await,
                None => None,
            }
        },
        async {
            match set.displacement {
                Some(file) => load_or_warn(assets, file).await,
                None => None,
            }
        },
    );

    let arm = match &set.arm {
        ArmSource::Packed(file) => texture(load_or_warn(assets, *file).await, *file, ColorSpace::Linear, [255; 4]),
        ArmSource::Separate {
            ao,
            roughness,
            metalness,
        } => {
            let (ao, roughness, metalness) = futures::join!(
                load_or_warn(assets, *ao),
                load_or_warn(assets, *roughness),
                load_or_warn(assets, *metalness),
            );
            let packed = pack_arm(ao.as_ref(), roughness.as_ref(), metalness.as_ref());
            log::debug!("{name}: packed ARM map {}x{}", packed.width(), packed.height());
            texture(
                Some(DynamicImage::ImageRgba8(packed)),
                &format!("{name} arm"),
                ColorSpace::Linear,
                [255; 4],
            )
        }
    };

    let maps = MaterialMaps {
        color: texture(color, set.color, ColorSpace::Srgb, [128, 128, 128, 255]),
        arm,
        normal: match normal {
            Some(img) => Texture::from_image(device, queue, &img, Some(set.normal), ColorSpace::Linear),
            None => Texture::default_normal_map(device, queue),
        },
        alpha: alpha.map(|img| Texture::from_image(device, queue, &img, set.alpha, ColorSpace::Linear)),
        displacement: displacement
            .map(|img| Texture::from_image(device, queue, &img, set.displacement, ColorSpace::Linear)),
    };
    uniform.uv_repeat = set.repeat;

    Material::new(device, queue, name, maps, uniform, set.sampler, &init.material_layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gray(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
    }

    #[test]
    fn channels_land_in_ao_roughness_metalness_order() {
        let packed = pack_arm(Some(&gray(2, 2, 10)), Some(&gray(2, 2, 20)), Some(&gray(2, 2, 30)));
        assert_eq!(packed.dimensions(), (2, 2));
        assert!(packed.pixels().all(|p| p.0 == [10, 20, 30, 255]));
    }

    #[test]
    fn missing_maps_keep_their_channel_at_full_value() {
        let packed = pack_arm(None, Some(&gray(1, 1, 40)), None);
        assert_eq!(packed.get_pixel(0, 0).0, [255, 40, 255, 255]);
        assert_eq!(pack_arm(None, None, None).dimensions(), (1, 1));
    }

    #[test]
    fn smaller_maps_are_scaled_to_the_largest() {
        let packed = pack_arm(Some(&gray(4, 2, 200)), Some(&gray(1, 1, 100)), Some(&gray(2, 8, 0)));
        assert_eq!(packed.dimensions(), (4, 8));
        assert_eq!(packed.get_pixel(3, 7).0, [200, 100, 0, 255]);
    }

    #[test]
    fn colour_channels_are_read_per_map() {
        let rgb = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, image::Rgba([1, 2, 3, 4])));
        let packed = pack_arm(Some(&rgb), Some(&rgb), Some(&rgb));
        assert_eq!(packed.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }
}
