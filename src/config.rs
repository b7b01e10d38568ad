//! Scene parameter tables.
//!
//! Every dimension, repeat factor, light and atmosphere setting of the haunted
//! house lives in [`SceneConfig`]. The defaults reproduce the reference scene;
//! a TOML file can override any subset of tables because every struct is
//! `#[serde(default)]`.

use std::{fmt, path::Path};

use anyhow::{Context as _, bail, ensure};
use serde::{Deserialize, Serialize};

/// An sRGB colour written as `"#rrggbb"` in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear-light components, the space all shading happens in.
    pub fn to_linear(self) -> [f32; 3] {
        [self.r, self.g, self.b].map(|c| srgb_to_linear(f32::from(c) / 255.0))
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.0773993808
    } else {
        (c * 0.9478672986 + 0.0521327014).powf(2.4)
    }
}

impl TryFrom<String> for Rgb {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            bail!("expected a colour like \"#86cdff\", got {value:?}");
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .with_context(|| format!("invalid hex digits in colour {value:?}"))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseMeasurements {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Default for HouseMeasurements {
    fn default() -> Self {
        Self {
            width: 4.0,
            height: 2.5,
            depth: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoofMeasurements {
    pub radius: f32,
    pub height: f32,
    /// Four segments turn the cone into a square pyramid.
    pub radial_segments: u32,
}

impl Default for RoofMeasurements {
    fn default() -> Self {
        Self {
            radius: 3.5,
            height: 1.5,
            radial_segments: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorMeasurements {
    pub width: f32,
    pub height: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub displacement_scale: f32,
    pub displacement_bias: f32,
}

impl Default for DoorMeasurements {
    fn default() -> Self {
        Self {
            width: 2.2,
            height: 2.2,
            width_segments: 100,
            height_segments: 100,
            displacement_scale: 0.15,
            displacement_bias: -0.04,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BushMeasurements {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub tint: Rgb,
}

impl Default for BushMeasurements {
    fn default() -> Self {
        Self {
            radius: 1.0,
            width_segments: 16,
            height_segments: 16,
            tint: Rgb::new(0xcc, 0xff, 0xcc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraveMeasurements {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Default for GraveMeasurements {
    fn default() -> Self {
        Self {
            width: 0.6,
            height: 0.8,
            depth: 0.2,
        }
    }
}

/// The annulus around the house the graves are scattered in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraveRing {
    pub count: u32,
    pub min_radius: f32,
    pub max_radius: f32,
}

impl Default for GraveRing {
    fn default() -> Self {
        Self {
            count: 30,
            min_radius: 4.0,
            max_radius: 7.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorMeasurements {
    pub size: f32,
    pub segments: u32,
    pub displacement_scale: f32,
    pub displacement_bias: f32,
}

impl Default for FloorMeasurements {
    fn default() -> Self {
        Self {
            size: 20.0,
            segments: 100,
            displacement_scale: 0.3,
            displacement_bias: -0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSettings {
    pub color: Rgb,
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedLight {
    pub color: Rgb,
    pub intensity: f32,
    pub position: [f32; 3],
}

/// A ghost circles the house at `radius` with angular speed `speed` (rad/s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GhostSettings {
    pub color: Rgb,
    pub intensity: f32,
    pub speed: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient: LightSettings,
    pub directional: PositionedLight,
    /// Position is relative to the house group.
    pub door: PositionedLight,
    pub ghosts: Vec<GhostSettings>,
}

impl Default for LightingConfig {
    fn default() -> Self {
        let moon = Rgb::new(0x86, 0xcd, 0xff);
        Self {
            ambient: LightSettings {
                color: moon,
                intensity: 0.275,
            },
            directional: PositionedLight {
                color: moon,
                intensity: 1.0,
                position: [3.0, 2.0, -8.0],
            },
            door: PositionedLight {
                color: Rgb::new(0xff, 0x7d, 0x46),
                intensity: 5.0,
                position: [0.0, 2.2, 2.5],
            },
            ghosts: vec![
                GhostSettings {
                    color: Rgb::new(0x88, 0x00, 0xff),
                    intensity: 6.0,
                    speed: 0.5,
                    radius: 4.0,
                },
                GhostSettings {
                    color: Rgb::new(0xff, 0x00, 0x88),
                    intensity: 6.0,
                    speed: -0.38,
                    radius: 5.0,
                },
                GhostSettings {
                    color: Rgb::new(0xff, 0x00, 0x00),
                    intensity: 6.0,
                    speed: 0.23,
                    radius: 6.0,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub enabled: bool,
    pub map_size: u32,
    /// Half extent of the directional light's orthographic shadow box.
    pub directional_extent: f32,
    pub directional_near: f32,
    pub directional_far: f32,
    pub point_near: f32,
    pub point_far: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            map_size: 256,
            directional_extent: 8.0,
            directional_near: 1.0,
            directional_far: 20.0,
            point_near: 0.5,
            point_far: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub color: Rgb,
    pub density: f32,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            color: Rgb::new(0x03, 0x34, 0x3f),
            density: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyConfig {
    pub scale: f32,
    pub turbidity: f32,
    pub rayleigh: f32,
    pub mie_coefficient: f32,
    pub mie_directional_g: f32,
    pub sun_position: [f32; 3],
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            scale: 100.0,
            turbidity: 10.0,
            rayleigh: 3.0,
            mie_coefficient: 0.1,
            mie_directional_g: 0.95,
            sun_position: [0.3, -0.038, -0.95],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fovy_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub damping: bool,
    pub damping_factor: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fovy_degrees: 75.0,
            znear: 0.1,
            zfar: 100.0,
            position: [4.0, 2.0, 5.0],
            target: [0.0, 0.0, 0.0],
            damping: true,
            damping_factor: 0.05,
        }
    }
}

/// All parameter tables of the scene.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub house: HouseMeasurements,
    pub roof: RoofMeasurements,
    pub door: DoorMeasurements,
    pub bushes: BushMeasurements,
    pub graves: GraveMeasurements,
    pub grave_ring: GraveRing,
    pub floor: FloorMeasurements,
    pub lighting: LightingConfig,
    pub shadows: ShadowConfig,
    pub fog: FogConfig,
    pub sky: SkyConfig,
    pub camera: CameraConfig,
}

impl SceneConfig {
    /// Reads a (possibly partial) TOML file and validates the result.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse scene config {}", path.display()))?;
        config.validate()?;
        log::info!("loaded scene config from {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let positive = [
            ("house.width", self.house.width),
            ("house.height", self.house.height),
            ("house.depth", self.house.depth),
            ("roof.radius", self.roof.radius),
            ("roof.height", self.roof.height),
            ("door.width", self.door.width),
            ("door.height", self.door.height),
            ("bushes.radius", self.bushes.radius),
            ("graves.width", self.graves.width),
            ("graves.height", self.graves.height),
            ("graves.depth", self.graves.depth),
            ("floor.size", self.floor.size),
            ("fog.density", self.fog.density),
            ("sky.scale", self.sky.scale),
            ("camera.fovy_degrees", self.camera.fovy_degrees),
            ("camera.znear", self.camera.znear),
            ("shadows.point_near", self.shadows.point_near),
            ("shadows.directional_extent", self.shadows.directional_extent),
        ];
        for (name, value) in positive {
            ensure!(value > 0.0, "{name} must be positive, got {value}");
        }
        let segments = [
            ("roof.radial_segments", self.roof.radial_segments),
            ("door.width_segments", self.door.width_segments),
            ("door.height_segments", self.door.height_segments),
            ("bushes.width_segments", self.bushes.width_segments),
            ("bushes.height_segments", self.bushes.height_segments),
            ("floor.segments", self.floor.segments),
            ("shadows.map_size", self.shadows.map_size),
        ];
        for (name, value) in segments {
            ensure!(value > 0, "{name} must be at least 1");
        }
        ensure!(
            self.roof.radial_segments >= 3,
            "roof.radial_segments must be at least 3, got {}",
            self.roof.radial_segments
        );
        ensure!(
            0.0 <= self.grave_ring.min_radius
                && self.grave_ring.min_radius <= self.grave_ring.max_radius,
            "grave_ring needs 0 <= min_radius <= max_radius, got {}..{}",
            self.grave_ring.min_radius,
            self.grave_ring.max_radius
        );
        ensure!(
            self.camera.znear < self.camera.zfar,
            "camera.znear must be smaller than camera.zfar"
        );
        ensure!(
            self.shadows.directional_near < self.shadows.directional_far
                && self.shadows.point_near < self.shadows.point_far,
            "shadow near planes must be smaller than their far planes"
        );
        ensure!(
            (0.0..=1.0).contains(&self.camera.damping_factor),
            "camera.damping_factor must lie in [0, 1]"
        );
        let intensities = [
            self.lighting.ambient.intensity,
            self.lighting.directional.intensity,
            self.lighting.door.intensity,
        ]
        .into_iter()
        .chain(self.lighting.ghosts.iter().map(|ghost| ghost.intensity));
        for intensity in intensities {
            ensure!(intensity >= 0.0, "light intensities must not be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SceneConfig::default().validate().unwrap();
    }

    #[test]
    fn default_round_trips_through_toml() {
        let config = SceneConfig::default();
        let parsed: SceneConfig = toml::from_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: SceneConfig = toml::from_str(
            r##"
[grave_ring]
count = 12

[fog]
color = "#101010"
"##,
        )
        .unwrap();
        assert_eq!(config.grave_ring.count, 12);
        assert_eq!(config.grave_ring.min_radius, 4.0);
        assert_eq!(config.fog.color, Rgb::new(0x10, 0x10, 0x10));
        assert_eq!(config.fog.density, 0.1);
        assert_eq!(config.house, HouseMeasurements::default());
    }

    #[test]
    fn shipped_override_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/haunted_house.toml");
        let config = SceneConfig::load(&path).unwrap();
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn rejects_inverted_grave_ring() {
        let mut config = SceneConfig::default();
        config.grave_ring.min_radius = 8.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_degenerate_roof() {
        let mut config = SceneConfig::default();
        config.roof.radial_segments = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_and_prints_hex_colours() {
        let colour = Rgb::try_from("#86cdff".to_string()).unwrap();
        assert_eq!(colour, Rgb::new(0x86, 0xcd, 0xff));
        assert_eq!(colour.to_string(), "#86cdff");
        assert!(Rgb::try_from("86cdf".to_string()).is_err());
        assert!(Rgb::try_from("#zzcdff".to_string()).is_err());
    }

    #[test]
    fn rejects_non_ascii_colours() {
        // six bytes, but 'é' straddles the first channel boundary
        assert!(Rgb::try_from("#aé123".to_string()).is_err());
        assert!(toml::from_str::<SceneConfig>("[fog]\ncolor = \"#aé123\"\n").is_err());
    }

    #[test]
    fn linear_conversion_keeps_extremes() {
        assert_eq!(Rgb::new(0, 0, 0).to_linear(), [0.0; 3]);
        let white = Rgb::WHITE.to_linear();
        for c in white {
            assert!((c - 1.0).abs() < 1e-5);
        }
        let mid = Rgb::new(128, 128, 128).to_linear()[0];
        assert!(mid > 0.2 && mid < 0.23);
    }
}
