//! Render pipelines and the uniforms they read.
//!
//! - `basic` opaque PBR geometry
//! - `transparent` alpha blended PBR geometry
//! - `light` ambient, directional and point lights plus fog
//! - `shadow` depth passes for the directional and point light shadows
//! - `sky` the scattering backdrop

pub mod basic;
pub mod light;
pub mod shadow;
pub mod sky;
pub mod transparent;
