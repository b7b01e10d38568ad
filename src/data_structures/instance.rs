//! Per-instance transforms and their GPU layout.
//!
//! An [`Instance`] is a translation, rotation and non-uniform scale. Instances
//! compose with `*` the way parent and child transforms do in the scene graph:
//! `parent * child` yields the child's world transform.

use std::ops::Mul;

use cgmath::{Euler, One, Quaternion, Rad, SquareMatrix, Vector3};

use crate::data_structures::model;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Instance {
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Rotation from Euler angles applied in X, Y, Z order.
    pub fn with_euler(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = Quaternion::from(Euler::new(Rad(x), Rad(y), Rad(z)));
        self
    }

    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.position = position;
        self
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vector3::new(scale, scale, scale);
        self
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Inverse transpose of the upper 3x3, so normals stay perpendicular
    /// under non-uniform scale.
    pub fn normal_matrix(&self) -> cgmath::Matrix3<f32> {
        let inv_scale = Vector3::new(
            safe_recip(self.scale.x),
            safe_recip(self.scale.y),
            safe_recip(self.scale.z),
        );
        // the shader renormalises, so the remaining scale is harmless
        cgmath::Matrix3::from(self.rotation) * cgmath::Matrix3::from_diagonal(inv_scale)
    }

    pub fn to_raw(&self) -> InstanceRaw {
        let world_matrix = self.to_matrix();
        let handedness = world_matrix.determinant().signum();
        InstanceRaw {
            model: world_matrix.into(),
            normal: self.normal_matrix().into(),
            handedness,
        }
    }
}

fn safe_recip(v: f32) -> f32 {
    if v.abs() > f32::EPSILON { 1.0 / v } else { 0.0 }
}

impl<'a, 'b> Mul<&'b Instance> for &'a Instance {
    type Output = Instance;

    fn mul(self, rhs: &'b Instance) -> Self::Output {
        let scaled_rhs_pos = Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        Instance {
            position: self.position + (self.rotation * scaled_rhs_pos),
            rotation: self.rotation * rhs.rotation,
            scale: Vector3::new(
                self.scale.x * rhs.scale.x,
                self.scale.y * rhs.scale.y,
                self.scale.z * rhs.scale.z,
            ),
        }
    }
}

impl Mul<Instance> for Instance {
    type Output = Self;

    fn mul(self, rhs: Instance) -> Self::Output {
        &self * &rhs
    }
}

impl From<Vector3<f32>> for Instance {
    fn from(position: Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/// The instance as stored in the instance vertex buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 3]; 3],
    pub handedness: f32,
}

impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // advance once per instance, not per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // model matrix, one vec4 per column
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // normal matrix
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Matrix4, Point3, Transform};

    fn approx(a: Matrix4<f32>, b: Matrix4<f32>) -> bool {
        let a: [[f32; 4]; 4] = a.into();
        let b: [[f32; 4]; 4] = b.into();
        a.iter()
            .flatten()
            .zip(b.iter().flatten())
            .all(|(x, y)| (x - y).abs() < 1e-4)
    }

    fn sample(seed: f32) -> Instance {
        Instance::new()
            .with_euler(seed * 0.3, -seed * 0.7, seed * 0.1)
            .with_position(Vector3::new(seed, 2.0 - seed, seed * 0.5))
            .with_uniform_scale(0.5 + seed * 0.25)
    }

    #[test]
    fn composition_matches_matrix_product() {
        let parent = sample(1.0);
        let child = sample(2.0);
        let composed = &parent * &child;
        assert!(approx(composed.to_matrix(), parent.to_matrix() * child.to_matrix()));
    }

    #[test]
    fn composition_is_associative_with_identity() {
        let (a, b, c) = (sample(0.5), sample(1.5), sample(2.5));
        let left = &(&a * &b) * &c;
        let right = &a * &(&b * &c);
        assert!(approx(left.to_matrix(), right.to_matrix()));
        assert!(approx((&Instance::new() * &a).to_matrix(), a.to_matrix()));
        assert!(approx((&a * &Instance::new()).to_matrix(), a.to_matrix()));
    }

    #[test]
    fn euler_x_rotation_tilts_up_towards_z() {
        let tilted = Instance::new().with_euler(std::f32::consts::FRAC_PI_2, 0.0, 0.0);
        let p = tilted.to_matrix().transform_point(Point3::new(0.0, 1.0, 0.0));
        assert!((p.z - 1.0).abs() < 1e-5);
        assert!(p.y.abs() < 1e-5);
    }

    #[test]
    fn normal_matrix_keeps_normals_perpendicular() {
        let squashed = Instance {
            scale: Vector3::new(4.0, 1.0, 1.0),
            ..Instance::new()
        };
        // a slanted surface with tangent (1, -4, 0) has normal (4, 1, 0)
        let tangent = squashed.to_matrix().transform_vector(Vector3::new(1.0, -4.0, 0.0));
        let normal = squashed.normal_matrix() * Vector3::new(4.0, 1.0, 0.0);
        assert!(tangent.dot(normal).abs() < 1e-4);
    }

    #[test]
    fn mirrored_instances_flip_handedness() {
        let mirrored = Instance {
            scale: Vector3::new(-1.0, 1.0, 1.0),
            ..Instance::new()
        };
        assert_eq!(mirrored.to_raw().handedness, -1.0);
        assert_eq!(Instance::new().to_raw().handedness, 1.0);
    }
}
