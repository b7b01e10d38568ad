//! Procedural primitive meshes.
//!
//! All generators emit counter-clockwise triangles, outward normals and
//! texture coordinates with `v` growing downwards (the wgpu convention, image
//! row 0 at `v = 0`). Tangents and bitangents are derived from the UV layout
//! afterwards so normal maps work on every primitive.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Vector2, Vector3, Zero};

use crate::data_structures::model::ModelVertex;

/// CPU side vertex and index data, ready to be uploaded as a [`crate::data_structures::model::Mesh`].
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl GeometryData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push(&mut self, position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> u32 {
        self.vertices.push(ModelVertex {
            position,
            tex_coords,
            normal,
            tangent: [0.0; 3],
            bitangent: [0.0; 3],
        });
        self.vertices.len() as u32 - 1
    }

    fn triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }
}

/// A `width` x `height` plane in the XY plane facing +Z.
pub fn plane(width: f32, height: f32, width_segments: u32, height_segments: u32) -> GeometryData {
    let grid_x = width_segments.max(1);
    let grid_y = height_segments.max(1);
    let segment_width = width / grid_x as f32;
    let segment_height = height / grid_y as f32;

    let mut data = GeometryData::default();
    for iy in 0..=grid_y {
        let y = iy as f32 * segment_height - height / 2.0;
        for ix in 0..=grid_x {
            let x = ix as f32 * segment_width - width / 2.0;
            data.push(
                [x, -y, 0.0],
                [0.0, 0.0, 1.0],
                [ix as f32 / grid_x as f32, iy as f32 / grid_y as f32],
            );
        }
    }
    grid_indices(&mut data, 0, grid_x, grid_y);
    compute_tangents(&mut data);
    data
}

/// An axis aligned box centred at the origin, one quad per face.
pub fn cuboid(width: f32, height: f32, depth: f32) -> GeometryData {
    let mut data = GeometryData::default();
    // (u axis, v axis, w axis, u direction, v direction, extent u, extent v, signed extent w)
    let faces = [
        (2, 1, 0, -1.0, -1.0, depth, height, width),
        (2, 1, 0, 1.0, -1.0, depth, height, -width),
        (0, 2, 1, 1.0, 1.0, width, depth, height),
        (0, 2, 1, 1.0, -1.0, width, depth, -height),
        (0, 1, 2, 1.0, -1.0, width, height, depth),
        (0, 1, 2, -1.0, -1.0, width, height, -depth),
    ];
    for (u, v, w, u_dir, v_dir, extent_u, extent_v, extent_w) in faces {
        let start = data.vertices.len() as u32;
        for iy in 0..=1u32 {
            let y = iy as f32 * extent_v - extent_v / 2.0;
            for ix in 0..=1u32 {
                let x = ix as f32 * extent_u - extent_u / 2.0;
                let mut position = [0.0; 3];
                position[u] = x * u_dir;
                position[v] = y * v_dir;
                position[w] = extent_w / 2.0;
                let mut normal = [0.0; 3];
                normal[w] = extent_w.signum();
                data.push(position, normal, [ix as f32, iy as f32]);
            }
        }
        grid_indices(&mut data, start, 1, 1);
    }
    compute_tangents(&mut data);
    data
}

/// A closed cone with its apex at `+height / 2` and its base cap at
/// `-height / 2`. The base vertex ring starts on +Z.
pub fn cone(radius: f32, height: f32, radial_segments: u32) -> GeometryData {
    let segments = radial_segments.max(3);
    let half_height = height / 2.0;
    let slope = radius / height;
    let mut data = GeometryData::default();

    // Torso: row 0 is the (degenerate) apex ring, row 1 the base ring.
    let mut rows = Vec::with_capacity(2);
    for row in 0..=1u32 {
        let v = row as f32;
        let ring_radius = v * radius;
        let mut indices = Vec::with_capacity(segments as usize + 1);
        for x in 0..=segments {
            let u = x as f32 / segments as f32;
            let theta = u * 2.0 * PI;
            let (sin, cos) = theta.sin_cos();
            let normal = Vector3::new(sin, slope, cos).normalize();
            indices.push(data.push(
                [ring_radius * sin, -v * height + half_height, ring_radius * cos],
                normal.into(),
                [u, v],
            ));
        }
        rows.push(indices);
    }
    for x in 0..segments as usize {
        let b = rows[1][x];
        let c = rows[1][x + 1];
        let d = rows[0][x + 1];
        data.triangle(b, c, d);
    }

    // Base cap.
    let centers = (0..segments)
        .map(|_| data.push([0.0, -half_height, 0.0], [0.0, -1.0, 0.0], [0.5, 0.5]))
        .collect::<Vec<_>>();
    let rim = (0..=segments)
        .map(|x| {
            let theta = x as f32 / segments as f32 * 2.0 * PI;
            let (sin, cos) = theta.sin_cos();
            data.push(
                [radius * sin, -half_height, radius * cos],
                [0.0, -1.0, 0.0],
                [cos * 0.5 + 0.5, sin * 0.5 + 0.5],
            )
        })
        .collect::<Vec<_>>();
    for x in 0..segments as usize {
        data.triangle(rim[x + 1], rim[x], centers[x]);
    }

    compute_tangents(&mut data);
    data
}

/// A UV sphere. Pole rows are offset by half a segment in `u` so the
/// triangle fans at the poles sample the texture symmetrically.
pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> GeometryData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut data = GeometryData::default();
    let mut grid = Vec::with_capacity(height_segments as usize + 1);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let u_offset = if iy == 0 {
            0.5 / width_segments as f32
        } else if iy == height_segments {
            -0.5 / width_segments as f32
        } else {
            0.0
        };
        let mut row = Vec::with_capacity(width_segments as usize + 1);
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let (sin_phi, cos_phi) = (u * 2.0 * PI).sin_cos();
            let (sin_theta, cos_theta) = (v * PI).sin_cos();
            let position = Vector3::new(
                -radius * cos_phi * sin_theta,
                radius * cos_theta,
                radius * sin_phi * sin_theta,
            );
            let normal = if position.is_zero() {
                Vector3::unit_y()
            } else {
                position.normalize()
            };
            row.push(data.push(position.into(), normal.into(), [u + u_offset, v]));
        }
        grid.push(row);
    }

    for iy in 0..height_segments as usize {
        for ix in 0..width_segments as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];
            if iy != 0 {
                data.triangle(a, b, d);
            }
            if iy != height_segments as usize - 1 {
                data.triangle(b, c, d);
            }
        }
    }
    compute_tangents(&mut data);
    data
}

/// Two triangles per cell of a `(grid_x + 1) x (grid_y + 1)` vertex grid
/// whose first vertex sits at `start`.
fn grid_indices(data: &mut GeometryData, start: u32, grid_x: u32, grid_y: u32) {
    let row = grid_x + 1;
    for iy in 0..grid_y {
        for ix in 0..grid_x {
            let a = start + ix + row * iy;
            let b = start + ix + row * (iy + 1);
            let c = start + (ix + 1) + row * (iy + 1);
            let d = start + (ix + 1) + row * iy;
            data.triangle(a, b, d);
            data.triangle(b, c, d);
        }
    }
}

/// Accumulates per-triangle tangent frames and averages them per vertex.
///
/// Triangles with a degenerate UV mapping (sphere poles) are skipped; vertices
/// that end up without a tangent get one perpendicular to their normal.
pub fn compute_tangents(data: &mut GeometryData) {
    let vertices = &mut data.vertices;
    let mut triangles_included = vec![0u32; vertices.len()];
    let mut tangents = vec![Vector3::zero(); vertices.len()];
    let mut bitangents = vec![Vector3::zero(); vertices.len()];

    for c in data.indices.chunks_exact(3) {
        let [i0, i1, i2] = [c[0] as usize, c[1] as usize, c[2] as usize];
        let pos0: Vector3<f32> = vertices[i0].position.into();
        let pos1: Vector3<f32> = vertices[i1].position.into();
        let pos2: Vector3<f32> = vertices[i2].position.into();
        let uv0: Vector2<f32> = vertices[i0].tex_coords.into();
        let uv1: Vector2<f32> = vertices[i1].tex_coords.into();
        let uv2: Vector2<f32> = vertices[i2].tex_coords.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() < f32::EPSILON || delta_pos1.cross(delta_pos2).magnitude2() == 0.0 {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // Flipped so tangent-space normal maps authored with +Y up work with
        // the downward growing `v`.
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for i in [i0, i1, i2] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
            triangles_included[i] += 1;
        }
    }

    for (i, vertex) in vertices.iter_mut().enumerate() {
        let normal: Vector3<f32> = vertex.normal.into();
        let (tangent, bitangent) = match triangles_included[i] {
            0 => fallback_frame(normal),
            n => {
                let tangent = tangents[i] / n as f32;
                let bitangent = bitangents[i] / n as f32;
                if tangent.magnitude2() == 0.0 || bitangent.magnitude2() == 0.0 {
                    fallback_frame(normal)
                } else {
                    (tangent, bitangent)
                }
            }
        };
        vertex.tangent = tangent.into();
        vertex.bitangent = bitangent.into();
    }
}

fn fallback_frame(normal: Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    let helper = if normal.y.abs() < 0.99 {
        Vector3::unit_y()
    } else {
        Vector3::unit_x()
    };
    let tangent = helper.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(data: &GeometryData) {
        assert_eq!(data.indices.len() % 3, 0);
        let count = data.vertex_count() as u32;
        assert!(data.indices.iter().all(|&i| i < count));
        for vertex in &data.vertices {
            let all = vertex
                .position
                .iter()
                .chain(&vertex.normal)
                .chain(&vertex.tangent)
                .chain(&vertex.bitangent)
                .chain(&vertex.tex_coords);
            for value in all {
                assert!(value.is_finite());
            }
            let normal: Vector3<f32> = vertex.normal.into();
            assert!((normal.magnitude() - 1.0).abs() < 1e-4);
        }
    }

    /// The geometric normal of every triangle points the same way as its
    /// vertex normals, i.e. the winding is counter-clockwise seen from outside.
    fn assert_outward_winding(data: &GeometryData) {
        for c in data.indices.chunks_exact(3) {
            let p = |i: u32| Vector3::from(data.vertices[i as usize].position);
            let face = (p(c[1]) - p(c[0])).cross(p(c[2]) - p(c[0]));
            if face.magnitude2() < 1e-12 {
                continue;
            }
            let normal = Vector3::from(data.vertices[c[0] as usize].normal)
                + Vector3::from(data.vertices[c[1] as usize].normal)
                + Vector3::from(data.vertices[c[2] as usize].normal);
            assert!(face.dot(normal) > 0.0, "inward triangle {:?}", c);
        }
    }

    #[test]
    fn plane_has_grid_layout() {
        let plane = plane(2.0, 2.0, 2, 2);
        assert_eq!(plane.vertex_count(), 9);
        assert_eq!(plane.triangle_count(), 8);
        assert_well_formed(&plane);
        assert_outward_winding(&plane);
        // top left corner samples the top left of the image
        assert_eq!(plane.vertices[0].position, [-1.0, 1.0, 0.0]);
        assert_eq!(plane.vertices[0].tex_coords, [0.0, 0.0]);
    }

    #[test]
    fn cuboid_spans_its_extents() {
        let walls = cuboid(4.0, 2.5, 4.0);
        assert_eq!(walls.vertex_count(), 24);
        assert_eq!(walls.triangle_count(), 12);
        assert_well_formed(&walls);
        assert_outward_winding(&walls);
        for axis in 0..3 {
            let extent = [4.0, 2.5, 4.0][axis] / 2.0;
            let max = walls
                .vertices
                .iter()
                .map(|v| v.position[axis])
                .fold(f32::MIN, f32::max);
            assert!((max - extent).abs() < 1e-6);
        }
    }

    #[test]
    fn four_sided_cone_is_a_pyramid() {
        let roof = cone(3.5, 1.5, 4);
        assert_well_formed(&roof);
        assert_outward_winding(&roof);
        // 4 side triangles + 4 cap triangles
        assert_eq!(roof.triangle_count(), 8);
        let apex = roof
            .vertices
            .iter()
            .map(|v| v.position[1])
            .fold(f32::MIN, f32::max);
        assert!((apex - 0.75).abs() < 1e-6);
        let base_corner = roof.vertices[5].position;
        assert!((base_corner[2] - 3.5).abs() < 1e-6);
        assert!((base_corner[1] + 0.75).abs() < 1e-6);
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let bush = sphere(1.0, 16, 16);
        assert_eq!(bush.vertex_count(), 17 * 17);
        // the pole rows contribute one triangle per segment instead of two
        assert_eq!(bush.triangle_count(), 16 * 16 * 2 - 2 * 16);
        assert_well_formed(&bush);
        assert_outward_winding(&bush);
        for vertex in &bush.vertices {
            let distance = Vector3::from(vertex.position).magnitude();
            assert!((distance - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn tangents_follow_uv_layout() {
        let plane = plane(1.0, 1.0, 1, 1);
        for vertex in &plane.vertices {
            let tangent = Vector3::from(vertex.tangent).normalize();
            let bitangent = Vector3::from(vertex.bitangent).normalize();
            // u grows towards +X, image "up" is +Y
            assert!((tangent - Vector3::unit_x()).magnitude() < 1e-5);
            assert!((bitangent - Vector3::unit_y()).magnitude() < 1e-5);
        }
    }
}
