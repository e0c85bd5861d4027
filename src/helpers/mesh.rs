// OBJ mesh loading
//
// Produces a single interleaved, non-indexed vertex stream with one part per
// OBJ model. Per-vertex layout, in order: position (3), normal (3),
// texcoord (2), tangent (3), bitangent (3); optional attributes are left out
// when not requested.

use std::path::Path;

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};

/// Contiguous range of vertices belonging to one OBJ model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshPart {
    pub vertex_offset: u32,
    pub vertex_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeshLoadOptions {
    pub load_normals: bool,
    pub load_texcoords: bool,
    /// Requires normals and texcoords
    pub generate_tangent_space_vectors: bool,
    /// Centre the model at the origin and scale it into [-1, 1]
    pub unify: bool,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub data: Vec<f32>,
    pub parts: Vec<MeshPart>,
    pub bounds: Bounds,
    stride: usize,
}

impl Mesh {
    /// Floats per vertex
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn vertex_count(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride
        }
    }
}

struct Vertex {
    position: Vec3,
    normal: Vec3,
    texcoord: Vec2,
    tangent: Vec3,
    bitangent: Vec3,
}

fn bounds_of(vertices: &[Vertex]) -> Bounds {
    vertices.iter().fold(
        Bounds {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        },
        |b, v| Bounds {
            min: b.min.min(v.position),
            max: b.max.max(v.position),
        },
    )
}

/// Per-triangle tangent and bitangent from position and texcoord deltas
fn triangle_tangent_space(v: [&Vertex; 3]) -> (Vec3, Vec3) {
    let edge1 = v[1].position - v[0].position;
    let edge2 = v[2].position - v[0].position;
    let duv1 = v[1].texcoord - v[0].texcoord;
    let duv2 = v[2].texcoord - v[0].texcoord;

    let det = duv1.x * duv2.y - duv1.y * duv2.x;
    let r = if det.abs() > f32::EPSILON { 1.0 / det } else { 1.0 };

    let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
    let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;
    (tangent.normalize_or_zero(), bitangent.normalize_or_zero())
}

pub fn load_3d_model_from_obj_file(path: impl AsRef<Path>, options: MeshLoadOptions) -> Result<Mesh> {
    let path = path.as_ref();
    if options.generate_tangent_space_vectors && !(options.load_normals && options.load_texcoords) {
        anyhow::bail!("Tangent space generation needs normals and texture coordinates");
    }

    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ignore_lines: true,
            ignore_points: true,
            ..Default::default()
        },
    )
    .with_context(|| format!("Could not load OBJ file {}", path.display()))?;

    let mut vertices = Vec::new();
    let mut parts = Vec::with_capacity(models.len());

    for model in &models {
        let mesh = &model.mesh;
        let offset = vertices.len();

        if options.load_normals && mesh.normals.is_empty() {
            log::warn!("Model '{}' has no normals, using zero vectors", model.name);
        }
        if options.load_texcoords && mesh.texcoords.is_empty() {
            log::warn!("Model '{}' has no texture coordinates, using zeros", model.name);
        }

        for &index in &mesh.indices {
            let i = index as usize;
            let vec3_at = |src: &[f32]| src.get(3 * i..3 * i + 3).map_or(Vec3::ZERO, Vec3::from_slice);
            let texcoord = mesh
                .texcoords
                .get(2 * i..2 * i + 2)
                .map_or(Vec2::ZERO, Vec2::from_slice);

            vertices.push(Vertex {
                position: vec3_at(&mesh.positions),
                normal: vec3_at(&mesh.normals),
                texcoord,
                tangent: Vec3::ZERO,
                bitangent: Vec3::ZERO,
            });
        }

        parts.push(MeshPart {
            vertex_offset: offset as u32,
            vertex_count: (vertices.len() - offset) as u32,
        });
    }

    if vertices.is_empty() {
        anyhow::bail!("OBJ file {} contains no geometry", path.display());
    }

    if options.generate_tangent_space_vectors {
        for triangle in vertices.chunks_exact_mut(3) {
            let (tangent, bitangent) = triangle_tangent_space([&triangle[0], &triangle[1], &triangle[2]]);
            for vertex in triangle.iter_mut() {
                vertex.tangent = tangent;
                vertex.bitangent = bitangent;
            }
        }
    }

    let mut bounds = bounds_of(&vertices);
    if options.unify {
        let center = (bounds.min + bounds.max) * 0.5;
        let half_extent = ((bounds.max - bounds.min) * 0.5).max_element();
        let scale = if half_extent > 0.0 { 1.0 / half_extent } else { 1.0 };

        for vertex in vertices.iter_mut() {
            vertex.position = (vertex.position - center) * scale;
        }
        bounds = bounds_of(&vertices);
    }

    let stride = 3
        + if options.load_normals { 3 } else { 0 }
        + if options.load_texcoords { 2 } else { 0 }
        + if options.generate_tangent_space_vectors { 6 } else { 0 };

    let mut data = Vec::with_capacity(vertices.len() * stride);
    for vertex in &vertices {
        data.extend_from_slice(&vertex.position.to_array());
        if options.load_normals {
            data.extend_from_slice(&vertex.normal.to_array());
        }
        if options.load_texcoords {
            data.extend_from_slice(&vertex.texcoord.to_array());
        }
        if options.generate_tangent_space_vectors {
            data.extend_from_slice(&vertex.tangent.to_array());
            data.extend_from_slice(&vertex.bitangent.to_array());
        }
    }

    log::debug!(
        "Loaded {} vertices in {} parts from {}",
        vertices.len(),
        parts.len(),
        path.display()
    );

    Ok(Mesh {
        data,
        parts,
        bounds,
        stride,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE_OBJ: &str = "\
o triangle
v 0 0 0
v 2 0 0
v 0 2 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
";

    fn write_obj(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, TRIANGLE_OBJ).unwrap();
        path
    }

    #[test]
    fn positions_only() {
        let path = write_obj("vulkan_cookbook_mesh_positions.obj");
        let mesh = load_3d_model_from_obj_file(&path, MeshLoadOptions::default()).unwrap();

        assert_eq!(mesh.stride(), 3);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.parts, vec![MeshPart { vertex_offset: 0, vertex_count: 3 }]);
        assert_eq!(&mesh.data[3..6], &[2.0, 0.0, 0.0]);
        assert_eq!(mesh.bounds.max, Vec3::new(2.0, 2.0, 0.0));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn full_layout_with_tangents() {
        let path = write_obj("vulkan_cookbook_mesh_tangents.obj");
        let options = MeshLoadOptions {
            load_normals: true,
            load_texcoords: true,
            generate_tangent_space_vectors: true,
            unify: false,
        };
        let mesh = load_3d_model_from_obj_file(&path, options).unwrap();

        assert_eq!(mesh.stride(), 14);
        let first = &mesh.data[0..14];
        assert_eq!(&first[3..6], &[0.0, 0.0, 1.0]);
        assert_eq!(&first[6..8], &[0.0, 0.0]);
        assert!(Vec3::from_slice(&first[8..11]).abs_diff_eq(Vec3::X, 1e-5));
        assert!(Vec3::from_slice(&first[11..14]).abs_diff_eq(Vec3::Y, 1e-5));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn unify_centres_and_scales() {
        let path = write_obj("vulkan_cookbook_mesh_unify.obj");
        let options = MeshLoadOptions {
            unify: true,
            ..Default::default()
        };
        let mesh = load_3d_model_from_obj_file(&path, options).unwrap();

        assert!(mesh.bounds.min.abs_diff_eq(Vec3::new(-1.0, -1.0, 0.0), 1e-5));
        assert!(mesh.bounds.max.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));
        assert!(mesh.data.iter().all(|v| (-1.0..=1.0).contains(v)));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn tangents_require_normals_and_texcoords() {
        let options = MeshLoadOptions {
            generate_tangent_space_vectors: true,
            ..Default::default()
        };
        assert!(load_3d_model_from_obj_file("unused.obj", options).is_err());
        assert!(load_3d_model_from_obj_file("does/not/exist.obj", MeshLoadOptions::default()).is_err());
    }
}
