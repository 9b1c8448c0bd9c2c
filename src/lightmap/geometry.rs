use glam::{Mat4, Vec2, Vec3};

use crate::renderer::model::MeshData;

/// Position + lightmap UV; the only attributes the baker reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakeVertex {
    pub position: Vec3,
    pub uv: Vec2,
}

/// Every model instance's triangles flattened into one world-space buffer.
/// Built once at scene load; read-only input to a bake.
#[derive(Debug, Clone, Default)]
pub struct BakeGeometry {
    pub vertices: Vec<BakeVertex>,
    pub indices: Vec<u32>,
}

impl BakeGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mesh transformed by `world`. Indices are rebased onto the
    /// shared vertex buffer.
    pub fn append(&mut self, mesh: &MeshData, world: &Mat4) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(mesh.positions.iter().enumerate().map(|(i, p)| BakeVertex {
            position: world.transform_point3(Vec3::from(*p)),
            uv: mesh.uvs.get(i).map(|t| Vec2::from(*t)).unwrap_or(Vec2::ZERO),
        }));
        self.indices.extend(mesh.indices.iter().map(|i| base + i));
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [BakeVertex; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            Some([
                *self.vertices.get(tri[0] as usize)?,
                *self.vertices.get(tri[1] as usize)?,
                *self.vertices.get(tri[2] as usize)?,
            ])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshData {
        MeshData {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            indices: vec![0, 1, 2],
            ..Default::default()
        }
    }

    #[test]
    fn append_rebases_indices_and_applies_transform() {
        let mut geometry = BakeGeometry::new();
        geometry.append(&triangle(), &Mat4::IDENTITY);
        geometry.append(&triangle(), &Mat4::from_translation(Vec3::Y));

        assert_eq!(geometry.vertices.len(), 6);
        assert_eq!(geometry.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(geometry.triangle_count(), 2);
        assert_eq!(geometry.vertices[4].position, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(geometry.vertices[4].uv, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn out_of_range_indices_are_skipped() {
        let geometry = BakeGeometry {
            vertices: vec![
                BakeVertex {
                    position: Vec3::ZERO,
                    uv: Vec2::ZERO,
                };
                3
            ],
            indices: vec![0, 1, 2, 0, 1, 9],
        };
        assert_eq!(geometry.triangles().count(), 1);
    }
}
