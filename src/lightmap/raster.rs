//! UV-space rasterisation of bake geometry into per-texel surface samples,
//! and the coarse-to-fine order in which those samples are rendered.

use glam::{Vec2, Vec3};

use super::geometry::BakeGeometry;

const NO_SURFEL: u32 = u32::MAX;
/// Slack on the barycentric inside test so texel centres exactly on a shared
/// edge are not dropped by both triangles.
const EDGE_EPSILON: f32 = 1e-5;

/// A lightmap texel together with the surface point it stands for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surfel {
    pub x: u32,
    pub y: u32,
    pub position: Vec3,
    pub normal: Vec3,
}

/// Every covered texel of a `width × height` lightmap.
#[derive(Debug, Clone)]
pub struct SurfelMap {
    width: u32,
    height: u32,
    surfels: Vec<Surfel>,
    /// Surfel index per texel, `NO_SURFEL` where nothing was rasterised.
    index: Vec<u32>,
}

impl SurfelMap {
    /// Rasterise every triangle at texel centres. Where triangles overlap in
    /// UV space the first one drawn keeps the texel.
    pub fn rasterize(geometry: &BakeGeometry, width: u32, height: u32) -> Self {
        let mut map = Self {
            width,
            height,
            surfels: Vec::new(),
            index: vec![NO_SURFEL; width as usize * height as usize],
        };
        let size = Vec2::new(width as f32, height as f32);

        for [a, b, c] in geometry.triangles() {
            let normal = (b.position - a.position).cross(c.position - a.position);
            let Some(normal) = normal.try_normalize() else {
                continue;
            };
            let (ta, tb, tc) = (a.uv * size, b.uv * size, c.uv * size);
            let area = edge(ta, tb, tc);
            if area.abs() <= f32::EPSILON {
                continue;
            }

            let min = ta.min(tb).min(tc).floor().max(Vec2::ZERO);
            let max = ta.max(tb).max(tc).ceil().min(size);
            for y in min.y as u32..max.y as u32 {
                for x in min.x as u32..max.x as u32 {
                    let slot = (y * width + x) as usize;
                    if map.index[slot] != NO_SURFEL {
                        continue;
                    }
                    let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    let wa = edge(tb, tc, p) / area;
                    let wb = edge(tc, ta, p) / area;
                    let wc = edge(ta, tb, p) / area;
                    if wa < -EDGE_EPSILON || wb < -EDGE_EPSILON || wc < -EDGE_EPSILON {
                        continue;
                    }
                    map.index[slot] = map.surfels.len() as u32;
                    map.surfels.push(Surfel {
                        x,
                        y,
                        position: a.position * wa + b.position * wb + c.position * wc,
                        normal,
                    });
                }
            }
        }
        map
    }

    pub fn surfels(&self) -> &[Surfel] {
        &self.surfels
    }

    pub fn len(&self) -> usize {
        self.surfels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfels.is_empty()
    }

    /// Surfel index at texel `(x, y)`, if that texel is covered.
    pub fn at(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        match self.index[(y as u32 * self.width + x as u32) as usize] {
            NO_SURFEL => None,
            i => Some(i as usize),
        }
    }

    /// Surfel indices grouped by pass, coarsest lattice first. Pass `p`
    /// holds the texels whose interpolation level is `passes - p`.
    pub fn schedule(&self, passes: u32) -> Vec<Vec<usize>> {
        let mut order = vec![Vec::new(); passes as usize + 1];
        for (i, s) in self.surfels.iter().enumerate() {
            let level = interpolation_level(s.x, s.y, passes);
            order[(passes - level) as usize].push(i);
        }
        order
    }
}

/// Twice the signed area of `(a, b, p)`.
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Largest `l <= passes` such that both coordinates are multiples of `2^l`.
pub fn interpolation_level(x: u32, y: u32, passes: u32) -> u32 {
    let zeros = (x | y).trailing_zeros();
    zeros.min(passes)
}

/// Texels a level-`level` texel may be interpolated from: the two horizontal
/// or vertical neighbours at distance `2^level`, or the four diagonal ones.
/// Texels on the coarsest lattice have none.
pub fn interpolation_sources(x: u32, y: u32, level: u32, passes: u32) -> Vec<(i64, i64)> {
    if level >= passes {
        return Vec::new();
    }
    let d = 1i64 << level;
    let (x, y) = (x as i64, y as i64);
    let odd_x = (x >> level) & 1 == 1;
    let odd_y = (y >> level) & 1 == 1;
    match (odd_x, odd_y) {
        (true, false) => vec![(x - d, y), (x + d, y)],
        (false, true) => vec![(x, y - d), (x, y + d)],
        _ => vec![(x - d, y - d), (x + d, y - d), (x - d, y + d), (x + d, y + d)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lightmap::geometry::BakeVertex;

    fn quad(uv_max: f32) -> BakeGeometry {
        let v = |x: f32, z: f32, u: f32, w: f32| BakeVertex {
            position: Vec3::new(x, 0.0, z),
            uv: Vec2::new(u, w),
        };
        BakeGeometry {
            vertices: vec![
                v(0.0, 0.0, 0.0, 0.0),
                v(0.0, 4.0, 0.0, uv_max),
                v(4.0, 4.0, uv_max, uv_max),
                v(4.0, 0.0, uv_max, 0.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    #[test]
    fn full_quad_covers_every_texel_once() {
        let map = SurfelMap::rasterize(&quad(1.0), 4, 4);
        assert_eq!(map.len(), 16);
        for y in 0..4 {
            for x in 0..4 {
                assert!(map.at(x, y).is_some(), "texel ({x}, {y}) missing");
            }
        }
        assert!(map.at(4, 0).is_none());
        assert!(map.at(-1, 0).is_none());
    }

    #[test]
    fn surfels_sit_on_the_surface_facing_up() {
        let map = SurfelMap::rasterize(&quad(1.0), 4, 4);
        let s = map.surfels()[map.at(1, 2).unwrap()];
        // texel centre (1.5, 2.5) in uv space maps to world x = 1.5, z = 2.5
        assert!(s.position.abs_diff_eq(Vec3::new(1.5, 0.0, 2.5), 1e-5));
        assert!(s.normal.abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn partial_uv_range_leaves_texels_uncovered() {
        let map = SurfelMap::rasterize(&quad(0.5), 4, 4);
        assert_eq!(map.len(), 4);
        assert!(map.at(2, 2).is_none());
    }

    #[test]
    fn degenerate_triangles_are_skipped() {
        let mut geometry = quad(1.0);
        geometry.vertices[2].position = geometry.vertices[0].position;
        geometry.vertices[3].position = geometry.vertices[0].position;
        assert!(SurfelMap::rasterize(&geometry, 4, 4).is_empty());
    }

    #[test]
    fn levels_follow_power_of_two_lattice() {
        assert_eq!(interpolation_level(0, 0, 3), 3);
        assert_eq!(interpolation_level(8, 16, 3), 3);
        assert_eq!(interpolation_level(4, 0, 3), 2);
        assert_eq!(interpolation_level(2, 6, 3), 1);
        assert_eq!(interpolation_level(1, 4, 3), 0);
    }

    #[test]
    fn sources_lie_on_the_coarser_lattice() {
        assert!(interpolation_sources(0, 0, 2, 2).is_empty());
        assert_eq!(interpolation_sources(2, 0, 1, 2), vec![(0, 0), (4, 0)]);
        assert_eq!(interpolation_sources(0, 2, 1, 2), vec![(0, 0), (0, 4)]);
        assert_eq!(interpolation_sources(1, 1, 0, 2), vec![(0, 0), (2, 0), (0, 2), (2, 2)]);
        for (x, y) in interpolation_sources(3, 1, 0, 2) {
            assert!(interpolation_level(x as u32, y as u32, 2) >= 1);
        }
    }

    #[test]
    fn schedule_orders_coarse_to_fine() {
        let map = SurfelMap::rasterize(&quad(1.0), 4, 4);
        let order = map.schedule(2);
        assert_eq!(order.len(), 3);
        assert_eq!(order.iter().map(Vec::len).sum::<usize>(), 16);
        // (0,0) alone on the 4-texel lattice
        assert_eq!(order[0].len(), 1);
        // (2,0), (0,2), (2,2)
        assert_eq!(order[1].len(), 3);
        assert_eq!(order[2].len(), 12);
    }
}
