//! Polygon areas: triangulated, UV-mapped 2D hulls derived from fragments,
//! the unit the texture atlas packer consumes.
//!
//! The bounds pass builds and simplifies the hull and its boxes; the mesh
//! pass triangulates and derives normals, tangents and UVs. Degenerate
//! fragments are skipped with an error, never panicked on.

use glam::{Vec3, Vec4};
use thiserror::Error;

use crate::fragment::{Fragment, FragmentBuilder};
use crate::geom::{Aabb, inverse_lerp};
use crate::hull::{
    combine_hulls_yz, last_convex_prefix, obb_yz, quickhull_yz, shift_hull_start, simplify_hull_yz,
};
use crate::triangulate::{delaunay_constrained_yz, delaunay_yz};

/// Per-fragment geometry failures; the batch continues past them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("fragment hull has fewer than 3 points")]
    DegenerateHull,
    #[error("mesh bounds have no area to scale against")]
    ZeroAreaBounds,
}

/// Hull simplification thresholds per LOD, in degrees of turn angle below
/// which a vertex is dropped; the last entry covers every higher LOD.
const SIMPLIFY_THRESHOLDS: [f32; 3] = [20.0, 28.0, 35.0];

/// Threshold used when simplifying a combined non-convex outline.
const NON_CONVEX_SIMPLIFY_THRESHOLD: f32 = 25.0;

/// Sprout sample reach used while building non-convex hulls.
const NON_CONVEX_SPROUT_SCALE: f32 = 1.3;

/// A triangulated, UV-mapped outline derived from one fragment at one LOD.
#[derive(Clone, Debug, Default)]
pub struct PolygonArea {
    /// Compound id: `owner * 100000 + lod * 10000 + fragment`.
    pub id: u32,
    pub owner_id: u32,
    pub fragment_index: usize,
    pub lod: usize,
    /// Anchor of the owning fragment in tree space.
    pub fragment_offset: Vec3,
    /// Outline points; the prefix up to `last_convex_point_index` closes
    /// into a convex sub-polygon.
    pub points: Vec<Vec3>,
    pub last_convex_point_index: usize,
    pub is_non_convex: bool,
    pub triangles: Vec<u32>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    /// Two UV pairs per vertex, both inverse-lerped into the hull AABB.
    pub uvs: Vec<Vec4>,
    pub aabb: Aabb,
    pub obb: Aabb,
    /// Rotation of the oriented box, degrees about the projection axis.
    pub obb_angle: f32,
    /// Hull extent relative to the mesh extent on the dominant axis.
    pub scale: f32,
    /// Content hash of the owning fragment, the exporter's cache key.
    pub hash: u64,
}

impl PolygonArea {
    pub fn new(owner_id: u32, fragment_index: usize, lod: usize) -> Self {
        Self {
            id: Self::compound_id(owner_id, fragment_index, lod),
            owner_id,
            fragment_index,
            lod,
            scale: 1.0,
            ..Self::default()
        }
    }

    /// Packs owner, fragment (0..9999) and LOD (0..9) into one key.
    pub fn compound_id(owner_id: u32, fragment_index: usize, lod: usize) -> u32 {
        owner_id * 100_000 + lod as u32 * 10_000 + fragment_index as u32
    }
}

impl FragmentBuilder<'_> {
    /// Builds the polygon areas for every fragment of a LOD, skipping
    /// degenerate fragments.
    pub fn build_polygon_areas(&self, owner_id: u32, lod: usize) -> Vec<PolygonArea> {
        let fragments = self.generate_fragments(lod);
        let mut areas = Vec::with_capacity(fragments.len());
        for (index, fragment) in fragments.iter().enumerate() {
            let mut area = PolygonArea::new(owner_id, index, lod);
            area.fragment_offset = fragment.offset;
            area.hash = fragment.content_hash(owner_id);
            let result = self
                .process_polygon_bounds(&mut area, fragment)
                .and_then(|_| self.process_polygon_mesh(&mut area));
            match result {
                Ok(()) => areas.push(area),
                Err(err) => {
                    tracing::warn!(fragment = index, lod, "skipping fragment: {err}");
                }
            }
        }
        areas
    }

    /// Bounds pass: hull construction and simplification, axis-aligned and
    /// oriented boxes, and the scale against the mesh extents.
    pub fn process_polygon_bounds(
        &self,
        area: &mut PolygonArea,
        fragment: &Fragment,
    ) -> Result<(), GeometryError> {
        if area.lod <= 1 && fragment.has_includes_or_excludes() {
            self.build_non_convex_hull(area, fragment)?;
        } else {
            self.build_convex_hull(area, fragment)?;
        }
        if area.points.len() < 3 {
            return Err(GeometryError::DegenerateHull);
        }

        area.aabb = Aabb::from_points(&area.points);
        let (obb, obb_angle) = obb_yz(&area.points);
        area.obb = obb;
        area.obb_angle = obb_angle;

        // Scale relative to the mesh on whichever of its YZ extents is
        // larger.
        let mesh_width = self.mesh.bounds.max.z - self.mesh.bounds.min.z;
        let mesh_height = self.mesh.bounds.max.y - self.mesh.bounds.min.y;
        let (hull_extent, mesh_extent) = if mesh_width > mesh_height {
            (area.aabb.max.z - area.aabb.min.z, mesh_width)
        } else {
            (area.aabb.max.y - area.aabb.min.y, mesh_height)
        };
        if mesh_extent <= f32::EPSILON {
            return Err(GeometryError::ZeroAreaBounds);
        }
        area.scale = hull_extent / mesh_extent;
        Ok(())
    }

    /// Single convex hull over the fragment's outline and sprout samples.
    fn build_convex_hull(
        &self,
        area: &mut PolygonArea,
        fragment: &Fragment,
    ) -> Result<(), GeometryError> {
        let (mut points, ids) = self.outline_points(&fragment.includes, &fragment.excludes);
        points.extend(self.sprout_points(&ids, 1.0));
        let scaled: Vec<Vec3> = points.iter().map(|p| *p * self.scale).collect();

        let hull = quickhull_yz(&scaled);
        if hull.len() < 3 {
            return Err(GeometryError::DegenerateHull);
        }
        let mut hull = shift_hull_start(&hull);
        if self.simplify_enabled {
            // Close the ring so the last edge participates, then reopen.
            let first = hull[0];
            hull.push(first);
            let threshold = SIMPLIFY_THRESHOLDS[area.lod.min(SIMPLIFY_THRESHOLDS.len() - 1)];
            hull = simplify_hull_yz(&hull, threshold);
            hull.pop();
        }

        area.points = hull;
        area.last_convex_point_index = area.points.len().saturating_sub(1);
        area.is_non_convex = false;
        Ok(())
    }

    /// Union of per-sub-branch convex hulls: each level-1 branch of the
    /// filtered section gets its own hull (anchored by the trunk's shared
    /// sample points), and the hulls are combined into one outline.
    fn build_non_convex_hull(
        &self,
        area: &mut PolygonArea,
        fragment: &Fragment,
    ) -> Result<(), GeometryError> {
        let filtered = self.filtered_branches(&fragment.includes, &fragment.excludes);

        let mut common_points: Vec<Vec3> = Vec::new();
        let mut trunk_span: Option<(Vec3, Vec3)> = None;
        let mut polygons: Vec<Vec<Vec3>> = Vec::new();

        for &id in &filtered {
            let level = self.tree.level_of(id);
            if level == 0 {
                if filtered.len() == 1 {
                    return Err(GeometryError::DegenerateHull);
                }
                let branch = &self.tree.branches[id];
                let base = branch.point_at(0.0);
                let tip = branch.point_at(1.0);
                trunk_span = Some((base, tip));
                common_points.push(base);
                common_points.push(tip);
                common_points.extend(self.sprout_points(&[id], NON_CONVEX_SPROUT_SCALE));
            } else if level == 1 {
                let subtree = self.tree.subtree_ids(id);
                let mut points = vec![self.tree.branches[id].point_at(0.0)];
                points.extend(common_points.iter().copied());
                for &sub_id in &subtree {
                    let sub = &self.tree.branches[sub_id];
                    if sub.children.is_empty() {
                        points.push(sub.point_at(1.0));
                    }
                }
                points.extend(self.sprout_points(&subtree, NON_CONVEX_SPROUT_SCALE));

                let scaled: Vec<Vec3> = points.iter().map(|p| *p * self.scale).collect();
                let hull = quickhull_yz(&scaled);
                if hull.len() >= 3 {
                    polygons.push(hull);
                }
            }
        }

        if polygons.is_empty() {
            return Err(GeometryError::DegenerateHull);
        }
        let mut combined = if polygons.len() > 1 {
            // Every hull contains the trunk's base and tip samples, so the
            // union is star-shaped about their midpoint.
            let center = match trunk_span {
                Some((base, tip)) => (base + tip) * 0.5 * self.scale,
                None => polygons[0].iter().copied().sum::<Vec3>() / polygons[0].len() as f32,
            };
            combine_hulls_yz(&polygons, center)
        } else {
            polygons.swap_remove(0)
        };
        if self.simplify_enabled {
            combined = simplify_hull_yz(&combined, NON_CONVEX_SIMPLIFY_THRESHOLD);
        }

        area.last_convex_point_index = last_convex_prefix(&combined);
        area.points = combined;
        area.is_non_convex = true;
        Ok(())
    }

    /// Mesh pass: triangulation plus per-vertex normals, tangents and UVs.
    pub fn process_polygon_mesh(&self, area: &mut PolygonArea) -> Result<(), GeometryError> {
        if area.points.len() < 3 {
            return Err(GeometryError::DegenerateHull);
        }
        area.triangles = if area.is_non_convex {
            delaunay_constrained_yz(&area.points, area.last_convex_point_index)
        } else {
            delaunay_yz(&area.points)
        };

        // One flat normal from the first non-degenerate triangle; the
        // outline lives in the projection plane.
        let normal = area
            .triangles
            .chunks_exact(3)
            .find_map(|t| {
                let a = area.points[t[0] as usize];
                let b = area.points[t[1] as usize];
                let c = area.points[t[2] as usize];
                let n = (b - a).cross(c - a);
                (n.length_squared() > f32::EPSILON).then(|| n.normalize())
            })
            .unwrap_or(Vec3::X);
        area.normals = vec![normal; area.points.len()];

        // Tangents pinned to the projection plane.
        area.tangents = vec![Vec4::new(0.0, 0.0, 1.0, 1.0); area.points.len()];

        // UVs: inverse-lerp into the hull AABB, duplicated into two pairs.
        area.uvs = area
            .points
            .iter()
            .map(|p| {
                let u = inverse_lerp(area.aabb.min.z, area.aabb.max.z, p.z);
                let v = inverse_lerp(area.aabb.min.y, area.aabb.max.y, p.y);
                Vec4::new(u, v, u, v)
            })
            .collect();
        Ok(())
    }
}
