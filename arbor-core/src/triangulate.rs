//! Delaunay triangulation of polygon outlines on the YZ projection.
//!
//! Plain triangulation is incremental Bowyer-Watson seeded by a super
//! triangle. The constrained variant triangulates the same point set and
//! then keeps only triangles whose centroid falls inside the outline ring,
//! which recovers the boundary for non-convex hulls whose points all lie on
//! the outline. The convex prefix length short-circuits the containment
//! pass when the whole outline is convex.

use glam::Vec3;

use crate::hull::point_in_polygon_yz;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Triangle {
    a: usize,
    b: usize,
    c: usize,
}

/// `true` when `p` lies inside the circumcircle of the triangle `(a, b, c)`.
///
/// Determinant form; assumes the triangle is counter-clockwise in (z, y).
fn in_circumcircle(a: (f32, f32), b: (f32, f32), c: (f32, f32), p: (f32, f32)) -> bool {
    let (ax, ay) = (a.0 - p.0, a.1 - p.1);
    let (bx, by) = (b.0 - p.0, b.1 - p.1);
    let (cx, cy) = (c.0 - p.0, c.1 - p.1);
    let det = (ax * ax + ay * ay) * (bx * cy - cx * by)
        - (bx * bx + by * by) * (ax * cy - cx * ay)
        + (cx * cx + cy * cy) * (ax * by - bx * ay);
    det > 0.0
}

fn orient(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Delaunay triangulation of `points` projected to (z, y).
///
/// Returns a flat index list, three indices per triangle, each triangle
/// counter-clockwise on the projection. Fewer than three points yield an
/// empty list.
pub fn delaunay_yz(points: &[Vec3]) -> Vec<u32> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    let mut verts: Vec<(f32, f32)> = points.iter().map(|p| (p.z, p.y)).collect();

    // Super triangle generously covering the point cloud.
    let min_z = verts.iter().map(|v| v.0).fold(f32::INFINITY, f32::min);
    let max_z = verts.iter().map(|v| v.0).fold(f32::NEG_INFINITY, f32::max);
    let min_y = verts.iter().map(|v| v.1).fold(f32::INFINITY, f32::min);
    let max_y = verts.iter().map(|v| v.1).fold(f32::NEG_INFINITY, f32::max);
    let span = ((max_z - min_z).max(max_y - min_y)).max(1.0) * 16.0;
    let mid_z = (min_z + max_z) * 0.5;
    let mid_y = (min_y + max_y) * 0.5;
    verts.push((mid_z - span, mid_y - span));
    verts.push((mid_z + span, mid_y - span));
    verts.push((mid_z, mid_y + span));

    let mut triangles = vec![Triangle { a: n, b: n + 1, c: n + 2 }];

    for i in 0..n {
        let p = verts[i];

        // Triangles whose circumcircle swallows the new point.
        let mut bad: Vec<usize> = Vec::new();
        for (ti, t) in triangles.iter().enumerate() {
            let (mut a, mut b, c) = (verts[t.a], verts[t.b], verts[t.c]);
            if orient(a, b, c) < 0.0 {
                std::mem::swap(&mut a, &mut b);
            }
            if in_circumcircle(a, b, c, p) {
                bad.push(ti);
            }
        }

        // Boundary of the cavity: edges owned by exactly one bad triangle.
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for &ti in &bad {
            let t = triangles[ti];
            for (ea, eb) in [(t.a, t.b), (t.b, t.c), (t.c, t.a)] {
                let shared = bad.iter().any(|&other| {
                    if other == ti {
                        return false;
                    }
                    let o = triangles[other];
                    let edges = [(o.a, o.b), (o.b, o.c), (o.c, o.a)];
                    edges
                        .iter()
                        .any(|&(oa, ob)| (oa == ea && ob == eb) || (oa == eb && ob == ea))
                });
                if !shared {
                    boundary.push((ea, eb));
                }
            }
        }

        for ti in bad.into_iter().rev() {
            triangles.swap_remove(ti);
        }
        for (ea, eb) in boundary {
            triangles.push(Triangle { a: ea, b: eb, c: i });
        }
    }

    let mut out = Vec::with_capacity(triangles.len() * 3);
    for t in triangles {
        if t.a >= n || t.b >= n || t.c >= n {
            continue;
        }
        let (a, b, c) = (verts[t.a], verts[t.b], verts[t.c]);
        if orient(a, b, c) >= 0.0 {
            out.extend_from_slice(&[t.a as u32, t.b as u32, t.c as u32]);
        } else {
            out.extend_from_slice(&[t.a as u32, t.c as u32, t.b as u32]);
        }
    }
    out
}

/// Constrained triangulation of an outline ring: the ring edges bound the
/// result, so reflex regions outside the outline are left uncovered.
///
/// `last_convex_index` marks the end of the guaranteed-convex prefix; when
/// it covers the whole ring the containment pass is skipped entirely.
pub fn delaunay_constrained_yz(points: &[Vec3], last_convex_index: usize) -> Vec<u32> {
    let triangles = delaunay_yz(points);
    if points.len() < 3 || last_convex_index + 1 >= points.len() {
        return triangles;
    }
    let mut out = Vec::with_capacity(triangles.len());
    for t in triangles.chunks_exact(3) {
        let centroid = (points[t[0] as usize] + points[t[1] as usize] + points[t[2] as usize])
            / 3.0;
        if point_in_polygon_yz(points, centroid) {
            out.extend_from_slice(t);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zy(z: f32, y: f32) -> Vec3 {
        Vec3::new(0.0, y, z)
    }

    fn triangle_area_yz(a: Vec3, b: Vec3, c: Vec3) -> f32 {
        0.5 * ((b.z - a.z) * (c.y - a.y) - (b.y - a.y) * (c.z - a.z)).abs()
    }

    fn total_area(points: &[Vec3], triangles: &[u32]) -> f32 {
        triangles
            .chunks_exact(3)
            .map(|t| {
                triangle_area_yz(
                    points[t[0] as usize],
                    points[t[1] as usize],
                    points[t[2] as usize],
                )
            })
            .sum()
    }

    #[test]
    fn square_triangulates_into_two_triangles() {
        let points = vec![zy(0.0, 0.0), zy(1.0, 0.0), zy(1.0, 1.0), zy(0.0, 1.0)];
        let triangles = delaunay_yz(&points);
        assert_eq!(triangles.len(), 6);
        assert!((total_area(&points, &triangles) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn convex_ring_of_n_points_yields_n_minus_2_triangles() {
        let n = 8;
        // Varying radii keep the ring convex without cocircular points.
        let points: Vec<Vec3> = (0..n)
            .map(|i| {
                let t = i as f32 / n as f32 * std::f32::consts::TAU;
                let r = if i % 2 == 0 { 3.0 } else { 2.8 };
                zy(t.cos() * r, t.sin() * r)
            })
            .collect();
        let triangles = delaunay_yz(&points);
        assert_eq!(triangles.len() / 3, n - 2);
    }

    #[test]
    fn fewer_than_three_points_yield_no_triangles() {
        assert!(delaunay_yz(&[zy(0.0, 0.0), zy(1.0, 0.0)]).is_empty());
        assert!(delaunay_yz(&[]).is_empty());
    }

    #[test]
    fn output_triangles_are_counter_clockwise() {
        let points = vec![zy(0.0, 0.0), zy(2.0, 0.0), zy(2.0, 2.0), zy(0.0, 2.0)];
        let triangles = delaunay_yz(&points);
        for t in triangles.chunks_exact(3) {
            let (a, b, c) = (
                points[t[0] as usize],
                points[t[1] as usize],
                points[t[2] as usize],
            );
            let cross = (b.z - a.z) * (c.y - a.y) - (b.y - a.y) * (c.z - a.z);
            assert!(cross > 0.0, "triangle {t:?} is not counter-clockwise");
        }
    }

    #[test]
    fn constrained_triangulation_respects_a_non_convex_outline() {
        // An L-shaped ring: the 3x3 square minus its upper-right 2x2 corner.
        let ring = vec![
            zy(0.0, 0.0),
            zy(3.0, 0.0),
            zy(3.0, 1.0),
            zy(1.0, 1.0),
            zy(1.0, 3.0),
            zy(0.0, 3.0),
        ];
        let unconstrained = delaunay_yz(&ring);
        let constrained = delaunay_constrained_yz(&ring, 2);
        // The plain triangulation fills the convex hull; the constrained one
        // covers exactly the L area.
        assert!(total_area(&ring, &unconstrained) > 6.9);
        assert!((total_area(&ring, &constrained) - 5.0).abs() < 1e-3);
        assert!(constrained.len() < unconstrained.len());
    }

    #[test]
    fn fully_convex_index_skips_the_containment_pass() {
        let points = vec![zy(0.0, 0.0), zy(1.0, 0.0), zy(1.0, 1.0), zy(0.0, 1.0)];
        let plain = delaunay_yz(&points);
        let constrained = delaunay_constrained_yz(&points, points.len() - 1);
        assert_eq!(plain, constrained);
    }
}
