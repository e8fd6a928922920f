//! 2D hull construction on the YZ projection.
//!
//! Fragment outlines are built orthogonal to the mesh's long axis: all
//! geometry here treats `z` as the horizontal axis and `y` as the vertical
//! axis, carrying the `x` component of each point along untouched.

use glam::{Quat, Vec3};

use crate::geom::Aabb;

const EPS: f32 = 1e-6;

/// 2D cross product of `o->a` and `o->b` in the YZ plane; positive means
/// `b` lies left of `o->a`.
fn cross_yz(o: Vec3, a: Vec3, b: Vec3) -> f32 {
    (a.z - o.z) * (b.y - o.y) - (a.y - o.y) * (b.z - o.z)
}

fn dist_yz_sq(a: Vec3, b: Vec3) -> f32 {
    let dz = a.z - b.z;
    let dy = a.y - b.y;
    dz * dz + dy * dy
}

/// Angle between two direction vectors projected on YZ, in degrees.
pub fn angle_deg_yz(a: Vec3, b: Vec3) -> f32 {
    let dot = a.z * b.z + a.y * b.y;
    let la = (a.z * a.z + a.y * a.y).sqrt();
    let lb = (b.z * b.z + b.y * b.y).sqrt();
    if la <= EPS || lb <= EPS {
        return 0.0;
    }
    (dot / (la * lb)).clamp(-1.0, 1.0).acos().to_degrees()
}

fn signed_area_yz(points: &[Vec3]) -> f32 {
    let mut area = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        area += a.z * b.y - b.z * a.y;
    }
    area * 0.5
}

/// Convex hull of `points` on the YZ projection via quickhull, returned in
/// counter-clockwise boundary order.
///
/// Fewer than three distinct points are returned as-is.
pub fn quickhull_yz(points: &[Vec3]) -> Vec<Vec3> {
    // Drop exact duplicates; they contribute nothing and upset recursion.
    let mut unique: Vec<Vec3> = Vec::with_capacity(points.len());
    for &p in points {
        if !unique.iter().any(|&q| dist_yz_sq(p, q) <= EPS * EPS) {
            unique.push(p);
        }
    }
    if unique.len() < 3 {
        return unique;
    }

    let key = |p: &Vec3| (p.z, p.y);
    let a = *unique
        .iter()
        .min_by(|p, q| key(p).partial_cmp(&key(q)).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(&unique[0]);
    let b = *unique
        .iter()
        .max_by(|p, q| key(p).partial_cmp(&key(q)).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(&unique[0]);

    let left_of = |p: Vec3, q: Vec3| -> Vec<Vec3> {
        unique
            .iter()
            .copied()
            .filter(|&r| cross_yz(p, q, r) > EPS)
            .collect()
    };

    let mut hull = Vec::with_capacity(unique.len());
    hull.push(a);
    build_side(a, b, left_of(a, b), &mut hull);
    hull.push(b);
    build_side(b, a, left_of(b, a), &mut hull);

    // Canonical counter-clockwise winding.
    if signed_area_yz(&hull) < 0.0 {
        hull.reverse();
    }
    hull
}

fn build_side(a: Vec3, b: Vec3, points: Vec<Vec3>, hull: &mut Vec<Vec3>) {
    if points.is_empty() {
        return;
    }
    let c = points
        .iter()
        .copied()
        .max_by(|p, q| {
            cross_yz(a, b, *p)
                .partial_cmp(&cross_yz(a, b, *q))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(a);
    let left_ac: Vec<Vec3> = points.iter().copied().filter(|&r| cross_yz(a, c, r) > EPS).collect();
    let left_cb: Vec<Vec3> = points.iter().copied().filter(|&r| cross_yz(c, b, r) > EPS).collect();
    build_side(a, c, left_ac, hull);
    hull.push(c);
    build_side(c, b, left_cb, hull);
}

/// `true` if `p` lies inside or on the convex ring on the YZ projection.
pub fn point_in_convex_yz(hull: &[Vec3], p: Vec3) -> bool {
    if hull.len() < 3 {
        return false;
    }
    let orientation = signed_area_yz(hull).signum();
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        if cross_yz(a, b, p) * orientation < -1e-4 {
            return false;
        }
    }
    true
}

fn point_strictly_in_convex_yz(hull: &[Vec3], p: Vec3) -> bool {
    if hull.len() < 3 {
        return false;
    }
    let orientation = signed_area_yz(hull).signum();
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        if cross_yz(a, b, p) * orientation <= 1e-4 {
            return false;
        }
    }
    true
}

/// `true` if `p` is inside the (possibly non-convex) ring on the YZ
/// projection, by ray casting.
pub fn point_in_polygon_yz(ring: &[Vec3], p: Vec3) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (zi, yi) = (ring[i].z, ring[i].y);
        let (zj, yj) = (ring[j].z, ring[j].y);
        if ((yi > p.y) != (yj > p.y))
            && (p.z < (zj - zi) * (p.y - yi) / (yj - yi) + zi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Removes outline vertices whose turn deviates less than `threshold_deg`
/// from the running edge direction, keeping the first and last point.
///
/// A lower threshold removes less, preserving more of the outline shape.
pub fn simplify_hull_yz(points: &[Vec3], threshold_deg: f32) -> Vec<Vec3> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    let mut anchor = 0;
    for b in 1..points.len() - 1 {
        let edge_at_anchor = points[anchor + 1] - points[anchor];
        let edge_at_b = points[b + 1] - points[b];
        if angle_deg_yz(edge_at_anchor, edge_at_b) > threshold_deg {
            out.push(points[b]);
            anchor = b;
        }
    }
    out.push(points[points.len() - 1]);
    out
}

/// Rotates the ring so it starts at the point closest to the origin.
pub fn shift_hull_start(points: &[Vec3]) -> Vec<Vec3> {
    if points.is_empty() {
        return Vec::new();
    }
    let mut shift = 0;
    let mut best = f32::INFINITY;
    for (i, p) in points.iter().enumerate() {
        let d = p.length();
        if d < best {
            best = d;
            shift = i;
        }
    }
    let mut out = Vec::with_capacity(points.len());
    out.extend_from_slice(&points[shift..]);
    out.extend_from_slice(&points[..shift]);
    out
}

/// Intersection point of segments `p1-p2` and `q1-q2` on the YZ projection,
/// carrying an interpolated `x`.
fn segment_intersection_yz(p1: Vec3, p2: Vec3, q1: Vec3, q2: Vec3) -> Option<Vec3> {
    let r = p2 - p1;
    let s = q2 - q1;
    let denom = r.z * s.y - r.y * s.z;
    if denom.abs() <= EPS {
        return None;
    }
    let qp = q1 - p1;
    let t = (qp.z * s.y - qp.y * s.z) / denom;
    let u = (qp.z * r.y - qp.y * r.z) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p1 + r * t)
    } else {
        None
    }
}

/// Unions overlapping convex rings into a single (possibly non-convex)
/// outline.
///
/// Every input ring must contain `center`; the union is then star-shaped
/// about it, so the union boundary is exactly the set of ring vertices and
/// pairwise edge intersections not strictly inside another ring, ordered by
/// angle about `center`.
pub fn combine_hulls_yz(hulls: &[Vec<Vec3>], center: Vec3) -> Vec<Vec3> {
    if hulls.is_empty() {
        return Vec::new();
    }
    if hulls.len() == 1 {
        return hulls[0].clone();
    }

    let mut candidates: Vec<Vec3> = Vec::new();
    for hull in hulls {
        candidates.extend_from_slice(hull);
    }
    for i in 0..hulls.len() {
        for j in (i + 1)..hulls.len() {
            let (a, b) = (&hulls[i], &hulls[j]);
            for ai in 0..a.len() {
                let a1 = a[ai];
                let a2 = a[(ai + 1) % a.len()];
                for bi in 0..b.len() {
                    let b1 = b[bi];
                    let b2 = b[(bi + 1) % b.len()];
                    if let Some(p) = segment_intersection_yz(a1, a2, b1, b2) {
                        candidates.push(p);
                    }
                }
            }
        }
    }

    // Union boundary: candidates not strictly interior to any ring.
    let mut boundary: Vec<Vec3> = candidates
        .into_iter()
        .filter(|&p| !hulls.iter().any(|h| point_strictly_in_convex_yz(h, p)))
        .collect();

    // Order by angle about the shared interior point; for candidates on the
    // same ray keep the farthest.
    boundary.sort_by(|a, b| {
        let ta = (a.y - center.y).atan2(a.z - center.z);
        let tb = (b.y - center.y).atan2(b.z - center.z);
        ta.partial_cmp(&tb).unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut out: Vec<Vec3> = Vec::with_capacity(boundary.len());
    for p in boundary {
        match out.last().copied() {
            Some(last) => {
                let t_last = (last.y - center.y).atan2(last.z - center.z);
                let t_p = (p.y - center.y).atan2(p.z - center.z);
                if (t_p - t_last).abs() <= 1e-4 {
                    if dist_yz_sq(p, center) > dist_yz_sq(last, center)
                        && let Some(slot) = out.last_mut()
                    {
                        *slot = p;
                    }
                } else if dist_yz_sq(p, last) > EPS * EPS {
                    out.push(p);
                }
            }
            None => out.push(p),
        }
    }
    out
}

/// Minimum-area oriented bounding box of the outline on the YZ projection.
///
/// Tries each edge direction (bounded, like the source of its edge list, to
/// 100 candidates), rotating the outline about the X axis; returns the
/// bounds of the best-aligned rotation and the rotation angle in degrees.
pub fn obb_yz(points: &[Vec3]) -> (Aabb, f32) {
    let mut best = Aabb::from_points(points);
    let mut best_area = best.area_yz();
    let mut best_angle = 0.0_f32;
    for i in 0..points.len().min(100) {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let mut theta = (b.y - a.y).atan2(b.z - a.z).to_degrees();
        if theta < 0.0 {
            theta += 360.0;
        }
        let rotation = Quat::from_axis_angle(Vec3::X, theta.to_radians());
        let rotated: Vec<Vec3> = points.iter().map(|&p| rotation * p).collect();
        let bounds = Aabb::from_points(&rotated);
        let area = bounds.area_yz();
        if area < best_area {
            best_area = area;
            best_angle = theta;
            best = bounds;
        }
    }
    (best, best_angle)
}

fn is_convex_ring_yz(points: &[Vec3]) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut sign = 0.0_f32;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let c = points[(i + 2) % points.len()];
        let cross = cross_yz(a, b, c);
        if cross.abs() <= 1e-4 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Index of the last point of the maximal prefix that still closes into a
/// convex sub-polygon; the tail beyond it may hold reflex vertices.
pub fn last_convex_prefix(points: &[Vec3]) -> usize {
    let n = points.len();
    if n < 3 {
        return n.saturating_sub(1);
    }
    let mut last = 2;
    for end in 2..n {
        if is_convex_ring_yz(&points[..=end]) {
            last = end;
        } else {
            break;
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zy(z: f32, y: f32) -> Vec3 {
        Vec3::new(0.0, y, z)
    }

    #[test]
    fn quickhull_finds_square_corners() {
        let points = vec![
            zy(0.0, 0.0),
            zy(4.0, 0.0),
            zy(4.0, 4.0),
            zy(0.0, 4.0),
            zy(2.0, 2.0),
            zy(1.0, 3.0),
        ];
        let hull = quickhull_yz(&points);
        assert_eq!(hull.len(), 4);
        // Canonical winding is counter-clockwise.
        assert!(signed_area_yz(&hull) > 0.0);
    }

    #[test]
    fn every_input_point_lies_inside_or_on_the_hull() {
        // Deterministic pseudo-grid of scattered points.
        let mut points = Vec::new();
        for i in 0..40 {
            let z = (i as f32 * 7.3).sin() * 5.0;
            let y = (i as f32 * 3.1).cos() * 5.0;
            points.push(zy(z, y));
        }
        let hull = quickhull_yz(&points);
        assert!(hull.len() >= 3);
        for p in &points {
            assert!(
                point_in_convex_yz(&hull, *p),
                "point {p:?} escaped the hull"
            );
        }
    }

    #[test]
    fn simplify_removes_nearly_collinear_interior_points() {
        // 20 nearly collinear points: tiny wiggles well under the 20 degree
        // threshold, so only the endpoints survive.
        let mut points = Vec::new();
        for i in 0..20 {
            let wiggle = if i % 2 == 0 { 0.0 } else { 0.02 };
            points.push(zy(i as f32, wiggle));
        }
        let simplified = simplify_hull_yz(&points, 20.0);
        assert_eq!(simplified.len(), 2);
        assert_eq!(simplified[0], points[0]);
        assert_eq!(simplified[1], points[19]);
    }

    #[test]
    fn simplify_keeps_genuine_corners() {
        // A right-angle corner at (5, 0) must survive a 20 degree threshold.
        let points = vec![
            zy(0.0, 0.0),
            zy(2.5, 0.0),
            zy(5.0, 0.0),
            zy(5.0, 2.5),
            zy(5.0, 5.0),
        ];
        let simplified = simplify_hull_yz(&points, 20.0);
        assert!(simplified.contains(&zy(5.0, 0.0)), "corner was dropped");
        assert_eq!(simplified.first(), Some(&points[0]));
        assert_eq!(simplified.last(), Some(&points[4]));
    }

    #[test]
    fn shift_starts_at_point_nearest_origin() {
        let points = vec![zy(5.0, 5.0), zy(0.1, 0.1), zy(4.0, -3.0)];
        let shifted = shift_hull_start(&points);
        assert_eq!(shifted[0], zy(0.1, 0.1));
        assert_eq!(shifted.len(), 3);
        assert_eq!(shifted[1], zy(4.0, -3.0));
        assert_eq!(shifted[2], zy(5.0, 5.0));
    }

    #[test]
    fn union_of_offset_squares_is_the_step_outline() {
        let a = quickhull_yz(&[zy(0.0, 0.0), zy(2.0, 0.0), zy(2.0, 2.0), zy(0.0, 2.0)]);
        let b = quickhull_yz(&[zy(1.0, 1.0), zy(3.0, 1.0), zy(3.0, 3.0), zy(1.0, 3.0)]);
        let center = zy(1.5, 1.5);
        let union = combine_hulls_yz(&[a, b], center);
        assert_eq!(union.len(), 8);
        // Edge crossings appear on the union boundary; swallowed corners
        // do not.
        assert!(union.iter().any(|p| dist_yz_sq(*p, zy(2.0, 1.0)) < 1e-6));
        assert!(union.iter().any(|p| dist_yz_sq(*p, zy(1.0, 2.0)) < 1e-6));
        assert!(!union.iter().any(|p| dist_yz_sq(*p, zy(2.0, 2.0)) < 1e-6));
        assert!(!union.iter().any(|p| dist_yz_sq(*p, zy(1.0, 1.0)) < 1e-6));
    }

    #[test]
    fn obb_of_rotated_rectangle_beats_the_aabb() {
        // A 4x1 rectangle rotated 45 degrees.
        let rotation = Quat::from_axis_angle(Vec3::X, 45.0_f32.to_radians());
        let rect = [
            zy(-2.0, -0.5),
            zy(2.0, -0.5),
            zy(2.0, 0.5),
            zy(-2.0, 0.5),
        ];
        let points: Vec<Vec3> = rect.iter().map(|&p| rotation * p).collect();
        let aabb = Aabb::from_points(&points);
        let (obb, angle) = obb_yz(&points);
        assert!(obb.area_yz() < aabb.area_yz());
        assert!((obb.area_yz() - 4.0).abs() < 1e-3);
        assert!(angle > 0.0);
    }

    #[test]
    fn convex_prefix_of_a_convex_ring_is_the_whole_ring() {
        let hull = quickhull_yz(&[
            zy(0.0, 0.0),
            zy(4.0, 0.0),
            zy(5.0, 2.0),
            zy(4.0, 4.0),
            zy(0.0, 4.0),
        ]);
        assert_eq!(last_convex_prefix(&hull), hull.len() - 1);
    }

    #[test]
    fn convex_prefix_stops_before_a_reflex_vertex() {
        // Step outline: (2, 1) is reflex.
        let ring = vec![
            zy(0.0, 0.0),
            zy(2.0, 0.0),
            zy(2.0, 1.0),
            zy(3.0, 1.0),
            zy(3.0, 3.0),
            zy(0.0, 3.0),
        ];
        let last = last_convex_prefix(&ring);
        assert!(last < ring.len() - 1);
        assert!(is_convex_ring_yz(&ring[..=last]));
    }

    #[test]
    fn point_in_polygon_handles_non_convex_rings() {
        let ring = vec![
            zy(0.0, 0.0),
            zy(3.0, 0.0),
            zy(3.0, 1.0),
            zy(1.0, 1.0),
            zy(1.0, 3.0),
            zy(0.0, 3.0),
        ];
        assert!(point_in_polygon_yz(&ring, zy(0.5, 0.5)));
        assert!(point_in_polygon_yz(&ring, zy(2.0, 0.5)));
        assert!(!point_in_polygon_yz(&ring, zy(2.0, 2.0)));
    }
}
