// 2D geometry primitives for continuous collision: convex hulls, inflated
// AABB rejection, and the parametric segment-intersection test.

use glam::Vec2;

#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn of_points(points: &[Vec2]) -> Self {
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    pub fn inflate(self, r: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(r),
            max: self.max + Vec2::splat(r),
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Slab test for a segment against the box; cheap rejection before any
    /// edge-level work.
    pub fn intersects_segment(&self, a: Vec2, b: Vec2) -> bool {
        if self.contains(a) || self.contains(b) {
            return true;
        }
        let d = b - a;
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;
        for axis in 0..2 {
            let (da, pa, lo, hi) = if axis == 0 {
                (d.x, a.x, self.min.x, self.max.x)
            } else {
                (d.y, a.y, self.min.y, self.max.y)
            };
            if da.abs() < f32::EPSILON {
                if pa < lo || pa > hi {
                    return false;
                }
            } else {
                let inv = 1.0 / da;
                let (mut t0, mut t1) = ((lo - pa) * inv, (hi - pa) * inv);
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                t_min = t_min.max(t0);
                t_max = t_max.min(t1);
                if t_min > t_max {
                    return false;
                }
            }
        }
        true
    }
}

/// Intersection point of segments `p1..p2` and `q1..q2` via the
/// cross-product parametric form. Degenerate (parallel or collinear) pairs
/// report no intersection.
pub fn segment_intersection(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> Option<Vec2> {
    let r = p2 - p1;
    let s = q2 - q1;
    let denom = r.perp_dot(s);
    if denom.abs() < 1e-9 {
        return None;
    }
    let qp = q1 - p1;
    let t = qp.perp_dot(s) / denom;
    let u = qp.perp_dot(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p1 + r * t)
    } else {
        None
    }
}

/// Convex polygon with counter-clockwise local-space vertices.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub verts: Vec<Vec2>,
}

impl Polygon {
    pub fn new(verts: Vec<Vec2>) -> Self {
        debug_assert!(verts.len() >= 3);
        Self { verts }
    }

    /// World-space vertices for a body at `pos` with heading `rot`.
    pub fn world_verts(&self, pos: Vec2, rot: f32) -> Vec<Vec2> {
        let (sin, cos) = rot.sin_cos();
        self.verts
            .iter()
            .map(|v| Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos) + pos)
            .collect()
    }
}

/// Even-odd crossing test for a point against a polygon given as world verts.
pub fn polygon_contains(verts: &[Vec2], p: Vec2) -> bool {
    let mut inside = false;
    let n = verts.len();
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (verts[i], verts[j]);
        if ((a.y > p.y) != (b.y > p.y))
            && (p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Outward normal of edge `a -> b` for a counter-clockwise polygon.
pub fn edge_normal(a: Vec2, b: Vec2) -> Vec2 {
    let e = b - a;
    Vec2::new(e.y, -e.x)
}

/// Nose-forward plane hull in local space (+X is forward), counter-clockwise.
/// Index 1 is the cockpit vertex used for headshot classification.
pub fn plane_hull() -> Polygon {
    Polygon::new(vec![
        Vec2::new(28.0, 0.0),   // nose
        Vec2::new(4.0, 7.0),    // cockpit
        Vec2::new(-20.0, 10.0), // tail top
        Vec2::new(-24.0, 0.0),
        Vec2::new(-20.0, -10.0),
        Vec2::new(4.0, -7.0),
    ])
}

/// Local-space cockpit point of the plane hull.
pub fn cockpit_point() -> Vec2 {
    Vec2::new(4.0, 7.0)
}

/// Slim hull for missiles acting as sweep impactors.
pub fn missile_hull() -> Polygon {
    Polygon::new(vec![
        Vec2::new(12.0, 0.0),
        Vec2::new(-10.0, 2.5),
        Vec2::new(-10.0, -2.5),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_crossing_intersect() {
        let p = segment_intersection(
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, -1.0),
            Vec2::new(0.0, 1.0),
        )
        .expect("crossing segments");
        assert!(p.length() < 1e-6);
    }

    #[test]
    fn parallel_segments_report_no_intersection() {
        assert!(
            segment_intersection(
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
            )
            .is_none()
        );
    }

    #[test]
    fn collinear_segments_report_no_intersection() {
        assert!(
            segment_intersection(
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.5, 0.0),
                Vec2::new(2.0, 0.0),
            )
            .is_none()
        );
    }

    #[test]
    fn disjoint_segments_report_no_intersection() {
        assert!(
            segment_intersection(
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(2.0, -1.0),
                Vec2::new(2.0, 1.0),
            )
            .is_none()
        );
    }

    #[test]
    fn aabb_segment_rejection() {
        let b = Aabb {
            min: Vec2::new(0.0, 0.0),
            max: Vec2::new(1.0, 1.0),
        };
        assert!(b.intersects_segment(Vec2::new(-1.0, 0.5), Vec2::new(2.0, 0.5)));
        assert!(!b.intersects_segment(Vec2::new(-1.0, 2.0), Vec2::new(2.0, 2.0)));
        // Vertical segment on a contained x-column.
        assert!(b.intersects_segment(Vec2::new(0.5, -1.0), Vec2::new(0.5, 2.0)));
    }

    #[test]
    fn polygon_contains_centroid() {
        let hull = plane_hull();
        let verts = hull.world_verts(Vec2::ZERO, 0.0);
        assert!(polygon_contains(&verts, Vec2::ZERO));
        assert!(!polygon_contains(&verts, Vec2::new(100.0, 0.0)));
    }

    #[test]
    fn world_verts_rotate_around_position() {
        let hull = plane_hull();
        let verts = hull.world_verts(Vec2::new(10.0, 0.0), std::f32::consts::FRAC_PI_2);
        // Nose at +28 along X rotates to +28 along Y.
        assert!((verts[0].x - 10.0).abs() < 1e-4);
        assert!((verts[0].y - 28.0).abs() < 1e-4);
    }
}
