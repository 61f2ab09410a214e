//! Vertex data for primitives, in ECEF meters.

use earcutr::earcut;
use foundation::math::{Geodetic, TangentPlane, Vec3, centroid, geodetic_to_ecef};
use model::{AltitudeMode, Position, Ring};
use render::PrimitiveShape;

/// Segments of the ring drawn around an ellipsoid.
pub const ELLIPSE_SEGMENTS: usize = 64;

/// ECEF position of `p`. Clamped geometry sits on the ellipsoid surface; the
/// renderer drapes it onto terrain.
pub fn project(p: &Position, altitude: AltitudeMode) -> Vec3 {
    let height = if altitude.is_clamped() { 0.0 } else { p.alt };
    geodetic_to_ecef(Geodetic::from_degrees(p.lon, p.lat, height))
}

pub fn billboard(p: &Position, altitude: AltitudeMode) -> PrimitiveShape {
    PrimitiveShape::Billboard {
        position: project(p, altitude),
    }
}

pub fn ellipsoid(p: &Position, radius: f64, altitude: AltitudeMode) -> PrimitiveShape {
    PrimitiveShape::Ellipsoid {
        center: project(p, altitude),
        radii: Vec3::new(radius, radius, radius),
    }
}

/// Closed ring of `radius` meters around `p` in its tangent plane.
pub fn ellipse_outline(
    p: &Position,
    radius: f64,
    altitude: AltitudeMode,
) -> Option<PrimitiveShape> {
    if !(radius.is_finite() && radius > 0.0) {
        return None;
    }
    let center = project(p, altitude);
    let plane = TangentPlane::at(center);
    let mut positions = Vec::with_capacity(ELLIPSE_SEGMENTS + 1);
    for i in 0..=ELLIPSE_SEGMENTS {
        let angle =
            std::f64::consts::TAU * (i % ELLIPSE_SEGMENTS) as f64 / ELLIPSE_SEGMENTS as f64;
        let offset =
            plane.east.scale(radius * angle.cos()) + plane.north.scale(radius * angle.sin());
        positions.push(center + offset);
    }
    Some(PrimitiveShape::polyline(positions))
}

/// A line needs at least two points.
pub fn line(coords: &[Position], altitude: AltitudeMode) -> Option<PrimitiveShape> {
    if coords.len() < 2 {
        return None;
    }
    Some(PrimitiveShape::polyline(
        coords.iter().map(|p| project(p, altitude)).collect(),
    ))
}

fn drop_closing_duplicate(points: &mut Vec<Vec3>) {
    if points.len() >= 2 && points[0].approx_eq(points[points.len() - 1], 1e-9) {
        points.pop();
    }
}

fn open_ring(ring: &[Position], altitude: AltitudeMode) -> Vec<Vec3> {
    let mut points: Vec<Vec3> = ring.iter().map(|p| project(p, altitude)).collect();
    drop_closing_duplicate(&mut points);
    points
}

/// Triangles of one polygon, appended to `positions`/`indices`.
///
/// Rings are flattened into the tangent plane at the centroid of the outer
/// ring and triangulated with earcut; holes shorter than three points are
/// ignored. Returns `false` if the polygon yields no triangle.
fn triangulate_into(
    rings: &[Ring],
    altitude: AltitudeMode,
    positions: &mut Vec<Vec3>,
    indices: &mut Vec<u32>,
) -> bool {
    let Some(outer) = rings.first().map(|r| open_ring(r, altitude)) else {
        return false;
    };
    if outer.len() < 3 {
        return false;
    }
    let Some(origin) = centroid(&outer) else {
        return false;
    };
    let plane = TangentPlane::at(origin);

    let mut vertices: Vec<Vec3> = Vec::new();
    let mut coords: Vec<f64> = Vec::new();
    let mut holes: Vec<usize> = Vec::new();
    for (ring_i, ring) in rings.iter().enumerate() {
        let points = if ring_i == 0 {
            outer.clone()
        } else {
            open_ring(ring, altitude)
        };
        if points.len() < 3 {
            continue;
        }
        if ring_i > 0 {
            holes.push(vertices.len());
        }
        for p in points {
            coords.extend_from_slice(&plane.project(p));
            vertices.push(p);
        }
    }

    let triangles = match earcut(&coords, &holes, 2) {
        Ok(ix) => ix,
        Err(_) => return false,
    };
    if triangles.is_empty() {
        return false;
    }
    let base = positions.len() as u32;
    indices.extend(triangles.into_iter().map(|i| base + i as u32));
    positions.extend(vertices);
    true
}

pub fn polygon_fill(rings: &[Ring], altitude: AltitudeMode) -> Option<PrimitiveShape> {
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    triangulate_into(rings, altitude, &mut positions, &mut indices)
        .then_some(PrimitiveShape::Mesh { positions, indices })
}

/// One mesh for all polygons; degenerate members are skipped, but at least
/// one must triangulate.
pub fn multipolygon_fill(
    polygons: &[Vec<Ring>],
    altitude: AltitudeMode,
) -> Option<PrimitiveShape> {
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    let mut any = false;
    for rings in polygons {
        any |= triangulate_into(rings, altitude, &mut positions, &mut indices);
    }
    any.then_some(PrimitiveShape::Mesh { positions, indices })
}

fn push_closed_ring(
    ring: &[Position],
    altitude: AltitudeMode,
    positions: &mut Vec<Vec3>,
    starts: &mut Vec<u32>,
) {
    let points = open_ring(ring, altitude);
    if points.len() < 2 {
        return;
    }
    starts.push(positions.len() as u32);
    let first = points[0];
    positions.extend(points);
    positions.push(first);
}

// A polygon whose outer ring has fewer than three points contributes nothing.
fn push_polygon_rings(
    rings: &[Ring],
    altitude: AltitudeMode,
    positions: &mut Vec<Vec3>,
    starts: &mut Vec<u32>,
) {
    let Some(outer) = rings.first() else {
        return;
    };
    if open_ring(outer, altitude).len() < 3 {
        return;
    }
    for ring in rings {
        push_closed_ring(ring, altitude, positions, starts);
    }
}

pub fn polygon_outline(rings: &[Ring], altitude: AltitudeMode) -> Option<PrimitiveShape> {
    multipolygon_outline(std::slice::from_ref(&rings), altitude)
}

/// Every ring of every polygon as one multi-path polyline.
pub fn multipolygon_outline<R: AsRef<[Ring]>>(
    polygons: &[R],
    altitude: AltitudeMode,
) -> Option<PrimitiveShape> {
    let mut positions = Vec::new();
    let mut path_starts = Vec::new();
    for rings in polygons {
        push_polygon_rings(rings.as_ref(), altitude, &mut positions, &mut path_starts);
    }
    if path_starts.is_empty() {
        return None;
    }
    Some(PrimitiveShape::Polyline {
        positions,
        path_starts,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        ELLIPSE_SEGMENTS, ellipse_outline, line, multipolygon_fill, polygon_fill, polygon_outline,
        project,
    };
    use foundation::math::WGS84_A;
    use model::{AltitudeMode, Position};
    use render::PrimitiveShape;

    fn square(offset: f64) -> Vec<Position> {
        vec![
            Position::new(offset, 0.0, 100.0),
            Position::new(offset + 1.0, 0.0, 100.0),
            Position::new(offset + 1.0, 1.0, 100.0),
            Position::new(offset, 1.0, 100.0),
            Position::new(offset, 0.0, 100.0),
        ]
    }

    #[test]
    fn clamping_drops_height() {
        let p = Position::new(0.0, 0.0, 250.0);
        assert!((project(&p, AltitudeMode::None).x - (WGS84_A + 250.0)).abs() < 1e-6);
        assert!((project(&p, AltitudeMode::ClampToGround).x - WGS84_A).abs() < 1e-6);
    }

    #[test]
    fn short_lines_are_degenerate() {
        assert!(line(&[Position::lon_lat(0.0, 0.0)], AltitudeMode::None).is_none());
        let shape = line(
            &[Position::lon_lat(0.0, 0.0), Position::lon_lat(1.0, 0.0)],
            AltitudeMode::None,
        )
        .expect("line");
        assert_eq!(shape.positions().len(), 2);
    }

    #[test]
    fn square_triangulates_into_two_triangles() {
        let Some(PrimitiveShape::Mesh { positions, indices }) =
            polygon_fill(&[square(0.0)], AltitudeMode::None)
        else {
            panic!("expected a mesh");
        };
        assert_eq!(positions.len(), 4);
        assert_eq!(indices.len(), 6);
        assert!(indices.iter().all(|i| (*i as usize) < positions.len()));
    }

    #[test]
    fn multipolygon_offsets_indices() {
        let Some(PrimitiveShape::Mesh { positions, indices }) = multipolygon_fill(
            &[vec![square(0.0)], vec![square(5.0)]],
            AltitudeMode::None,
        ) else {
            panic!("expected a mesh");
        };
        assert_eq!(positions.len(), 8);
        assert_eq!(indices.len(), 12);
        assert!(indices[6..].iter().all(|i| *i >= 4));
    }

    #[test]
    fn outline_closes_every_ring() {
        let hole = vec![
            Position::new(0.25, 0.25, 100.0),
            Position::new(0.75, 0.25, 100.0),
            Position::new(0.5, 0.75, 100.0),
        ];
        let Some(PrimitiveShape::Polyline {
            positions,
            path_starts,
        }) = polygon_outline(&[square(0.0), hole], AltitudeMode::None)
        else {
            panic!("expected a polyline");
        };
        assert_eq!(path_starts, vec![0, 5]);
        assert_eq!(positions.len(), 9);
        assert_eq!(positions[0], positions[4]);
    }

    #[test]
    fn degenerate_polygon_has_no_fill_or_outline() {
        let sliver = vec![Position::lon_lat(0.0, 0.0), Position::lon_lat(1.0, 0.0)];
        assert!(polygon_fill(&[sliver.clone()], AltitudeMode::None).is_none());
        assert!(polygon_outline(&[sliver], AltitudeMode::None).is_none());
        assert!(polygon_fill(&[], AltitudeMode::None).is_none());
    }

    #[test]
    fn ellipse_ring_is_closed_and_at_radius() {
        let center = Position::lon_lat(10.0, 45.0);
        let shape = ellipse_outline(&center, 500.0, AltitudeMode::None).expect("ring");
        let points = shape.positions();
        assert_eq!(points.len(), ELLIPSE_SEGMENTS + 1);
        assert!(points[0].approx_eq(points[ELLIPSE_SEGMENTS], 1e-6));
        let c = project(&center, AltitudeMode::None);
        for p in points {
            assert!(((*p - c).length() - 500.0).abs() < 1e-6);
        }
        assert!(ellipse_outline(&center, 0.0, AltitudeMode::None).is_none());
    }
}
