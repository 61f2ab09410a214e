use super::{Vec3, ellipsoid_normal};

/// East/north basis of the plane tangent to the ellipsoid at `origin`.
///
/// Used to flatten nearby ECEF points into 2D, e.g. for triangulation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TangentPlane {
    pub origin: Vec3,
    pub east: Vec3,
    pub north: Vec3,
    pub up: Vec3,
}

impl TangentPlane {
    pub fn at(origin: Vec3) -> Self {
        let up = ellipsoid_normal(origin);
        // Near the poles `z` is almost parallel to `up`; pick another helper axis.
        let helper = if up.z.abs() < 0.99 {
            Vec3::new(0.0, 0.0, 1.0)
        } else {
            Vec3::new(0.0, 1.0, 0.0)
        };
        let east = helper.cross(up).normalize();
        let north = up.cross(east);
        Self {
            origin,
            east,
            north,
            up,
        }
    }

    pub fn project(&self, p: Vec3) -> [f64; 2] {
        let v = p - self.origin;
        [v.dot(self.east), v.dot(self.north)]
    }
}
