use foundation::math::Vec3;
use model::Color;

/// Which primitive of a geometry an entry stands for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeometryRole {
    Geom,
    GeomOutline,
    Ellipsoid,
    EllipsoidOutline,
}

impl GeometryRole {
    pub const ALL: [GeometryRole; 4] = [
        GeometryRole::Geom,
        GeometryRole::GeomOutline,
        GeometryRole::Ellipsoid,
        GeometryRole::EllipsoidOutline,
    ];

    pub fn index(self) -> usize {
        match self {
            GeometryRole::Geom => 0,
            GeometryRole::GeomOutline => 1,
            GeometryRole::Ellipsoid => 2,
            GeometryRole::EllipsoidOutline => 3,
        }
    }

    pub fn is_outline(self) -> bool {
        matches!(
            self,
            GeometryRole::GeomOutline | GeometryRole::EllipsoidOutline
        )
    }
}

/// Native renderer type. Ground variants drape on terrain and cannot be
/// turned into free-floating ones (or back) in place.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveClass {
    Billboard,
    Polyline,
    GroundPolyline,
    PolygonMesh,
    GroundPolygon,
    Ellipsoid,
}

impl PrimitiveClass {
    pub fn is_ground(self) -> bool {
        matches!(
            self,
            PrimitiveClass::GroundPolyline | PrimitiveClass::GroundPolygon
        )
    }

    /// Whether a ground and a free variant of this class exist.
    pub fn has_ground_variant(self) -> bool {
        matches!(
            self,
            PrimitiveClass::Polyline
                | PrimitiveClass::GroundPolyline
                | PrimitiveClass::PolygonMesh
                | PrimitiveClass::GroundPolygon
        )
    }

    pub fn polyline(clamped: bool) -> Self {
        if clamped {
            PrimitiveClass::GroundPolyline
        } else {
            PrimitiveClass::Polyline
        }
    }

    pub fn polygon(clamped: bool) -> Self {
        if clamped {
            PrimitiveClass::GroundPolygon
        } else {
            PrimitiveClass::PolygonMesh
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Color,
    pub width: f32,
    pub dash: Option<Vec<f32>>,
}

impl Material {
    pub fn solid(color: Color, width: f32) -> Self {
        Self {
            color,
            width,
            dash: None,
        }
    }

    pub fn alpha(&self) -> f32 {
        self.color[3]
    }
}

/// Vertex data of a primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveShape {
    Billboard {
        position: Vec3,
    },
    /// One or more polylines sharing a buffer; `path_starts[i]` is the first
    /// vertex of path `i` (always starting with 0).
    Polyline {
        positions: Vec<Vec3>,
        path_starts: Vec<u32>,
    },
    Mesh {
        positions: Vec<Vec3>,
        indices: Vec<u32>,
    },
    Ellipsoid {
        center: Vec3,
        radii: Vec3,
    },
}

impl PrimitiveShape {
    pub fn polyline(positions: Vec<Vec3>) -> Self {
        PrimitiveShape::Polyline {
            positions,
            path_starts: vec![0],
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        match self {
            PrimitiveShape::Billboard { position } => std::slice::from_ref(position),
            PrimitiveShape::Polyline { positions, .. } | PrimitiveShape::Mesh { positions, .. } => {
                positions
            }
            PrimitiveShape::Ellipsoid { center, .. } => std::slice::from_ref(center),
        }
    }

    /// Copies `other` into the existing buffers, keeping their allocations.
    ///
    /// Returns `false` (and leaves `self` untouched) when the variants differ.
    pub fn overwrite_from(&mut self, other: &PrimitiveShape) -> bool {
        match (self, other) {
            (PrimitiveShape::Billboard { position }, PrimitiveShape::Billboard { position: p }) => {
                *position = *p;
            }
            (
                PrimitiveShape::Polyline {
                    positions,
                    path_starts,
                },
                PrimitiveShape::Polyline {
                    positions: p,
                    path_starts: s,
                },
            ) => {
                positions.clear();
                positions.extend_from_slice(p);
                path_starts.clear();
                path_starts.extend_from_slice(s);
            }
            (
                PrimitiveShape::Mesh { positions, indices },
                PrimitiveShape::Mesh {
                    positions: p,
                    indices: i,
                },
            ) => {
                positions.clear();
                positions.extend_from_slice(p);
                indices.clear();
                indices.extend_from_slice(i);
            }
            (
                PrimitiveShape::Ellipsoid { center, radii },
                PrimitiveShape::Ellipsoid { center: c, radii: r },
            ) => {
                *center = *c;
                *radii = *r;
            }
            _ => return false,
        }
        true
    }

    fn matches_class(&self, class: PrimitiveClass) -> bool {
        matches!(
            (self, class),
            (PrimitiveShape::Billboard { .. }, PrimitiveClass::Billboard)
                | (
                    PrimitiveShape::Polyline { .. },
                    PrimitiveClass::Polyline | PrimitiveClass::GroundPolyline
                )
                | (
                    PrimitiveShape::Mesh { .. },
                    PrimitiveClass::PolygonMesh | PrimitiveClass::GroundPolygon
                )
                | (PrimitiveShape::Ellipsoid { .. }, PrimitiveClass::Ellipsoid)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub class: PrimitiveClass,
    pub shape: PrimitiveShape,
    pub material: Material,
}

impl Primitive {
    pub fn new(class: PrimitiveClass, shape: PrimitiveShape, material: Material) -> Self {
        Self {
            class,
            shape,
            material,
        }
    }

    pub(crate) fn shape_matches_class(&self) -> bool {
        self.shape.matches_class(self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::{GeometryRole, PrimitiveClass, PrimitiveShape};
    use foundation::math::Vec3;

    #[test]
    fn role_indices_are_dense() {
        for (i, role) in GeometryRole::ALL.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
        assert!(GeometryRole::GeomOutline.is_outline());
        assert!(!GeometryRole::Ellipsoid.is_outline());
    }

    #[test]
    fn ground_variants() {
        assert_eq!(PrimitiveClass::polyline(true), PrimitiveClass::GroundPolyline);
        assert_eq!(PrimitiveClass::polygon(false), PrimitiveClass::PolygonMesh);
        assert!(PrimitiveClass::GroundPolygon.is_ground());
        assert!(!PrimitiveClass::Billboard.has_ground_variant());
    }

    #[test]
    fn overwrite_keeps_allocation() {
        let mut shape = PrimitiveShape::polyline(Vec::with_capacity(16));
        let ptr = shape.positions().as_ptr();
        let next = PrimitiveShape::polyline(vec![Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO]);
        assert!(shape.overwrite_from(&next));
        assert_eq!(shape, next);
        assert_eq!(shape.positions().as_ptr(), ptr);
    }

    #[test]
    fn overwrite_rejects_other_variant() {
        let mut shape = PrimitiveShape::Billboard {
            position: Vec3::ZERO,
        };
        let mesh = PrimitiveShape::Mesh {
            positions: vec![Vec3::ZERO],
            indices: vec![],
        };
        assert!(!shape.overwrite_from(&mesh));
        assert!(matches!(shape, PrimitiveShape::Billboard { .. }));
    }
}
