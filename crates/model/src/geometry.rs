use serde::Deserialize;

/// Monotonically increasing coordinate revision of a [`Geometry`].
pub type Revision = u64;

/// Longitude/latitude in degrees, altitude in meters.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "Vec<f64>")]
pub struct Position {
    pub lon: f64,
    pub lat: f64,
    pub alt: f64,
}

impl Position {
    pub const fn new(lon: f64, lat: f64, alt: f64) -> Self {
        Self { lon, lat, alt }
    }

    pub const fn lon_lat(lon: f64, lat: f64) -> Self {
        Self::new(lon, lat, 0.0)
    }
}

impl TryFrom<Vec<f64>> for Position {
    type Error = String;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        match value.as_slice() {
            [lon, lat] => Ok(Position::lon_lat(*lon, *lat)),
            [lon, lat, alt] => Ok(Position::new(*lon, *lat, *alt)),
            other => Err(format!(
                "position needs 2 or 3 numbers, got {}",
                other.len()
            )),
        }
    }
}

pub type Ring = Vec<Position>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    DynamicLineString,
    DynamicPolygon,
    DynamicMultiPolygon,
}

impl GeometryKind {
    pub fn is_dynamic(self) -> bool {
        matches!(
            self,
            GeometryKind::DynamicLineString
                | GeometryKind::DynamicPolygon
                | GeometryKind::DynamicMultiPolygon
        )
    }

    /// Dynamic counterpart of a static kind, if one exists.
    pub fn dynamic_variant(self) -> Option<GeometryKind> {
        match self {
            GeometryKind::LineString | GeometryKind::DynamicLineString => {
                Some(GeometryKind::DynamicLineString)
            }
            GeometryKind::Polygon | GeometryKind::DynamicPolygon => {
                Some(GeometryKind::DynamicPolygon)
            }
            GeometryKind::MultiPolygon | GeometryKind::DynamicMultiPolygon => {
                Some(GeometryKind::DynamicMultiPolygon)
            }
            _ => None,
        }
    }

    pub fn is_composite(self) -> bool {
        matches!(
            self,
            GeometryKind::MultiPoint
                | GeometryKind::MultiLineString
                | GeometryKind::MultiPolygon
                | GeometryKind::GeometryCollection
        )
    }
}

/// Coordinate payload of a geometry.
///
/// Scene files encode it as `{"type": <kind>, "coordinates": <payload>}`; a
/// `GeometryCollection` carries its child geometries in `coordinates`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum GeometryShape {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Ring>),
    MultiPoint(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Ring>>),
    GeometryCollection(Vec<Geometry>),
    DynamicLineString(Vec<Position>),
    DynamicPolygon(Vec<Ring>),
    DynamicMultiPolygon(Vec<Vec<Ring>>),
}

impl GeometryShape {
    pub fn kind(&self) -> GeometryKind {
        match self {
            GeometryShape::Point(_) => GeometryKind::Point,
            GeometryShape::LineString(_) => GeometryKind::LineString,
            GeometryShape::Polygon(_) => GeometryKind::Polygon,
            GeometryShape::MultiPoint(_) => GeometryKind::MultiPoint,
            GeometryShape::MultiLineString(_) => GeometryKind::MultiLineString,
            GeometryShape::MultiPolygon(_) => GeometryKind::MultiPolygon,
            GeometryShape::GeometryCollection(_) => GeometryKind::GeometryCollection,
            GeometryShape::DynamicLineString(_) => GeometryKind::DynamicLineString,
            GeometryShape::DynamicPolygon(_) => GeometryKind::DynamicPolygon,
            GeometryShape::DynamicMultiPolygon(_) => GeometryKind::DynamicMultiPolygon,
        }
    }
}

/// A geometry plus the revision counter the engine keys recomputation on.
///
/// Every mutating accessor bumps the revision; there is no way to change
/// coordinates without the engine noticing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "GeometryShape")]
pub struct Geometry {
    shape: GeometryShape,
    revision: Revision,
}

impl From<GeometryShape> for Geometry {
    fn from(shape: GeometryShape) -> Self {
        Self::new(shape)
    }
}

impl Geometry {
    pub fn new(shape: GeometryShape) -> Self {
        Self { shape, revision: 1 }
    }

    pub fn point(p: Position) -> Self {
        Self::new(GeometryShape::Point(p))
    }

    pub fn line_string(coords: Vec<Position>) -> Self {
        Self::new(GeometryShape::LineString(coords))
    }

    pub fn polygon(rings: Vec<Ring>) -> Self {
        Self::new(GeometryShape::Polygon(rings))
    }

    pub fn collection(children: Vec<Geometry>) -> Self {
        Self::new(GeometryShape::GeometryCollection(children))
    }

    pub fn kind(&self) -> GeometryKind {
        self.shape.kind()
    }

    pub fn shape(&self) -> &GeometryShape {
        &self.shape
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn set_shape(&mut self, shape: GeometryShape) {
        let floor = self.max_revision();
        self.shape = shape;
        self.bump(floor);
    }

    /// Mutates coordinates in place and bumps the revision.
    pub fn edit(&mut self, f: impl FnOnce(&mut GeometryShape)) {
        let floor = self.max_revision();
        f(&mut self.shape);
        self.bump(floor);
    }

    /// Appends a position to a (dynamic) line string, as a moving track does.
    ///
    /// Returns `false` for any other shape.
    pub fn push_position(&mut self, p: Position) -> bool {
        match &mut self.shape {
            GeometryShape::LineString(coords) | GeometryShape::DynamicLineString(coords) => {
                coords.push(p);
                self.revision += 1;
                true
            }
            _ => false,
        }
    }

    pub fn as_ref(&self) -> GeometryRef<'_> {
        let shape = match &self.shape {
            GeometryShape::Point(p) => ShapeRef::Point(p),
            GeometryShape::LineString(c) | GeometryShape::DynamicLineString(c) => {
                ShapeRef::LineString(c)
            }
            GeometryShape::Polygon(r) | GeometryShape::DynamicPolygon(r) => ShapeRef::Polygon(r),
            GeometryShape::MultiPoint(c) => ShapeRef::MultiPoint(c),
            GeometryShape::MultiLineString(l) => ShapeRef::MultiLineString(l),
            GeometryShape::MultiPolygon(p) | GeometryShape::DynamicMultiPolygon(p) => {
                ShapeRef::MultiPolygon(p)
            }
            GeometryShape::GeometryCollection(g) => ShapeRef::Collection(g),
        };
        GeometryRef {
            kind: self.kind(),
            shape,
            revision: self.revision,
        }
    }

    /// Highest revision anywhere in the tree; collection children carry
    /// their own.
    pub fn max_revision(&self) -> Revision {
        match &self.shape {
            GeometryShape::GeometryCollection(children) => children
                .iter()
                .map(Geometry::max_revision)
                .fold(self.revision, Revision::max),
            _ => self.revision,
        }
    }

    /// Moves the revision past `floor`, so a replacement geometry never
    /// reuses a revision its predecessor already reported. Collection parts
    /// see at least their parent's revision, so this covers them too.
    pub(crate) fn advance_past(&mut self, floor: Revision) {
        if self.revision <= floor {
            self.revision = floor + 1;
        }
    }

    // Past every revision the tree held before (`floor`) or holds now, so
    // each collection part sees the edit.
    fn bump(&mut self, floor: Revision) {
        self.revision = floor.max(self.max_revision()) + 1;
    }
}

/// Borrowed coordinate payload; dynamic kinds share the static layouts.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ShapeRef<'a> {
    Point(&'a Position),
    LineString(&'a [Position]),
    Polygon(&'a [Ring]),
    MultiPoint(&'a [Position]),
    MultiLineString(&'a [Vec<Position>]),
    MultiPolygon(&'a [Vec<Ring>]),
    Collection(&'a [Geometry]),
}

/// Borrowed view of a geometry or of one part of a composite geometry.
///
/// Parts of a multi-geometry inherit the revision of their parent, since the
/// parent revision is bumped whenever any part changes. Collection children
/// report the greater of their own revision and their parent's.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeometryRef<'a> {
    pub kind: GeometryKind,
    pub shape: ShapeRef<'a>,
    pub revision: Revision,
}

impl<'a> GeometryRef<'a> {
    /// Same coordinates, re-tagged with another kind (e.g. a static line
    /// promoted to its dynamic variant by a feature flag).
    pub fn with_kind(self, kind: GeometryKind) -> Self {
        Self { kind, ..self }
    }

    /// Child parts of a composite geometry; empty for leaves.
    pub fn parts(&self) -> Vec<GeometryRef<'a>> {
        let revision = self.revision;
        match self.shape {
            ShapeRef::MultiPoint(points) => points
                .iter()
                .map(|p| GeometryRef {
                    kind: GeometryKind::Point,
                    shape: ShapeRef::Point(p),
                    revision,
                })
                .collect(),
            ShapeRef::MultiLineString(lines) => lines
                .iter()
                .map(|l| GeometryRef {
                    kind: GeometryKind::LineString,
                    shape: ShapeRef::LineString(l),
                    revision,
                })
                .collect(),
            ShapeRef::MultiPolygon(polys) if !self.kind.is_dynamic() => polys
                .iter()
                .map(|rings| GeometryRef {
                    kind: GeometryKind::Polygon,
                    shape: ShapeRef::Polygon(rings),
                    revision,
                })
                .collect(),
            ShapeRef::Collection(children) => children
                .iter()
                .map(|child| {
                    let part = child.as_ref();
                    GeometryRef {
                        revision: part.revision.max(revision),
                        ..part
                    }
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Number of leaf geometries, counting nested collections recursively.
    pub fn leaf_count(&self) -> usize {
        if self.kind.is_composite() {
            self.parts().iter().map(GeometryRef::leaf_count).sum()
        } else {
            1
        }
    }
}
