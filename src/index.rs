//! Spatial index over tagged polygons.
//!
//! Polygons are filed in an R-tree by their padded latitude/longitude bound
//! (in degrees), so a lookup only runs the exact spherical containment test
//! on the few polygons whose bound covers the query point.

use rstar::{RTree, RTreeObject, AABB};
use s2::rect::Rect;

use crate::sphere::Point;
use crate::types::TaggedPolygon;

/// R-tree entry for one polygon.
#[derive(Debug, Clone)]
pub struct IndexedPolygon {
    pub tagged: TaggedPolygon,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedPolygon {
    pub fn new(tagged: TaggedPolygon) -> Self {
        let envelope = envelope_degrees(&tagged.polygon.search_bound());
        Self { tagged, envelope }
    }
}

/// Planar `[lng, lat]` envelope of `rect` in degrees.
///
/// Rectangles crossing the antimeridian widen to every longitude.
fn envelope_degrees(rect: &Rect) -> AABB<[f64; 2]> {
    let (lng_lo, lng_hi) = if rect.lng.lo > rect.lng.hi {
        (-180.0, 180.0)
    } else {
        (rect.lng.lo.to_degrees(), rect.lng.hi.to_degrees())
    };
    AABB::from_corners(
        [lng_lo, rect.lat.lo.to_degrees()],
        [lng_hi, rect.lat.hi.to_degrees()],
    )
}

/// Tagged polygons indexed for point containment.
///
/// Filled by a single writer while building, then shared read-only.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    tree: RTree<IndexedPolygon>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tagged: TaggedPolygon) {
        self.tree.insert(IndexedPolygon::new(tagged));
    }

    /// Every polygon containing the point at `lat`/`lng` degrees, in no
    /// particular order.
    pub fn containing(&self, lat: f64, lng: f64) -> Vec<&TaggedPolygon> {
        let point = Point::from_degrees(lat, lng);
        self.containing_point(&point)
    }

    pub fn containing_point(&self, point: &Point) -> Vec<&TaggedPolygon> {
        let ll = point.lat_lng();
        let query = AABB::from_point([ll.lng.deg(), ll.lat.deg()]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .filter(|ip| ip.tagged.polygon.contains(point))
            .map(|ip| &ip.tagged)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaggedPolygon> {
        self.tree.iter().map(|ip| &ip.tagged)
    }
}

impl FromIterator<TaggedPolygon> for SpatialIndex {
    fn from_iter<I: IntoIterator<Item = TaggedPolygon>>(iter: I) -> Self {
        Self {
            tree: RTree::bulk_load(iter.into_iter().map(IndexedPolygon::new).collect()),
        }
    }
}
