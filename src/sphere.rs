//! Geometry on the unit sphere.
//!
//! Boundaries are stored as loops of unit vectors joined by great-circle
//! edges. Every loop contains the region on its left-hand side, so the
//! orientation of a loop decides which of the two regions it bounds: a
//! counter-clockwise square of one degree covers one square degree, the same
//! square wound clockwise covers the rest of the planet.
//!
//! Areas are solid angles in steradians (the full sphere is `4π`).
//!
//! Projection and latitude/longitude rectangles come from the `s2` crate;
//! loops and polygons, which it does not provide, are built here.

use std::f64::consts::{FRAC_PI_2, TAU};

use rustc_hash::FxHashSet;
use s2::latlng::LatLng;
use s2::r3::vector::Vector;
use s2::rect::Rect;

use crate::error::GeometryError;

/// Solid angle of the whole sphere.
pub const FULL_SPHERE_AREA: f64 = 2.0 * TAU;

/// Margin in degrees added to bounding rectangles used as filters.
const BOUND_MARGIN_DEGREES: f64 = 1e-7;

/// A point on the unit sphere.
#[derive(Debug, Clone, Copy, PartialEq, bincode::Encode, bincode::Decode)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    /// Projects a latitude/longitude pair given in degrees onto the sphere.
    ///
    /// Any finite pair is accepted; values outside the usual ranges wrap
    /// around the sphere like any other angle.
    pub fn from_degrees(lat: f64, lng: f64) -> Self {
        Self::from(s2::point::Point::from(LatLng::from_degrees(lat, lng)))
    }

    /// Latitude and longitude of the point, longitude in `[-π, π]`.
    pub fn lat_lng(&self) -> LatLng {
        LatLng::from(s2::point::Point::from(*self))
    }

    fn dot(&self, other: &Point) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn cross(&self, other: &Point) -> Point {
        Point {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    fn scaled(&self, factor: f64) -> Point {
        Point {
            x: self.x * factor,
            y: self.y * factor,
            z: self.z * factor,
        }
    }

    fn antipode(&self) -> Point {
        self.scaled(-1.0)
    }

    fn bits(&self) -> [u64; 3] {
        [self.x.to_bits(), self.y.to_bits(), self.z.to_bits()]
    }
}

impl From<s2::point::Point> for Point {
    fn from(p: s2::point::Point) -> Self {
        Self {
            x: p.0.x,
            y: p.0.y,
            z: p.0.z,
        }
    }
}

impl From<Point> for s2::point::Point {
    fn from(p: Point) -> Self {
        s2::point::Point(Vector {
            x: p.x,
            y: p.y,
            z: p.z,
        })
    }
}

const NORTH_POLE: Point = Point {
    x: 0.0,
    y: 0.0,
    z: 1.0,
};
const SOUTH_POLE: Point = Point {
    x: 0.0,
    y: 0.0,
    z: -1.0,
};

/// Drops every repeated vertex, keeping the first occurrence.
///
/// Loops need distinct vertices, and a closed ring repeats its first point
/// at the end, so this also removes the wraparound duplicate.
pub fn dedup_points(points: impl IntoIterator<Item = Point>) -> Vec<Point> {
    let mut seen = FxHashSet::default();
    points
        .into_iter()
        .filter(|p| seen.insert(p.bits()))
        .collect()
}

/// Signed area of the spherical triangle `abc`, positive when counter-clockwise.
fn signed_triangle_area(a: &Point, b: &Point, c: &Point) -> f64 {
    2.0 * a
        .dot(&b.cross(c))
        .atan2(1.0 + a.dot(b) + b.dot(c) + c.dot(a))
}

/// Exterior angle at `b` of the path `a -> b -> c`, positive for left turns.
fn turn_angle(a: &Point, b: &Point, c: &Point) -> f64 {
    let before = a.cross(b);
    let after = b.cross(c);
    let angle = before.cross(&after).norm().atan2(before.dot(&after));
    if before.dot(c) > 0.0 {
        angle
    } else {
        -angle
    }
}

/// Pads `rect` on every side so that it can filter containment candidates.
pub fn padded(rect: &Rect) -> Rect {
    rect.expanded(&LatLng::from_degrees(
        BOUND_MARGIN_DEGREES,
        BOUND_MARGIN_DEGREES,
    ))
}

/// A closed chain of great-circle edges, containing the region to its left.
#[derive(Debug, Clone)]
pub struct Loop {
    vertices: Vec<Point>,
    area: f64,
    bound: Rect,
}

impl PartialEq for Loop {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices
    }
}

impl Loop {
    /// Builds a loop from distinct vertices. The closing edge is implicit.
    pub fn new(vertices: Vec<Point>) -> Result<Self, GeometryError> {
        if vertices.len() < 3 {
            return Err(GeometryError::DegenerateLoop {
                vertices: vertices.len(),
            });
        }
        let area = loop_area(&vertices);
        let mut lp = Self {
            vertices,
            area,
            bound: Rect::full(),
        };
        lp.bound = lp.compute_bound();
        Ok(lp)
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Area of the region on the left of the loop.
    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn bound(&self) -> &Rect {
        &self.bound
    }

    /// Swaps the interior and the exterior of the loop.
    pub fn invert(&mut self) {
        self.vertices.reverse();
        self.area = FULL_SPHERE_AREA - self.area;
        self.bound = self.compute_bound();
    }

    /// Vertex-open containment: a vertex of the loop is never contained.
    pub fn contains(&self, p: &Point) -> bool {
        if !padded(&self.bound).contains_latlng(&p.lat_lng()) {
            return false;
        }
        self.contains_unbounded(p)
    }

    /// The triangle fan seen from the antipode of `p` sums to the loop area
    /// when `p` is outside, and to the area minus `4π` when it is inside.
    fn contains_unbounded(&self, p: &Point) -> bool {
        if self.vertices.iter().any(|v| v == p) {
            return false;
        }
        let origin = p.antipode();
        let fan: f64 = self
            .edges()
            .map(|(a, b)| signed_triangle_area(&origin, a, b))
            .sum();
        (fan - self.area).abs() > TAU
    }

    fn edges(&self) -> impl Iterator<Item = (&Point, &Point)> {
        self.vertices
            .iter()
            .zip(self.vertices.iter().cycle().skip(1))
    }

    fn compute_bound(&self) -> Rect {
        let mut bound = Rect::empty();
        for (a, b) in self.edges() {
            bound = bound.union(&edge_bound(a, b));
        }

        let north = self.contains_unbounded(&NORTH_POLE);
        let south = self.contains_unbounded(&SOUTH_POLE);
        if north {
            bound.lat.hi = FRAC_PI_2;
        }
        if south {
            bound.lat.lo = -FRAC_PI_2;
        }
        if north || south {
            bound.lng = Rect::full().lng;
        }
        bound
    }
}

/// Bound of the minor arc from `a` to `b`.
///
/// Great-circle edges bulge towards the poles between their endpoints, so
/// the latitude range is widened to the arc's extreme point when the arc
/// passes through it.
fn edge_bound(a: &Point, b: &Point) -> Rect {
    let mut bound = Rect::from(a.lat_lng()).union(&Rect::from(b.lat_lng()));

    let normal = a.cross(b);
    let len = normal.norm();
    if len < 1e-15 {
        return bound;
    }
    let n = normal.scaled(1.0 / len);
    let top = Point {
        x: -n.z * n.x,
        y: -n.z * n.y,
        z: 1.0 - n.z * n.z,
    };
    let top_len = top.norm();
    if top_len < 1e-15 {
        return bound;
    }
    let top = top.scaled(1.0 / top_len);
    if arc_contains(a, b, &n, &top) {
        bound.lat.hi = bound.lat.hi.max(top.lat_lng().lat.rad());
    }
    let bottom = top.antipode();
    if arc_contains(a, b, &n, &bottom) {
        bound.lat.lo = bound.lat.lo.min(bottom.lat_lng().lat.rad());
    }
    bound
}

/// Area enclosed on the left of the loop, from Gauss-Bonnet.
fn loop_area(vertices: &[Point]) -> f64 {
    let n = vertices.len();
    let turning: f64 = (0..n)
        .map(|i| turn_angle(&vertices[(i + n - 1) % n], &vertices[i], &vertices[(i + 1) % n]))
        .sum();
    (TAU - turning).clamp(0.0, FULL_SPHERE_AREA)
}

/// Whether `p`, on the great circle with unit normal `n`, lies strictly
/// inside the minor arc from `a` to `b`.
fn arc_contains(a: &Point, b: &Point, n: &Point, p: &Point) -> bool {
    a.cross(p).dot(n) > 0.0 && p.cross(b).dot(n) > 0.0
}

/// A shell loop with optional holes.
///
/// A point is inside when an odd number of loops contain it. The shell keeps
/// the orientation it was built with; holes always enclose their smaller side.
#[derive(Debug, Clone, PartialEq)]
pub struct SphericalPolygon {
    loops: Vec<Loop>,
}

impl SphericalPolygon {
    pub fn new(shell: Loop, holes: Vec<Loop>) -> Self {
        let mut loops = Vec::with_capacity(holes.len() + 1);
        loops.push(shell);
        for mut hole in holes {
            if hole.area() > TAU {
                hole.invert();
            }
            loops.push(hole);
        }
        Self { loops }
    }

    /// Rebuilds a polygon from its loops, shell first.
    pub fn from_loops(mut loops: Vec<Loop>) -> Result<Self, GeometryError> {
        if loops.is_empty() {
            return Err(GeometryError::NoRings);
        }
        let shell = loops.remove(0);
        Ok(Self::new(shell, loops))
    }

    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    pub fn shell(&self) -> &Loop {
        &self.loops[0]
    }

    /// Bounding rectangle of the shell.
    pub fn bound(&self) -> &Rect {
        self.shell().bound()
    }

    /// Bounding rectangle padded for use as a search filter.
    pub fn search_bound(&self) -> Rect {
        padded(self.bound())
    }

    /// Turns the polygon into its complement.
    pub fn invert(&mut self) {
        self.loops[0].invert();
    }

    pub fn contains(&self, p: &Point) -> bool {
        self.loops.iter().filter(|l| l.contains(p)).count() % 2 == 1
    }
}
