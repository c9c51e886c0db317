//! Turns boundary files into spherical polygons.
//!
//! A boundary file is a GeoJSON `Feature` whose properties carry the place
//! name (`wof:name`) and place type (`wof:placetype`). Only `Polygon` and
//! `MultiPolygon` geometries describe an area; anything else makes the file
//! permanently unusable, which is reported as [`Conversion::Invalid`] so the
//! verdict can be cached.

use std::fmt;

use geo::{Coord, LineString, Polygon, SimplifyVwPreserve};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::GeometryError;
use crate::sphere::{dedup_points, Loop, Point, SphericalPolygon};
use crate::types::Place;

/// Vertex reduction tolerance, in degrees.
pub const SIMPLIFY_TOLERANCE: f64 = 1e-4;

/// Bounding areas above this many steradians indicate an inverted polygon.
pub const MAX_BOUND_AREA: f64 = 10.0;

/// Suffix selecting boundary files during discovery.
pub const BOUNDARY_FILE_SUFFIX: &str = ".geojson";

const NAME_PROPERTY: &str = "wof:name";
const PLACE_TYPE_PROPERTY: &str = "wof:placetype";

/// One ring of `[lng, lat]` positions in degrees.
pub type Ring = Vec<[f64; 2]>;

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

/// Why a boundary file can never produce polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    MissingName,
    MissingPlaceType,
    MissingGeometry,
    UnsupportedGeometry,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvalidReason::MissingName => "missing wof:name",
            InvalidReason::MissingPlaceType => "missing wof:placetype",
            InvalidReason::MissingGeometry => "missing geometry",
            InvalidReason::UnsupportedGeometry => "geometry is not a polygon",
        })
    }
}

/// Outcome of converting one boundary file.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    /// The file describes a place; `polygons` holds every member polygon
    /// that survived conversion, `dropped` counts the ones that did not.
    Polygons {
        place: Place,
        polygons: Vec<SphericalPolygon>,
        dropped: usize,
    },
    /// The file is not a usable boundary, whatever its geometry.
    Invalid(InvalidReason),
}

/// Parses a boundary file and converts each of its polygons.
///
/// Malformed JSON is returned as an error: it says nothing permanent about
/// the file and must not be cached.
pub fn convert_feature(bytes: &[u8]) -> Result<Conversion, serde_json::Error> {
    let feature: Feature = serde_json::from_slice(bytes)?;
    let properties = feature.properties.unwrap_or_default();

    let Some(name) = non_empty_string(&properties, NAME_PROPERTY) else {
        return Ok(Conversion::Invalid(InvalidReason::MissingName));
    };
    let Some(place_type) = non_empty_string(&properties, PLACE_TYPE_PROPERTY) else {
        return Ok(Conversion::Invalid(InvalidReason::MissingPlaceType));
    };
    let members = match feature.geometry {
        None => return Ok(Conversion::Invalid(InvalidReason::MissingGeometry)),
        Some(Geometry::Unsupported) => {
            return Ok(Conversion::Invalid(InvalidReason::UnsupportedGeometry))
        }
        Some(Geometry::Polygon { coordinates }) => vec![coordinates],
        Some(Geometry::MultiPolygon { coordinates }) => coordinates,
    };

    let mut polygons = Vec::with_capacity(members.len());
    let mut dropped = 0;
    for member in members {
        match to_rings(member).and_then(|rings| convert_rings(&rings)) {
            Ok(Some(polygon)) => polygons.push(polygon),
            Ok(None) => {
                tracing::debug!(place = name, "discarding polygon with an oversized bound");
                dropped += 1;
            }
            Err(e) => {
                tracing::warn!(place = name, error = %e, "ignoring polygon");
                dropped += 1;
            }
        }
    }

    Ok(Conversion::Polygons {
        place: Place::new(name, place_type),
        polygons,
        dropped,
    })
}

fn non_empty_string<'a>(properties: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    properties
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn to_rings(member: Vec<Vec<Vec<f64>>>) -> Result<Vec<Ring>, GeometryError> {
    member
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .map(|position| match position[..] {
                    [lng, lat, ..] => Ok([lng, lat]),
                    _ => Err(GeometryError::MalformedPosition {
                        len: position.len(),
                    }),
                })
                .collect()
        })
        .collect()
}

/// Converts the rings of one polygon, shell first, given as `[lng, lat]`
/// degrees.
///
/// Returns `Ok(None)` when the polygon is oversized in both orientations.
pub fn convert_rings(rings: &[Ring]) -> Result<Option<SphericalPolygon>, GeometryError> {
    let Some((shell, holes)) = rings.split_first() else {
        return Err(GeometryError::NoRings);
    };

    let planar = Polygon::new(
        planar_ring(shell)?,
        holes.iter().map(|h| planar_ring(h)).collect::<Result<_, _>>()?,
    );
    let simplified = planar.simplify_vw_preserve(&(SIMPLIFY_TOLERANCE * SIMPLIFY_TOLERANCE));

    let shell = spherical_loop(simplified.exterior())?;
    let holes = simplified
        .interiors()
        .iter()
        .map(spherical_loop)
        .collect::<Result<Vec<_>, _>>()?;
    let mut polygon = SphericalPolygon::new(shell, holes);

    if polygon.bound().area() > MAX_BOUND_AREA {
        polygon.invert();
        if polygon.bound().area() > MAX_BOUND_AREA {
            return Ok(None);
        }
    }
    Ok(Some(polygon))
}

/// Drops repeated positions so every vertex is distinct.
fn planar_ring(ring: &[[f64; 2]]) -> Result<LineString<f64>, GeometryError> {
    let mut seen = FxHashSet::default();
    let coords: Vec<Coord<f64>> = ring
        .iter()
        .filter(|[lng, lat]| seen.insert((lng.to_bits(), lat.to_bits())))
        .map(|&[x, y]| Coord { x, y })
        .collect();
    if coords.len() < 3 {
        return Err(GeometryError::DegenerateLoop {
            vertices: coords.len(),
        });
    }
    Ok(LineString::new(coords))
}

fn spherical_loop(ring: &LineString<f64>) -> Result<Loop, GeometryError> {
    Loop::new(dedup_points(
        ring.coords().map(|c| Point::from_degrees(c.y, c.x)),
    ))
}
