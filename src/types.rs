//! Core data structures for boundary lookups.
//!
//! - [`Place`] - Name and place type carried by a boundary
//! - [`PlaceType`] - The administrative categories a [`Location`] can hold
//! - [`TaggedPolygon`] - A spherical polygon labelled with its [`Place`]
//! - [`Location`] - The hierarchy returned by a lookup

#![warn(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sphere::SphericalPolygon;

/// What a boundary polygon represents, e.g. `Brooklyn` of type `borough`.
///
/// The place type is kept as the raw string found in the boundary file so
/// that unrecognised types survive caching and can be reported at query time.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct Place {
    /// Display name of the place (e.g., "Brooklyn", "Paris")
    pub name: String,
    /// Place type as written in the source (e.g., "borough", "locality")
    pub place_type: String,
}

impl Place {
    /// Constructs a new Place.
    ///
    /// # Examples
    ///
    /// ```
    /// use salta::Place;
    ///
    /// let place = Place::new("Brooklyn", "borough");
    /// assert_eq!(place.name, "Brooklyn");
    /// ```
    pub fn new(name: impl Into<String>, place_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            place_type: place_type.into(),
        }
    }
}

/// A polygon paired with the place it outlines.
///
/// A boundary file with a multi-polygon geometry yields one `TaggedPolygon`
/// per member polygon, all sharing the same [`Place`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedPolygon {
    /// The spherical outline
    pub polygon: SphericalPolygon,
    /// The place this outline belongs to
    pub place: Place,
}

/// Administrative categories recognised by [`Location`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceType {
    /// A campus (university, airport, ...)
    Campus,
    /// A city, town or village
    Locality,
    /// A market area
    MarketArea,
    /// A neighbourhood
    Neighbourhood,
    /// A borough
    Borough,
    /// A microhood
    Microhood,
    /// A county
    County,
    /// A group of counties
    MacroCounty,
    /// A local administrative area
    LocalAdmin,
    /// A state, province or region
    Region,
    /// A group of regions
    MacroRegion,
    /// A country
    Country,
}

impl PlaceType {
    /// Every recognised place type, in [`Location`] field order.
    pub const ALL: [PlaceType; 12] = [
        PlaceType::Campus,
        PlaceType::Locality,
        PlaceType::MarketArea,
        PlaceType::Neighbourhood,
        PlaceType::Borough,
        PlaceType::Microhood,
        PlaceType::County,
        PlaceType::MacroCounty,
        PlaceType::LocalAdmin,
        PlaceType::Region,
        PlaceType::MacroRegion,
        PlaceType::Country,
    ];

    /// The spelling used by boundary files (e.g., `"marketarea"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceType::Campus => "campus",
            PlaceType::Locality => "locality",
            PlaceType::MarketArea => "marketarea",
            PlaceType::Neighbourhood => "neighbourhood",
            PlaceType::Borough => "borough",
            PlaceType::Microhood => "microhood",
            PlaceType::County => "county",
            PlaceType::MacroCounty => "macrocounty",
            PlaceType::LocalAdmin => "localadmin",
            PlaceType::Region => "region",
            PlaceType::MacroRegion => "macroregion",
            PlaceType::Country => "country",
        }
    }

    /// Name of the matching [`Location`] field (e.g., `"MarketArea"`).
    pub fn label(&self) -> &'static str {
        match self {
            PlaceType::Campus => "Campus",
            PlaceType::Locality => "Locality",
            PlaceType::MarketArea => "MarketArea",
            PlaceType::Neighbourhood => "Neighbourhood",
            PlaceType::Borough => "Borough",
            PlaceType::Microhood => "Microhood",
            PlaceType::County => "County",
            PlaceType::MacroCounty => "MacroCounty",
            PlaceType::LocalAdmin => "LocalAdmin",
            PlaceType::Region => "Region",
            PlaceType::MacroRegion => "MacroRegion",
            PlaceType::Country => "Country",
        }
    }
}

impl FromStr for PlaceType {
    type Err = UnknownPlaceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlaceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownPlaceType(s.to_string()))
    }
}

impl fmt::Display for PlaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A place type string that [`Location`] has no field for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown place type {0:?}")]
pub struct UnknownPlaceType(pub String);

/// The administrative hierarchy around a coordinate.
///
/// Every field is optional; a point outside every indexed boundary yields a
/// `Location` with nothing set. Serialisation skips absent fields.
///
/// # Examples
///
/// ```
/// use salta::{Location, PlaceType};
///
/// let mut location = Location::default();
/// location.set(PlaceType::County, "Kings County");
/// assert_eq!(location.county.as_deref(), Some("Kings County"));
/// assert_eq!(location.to_string(), "County:Kings County");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    /// Campus name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campus: Option<String>,
    /// City, town or village name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    /// Market area name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_area: Option<String>,
    /// Neighbourhood name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbourhood: Option<String>,
    /// Borough name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borough: Option<String>,
    /// Microhood name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microhood: Option<String>,
    /// County name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    /// Macro-county name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macro_county: Option<String>,
    /// Local administrative area name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_admin: Option<String>,
    /// State, province or region name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Macro-region name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macro_region: Option<String>,
    /// Country name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Location {
    /// Returns the name stored for `place_type`, if any.
    pub fn get(&self, place_type: PlaceType) -> Option<&str> {
        self.slot(place_type).as_deref()
    }

    /// Stores `name` for `place_type`, returning the name it replaced.
    pub fn set(&mut self, place_type: PlaceType, name: impl Into<String>) -> Option<String> {
        self.slot_mut(place_type).replace(name.into())
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        PlaceType::ALL.iter().all(|t| self.get(*t).is_none())
    }

    /// Iterates over the set fields in hierarchy order.
    pub fn iter(&self) -> impl Iterator<Item = (PlaceType, &str)> {
        PlaceType::ALL
            .into_iter()
            .filter_map(|t| self.get(t).map(|name| (t, name)))
    }

    fn slot(&self, place_type: PlaceType) -> &Option<String> {
        match place_type {
            PlaceType::Campus => &self.campus,
            PlaceType::Locality => &self.locality,
            PlaceType::MarketArea => &self.market_area,
            PlaceType::Neighbourhood => &self.neighbourhood,
            PlaceType::Borough => &self.borough,
            PlaceType::Microhood => &self.microhood,
            PlaceType::County => &self.county,
            PlaceType::MacroCounty => &self.macro_county,
            PlaceType::LocalAdmin => &self.local_admin,
            PlaceType::Region => &self.region,
            PlaceType::MacroRegion => &self.macro_region,
            PlaceType::Country => &self.country,
        }
    }

    fn slot_mut(&mut self, place_type: PlaceType) -> &mut Option<String> {
        match place_type {
            PlaceType::Campus => &mut self.campus,
            PlaceType::Locality => &mut self.locality,
            PlaceType::MarketArea => &mut self.market_area,
            PlaceType::Neighbourhood => &mut self.neighbourhood,
            PlaceType::Borough => &mut self.borough,
            PlaceType::Microhood => &mut self.microhood,
            PlaceType::County => &mut self.county,
            PlaceType::MacroCounty => &mut self.macro_county,
            PlaceType::LocalAdmin => &mut self.local_admin,
            PlaceType::Region => &mut self.region,
            PlaceType::MacroRegion => &mut self.macro_region,
            PlaceType::Country => &mut self.country,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (place_type, name)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", place_type.label(), name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_type_round_trips_through_strings() {
        for place_type in PlaceType::ALL {
            assert_eq!(place_type.as_str().parse::<PlaceType>(), Ok(place_type));
        }
        assert_eq!(
            "continent".parse::<PlaceType>(),
            Err(UnknownPlaceType("continent".to_string()))
        );
    }

    #[test]
    fn test_set_replaces_previous_name() {
        let mut location = Location::default();
        assert!(location.is_empty());
        assert_eq!(location.set(PlaceType::Locality, "Paris"), None);
        assert_eq!(
            location.set(PlaceType::Locality, "Lyon"),
            Some("Paris".to_string())
        );
        assert_eq!(location.get(PlaceType::Locality), Some("Lyon"));
        assert!(!location.is_empty());
    }

    #[test]
    fn test_display_follows_hierarchy_order() {
        let mut location = Location::default();
        location.set(PlaceType::Country, "United States");
        location.set(PlaceType::MacroCounty, "Upstate");
        location.set(PlaceType::Locality, "New York");
        assert_eq!(
            location.to_string(),
            "Locality:New York MacroCounty:Upstate Country:United States"
        );
        assert_eq!(Location::default().to_string(), "");
    }

    #[test]
    fn test_json_omits_absent_fields() {
        let mut location = Location::default();
        location.set(PlaceType::MarketArea, "Tri-State");
        location.set(PlaceType::County, "TestCounty");
        let json = serde_json::to_string(&location).unwrap();
        assert_eq!(json, r#"{"MarketArea":"Tri-State","County":"TestCounty"}"#);
        assert_eq!(serde_json::to_string(&Location::default()).unwrap(), "{}");
    }
}
