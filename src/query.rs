//! Folds containment matches into a [`Location`].

use crate::types::{Location, PlaceType, TaggedPolygon};

/// Assigns every matched place to its [`Location`] field.
///
/// Matches arrive in no particular order. When two places share a type the
/// later one wins; the overlap is logged since well-formed data partitions
/// space per type. Unrecognised types are logged and skipped.
pub fn resolve_location<'a>(matches: impl IntoIterator<Item = &'a TaggedPolygon>) -> Location {
    let mut location = Location::default();
    for tagged in matches {
        let place = &tagged.place;
        let Ok(place_type) = place.place_type.parse::<PlaceType>() else {
            tracing::info!(place_type = %place.place_type, "unknown type");
            continue;
        };
        if let Some(previous) = location.set(place_type, place.name.as_str()) {
            if previous != place.name {
                tracing::debug!(
                    %place_type,
                    previous = %previous,
                    current = %place.name,
                    "overlapping boundaries of the same type"
                );
            }
        }
    }
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::convert_rings;
    use crate::types::Place;

    fn tagged(name: &str, place_type: &str) -> TaggedPolygon {
        TaggedPolygon {
            polygon: convert_rings(&[vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]])
                .unwrap()
                .unwrap(),
            place: Place::new(name, place_type),
        }
    }

    #[test]
    fn test_matches_fill_their_fields() {
        let matches = [
            tagged("Brooklyn", "borough"),
            tagged("New York", "locality"),
            tagged("United States", "country"),
            tagged("Kings", "county"),
        ];
        let location = resolve_location(&matches);
        assert_eq!(location.borough.as_deref(), Some("Brooklyn"));
        assert_eq!(location.locality.as_deref(), Some("New York"));
        assert_eq!(location.country.as_deref(), Some("United States"));
        assert_eq!(location.county.as_deref(), Some("Kings"));
        assert_eq!(location.region, None);
    }

    #[test]
    fn test_last_match_of_a_type_wins() {
        let matches = [tagged("First", "region"), tagged("Second", "region")];
        assert_eq!(
            resolve_location(&matches).region.as_deref(),
            Some("Second")
        );
    }

    #[test]
    fn test_unknown_types_are_skipped() {
        let matches = [tagged("Some Venue", "venue"), tagged("Paris", "locality")];
        let location = resolve_location(&matches);
        let mut expected = Location::default();
        expected.set(PlaceType::Locality, "Paris");
        assert_eq!(location, expected);
    }

    #[test]
    fn test_no_matches_is_empty() {
        assert!(resolve_location(std::iter::empty()).is_empty());
    }
}
