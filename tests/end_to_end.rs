use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use salta::{GeocoderSettings, Location, PlaceType, ReverseGeocoder};

fn write_feature(dir: &Path, file: &str, name: &str, place_type: &str, ring: &[[f64; 2]]) {
    let feature = serde_json::json!({
        "type": "Feature",
        "properties": { "wof:name": name, "wof:placetype": place_type },
        "geometry": { "type": "Polygon", "coordinates": [ring] },
    });
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(file), serde_json::to_vec(&feature).unwrap()).unwrap();
}

fn settings(root: &Path, countries: &[&str]) -> GeocoderSettings {
    GeocoderSettings {
        countries: countries.iter().map(|c| c.to_string()).collect(),
        repos_folder: root.join("repos"),
        cache_folder: root.join("cache"),
        workers: Some(4),
        ..GeocoderSettings::default()
    }
}

fn county(name: &str) -> Location {
    let mut location = Location::default();
    location.set(PlaceType::County, name);
    location
}

#[test]
fn test_county_lookup() {
    let dir = tempfile::tempdir().unwrap();
    write_feature(
        &dir.path().join("repos/xx/data/856"),
        "85633001.geojson",
        "TestCounty",
        "county",
        &[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]],
    );

    let geocoder = ReverseGeocoder::initialize(settings(dir.path(), &["xx"])).unwrap();
    assert_eq!(geocoder.index().len(), 1);
    assert_eq!(geocoder.locate(0.5, 0.5), county("TestCounty"));
    assert_eq!(geocoder.locate(10.0, 10.0), Location::default());
    assert!(dir.path().join("cache/xx/85633001.geojson").is_file());
}

#[test]
fn test_cache_only_reload() {
    let dir = tempfile::tempdir().unwrap();
    write_feature(
        &dir.path().join("repos/xx"),
        "1.geojson",
        "TestCounty",
        "county",
        &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]],
    );
    write_feature(
        &dir.path().join("repos/xx"),
        "2.geojson",
        "Testland",
        "country",
        &[[-5.0, -5.0], [5.0, -5.0], [5.0, 5.0], [-5.0, 5.0], [-5.0, -5.0]],
    );

    let built = ReverseGeocoder::initialize(settings(dir.path(), &["xx"])).unwrap();
    assert_eq!(built.stats().converted, 2);

    fs::remove_dir_all(dir.path().join("repos")).unwrap();
    let reloaded = ReverseGeocoder::load_from_cache_only(settings(dir.path(), &["xx"])).unwrap();
    assert_eq!(reloaded.stats().cache_hits, 2);

    for (lat, lng) in [(0.5, 0.5), (-2.0, 3.0), (20.0, 20.0)] {
        assert_eq!(built.locate(lat, lng), reloaded.locate(lat, lng));
    }
    let location = reloaded.locate(0.5, 0.5);
    assert_eq!(location.county.as_deref(), Some("TestCounty"));
    assert_eq!(location.country.as_deref(), Some("Testland"));
}

#[test]
fn test_place_type_filter() {
    let dir = tempfile::tempdir().unwrap();
    write_feature(
        &dir.path().join("repos/xx"),
        "1.geojson",
        "Springfield",
        "locality",
        &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
    );

    let mut settings = settings(dir.path(), &["xx"]);
    settings.enabled_place_types = vec!["country".to_string()];
    let geocoder = ReverseGeocoder::initialize(settings).unwrap();

    assert!(geocoder.index().is_empty());
    assert_eq!(geocoder.locate(0.5, 0.5).locality, None);
}

#[test]
fn test_countries_are_loaded_in_turn() {
    let dir = tempfile::tempdir().unwrap();
    write_feature(
        &dir.path().join("repos/aa"),
        "1.geojson",
        "West",
        "region",
        &[[-10.0, 0.0], [-9.0, 0.0], [-9.0, 1.0], [-10.0, 1.0]],
    );
    write_feature(
        &dir.path().join("repos/bb"),
        "1.geojson",
        "East",
        "region",
        &[[9.0, 0.0], [10.0, 0.0], [10.0, 1.0], [9.0, 1.0]],
    );

    let geocoder = ReverseGeocoder::initialize(settings(dir.path(), &["aa", "bb"])).unwrap();
    assert_eq!(geocoder.stats().files, 2);
    assert_eq!(geocoder.locate(0.5, -9.5).region.as_deref(), Some("West"));
    assert_eq!(geocoder.locate(0.5, 9.5).region.as_deref(), Some("East"));
}

#[test]
fn test_concurrent_lookups() {
    let dir = tempfile::tempdir().unwrap();
    write_feature(
        &dir.path().join("repos/xx"),
        "1.geojson",
        "TestCounty",
        "county",
        &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
    );
    let geocoder = Arc::new(ReverseGeocoder::initialize(settings(dir.path(), &["xx"])).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let geocoder = Arc::clone(&geocoder);
            thread::spawn(move || {
                let offset = f64::from(i) * 0.1;
                geocoder.locate(0.1 + offset, 0.1 + offset)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), county("TestCounty"));
    }
}
