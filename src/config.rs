//! INI configuration for the geocoder.
//!
//! ```ini
//! [geocoder]
//! countries = us, fr
//! place_types = locality, county, country
//! workers = 8
//!
//! [repos]
//! folder = repos
//!
//! [cache]
//! folder = cache
//! ```
//!
//! Every key except `countries` is optional and falls back to
//! [`GeocoderSettings::default`].

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::geocoder::GeocoderSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    Read(#[from] ini::Error),

    #[error("invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Loads settings from the INI file at `path`.
pub fn load_settings(path: &Path) -> Result<GeocoderSettings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let ini = Ini::load_from_file(path)?;
    parse_ini(&ini)
}

/// Overlays the values found in `ini` on the default settings.
pub fn parse_ini(ini: &Ini) -> Result<GeocoderSettings, ConfigError> {
    let mut settings = GeocoderSettings::default();

    // [geocoder] section
    let geocoder = ini.section(Some("geocoder"));
    if let Some(v) = geocoder.and_then(|s| s.get("countries")) {
        settings.countries = parse_list(v);
    }
    if settings.countries.is_empty() {
        return Err(ConfigError::InvalidValue {
            section: "geocoder".to_string(),
            key: "countries".to_string(),
            value: geocoder
                .and_then(|s| s.get("countries"))
                .unwrap_or_default()
                .to_string(),
            reason: "at least one country code is required".to_string(),
        });
    }
    if let Some(v) = geocoder.and_then(|s| s.get("place_types")) {
        settings.enabled_place_types = parse_list(v);
    }
    if let Some(v) = geocoder.and_then(|s| s.get("workers")) {
        let workers = v
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| ConfigError::InvalidValue {
                section: "geocoder".to_string(),
                key: "workers".to_string(),
                value: v.to_string(),
                reason: "expected a positive integer".to_string(),
            })?;
        settings.workers = Some(workers);
    }

    // [repos] section
    if let Some(v) = ini.section(Some("repos")).and_then(|s| s.get("folder")) {
        let v = v.trim();
        if !v.is_empty() {
            settings.repos_folder = PathBuf::from(v);
        }
    }

    // [cache] section
    if let Some(v) = ini.section(Some("cache")).and_then(|s| s.get("folder")) {
        let v = v.trim();
        if !v.is_empty() {
            settings.cache_folder = PathBuf::from(v);
        }
    }

    Ok(settings)
}

/// Splits a comma separated list, dropping blanks.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}
