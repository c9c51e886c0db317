use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use salta::{config, logging, GeocoderSettings, ReverseGeocoder};

/// Resolve a coordinate to the administrative places containing it.
#[derive(Debug, Parser)]
#[command(name = "salta", version, about)]
struct Cli {
    /// INI configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Country to load (repeatable); replaces the configured list
    #[arg(long = "country", value_name = "CODE")]
    countries: Vec<String>,

    /// Place type to keep (repeatable); replaces the configured list
    #[arg(long = "place-type", value_name = "TYPE")]
    place_types: Vec<String>,

    /// Folder holding one boundary dataset per country
    #[arg(long)]
    repos: Option<PathBuf>,

    /// Folder for cached polygons
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Ingestion worker threads
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    workers: Option<u16>,

    /// Only use cached polygons, never read boundary files
    #[arg(long)]
    cache_only: bool,

    /// Print the location as JSON
    #[arg(long)]
    json: bool,

    /// Latitude in degrees
    #[arg(allow_negative_numbers = true)]
    lat: f64,

    /// Longitude in degrees
    #[arg(allow_negative_numbers = true)]
    lng: f64,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<GeocoderSettings> {
        let mut settings = match &self.config {
            Some(path) => config::load_settings(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => GeocoderSettings::default(),
        };
        if !self.countries.is_empty() {
            settings.countries = self.countries.iter().map(|c| c.to_lowercase()).collect();
        }
        if !self.place_types.is_empty() {
            settings.enabled_place_types =
                self.place_types.iter().map(|t| t.to_lowercase()).collect();
        }
        if let Some(repos) = &self.repos {
            settings.repos_folder = repos.clone();
        }
        if let Some(cache) = &self.cache {
            settings.cache_folder = cache.clone();
        }
        if let Some(workers) = self.workers {
            settings.workers = Some(usize::from(workers));
        }
        if settings.countries.is_empty() {
            bail!("no countries configured, pass --country or --config");
        }
        Ok(settings)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(logging::default_filter())?;

    if !(-90.0..=90.0).contains(&cli.lat) {
        bail!("latitude {} is outside [-90, 90]", cli.lat);
    }
    if !(-180.0..=180.0).contains(&cli.lng) {
        bail!("longitude {} is outside [-180, 180]", cli.lng);
    }

    let settings = cli.settings()?;
    let geocoder = if cli.cache_only {
        ReverseGeocoder::load_from_cache_only(settings)?
    } else {
        ReverseGeocoder::initialize(settings)?
    };
    tracing::debug!(
        cache = %geocoder.cache_folder().display(),
        countries = ?geocoder.settings().countries,
        stats = ?geocoder.stats(),
        "geocoder loaded"
    );

    let location = geocoder.locate(cli.lat, cli.lng);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&location)?);
    } else if location.is_empty() {
        println!("No place found");
    } else {
        for (place_type, name) in location.iter() {
            println!("{}: {}", place_type.label(), name);
        }
    }

    Ok(())
}
