// Ward boundary loading
// Turns a GeoJSON FeatureCollection into validated Ward records and keeps a
// processed snapshot on disk for the query stage


pub mod geojson;
pub mod source;

pub use geojson::{PropertyKeys, parse_wards};
pub use source::BoundarySource;

use chrono::{DateTime, Utc};
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::http::HttpClient;
use crate::{Result, WardError};

/// One municipal ward
///
/// `geometry` uses x = longitude and y = latitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ward {
    pub id: String,
    pub name: Option<String>,
    pub geometry: MultiPolygon<f64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Ward {
    #[inline]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// The boundary as a GeoJSON MultiPolygon geometry object
    #[inline]
    pub fn geometry_geojson(&self) -> serde_json::Value {
        let coordinates: Vec<Vec<Vec<[f64; 2]>>> = self
            .geometry
            .0
            .iter()
            .map(|polygon| {
                std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
                    .collect()
            })
            .collect();

        serde_json::json!({
            "type": "MultiPolygon",
            "coordinates": coordinates,
        })
    }
}

/// Every ward loaded from one boundary source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardSet {
    pub city: String,
    pub source: String,
    pub loaded_at: DateTime<Utc>,
    pub wards: Vec<Ward>,
}

impl WardSet {
    #[inline]
    pub fn new(city: &str, source: &str, wards: Vec<Ward>) -> Self {
        Self {
            city: city.to_string(),
            source: source.to_string(),
            loaded_at: Utc::now(),
            wards,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.wards.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.wards.is_empty()
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<&Ward> {
        self.wards.iter().find(|ward| ward.id == id)
    }

    #[inline]
    pub fn ids(&self) -> Vec<String> {
        self.wards.iter().map(|ward| ward.id.clone()).collect()
    }

    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(self)
            .map_err(|e| WardError::Other(anyhow::anyhow!("Failed to serialize wards: {}", e)))?;

        // Write then rename so a reader never sees half a snapshot
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;

        debug!("Saved {} wards to {}", self.len(), path.display());
        Ok(())
    }

    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| WardError::DataUnavailable {
            location: path.display().to_string(),
            message: format!("{} (run `ward-rag ingest` first)", e),
        })?;

        serde_json::from_str(&text).map_err(|e| WardError::DataUnavailable {
            location: path.display().to_string(),
            message: format!("processed ward file is corrupt: {}", e),
        })
    }
}

/// Reads, validates and snapshots ward boundaries
#[derive(Debug, Clone)]
pub struct BoundaryLoader {
    source: BoundarySource,
    keys: PropertyKeys,
    city: String,
    user_agent: String,
    cache_path: PathBuf,
    http: HttpClient,
    refresh: bool,
}

impl BoundaryLoader {
    #[inline]
    pub fn new(config: &Config) -> Self {
        Self {
            source: BoundarySource::parse(&config.boundaries.source),
            keys: PropertyKeys::new(
                &config.boundaries.id_property,
                &config.boundaries.name_property,
            ),
            city: config.boundaries.city.clone(),
            user_agent: config.geocoder.user_agent.clone(),
            cache_path: config.raw_boundaries_path(),
            http: HttpClient::new(&config.http),
            refresh: false,
        }
    }

    #[inline]
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    #[inline]
    pub fn with_http(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    #[inline]
    pub fn source(&self) -> &BoundarySource {
        &self.source
    }

    /// Fetch and validate every ward
    ///
    /// Any malformed feature fails the whole load; there is no partial set.
    #[inline]
    pub fn load(&self) -> Result<WardSet> {
        let location = self.source.location();
        let text = self
            .source
            .fetch(&self.http, &self.user_agent, &self.cache_path, self.refresh)?;

        let wards = parse_wards(&text, &self.keys, &location)?;
        info!("Loaded {} wards from {}", wards.len(), location);

        Ok(WardSet::new(&self.city, &location, wards))
    }
}
