// Landmark geocoding against a Nominatim-compatible search endpoint

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, TieBreak};
use crate::http::HttpClient;
use crate::spatial::Coordinates;
use crate::{Result, WardError};

/// Importance values closer than this are treated as a tie
const IMPORTANCE_EPSILON: f64 = 1e-9;
/// Positions closer than this (in degrees) are the same place
const SAME_PLACE_DEGREES: f64 = 1e-6;

/// A geocoded landmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub coordinates: Coordinates,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
}

#[derive(Debug, Clone)]
struct Candidate {
    coordinates: Coordinates,
    display_name: Option<String>,
    importance: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Geocoder {
    search_url: Url,
    user_agent: String,
    region: String,
    result_limit: u32,
    tie_break: TieBreak,
    http: HttpClient,
}

impl Geocoder {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let search_url = config
            .geocoder
            .search_url()
            .map_err(|e| WardError::Config(e.to_string()))?;

        Ok(Self {
            search_url,
            user_agent: config.geocoder.user_agent.clone(),
            region: config.geocoder.region.clone(),
            result_limit: config.geocoder.result_limit.max(1),
            tie_break: config.geocoder.tie_break,
            http: HttpClient::new(&config.http),
        })
    }

    #[inline]
    pub fn with_http(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    #[inline]
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// The free-text query sent for a landmark
    #[inline]
    pub fn scoped_query(&self, landmark: &str) -> String {
        if self.region.trim().is_empty() {
            landmark.trim().to_string()
        } else {
            format!("{}, {}", landmark.trim(), self.region.trim())
        }
    }

    /// Resolve a landmark name to one position
    #[inline]
    pub fn geocode(&self, landmark: &str) -> Result<Landmark> {
        let query = self.scoped_query(landmark);
        let limit = self.result_limit.to_string();
        debug!("Geocoding '{}'", query);

        let not_found = |detail: String| WardError::NotFound {
            landmark: landmark.to_string(),
            detail,
        };

        let body = self
            .http
            .get_text(
                self.search_url.as_str(),
                &[
                    ("q", query.as_str()),
                    ("format", "jsonv2"),
                    ("limit", limit.as_str()),
                ],
                &self.user_agent,
            )
            .map_err(|e| {
                warn!("Geocoding service request failed: {}", e);
                not_found(format!("geocoding service unavailable: {}", e))
            })?;

        let results: Vec<SearchResult> = serde_json::from_str(&body)
            .map_err(|e| not_found(format!("unreadable geocoding response: {}", e)))?;

        let candidates: Vec<Candidate> = results.into_iter().filter_map(parse_candidate).collect();

        let first = candidates
            .first()
            .ok_or_else(|| not_found("no matching places".to_string()))?;

        if self.tie_break == TieBreak::Strict {
            let tied = tied_candidates(&candidates);
            if tied > 1 {
                return Err(WardError::AmbiguousMatch {
                    landmark: landmark.to_string(),
                    candidates: tied,
                });
            }
        }

        debug!(
            "Geocoded '{}' to ({}, {})",
            landmark, first.coordinates.latitude, first.coordinates.longitude
        );

        Ok(Landmark {
            name: landmark.to_string(),
            coordinates: first.coordinates,
            display_name: first.display_name.clone(),
        })
    }
}

fn parse_candidate(result: SearchResult) -> Option<Candidate> {
    let latitude = result.lat.trim().parse::<f64>().ok()?;
    let longitude = result.lon.trim().parse::<f64>().ok()?;

    let in_range = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);

    if !in_range {
        debug!("Skipping result with unusable coordinates {}, {}", latitude, longitude);
        return None;
    }

    Some(Candidate {
        coordinates: Coordinates::new(latitude, longitude),
        display_name: result.display_name,
        importance: result.importance,
    })
}

/// How many distinct places share the top result's importance
///
/// A tie only exists when the first two results are equally ranked and far
/// enough apart to be different places.
fn tied_candidates(candidates: &[Candidate]) -> usize {
    let (Some(first), Some(second)) = (candidates.first(), candidates.get(1)) else {
        return 1;
    };
    let (Some(top), Some(runner_up)) = (first.importance, second.importance) else {
        return 1;
    };
    if (top - runner_up).abs() > IMPORTANCE_EPSILON
        || same_place(first.coordinates, second.coordinates)
    {
        return 1;
    }

    let mut places: Vec<Coordinates> = Vec::new();
    for candidate in candidates {
        let Some(importance) = candidate.importance else {
            break;
        };
        if (importance - top).abs() > IMPORTANCE_EPSILON {
            break;
        }
        if !places.iter().any(|p| same_place(*p, candidate.coordinates)) {
            places.push(candidate.coordinates);
        }
    }

    places.len()
}

fn same_place(a: Coordinates, b: Coordinates) -> bool {
    (a.latitude - b.latitude).abs() < SAME_PLACE_DEGREES
        && (a.longitude - b.longitude).abs() < SAME_PLACE_DEGREES
}
