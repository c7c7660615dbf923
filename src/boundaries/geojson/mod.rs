// GeoJSON validation into fixed Ward records
// Loosely typed feature properties stop here, nothing downstream sees serde_json::Value


use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::Ward;
use crate::{Result, WardError};

/// Which feature properties carry the identifier and the display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyKeys {
    pub id: String,
    pub name: String,
}

impl PropertyKeys {
    #[inline]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.trim().to_lowercase(),
            name: name.trim().to_lowercase(),
        }
    }
}

impl Default for PropertyKeys {
    #[inline]
    fn default() -> Self {
        Self::new("ward_no", "ward_name")
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<Value>,
}

type Ring = Vec<Vec<f64>>;

/// Parse a FeatureCollection into validated wards
///
/// `location` names the source in error messages.
#[inline]
pub fn parse_wards(text: &str, keys: &PropertyKeys, location: &str) -> Result<Vec<Ward>> {
    let collection: FeatureCollection =
        serde_json::from_str(text).map_err(|e| WardError::DataUnavailable {
            location: location.to_string(),
            message: format!("not valid GeoJSON: {}", e),
        })?;

    if collection.kind != "FeatureCollection" {
        return Err(WardError::DataUnavailable {
            location: location.to_string(),
            message: format!("expected a FeatureCollection, found '{}'", collection.kind),
        });
    }

    if collection.features.is_empty() {
        return Err(WardError::DataUnavailable {
            location: location.to_string(),
            message: "the collection contains no features".to_string(),
        });
    }

    let mut seen: HashMap<String, usize> = HashMap::with_capacity(collection.features.len());
    let mut wards = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.iter().enumerate() {
        let ward = parse_feature(index, feature, keys)?;

        if let Some(first) = seen.insert(ward.id.clone(), index) {
            return Err(WardError::SchemaError {
                index,
                message: format!(
                    "duplicate ward identifier '{}' (first seen in feature #{})",
                    ward.id, first
                ),
            });
        }

        wards.push(ward);
    }

    debug!("Parsed {} ward features from {}", wards.len(), location);
    Ok(wards)
}

fn parse_feature(index: usize, feature: &Value, keys: &PropertyKeys) -> Result<Ward> {
    let schema_error = |message: String| WardError::SchemaError { index, message };

    let feature = feature
        .as_object()
        .ok_or_else(|| schema_error("feature is not a JSON object".to_string()))?;

    let properties = lowercase_properties(feature.get("properties"));

    let id = properties
        .get(&keys.id)
        .and_then(scalar_to_string)
        .ok_or_else(|| schema_error(format!("missing identifier property '{}'", keys.id)))?;

    let geometry = match feature.get("geometry") {
        None | Some(Value::Null) => {
            return Err(schema_error(format!("ward '{}' has no geometry", id)));
        }
        Some(geometry) => parse_geometry(geometry).map_err(|message| {
            schema_error(format!("ward '{}' has invalid geometry: {}", id, message))
        })?,
    };

    let name = properties.get(&keys.name).and_then(scalar_to_string);

    let attributes: BTreeMap<String, String> = properties
        .iter()
        .filter(|(key, _)| **key != keys.id && **key != keys.name)
        .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key.clone(), v)))
        .collect();

    Ok(Ward {
        id,
        name,
        geometry,
        attributes,
    })
}

fn lowercase_properties(properties: Option<&Value>) -> BTreeMap<String, Value> {
    properties
        .and_then(Value::as_object)
        .map(|map: &Map<String, Value>| {
            map.iter()
                .map(|(key, value)| (key.trim().to_lowercase(), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Strings, numbers and booleans become trimmed text, anything else is absent
fn scalar_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };

    (!text.is_empty()).then_some(text)
}

fn parse_geometry(geometry: &Value) -> std::result::Result<MultiPolygon<f64>, String> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry has no type")?;
    let coordinates = geometry
        .get("coordinates")
        .cloned()
        .ok_or("geometry has no coordinates")?;

    let polygons: Vec<Vec<Ring>> = match kind {
        "Polygon" => {
            let rings: Vec<Ring> = serde_json::from_value(coordinates)
                .map_err(|e| format!("malformed Polygon coordinates: {}", e))?;
            vec![rings]
        }
        "MultiPolygon" => serde_json::from_value(coordinates)
            .map_err(|e| format!("malformed MultiPolygon coordinates: {}", e))?,
        other => return Err(format!("unsupported geometry type '{}'", other)),
    };

    if polygons.is_empty() {
        return Err("geometry contains no polygons".to_string());
    }

    polygons
        .into_iter()
        .map(build_polygon)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(MultiPolygon::new)
}

fn build_polygon(rings: Vec<Ring>) -> std::result::Result<Polygon<f64>, String> {
    let mut rings = rings.into_iter();
    let exterior = rings.next().ok_or("polygon has no rings")?;
    let exterior = build_ring(exterior)?;
    let interiors = rings.map(build_ring).collect::<std::result::Result<Vec<_>, _>>()?;

    // Polygon::new closes any ring whose last position differs from its first
    Ok(Polygon::new(exterior, interiors))
}

fn build_ring(positions: Ring) -> std::result::Result<LineString<f64>, String> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(positions.len());

    for position in positions {
        // Altitude and any further values are ignored
        let (lon, lat) = match position.as_slice() {
            [lon, lat, ..] => (*lon, *lat),
            _ => {
                return Err(format!(
                    "position has {} values, expected longitude and latitude",
                    position.len()
                ));
            }
        };
        coords.push(checked_coord(lon, lat)?);
    }

    let mut distinct = coords.clone();
    distinct.dedup();
    if distinct.first() == distinct.last() && distinct.len() > 1 {
        distinct.pop();
    }
    if distinct.len() < 3 {
        return Err(format!(
            "ring has {} distinct positions, at least 3 are required",
            distinct.len()
        ));
    }

    Ok(LineString::new(coords))
}

fn checked_coord(lon: f64, lat: f64) -> std::result::Result<Coord<f64>, String> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err("coordinate is not a finite number".to_string());
    }
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("coordinate ({}, {}) is out of range", lon, lat));
    }
    Ok(Coord { x: lon, y: lat })
}
