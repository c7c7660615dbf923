// Point-in-ward resolution


use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{BoundingRect, Coord, Intersects, Rect};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::boundaries::{Ward, WardSet};
use crate::{Result, WardError};

/// A WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    #[inline]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    #[inline]
    fn to_coord(self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// Finds the ward containing a point
///
/// Bounding rectangles are computed once up front; a ward whose rectangle
/// does not cover the point is never tested against its polygons.
#[derive(Debug, Clone)]
pub struct SpatialLocator {
    wards: Arc<WardSet>,
    bounds: Vec<Option<Rect<f64>>>,
}

impl SpatialLocator {
    #[inline]
    pub fn new(wards: Arc<WardSet>) -> Self {
        let bounds = wards
            .wards
            .iter()
            .map(|ward| ward.geometry.bounding_rect())
            .collect();

        Self { wards, bounds }
    }

    #[inline]
    pub fn wards(&self) -> &WardSet {
        &self.wards
    }

    /// Every ward whose geometry contains the point, boundary included
    #[inline]
    pub fn containing(&self, point: Coordinates) -> Vec<&Ward> {
        self.positioned(point)
            .into_iter()
            .map(|(ward, _)| ward)
            .collect()
    }

    /// Candidates that survive the bounding-box check, with where the point falls
    fn positioned(&self, point: Coordinates) -> Vec<(&Ward, CoordPos)> {
        let coord = point.to_coord();

        self.wards
            .wards
            .iter()
            .zip(&self.bounds)
            .filter(|(_, rect)| rect.is_some_and(|rect| rect.intersects(&coord)))
            .map(|(ward, _)| (ward, ward.geometry.coordinate_position(&coord)))
            .filter(|(_, position)| *position != CoordPos::Outside)
            .collect()
    }

    /// The single ward containing the point
    ///
    /// Adjacent wards share edges, so a point on a shared edge goes to the
    /// first ward in source order. Only interiors that overlap are ambiguous.
    #[inline]
    pub fn locate(&self, point: Coordinates) -> Result<&Ward> {
        let matches = self.positioned(point);

        let interior: Vec<&Ward> = matches
            .iter()
            .filter(|(_, position)| *position == CoordPos::Inside)
            .map(|(ward, _)| *ward)
            .collect();

        match (interior.as_slice(), matches.first()) {
            ([ward], _) => Ok(*ward),
            ([], Some((ward, _))) => {
                if matches.len() > 1 {
                    debug!(
                        "({}, {}) is on an edge shared by {} wards, using ward {}",
                        point.latitude,
                        point.longitude,
                        matches.len(),
                        ward.id
                    );
                }
                Ok(*ward)
            }
            ([], None) => {
                debug!(
                    "No ward contains ({}, {})",
                    point.latitude, point.longitude
                );
                Err(WardError::NoContainingWard {
                    latitude: point.latitude,
                    longitude: point.longitude,
                })
            }
            (overlapping, _) => {
                let ward_ids: Vec<String> =
                    overlapping.iter().map(|ward| ward.id.clone()).collect();
                error!(
                    latitude = point.latitude,
                    longitude = point.longitude,
                    ?ward_ids,
                    "Point lies inside more than one ward, boundary data needs correction"
                );
                Err(WardError::AmbiguousContainment {
                    latitude: point.latitude,
                    longitude: point.longitude,
                    ward_ids,
                })
            }
        }
    }
}
