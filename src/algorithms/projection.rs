//! Geo-to-scene projection
//!
//! Maps geodetic locations into scene space relative to a location estimate.
//! Uses a local tangent plane at the estimate's latitude, which is accurate
//! well below a meter over the sub-kilometer ranges an AR scene covers:
//! - WGS84 meridional / prime-vertical radii of curvature
//! - Scene X = east, Y = altitude difference, Z = -north
//! - Optional pull-in of distant nodes to a placement limit

use serde::{Deserialize, Serialize};

use crate::api::types::{GeoArError, GeoArResult};
use crate::core::{
    GeoLocation, LocationEstimate, SceneVector, EARTH_MEAN_RADIUS, EARTH_RADIUS_WGS84,
    ECCENTRICITY_SQUARED_WGS84, SCENE_LIMIT,
};

/// Offset between two locations, in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationTranslation {
    /// Positive north
    pub latitude_translation: f64,
    /// Positive east
    pub longitude_translation: f64,
    /// Positive up
    pub altitude_translation: f64,
}

impl LocationTranslation {
    pub fn horizontal_distance(&self) -> f64 {
        self.latitude_translation.hypot(self.longitude_translation)
    }

    /// Scene-space vector for this translation
    pub fn to_scene(&self) -> SceneVector {
        SceneVector::new(
            self.longitude_translation as f32,
            self.altitude_translation as f32,
            -self.latitude_translation as f32,
        )
    }
}

/// Result of placing a location into the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Scene position of the node
    pub position: SceneVector,
    /// Horizontal distance from the estimate anchor before any pull-in (meters)
    pub distance: f64,
    /// Factor applied to pull the node inside the placement limit (1 when not pulled in)
    pub placement_scale: f32,
}

/// Pure geo-to-scene projector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoProjector {
    /// Distant nodes are brought in to this horizontal range; `None` disables it
    pub placement_limit: Option<f64>,
    /// Map every altitude difference to scene Y = 0
    pub ignore_altitude: bool,
}

impl Default for GeoProjector {
    fn default() -> Self {
        Self {
            placement_limit: Some(SCENE_LIMIT),
            ignore_altitude: false,
        }
    }
}

impl GeoProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placement_limit(mut self, limit: Option<f64>) -> Self {
        self.placement_limit = limit;
        self
    }

    pub fn with_ignore_altitude(mut self, ignore_altitude: bool) -> Self {
        self.ignore_altitude = ignore_altitude;
        self
    }

    /// Scene offset of `node_location` from the anchor implied by `from`
    pub fn project(&self, node_location: &GeoLocation, from: &LocationEstimate) -> SceneVector {
        self.translation(node_location, from).to_scene()
    }

    /// Scene position of `node_location`, pulled in to the placement limit if needed
    pub fn place(&self, node_location: &GeoLocation, from: &LocationEstimate) -> Placement {
        let translation = self.translation(node_location, from);
        let distance = translation.horizontal_distance();

        let placement_scale = match self.placement_limit {
            Some(limit) if limit > 0.0 && distance > limit => (limit / distance) as f32,
            _ => 1.0,
        };

        Placement {
            position: from.scene_position + translation.to_scene() * placement_scale,
            distance,
            placement_scale,
        }
    }

    fn translation(&self, node_location: &GeoLocation, from: &LocationEstimate) -> LocationTranslation {
        let mut translation = translation_between(&from.location, node_location);
        if self.ignore_altitude {
            translation.altitude_translation = 0.0;
        }
        translation
    }
}

/// Meridional (M) and prime-vertical (N) radii of curvature at a latitude
fn radii_of_curvature(latitude_deg: f64) -> (f64, f64) {
    let lat_rad = latitude_deg.to_radians();
    let denom = 1.0 - ECCENTRICITY_SQUARED_WGS84 * lat_rad.sin().powi(2);

    let n = EARTH_RADIUS_WGS84 / denom.sqrt();
    let m = EARTH_RADIUS_WGS84 * (1.0 - ECCENTRICITY_SQUARED_WGS84) / denom.powf(1.5);
    (m, n)
}

/// Local tangent plane translation from `from` to `to`
pub fn translation_between(from: &GeoLocation, to: &GeoLocation) -> LocationTranslation {
    let (m, n) = radii_of_curvature(from.latitude());
    let lat_diff = (to.latitude() - from.latitude()).to_radians();
    let lon_diff = wrap_longitude(to.longitude() - from.longitude()).to_radians();

    LocationTranslation {
        latitude_translation: m * lat_diff,
        longitude_translation: n * from.latitude().to_radians().cos() * lon_diff,
        altitude_translation: to.altitude() - from.altitude(),
    }
}

/// Latitude/longitude reached by applying `translation` at `from`
pub fn offset_coordinates(from: &GeoLocation, translation: &LocationTranslation) -> (f64, f64) {
    let (m, n) = radii_of_curvature(from.latitude());
    let cos_lat = from.latitude().to_radians().cos();

    let lat_diff = translation.latitude_translation / m;
    // Longitude is degenerate at the poles; keep it unchanged there
    let lon_diff = if cos_lat.abs() < 1e-12 {
        0.0
    } else {
        translation.longitude_translation / (n * cos_lat)
    };

    (
        from.latitude() + lat_diff.to_degrees(),
        wrap_longitude(from.longitude() + lon_diff.to_degrees()),
    )
}

/// Haversine great-circle distance (meters)
pub fn haversine_distance(a: &GeoLocation, b: &GeoLocation) -> f64 {
    let d_lat = (b.latitude() - a.latitude()).to_radians();
    let d_lon = wrap_longitude(b.longitude() - a.longitude()).to_radians();

    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();

    let h = (d_lat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    EARTH_MEAN_RADIUS * c
}

fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Reject coordinates a location source should never produce
pub fn validate_location(location: &GeoLocation) -> GeoArResult<()> {
    if !location.is_finite() {
        return Err(GeoArError::InvalidLocation {
            reason: "non-finite coordinate".to_string(),
        });
    }

    if location.latitude() < -90.0 || location.latitude() > 90.0 {
        return Err(GeoArError::InvalidLocation {
            reason: format!("latitude {} outside [-90, 90]", location.latitude()),
        });
    }

    if location.longitude() < -180.0 || location.longitude() > 180.0 {
        return Err(GeoArError::InvalidLocation {
            reason: format!("longitude {} outside [-180, 180]", location.longitude()),
        });
    }

    Ok(())
}
