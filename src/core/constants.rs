//! Physical constants and scene defaults

/// Earth semi-major axis in meters (WGS84)
pub const EARTH_RADIUS_WGS84: f64 = 6378137.0;

/// Earth flattening factor (WGS84)
pub const EARTH_FLATTENING_WGS84: f64 = 1.0 / 298.257223563;

/// Eccentricity squared (WGS84)
pub const ECCENTRICITY_SQUARED_WGS84: f64 =
    2.0 * EARTH_FLATTENING_WGS84 - EARTH_FLATTENING_WGS84 * EARTH_FLATTENING_WGS84;

/// Mean Earth radius used for great-circle distances (meters)
pub const EARTH_MEAN_RADIUS: f64 = 6_371_000.0;

/// Horizontal scene radius (meters) inside which nodes and estimates are kept live
pub const SCENE_LIMIT: f64 = 100.0;

/// Smallest distance fed to a scaling function (meters)
pub const MIN_DISTANCE_EPSILON: f64 = 0.01;

/// Bounds on any scale factor the scaling policy produces
pub const MIN_SCALE: f32 = 1e-3;
pub const MAX_SCALE: f32 = 1e4;

/// Source content pixels per scene unit for annotation planes
pub const PIXELS_PER_SCENE_UNIT: f32 = 100.0;

/// Default vertical offset factor for annotation labels
pub const DEFAULT_HEIGHT_ADJUSTMENT_FACTOR: f64 = 1.1;

/// Default animation duration for non-setup updates (seconds)
pub const DEFAULT_ANIMATION_DURATION_SECS: f64 = 0.1;
