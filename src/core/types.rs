//! Core data types for geo-anchored scene placement

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::algorithms::projection::{self, LocationTranslation};

/// Scene-space vector (meters). X = east, Y = up, -Z = north.
pub type SceneVector = Vector3<f32>;

/// A single real-world location sample.
///
/// Values are fixed once sampled; the builder methods return new copies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    horizontal_accuracy: f64,
    vertical_accuracy: f64,
    timestamp: f64,
}

impl GeoLocation {
    /// Location at the given coordinates with zero altitude, exact accuracy and timestamp 0
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: 0.0,
            horizontal_accuracy: 0.0,
            vertical_accuracy: 0.0,
            timestamp: 0.0,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    pub fn with_accuracy(mut self, horizontal: f64, vertical: f64) -> Self {
        self.horizontal_accuracy = horizontal;
        self.vertical_accuracy = vertical;
        self
    }

    /// Sample time in seconds
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    pub fn horizontal_accuracy(&self) -> f64 {
        self.horizontal_accuracy
    }

    pub fn vertical_accuracy(&self) -> f64 {
        self.vertical_accuracy
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Whether every field is finite
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.altitude.is_finite()
            && self.horizontal_accuracy.is_finite()
            && self.vertical_accuracy.is_finite()
            && self.timestamp.is_finite()
    }

    /// Great-circle distance in meters, altitude ignored
    pub fn distance_to(&self, other: &GeoLocation) -> f64 {
        projection::haversine_distance(self, other)
    }

    /// North/east/up offset in meters from this location to `other`
    pub fn translation_to(&self, other: &GeoLocation) -> LocationTranslation {
        projection::translation_between(self, other)
    }

    /// Location reached by moving `translation` meters from here.
    /// Accuracy and timestamp are carried over.
    pub fn translated_by(&self, translation: &LocationTranslation) -> GeoLocation {
        let (latitude, longitude) = projection::offset_coordinates(self, translation);
        GeoLocation {
            latitude,
            longitude,
            altitude: self.altitude + translation.altitude_translation,
            ..*self
        }
    }
}

impl std::fmt::Display for GeoLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}, {:.1}m ±{:.1}m)",
            self.latitude, self.longitude, self.altitude, self.horizontal_accuracy
        )
    }
}

/// "At scene position P the device was at location L, with confidence C."
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationEstimate {
    pub scene_position: SceneVector,
    pub location: GeoLocation,
    pub confidence: f64,
}

impl LocationEstimate {
    pub fn new(scene_position: SceneVector, location: GeoLocation, confidence: f64) -> Self {
        Self {
            scene_position,
            location,
            confidence,
        }
    }

    /// Estimate whose confidence is derived from the sample's horizontal accuracy
    pub fn from_location(scene_position: SceneVector, location: GeoLocation) -> Self {
        let confidence = Self::confidence_from_accuracy(location.horizontal_accuracy());
        Self::new(scene_position, location, confidence)
    }

    /// Confidence in (0, 1]; a negative accuracy marks an invalid fix and maps to 0
    pub fn confidence_from_accuracy(horizontal_accuracy: f64) -> f64 {
        if !horizontal_accuracy.is_finite() || horizontal_accuracy < 0.0 {
            return 0.0;
        }
        1.0 / (1.0 + horizontal_accuracy)
    }

    /// Geo location this estimate implies for another scene position
    pub fn translated_location(&self, to: &SceneVector) -> GeoLocation {
        let delta = to - self.scene_position;
        let translation = LocationTranslation {
            latitude_translation: -delta.z as f64,
            longitude_translation: delta.x as f64,
            altitude_translation: delta.y as f64,
        };
        self.location.translated_by(&translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builder_keeps_fields() {
        let location = GeoLocation::new(51.5, -0.12)
            .with_altitude(20.0)
            .with_accuracy(5.0, 3.0)
            .with_timestamp(42.0);

        assert_eq!(location.latitude(), 51.5);
        assert_eq!(location.longitude(), -0.12);
        assert_eq!(location.altitude(), 20.0);
        assert_eq!(location.horizontal_accuracy(), 5.0);
        assert_eq!(location.vertical_accuracy(), 3.0);
        assert_eq!(location.timestamp(), 42.0);
        assert!(location.is_finite());
    }

    #[test]
    fn test_confidence_from_accuracy() {
        assert_eq!(LocationEstimate::confidence_from_accuracy(0.0), 1.0);
        assert_relative_eq!(LocationEstimate::confidence_from_accuracy(4.0), 0.2);
        assert_eq!(LocationEstimate::confidence_from_accuracy(-1.0), 0.0);
        assert_eq!(LocationEstimate::confidence_from_accuracy(f64::NAN), 0.0);
    }

    #[test]
    fn test_translated_location_follows_scene_axes() {
        let origin = GeoLocation::new(0.0, 0.0).with_altitude(10.0);
        let estimate = LocationEstimate::from_location(SceneVector::zeros(), origin);

        // 100m north (-Z), 2m up
        let moved = estimate.translated_location(&SceneVector::new(0.0, 2.0, -100.0));
        assert!(moved.latitude() > 0.0);
        assert_relative_eq!(moved.longitude(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(moved.altitude(), 12.0, epsilon = 1e-6);
        assert_relative_eq!(origin.distance_to(&moved), 100.0, epsilon = 1.0);
    }
}
