use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::algorithms::{DistanceClamp, GeoProjector, RenderOrderPolicy, ScalingSchemeConfig};
use crate::core::{DEFAULT_ANIMATION_DURATION_SECS, DEFAULT_HEIGHT_ADJUSTMENT_FACTOR, SCENE_LIMIT};
use crate::processing::EstimatePolicy;
use crate::scene::{LocationEstimateMethod, NodeOptions};

/// Scene-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Estimate history retention
    #[serde(default)]
    pub estimates: EstimatePolicy,
    /// Geo-to-scene projection
    #[serde(default)]
    pub projection: GeoProjector,
    /// Options given to nodes built through the session's node constructors
    #[serde(default)]
    pub node_defaults: NodeDefaults,
    /// Automatic location confirmation
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
}

/// Default per-node settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefaults {
    /// Label offset in multiples of its scale
    pub height_adjustment_factor: f64,
    /// Animation length for non-setup updates (seconds)
    pub animation_duration_secs: f64,
    /// Clamp applied to the distance before scaling
    pub distance_clamp: DistanceClamp,
    pub scaling_scheme: ScalingSchemeConfig,
    pub render_order: RenderOrderPolicy,
    pub scale_relative_to_distance: bool,
    pub continually_update_position_and_scale: bool,
    pub estimate_method: LocationEstimateMethod,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            height_adjustment_factor: DEFAULT_HEIGHT_ADJUSTMENT_FACTOR,
            animation_duration_secs: DEFAULT_ANIMATION_DURATION_SECS,
            distance_clamp: DistanceClamp::default(),
            scaling_scheme: ScalingSchemeConfig::default(),
            render_order: RenderOrderPolicy::default(),
            scale_relative_to_distance: false,
            continually_update_position_and_scale: true,
            estimate_method: LocationEstimateMethod::default(),
        }
    }
}

impl NodeDefaults {
    /// Node options carrying these defaults
    pub fn node_options(&self, ignore_altitude: bool) -> NodeOptions {
        NodeOptions {
            height_adjustment_factor: self.height_adjustment_factor,
            scaling_scheme: self.scaling_scheme.clone().into(),
            scale_relative_to_distance: self.scale_relative_to_distance,
            distance_clamp: self.distance_clamp,
            render_order: self.render_order,
            animation_duration: self.animation_duration_secs,
            ignore_altitude,
            continually_update_position_and_scale: self.continually_update_position_and_scale,
            estimate_method: self.estimate_method,
        }
    }
}

/// When unconfirmed nodes get their location locked in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Run confirmation on every tick
    pub enabled: bool,
    /// Confirm nodes farther than this from the device (scene meters)
    pub distance_threshold: f64,
    /// Radius around a node in which estimates corroborate it (scene meters)
    pub confirmation_radius: f64,
    /// Estimates needed inside `confirmation_radius`; 0 disables this rule
    pub confirmation_estimate_count: usize,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            distance_threshold: SCENE_LIMIT,
            confirmation_radius: 10.0,
            confirmation_estimate_count: 5,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("failed to access config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize config: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl ConfigError {
    fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Configuration validation result
#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// First error, if any
    pub fn into_error(self) -> Option<ConfigError> {
        self.errors.into_iter().next()
    }
}

/// Holds the active scene configuration and its backing file
#[derive(Debug, Default)]
pub struct ConfigurationManager {
    scene_config: SceneConfig,
    config_file_path: Option<String>,
    is_modified: bool,
}

impl ConfigurationManager {
    /// Manager with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager loaded from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn scene_config(&self) -> &SceneConfig {
        &self.scene_config
    }

    /// Replace the whole configuration; rejected if validation finds errors
    pub fn update_config(&mut self, config: SceneConfig) -> Result<(), ConfigError> {
        let validation = Self::validate_config(&config);
        if let Some(error) = validation.into_error() {
            return Err(error);
        }

        self.scene_config = config;
        self.is_modified = true;
        Ok(())
    }

    /// Load configuration from a JSON file. Missing sections take defaults.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        let config: SceneConfig = serde_json::from_str(&content)?;

        let validation = Self::validate_config(&config);
        for warning in &validation.warnings {
            warn!(path = %path_str, "{}", warning);
        }
        if let Some(error) = validation.into_error() {
            return Err(error);
        }

        debug!(path = %path_str, "loaded scene configuration");
        self.scene_config = config;
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(&self.scene_config)?;
        fs::write(&path, content).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;

        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save to the file last loaded from or saved to
    pub fn save(&mut self) -> Result<(), ConfigError> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::Io {
                path: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no file path set"),
            }),
        }
    }

    /// Whether configuration changed since the last load or save
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    // Runtime parameter adjustment

    /// Returns the previous factor
    pub fn set_height_adjustment_factor(&mut self, factor: f64) -> Result<f64, ConfigError> {
        if !factor.is_finite() {
            return Err(ConfigError::invalid(
                "height_adjustment_factor",
                factor,
                "factor must be finite",
            ));
        }

        let old = self.scene_config.node_defaults.height_adjustment_factor;
        self.scene_config.node_defaults.height_adjustment_factor = factor;
        self.is_modified = true;
        Ok(old)
    }

    /// Returns the previous duration
    pub fn set_animation_duration(&mut self, secs: f64) -> Result<f64, ConfigError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ConfigError::invalid(
                "animation_duration_secs",
                secs,
                "duration must be a non-negative number of seconds",
            ));
        }

        let old = self.scene_config.node_defaults.animation_duration_secs;
        self.scene_config.node_defaults.animation_duration_secs = secs;
        self.is_modified = true;
        Ok(old)
    }

    /// Returns the previous clamp
    pub fn set_distance_clamp(&mut self, clamp: DistanceClamp) -> Result<DistanceClamp, ConfigError> {
        if let Some(error) = validate_clamp(&clamp) {
            return Err(error);
        }

        let old = self.scene_config.node_defaults.distance_clamp;
        self.scene_config.node_defaults.distance_clamp = clamp;
        self.is_modified = true;
        Ok(old)
    }

    pub fn set_scaling_scheme(&mut self, scheme: ScalingSchemeConfig) -> ScalingSchemeConfig {
        self.is_modified = true;
        std::mem::replace(&mut self.scene_config.node_defaults.scaling_scheme, scheme)
    }

    /// Returns the previous limit
    pub fn set_placement_limit(&mut self, limit: Option<f64>) -> Result<Option<f64>, ConfigError> {
        if let Some(limit) = limit {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(ConfigError::invalid(
                    "placement_limit",
                    limit,
                    "placement limit must be a positive distance",
                ));
            }
        }

        let old = self.scene_config.projection.placement_limit;
        self.scene_config.projection.placement_limit = limit;
        self.is_modified = true;
        Ok(old)
    }

    /// Returns the previous policy
    pub fn set_estimate_policy(&mut self, policy: EstimatePolicy) -> Result<EstimatePolicy, ConfigError> {
        let mut errors = Vec::new();
        validate_estimates(&policy, &mut errors, &mut Vec::new());
        if let Some(error) = errors.into_iter().next() {
            return Err(error);
        }

        let old = self.scene_config.estimates;
        self.scene_config.estimates = policy;
        self.is_modified = true;
        Ok(old)
    }

    pub fn set_confirmation(&mut self, confirmation: ConfirmationConfig) -> Result<ConfirmationConfig, ConfigError> {
        let mut errors = Vec::new();
        validate_confirmation(&confirmation, &mut errors, &mut Vec::new());
        if let Some(error) = errors.into_iter().next() {
            return Err(error);
        }

        let old = self.scene_config.confirmation;
        self.scene_config.confirmation = confirmation;
        self.is_modified = true;
        Ok(old)
    }

    /// Check every section, collecting errors and warnings
    pub fn validate_config(config: &SceneConfig) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        validate_estimates(&config.estimates, &mut errors, &mut warnings);

        if let Some(limit) = config.projection.placement_limit {
            if !limit.is_finite() || limit <= 0.0 {
                errors.push(ConfigError::invalid(
                    "placement_limit",
                    limit,
                    "placement limit must be a positive distance",
                ));
            } else if limit > 1000.0 {
                warnings.push("Placement limit beyond 1km may exceed the renderer's far plane".to_string());
            }
        }

        let defaults = &config.node_defaults;
        if !defaults.height_adjustment_factor.is_finite() {
            errors.push(ConfigError::invalid(
                "height_adjustment_factor",
                defaults.height_adjustment_factor,
                "factor must be finite",
            ));
        }
        if !defaults.animation_duration_secs.is_finite() || defaults.animation_duration_secs < 0.0 {
            errors.push(ConfigError::invalid(
                "animation_duration_secs",
                defaults.animation_duration_secs,
                "duration must be a non-negative number of seconds",
            ));
        } else if defaults.animation_duration_secs > 2.0 {
            warnings.push("Long animations make nodes visibly lag behind tracking".to_string());
        }
        if let Some(error) = validate_clamp(&defaults.distance_clamp) {
            errors.push(error);
        }
        if defaults.render_order.units_per_meter <= 0.0 || !defaults.render_order.units_per_meter.is_finite() {
            errors.push(ConfigError::invalid(
                "render_order.units_per_meter",
                defaults.render_order.units_per_meter,
                "units per meter must be positive",
            ));
        }

        validate_confirmation(&config.confirmation, &mut errors, &mut warnings);

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

fn validate_estimates(policy: &EstimatePolicy, errors: &mut Vec<ConfigError>, warnings: &mut Vec<String>) {
    if !(policy.scene_limit > 0.0) {
        errors.push(ConfigError::invalid(
            "estimates.scene_limit",
            policy.scene_limit,
            "scene limit must be positive",
        ));
    }
    if policy.region_radius < 0.0 || !policy.region_radius.is_finite() {
        errors.push(ConfigError::invalid(
            "estimates.region_radius",
            policy.region_radius,
            "region radius must be a non-negative distance",
        ));
    }
    if policy.max_estimates == 0 {
        errors.push(ConfigError::invalid(
            "estimates.max_estimates",
            policy.max_estimates,
            "at least one estimate must be retained",
        ));
    }
    if !(policy.max_age_secs > 0.0) {
        errors.push(ConfigError::invalid(
            "estimates.max_age_secs",
            policy.max_age_secs,
            "maximum age must be positive",
        ));
    } else if policy.max_age_secs < policy.newer_margin_secs {
        warnings.push("Estimates expire before a newer sample can supersede them".to_string());
    }
}

fn validate_confirmation(config: &ConfirmationConfig, errors: &mut Vec<ConfigError>, warnings: &mut Vec<String>) {
    if !(config.distance_threshold > 0.0) {
        errors.push(ConfigError::invalid(
            "confirmation.distance_threshold",
            config.distance_threshold,
            "threshold must be a positive distance",
        ));
    }
    if config.confirmation_radius < 0.0 || !config.confirmation_radius.is_finite() {
        errors.push(ConfigError::invalid(
            "confirmation.confirmation_radius",
            config.confirmation_radius,
            "radius must be a non-negative distance",
        ));
    }
    if config.enabled && config.confirmation_estimate_count == 1 {
        warnings.push("A single estimate confirms nodes as soon as they are placed".to_string());
    }
}

fn validate_clamp(clamp: &DistanceClamp) -> Option<ConfigError> {
    if !clamp.min.is_finite() || clamp.min < 0.0 {
        return Some(ConfigError::invalid(
            "distance_clamp.min",
            clamp.min,
            "minimum must be a non-negative distance",
        ));
    }
    if clamp.max.is_nan() || clamp.max < clamp.min {
        return Some(ConfigError::invalid(
            "distance_clamp.max",
            clamp.max,
            "maximum must not be below the minimum",
        ));
    }
    None
}
