//! Distance-driven scaling policies for annotation nodes

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{MAX_SCALE, MIN_DISTANCE_EPSILON, MIN_SCALE, SCENE_LIMIT};

/// Caller-supplied `(distance, adjusted_distance) -> scale` function
pub type ScaleFn = Arc<dyn Fn(f64, f64) -> f32 + Send + Sync>;

/// Policy deciding how large a node appears at a given distance
#[derive(Clone)]
pub enum ScalingScheme {
    /// Grows linearly with the adjusted distance so far labels stay legible
    Normal {
        factor: f64,
        far_threshold: f64,
        far_multiplier: f64,
    },
    /// Scale 1 up to `threshold`, `scale` beyond it
    Tiered { threshold: f64, scale: f32 },
    /// Two thresholds, each switching to its own scale
    DoubleTiered {
        first_threshold: f64,
        first_scale: f32,
        second_threshold: f64,
        second_scale: f32,
    },
    /// Shrinks from 1 at the viewer to nothing at `threshold`
    LinearFalloff { threshold: f64 },
    /// Like `LinearFalloff`, but full size inside `buffer`
    LinearBuffer { threshold: f64, buffer: f64 },
    /// Scale is taken from the node's externally applied scale
    RelativeToViewer,
    Custom(ScaleFn),
}

impl Default for ScalingScheme {
    fn default() -> Self {
        ScalingScheme::Normal {
            factor: 0.181,
            far_threshold: 3_000.0,
            far_multiplier: 0.75,
        }
    }
}

impl fmt::Debug for ScalingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingScheme::Custom(_) => write!(f, "Custom(<fn>)"),
            other => match other.to_config() {
                Some(config) => write!(f, "{:?}", config),
                None => write!(f, "ScalingScheme"),
            },
        }
    }
}

impl ScalingScheme {
    pub fn custom<F>(func: F) -> Self
    where
        F: Fn(f64, f64) -> f32 + Send + Sync + 'static,
    {
        ScalingScheme::Custom(Arc::new(func))
    }

    pub fn is_relative_to_viewer(&self) -> bool {
        matches!(self, ScalingScheme::RelativeToViewer)
    }

    /// Scale for a node `distance` meters away.
    ///
    /// Always positive and finite: inputs are floored to `MIN_DISTANCE_EPSILON`
    /// and the output is clamped to `[MIN_SCALE, MAX_SCALE]`.
    pub fn scale(&self, distance: f64, adjusted_distance: f64) -> f32 {
        let distance = sanitize_distance(distance);
        let adjusted = sanitize_distance(adjusted_distance);

        let raw = match self {
            ScalingScheme::Normal {
                factor,
                far_threshold,
                far_multiplier,
            } => {
                let mut scale = adjusted * factor;
                if distance > *far_threshold {
                    scale *= far_multiplier;
                }
                scale as f32
            }
            ScalingScheme::Tiered { threshold, scale } => {
                if adjusted > *threshold {
                    *scale
                } else {
                    1.0
                }
            }
            ScalingScheme::DoubleTiered {
                first_threshold,
                first_scale,
                second_threshold,
                second_scale,
            } => {
                if adjusted > *second_threshold {
                    *second_scale
                } else if adjusted > *first_threshold {
                    *first_scale
                } else {
                    1.0
                }
            }
            ScalingScheme::LinearFalloff { threshold } => linear_falloff(adjusted, *threshold),
            ScalingScheme::LinearBuffer { threshold, buffer } => {
                if adjusted < buffer.abs() {
                    1.0
                } else {
                    linear_falloff(adjusted, *threshold)
                }
            }
            ScalingScheme::RelativeToViewer => 1.0,
            ScalingScheme::Custom(func) => func(distance, adjusted),
        };

        clamp_scale(raw)
    }

    /// Serializable description, `None` for custom functions
    pub fn to_config(&self) -> Option<ScalingSchemeConfig> {
        let config = match self {
            ScalingScheme::Normal {
                factor,
                far_threshold,
                far_multiplier,
            } => ScalingSchemeConfig::Normal {
                factor: *factor,
                far_threshold: *far_threshold,
                far_multiplier: *far_multiplier,
            },
            ScalingScheme::Tiered { threshold, scale } => ScalingSchemeConfig::Tiered {
                threshold: *threshold,
                scale: *scale,
            },
            ScalingScheme::DoubleTiered {
                first_threshold,
                first_scale,
                second_threshold,
                second_scale,
            } => ScalingSchemeConfig::DoubleTiered {
                first_threshold: *first_threshold,
                first_scale: *first_scale,
                second_threshold: *second_threshold,
                second_scale: *second_scale,
            },
            ScalingScheme::LinearFalloff { threshold } => ScalingSchemeConfig::LinearFalloff {
                threshold: *threshold,
            },
            ScalingScheme::LinearBuffer { threshold, buffer } => ScalingSchemeConfig::LinearBuffer {
                threshold: *threshold,
                buffer: *buffer,
            },
            ScalingScheme::RelativeToViewer => ScalingSchemeConfig::RelativeToViewer,
            ScalingScheme::Custom(_) => return None,
        };
        Some(config)
    }
}

fn linear_falloff(adjusted: f64, threshold: f64) -> f32 {
    let threshold = threshold.abs().max(MIN_DISTANCE_EPSILON);
    (1.0 - adjusted.abs() / threshold).max(0.0) as f32
}

fn sanitize_distance(distance: f64) -> f64 {
    if distance.is_nan() {
        MIN_DISTANCE_EPSILON
    } else {
        distance.abs().max(MIN_DISTANCE_EPSILON)
    }
}

fn clamp_scale(scale: f32) -> f32 {
    if scale.is_nan() {
        MIN_SCALE
    } else {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    }
}

/// Serializable form of every scheme except `Custom`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalingSchemeConfig {
    Normal {
        factor: f64,
        far_threshold: f64,
        far_multiplier: f64,
    },
    Tiered {
        threshold: f64,
        scale: f32,
    },
    DoubleTiered {
        first_threshold: f64,
        first_scale: f32,
        second_threshold: f64,
        second_scale: f32,
    },
    LinearFalloff {
        threshold: f64,
    },
    LinearBuffer {
        threshold: f64,
        buffer: f64,
    },
    RelativeToViewer,
}

impl Default for ScalingSchemeConfig {
    fn default() -> Self {
        ScalingScheme::default()
            .to_config()
            .unwrap_or(ScalingSchemeConfig::RelativeToViewer)
    }
}

impl From<ScalingSchemeConfig> for ScalingScheme {
    fn from(config: ScalingSchemeConfig) -> Self {
        match config {
            ScalingSchemeConfig::Normal {
                factor,
                far_threshold,
                far_multiplier,
            } => ScalingScheme::Normal {
                factor,
                far_threshold,
                far_multiplier,
            },
            ScalingSchemeConfig::Tiered { threshold, scale } => ScalingScheme::Tiered { threshold, scale },
            ScalingSchemeConfig::DoubleTiered {
                first_threshold,
                first_scale,
                second_threshold,
                second_scale,
            } => ScalingScheme::DoubleTiered {
                first_threshold,
                first_scale,
                second_threshold,
                second_scale,
            },
            ScalingSchemeConfig::LinearFalloff { threshold } => ScalingScheme::LinearFalloff { threshold },
            ScalingSchemeConfig::LinearBuffer { threshold, buffer } => {
                ScalingScheme::LinearBuffer { threshold, buffer }
            }
            ScalingSchemeConfig::RelativeToViewer => ScalingScheme::RelativeToViewer,
        }
    }
}

/// Clamp producing the distance used for scale computation only
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceClamp {
    pub min: f64,
    pub max: f64,
}

impl Default for DistanceClamp {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: SCENE_LIMIT,
        }
    }
}

impl DistanceClamp {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Distance clamped into `[max(min, epsilon), max]`
    pub fn apply(&self, distance: f64) -> f64 {
        let lo = self.min.max(MIN_DISTANCE_EPSILON);
        let hi = self.max.max(lo);
        sanitize_distance(distance).clamp(lo, hi)
    }
}
