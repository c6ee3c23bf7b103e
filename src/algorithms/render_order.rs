//! Distance to rendering order mapping

use serde::{Deserialize, Serialize};

/// Farther nodes get a lower order so they are drawn first (behind nearer ones)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderOrderPolicy {
    /// Order assigned at distance 0
    pub base: i64,
    /// Order steps per meter of distance
    pub units_per_meter: f64,
}

impl Default for RenderOrderPolicy {
    fn default() -> Self {
        Self {
            base: i64::MAX - 1000,
            units_per_meter: 1000.0,
        }
    }
}

impl RenderOrderPolicy {
    /// Non-increasing in `distance`; NaN sorts as infinitely far
    pub fn order(&self, distance: f64) -> i64 {
        let distance = if distance.is_nan() { f64::INFINITY } else { distance.max(0.0) };
        // float -> int casts saturate
        let steps = (distance * self.units_per_meter.abs()).round() as i64;
        self.base.saturating_sub(steps)
    }
}
