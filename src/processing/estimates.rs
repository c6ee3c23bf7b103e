//! Rolling history of scene/location pairings
//!
//! Written from the location callback and read from the render tick, possibly
//! on different threads. All access goes through one `RwLock`, so a reader
//! never observes a half-applied add/evict. Delegate notifications are sent
//! after the lock is released.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::api::delegate::SceneLocationEstimateDelegate;
use crate::core::{GeoLocation, LocationEstimate, SceneVector, SCENE_LIMIT};

/// Store handle shared between the ingestion path and the tick path
pub type SharedEstimateStore = Arc<EstimateStore>;

/// Retention and dominance rules for the estimate history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatePolicy {
    /// Samples closer than this (scene meters, horizontal) cover the same region
    pub region_radius: f64,
    /// Confidence difference that counts as materially better
    pub confidence_margin: f64,
    /// Age difference (seconds) after which a newer sample wins regardless of confidence
    pub newer_margin_secs: f64,
    /// Samples older than this relative to the newest one are dropped
    pub max_age_secs: f64,
    /// Hard cap on stored samples
    pub max_estimates: usize,
    /// Samples farther than this from the device (scene meters, horizontal) are dropped
    pub scene_limit: f64,
}

impl Default for EstimatePolicy {
    fn default() -> Self {
        Self {
            region_radius: 5.0,
            confidence_margin: 0.05,
            newer_margin_secs: 10.0,
            max_age_secs: 120.0,
            max_estimates: 256,
            scene_limit: SCENE_LIMIT,
        }
    }
}

impl EstimatePolicy {
    /// Whether `a` supersedes `b`
    pub fn dominates(&self, a: &LocationEstimate, b: &LocationEstimate) -> bool {
        if horizontal_distance(&a.scene_position, &b.scene_position) > self.region_radius as f32 {
            return false;
        }

        let age_gap = a.location.timestamp() - b.location.timestamp();
        let confidence_gap = a.confidence - b.confidence;

        confidence_gap >= self.confidence_margin
            || age_gap >= self.newer_margin_secs
            || (confidence_gap.abs() < self.confidence_margin && age_gap >= 0.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct StoredEstimate {
    estimate: LocationEstimate,
    sequence: u64,
}

#[derive(Debug, Default)]
struct EstimateHistory {
    entries: Vec<StoredEstimate>,
    next_sequence: u64,
    latest: Option<GeoLocation>,
}

/// Thread-safe estimate history with a derived best estimate
pub struct EstimateStore {
    policy: RwLock<EstimatePolicy>,
    history: RwLock<EstimateHistory>,
    delegate: RwLock<Option<Arc<dyn SceneLocationEstimateDelegate>>>,
}

impl Default for EstimateStore {
    fn default() -> Self {
        Self::new(EstimatePolicy::default())
    }
}

impl EstimateStore {
    pub fn new(policy: EstimatePolicy) -> Self {
        Self {
            policy: RwLock::new(policy),
            history: RwLock::new(EstimateHistory::default()),
            delegate: RwLock::new(None),
        }
    }

    /// New store behind a shared handle
    pub fn shared(policy: EstimatePolicy) -> SharedEstimateStore {
        Arc::new(Self::new(policy))
    }

    pub fn policy(&self) -> EstimatePolicy {
        *self.policy.read()
    }

    /// Replace the retention rules; applied from the next add or eviction
    pub fn set_policy(&self, policy: EstimatePolicy) {
        *self.policy.write() = policy;
    }

    pub fn set_delegate(&self, delegate: Option<Arc<dyn SceneLocationEstimateDelegate>>) {
        *self.delegate.write() = delegate;
    }

    /// Store a sample taken at `scene_position`, evicting whatever it supersedes.
    ///
    /// Returns `false` when the sample is unusable, or already too old relative
    /// to the newest stored sample, and was not stored.
    pub fn add_estimate(&self, scene_position: SceneVector, location: GeoLocation, confidence: f64) -> bool {
        let scene_finite = scene_position.iter().all(|c| c.is_finite());
        if !scene_finite || !location.is_finite() || !confidence.is_finite() || confidence <= 0.0 {
            warn!(%location, confidence, "rejecting unusable location estimate");
            return false;
        }

        let estimate = LocationEstimate::new(scene_position, location, confidence);
        let policy = self.policy();

        let removed = {
            let mut history = self.history.write();
            let newest_stored = history
                .entries
                .iter()
                .map(|s| s.estimate.location.timestamp())
                .fold(f64::NEG_INFINITY, f64::max);
            if newest_stored - location.timestamp() > policy.max_age_secs {
                drop(history);
                debug!(%location, "rejecting location estimate older than the history window");
                return false;
            }

            let sequence = history.next_sequence;
            history.next_sequence += 1;
            let is_newer = history
                .latest
                .map_or(true, |latest| location.timestamp() >= latest.timestamp());
            if is_newer {
                history.latest = Some(location);
            }

            let mut removed = Vec::new();
            history.entries.retain(|stored| {
                let keep = !policy.dominates(&estimate, &stored.estimate);
                if !keep {
                    removed.push(stored.estimate);
                }
                keep
            });
            history.entries.push(StoredEstimate { estimate, sequence });

            let newest = history
                .entries
                .iter()
                .map(|s| s.estimate.location.timestamp())
                .fold(f64::NEG_INFINITY, f64::max);
            history.entries.retain(|stored| {
                let keep = newest - stored.estimate.location.timestamp() <= policy.max_age_secs;
                if !keep {
                    removed.push(stored.estimate);
                }
                keep
            });

            let max_estimates = policy.max_estimates.max(1);
            while history.entries.len() > max_estimates {
                // entries stay in insertion order
                let evicted = history.entries.remove(0);
                removed.push(evicted.estimate);
            }

            removed
        };

        debug!(
            %location,
            confidence,
            evicted = removed.len(),
            "added location estimate"
        );

        if let Some(delegate) = self.delegate() {
            delegate.did_add_estimate(&scene_position, &location);
            for old in &removed {
                delegate.did_remove_estimate(&old.scene_position, &old.location);
            }
        }

        true
    }

    /// Store a sample with confidence derived from its horizontal accuracy
    pub fn add_location(&self, scene_position: SceneVector, location: GeoLocation) -> bool {
        let confidence = LocationEstimate::confidence_from_accuracy(location.horizontal_accuracy());
        self.add_estimate(scene_position, location, confidence)
    }

    /// Highest confidence sample; ties go to the newer one. `None` when empty.
    pub fn best_estimate(&self) -> Option<LocationEstimate> {
        let history = self.history.read();
        history
            .entries
            .iter()
            .max_by(|a, b| {
                a.estimate
                    .confidence
                    .total_cmp(&b.estimate.confidence)
                    .then_with(|| {
                        a.estimate
                            .location
                            .timestamp()
                            .total_cmp(&b.estimate.location.timestamp())
                    })
                    .then_with(|| a.sequence.cmp(&b.sequence))
            })
            .map(|stored| stored.estimate)
    }

    /// Newest raw sample by timestamp
    pub fn latest_location(&self) -> Option<GeoLocation> {
        self.history.read().latest
    }

    /// Drop samples too far from the device to still be trusted.
    /// Returns the number removed.
    pub fn evict_out_of_range(&self, current_scene_position: &SceneVector) -> usize {
        let limit = self.policy().scene_limit as f32;

        let removed: Vec<LocationEstimate> = {
            let mut history = self.history.write();
            let mut removed = Vec::new();
            history.entries.retain(|stored| {
                let keep = horizontal_distance(current_scene_position, &stored.estimate.scene_position) <= limit;
                if !keep {
                    removed.push(stored.estimate);
                }
                keep
            });
            removed
        };

        if !removed.is_empty() {
            trace!(count = removed.len(), "evicted out-of-range estimates");
            if let Some(delegate) = self.delegate() {
                for old in &removed {
                    delegate.did_remove_estimate(&old.scene_position, &old.location);
                }
            }
        }

        removed.len()
    }

    /// Number of samples within `radius` scene meters (horizontal) of `scene_position`
    pub fn estimates_near(&self, scene_position: &SceneVector, radius: f64) -> usize {
        self.history
            .read()
            .entries
            .iter()
            .filter(|s| horizontal_distance(scene_position, &s.estimate.scene_position) <= radius as f32)
            .count()
    }

    /// Snapshot of every stored sample, oldest first
    pub fn estimates(&self) -> Vec<LocationEstimate> {
        self.history.read().entries.iter().map(|s| s.estimate).collect()
    }

    pub fn len(&self) -> usize {
        self.history.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.read().entries.is_empty()
    }

    /// Remove every sample, notifying the delegate for each
    pub fn clear(&self) {
        let removed: Vec<StoredEstimate> = {
            let mut history = self.history.write();
            history.latest = None;
            std::mem::take(&mut history.entries)
        };

        if let Some(delegate) = self.delegate() {
            for old in &removed {
                delegate.did_remove_estimate(&old.estimate.scene_position, &old.estimate.location);
            }
        }
    }

    fn delegate(&self) -> Option<Arc<dyn SceneLocationEstimateDelegate>> {
        self.delegate.read().clone()
    }
}

fn horizontal_distance(a: &SceneVector, b: &SceneVector) -> f32 {
    (a.x - b.x).hypot(a.z - b.z)
}
