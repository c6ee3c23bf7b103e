//! Behavioural properties of the per-frame location node update.
//!
//! Run with: `cargo test --test update_properties`

use std::cell::Cell;
use std::sync::Arc;

use approx::assert_relative_eq;

use geo_annotations::scene::{pivot_offset, SceneNode, SkipReason};
use geo_annotations::{
    DistanceClamp, EstimateStore, GeoLocation, GeoProjector, LocationEstimate, LocationNode, LocationTranslation,
    RenderOrderPolicy, ScalingScheme, SceneVector, StaticContent, TickOutcome,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn origin() -> GeoLocation {
    GeoLocation::new(35.0, 139.0).with_accuracy(5.0, 3.0).with_timestamp(10.0)
}

fn store_at_origin() -> EstimateStore {
    let store = EstimateStore::default();
    assert!(store.add_location(SceneVector::zeros(), origin()));
    store
}

fn moved(north: f64, east: f64) -> GeoLocation {
    origin()
        .translated_by(&LocationTranslation {
            latitude_translation: north,
            longitude_translation: east,
            altitude_translation: 0.0,
        })
        .with_accuracy(0.0, 0.0)
}

fn annotated(location: GeoLocation) -> LocationNode {
    let mut node = LocationNode::with_annotation(Some(location), Arc::new(StaticContent::solid(64, 32, [0, 0, 0, 255])));
    let annotation = node.annotation_mut().expect("annotation node");
    annotation.add_child(SceneNode::new("icon"));
    annotation.add_child(SceneNode::new("caption"));
    node
}

/// Current device location as the tick computes it
fn current_location(store: &EstimateStore) -> GeoLocation {
    store
        .best_estimate()
        .expect("best estimate")
        .translated_location(&SceneVector::zeros())
}

fn tick(node: &mut LocationNode, store: &EstimateStore) -> TickOutcome {
    node.update_position_and_scale(false, Some(SceneVector::zeros()), store, &GeoProjector::new(), |_| {})
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_projection_is_deterministic() {
    let store = store_at_origin();
    let location = moved(42.0, -17.0).with_altitude(3.0);
    let projector = GeoProjector::new();
    let best = store.best_estimate().unwrap();

    let mut a = LocationNode::new(Some(location));
    let mut b = LocationNode::new(Some(location));
    tick(&mut a, &store);
    tick(&mut b, &store);

    assert_eq!(a.position(), b.position());
    assert_eq!(a.position(), projector.place(&location, &best).position);
}

#[test]
fn test_scale_positive_and_finite_at_any_distance() {
    let store = store_at_origin();
    let schemes = [
        ScalingScheme::default(),
        ScalingScheme::LinearFalloff { threshold: 30.0 },
        ScalingScheme::LinearBuffer { threshold: 30.0, buffer: 5.0 },
        ScalingScheme::custom(|d, _| (1.0 / d) as f32),
    ];

    for scheme in schemes {
        for meters in [0.0, 0.004, 1.0, 99.0, 5_000.0] {
            let mut node = annotated(moved(meters, 0.0));
            node.set_scaling_scheme(scheme.clone());
            assert!(tick(&mut node, &store).is_committed());

            let scale = node.annotation().unwrap().node().transform.scale;
            assert!(scale.iter().all(|s| *s > 0.0 && s.is_finite()), "{:?} at {}m", scheme, meters);
        }
    }
}

#[test]
fn test_render_order_non_increasing_with_distance() {
    let store = store_at_origin();
    let mut previous = i64::MAX;

    for meters in [0.0, 0.5, 5.0, 5.0004, 60.0, 250.0, 12_000.0] {
        let mut node = annotated(moved(meters, 0.0));
        tick(&mut node, &store);

        assert!(node.rendering_order() <= previous, "order rose at {}m", meters);
        assert_eq!(node.annotation().unwrap().node().rendering_order, node.rendering_order());
        previous = node.rendering_order();
    }

    assert_eq!(RenderOrderPolicy::default().order(0.0), i64::MAX - 1000);
}

#[test]
fn test_pivot_tracks_height_factor() {
    let store = store_at_origin();

    for factor in [0.0, 1.1, 2.5, -0.75] {
        let mut node = annotated(moved(25.0, 10.0));
        node.set_height_adjustment_factor(factor);
        tick(&mut node, &store);

        let scale = node.annotation().unwrap().node().transform.scale.y;
        assert_eq!(node.pivot_y(), pivot_offset(factor, scale));
        assert_eq!(node.pivot_y(), (-factor * scale as f64) as f32);
    }
}

#[test]
fn test_repeated_ticks_are_idempotent() {
    let store = store_at_origin();

    let mut plain = LocationNode::new(Some(moved(300.0, 0.0)));
    let mut normal = annotated(moved(40.0, 40.0));
    let mut relative = annotated(moved(10.0, 0.0));
    relative.set_scale_relative_to_distance(true);
    relative.set_applied_scale(SceneVector::repeat(3.0));

    for node in [&mut plain, &mut normal, &mut relative] {
        tick(node, &store);
        let first = node.scene_node().clone();
        let first_content = node.annotation().map(|a| a.node().clone());

        tick(node, &store);
        assert_eq!(node.scene_node(), &first);
        assert_eq!(node.annotation().map(|a| a.node().clone()), first_content);
    }
}

#[test]
fn test_fifty_meter_linear_scenario() {
    let store = store_at_origin();
    let location = moved(50.0, 0.0);

    let mut node = annotated(location);
    node.options_mut().distance_clamp = DistanceClamp::new(10.0, 100.0);
    assert_eq!(tick(&mut node, &store), TickOutcome::Committed);

    let distance = location.distance_to(&current_location(&store));
    assert!((distance - 50.0).abs() < 0.5);

    let expected = (0.181 * distance) as f32;
    let annotation = node.annotation().unwrap();
    assert_relative_eq!(annotation.node().transform.scale.x, expected, max_relative = 1e-5);
    for child in annotation.children() {
        assert_eq!(child.transform.scale, annotation.node().transform.scale);
    }
    assert_eq!(node.scene_node().transform.scale, SceneVector::repeat(1.0));
    assert_relative_eq!(node.pivot_y(), -1.1 * expected, max_relative = 1e-5);

    // Nearer than the clamp floor: scale stops shrinking at 10m
    let mut near = annotated(moved(2.0, 0.0));
    near.options_mut().distance_clamp = DistanceClamp::new(10.0, 100.0);
    tick(&mut near, &store);
    assert_relative_eq!(near.annotation().unwrap().node().transform.scale.x, 1.81, max_relative = 1e-5);
}

#[test]
fn test_missing_estimate_leaves_node_untouched() {
    let store = EstimateStore::default();
    let mut node = annotated(moved(20.0, 0.0));
    let before = (node.scene_node().clone(), node.annotation().unwrap().node().clone());
    let completed = Cell::new(false);

    let outcome = node.update_position_and_scale(
        false,
        Some(SceneVector::zeros()),
        &store,
        &GeoProjector::new(),
        |_| completed.set(true),
    );

    assert_eq!(outcome, TickOutcome::Skipped(SkipReason::NoBestEstimate));
    assert!(!completed.get());
    assert_eq!((node.scene_node().clone(), node.annotation().unwrap().node().clone()), before);
}

#[test]
fn test_relative_scale_pushed_to_all_children() {
    let store = store_at_origin();
    let mut node = annotated(moved(70.0, 0.0));
    node.set_scale_relative_to_distance(true);
    node.set_applied_scale(SceneVector::new(2.0, 2.0, 2.0));

    tick(&mut node, &store);

    let annotation = node.annotation().unwrap();
    assert_eq!(annotation.node().transform.scale, SceneVector::new(2.0, 2.0, 2.0));
    assert_eq!(annotation.children().len(), 2);
    for child in annotation.children() {
        assert_eq!(child.transform.scale, SceneVector::new(2.0, 2.0, 2.0));
    }
    assert_eq!(node.scene_node().transform.scale, SceneVector::repeat(1.0));
    assert_eq!(node.pivot_y(), pivot_offset(1.1, 2.0));
}

#[test]
fn test_completion_runs_after_commit() {
    let store = store_at_origin();
    let mut node = annotated(moved(15.0, 0.0));
    let seen = Cell::new(None);

    node.update_position_and_scale(true, Some(SceneVector::zeros()), &store, &GeoProjector::new(), |n| {
        seen.set(Some(n.rendering_order()))
    });

    assert_eq!(seen.get(), Some(node.rendering_order()));
}

#[test]
fn test_translated_estimate_matches_scene_offset() {
    let estimate = LocationEstimate::from_location(SceneVector::new(2.0, 0.0, 2.0), origin());
    let implied = estimate.translated_location(&SceneVector::new(2.0, 0.0, -18.0));

    assert_relative_eq!(origin().translation_to(&implied).latitude_translation, 20.0, epsilon = 1e-3);
}
