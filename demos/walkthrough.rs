//! Simulated walk past a few labelled landmarks.
//!
//! Run with: `RUST_LOG=geo_annotations=debug cargo run --example walkthrough`

use std::sync::Arc;

use tracing::info;

use geo_annotations::{
    init_logging, GeoArResult, GeoLocation, LocationNode, LocationTranslation, MockPoseSource, SceneLocationDelegate,
    SceneLocationSession, SceneVector, StaticContent,
};

struct LoggingDelegate;

impl SceneLocationDelegate for LoggingDelegate {
    fn did_confirm_location_of_node(&self, node: &LocationNode) {
        info!(node = %node.id(), "landmark location confirmed");
    }
}

fn landmark(start: &GeoLocation, north: f64, east: f64) -> GeoLocation {
    start.translated_by(&LocationTranslation {
        latitude_translation: north,
        longitude_translation: east,
        altitude_translation: 0.0,
    })
}

fn main() -> GeoArResult<()> {
    if let Err(e) = init_logging("geo_annotations=info,walkthrough=info") {
        eprintln!("logging already initialised: {}", e);
    }

    let start = GeoLocation::new(59.3293, 18.0686).with_accuracy(8.0, 4.0);
    let pose = MockPoseSource::new();
    let mut session = SceneLocationSession::new(Box::new(pose.clone()));
    session.set_location_delegate(Some(Arc::new(LoggingDelegate)));
    session.run();

    session.ingest_location(start)?;

    let options = session.default_node_options();
    let cafe = session.add_location_node(
        LocationNode::with_annotation(
            Some(landmark(&start, 40.0, 15.0)),
            Arc::new(StaticContent::solid(240, 80, [30, 120, 200, 255])),
        )
        .with_options(options.clone()),
    );
    let tower = session.add_location_node(
        LocationNode::with_annotation(
            Some(landmark(&start, 900.0, -300.0)),
            Arc::new(StaticContent::solid(320, 80, [200, 60, 30, 255])),
        )
        .with_options(options),
    );
    let parked = session.add_location_node_for_current_position(LocationNode::new(None))?;

    // Walk north two meters per step, with a fresh fix every fifth step
    for step in 1..=30u32 {
        pose.walk(SceneVector::new(0.0, 0.0, -2.0));
        if step % 5 == 0 {
            let fix = landmark(&start, 2.0 * step as f64, 0.0)
                .with_accuracy(6.0, 4.0)
                .with_timestamp(step as f64);
            session.ingest_location(fix)?;
        }

        let report = session.tick();
        if step % 10 == 0 {
            info!(step, ?report, estimates = session.estimates().len(), "tick");
        }
    }

    for id in [cafe, tower, parked] {
        if let Some(node) = session.node(id) {
            let scale = node
                .annotation()
                .map(|a| a.node().transform.scale.y)
                .unwrap_or(node.scene_node().transform.scale.y);
            info!(
                node = %id,
                state = ?node.state(),
                position = ?node.position(),
                scale,
                order = node.rendering_order(),
                "final placement"
            );
        }
    }

    if let Some(location) = session.current_location() {
        info!(%location, "device location");
    }
    Ok(())
}
