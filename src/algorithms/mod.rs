//! Placement and scaling algorithms

pub mod projection;
pub mod scaling;
pub mod render_order;

pub use projection::{GeoProjector, LocationTranslation, Placement};
pub use render_order::RenderOrderPolicy;
pub use scaling::{DistanceClamp, ScaleFn, ScalingScheme, ScalingSchemeConfig};
