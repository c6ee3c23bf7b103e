//! Public session API, delegate interfaces and shared result types

pub mod delegate;
pub mod session;
pub mod types;

pub use delegate::{SceneLocationDelegate, SceneLocationEstimateDelegate, SceneTrackingDelegate};
pub use session::SceneLocationSession;
pub use types::{GeoArError, GeoArResult, SessionError, TickReport};
