//! Coordinate bridge between the paginated and flat-text representations.
//!
//! The mapping goes through text identity rather than geometry: the forward
//! direction runs the tiered matcher inside geometry-narrowed scopes, the
//! reverse direction interpolates inside chunk bounding boxes.

pub mod forward;
pub mod reverse;

pub use forward::{CoordinateBridge, GeometrySelection};
pub use reverse::{to_geometry, GeometryLocation};
