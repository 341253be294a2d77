//! Raster layer pipeline.

pub mod atlas;
pub mod composer;
pub mod layer;
pub mod source;
pub mod target;
pub mod update_state;

pub use layer::{ColoringRole, ElevationRangeTracker, Layer, LayerState};
pub use source::{DecodedImage, ImageRequest, ImageSource};
pub use target::{Pitch, Target, TargetState};
pub use update_state::LayerUpdateState;
