mod cache;
mod config;
mod context;
mod coordinates;
mod crs;
mod entity;
mod error;
mod extent;
mod feature;
mod helpers;
mod layer;
mod main_loop;
mod pointcloud;
mod render_target_pool;
mod renderer;
mod request_queue;
mod tile;
mod tiles3d;
mod view;

#[cfg(test)]
mod tests;

pub use cache::GlobalCache;
pub use config::{load_config, EngineConfig};
pub use context::Context;
pub use coordinates::Coordinates;
pub use crs::{BuiltinCrs, Crs, EPSG_3857, EPSG_4326};
pub use entity::{Entity, EntityId};
pub use error::{EngineError, Result};
pub use extent::{Extent, OffsetScale};
pub use main_loop::{Instance, MainLoop};
pub use render_target_pool::RenderTargetPool;
pub use renderer::{
    DataType, FilterMode, NullRenderer, PixelBuffer, PixelFormat, RenderTargetDescriptor, RenderTargetId, Renderer, SceneRef,
};
pub use request_queue::RequestQueue;
pub use view::{ScreenSpaceError, SseMode, View};
