//! Explicit per-`Instance` context threaded down through the update tree,
//! replacing ambient global singletons (`GlobalCache`,
//! `GlobalRenderTargetPool`, `DefaultQueue`): collaborators get `Instance`
//! lifetimes, not process-wide globals.

use std::sync::Arc;

use crate::cache::GlobalCache;
use crate::config::EngineConfig;
use crate::crs::Crs;
use crate::layer::source::DecodedImage;
use crate::render_target_pool::RenderTargetPool;
use crate::renderer::Renderer;
use crate::request_queue::RequestQueue;

#[derive(Clone)]
pub struct Context {
    pub renderer: Arc<dyn Renderer>,
    pub crs: Arc<dyn Crs>,
    pub config: Arc<EngineConfig>,
    pub render_target_pool: Arc<RenderTargetPool>,
    pub image_cache: Arc<GlobalCache<u64, DecodedImage>>,
    pub image_requests: Arc<RequestQueue<DecodedImage>>,
}

impl Context {
    pub fn new(renderer: Arc<dyn Renderer>, crs: Arc<dyn Crs>, config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let render_target_pool = Arc::new(RenderTargetPool::new(renderer.clone(), config.render_target_pool_capacity));
        Self {
            renderer,
            crs,
            image_requests: Arc::new(RequestQueue::new(config.request_concurrency)),
            image_cache: Arc::new(GlobalCache::new(2048)),
            render_target_pool,
            config,
        }
    }
}
