//! `RenderTargetPool`: recycles GPU render targets keyed
//! by their descriptor so the layer pipeline isn't constantly allocating and
//! freeing GPU memory for the common case of revisiting a tile size. Soft
//! capped; overflow releases straight back to the renderer instead of
//! growing unbounded.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;
use crate::renderer::{RenderTargetDescriptor, RenderTargetId, Renderer};

struct Bucket {
    free: Vec<RenderTargetId>,
}

pub struct RenderTargetPool {
    renderer: std::sync::Arc<dyn Renderer>,
    buckets: Mutex<HashMap<RenderTargetDescriptor, Bucket>>,
    soft_cap: usize,
}

impl RenderTargetPool {
    pub fn new(renderer: std::sync::Arc<dyn Renderer>, soft_cap: usize) -> Self {
        Self { renderer, buckets: Mutex::new(HashMap::new()), soft_cap }
    }

    /// Returns a target matching `desc`, reusing a released one if the
    /// bucket has one, else allocating fresh via the renderer.
    pub fn acquire(&self, desc: RenderTargetDescriptor) -> Result<RenderTargetId> {
        {
            let mut buckets = self.buckets.lock().unwrap();
            if let Some(bucket) = buckets.get_mut(&desc) {
                if let Some(id) = bucket.free.pop() {
                    return Ok(id);
                }
            }
        }
        self.renderer.create_render_target(desc)
    }

    /// Returns `id` to its bucket for reuse, unless the pool is already at
    /// its soft cap, in which case it's released immediately to avoid
    /// unbounded GPU memory growth.
    pub fn release(&self, desc: RenderTargetDescriptor, id: RenderTargetId) {
        let mut buckets = self.buckets.lock().unwrap();
        let total_free: usize = buckets.values().map(|b| b.free.len()).sum();
        if total_free >= self.soft_cap {
            drop(buckets);
            self.renderer.release_render_target(id);
            return;
        }
        buckets.entry(desc).or_insert_with(|| Bucket { free: Vec::new() }).free.push(id);
    }

    pub fn free_count(&self) -> usize {
        self.buckets.lock().unwrap().values().map(|b| b.free.len()).sum()
    }
}
