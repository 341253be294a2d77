//! `Renderer`: the GPU backend this crate treats as an external collaborator
//! trait rather than a concrete `wgpu` dependency. Production hosts implement
//! it against `wgpu`; this crate ships only [`NullRenderer`], an in-memory
//! test double.

use crate::error::Result;
use crate::view::View;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Rg32Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    U8,
    F32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data_type: DataType,
    pub filter: FilterMode,
}

/// Opaque handle to a GPU-resident render target. Implementors are free to
/// make this as cheap or as heavy as their backend needs; this crate never
/// inspects it beyond equality/hashing for pool bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetId(pub u64);

pub enum PixelBuffer {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

/// A minimal scene description the renderer consumes to draw one frame.
/// This crate builds it from whatever subset of entities passed traversal;
/// the renderer owns actual draw-call submission.
pub struct SceneRef<'a> {
    pub visible_tile_count: usize,
    pub visible_point_count: u64,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> SceneRef<'a> {
    pub fn new(visible_tile_count: usize, visible_point_count: u64) -> Self {
        Self { visible_tile_count, visible_point_count, _marker: std::marker::PhantomData }
    }
}

pub trait Renderer: Send + Sync {
    fn create_render_target(&self, desc: RenderTargetDescriptor) -> Result<RenderTargetId>;
    fn release_render_target(&self, id: RenderTargetId);

    fn render(&self, scene: &SceneRef<'_>, view: &View) -> Result<()>;

    fn render_to_buffer(&self, scene: &SceneRef<'_>, view: &View, target: RenderTargetId) -> Result<PixelBuffer>;

    fn set_render_target(&self, target: Option<RenderTargetId>);
    fn get_render_target(&self) -> Option<RenderTargetId>;

    fn canvas_size(&self) -> (u32, u32);

    /// Called by the host when the GPU context is lost/restored; entities
    /// must treat restoration as "repaint everything from scratch".
    fn is_context_lost(&self) -> bool;
}

/// In-memory test double: allocates monotonically increasing ids, tracks no
/// real GPU resources, and renders into a zeroed buffer sized from the
/// descriptor. Stands in for a headless `wgpu` adapter in tests without
/// requiring one.
pub struct NullRenderer {
    next_id: AtomicU64,
    canvas: (u32, u32),
    context_lost: std::sync::atomic::AtomicBool,
    current_target: std::sync::Mutex<Option<RenderTargetId>>,
    descriptors: dashmap::DashMap<RenderTargetId, RenderTargetDescriptor>,
}

impl NullRenderer {
    pub fn new(canvas: (u32, u32)) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            canvas,
            context_lost: std::sync::atomic::AtomicBool::new(false),
            current_target: std::sync::Mutex::new(None),
            descriptors: dashmap::DashMap::new(),
        }
    }

    pub fn simulate_context_loss(&self) {
        self.context_lost.store(true, Ordering::SeqCst);
    }

    pub fn simulate_context_restored(&self) {
        self.context_lost.store(false, Ordering::SeqCst);
    }
}

impl Renderer for NullRenderer {
    fn create_render_target(&self, desc: RenderTargetDescriptor) -> Result<RenderTargetId> {
        let id = RenderTargetId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.descriptors.insert(id, desc);
        Ok(id)
    }

    fn release_render_target(&self, id: RenderTargetId) {
        self.descriptors.remove(&id);
    }

    fn render(&self, _scene: &SceneRef<'_>, _view: &View) -> Result<()> {
        Ok(())
    }

    fn render_to_buffer(&self, _scene: &SceneRef<'_>, _view: &View, target: RenderTargetId) -> Result<PixelBuffer> {
        let desc = self
            .descriptors
            .get(&target)
            .ok_or_else(|| crate::error::EngineError::Programmer("render_to_buffer: unknown target".into()))?;
        let pixels = (desc.width as usize) * (desc.height as usize);
        Ok(match desc.data_type {
            DataType::U8 => PixelBuffer::U8(vec![0u8; pixels * 4]),
            DataType::F32 => PixelBuffer::F32(vec![0.0f32; pixels * 2]),
        })
    }

    fn set_render_target(&self, target: Option<RenderTargetId>) {
        *self.current_target.lock().unwrap() = target;
    }

    fn get_render_target(&self) -> Option<RenderTargetId> {
        *self.current_target.lock().unwrap()
    }

    fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    fn is_context_lost(&self) -> bool {
        self.context_lost.load(Ordering::SeqCst)
    }
}
