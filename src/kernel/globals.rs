use std::any::Any;
use std::sync::Arc;

use crate::buffers::film::FilmParams;
use crate::denoise::params::DenoiseParams;

/// Read-only data shared by every kernel invocation of a device.
#[derive(Clone)]
pub struct KernelGlobals {
    /// Pass layout of the render buffers.
    pub film: FilmParams,
    /// Denoiser settings.
    pub denoise: DenoiseParams,
    scene: Option<Arc<dyn Any + Send + Sync>>,
}

impl KernelGlobals {
    /// Globals without scene data.
    pub fn new(film: FilmParams, denoise: DenoiseParams) -> Self {
        Self {
            film,
            denoise,
            scene: None,
        }
    }

    /// Attach opaque scene data for the external kernels.
    pub fn with_scene<T: Any + Send + Sync>(mut self, scene: T) -> Self {
        self.scene = Some(Arc::new(scene));
        self
    }

    /// Scene data, when attached with type `T`.
    pub fn scene<T: Any>(&self) -> Option<&T> {
        self.scene.as_deref().and_then(|scene| scene.downcast_ref::<T>())
    }
}

impl std::fmt::Debug for KernelGlobals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelGlobals")
            .field("film", &self.film)
            .field("denoise", &self.denoise)
            .field("has_scene", &self.scene.is_some())
            .finish()
    }
}

/// Per-worker kernel context, created when a worker picks up a task and released when it is
/// dropped.
#[derive(Debug)]
pub struct ThreadContext<'a> {
    globals: &'a KernelGlobals,
    /// Scratch owned by the external kernels, reused across calls of one task.
    pub scratch: Vec<f32>,
}

impl<'a> ThreadContext<'a> {
    pub(crate) fn new(globals: &'a KernelGlobals) -> Self {
        Self {
            globals,
            scratch: Vec::new(),
        }
    }

    /// Shared globals.
    pub fn globals(&self) -> &'a KernelGlobals {
        self.globals
    }
}

impl Drop for ThreadContext<'_> {
    fn drop(&mut self) {
        tracing::trace!(scratch_len = self.scratch.len(), "thread context released");
    }
}
