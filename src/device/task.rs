//! Device task descriptors and their splitting into worker-sized pieces.

use std::fmt;
use std::ops::Range;
use std::sync::{Arc, Mutex};

use crate::buffers::display_buffer::DisplayBuffer;
use crate::buffers::render_buffer::SharedRenderBuffer;
use crate::device::task_pool::split_range;
use crate::device::tile::TileSource;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{EmberError, EmberResult};
use crate::kernel::external::ShaderEval;

/// Shader sub-tasks never cover fewer inputs than this, unless the whole range is smaller.
pub const SHADER_MIN_CHUNK: usize = 256;

/// What a task does when a cancel is observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Stop at the first observation.
    #[default]
    Abort,
    /// Finish the requested work, then report the cancel.
    Drain,
}

/// Film conversion of one buffer region into a display buffer.
#[derive(Clone, Debug)]
pub struct FilmConvertTask {
    /// Source buffer.
    pub buffer: SharedRenderBuffer,
    /// Pixel index of image position `(0, 0)` in `buffer`.
    pub offset: i64,
    /// Row stride in pixels.
    pub stride: i64,
    /// Image region to convert.
    pub rect: PixelRect,
    /// Last accumulated sample; pixels are scaled by `1 / (sample + 1)`.
    pub sample: u32,
    /// Destination, covering at least `rect`.
    pub output: Arc<Mutex<DisplayBuffer>>,
}

/// Shader evaluation over a range of inputs.
#[derive(Clone, Debug)]
pub struct ShaderTask {
    /// One input record per shader index.
    pub input: Arc<[[u32; 4]]>,
    /// Accumulated output, same length as `input`.
    pub output: Arc<Mutex<Vec<[f32; 4]>>>,
    /// Indices to evaluate.
    pub range: Range<usize>,
    /// Samples per input.
    pub num_samples: u32,
    /// Evaluation selector passed through to the kernel.
    pub eval: ShaderEval,
}

/// Payload of a [`DeviceTask`].
#[derive(Clone)]
pub enum DeviceTaskKind {
    /// Work through the tiles of a source.
    Render(Arc<dyn TileSource>),
    /// Convert accumulated passes to display pixels.
    FilmConvert(FilmConvertTask),
    /// Evaluate shaders.
    Shader(ShaderTask),
}

impl fmt::Debug for DeviceTaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(_) => f.write_str("Render"),
            Self::FilmConvert(task) => f.debug_tuple("FilmConvert").field(&task.rect).finish(),
            Self::Shader(task) => f.debug_tuple("Shader").field(&task.range).finish(),
        }
    }
}

type CancelFn = dyn Fn() -> bool + Send + Sync;
type ProgressFn = dyn Fn(u64) + Send + Sync;

/// A unit of work submitted to a device.
#[derive(Clone)]
pub struct DeviceTask {
    /// Payload.
    pub kind: DeviceTaskKind,
    /// Reaction to cancellation.
    pub policy: CancelPolicy,
    cancel: Option<Arc<CancelFn>>,
    progress: Option<Arc<ProgressFn>>,
}

impl fmt::Debug for DeviceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTask")
            .field("kind", &self.kind)
            .field("policy", &self.policy)
            .field("has_cancel", &self.cancel.is_some())
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

impl DeviceTask {
    /// Task with the default policy and no callbacks.
    pub fn new(kind: DeviceTaskKind) -> Self {
        Self {
            kind,
            policy: CancelPolicy::default(),
            cancel: None,
            progress: None,
        }
    }

    /// Render every tile of `tiles`.
    pub fn render(tiles: Arc<dyn TileSource>) -> Self {
        Self::new(DeviceTaskKind::Render(tiles))
    }

    /// Set the cancel policy.
    pub fn with_policy(mut self, policy: CancelPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Task-level cancel accessor, polled alongside the pool's cancel flag.
    pub fn with_cancel(mut self, cancel: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.cancel = Some(Arc::new(cancel));
        self
    }

    /// Progress callback receiving completed pixel-samples (or shader evaluations).
    pub fn with_progress(mut self, progress: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Return `true` when the task-level accessor requests a cancel.
    pub fn cancel_requested(&self) -> bool {
        self.cancel.as_ref().is_some_and(|cancel| cancel())
    }

    pub(crate) fn report_progress(&self, amount: u64) {
        if let Some(progress) = &self.progress {
            progress(amount);
        }
    }

    /// Check that the payload is well-formed before it is split.
    pub fn validate(&self) -> EmberResult<()> {
        match &self.kind {
            DeviceTaskKind::Render(_) => Ok(()),
            DeviceTaskKind::FilmConvert(task) => {
                if task.stride < i64::from(task.rect.width()) {
                    return Err(EmberError::validation(
                        "film convert stride is narrower than its rect",
                    ));
                }
                Ok(())
            }
            DeviceTaskKind::Shader(task) => {
                if task.range.start > task.range.end || task.range.end > task.input.len() {
                    return Err(EmberError::validation(format!(
                        "shader range {:?} exceeds {} inputs",
                        task.range,
                        task.input.len()
                    )));
                }
                Ok(())
            }
        }
    }

    /// Split into pieces for `threads` workers.
    ///
    /// Render tasks are replicated so every worker pulls tiles from the shared source, film
    /// conversion is split by rows and shader ranges by [`SHADER_MIN_CHUNK`]-sized chunks.
    pub fn split(&self, threads: usize) -> Vec<DeviceTask> {
        let threads = threads.max(1);
        let pieces: Vec<DeviceTask> = match &self.kind {
            DeviceTaskKind::Render(_) => (0..threads).map(|_| self.clone()).collect(),
            DeviceTaskKind::FilmConvert(task) => {
                split_range(task.rect.height().max(0) as usize, threads, 1)
                    .into_iter()
                    .map(|rows| {
                        let mut piece = task.clone();
                        piece.rect.y0 = task.rect.y0 + rows.start as i32;
                        piece.rect.y1 = task.rect.y0 + rows.end as i32;
                        self.with_kind(DeviceTaskKind::FilmConvert(piece))
                    })
                    .collect()
            }
            DeviceTaskKind::Shader(task) => {
                split_range(task.range.len(), threads, SHADER_MIN_CHUNK)
                    .into_iter()
                    .map(|chunk| {
                        let mut piece = task.clone();
                        piece.range = task.range.start + chunk.start..task.range.start + chunk.end;
                        self.with_kind(DeviceTaskKind::Shader(piece))
                    })
                    .collect()
            }
        };
        tracing::debug!(kind = ?self.kind, threads, pieces = pieces.len(), "task split");
        pieces
    }

    fn with_kind(&self, kind: DeviceTaskKind) -> DeviceTask {
        DeviceTask {
            kind,
            policy: self.policy,
            cancel: self.cancel.clone(),
            progress: self.progress.clone(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/task.rs"]
mod tests;
