//! Ember is the CPU compute backend of a tiled offline renderer.
//!
//! It binds every kernel to the fastest instruction-set tier the running CPU supports, schedules
//! tiled work on a fixed worker pool, and removes Monte-Carlo noise from partially converged
//! renders with a feature-guided denoiser:
//!
//! - Describe the pass layout with [`FilmParams`] and allocate [`RenderBuffer`]s
//! - Create a [`CpuDevice`] with your [`ExternalKernels`]
//! - Submit [`DeviceTask`]s (render tiles, film conversion, shading) and wait for them
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod foundation;

pub mod buffers;
pub mod config;
pub mod denoise;
pub mod device;
pub mod dispatch;
pub mod kernel;

pub use crate::foundation::core::{PixelRect, SampleRange};
pub use crate::foundation::error::{EmberError, EmberResult};
pub use crate::foundation::math::Float3;

pub use crate::buffers::display_buffer::{DisplayBuffer, DisplayPixels};
pub use crate::buffers::film::{DenoisingLayout, DenoisingSample, FilmParams};
pub use crate::buffers::render_buffer::{BufferParams, RenderBuffer, SharedRenderBuffer};
pub use crate::config::DeviceConfig;
pub use crate::denoise::params::{DenoiseParams, PrefilterTuning, RegressionGuide};
pub use crate::denoise::{DenoiseEngine, DenoiseStats, DenoiseTarget};
pub use crate::device::cpu::CpuDevice;
pub use crate::device::task::{
    CancelPolicy, DeviceTask, DeviceTaskKind, FilmConvertTask, ShaderTask,
};
pub use crate::device::task_pool::{TaskPool, split_range};
pub use crate::device::tile::{RenderTile, TileQueue, TileSource, TileState, TileTask};
pub use crate::dispatch::cpu::{CpuCapabilities, CpuTier};
pub use crate::dispatch::table::{KernelFunction, TierCandidates};
pub use crate::kernel::external::{
    ConvertToByteFn, ConvertToHalfFn, ExternalKernels, PathTraceFn, ShaderEval, ShaderFn,
};
pub use crate::kernel::globals::{KernelGlobals, ThreadContext};
