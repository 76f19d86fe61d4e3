//! Signatures of the kernels supplied by the caller.

use crate::dispatch::cpu::CpuCapabilities;
use crate::dispatch::table::{KernelFunction, TierCandidates};
use crate::kernel::globals::{KernelGlobals, ThreadContext};

/// Trace one sample of pixel `(x, y)`, accumulating into the pixel's passes (frame 0) and
/// advancing its RNG state.
pub type PathTraceFn = fn(&mut ThreadContext<'_>, &mut [f32], &mut u32, u32, i32, i32);

/// Convert one pixel's passes to 8-bit RGBA; the last argument is `1 / samples`.
pub type ConvertToByteFn = fn(&KernelGlobals, &mut [u8; 4], &[f32], f32);

/// Convert one pixel's passes to half-float RGBA bits; the last argument is `1 / samples`.
pub type ConvertToHalfFn = fn(&KernelGlobals, &mut [u16; 4], &[f32], f32);

/// Evaluate one shader input for one sample, accumulating into the output.
pub type ShaderFn = fn(&mut ThreadContext<'_>, &[u32; 4], &mut [f32; 4], ShaderEval, usize, u32);

/// What a shader evaluation computes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ShaderEval {
    /// Caller-defined evaluation type.
    pub eval_type: u32,
    /// Caller-defined filter selection.
    pub filter: u32,
}

/// Caller-supplied kernels, one candidate set per logical kernel.
#[derive(Clone, Copy, Debug)]
pub struct ExternalKernels {
    /// Path tracing.
    pub path_trace: TierCandidates<PathTraceFn>,
    /// 8-bit display conversion.
    pub convert_to_byte: TierCandidates<ConvertToByteFn>,
    /// Half-float display conversion.
    pub convert_to_half_float: TierCandidates<ConvertToHalfFn>,
    /// Shader evaluation.
    pub shader: TierCandidates<ShaderFn>,
}

/// [`ExternalKernels`] bound to the running CPU.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BoundExternalKernels {
    pub(crate) path_trace: KernelFunction<PathTraceFn>,
    pub(crate) convert_to_byte: KernelFunction<ConvertToByteFn>,
    pub(crate) convert_to_half_float: KernelFunction<ConvertToHalfFn>,
    pub(crate) shader: KernelFunction<ShaderFn>,
}

impl BoundExternalKernels {
    pub(crate) fn bind(kernels: ExternalKernels, capabilities: CpuCapabilities) -> Self {
        Self {
            path_trace: KernelFunction::with_capabilities(kernels.path_trace, capabilities),
            convert_to_byte: KernelFunction::with_capabilities(
                kernels.convert_to_byte,
                capabilities,
            ),
            convert_to_half_float: KernelFunction::with_capabilities(
                kernels.convert_to_half_float,
                capabilities,
            ),
            shader: KernelFunction::with_capabilities(kernels.shader, capabilities),
        }
    }
}
