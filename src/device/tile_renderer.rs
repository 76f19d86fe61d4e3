//! Task bodies executed by the workers: path tracing, denoising, film conversion and shading.

use std::sync::Arc;

use crate::buffers::display_buffer::DisplayPixels;
use crate::buffers::neighborhood::{NeighborSlot, TileNeighborhood};
use crate::buffers::render_buffer::{RenderBuffer, pixel_index};
use crate::denoise::{DenoiseEngine, DenoiseTarget};
use crate::device::task::{CancelPolicy, DeviceTask, DeviceTaskKind, FilmConvertTask, ShaderTask};
use crate::device::task_pool::CancelFlag;
use crate::device::tile::{
    ReadLocks, RenderTile, TileSource, TileState, TileTask, lock, read_lock, write_lock,
};
use crate::dispatch::tiers::FilterKernels;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{EmberError, EmberResult, try_alloc_zeroed};
use crate::kernel::external::BoundExternalKernels;
use crate::kernel::globals::{KernelGlobals, ThreadContext};

/// Everything one worker needs to execute one piece of a device task.
pub(crate) struct TileRenderer<'a> {
    pub(crate) globals: &'a KernelGlobals,
    pub(crate) filter: &'a FilterKernels,
    pub(crate) external: &'a BoundExternalKernels,
    pub(crate) task: &'a DeviceTask,
    pub(crate) pool_cancel: &'a CancelFlag,
}

impl TileRenderer<'_> {
    /// Execute the task piece with a fresh per-worker context.
    pub(crate) fn run(&self) {
        let mut ctx = ThreadContext::new(self.globals);
        let result = match &self.task.kind {
            DeviceTaskKind::Render(tiles) => {
                self.render_tiles(&mut ctx, tiles.as_ref());
                Ok(())
            }
            DeviceTaskKind::FilmConvert(task) => self.film_convert(task),
            DeviceTaskKind::Shader(task) => self.shader(&mut ctx, task),
        };
        if let Err(e) = result {
            tracing::error!(kind = ?self.task.kind, error = %e, "device task failed");
        }
    }

    fn cancel_observed(&self) -> bool {
        self.task.cancel_requested() || self.pool_cancel.is_set()
    }

    fn abort_requested(&self) -> bool {
        self.task.policy == CancelPolicy::Abort && self.cancel_observed()
    }

    fn engine(&self) -> DenoiseEngine<'_> {
        DenoiseEngine::new(self.filter, &self.globals.denoise, &self.globals.film)
    }

    fn render_tiles(&self, ctx: &mut ThreadContext<'_>, tiles: &dyn TileSource) {
        while let Some(mut tile) = tiles.acquire_tile() {
            let outcome = tile.begin().and_then(|()| match tile.task() {
                TileTask::PathTrace => self.path_trace(ctx, &mut tile),
                TileTask::Denoise => self.denoise(tiles, &mut tile),
            });
            match outcome {
                Ok(state) => tile.finish(state),
                Err(e) => tile.fail(&e),
            }
            tiles.release_tile(tile);

            if self.abort_requested() {
                break;
            }
        }
    }

    fn path_trace(
        &self,
        ctx: &mut ThreadContext<'_>,
        tile: &mut RenderTile,
    ) -> EmberResult<TileState> {
        let rect = tile.rect();
        let kernel = self.external.path_trace.get();
        let shared = Arc::clone(tile.buffer());
        let mut buffer = write_lock(&shared)?;

        let mut observed = false;
        let samples = tile.samples();
        for sample in samples.start..samples.end {
            if self.cancel_observed() {
                observed = true;
                if self.task.policy == CancelPolicy::Abort {
                    return Ok(TileState::CancelledAborted);
                }
            }
            for y in rect.y0..rect.y1 {
                for x in rect.x0..rect.x1 {
                    let index = pixel_index(tile.offset(), tile.stride(), x, y)
                        .ok_or_else(|| outside(x, y))?;
                    let (passes, rng) = buffer
                        .pixel_and_rng_mut(index)
                        .ok_or_else(|| outside(x, y))?;
                    kernel(ctx, passes, rng, sample, x, y);
                }
            }
            tile.sample = sample + 1;
            self.task.report_progress(rect.area() as u64);
        }

        let overscan = buffer.params().overscan;
        if overscan > 0 && tile.sample > 0 && !self.task.cancel_requested() {
            self.denoise_own_buffer(&mut buffer, tile, overscan)?;
        }

        Ok(if observed {
            TileState::CancelledDrained
        } else {
            TileState::Completed
        })
    }

    /// Denoise a path-traced tile from its own buffer, writing only inside the overscan margin.
    fn denoise_own_buffer(
        &self,
        buffer: &mut RenderBuffer,
        tile: &RenderTile,
        overscan: i32,
    ) -> EmberResult<()> {
        let rect = tile.rect();
        let filter_area = rect.inflate(-overscan);
        if filter_area.is_empty() {
            return Ok(());
        }

        let engine = self.engine();
        let frames = buffer.params().frames;
        let filtered = {
            let slot = NeighborSlot {
                buffer: &*buffer,
                offset: tile.offset(),
                stride: tile.stride(),
            };
            let view = TileNeighborhood::single(slot, rect, self.globals.film.pass_denoising);
            engine.fill_buffer(tile.sample, rect, &view, frames)?
        };
        engine.run(
            tile.sample,
            &filtered,
            filter_area,
            DenoiseTarget {
                buffer,
                offset: tile.offset(),
                stride: tile.stride(),
            },
        )?;
        Ok(())
    }

    fn denoise(&self, tiles: &dyn TileSource, tile: &mut RenderTile) -> EmberResult<TileState> {
        let rect = tile.rect();
        let sample = tile.samples().end;
        if sample == 0 {
            return Err(EmberError::validation(format!(
                "denoise tile {} has no accumulated samples",
                tile.id
            )));
        }

        let mut neighbors = tiles.neighbor_tiles(tile);
        if neighbors.tiles[4].is_none() {
            neighbors.tiles[4] = Some(tile.as_neighbor());
        }
        let half_window = self.globals.denoise.half_window;
        let work = PixelRect::new(
            rect.x0 - half_window,
            rect.y0 - half_window,
            rect.x1 + half_window + 1,
            rect.y1 + half_window + 1,
        )
        .intersect(neighbors.extent(rect));

        let engine = self.engine();
        let filtered = {
            let locks = ReadLocks::acquire(&neighbors)?;
            let frames = locks
                .get(tile.buffer())
                .map_or(1, |center| center.params().frames);
            let view = neighbors.view(rect, &locks, self.globals.film.pass_denoising)?;
            engine.fill_buffer(sample, work, &view, frames)?
        };

        let shared = Arc::clone(tile.buffer());
        let mut center = write_lock(&shared)?;
        engine.run(
            sample,
            &filtered,
            rect,
            DenoiseTarget {
                buffer: &mut *center,
                offset: tile.offset(),
                stride: tile.stride(),
            },
        )?;
        drop(center);

        tile.sample = sample;
        self.task.report_progress(rect.area() as u64);
        Ok(TileState::Completed)
    }

    fn film_convert(&self, task: &FilmConvertTask) -> EmberResult<()> {
        let scale = 1.0 / (task.sample as f32 + 1.0);
        let rect = task.rect;
        let width = rect.width().max(0) as usize;
        let guard = read_lock(&task.buffer)?;
        let buffer: &RenderBuffer = &guard;
        let byte_output = matches!(lock(&task.output).pixels(), DisplayPixels::Byte(_));
        let passes = |x: i32, y: i32| {
            pixel_index(task.offset, task.stride, x, y)
                .and_then(|index| buffer.pixel(index, 0))
                .ok_or_else(|| outside(x, y))
        };

        if byte_output {
            let convert = self.external.convert_to_byte.get();
            let mut row = try_alloc_zeroed::<[u8; 4]>(width, "film convert row")?;
            for y in rect.y0..rect.y1 {
                if self.abort_requested() {
                    break;
                }
                for (px, x) in row.iter_mut().zip(rect.x0..) {
                    convert(self.globals, px, passes(x, y)?, scale);
                }
                lock(&task.output).write_byte_row(rect.x0, y, &row)?;
            }
        } else {
            let convert = self.external.convert_to_half_float.get();
            let mut row = try_alloc_zeroed::<[u16; 4]>(width, "film convert row")?;
            for y in rect.y0..rect.y1 {
                if self.abort_requested() {
                    break;
                }
                for (px, x) in row.iter_mut().zip(rect.x0..) {
                    convert(self.globals, px, passes(x, y)?, scale);
                }
                lock(&task.output).write_half_row(rect.x0, y, &row)?;
            }
        }
        Ok(())
    }

    fn shader(&self, ctx: &mut ThreadContext<'_>, task: &ShaderTask) -> EmberResult<()> {
        let kernel = self.external.shader.get();
        let range = task.range.clone();
        let inputs = task
            .input
            .get(range.clone())
            .ok_or_else(|| {
                EmberError::render(format!("shader range {range:?} exceeds the input"))
            })?;

        let mut local = try_alloc_zeroed::<[f32; 4]>(range.len(), "shader output chunk")?;
        {
            let output = lock(&task.output);
            let current = output.get(range.clone()).ok_or_else(|| {
                EmberError::render(format!("shader range {range:?} exceeds the output"))
            })?;
            local.copy_from_slice(current);
        }

        for sample in 0..task.num_samples {
            if self.abort_requested() {
                break;
            }
            for ((input, out), index) in inputs.iter().zip(local.iter_mut()).zip(range.clone()) {
                kernel(ctx, input, out, task.eval, index, sample);
            }
            self.task.report_progress(range.len() as u64);
        }

        let mut output = lock(&task.output);
        if let Some(dst) = output.get_mut(range) {
            dst.copy_from_slice(&local);
        }
        Ok(())
    }
}

fn outside(x: i32, y: i32) -> EmberError {
    EmberError::render(format!("pixel ({x}, {y}) is outside its render buffer"))
}

#[cfg(test)]
#[path = "../../tests/unit/device/tile_renderer.rs"]
mod tests;
