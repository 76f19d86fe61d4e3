//! Render tiles, their lifecycle and the sources handing them out.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use smallvec::SmallVec;

use crate::buffers::film::FilmParams;
use crate::buffers::neighborhood::{NeighborSlot, TileNeighborhood};
use crate::buffers::render_buffer::{BufferParams, RenderBuffer, SharedRenderBuffer, pixel_index};
use crate::foundation::core::{PixelRect, SampleRange};
use crate::foundation::error::{EmberError, EmberResult};

/// Work performed on a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileTask {
    /// Accumulate samples with the path-trace kernel.
    PathTrace,
    /// Denoise the tile using its eight neighbors.
    Denoise,
}

/// Lifecycle of a tile. Terminal states are followed only by `Released`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileState {
    /// Acquired, not yet started.
    Idle,
    /// Being worked on.
    Running,
    /// Finished without observing a cancel.
    Completed,
    /// A cancel was observed and the sample range was still finished.
    CancelledDrained,
    /// Stopped at the first observed cancel.
    CancelledAborted,
    /// Stopped by an error, see [`RenderTile::error`].
    Failed,
    /// Handed back to its source.
    Released,
}

impl TileState {
    /// Return `true` for the states a running tile may end in.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CancelledDrained | Self::CancelledAborted | Self::Failed
        )
    }
}

/// One unit of tiled work.
#[derive(Debug)]
pub struct RenderTile {
    /// Position in the source's tile order.
    pub id: usize,
    rect: PixelRect,
    task: TileTask,
    samples: SampleRange,
    /// Samples completed so far; starts at the range start.
    pub sample: u32,
    buffer: SharedRenderBuffer,
    offset: i64,
    stride: i64,
    state: TileState,
    error: Option<String>,
}

impl RenderTile {
    /// Create an idle tile. The rectangle must lie inside `buffer` at `(offset, stride)`.
    pub fn new(
        id: usize,
        rect: PixelRect,
        task: TileTask,
        samples: SampleRange,
        buffer: SharedRenderBuffer,
        offset: i64,
        stride: i64,
    ) -> EmberResult<Self> {
        if rect.is_empty() {
            return Err(EmberError::validation("tile rect must not be empty"));
        }
        if stride < i64::from(rect.width()) {
            return Err(EmberError::validation(format!(
                "tile stride {stride} is narrower than the tile width {}",
                rect.width()
            )));
        }
        let pixels = read_lock(&buffer)?.num_pixels();
        let first = pixel_index(offset, stride, rect.x0, rect.y0);
        let last = pixel_index(offset, stride, rect.x1 - 1, rect.y1 - 1);
        match (first, last) {
            (Some(_), Some(last)) if last < pixels => {}
            _ => {
                return Err(EmberError::validation(format!(
                    "tile {rect:?} exceeds its buffer of {pixels} pixels"
                )));
            }
        }

        Ok(Self {
            id,
            rect,
            task,
            samples,
            sample: samples.start,
            buffer,
            offset,
            stride,
            state: TileState::Idle,
            error: None,
        })
    }

    /// Image rectangle covered by the tile.
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    /// Work to perform.
    pub fn task(&self) -> TileTask {
        self.task
    }

    /// Requested sample range.
    pub fn samples(&self) -> SampleRange {
        self.samples
    }

    /// Shared buffer holding the tile's pixels.
    pub fn buffer(&self) -> &SharedRenderBuffer {
        &self.buffer
    }

    /// Pixel index of image position `(0, 0)` in the buffer.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Row stride in pixels.
    pub fn stride(&self) -> i64 {
        self.stride
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TileState {
        self.state
    }

    /// Failure message of a `Failed` tile.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Neighbor description of this tile for denoise neighborhoods.
    pub fn as_neighbor(&self) -> NeighborTile {
        NeighborTile {
            rect: self.rect,
            buffer: Arc::clone(&self.buffer),
            offset: self.offset,
            stride: self.stride,
        }
    }

    pub(crate) fn begin(&mut self) -> EmberResult<()> {
        if self.state != TileState::Idle {
            return Err(EmberError::render(format!(
                "tile {} cannot start from state {:?}",
                self.id, self.state
            )));
        }
        self.state = TileState::Running;
        Ok(())
    }

    pub(crate) fn finish(&mut self, state: TileState) {
        debug_assert!(state.is_terminal());
        if self.state == TileState::Running {
            self.state = state;
        }
    }

    pub(crate) fn fail(&mut self, error: &EmberError) {
        tracing::error!(tile = self.id, rect = ?self.rect, error = %error, "tile failed");
        self.error = Some(error.to_string());
        self.state = TileState::Failed;
    }

    /// Mark the tile as handed back. Called by tile sources in `release_tile`.
    pub fn release(&mut self) {
        self.state = TileState::Released;
    }
}

/// A neighboring tile's placement, shared with denoise tiles.
#[derive(Clone, Debug)]
pub struct NeighborTile {
    /// Image rectangle of the neighbor.
    pub rect: PixelRect,
    /// Its buffer.
    pub buffer: SharedRenderBuffer,
    /// Pixel index of image position `(0, 0)` in the buffer.
    pub offset: i64,
    /// Row stride in pixels.
    pub stride: i64,
}

/// The 3×3 tiles around a denoise tile, row-major with the center in slot 4.
#[derive(Clone, Debug, Default)]
pub struct TileNeighbors {
    /// Tiles, `None` where the image ends or the source has none.
    pub tiles: [Option<NeighborTile>; 9],
}

impl TileNeighbors {
    /// Column and row boundaries; missing sides collapse onto the center.
    fn bounds(&self, center: PixelRect) -> ([i32; 4], [i32; 4]) {
        let rect_in = |slots: [usize; 3]| {
            slots
                .into_iter()
                .find_map(|slot| self.tiles[slot].as_ref().map(|t| t.rect))
        };
        let x0 = rect_in([3, 0, 6]).map_or(center.x0, |r| r.x0);
        let x3 = rect_in([5, 2, 8]).map_or(center.x1, |r| r.x1);
        let y0 = rect_in([1, 0, 2]).map_or(center.y0, |r| r.y0);
        let y3 = rect_in([7, 6, 8]).map_or(center.y1, |r| r.y1);
        (
            [x0, center.x0, center.x1, x3],
            [y0, center.y0, center.y1, y3],
        )
    }

    /// Union of the available neighbor extents around `center`.
    pub fn extent(&self, center: PixelRect) -> PixelRect {
        let (x, y) = self.bounds(center);
        PixelRect::new(x[0], y[0], x[3], y[3])
    }

    /// Read view over the locked buffers.
    pub(crate) fn view<'g>(
        &self,
        center: PixelRect,
        locks: &'g ReadLocks<'_>,
        pass_denoising: usize,
    ) -> EmberResult<TileNeighborhood<'g>> {
        let mut slots: [Option<NeighborSlot<'g>>; 9] = [None; 9];
        for (slot, tile) in slots.iter_mut().zip(&self.tiles) {
            if let Some(tile) = tile {
                let buffer = locks.get(&tile.buffer).ok_or_else(|| {
                    EmberError::render("neighbor buffer was not locked for reading")
                })?;
                *slot = Some(NeighborSlot {
                    buffer,
                    offset: tile.offset,
                    stride: tile.stride,
                });
            }
        }
        let (tile_x, tile_y) = self.bounds(center);
        Ok(TileNeighborhood::new(slots, tile_x, tile_y, pass_denoising))
    }
}

/// Read locks on the distinct buffers of a neighborhood.
///
/// Buffers are locked once each, in address order, so concurrent denoise tiles never wait on
/// each other in a cycle.
pub(crate) struct ReadLocks<'a> {
    guards: SmallVec<[(*const (), RwLockReadGuard<'a, RenderBuffer>); 9]>,
}

impl<'a> ReadLocks<'a> {
    pub(crate) fn acquire(neighbors: &'a TileNeighbors) -> EmberResult<Self> {
        let mut buffers: SmallVec<[&'a SharedRenderBuffer; 9]> = SmallVec::new();
        for tile in neighbors.tiles.iter().flatten() {
            if !buffers.iter().any(|b| Arc::ptr_eq(b, &tile.buffer)) {
                buffers.push(&tile.buffer);
            }
        }
        buffers.sort_by_key(|b| Arc::as_ptr(b) as *const () as usize);

        let mut guards = SmallVec::new();
        for buffer in buffers {
            guards.push((Arc::as_ptr(buffer) as *const (), read_lock(buffer)?));
        }
        Ok(Self { guards })
    }

    pub(crate) fn get(&self, buffer: &SharedRenderBuffer) -> Option<&RenderBuffer> {
        let key = Arc::as_ptr(buffer) as *const ();
        self.guards
            .iter()
            .find(|(ptr, _)| *ptr == key)
            .map(|(_, guard)| &**guard)
    }
}

pub(crate) fn read_lock(
    buffer: &SharedRenderBuffer,
) -> EmberResult<RwLockReadGuard<'_, RenderBuffer>> {
    buffer
        .read()
        .map_err(|_| EmberError::render("render buffer lock poisoned"))
}

pub(crate) fn write_lock(
    buffer: &SharedRenderBuffer,
) -> EmberResult<RwLockWriteGuard<'_, RenderBuffer>> {
    buffer
        .write()
        .map_err(|_| EmberError::render("render buffer lock poisoned"))
}

/// Hands out tiles to render workers and takes them back.
///
/// Implementations are shared by every worker of a render task.
pub trait TileSource: Send + Sync {
    /// Next tile to work on, or `None` when the queue is exhausted.
    fn acquire_tile(&self) -> Option<RenderTile>;

    /// Take back a tile in a terminal state.
    fn release_tile(&self, tile: RenderTile);

    /// The 3×3 neighborhood of `center`, itself included in slot 4.
    fn neighbor_tiles(&self, center: &RenderTile) -> TileNeighbors;
}

/// What happened to a released tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileOutcome {
    /// Tile id.
    pub id: usize,
    /// Terminal state reached before release.
    pub state: TileState,
    /// Samples completed.
    pub sample: u32,
    /// Failure message, if any.
    pub error: Option<String>,
}

#[derive(Debug)]
struct GridCell {
    rect: PixelRect,
    buffer: SharedRenderBuffer,
    offset: i64,
    stride: i64,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<usize>,
    outcomes: Vec<TileOutcome>,
}

/// Regular grid of tiles, each with its own render buffer.
///
/// Every tile buffer covers the tile plus `overscan` pixels on each side, so path-trace tiles
/// can be denoised on their own.
#[derive(Debug)]
pub struct TileQueue {
    columns: usize,
    rows: usize,
    cells: Vec<GridCell>,
    overscan: i32,
    task: Mutex<(TileTask, SampleRange)>,
    state: Mutex<QueueState>,
}

impl TileQueue {
    /// Split `image` into `tile_size` tiles and allocate their buffers.
    pub fn new(
        image: PixelRect,
        tile_size: (i32, i32),
        film: &FilmParams,
        overscan: i32,
        task: TileTask,
        samples: SampleRange,
    ) -> EmberResult<Self> {
        if image.is_empty() {
            return Err(EmberError::validation("tile queue image must not be empty"));
        }
        if tile_size.0 <= 0 || tile_size.1 <= 0 {
            return Err(EmberError::validation("tile size must be >= 1"));
        }
        if overscan < 0 {
            return Err(EmberError::validation("tile overscan must be >= 0"));
        }

        let columns = (image.width() as usize).div_ceil(tile_size.0 as usize);
        let rows = (image.height() as usize).div_ceil(tile_size.1 as usize);
        let mut cells = Vec::with_capacity(columns * rows);
        for row in 0..rows as i32 {
            for column in 0..columns as i32 {
                let x0 = image.x0 + column * tile_size.0;
                let y0 = image.y0 + row * tile_size.1;
                let rect = PixelRect::new(
                    x0,
                    y0,
                    (x0 + tile_size.0).min(image.x1),
                    (y0 + tile_size.1).min(image.y1),
                );
                let covered = rect.inflate(overscan);
                let mut params = BufferParams::new(
                    covered.width() as usize,
                    covered.height() as usize,
                    film.clone(),
                );
                params.overscan = overscan;
                let mut buffer = RenderBuffer::new(params)?;
                buffer.seed_rng(cells.len() as u32);

                let stride = i64::from(covered.width());
                cells.push(GridCell {
                    rect,
                    buffer: buffer.into_shared(),
                    offset: -(i64::from(covered.x0) + i64::from(covered.y0) * stride),
                    stride,
                });
            }
        }

        tracing::debug!(columns, rows, overscan, "tile queue created");
        Ok(Self {
            columns,
            rows,
            cells,
            overscan,
            task: Mutex::new((task, samples)),
            state: Mutex::new(QueueState {
                pending: (0..columns * rows).collect(),
                outcomes: Vec::new(),
            }),
        })
    }

    /// Grid size as `(columns, rows)`.
    pub fn grid(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Return `true` when the grid has no tiles.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Placement of every tile (without overscan), in id order.
    pub fn layout(&self) -> Vec<NeighborTile> {
        (0..self.cells.len()).filter_map(|id| self.neighbor(id)).collect()
    }

    /// Queue every tile again for `task` over `samples` and forget previous outcomes.
    pub fn restart(&self, task: TileTask, samples: SampleRange) {
        *lock(&self.task) = (task, samples);
        let mut state = lock(&self.state);
        state.pending = (0..self.cells.len()).collect();
        state.outcomes.clear();
    }

    /// Outcomes of the tiles released so far, ordered by id.
    pub fn outcomes(&self) -> Vec<TileOutcome> {
        let mut outcomes = lock(&self.state).outcomes.clone();
        outcomes.sort_by_key(|o| o.id);
        outcomes
    }

    fn neighbor(&self, id: usize) -> Option<NeighborTile> {
        let cell = self.cells.get(id)?;
        Some(NeighborTile {
            rect: cell.rect,
            buffer: Arc::clone(&cell.buffer),
            offset: cell.offset,
            stride: cell.stride,
        })
    }
}

impl TileSource for TileQueue {
    fn acquire_tile(&self) -> Option<RenderTile> {
        let (task, samples) = *lock(&self.task);
        loop {
            let id = lock(&self.state).pending.pop_front()?;
            let cell = &self.cells[id];
            let rect = match task {
                TileTask::PathTrace => cell.rect.inflate(self.overscan),
                TileTask::Denoise => cell.rect,
            };
            let tile = RenderTile::new(
                id,
                rect,
                task,
                samples,
                Arc::clone(&cell.buffer),
                cell.offset,
                cell.stride,
            );
            match tile {
                Ok(tile) => return Some(tile),
                Err(e) => {
                    tracing::error!(tile = id, error = %e, "skipping invalid tile");
                    lock(&self.state).outcomes.push(TileOutcome {
                        id,
                        state: TileState::Failed,
                        sample: samples.start,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
    }

    fn release_tile(&self, mut tile: RenderTile) {
        let outcome = TileOutcome {
            id: tile.id,
            state: tile.state(),
            sample: tile.sample,
            error: tile.error.take(),
        };
        tile.release();
        lock(&self.state).outcomes.push(outcome);
    }

    fn neighbor_tiles(&self, center: &RenderTile) -> TileNeighbors {
        let mut neighbors = TileNeighbors::default();
        let column = (center.id % self.columns.max(1)) as i64;
        let row = (center.id / self.columns.max(1)) as i64;
        for dy in -1..=1i64 {
            for dx in -1..=1i64 {
                let (c, r) = (column + dx, row + dy);
                if c < 0 || r < 0 || c >= self.columns as i64 || r >= self.rows as i64 {
                    continue;
                }
                let slot = ((dy + 1) * 3 + dx + 1) as usize;
                neighbors.tiles[slot] = self.neighbor(r as usize * self.columns + c as usize);
            }
        }
        neighbors
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "../../tests/unit/device/tile.rs"]
mod tests;
