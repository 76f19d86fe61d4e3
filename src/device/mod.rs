//! CPU device: worker pool, task descriptors, tiles and the bodies that execute them.

pub mod cpu;
pub mod task;
pub mod task_pool;
pub mod tile;
pub(crate) mod tile_renderer;
