//! Render buffers written by the kernels, the denoiser scratch buffer and display targets.

pub mod display_buffer;
pub mod film;
pub mod filter_buffer;
pub mod neighborhood;
pub mod render_buffer;
