//! Kernel signatures, shared kernel data and the denoising filter family.

pub mod external;
pub mod filter;
pub mod globals;
