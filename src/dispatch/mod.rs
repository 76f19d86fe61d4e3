//! Runtime selection of kernel implementations by CPU instruction-set tier.

pub mod cpu;
pub mod table;
pub mod tiers;
