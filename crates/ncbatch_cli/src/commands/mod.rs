//! CLI command implementations.

pub mod device;
pub mod inspect;
pub mod render;
