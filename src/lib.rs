pub mod aggregate;
pub mod config;
pub mod isosurface;
pub mod output;
pub mod tendency;
pub mod thermo;
pub mod transformation;

// Re-export the core primitives for convenience
pub use xwmt_core;
