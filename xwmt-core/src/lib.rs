pub mod bins;
pub mod calendar;
pub mod convergence;
pub mod dataset;
pub mod eos;
pub mod field;
pub mod grid;
pub mod remap;
pub mod taxonomy;

pub mod errors;
