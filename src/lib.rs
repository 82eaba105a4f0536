pub mod entity;
pub mod error;
pub mod event;
pub mod geometry;
pub mod index;
pub mod operations;

pub use error::{HazardError, Result};
