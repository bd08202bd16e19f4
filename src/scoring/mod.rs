// src/scoring/mod.rs

pub mod aggregate;
pub mod grader;
pub mod mark;
pub mod response;
pub mod rows;

pub use aggregate::{Aggregator, MarkMatrix};
pub use mark::{Mark, resolve};
