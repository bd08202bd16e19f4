// src/handlers/mod.rs

pub mod freshness;
pub mod report;
