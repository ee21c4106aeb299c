// src/core/mod.rs

pub mod scoring;
pub mod session;
