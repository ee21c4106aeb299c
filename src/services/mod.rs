// src/services/mod.rs

pub mod feedback;
