// src/handlers/mod.rs

pub mod auth;
pub mod dashboard;
pub mod quiz;
pub mod topics;
