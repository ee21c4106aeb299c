// src/models/mod.rs

pub mod mastery;
pub mod question;
pub mod quiz;
pub mod topic;
pub mod user;
