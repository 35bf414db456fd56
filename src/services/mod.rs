// src/services/mod.rs

pub mod access;
pub mod certificates;
pub mod notifications;
pub mod progress;
pub mod scoring;
