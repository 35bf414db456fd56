// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod discussion;
pub mod enrollment;
pub mod instructor;
pub mod notes;
pub mod notification;
pub mod profile;
pub mod quiz;
pub mod quiz_authoring;
pub mod review;
