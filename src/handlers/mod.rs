//! HTTP handlers

pub mod health;
pub mod upload;
pub mod data;
