//! Axum HTTP handlers for the caller-facing operations.

pub mod commits;
pub mod projects;
pub mod questions;
