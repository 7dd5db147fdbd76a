// src/config/mod.rs

//! Plan file loading and validation for agentplan.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan file from disk (`loader.rs`).
//! - Validate structural invariants and report cycles (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigSection, ContentSection, PlanFile, PlanSection, RawPlanFile, TaskConfig};
