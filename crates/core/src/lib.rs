//! Domain types shared by every retroreel crate.
//!
//! This crate has no internal dependencies. It holds the error
//! taxonomy, the generation request model and its validation rules,
//! the closed effect enumeration with its typed parameter records, and
//! the artifact filename conventions.

pub mod effects;
pub mod error;
pub mod generation;
pub mod naming;

pub use error::CoreError;
