//! HTTP handlers, one module per resource. Each module exposes a
//! `router()` building its route subtree.

pub mod effects;
pub mod generations;
pub mod health;
pub mod videos;
