//! Domain layer
//!
//! Contains the core pipeline logic and domain models.

pub mod knowledge;
