//! Infrastructure layer
//!
//! Concrete implementations of the domain's persistence seams.

pub mod knowledge;
