//! # Domain Layer
//!
//! Pure types for call-frame execution: value objects, call requests and
//! outcomes, and the per-frame gas meter. No containers, no interpreter.

pub mod entities;
pub mod gas;
pub mod value_objects;

pub use entities::*;
pub use gas::*;
pub use value_objects::*;
