//! src/generator/common/mod.rs
//!
//! Utilities shared by the sequential and parallel assemblers.

pub mod thread;
