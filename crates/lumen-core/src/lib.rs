//! Core types and traits for the Lumen renderer.
//!
//! This crate provides the foundational types used throughout the engine:
//! - Error severity classification
//! - Object ID allocation
//! - Frame timing

pub mod error;
pub mod id;
pub mod time;

pub use error::Severity;
pub use id::{IdAllocator, ObjectId};
pub use time::FrameClock;
