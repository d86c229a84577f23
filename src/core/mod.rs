//! Core types for the hook engine
//!
//! This module provides the fundamental types used throughout the crate:
//! - `Value` / `ObjectHandle` - Arguments and return values
//! - `Hookable` / `ObjectId` - The host object boundary
//! - `ClassTable` - Class hierarchy with a cached lineage
//! - `HookError` - Error types

pub mod classes;
pub mod error;
pub mod object;
pub mod value;

pub use classes::{ClassInfo, ClassTable};
pub use error::{HookError, HookResult};
pub use object::{Hookable, ObjectId};
pub use value::{ObjectHandle, PrimitiveTag, Value};
