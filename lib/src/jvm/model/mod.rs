//! Semantic representations of classes being woven
//!
//! A class file is lifted into a [`Class`]: the class and its members get registered in the class
//! graph and method bodies are decoded into [`Code`](crate::jvm::code::Code). Weaving edits
//! bodies through [`InstructionEdit`]s and serialization writes back only what changed.
//!
//!   - __Class__ is represented using [`Class`]
//!   - __Method__ is represented using [`Method`]
//!   - __Field__ (only added ones) is represented using [`Field`]
//!
//! In all of these cases, the classes have an `id` field to query the class graph representation.

mod class;
mod field;
mod method;

pub use class::*;
pub use field::*;
pub use method::*;
