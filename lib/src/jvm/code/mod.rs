//! Method bodies
//!
//! ### Structure
//!
//! Despite being pushed off into [just another method attribute](crate::jvm::class_file::Code),
//! the bytecode is the part of the class file that weaving actually edits. We split up the [list
//! of bytecode instructions][0] into two groups:
//!
//!   - [`Instruction`] for straight-line instructions
//!   - [`BranchInstruction`] for instructions that may jump, return, or throw
//!
//! A decoded [`Code`] is a flat list of these interleaved with [`SynLabel`]s. Advice calls get
//! spliced in by inserting items, and the labels keep jumps and exception ranges pointing at the
//! right places until the body is encoded again.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod code;
mod instructions;
mod label;

pub use code::*;
pub use instructions::*;
pub use label::*;
