//! Read, edit, and write JVM classes
//!
//! The layers, from the bytes up:
//!
//!   - [`class_file`] is the raw, index-based class file format
//!   - [`code`] turns `Code` attributes into a label-based instruction list and back
//!   - [`class_graph`] knows about classes, their members, and how they relate
//!   - [`model`] ties these together: read a class, edit method bodies, write it out again
//!
//! ### Example
//!
//! Questions about types are answered by the class graph. Classes which were never supplied are
//! represented by placeholders, and questions about them may be undecidable:
//!
//! ```
//! use jweave::jvm::class_graph::{Assignable, ClassGraph, ClassGraphArenas, JavaLibrary};
//! use jweave::jvm::{BinaryName, Name};
//!
//! let arenas = ClassGraphArenas::new();
//! let graph = ClassGraph::new(&arenas);
//! let java = JavaLibrary::add_to_graph(&graph);
//!
//! assert_eq!(java.string.is_assignable(&java.char_sequence), Some(true));
//! assert_eq!(java.number.is_assignable(&java.string), Some(false));
//!
//! let unknown = graph.lookup_or_missing(&BinaryName::from_string(String::from("a/B")).unwrap());
//! assert_eq!(unknown.is_assignable(&java.string), None);
//! ```

mod access_flags;
pub mod class_file;
pub mod class_graph;
pub mod code;
mod descriptors;
mod errors;
pub mod model;
mod names;
mod references;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
pub use references::*;
