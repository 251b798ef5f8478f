//! Compile-time aspect weaving for JVM class files
//!
//! [`jvm`] reads and writes classes, [`weaver`] finds join point shadows in them and splices in
//! calls to advice.

pub mod jvm;
pub mod util;
pub mod weaver;
