//! Weave advice into classes
//!
//! Weaving a class goes through a fixed sequence of steps:
//!
//!   1. every [`shadow`] in the class is found
//!   2. each advice's [`pointcut`] is fast matched against the shape of the shadow, and the ones
//!      that aren't ruled out get fully matched, possibly leaving a [`residue`] to test at runtime
//!   3. advice matching the same shadow is ordered by [`precedence`](sort_by_precedence)
//!   4. calls to the advice are spliced into the shadow, guarded by the [`render`]ed residue
//!
//! Aspects are described by [`Aspect`] declarations, either built directly or extracted from
//! annotated aspect classes with [`Aspect::from_annotations`].

mod advice;
mod declarations;
mod diagnostics;
mod driver;
mod errors;
mod exposed_state;
mod match_value;
pub mod patterns;
pub mod pointcut;
mod precedence;
pub mod render;
pub mod residue;
mod settings;
pub mod shadow;
mod splice;
mod state;
pub mod syntax;

pub use advice::*;
pub use declarations::*;
pub use diagnostics::*;
pub use driver::*;
pub use errors::*;
pub use exposed_state::*;
pub use match_value::*;
pub use precedence::*;
pub use settings::*;
pub use state::*;
