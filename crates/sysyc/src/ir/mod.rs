//! The Koopa IR middle end.
//!
//! Phase A emits the IR as text; [`parser`] re-materializes that text as the
//! typed value graph in [`types`], which is what the code generator walks.
//! Round-tripping through text keeps the two phases decoupled and lets the
//! `-koopa` mode hand the intermediate form straight to the user.

pub mod parser;
mod types;

pub use parser::parse_program;
pub use types::*;
