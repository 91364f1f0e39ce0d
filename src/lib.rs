//! Phosphor Engine: content interpreter for terminal-style interactive fiction.
//!
//! Loads a declarative content document (screens of text, links, toggles,
//! prompts and variables), keeps narrative state in a variable store,
//! dispatches typed commands to action chains, and formats text for an
//! incremental teletype reveal. Rendering, audio and persistence belong to
//! the host.

pub mod core;
pub mod schema;

pub use crate::core::interpreter::{Interpreter, InterpreterConfig, InterpreterError};
pub use crate::schema::document::Document;
