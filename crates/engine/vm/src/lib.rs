//! In-memory scripting engine for the bridge workspace
//!
//! This crate provides the stack-and-registry substrate an embedding host
//! programs against:
//!
//! - **Value stack**: 1-based slots, typed queries, duplication, truncation
//! - **Tables**: heap-allocated ordered maps keyed by integers and strings
//! - **Globals**: a distinguished table addressed by name
//! - **Protected calls**: host-registered callables whose failures come back
//!   as a [`Status`], never as an unwind
//! - **Registry**: a persistent store that anchors values beyond their stack
//!   lifetime
//!
//! Deliberately absent: bytecode, a parser, and a garbage collector. Script
//! behavior is supplied as host-registered native functions, which is all the
//! higher layers need.

mod engine;
mod error;
mod table;
mod value;

pub use engine::{Engine, EngineConfig, NativeFn, RefKey};
pub use error::{EngineError, Result, Status};
pub use table::Table;
pub use value::{FuncId, TableId, TableKey, TypeTag, Value};
