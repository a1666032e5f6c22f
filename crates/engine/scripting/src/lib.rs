//! Dynamic-value bridge between host types and the embedded engine stack
//!
//! This crate provides:
//! - **Navigator**: open/close table handles and push arbitrary elements
//! - **Extraction**: typed reads off the stack top with default-or-fatal
//!   semantics and a shared error classification
//! - **Accessors**: net-zero get/set of scalars and 1-D arrays against a
//!   table handle or a global name
//! - **References**: durable registry keys for script objects held across
//!   unrelated calls
//! - **Invocation**: a state machine for calling script functions with
//!   host-supplied arguments
//!
//! Every operation pairs its pushes with pops on every exit path; the stack
//! the engine exposes is a single shared resource, and keeping it balanced
//! is the contract all of these components uphold together.
//!
//! # Example
//!
//! ```
//! use scripting::vm::Engine;
//! use scripting::{access, navigator, Sel, Source};
//!
//! let mut engine = Engine::new();
//!
//! // Build a table and publish it as the global `config`.
//! let cfg = navigator::open_new(&mut engine);
//! access::set(&mut engine, &cfg, Sel::Key("retries"), 3i64);
//! engine.push_slot(cfg.slot());
//! access::set_global_from_top(&mut engine, "config");
//! navigator::close(&mut engine, cfg).unwrap();
//!
//! // Read it back, defaulting the entry the script never set.
//! let cfg = navigator::open_global(&mut engine, "config").unwrap();
//! let (retries, flags) =
//!     access::get::<i64>(&mut engine, Source::Entry(&cfg, Sel::Key("retries")), None);
//! let (timeout, fallback) =
//!     access::get::<f64>(&mut engine, Source::Entry(&cfg, Sel::Key("timeout")), Some(1.5));
//! assert_eq!((retries, timeout), (3, 1.5));
//! assert!(flags.is_clean());
//! assert!(!fallback.is_clean() && !fallback.is_fatal());
//! navigator::close(&mut engine, cfg).unwrap();
//! assert_eq!(engine.top(), 0);
//! ```

pub mod access;
mod error;
pub mod extract;
pub mod invoke;
pub mod navigator;
pub mod refs;

pub use access::Source;
pub use error::{abort_on_error, ensure_ok, Error, ErrorFlags, Result};
pub use extract::{FromStack, LightPtr, ToStack};
pub use invoke::{CallHandle, CallState};
pub use navigator::{Sel, TableHandle};
pub use refs::ScriptRef;

// Re-export the engine crate for embedders and tests
pub use vm;
