//! Durable references to script objects
//!
//! Converts an ephemeral stack position into a registry key and back, so a
//! script object can be held across unrelated calls without re-navigating
//! the object graph. This supersedes path-based navigation entirely: resolve
//! once, take a reference.

use tracing::{debug, warn};
use vm::{Engine, RefKey, TypeTag};

use crate::access::{self, Source};
use crate::error::ErrorFlags;

/// An owning registry key.
///
/// Move-only on purpose: [`release`] consumes it, so a double release is a
/// compile error, and a dropped-without-release key is the one remaining way
/// to leak a registry entry.
#[derive(Debug, PartialEq, Eq)]
pub struct ScriptRef {
    key: RefKey,
}

impl ScriptRef {
    /// The raw integer key, for logging
    pub fn key(&self) -> i64 {
        self.key.raw()
    }
}

/// Anchor the value at `source` in the registry.
///
/// Resolves exactly like the navigator push, falling back to the current
/// stack top for [`Source::Top`], then pops the resolved value into the
/// registry. Referencing nothing (an absent entry, or an empty stack) yields
/// no key and `NON_EXISTENT`.
pub fn create(engine: &mut Engine, source: Source) -> (Option<ScriptRef>, ErrorFlags) {
    let tag = access::resolve(engine, source);
    if tag == TypeTag::None && engine.top() == 0 {
        warn!("reference requested with nothing on the stack");
        return (None, ErrorFlags::NON_EXISTENT);
    }
    if tag.is_absent() {
        engine.pop(1);
        return (None, ErrorFlags::NON_EXISTENT);
    }
    match engine.registry_store() {
        Ok(key) => {
            debug!(key = key.raw(), kind = tag.name(), "created reference");
            (Some(ScriptRef { key }), ErrorFlags::empty())
        }
        Err(err) => {
            warn!(%err, "registry store failed");
            (None, ErrorFlags::NON_EXISTENT)
        }
    }
}

/// Push a copy of the referenced value onto the stack top.
///
/// The reference is not consumed; this may be called any number of times.
pub fn push(engine: &mut Engine, reference: &ScriptRef) -> TypeTag {
    engine.registry_fetch(reference.key)
}

/// Release the reference, freeing its registry entry and recycling the key
pub fn release(engine: &mut Engine, reference: ScriptRef) {
    debug!(key = reference.key(), "released reference");
    engine.registry_release(reference.key);
}
