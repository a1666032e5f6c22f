//! Function invocation workflow
//!
//! A small state machine around a callable handle: acquire, accumulate
//! arguments, invoke, read results, reset or close.
//!
//! The callable stays at its base slot for the handle's whole life. Each
//! round of arguments goes after a fresh working copy of it, and the
//! protected call consumes the copy; that is what lets one handle be invoked
//! any number of times before closing.

use tracing::{debug, trace, warn};
use vm::{Engine, TypeTag};

use crate::access;
use crate::error::{self, Error, ErrorFlags, Result};
use crate::extract::ToStack;
use crate::navigator::{self, Sel, TableHandle};
use crate::refs::{self, ScriptRef};

/// Argument-accumulation state of a callable handle.
///
/// The historical encoding used an argument count of -1 for "a call consumed
/// the arguments"; the state is its own type here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Arguments are being accumulated
    Bound(u32),
    /// A call attempt consumed the arguments; the next push starts fresh
    Invoked,
}

/// A callable value pinned at a stack slot, plus call bookkeeping.
#[derive(Debug)]
pub struct CallHandle {
    base: usize,
    state: CallState,
    id: u64,
}

impl CallHandle {
    /// The slot holding the callable; arguments accumulate above it
    pub fn base_slot(&self) -> usize {
        self.base
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Identity tag of the callable: opaque, order-independent, collision
    /// resistant enough for logging and equality, never for dereferencing
    pub fn identity(&self) -> u64 {
        self.id
    }
}

fn bind_top(engine: &mut Engine) -> Option<CallHandle> {
    let slot = engine.top();
    if engine.type_at(slot) != TypeTag::Func {
        return None;
    }
    let id = engine.value_id(slot).unwrap_or(0);
    trace!(slot, id, "bound callable");
    Some(CallHandle {
        base: slot,
        state: CallState::Bound(0),
        id,
    })
}

/// Locate `parent[sel]`, duplicate it onto the top, and bind it.
///
/// Restores the stack and returns `None` when the entry is not callable.
pub fn open_from_table(
    engine: &mut Engine,
    parent: &TableHandle,
    sel: Sel,
) -> Option<CallHandle> {
    let tag = navigator::push(engine, parent, sel);
    match bind_top(engine) {
        Some(handle) => Some(handle),
        None => {
            debug!(found = tag.name(), "open target is not callable");
            engine.pop(1);
            None
        }
    }
}

/// Push the referenced value and bind it; `None` if it is not callable
pub fn open_from_reference(engine: &mut Engine, reference: &ScriptRef) -> Option<CallHandle> {
    let tag = refs::push(engine, reference);
    match bind_top(engine) {
        Some(handle) => Some(handle),
        None => {
            debug!(found = tag.name(), "referenced value is not callable");
            engine.pop(1);
            None
        }
    }
}

/// Bind whatever is already on the stack top.
///
/// The top value becomes the handle's base; nothing is pushed, and on a
/// non-callable top nothing is popped either (the caller owns that value).
pub fn open_from_top(engine: &mut Engine) -> Option<CallHandle> {
    bind_top(engine)
}

fn begin_arg(engine: &mut Engine, handle: &mut CallHandle) {
    match handle.state {
        CallState::Invoked => {
            // implicit fresh call: stale results go, a new working copy comes
            engine.set_top(handle.base);
            engine.push_slot(handle.base);
            handle.state = CallState::Bound(0);
        }
        CallState::Bound(0) if engine.top() == handle.base => {
            engine.push_slot(handle.base);
        }
        CallState::Bound(_) => {}
    }
}

fn bump(handle: &mut CallHandle) {
    if let CallState::Bound(count) = handle.state {
        handle.state = CallState::Bound(count + 1);
    }
}

/// Push one argument.
///
/// On an `Invoked` handle this implicitly starts a fresh call: the previous
/// results are discarded and the count restarts at zero.
pub fn push_arg<T: ToStack>(engine: &mut Engine, handle: &mut CallHandle, value: T) {
    begin_arg(engine, handle);
    value.push_onto(engine);
    bump(handle);
}

/// Use whatever is already on the stack top as the next argument
pub fn push_arg_from_top(engine: &mut Engine, handle: &mut CallHandle) {
    let value = match engine.value_at(engine.top()) {
        Some(v) => v.clone(),
        None => {
            warn!("no value on the stack to pass as an argument");
            return;
        }
    };
    engine.pop(1);
    begin_arg(engine, handle);
    engine.push(value);
    bump(handle);
}

/// Materialize `items` as a fresh array table and pass it as one argument
pub fn push_arg_array<T: ToStack + Clone>(
    engine: &mut Engine,
    handle: &mut CallHandle,
    items: &[T],
) {
    begin_arg(engine, handle);
    let array = access::build_array(engine, items);
    drop(array); // the table value on the stack is the argument itself
    bump(handle);
}

/// Perform the protected call with the accumulated arguments.
///
/// The arguments are consumed by the attempt no matter the outcome, and the
/// handle becomes `Invoked`. On success `expected_results` values sit above
/// the callable, ready for extraction (the last result is at the top). On
/// failure the engine's error value is popped and returned as the message.
pub fn invoke(
    engine: &mut Engine,
    handle: &mut CallHandle,
    expected_results: usize,
) -> (ErrorFlags, Option<String>) {
    let nargs = match handle.state {
        CallState::Bound(count) => count as usize,
        CallState::Invoked => {
            // a fresh call with no arguments pushed
            engine.set_top(handle.base);
            0
        }
    };
    if engine.top() == handle.base {
        // zero-argument call: no push created the working copy yet
        engine.push_slot(handle.base);
    }

    let status = engine.protected_call(nargs, expected_results);
    handle.state = CallState::Invoked;

    if status.is_ok() {
        trace!(id = handle.id, nargs, expected_results, "invocation succeeded");
        (ErrorFlags::empty(), None)
    } else {
        let message = error::take_error_message(engine);
        debug!(id = handle.id, ?status, %message, "invocation failed");
        (ErrorFlags::FATAL, Some(message))
    }
}

/// Close the handle: truncate to one below the callable, discarding it along
/// with any leftover arguments and unread results.
///
/// Must be called exactly once; ownership makes a second close impossible.
pub fn close(engine: &mut Engine, handle: CallHandle) -> Result<()> {
    let top = engine.top();
    if handle.base > top {
        return Err(Error::StackDiscipline(format!(
            "closing call handle at slot {} with stack top at {}",
            handle.base, top
        )));
    }
    engine.set_top(handle.base - 1);
    Ok(())
}
