//! Table navigation over the engine stack
//!
//! Opens and closes table handles, pushes arbitrary elements (by key, by
//! position, or by global name), and supports key enumeration. Handles are
//! stack slots with a strict LIFO lifecycle: a handle opened later must be
//! closed before any handle opened earlier, and [`close`] consumes the handle
//! so a double close cannot compile.

use tracing::{debug, warn};
use vm::{Engine, TypeTag};

use crate::error::{Error, Result};

/// Selector for one table entry: by string key or by integer position.
///
/// The original interface took both and preferred the key; a selector makes
/// the ambiguous combination unrepresentable.
#[derive(Debug, Clone, Copy)]
pub enum Sel<'a> {
    /// Entry under a string key
    Key(&'a str),
    /// Entry at a 1-based integer position
    Index(i64),
}

/// A stack slot known to hold a table.
///
/// Valid until the stack is truncated at or below its slot; not `Clone`, so
/// the close-exactly-once rule is enforced by ownership.
#[derive(Debug)]
pub struct TableHandle {
    slot: usize,
}

impl TableHandle {
    /// The 1-based stack slot this handle pins
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn at(slot: usize) -> Self {
        TableHandle { slot }
    }
}

/// Open the global named `name` as a table handle.
///
/// `None` means absent or not table-typed; that is a normal outcome for the
/// caller to check, not an error. The stack is restored in that case.
pub fn open_global(engine: &mut Engine, name: &str) -> Option<TableHandle> {
    let tag = push_global(engine, name);
    finish_open(engine, tag)
}

/// Open `parent[sel]` as a table handle; same absent semantics as
/// [`open_global`]
pub fn open_entry(engine: &mut Engine, parent: &TableHandle, sel: Sel) -> Option<TableHandle> {
    let tag = push(engine, parent, sel);
    finish_open(engine, tag)
}

/// Create a brand-new empty table and open it
pub fn open_new(engine: &mut Engine) -> TableHandle {
    engine.create_table();
    TableHandle::at(engine.top())
}

/// Bind the table already on the stack top, typically one just pushed from
/// a reference.
///
/// Returns `None` without touching the stack when the top is not a table;
/// the caller still owns that value.
pub fn open_top(engine: &mut Engine) -> Option<TableHandle> {
    if top_type(engine) == TypeTag::Table {
        Some(TableHandle::at(engine.top()))
    } else {
        None
    }
}

fn finish_open(engine: &mut Engine, tag: TypeTag) -> Option<TableHandle> {
    if tag == TypeTag::Table {
        Some(TableHandle::at(engine.top()))
    } else {
        debug!(found = tag.name(), "open target is not a table");
        engine.pop(1);
        None
    }
}

/// Close a handle, truncating the stack to one below its slot.
///
/// Must be called exactly once per successful open, in reverse order of
/// opening. Closing a handle whose slot is already above the stack top means
/// a later-opened handle outlived it; that violation is reported rather than
/// silently tolerated.
pub fn close(engine: &mut Engine, handle: TableHandle) -> Result<()> {
    let top = engine.top();
    if handle.slot > top {
        return Err(Error::StackDiscipline(format!(
            "closing handle at slot {} with stack top at {}; handles must close in reverse order of opening",
            handle.slot, top
        )));
    }
    engine.set_top(handle.slot - 1);
    Ok(())
}

/// Open `parent[sel]`, run `body`, and close again on every exit path.
///
/// Returns `None` when the entry is absent or not a table.
pub fn with_entry<R>(
    engine: &mut Engine,
    parent: &TableHandle,
    sel: Sel,
    body: impl FnOnce(&mut Engine, &TableHandle) -> R,
) -> Option<R> {
    let handle = open_entry(engine, parent, sel)?;
    let result = body(engine, &handle);
    if let Err(err) = close(engine, handle) {
        warn!(%err, "scoped close failed");
    }
    Some(result)
}

/// Scoped form of [`open_global`]; see [`with_entry`]
pub fn with_global<R>(
    engine: &mut Engine,
    name: &str,
    body: impl FnOnce(&mut Engine, &TableHandle) -> R,
) -> Option<R> {
    let handle = open_global(engine, name)?;
    let result = body(engine, &handle);
    if let Err(err) = close(engine, handle) {
        warn!(%err, "scoped close failed");
    }
    Some(result)
}

/// Push `handle[sel]` and report its type; absent entries push nil.
///
/// Always one net new slot. A handle that no longer points at a table (a
/// discipline violation elsewhere) pushes nil and reports `TypeTag::None`,
/// which is how the corruption stays recognizable.
pub fn push(engine: &mut Engine, handle: &TableHandle, sel: Sel) -> TypeTag {
    let result = match sel {
        Sel::Key(key) => engine.raw_get_key(handle.slot, key),
        Sel::Index(index) => engine.raw_get_index(handle.slot, index),
    };
    match result {
        Ok(tag) => tag,
        Err(err) => {
            warn!(%err, slot = handle.slot, "table read through an unusable handle");
            engine.push_nil();
            TypeTag::None
        }
    }
}

/// Push the global named `name` and report its type; one net new slot
pub fn push_global(engine: &mut Engine, name: &str) -> TypeTag {
    engine.get_global(name)
}

/// The "no selector" form: report the type of the current top without
/// touching the stack
pub fn top_type(engine: &Engine) -> TypeTag {
    engine.type_at(engine.top())
}

/// Resolve exactly like [`push`] and report the type.
///
/// The resolved value is left on the stack; the caller pops it.
pub fn type_of(engine: &mut Engine, handle: &TableHandle, sel: Sel) -> TypeTag {
    push(engine, handle, sel)
}

/// Begin enumeration of `handle`'s entries.
///
/// Pushes the first key/value pair if the table is non-empty and returns
/// whether it is. To continue, pop the value (keep the key) and call
/// [`advance`].
pub fn first(engine: &mut Engine, handle: &TableHandle) -> bool {
    engine.push_nil();
    advance(engine, handle)
}

/// Consume the key at the top and push the next key/value pair.
///
/// Returns `false`, pushing nothing, once the table is exhausted.
pub fn advance(engine: &mut Engine, handle: &TableHandle) -> bool {
    match engine.next_entry(handle.slot) {
        Ok(more) => more,
        Err(err) => {
            warn!(%err, slot = handle.slot, "enumeration through an unusable handle");
            false
        }
    }
}

/// Count every entry by full enumeration.
///
/// Deliberately the total entry count, not a sequence length, and O(entries);
/// the engine's sequence-length primitive covers the fast contiguous case.
pub fn length(engine: &mut Engine, handle: &TableHandle) -> usize {
    let mut count = 0;
    let mut more = first(engine, handle);
    while more {
        count += 1;
        engine.pop(1); // drop the value, keep the key
        more = advance(engine, handle);
    }
    count
}
