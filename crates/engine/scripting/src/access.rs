//! Table value accessors
//!
//! Composes the navigator with the extraction protocol so callers read and
//! write host-typed scalars and 1-D arrays against a table handle or a
//! global name without seeing the intermediate stack traffic. Every `get`
//! and `exists` is net zero on stack depth.

use tracing::warn;
use vm::{Engine, TypeTag};

use crate::error::ErrorFlags;
use crate::extract::{self, FromStack, ToStack};
use crate::navigator::{self, Sel, TableHandle};

/// Where a value comes from.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// A global, by name
    Global(&'a str),
    /// An entry of an open table
    Entry(&'a TableHandle, Sel<'a>),
    /// Whatever is already on the stack top; consumed by `get`
    Top,
}

/// Resolve a source onto the stack top, exactly like the navigator push.
///
/// `Top` resolves to the existing top and pushes nothing.
pub(crate) fn resolve(engine: &mut Engine, source: Source) -> TypeTag {
    match source {
        Source::Global(name) => navigator::push_global(engine, name),
        Source::Entry(handle, sel) => navigator::push(engine, handle, sel),
        Source::Top => navigator::top_type(engine),
    }
}

/// Read a host-typed scalar from `source`, with the extraction protocol's
/// default-or-fatal semantics. Net zero stack effect (for `Top`, the top
/// value itself is consumed).
pub fn get<T: FromStack>(engine: &mut Engine, source: Source, default: Option<T>) -> (T, ErrorFlags) {
    resolve(engine, source);
    extract::extract(engine, default)
}

/// [`get`] for strings with the bounded-buffer truncation policy
pub fn get_str_bounded(
    engine: &mut Engine,
    source: Source,
    max_len: usize,
    default: Option<String>,
) -> (String, ErrorFlags) {
    resolve(engine, source);
    extract::extract_str_bounded(engine, max_len, default)
}

/// Whether `source` resolves to anything at all; the stack is left exactly
/// as it was found
pub fn exists(engine: &mut Engine, source: Source) -> bool {
    let pushed = !matches!(source, Source::Top);
    let tag = resolve(engine, source);
    if pushed {
        engine.pop(1);
    }
    !tag.is_absent()
}

/// Store a host-typed scalar at `handle[sel]`
pub fn set<T: ToStack>(engine: &mut Engine, handle: &TableHandle, sel: Sel, value: T) {
    value.push_onto(engine);
    set_from_top(engine, handle, sel);
}

/// Store whatever is on the stack top at `handle[sel]`, consuming it.
///
/// Used when the value was produced by another component, such as a freshly
/// built array table.
pub fn set_from_top(engine: &mut Engine, handle: &TableHandle, sel: Sel) {
    let result = match sel {
        Sel::Key(key) => engine.raw_set_key(handle.slot(), key),
        Sel::Index(index) => engine.raw_set_index(handle.slot(), index),
    };
    if let Err(err) = result {
        warn!(%err, slot = handle.slot(), "table write through an unusable handle");
    }
}

/// Store a host-typed scalar under a global name
pub fn set_global<T: ToStack>(engine: &mut Engine, name: &str, value: T) {
    value.push_onto(engine);
    set_global_from_top(engine, name);
}

/// Store the stack top under a global name, consuming it
pub fn set_global_from_top(engine: &mut Engine, name: &str) {
    if let Err(err) = engine.set_global(name) {
        warn!(%err, name, "global write with nothing on the stack");
    }
}

/// Build a fresh array table from `items`, positions `1..=n`, and leave it
/// on the stack top. Element order is preserved.
pub(crate) fn build_array<T: ToStack + Clone>(engine: &mut Engine, items: &[T]) -> TableHandle {
    let array = navigator::open_new(engine);
    for (i, item) in items.iter().enumerate() {
        set(engine, &array, Sel::Index(i as i64 + 1), item.clone());
    }
    array
}

/// Store `items` as a 1-indexed array table at `handle[sel]`.
///
/// The builder opens its own sub-handle for the loop; the finished table is
/// consumed into the destination.
pub fn set_array<T: ToStack + Clone>(engine: &mut Engine, handle: &TableHandle, sel: Sel, items: &[T]) {
    let array = build_array(engine, items);
    set_from_top(engine, handle, sel);
    drop(array); // its slot went with the value it pinned
}

/// [`set_array`] straight into a global name
pub fn set_global_array<T: ToStack + Clone>(engine: &mut Engine, name: &str, items: &[T]) {
    let array = build_array(engine, items);
    set_global_from_top(engine, name);
    drop(array);
}

/// Read a 1-indexed array of `T` from `source`.
///
/// `element_default` applies per element. The first element-level
/// classification is the one reported, but the whole array is still read:
/// partial results beat none for configuration loading. A source that is not
/// a table at all yields an empty vector with `FATAL` set.
pub fn get_array<T: FromStack + Clone>(
    engine: &mut Engine,
    source: Source,
    element_default: Option<T>,
) -> (Vec<T>, ErrorFlags) {
    let had_slot = match source {
        Source::Top => engine.top() > 0,
        _ => true,
    };
    let tag = resolve(engine, source);

    if tag != TypeTag::Table {
        if had_slot {
            engine.pop(1);
        }
        let why = if tag.is_absent() {
            ErrorFlags::NON_EXISTENT
        } else {
            ErrorFlags::WRONG_TYPE
        };
        return (Vec::new(), why | ErrorFlags::FATAL);
    }

    let slot = engine.top();
    let len = engine.seq_len(slot).unwrap_or(0);
    let mut out = Vec::with_capacity(len as usize);
    let mut flags = ErrorFlags::empty();
    for i in 1..=len {
        if let Err(err) = engine.raw_get_index(slot, i) {
            warn!(%err, "array element read failed");
            engine.push_nil();
        }
        let (value, element_flags) = extract::extract(engine, element_default.clone());
        if flags.is_empty() {
            flags = element_flags;
        }
        out.push(value);
    }
    engine.pop(1); // the array table
    (out, flags)
}
