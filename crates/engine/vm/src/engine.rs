//! The engine instance: value stack, table heap, globals, registry, and the
//! protected-call primitive.
//!
//! One [`Engine`] owns one implicit value stack. Slot indices are 1-based and
//! only valid until a push or pop changes the depth at or below them; nothing
//! here hands out owning references into the stack. All mutation goes through
//! `&mut self`, and the interior `Rc`s keep the type single-threaded.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::error::{EngineError, Result, Status};
use crate::table::Table;
use crate::value::{FuncId, TableId, TableKey, TypeTag, Value};

/// Host closure callable through [`Engine::protected_call`].
///
/// Receives the engine and the argument values, returns result values or an
/// error message. The message becomes the error value the protected call
/// leaves on the stack.
pub type NativeFn = dyn Fn(&mut Engine, Vec<Value>) -> std::result::Result<Vec<Value>, String>;

/// Construction parameters for an [`Engine`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Stack capacity reserved up front
    pub stack_capacity: usize,
    /// Hard stack depth limit; pushing past it panics, mirroring how the
    /// engine family this models aborts on stack exhaustion
    pub max_stack_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stack_capacity: 64,
            max_stack_depth: 4096,
        }
    }
}

/// A registry key, decoupled from any stack position.
///
/// Keys stay valid until released, no matter what happens on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefKey(pub(crate) i64);

impl RefKey {
    /// The raw integer key, for logging
    pub fn raw(self) -> i64 {
        self.0
    }
}

/// One embedded engine instance.
///
/// Owns the stack and the registry. Everything else in the workspace borrows
/// it for the duration of a call and must not outlive it.
pub struct Engine {
    stack: Vec<Value>,
    tables: HashMap<u64, Table>,
    funcs: HashMap<u64, Rc<NativeFn>>,
    next_obj: u64,
    globals: TableId,
    registry: HashMap<i64, Value>,
    registry_free: Vec<i64>,
    next_ref: i64,
    config: EngineConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut engine = Engine {
            stack: Vec::with_capacity(config.stack_capacity),
            tables: HashMap::new(),
            funcs: HashMap::new(),
            next_obj: 1,
            globals: TableId(0),
            registry: HashMap::new(),
            registry_free: Vec::new(),
            next_ref: 1,
            config,
        };
        let id = engine.alloc_id();
        engine.tables.insert(id, Table::default());
        engine.globals = TableId(id);
        engine
    }

    // ===== Stack primitives =====

    /// Index of the topmost slot; 0 means the stack is empty
    pub fn top(&self) -> usize {
        self.stack.len()
    }

    /// Truncate to `n` slots, or grow to `n` by pushing nil
    pub fn set_top(&mut self, n: usize) {
        while self.stack.len() < n {
            self.push(Value::Nil);
        }
        self.stack.truncate(n);
    }

    /// Pop `n` slots; popping past the bottom clears the stack and is logged
    pub fn pop(&mut self, n: usize) {
        if n > self.stack.len() {
            warn!(
                requested = n,
                depth = self.stack.len(),
                "pop past the stack bottom"
            );
            self.stack.clear();
        } else {
            let keep = self.stack.len() - n;
            self.stack.truncate(keep);
        }
    }

    /// Push a value onto the stack.
    ///
    /// Panics if the configured hard depth limit is exceeded; that limit
    /// exists to catch unbalanced push loops, not to be driven to.
    pub fn push(&mut self, value: Value) {
        if self.stack.len() >= self.config.max_stack_depth {
            panic!(
                "stack overflow: hard depth limit {} reached",
                self.config.max_stack_depth
            );
        }
        self.stack.push(value);
    }

    pub fn push_nil(&mut self) {
        self.push(Value::Nil);
    }

    pub fn push_bool(&mut self, b: bool) {
        self.push(Value::Bool(b));
    }

    pub fn push_int(&mut self, i: i64) {
        self.push(Value::Int(i));
    }

    pub fn push_num(&mut self, n: f64) {
        self.push(Value::Num(n));
    }

    pub fn push_str(&mut self, s: &str) {
        self.push(Value::from(s));
    }

    pub fn push_light_ptr(&mut self, p: usize) {
        self.push(Value::LightPtr(p));
    }

    /// Duplicate the value at `slot` onto the top.
    ///
    /// An invalid slot duplicates as nil, so the net effect on depth is
    /// always +1.
    pub fn push_slot(&mut self, slot: usize) {
        let value = match self.value_at(slot) {
            Some(v) => v.clone(),
            None => {
                warn!(slot, top = self.top(), "duplicating an invalid slot");
                Value::Nil
            }
        };
        self.push(value);
    }

    /// Type tag at `slot`; `TypeTag::None` when the slot does not exist
    pub fn type_at(&self, slot: usize) -> TypeTag {
        match self.value_at(slot) {
            Some(v) => v.type_tag(),
            None => TypeTag::None,
        }
    }

    /// Borrow the value at a 1-based slot index
    pub fn value_at(&self, slot: usize) -> Option<&Value> {
        if slot == 0 || slot > self.stack.len() {
            return None;
        }
        Some(&self.stack[slot - 1])
    }

    /// 64-bit identity of the heap object at `slot`.
    ///
    /// Stable for the life of the engine, usable for logging and equality,
    /// never for dereferencing. Scalars have no identity.
    pub fn value_id(&self, slot: usize) -> Option<u64> {
        match self.value_at(slot)? {
            Value::Table(id) => Some(id.0),
            Value::Func(id) => Some(id.0),
            _ => None,
        }
    }

    // ===== Tables =====

    /// Allocate a fresh empty table and push it
    pub fn create_table(&mut self) {
        let id = self.alloc_id();
        self.tables.insert(id, Table::default());
        trace!(id, "created table");
        self.push(Value::Table(TableId(id)));
    }

    /// Push `t[key]` where `t` is the table at `tslot`; nil when absent.
    ///
    /// Returns the type tag of the pushed value. Nothing is pushed on error.
    pub fn raw_get_key(&mut self, tslot: usize, key: &str) -> Result<TypeTag> {
        let value = self.table_at(tslot)?.get(&TableKey::from(key));
        let tag = value.type_tag();
        self.push(value);
        Ok(tag)
    }

    /// Push `t[index]`; nil when absent. Nothing is pushed on error.
    pub fn raw_get_index(&mut self, tslot: usize, index: i64) -> Result<TypeTag> {
        let value = self.table_at(tslot)?.get(&TableKey::from(index));
        let tag = value.type_tag();
        self.push(value);
        Ok(tag)
    }

    /// Pop the top value into `t[key]`.
    ///
    /// The top value is consumed even when the target slot is not a table.
    pub fn raw_set_key(&mut self, tslot: usize, key: &str) -> Result<()> {
        let value = self.take_top()?;
        let key = TableKey::from(key);
        self.table_mut_at(tslot)?.set(key, value);
        Ok(())
    }

    /// Pop the top value into `t[index]`; same consumption rule as
    /// [`Engine::raw_set_key`]
    pub fn raw_set_index(&mut self, tslot: usize, index: i64) -> Result<()> {
        let value = self.take_top()?;
        self.table_mut_at(tslot)?.set(TableKey::from(index), value);
        Ok(())
    }

    /// Advance table enumeration.
    ///
    /// Consumes the key at the top (nil starts from the beginning), then
    /// either pushes the next key/value pair and returns `true`, or pushes
    /// nothing and returns `false` when the table is exhausted. The key is
    /// consumed in every case, including errors.
    pub fn next_entry(&mut self, tslot: usize) -> Result<bool> {
        let prev_value = self.take_top()?;
        let prev_key = match &prev_value {
            Value::Nil => None,
            v => match TableKey::from_value(v) {
                Some(k) => Some(k),
                None => {
                    warn!(kind = v.type_name(), "enumeration key of unusable type");
                    return Ok(false);
                }
            },
        };
        let next = self.table_at(tslot)?.next_after(prev_key.as_ref());
        match next {
            Some((key, value)) => {
                self.push(key.to_value());
                self.push(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Contiguous sequence length of the table at `tslot` (positions
    /// `1..=n`); cheap, unlike a full entry count
    pub fn seq_len(&self, tslot: usize) -> Result<i64> {
        Ok(self.table_at(tslot)?.seq_len())
    }

    // ===== Globals =====

    /// Push the global named `name`; nil when unset
    pub fn get_global(&mut self, name: &str) -> TypeTag {
        let value = self.globals_table().get(&TableKey::from(name));
        let tag = value.type_tag();
        self.push(value);
        tag
    }

    /// Pop the top value into the global named `name`
    pub fn set_global(&mut self, name: &str) -> Result<()> {
        let value = self.take_top()?;
        let key = TableKey::from(name);
        self.globals_table_mut().set(key, value);
        Ok(())
    }

    // ===== Functions and protected calls =====

    /// Wrap a host closure as a function value and push it
    pub fn register_native<F>(&mut self, f: F)
    where
        F: Fn(&mut Engine, Vec<Value>) -> std::result::Result<Vec<Value>, String> + 'static,
    {
        let id = self.alloc_id();
        self.funcs.insert(id, Rc::new(f));
        trace!(id, "registered native function");
        self.push(Value::Func(FuncId(id)));
    }

    /// Register a host closure directly under a global name
    pub fn register_global_fn<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut Engine, Vec<Value>) -> std::result::Result<Vec<Value>, String> + 'static,
    {
        self.register_native(f);
        // the function value was just pushed, set_global cannot underflow
        let _ = self.set_global(name);
    }

    /// Call the value below the top `nargs` slots with those slots as
    /// arguments.
    ///
    /// The callable and the arguments are always consumed. On success exactly
    /// `nresults` values are pushed, padded with nil or truncated as needed.
    /// On failure one error-message value is pushed instead, and the status
    /// says why. Callee panics are not caught; callee errors never unwind
    /// into the host.
    pub fn protected_call(&mut self, nargs: usize, nresults: usize) -> Status {
        if self.stack.len() < nargs + 1 {
            warn!(
                nargs,
                depth = self.stack.len(),
                "protected call without callable and arguments on the stack"
            );
            self.push_str("not enough values on the stack for the call");
            return Status::Unhandled;
        }

        let func_pos = self.stack.len() - nargs - 1;
        let args = self.stack.split_off(func_pos + 1);
        let callee = match self.stack.pop() {
            Some(v) => v,
            None => unreachable!("depth checked above"),
        };
        let base = self.stack.len();

        let outcome = match callee {
            Value::Func(id) => match self.funcs.get(&id.0) {
                Some(f) => {
                    let f = Rc::clone(f);
                    trace!(id = id.0, nargs, "dispatching protected call");
                    f(self, args)
                }
                None => Err("attempt to call a dangling function value".to_string()),
            },
            other => Err(format!("attempt to call a {} value", other.type_name())),
        };

        // Whatever the callee left behind is discarded before results or the
        // error value go on; the caller sees exactly the documented effect.
        self.stack.truncate(base);

        match outcome {
            Ok(results) => {
                let produced = results.len();
                for value in results.into_iter().take(nresults) {
                    self.push(value);
                }
                for _ in produced.min(nresults)..nresults {
                    self.push_nil();
                }
                Status::Ok
            }
            Err(message) => {
                debug!(%message, "protected call failed");
                self.push_str(&message);
                Status::Runtime
            }
        }
    }

    // ===== Registry =====

    /// Pop the top value and anchor it in the registry under a fresh key
    pub fn registry_store(&mut self) -> Result<RefKey> {
        let value = self.take_top()?;
        let key = match self.registry_free.pop() {
            Some(k) => k,
            None => {
                let k = self.next_ref;
                self.next_ref += 1;
                k
            }
        };
        trace!(key, kind = value.type_name(), "stored registry entry");
        self.registry.insert(key, value);
        Ok(RefKey(key))
    }

    /// Push a copy of the registry entry for `key`; the entry stays put.
    ///
    /// An unknown key pushes nil, keeping the depth effect uniform.
    pub fn registry_fetch(&mut self, key: RefKey) -> TypeTag {
        let value = match self.registry.get(&key.0) {
            Some(v) => v.clone(),
            None => {
                warn!(key = key.0, "fetch of unknown registry key");
                Value::Nil
            }
        };
        let tag = value.type_tag();
        self.push(value);
        tag
    }

    /// Drop the registry entry for `key` and recycle the key
    pub fn registry_release(&mut self, key: RefKey) {
        if self.registry.remove(&key.0).is_some() {
            trace!(key = key.0, "released registry entry");
            self.registry_free.push(key.0);
        } else {
            warn!(key = key.0, "release of unknown registry key");
        }
    }

    /// Number of live registry entries, for leak checks
    pub fn registry_len(&self) -> usize {
        self.registry.len()
    }

    // ===== Internals =====

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_obj;
        self.next_obj += 1;
        id
    }

    fn take_top(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(EngineError::StackUnderflow {
            needed: 1,
            available: 0,
        })
    }

    fn table_at(&self, slot: usize) -> Result<&Table> {
        let value = self.value_at(slot).ok_or(EngineError::InvalidSlot {
            slot,
            top: self.stack.len(),
        })?;
        match value {
            Value::Table(id) => self.tables.get(&id.0).ok_or(EngineError::DanglingId),
            other => Err(EngineError::NotATable {
                found: other.type_name(),
            }),
        }
    }

    fn table_mut_at(&mut self, slot: usize) -> Result<&mut Table> {
        let id = match self.value_at(slot) {
            Some(Value::Table(id)) => *id,
            Some(other) => {
                return Err(EngineError::NotATable {
                    found: other.type_name(),
                })
            }
            None => {
                return Err(EngineError::InvalidSlot {
                    slot,
                    top: self.stack.len(),
                })
            }
        };
        self.tables.get_mut(&id.0).ok_or(EngineError::DanglingId)
    }

    fn globals_table(&self) -> &Table {
        self.tables
            .get(&self.globals.0)
            .expect("globals table is allocated at construction")
    }

    fn globals_table_mut(&mut self) -> &mut Table {
        self.tables
            .get_mut(&self.globals.0)
            .expect("globals table is allocated at construction")
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
