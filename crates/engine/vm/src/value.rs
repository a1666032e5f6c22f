//! Value and type-tag definitions for the engine

use std::rc::Rc;

/// Identity of a table in the engine heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub(crate) u64);

/// Identity of a native function in the engine heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub(crate) u64);

/// A dynamically typed engine value.
///
/// Scalars compare by value; tables and functions compare by heap identity.
/// Strings are immutable and shared, so duplicating a slot never copies the
/// underlying buffer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The absent value
    #[default]
    Nil,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Num(f64),
    /// Immutable string
    Str(Rc<str>),
    /// Table in the engine heap
    Table(TableId),
    /// Native function in the engine heap
    Func(FuncId),
    /// Opaque host pointer, carried but never dereferenced by the engine
    LightPtr(usize),
}

impl Value {
    /// Get the type tag of this value
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Nil => TypeTag::Nil,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Num(_) => TypeTag::Num,
            Value::Str(_) => TypeTag::Str,
            Value::Table(_) => TypeTag::Table,
            Value::Func(_) => TypeTag::Func,
            Value::LightPtr(_) => TypeTag::LightPtr,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        self.type_tag().name()
    }

    /// Check if value is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

// Conversion from common host types

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Num(f as f64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Num(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s.as_str()))
    }
}

/// Type of a stack slot, as reported without disturbing the stack.
///
/// `None` means the queried position does not exist (above the current top);
/// `Nil` means the slot exists and holds the absent value. The distinction
/// matters to callers that probe for stale handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// No slot at the queried position
    None,
    /// The absent value
    Nil,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Floating point
    Num,
    /// String
    Str,
    /// Table
    Table,
    /// Native function
    Func,
    /// Opaque host pointer
    LightPtr,
}

impl TypeTag {
    /// Human-readable name for messages and logs
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::None => "none",
            TypeTag::Nil => "nil",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Num => "number",
            TypeTag::Str => "string",
            TypeTag::Table => "table",
            TypeTag::Func => "function",
            TypeTag::LightPtr => "lightptr",
        }
    }

    /// True for `None` and `Nil`, the two "nothing there" outcomes
    pub fn is_absent(self) -> bool {
        matches!(self, TypeTag::None | TypeTag::Nil)
    }
}

/// A table key.
///
/// Integer keys order before string keys, and both order within their kind,
/// so table enumeration is deterministic and "next entry after key K" is well
/// defined across separate calls.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TableKey {
    /// Integer key (positions use these)
    Int(i64),
    /// String key (names use these)
    Str(Rc<str>),
}

impl TableKey {
    /// Build a key from a value; only integers and strings can key a table
    pub fn from_value(value: &Value) -> Option<TableKey> {
        match value {
            Value::Int(i) => Some(TableKey::Int(*i)),
            Value::Str(s) => Some(TableKey::Str(Rc::clone(s))),
            _ => None,
        }
    }

    /// The value form of this key, as pushed during enumeration
    pub fn to_value(&self) -> Value {
        match self {
            TableKey::Int(i) => Value::Int(*i),
            TableKey::Str(s) => Value::Str(Rc::clone(s)),
        }
    }
}

impl From<i64> for TableKey {
    fn from(i: i64) -> Self {
        TableKey::Int(i)
    }
}

impl From<&str> for TableKey {
    fn from(s: &str) -> Self {
        TableKey::Str(Rc::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_tags() {
        assert_eq!(Value::Nil.type_tag(), TypeTag::Nil);
        assert_eq!(Value::from(true).type_tag(), TypeTag::Bool);
        assert_eq!(Value::from(42i64).type_tag(), TypeTag::Int);
        assert_eq!(Value::from(1.5f64).type_tag(), TypeTag::Num);
        assert_eq!(Value::from("hi").type_tag(), TypeTag::Str);
        assert_eq!(Value::LightPtr(0xdead).type_tag(), TypeTag::LightPtr);
    }

    #[test]
    fn test_type_tag_absent() {
        assert!(TypeTag::None.is_absent());
        assert!(TypeTag::Nil.is_absent());
        assert!(!TypeTag::Table.is_absent());
        assert!(!TypeTag::Int.is_absent());
    }

    #[test]
    fn test_key_ordering_ints_before_strings() {
        let mut keys = vec![
            TableKey::from("beta"),
            TableKey::from(2i64),
            TableKey::from("alpha"),
            TableKey::from(1i64),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                TableKey::from(1i64),
                TableKey::from(2i64),
                TableKey::from("alpha"),
                TableKey::from("beta"),
            ]
        );
    }

    #[test]
    fn test_key_from_value() {
        assert_eq!(
            TableKey::from_value(&Value::from(7i64)),
            Some(TableKey::Int(7))
        );
        assert_eq!(
            TableKey::from_value(&Value::from("k")),
            Some(TableKey::from("k"))
        );
        assert_eq!(TableKey::from_value(&Value::Nil), None);
        assert_eq!(TableKey::from_value(&Value::from(1.5f64)), None);
    }
}
