//! Typed extraction with defaults
//!
//! One operation per host scalar kind, all sharing the same contract: the
//! value at the stack top is converted, exactly one slot is popped no matter
//! the outcome, and the caller gets the value together with an
//! [`ErrorFlags`] classification. The kinds form a closed set behind
//! [`FromStack`], so new widths join the protocol instead of growing an
//! overload family.

use tracing::{debug, warn};
use vm::{Engine, Value};

use crate::error::ErrorFlags;

/// Opaque host pointer as a host-side scalar kind.
///
/// Carried through the engine untouched; never dereferenced by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightPtr(pub usize);

/// A host scalar kind that can be read off the stack top.
pub trait FromStack: Sized {
    /// Kind name used in messages and logs
    const KIND: &'static str;

    /// The kind's zero value, returned on the fatal path
    fn zero() -> Self;

    /// Convert from a non-nil engine value; `None` means wrong type
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromStack for bool {
    const KIND: &'static str = "bool";

    fn zero() -> Self {
        false
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromStack for i64 {
    const KIND: &'static str = "i64";

    fn zero() -> Self {
        0
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            Value::Num(n) => Some(*n as i64),
            _ => None,
        }
    }
}

impl FromStack for i32 {
    const KIND: &'static str = "i32";

    fn zero() -> Self {
        0
    }

    fn from_value(value: &Value) -> Option<Self> {
        // out-of-range integers classify as wrong type, not silent wraps
        let wide = i64::from_value(value)?;
        i32::try_from(wide).ok()
    }
}

impl FromStack for f64 {
    const KIND: &'static str = "f64";

    fn zero() -> Self {
        0.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Num(n) => Some(*n),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromStack for f32 {
    const KIND: &'static str = "f32";

    fn zero() -> Self {
        0.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        f64::from_value(value).map(|n| n as f32)
    }
}

impl FromStack for String {
    const KIND: &'static str = "string";

    fn zero() -> Self {
        String::new()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.to_string()),
            _ => None,
        }
    }
}

impl FromStack for LightPtr {
    const KIND: &'static str = "lightptr";

    fn zero() -> Self {
        LightPtr(0)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::LightPtr(p) => Some(LightPtr(*p)),
            _ => None,
        }
    }
}

/// Convert the value at the stack top into `T`, consuming exactly one slot
/// on every path.
///
/// Absent (nil, or no slot at all) sets `NON_EXISTENT`; a type mismatch sets
/// `WRONG_TYPE`. Either way `default` is substituted when supplied, and
/// otherwise `FATAL` is added and the kind's zero value is returned. Numbers
/// coerce across numeric subkinds; strings, booleans and pointers must match
/// exactly.
pub fn extract<T: FromStack>(engine: &mut Engine, default: Option<T>) -> (T, ErrorFlags) {
    let top = engine.top();
    let attempted: Result<T, ErrorFlags> = match engine.value_at(top) {
        None | Some(Value::Nil) => Err(ErrorFlags::NON_EXISTENT),
        Some(value) => match T::from_value(value) {
            Some(converted) => Ok(converted),
            None => {
                debug!(
                    expected = T::KIND,
                    found = value.type_name(),
                    "extraction type mismatch"
                );
                Err(ErrorFlags::WRONG_TYPE)
            }
        },
    };
    if top > 0 {
        engine.pop(1);
    } else {
        warn!(kind = T::KIND, "extraction from an empty stack");
    }

    match attempted {
        Ok(value) => (value, ErrorFlags::empty()),
        Err(flags) => match default {
            Some(fallback) => (fallback, flags),
            None => {
                debug!(kind = T::KIND, ?flags, "extraction failed with no default");
                (T::zero(), flags | ErrorFlags::FATAL)
            }
        },
    }
}

/// String extraction with an explicit capacity.
///
/// An engine string longer than `max_len` bytes is silently truncated at the
/// nearest char boundary; that is the documented policy for undersized host
/// buffers, not an error.
pub fn extract_str_bounded(
    engine: &mut Engine,
    max_len: usize,
    default: Option<String>,
) -> (String, ErrorFlags) {
    let (value, flags) = extract::<String>(engine, default);
    (truncate_to(value, max_len), flags)
}

fn truncate_to(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
    s
}

/// A host scalar kind that can be pushed onto the stack.
pub trait ToStack {
    fn push_onto(self, engine: &mut Engine);
}

impl ToStack for bool {
    fn push_onto(self, engine: &mut Engine) {
        engine.push_bool(self);
    }
}

impl ToStack for i32 {
    fn push_onto(self, engine: &mut Engine) {
        engine.push_int(self as i64);
    }
}

impl ToStack for i64 {
    fn push_onto(self, engine: &mut Engine) {
        engine.push_int(self);
    }
}

impl ToStack for f32 {
    fn push_onto(self, engine: &mut Engine) {
        engine.push_num(self as f64);
    }
}

impl ToStack for f64 {
    fn push_onto(self, engine: &mut Engine) {
        engine.push_num(self);
    }
}

impl ToStack for &str {
    fn push_onto(self, engine: &mut Engine) {
        engine.push_str(self);
    }
}

impl ToStack for String {
    fn push_onto(self, engine: &mut Engine) {
        engine.push_str(&self);
    }
}

impl ToStack for LightPtr {
    fn push_onto(self, engine: &mut Engine) {
        engine.push_light_ptr(self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_exact_kinds() {
        let mut engine = Engine::new();

        engine.push_bool(true);
        assert_eq!(extract::<bool>(&mut engine, None), (true, ErrorFlags::empty()));

        engine.push_int(12);
        assert_eq!(extract::<i64>(&mut engine, None), (12, ErrorFlags::empty()));

        engine.push_str("name");
        assert_eq!(
            extract::<String>(&mut engine, None),
            ("name".to_string(), ErrorFlags::empty())
        );

        engine.push_light_ptr(0xbeef);
        assert_eq!(
            extract::<LightPtr>(&mut engine, None),
            (LightPtr(0xbeef), ErrorFlags::empty())
        );

        assert_eq!(engine.top(), 0, "every extraction pops exactly one slot");
    }

    #[test]
    fn test_numeric_coercion_both_ways() {
        let mut engine = Engine::new();

        engine.push_int(3);
        assert_eq!(extract::<f64>(&mut engine, None), (3.0, ErrorFlags::empty()));

        engine.push_num(2.75);
        assert_eq!(extract::<i64>(&mut engine, None), (2, ErrorFlags::empty()));

        engine.push_num(1.5);
        assert_eq!(extract::<f32>(&mut engine, None), (1.5, ErrorFlags::empty()));
    }

    #[test]
    fn test_narrowing_out_of_range_is_wrong_type() {
        let mut engine = Engine::new();
        engine.push_int(i64::from(i32::MAX) + 1);

        let (value, flags) = extract::<i32>(&mut engine, Some(-1));
        assert_eq!(value, -1);
        assert_eq!(flags, ErrorFlags::WRONG_TYPE);
    }

    #[test]
    fn test_absent_with_default_substitutes() {
        let mut engine = Engine::new();
        engine.push_nil();

        let (value, flags) = extract::<i64>(&mut engine, Some(42));
        assert_eq!(value, 42);
        assert_eq!(flags, ErrorFlags::NON_EXISTENT, "default substitution still reports why");
        assert!(!flags.is_fatal());
    }

    #[test]
    fn test_absent_without_default_is_fatal_zero() {
        let mut engine = Engine::new();
        engine.push_nil();

        let (value, flags) = extract::<f64>(&mut engine, None);
        assert_eq!(value, 0.0);
        assert_eq!(flags, ErrorFlags::NON_EXISTENT | ErrorFlags::FATAL);
    }

    #[test]
    fn test_wrong_type_matrix() {
        let mut engine = Engine::new();

        engine.push_str("true");
        let (_, flags) = extract::<bool>(&mut engine, None);
        assert_eq!(flags, ErrorFlags::WRONG_TYPE | ErrorFlags::FATAL);

        engine.push_bool(false);
        let (value, flags) = extract::<String>(&mut engine, Some("dflt".into()));
        assert_eq!(value, "dflt");
        assert_eq!(flags, ErrorFlags::WRONG_TYPE);

        engine.push_int(1);
        let (_, flags) = extract::<LightPtr>(&mut engine, None);
        assert_eq!(flags, ErrorFlags::WRONG_TYPE | ErrorFlags::FATAL);
    }

    #[test]
    fn test_empty_stack_counts_as_absent() {
        let mut engine = Engine::new();
        let (value, flags) = extract::<i64>(&mut engine, Some(7));
        assert_eq!(value, 7);
        assert_eq!(flags, ErrorFlags::NON_EXISTENT);
        assert_eq!(engine.top(), 0);
    }

    #[test]
    fn test_bounded_string_truncates_silently() {
        let mut engine = Engine::new();

        engine.push_str("configuration");
        let (value, flags) = extract_str_bounded(&mut engine, 6, None);
        assert_eq!(value, "config");
        assert!(flags.is_clean(), "truncation is policy, not an error");

        engine.push_str("héllo");
        let (value, _) = extract_str_bounded(&mut engine, 2, None);
        assert_eq!(value, "h", "truncation respects char boundaries");

        engine.push_str("ok");
        let (value, _) = extract_str_bounded(&mut engine, 10, None);
        assert_eq!(value, "ok");
    }
}
