//! Binding adaptor: how native code becomes callable from scripts
//!
//! A [`NativeFunction`] carries an identifier, a documentation string, an
//! opaque state value and a plain function pointer with the uniform
//! signature `(opaque, global, receiver, args)`. The [`ArgumentReader`] is
//! the small state machine bindings use to match argument lists against
//! one or more overloads, with save/load points for retrying alternatives;
//! when nothing matches it produces an `argument_mismatch` failure listing
//! every signature that was tried.

use crate::collector::VarWalker;
use crate::function::Callable;
use crate::global::GlobalContext;
use crate::reference::Reference;
use crate::value::{Object, Value};
use asteria_core::{Error, ErrorKind, Result, SourceLocation};
use std::collections::HashMap;
use std::rc::Rc;

/// The uniform native entry point.
pub type NativeProc =
    fn(&Value, &GlobalContext, Reference, Vec<Reference>) -> Result<Reference>;

pub struct NativeFunction {
    name: String,
    description: String,
    opaque: Value,
    proc: NativeProc,
    location: SourceLocation,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        opaque: Value,
        proc: NativeProc,
    ) -> Rc<NativeFunction> {
        Rc::new(NativeFunction {
            name: name.into(),
            description: description.into(),
            opaque,
            proc,
            location: SourceLocation::new("<native>", 0),
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }

    fn invoke(
        &self,
        global: &GlobalContext,
        this: Reference,
        args: Vec<Reference>,
    ) -> Result<Reference> {
        (self.proc)(&self.opaque, global, this, args).map_err(|mut err| {
            err.push_frame(&self.name, self.location.clone(), 0);
            err
        })
    }

    fn enumerate_variables(&self, walker: &mut VarWalker<'_>) {
        walker.walk_value(&self.opaque);
    }
}

/// A typed positional slot the reader knows how to fill.
pub trait ArgSlot: Sized {
    const TYPE_NAME: &'static str;
    fn from_value(value: &Value) -> Option<Self>;
}

impl ArgSlot for i64 {
    const TYPE_NAME: &'static str = "integer";
    fn from_value(value: &Value) -> Option<Self> {
        value.as_integer()
    }
}

impl ArgSlot for f64 {
    const TYPE_NAME: &'static str = "real";
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(n) => Some(*n as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }
}

impl ArgSlot for bool {
    const TYPE_NAME: &'static str = "boolean";
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl ArgSlot for Vec<u8> {
    const TYPE_NAME: &'static str = "string";
    fn from_value(value: &Value) -> Option<Self> {
        value.as_string().map(|s| s.to_vec())
    }
}

impl ArgSlot for Vec<Value> {
    const TYPE_NAME: &'static str = "array";
    fn from_value(value: &Value) -> Option<Self> {
        value.as_array().cloned()
    }
}

impl ArgSlot for Object {
    const TYPE_NAME: &'static str = "object";
    fn from_value(value: &Value) -> Option<Self> {
        value.as_object().cloned()
    }
}

impl ArgSlot for Rc<dyn Callable> {
    const TYPE_NAME: &'static str = "function";
    fn from_value(value: &Value) -> Option<Self> {
        value.as_function().cloned()
    }
}

impl ArgSlot for Value {
    const TYPE_NAME: &'static str = "value";
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// Matches a call's arguments against declared overloads.
///
/// ```ignore
/// let mut reader = ArgumentReader::new("std.ini.parse", &args)?;
/// let mut text = Vec::new();
/// reader.start_overload();
/// reader.required(&mut text);
/// if reader.end_overload() {
///     return ini_parse(&text);
/// }
/// Err(reader.throw_no_matching_function_call())
/// ```
pub struct ArgumentReader {
    name: String,
    values: Vec<Value>,
    pos: usize,
    matched: bool,
    saved: HashMap<String, (usize, bool)>,
    signatures: Vec<String>,
    current: Vec<String>,
}

impl ArgumentReader {
    /// Reads all argument references up front; a failing read surfaces
    /// before any overload matching starts.
    pub fn new(name: impl Into<String>, args: &[Reference]) -> Result<ArgumentReader> {
        let values = args.iter().map(Reference::read).collect::<Result<_>>()?;
        Ok(ArgumentReader {
            name: name.into(),
            values,
            pos: 0,
            matched: false,
            saved: HashMap::new(),
            signatures: Vec::new(),
            current: Vec::new(),
        })
    }

    /// Begin matching a new parameter signature from the first argument.
    pub fn start_overload(&mut self) -> &mut Self {
        self.pos = 0;
        self.matched = true;
        self.current.clear();
        self
    }

    /// Consume one required positional argument. A missing argument, a
    /// null, or a type mismatch fails the current overload.
    pub fn required<T: ArgSlot>(&mut self, slot: &mut T) -> &mut Self {
        self.current.push(T::TYPE_NAME.to_string());
        if !self.matched {
            return self;
        }
        match self.values.get(self.pos).and_then(T::from_value) {
            Some(value) => {
                *slot = value;
                self.pos += 1;
            }
            None => self.matched = false,
        }
        self
    }

    /// Consume one optional positional argument. Absent or null leaves the
    /// slot unset; a present value of the wrong type fails the overload.
    pub fn optional<T: ArgSlot>(&mut self, slot: &mut Option<T>) -> &mut Self {
        self.current.push(format!("[{}]", T::TYPE_NAME));
        if !self.matched {
            return self;
        }
        match self.values.get(self.pos) {
            None => *slot = None,
            Some(Value::Null) => {
                *slot = None;
                self.pos += 1;
            }
            Some(value) => match T::from_value(value) {
                Some(converted) => {
                    *slot = Some(converted);
                    self.pos += 1;
                }
                None => self.matched = false,
            },
        }
        self
    }

    /// Remember the reader position under a tag.
    pub fn save_state(&mut self, tag: &str) -> &mut Self {
        self.saved.insert(tag.to_string(), (self.pos, self.matched));
        self
    }

    /// Restore a previously saved position to try an alternative shape.
    pub fn load_state(&mut self, tag: &str) -> &mut Self {
        if let Some((pos, matched)) = self.saved.get(tag).copied() {
            self.pos = pos;
            self.matched = matched;
        }
        self
    }

    /// Succeeds only when every argument was consumed by a matching
    /// overload. The signature is recorded either way for diagnostics.
    pub fn end_overload(&mut self) -> bool {
        self.signatures
            .push(format!("{}({})", self.name, self.current.join(", ")));
        self.matched && self.pos == self.values.len()
    }

    /// The `argument_mismatch` failure listing everything that was tried.
    pub fn throw_no_matching_function_call(&self) -> Error {
        let got: Vec<&str> = self.values.iter().map(Value::type_name).collect();
        Error::new(
            ErrorKind::ArgumentMismatch,
            format!(
                "no matching function call for `{}({})`; candidates: {}",
                self.name,
                got.join(", "),
                if self.signatures.is_empty() {
                    "(none)".to_string()
                } else {
                    self.signatures.join(", ")
                }
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: Vec<Value>) -> Vec<Reference> {
        values.into_iter().map(Reference::temporary).collect()
    }

    #[test]
    fn test_required_and_optional() {
        let args = args(vec![Value::string("path"), Value::Integer(16)]);
        let mut reader = ArgumentReader::new("demo", &args).unwrap();

        let mut path: Vec<u8> = Vec::new();
        let mut offset: Option<i64> = None;
        let mut limit: Option<i64> = None;
        reader.start_overload();
        reader.required(&mut path).optional(&mut offset).optional(&mut limit);
        assert!(reader.end_overload());
        assert_eq!(path, b"path".to_vec());
        assert_eq!(offset, Some(16));
        assert_eq!(limit, None);
    }

    #[test]
    fn test_null_fills_an_optional_with_unset() {
        let args = args(vec![Value::Null]);
        let mut reader = ArgumentReader::new("demo", &args).unwrap();
        let mut flag: Option<bool> = None;
        reader.start_overload();
        reader.optional(&mut flag);
        assert!(reader.end_overload());
        assert_eq!(flag, None);
    }

    #[test]
    fn test_missing_required_fails_overload() {
        let args = args(vec![]);
        let mut reader = ArgumentReader::new("demo", &args).unwrap();
        let mut n = 0i64;
        reader.start_overload();
        reader.required(&mut n);
        assert!(!reader.end_overload());
    }

    #[test]
    fn test_surplus_arguments_fail_overload() {
        let args = args(vec![Value::Integer(1), Value::Integer(2)]);
        let mut reader = ArgumentReader::new("demo", &args).unwrap();
        let mut n = 0i64;
        reader.start_overload();
        reader.required(&mut n);
        assert!(!reader.end_overload());
    }

    #[test]
    fn test_overload_retry_with_saved_state() {
        let args = args(vec![Value::string("data")]);
        let mut reader = ArgumentReader::new("demo", &args).unwrap();

        // First shape: (integer, string) — fails on the first slot.
        let mut n = 0i64;
        let mut s: Vec<u8> = Vec::new();
        reader.start_overload();
        reader.save_state("begin");
        reader.required(&mut n).required(&mut s);
        assert!(!reader.end_overload());

        // Second shape: (string) — retried from the saved point.
        reader.start_overload();
        reader.load_state("begin");
        reader.required(&mut s);
        assert!(reader.end_overload());
        assert_eq!(s, b"data".to_vec());
    }

    #[test]
    fn test_mismatch_error_lists_candidates() {
        let args = args(vec![Value::Boolean(true)]);
        let mut reader = ArgumentReader::new("std.demo.f", &args).unwrap();
        let mut n = 0i64;
        reader.start_overload();
        reader.required(&mut n);
        assert!(!reader.end_overload());

        let err = reader.throw_no_matching_function_call();
        assert_eq!(err.kind(), ErrorKind::ArgumentMismatch);
        assert!(err.message().contains("std.demo.f(boolean)"));
        assert!(err.message().contains("std.demo.f(integer)"));
    }
}
