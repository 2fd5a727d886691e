//! Reference: a root plus a path of modifiers
//!
//! A reference addresses a location: the root directly when the path is
//! empty, or a slot inside nested containers otherwise. Path resolution
//! starts over from the root on every access — a reference never caches an
//! interior pointer, so container reallocation between accesses is safe.
//!
//! Reads of missing slots produce null (read paths never mutate); writes
//! materialise missing slots on the way down. Constant and temporary roots
//! are rvalues and reject writes outright.

use crate::collector::VarWalker;
use crate::value::Value;
use crate::variable::Variable;
use asteria_core::{Error, ErrorKind, Result};
use std::rc::Rc;
use tracing::debug;

/// Auto-extension cap for arrays, in slots.
pub const ARRAY_LIMIT: usize = 0x0100_0000;

/// One path step: an array index (negative counts from the end) or an
/// object key.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    ArrayIndex(i64),
    ObjectKey(String),
}

#[derive(Debug, Clone)]
enum Root {
    Constant(Rc<Value>),
    Temporary(Value),
    Variable(Rc<Variable>),
    /// An uninstantiated parameter. Analytic scopes hold these; reading or
    /// writing one at run time is a bind-pass bug surfaced as a failure.
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct Reference {
    root: Root,
    mods: Vec<Modifier>,
}

impl Reference {
    pub fn constant(value: Value) -> Self {
        Reference {
            root: Root::Constant(Rc::new(value)),
            mods: Vec::new(),
        }
    }

    pub fn temporary(value: Value) -> Self {
        Reference {
            root: Root::Temporary(value),
            mods: Vec::new(),
        }
    }

    pub fn variable(variable: Rc<Variable>) -> Self {
        Reference {
            root: Root::Variable(variable),
            mods: Vec::new(),
        }
    }

    pub fn placeholder() -> Self {
        Reference {
            root: Root::Placeholder,
            mods: Vec::new(),
        }
    }

    pub fn null_constant() -> Self {
        Reference::constant(Value::Null)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.root, Root::Constant(_))
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self.root, Root::Temporary(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.root, Root::Variable(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.root, Root::Placeholder)
    }

    pub fn modifier_count(&self) -> usize {
        self.mods.len()
    }

    /// Append a path step. Chainable; never fails.
    pub fn zoom_in(mut self, modifier: Modifier) -> Self {
        self.mods.push(modifier);
        self
    }

    /// Drop the last path step. On a reference already at its root this
    /// yields a constant null.
    pub fn zoom_out(mut self) -> Self {
        if self.mods.is_empty() {
            return Reference::null_constant();
        }
        self.mods.pop();
        self
    }

    /// Read the addressed value. Missing terminal slots read as null;
    /// a missing non-terminal step is an `unset_member` failure.
    pub fn read(&self) -> Result<Value> {
        match &self.root {
            Root::Constant(v) => read_path(v, &self.mods),
            Root::Temporary(v) => read_path(v, &self.mods),
            Root::Variable(var) => read_path(&var.get(), &self.mods),
            Root::Placeholder => Err(placeholder_access()),
        }
    }

    /// Write through the reference, materialising missing slots along the
    /// path, and return the stored value.
    pub fn write(&self, value: Value) -> Result<Value> {
        let var = match &self.root {
            Root::Constant(v) => return Err(not_assignable("constant", v)),
            Root::Temporary(v) => return Err(not_assignable("temporary", v)),
            Root::Variable(var) => var,
            Root::Placeholder => return Err(placeholder_access()),
        };
        if self.mods.is_empty() {
            var.set(value.clone())?;
            return Ok(value);
        }
        if var.is_immutable() {
            return Err(Error::new(
                ErrorKind::ImmutableAssign,
                "attempt to modify a frozen variable through a path",
            ));
        }
        let mut root = var.borrow_value_mut();
        let slot = open_path(&mut root, &self.mods)?;
        *slot = value.clone();
        Ok(value)
    }

    /// Remove the addressed slot and return the removed value, or null when
    /// the slot does not exist. A reference with no path cannot be unset.
    pub fn unset(&self) -> Result<Value> {
        if self.mods.is_empty() {
            return Err(Error::new(
                ErrorKind::NoModifier,
                "only array elements and object members can be unset",
            ));
        }
        let var = match &self.root {
            Root::Constant(v) => return Err(not_assignable("constant", v)),
            Root::Temporary(v) => return Err(not_assignable("temporary", v)),
            Root::Variable(var) => var,
            Root::Placeholder => return Err(placeholder_access()),
        };
        if var.is_immutable() {
            return Err(Error::new(
                ErrorKind::ImmutableAssign,
                "attempt to modify a frozen variable through a path",
            ));
        }
        let mut root = var.borrow_value_mut();
        unset_path(&mut root, &self.mods)
    }

    pub(crate) fn enumerate_variables(&self, walker: &mut VarWalker<'_>) {
        match &self.root {
            Root::Constant(v) => walker.walk_shared_value(v),
            Root::Temporary(v) => walker.walk_value(v),
            Root::Variable(var) => walker.visit_variable(var),
            Root::Placeholder => {}
        }
    }
}

fn placeholder_access() -> Error {
    Error::new(
        ErrorKind::UnsetMember,
        "attempt to use an uninstantiated parameter",
    )
}

fn not_assignable(category: &str, value: &Value) -> Error {
    Error::new(
        ErrorKind::NotAssignable,
        format!(
            "attempt to modify a {} of type `{}`",
            category,
            value.type_name()
        ),
    )
}

fn index_mismatch(value: &Value) -> Error {
    Error::new(
        ErrorKind::TypeMismatch,
        format!(
            "only arrays can be indexed by integers, while the operand had type `{}`",
            value.type_name()
        ),
    )
}

fn key_mismatch(value: &Value) -> Error {
    Error::new(
        ErrorKind::TypeMismatch,
        format!(
            "only objects can be indexed by strings, while the operand had type `{}`",
            value.type_name()
        ),
    )
}

/// Normalise a bidirectional index against a length. The result may still
/// be out of range on either side.
fn normalize_index(index: i64, len: usize) -> i64 {
    if index >= 0 {
        index
    } else {
        index.wrapping_add(len as i64)
    }
}

fn read_path(root: &Value, mods: &[Modifier]) -> Result<Value> {
    let mut cur = root;
    for (step, modifier) in mods.iter().enumerate() {
        let terminal = step + 1 == mods.len();
        let next = match modifier {
            Modifier::ArrayIndex(index) => {
                let arr = match cur {
                    Value::Array(arr) => arr,
                    other => return Err(index_mismatch(other)),
                };
                let n = normalize_index(*index, arr.len());
                if n < 0 || n >= arr.len() as i64 {
                    None
                } else {
                    Some(&arr[n as usize])
                }
            }
            Modifier::ObjectKey(key) => {
                let obj = match cur {
                    Value::Object(obj) => obj,
                    other => return Err(key_mismatch(other)),
                };
                obj.get(key.as_str())
            }
        };
        match next {
            Some(value) => cur = value,
            None if terminal => return Ok(Value::Null),
            None => {
                return Err(Error::new(
                    ErrorKind::UnsetMember,
                    "read through a path with a missing non-terminal step",
                ))
            }
        }
    }
    Ok(cur.clone())
}

/// Walk down mutably, materialising missing slots. The returned slot is the
/// storage for the final step; earlier steps, once traversed, are not
/// touched again. A failure after partial auto-extension leaves the
/// extension in place.
fn open_path<'a>(root: &'a mut Value, mods: &[Modifier]) -> Result<&'a mut Value> {
    let mut cur = root;
    for modifier in mods {
        let value = cur;
        cur = match modifier {
            Modifier::ArrayIndex(index) => {
                let arr = match value {
                    Value::Array(arr) => arr,
                    other => return Err(index_mismatch(other)),
                };
                let mut n = normalize_index(*index, arr.len());
                if n < 0 {
                    let count = n.unsigned_abs() as usize;
                    if arr.len() + count > ARRAY_LIMIT {
                        return Err(array_too_large(count));
                    }
                    debug!(count, len = arr.len(), "prepending array elements");
                    arr.splice(0..0, std::iter::repeat(Value::Null).take(count));
                    n = 0;
                } else if n >= arr.len() as i64 {
                    let count = n as usize - arr.len() + 1;
                    if arr.len() + count > ARRAY_LIMIT {
                        return Err(array_too_large(count));
                    }
                    debug!(count, len = arr.len(), "appending array elements");
                    arr.resize(arr.len() + count, Value::Null);
                }
                &mut arr[n as usize]
            }
            Modifier::ObjectKey(key) => {
                let obj = match value {
                    Value::Object(obj) => obj,
                    other => return Err(key_mismatch(other)),
                };
                if !obj.contains_key(key.as_str()) {
                    debug!(key = key.as_str(), "creating object member");
                }
                obj.entry(key.clone()).or_insert(Value::Null)
            }
        };
    }
    Ok(cur)
}

fn array_too_large(count: usize) -> Error {
    Error::new(
        ErrorKind::Resource,
        format!(
            "array extension by {} elements would exceed the limit of {}",
            count, ARRAY_LIMIT
        ),
    )
}

fn unset_path(root: &mut Value, mods: &[Modifier]) -> Result<Value> {
    let (last, walk) = mods.split_last().expect("caller checked for modifiers");

    // Walk to the parent container without materialising anything.
    let mut cur = root;
    for modifier in walk {
        let value = cur;
        cur = match modifier {
            Modifier::ArrayIndex(index) => {
                let arr = match value {
                    Value::Array(arr) => arr,
                    other => return Err(index_mismatch(other)),
                };
                let n = normalize_index(*index, arr.len());
                if n < 0 || n >= arr.len() as i64 {
                    return Ok(Value::Null);
                }
                &mut arr[n as usize]
            }
            Modifier::ObjectKey(key) => {
                let obj = match value {
                    Value::Object(obj) => obj,
                    other => return Err(key_mismatch(other)),
                };
                match obj.get_mut(key.as_str()) {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                }
            }
        };
    }

    match last {
        Modifier::ArrayIndex(index) => {
            let arr = match cur {
                Value::Array(arr) => arr,
                other => return Err(index_mismatch(other)),
            };
            let n = normalize_index(*index, arr.len());
            if n < 0 || n >= arr.len() as i64 {
                return Ok(Value::Null);
            }
            Ok(arr.remove(n as usize))
        }
        Modifier::ObjectKey(key) => {
            let obj = match cur {
                Value::Object(obj) => obj,
                other => return Err(key_mismatch(other)),
            };
            Ok(obj.shift_remove(key.as_str()).unwrap_or(Value::Null))
        }
    }
}
