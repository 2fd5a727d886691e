//! The standard library
//!
//! Each module contributes one member object to `std`; the global
//! environment installs the result as a plain variable, so hosts (and
//! scripts) may replace or augment members.

pub mod chrono;
pub mod filesystem;
pub mod ini;

use crate::bindings::{NativeFunction, NativeProc};
use crate::value::{Object, Value};

/// Build the `std` object for a fresh global environment.
pub fn create_std(api_version: u32) -> Value {
    let mut root = Object::new();

    let mut member = Object::new();
    chrono::create_bindings(&mut member, api_version);
    root.insert("chrono".to_string(), Value::Object(member));

    let mut member = Object::new();
    filesystem::create_bindings(&mut member, api_version);
    root.insert("filesystem".to_string(), Value::Object(member));

    let mut member = Object::new();
    ini::create_bindings(&mut member, api_version);
    root.insert("ini".to_string(), Value::Object(member));

    Value::Object(root)
}

/// Register one native callable under `key`.
pub(crate) fn add_binding(
    members: &mut Object,
    key: &str,
    name: &str,
    description: &str,
    proc: NativeProc,
) {
    members.insert(
        key.to_string(),
        Value::Function(NativeFunction::new(name, description, Value::Null, proc)),
    );
}
