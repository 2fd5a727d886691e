//! Variable: the refcounted mutable cell
//!
//! Every mutable storage location in a script is one of these. A variable
//! is created by a `var`/`const` declaration, by container slot
//! materialisation during lvalue writes, or by the host binding a constant.
//! Equality between variables is identity, never value.

use crate::value::Value;
use asteria_core::{Error, ErrorKind, Result};
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

#[derive(Debug)]
pub struct Variable {
    value: RefCell<Value>,
    immutable: Cell<bool>,
}

impl Variable {
    pub fn new(value: Value, immutable: bool) -> Rc<Variable> {
        Rc::new(Variable {
            value: RefCell::new(value),
            immutable: Cell::new(immutable),
        })
    }

    pub fn get(&self) -> Ref<'_, Value> {
        self.value.borrow()
    }

    pub fn set(&self, value: Value) -> Result<()> {
        if self.immutable.get() {
            return Err(Error::new(
                ErrorKind::ImmutableAssign,
                "attempt to modify a frozen variable",
            ));
        }
        *self.value.borrow_mut() = value;
        Ok(())
    }

    /// Freezing twice is a no-op.
    pub fn freeze(&self) {
        self.immutable.set(true);
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable.get()
    }

    /// Mutable access for path writes. The caller has already rejected
    /// frozen variables.
    pub(crate) fn borrow_value_mut(&self) -> std::cell::RefMut<'_, Value> {
        self.value.borrow_mut()
    }

    /// The collector's cycle-breaking store. Bypasses the immutable flag:
    /// a wiped variable is unreachable from scripts by construction.
    pub(crate) fn wipe(&self) {
        *self.value.borrow_mut() = Value::Null;
    }
}
