//! Scope: a named-reference map chained by a parent link
//!
//! One type serves both lifecycle variants. Analytic scopes, used by the
//! bind pass, hold placeholder-rooted references — names and validity only.
//! Executive scopes, used at run time, hold live references. Name lookup is
//! lexical: the chain is walked until a hit or the global root.
//!
//! Executive scopes that backed a function call are recycled through the
//! global pool; a reused frame is always cleared before handoff.

use crate::reference::Reference;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Scope {
    parent: RefCell<Option<Rc<Scope>>>,
    names: RefCell<HashMap<String, Reference>>,
}

impl Scope {
    pub fn new(parent: Option<Rc<Scope>>) -> Rc<Scope> {
        Rc::new(Scope {
            parent: RefCell::new(parent),
            names: RefCell::new(HashMap::new()),
        })
    }

    pub fn new_child(parent: &Rc<Scope>) -> Rc<Scope> {
        Scope::new(Some(parent.clone()))
    }

    pub fn parent(&self) -> Option<Rc<Scope>> {
        self.parent.borrow().clone()
    }

    pub(crate) fn set_parent(&self, parent: Option<Rc<Scope>>) {
        *self.parent.borrow_mut() = parent;
    }

    /// Create or overwrite the local entry for `name`. Redeclaration policy
    /// belongs to the caller; the scope itself is a plain map.
    pub fn set_named_reference(&self, name: impl Into<String>, reference: Reference) {
        self.names.borrow_mut().insert(name.into(), reference);
    }

    /// The analytic variant of opening a name: record its existence with a
    /// placeholder if it is not already present locally.
    pub fn open_placeholder(&self, name: impl Into<String>) {
        self.names
            .borrow_mut()
            .entry(name.into())
            .or_insert_with(Reference::placeholder);
    }

    /// Is `name` declared in this scope itself (not the chain)?
    pub fn is_declared(&self, name: &str) -> bool {
        self.names.borrow().contains_key(name)
    }

    /// Look the name up in this scope only.
    pub fn get_local(&self, name: &str) -> Option<Reference> {
        self.names.borrow().get(name).cloned()
    }

    /// Look the name up along the parent chain.
    pub fn get_named_reference(&self, name: &str) -> Option<Reference> {
        if let Some(r) = self.get_local(name) {
            return Some(r);
        }
        let mut cursor = self.parent();
        while let Some(scope) = cursor {
            if let Some(r) = scope.get_local(name) {
                return Some(r);
            }
            cursor = scope.parent();
        }
        None
    }

    /// Drop every named reference. Owned variables whose last holder this
    /// was are released here.
    pub fn clear(&self) {
        self.names.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.names.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_lookup_walks_the_chain() {
        let root = Scope::new(None);
        root.set_named_reference("a", Reference::constant(Value::Integer(1)));
        let child = Scope::new_child(&root);
        child.set_named_reference("b", Reference::constant(Value::Integer(2)));

        assert_eq!(
            child.get_named_reference("a").unwrap().read().unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            child.get_named_reference("b").unwrap().read().unwrap(),
            Value::Integer(2)
        );
        assert!(root.get_named_reference("b").is_none());
    }

    #[test]
    fn test_shadowing_hits_the_nearest_scope() {
        let root = Scope::new(None);
        root.set_named_reference("x", Reference::constant(Value::Integer(1)));
        let child = Scope::new_child(&root);
        child.set_named_reference("x", Reference::constant(Value::Integer(2)));

        assert_eq!(
            child.get_named_reference("x").unwrap().read().unwrap(),
            Value::Integer(2)
        );
    }

    #[test]
    fn test_placeholders_mark_names_without_values() {
        let scope = Scope::new(None);
        scope.open_placeholder("param");
        assert!(scope.is_declared("param"));
        assert!(scope.get_local("param").unwrap().is_placeholder());
        // Opening again does not clobber a later real entry.
        scope.set_named_reference("param", Reference::constant(Value::Integer(1)));
        scope.open_placeholder("param");
        assert!(!scope.get_local("param").unwrap().is_placeholder());
    }

    #[test]
    fn test_clear_empties_the_scope() {
        let scope = Scope::new(None);
        scope.set_named_reference("a", Reference::null_constant());
        assert!(!scope.is_empty());
        scope.clear();
        assert!(scope.is_empty());
        assert!(scope.get_named_reference("a").is_none());
    }
}
