//! Global environment: the root of every scope chain
//!
//! One `GlobalContext` owns the root scope (carrying the `std` library
//! object), the pool of recyclable executive scopes, the variable registry
//! driving the cycle collector, the API-version integer, and the host
//! interrupt flag the executor polls at statement boundaries.
//!
//! Everything here is manipulated on the environment's owning thread; a
//! host wanting parallelism creates independent globals.

use crate::collector::Collector;
use crate::library;
use crate::reference::{Modifier, Reference};
use crate::scope::Scope;
use crate::value::Value;
use crate::variable::Variable;
use asteria_core::{Error, ErrorKind, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::trace;

/// The newest API version this library implements.
pub const API_VERSION_LATEST: u32 = 0x0001_0000;

/// Upper bound on pooled executive scopes.
const SCOPE_POOL_LIMIT: usize = 64;

#[derive(Debug)]
pub struct GlobalContext {
    api_version: u32,
    root: Rc<Scope>,
    scope_pool: RefCell<Vec<Rc<Scope>>>,
    collector: Collector,
    interrupt: Cell<bool>,
}

impl GlobalContext {
    pub fn new(api_version: u32) -> Self {
        let global = GlobalContext {
            api_version,
            root: Scope::new(None),
            scope_pool: RefCell::new(Vec::new()),
            collector: Collector::new(),
            interrupt: Cell::new(false),
        };
        let std_var = global.create_variable(library::create_std(api_version), false);
        global
            .root
            .set_named_reference("std", Reference::variable(std_var));
        global
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn root_scope(&self) -> &Rc<Scope> {
        &self.root
    }

    /// Replace or augment a member of the `std` object, e.g. to stub out
    /// `std.filesystem` in a sandboxed host.
    pub fn set_std_member(&self, name: &str, value: Value) -> Result<()> {
        self.root
            .get_local("std")
            .expect("global root always carries `std`")
            .zoom_in(Modifier::ObjectKey(name.to_string()))
            .write(value)
            .map(|_| ())
    }

    /// The §4.4 fallback: a named-reference miss at the global root is
    /// retried as an object-style lookup of the `std` members.
    pub fn std_member_fallback(&self, name: &str) -> Option<Reference> {
        let std_ref = self.root.get_local("std")?;
        let value = std_ref.read().ok()?;
        let member = value.as_object()?.get(name)?.clone();
        Some(Reference::constant(member))
    }

    /// Resolve a name for the evaluator: scope chain first, then the
    /// standard-library fallback.
    pub fn resolve_name(&self, scope: &Rc<Scope>, name: &str) -> Result<Reference> {
        if let Some(r) = scope.get_named_reference(name) {
            return Ok(r);
        }
        if let Some(r) = self.std_member_fallback(name) {
            return Ok(r);
        }
        Err(Error::new(
            ErrorKind::UnsetMember,
            format!("undeclared identifier `{}`", name),
        ))
    }

    // ----- variables and collection ---------------------------------------

    /// Create a registered variable. All variables that scripts can reach
    /// should come from here so the cycle collector sees them.
    pub fn create_variable(&self, value: Value, immutable: bool) -> Rc<Variable> {
        let var = Variable::new(value, immutable);
        self.collector.track(&var);
        var
    }

    /// Run the cycle collector now. Returns the number of wiped variables.
    pub fn collect_garbage(&self) -> usize {
        self.collector.collect()
    }

    /// The executor's statement-boundary hook: collect when enough
    /// variables have been created since the last pass. No variable cell is
    /// borrowed between statements, so wiping is safe here.
    pub(crate) fn maybe_collect(&self) {
        if self.collector.is_due() {
            self.collect_garbage();
        }
    }

    // ----- executive scope pool -------------------------------------------

    /// Acquire an executive scope parented to `parent`. Reuses a pooled
    /// frame when one is available; reused frames are guaranteed clear.
    pub fn take_scope(&self, parent: Rc<Scope>) -> Rc<Scope> {
        if let Some(scope) = self.scope_pool.borrow_mut().pop() {
            trace!("reusing a pooled executive scope");
            scope.set_parent(Some(parent));
            return scope;
        }
        Scope::new(Some(parent))
    }

    /// Return a scope after a call. Only a uniquely-owned frame goes back
    /// to the pool; a frame still captured by a function value stays alive
    /// untouched.
    pub fn recycle_scope(&self, scope: Rc<Scope>) {
        if Rc::strong_count(&scope) != 1 {
            return;
        }
        scope.clear();
        scope.set_parent(None);
        let mut pool = self.scope_pool.borrow_mut();
        if pool.len() < SCOPE_POOL_LIMIT {
            pool.push(scope);
        }
    }

    // ----- host interrupt -------------------------------------------------

    /// Set or clear the host interrupt flag. May be called from a host
    /// callback; the next statement boundary observes it.
    pub fn set_interrupt(&self, flag: bool) {
        self.interrupt.set(flag);
    }

    pub(crate) fn check_interrupt(&self) -> Result<()> {
        if self.interrupt.get() {
            self.interrupt.set(false);
            return Err(Error::new(
                ErrorKind::Interrupted,
                "host interrupt observed at a statement boundary",
            ));
        }
        Ok(())
    }
}

impl Default for GlobalContext {
    fn default() -> Self {
        GlobalContext::new(API_VERSION_LATEST)
    }
}
