//! Function call runtime
//!
//! A callable is either a script function — a compiled, bound body with a
//! parameter list — or a native binding (see [`crate::bindings`]). The
//! invocation protocol:
//!
//! 1. acquire an executive scope from the global pool;
//! 2. bind parameters in declaration order, one argument each (null when
//!    exhausted); leftovers become the variadic tail;
//! 3. inject `__this`, `__func`, `__varg`, `__file`, `__line`;
//! 4. execute the body: `return` produces the result, falling off the end
//!    yields the block's implicit result, and any loose `break`/`continue`
//!    is a `stray_control` failure;
//! 5. clear the scope and return it to the pool, success or not.
//!
//! Captured outer names were pre-bound into the body at instantiation, so
//! the frame parents directly at the global root; the capture environment
//! travels with the function value itself.

use crate::collector::VarWalker;
use crate::executor::{Block, Status};
use crate::global::GlobalContext;
use crate::reference::Reference;
use crate::scope::Scope;
use crate::value::Value;
use asteria_core::{Error, ErrorKind, Result, SourceLocation};
use std::fmt;
use std::rc::Rc;

/// Anything scripts can call. Implementations: [`ScriptFunction`],
/// [`VariadicArguer`], and [`crate::bindings::NativeFunction`].
pub trait Callable {
    fn name(&self) -> &str;

    fn location(&self) -> &SourceLocation;

    /// A one-line description for `__func` and diagnostics.
    fn describe(&self) -> String {
        format!("{} @ '{}'", self.name(), self.location())
    }

    fn invoke(
        &self,
        global: &GlobalContext,
        this: Reference,
        args: Vec<Reference>,
    ) -> Result<Reference>;

    /// Report captured variable edges to the cycle collector.
    fn enumerate_variables(&self, walker: &mut VarWalker<'_>) {
        let _ = walker;
    }
}

impl fmt::Debug for dyn Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.describe())
    }
}

/// A closure instantiated from a `func` declaration or expression. The
/// body has been bound: references to enclosing executive scopes were
/// frozen into it as reference copies at instantiation time.
#[derive(Debug)]
pub struct ScriptFunction {
    location: SourceLocation,
    name: String,
    params: Vec<String>,
    body: Block,
}

impl ScriptFunction {
    /// Instantiate a function: bind `body` against an analytic scope (its
    /// parameters and system names as placeholders) chained over the
    /// defining scope, and wrap the result.
    pub fn instantiate(
        global: &GlobalContext,
        defining_scope: &Rc<Scope>,
        location: SourceLocation,
        name: impl Into<String>,
        params: Vec<String>,
        body: &Block,
    ) -> Rc<ScriptFunction> {
        let analytic = Scope::new_child(defining_scope);
        for param in &params {
            if param == "..." {
                break;
            }
            analytic.open_placeholder(param.clone());
        }
        for special in ["__varg", "__this", "__func", "__file", "__line"] {
            analytic.open_placeholder(special);
        }
        let bound = body.bind(&analytic, global);
        Rc::new(ScriptFunction {
            location,
            name: name.into(),
            params,
            body: bound,
        })
    }
}

impl Callable for ScriptFunction {
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
        let scope = global.take_scope(global.root_scope().clone());
        let result = self.invoke_in_scope(global, &scope, this, args);
        global.recycle_scope(scope);
        result.map_err(|mut err| {
            let (location, statement) = err
                .take_note()
                .unwrap_or_else(|| (self.location.clone(), 0));
            err.push_frame(&self.name, location, statement);
            err
        })
    }

    fn enumerate_variables(&self, walker: &mut VarWalker<'_>) {
        self.body.enumerate_variables(walker);
    }
}

impl ScriptFunction {
    fn invoke_in_scope(
        &self,
        global: &GlobalContext,
        scope: &Rc<Scope>,
        this: Reference,
        args: Vec<Reference>,
    ) -> Result<Reference> {
        let mut remaining = args.into_iter();
        for param in &self.params {
            if param == "..." {
                break;
            }
            let arg = remaining.next().unwrap_or_else(Reference::null_constant);
            scope.set_named_reference(param.clone(), arg);
        }
        let tail: Vec<Reference> = remaining.collect();

        scope.set_named_reference("__this", this);
        scope.set_named_reference(
            "__func",
            Reference::constant(Value::string(self.describe())),
        );
        scope.set_named_reference(
            "__varg",
            Reference::constant(Value::Function(Rc::new(VariadicArguer::new(
                self.location.clone(),
                tail,
            )))),
        );
        scope.set_named_reference(
            "__file",
            Reference::constant(Value::string(self.location.file())),
        );
        scope.set_named_reference(
            "__line",
            Reference::constant(Value::Integer(i64::from(self.location.line()))),
        );

        let mut result = Reference::null_constant();
        let status = self.body.execute_in_place(&mut result, scope, global)?;
        match status {
            Status::Next | Status::Return => Ok(result),
            Status::BreakUnspec | Status::BreakSwitch | Status::BreakWhile | Status::BreakFor => {
                Err(Error::new(
                    ErrorKind::StrayControl,
                    "`break` statements are not allowed outside matching `switch` or loop statements",
                ))
            }
            Status::ContinueUnspec | Status::ContinueWhile | Status::ContinueFor => {
                Err(Error::new(
                    ErrorKind::StrayControl,
                    "`continue` statements are not allowed outside matching loop statements",
                ))
            }
        }
    }
}

/// The callable bound to `__varg`: `__varg()` is the variadic count,
/// `__varg(i)` is the i-th variadic argument (null when out of range).
#[derive(Debug)]
pub struct VariadicArguer {
    location: SourceLocation,
    args: Vec<Reference>,
}

impl VariadicArguer {
    pub fn new(location: SourceLocation, args: Vec<Reference>) -> Self {
        VariadicArguer { location, args }
    }
}

impl Callable for VariadicArguer {
    fn name(&self) -> &str {
        "__varg"
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }

    fn invoke(
        &self,
        _global: &GlobalContext,
        _this: Reference,
        args: Vec<Reference>,
    ) -> Result<Reference> {
        match args.len() {
            0 => Ok(Reference::temporary(Value::Integer(self.args.len() as i64))),
            1 => {
                let index = match args[0].read()? {
                    Value::Integer(i) => i,
                    other => {
                        return Err(Error::new(
                            ErrorKind::ArgumentMismatch,
                            format!(
                                "`__varg` expects an `integer` index, got `{}`",
                                other.type_name()
                            ),
                        ))
                    }
                };
                if index < 0 || index >= self.args.len() as i64 {
                    return Ok(Reference::null_constant());
                }
                Ok(self.args[index as usize].clone())
            }
            n => Err(Error::new(
                ErrorKind::ArgumentMismatch,
                format!("`__varg` accepts zero or one arguments, got {}", n),
            )),
        }
    }

    fn enumerate_variables(&self, walker: &mut VarWalker<'_>) {
        for arg in &self.args {
            arg.enumerate_variables(walker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variadic_arguer_contract() {
        let global = GlobalContext::default();
        let arguer = VariadicArguer::new(
            SourceLocation::new("demo.ast", 1),
            vec![
                Reference::temporary(Value::Integer(10)),
                Reference::temporary(Value::Integer(20)),
            ],
        );

        let count = arguer
            .invoke(&global, Reference::null_constant(), Vec::new())
            .unwrap();
        assert_eq!(count.read().unwrap(), Value::Integer(2));

        let first = arguer
            .invoke(
                &global,
                Reference::null_constant(),
                vec![Reference::temporary(Value::Integer(0))],
            )
            .unwrap();
        assert_eq!(first.read().unwrap(), Value::Integer(10));

        let out_of_range = arguer
            .invoke(
                &global,
                Reference::null_constant(),
                vec![Reference::temporary(Value::Integer(9))],
            )
            .unwrap();
        assert_eq!(out_of_range.read().unwrap(), Value::Null);

        let err = arguer
            .invoke(
                &global,
                Reference::null_constant(),
                vec![Reference::temporary(Value::string("x"))],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentMismatch);
    }
}
