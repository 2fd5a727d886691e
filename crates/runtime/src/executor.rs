//! Statement executor
//!
//! Statements compile into executable units; a block runs its units in
//! order and returns the first non-`next` [`Status`], which is how
//! `break`/`continue`/`return` travel without touching the failure channel.
//! The dispatch loop is a straight loop — unrolling it is a pure
//! performance trick with no semantic weight.
//!
//! Each boundary between statements polls the host interrupt flag and
//! gives the cycle collector a safe point.

use crate::collector::VarWalker;
use crate::evaluator::Expression;
use crate::function::ScriptFunction;
use crate::global::GlobalContext;
use crate::reference::{Modifier, Reference};
use crate::scope::Scope;
use crate::value::{Object, Value};
use asteria_compiler::ast;
use asteria_core::{Error, ErrorKind, Result, SourceLocation};
use std::rc::Rc;

/// The control-flow sum produced by every statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Next,
    BreakUnspec,
    BreakSwitch,
    BreakWhile,
    BreakFor,
    ContinueUnspec,
    ContinueWhile,
    ContinueFor,
    Return,
}

/// A compiled statement sequence.
#[derive(Debug, Clone, Default)]
pub struct Block {
    units: Vec<Unit>,
}

#[derive(Debug, Clone)]
struct Unit {
    kind: UnitKind,
    location: SourceLocation,
}

#[derive(Debug, Clone)]
enum UnitKind {
    Expression {
        expr: Expression,
    },
    VarDecl {
        name: String,
        immutable: bool,
        init: Option<Expression>,
    },
    /// The body stays unbound here; it binds when the declaration executes,
    /// against the executive scope current at that moment.
    FunctionDecl {
        name: String,
        params: Vec<String>,
        body: Rc<Block>,
    },
    If {
        cond: Expression,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    Switch {
        subject: Expression,
        clauses: Vec<(Option<Expression>, Block)>,
    },
    While {
        cond: Expression,
        body: Block,
        is_do_while: bool,
    },
    For {
        init: Option<Box<Unit>>,
        cond: Option<Expression>,
        step: Option<Expression>,
        body: Block,
    },
    ForEach {
        key_name: String,
        value_name: String,
        subject: Expression,
        body: Block,
    },
    Try {
        body: Block,
        exception_name: String,
        catch_block: Block,
    },
    Throw {
        expr: Expression,
    },
    Return {
        expr: Option<Expression>,
    },
    Break {
        status: Status,
    },
    Continue {
        status: Status,
    },
    Block {
        body: Block,
    },
}

impl Block {
    /// Compile a statement tree. `file` names the source for locations.
    pub fn compile(block: &ast::Block, file: &str) -> Block {
        Block {
            units: block.stmts.iter().map(|s| compile_stmt(s, file)).collect(),
        }
    }

    /// Bind against an analytic context chained over the defining scope:
    /// a fresh analytic child stands in for the scope this block will open
    /// at execution.
    pub fn bind(&self, ctx: &Rc<Scope>, global: &GlobalContext) -> Block {
        let ctx_next = Scope::new_child(ctx);
        self.bind_in_place(&ctx_next, global)
    }

    fn bind_in_place(&self, ctx: &Rc<Scope>, global: &GlobalContext) -> Block {
        Block {
            units: self.units.iter().map(|u| bind_unit(u, ctx, global)).collect(),
        }
    }

    /// Execute in a fresh child scope.
    pub fn execute(
        &self,
        ref_out: &mut Reference,
        scope: &Rc<Scope>,
        global: &GlobalContext,
    ) -> Result<Status> {
        let scope_next = Scope::new_child(scope);
        self.execute_in_place(ref_out, &scope_next, global)
    }

    /// Execute directly in `scope`. The first non-`next` status
    /// short-circuits; a failure is annotated with the failing statement.
    pub fn execute_in_place(
        &self,
        ref_out: &mut Reference,
        scope: &Rc<Scope>,
        global: &GlobalContext,
    ) -> Result<Status> {
        for (index, unit) in self.units.iter().enumerate() {
            global.check_interrupt()?;
            global.maybe_collect();
            match unit.execute(ref_out, scope, global) {
                Ok(Status::Next) => {}
                Ok(status) => return Ok(status),
                Err(mut err) => {
                    err.note_statement(unit.location.clone(), index);
                    return Err(err);
                }
            }
        }
        Ok(Status::Next)
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub(crate) fn enumerate_variables(&self, walker: &mut VarWalker<'_>) {
        for unit in &self.units {
            unit.enumerate_variables(walker);
        }
    }
}

fn compile_stmt(stmt: &ast::Stmt, file: &str) -> Unit {
    let location = SourceLocation::new(file, stmt.span.line);
    let kind = match &stmt.kind {
        ast::StmtKind::Expression { expr } => UnitKind::Expression {
            expr: Expression::compile(expr, file),
        },
        ast::StmtKind::VarDecl {
            name,
            immutable,
            init,
        } => UnitKind::VarDecl {
            name: name.clone(),
            immutable: *immutable,
            init: init.as_ref().map(|e| Expression::compile(e, file)),
        },
        ast::StmtKind::FunctionDecl { name, params, body } => UnitKind::FunctionDecl {
            name: name.clone(),
            params: params.clone(),
            body: Rc::new(Block::compile(body, file)),
        },
        ast::StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => UnitKind::If {
            cond: Expression::compile(cond, file),
            then_branch: Block::compile(then_branch, file),
            else_branch: else_branch.as_ref().map(|b| Block::compile(b, file)),
        },
        ast::StmtKind::Switch { subject, clauses } => UnitKind::Switch {
            subject: Expression::compile(subject, file),
            clauses: clauses
                .iter()
                .map(|c| {
                    (
                        c.label.as_ref().map(|e| Expression::compile(e, file)),
                        Block::compile(&c.body, file),
                    )
                })
                .collect(),
        },
        ast::StmtKind::While {
            cond,
            body,
            is_do_while,
        } => UnitKind::While {
            cond: Expression::compile(cond, file),
            body: Block::compile(body, file),
            is_do_while: *is_do_while,
        },
        ast::StmtKind::For {
            init,
            cond,
            step,
            body,
        } => UnitKind::For {
            init: init.as_ref().map(|s| Box::new(compile_stmt(s, file))),
            cond: cond.as_ref().map(|e| Expression::compile(e, file)),
            step: step.as_ref().map(|e| Expression::compile(e, file)),
            body: Block::compile(body, file),
        },
        ast::StmtKind::ForEach {
            key_name,
            value_name,
            subject,
            body,
        } => UnitKind::ForEach {
            key_name: key_name.clone(),
            value_name: value_name.clone(),
            subject: Expression::compile(subject, file),
            body: Block::compile(body, file),
        },
        ast::StmtKind::Try {
            body,
            exception_name,
            catch_block,
        } => UnitKind::Try {
            body: Block::compile(body, file),
            exception_name: exception_name.clone(),
            catch_block: Block::compile(catch_block, file),
        },
        ast::StmtKind::Throw { expr } => UnitKind::Throw {
            expr: Expression::compile(expr, file),
        },
        ast::StmtKind::Return { expr } => UnitKind::Return {
            expr: expr.as_ref().map(|e| Expression::compile_for_return(e, file)),
        },
        ast::StmtKind::Break { target } => UnitKind::Break {
            status: match target {
                ast::BreakTarget::Unspecified => Status::BreakUnspec,
                ast::BreakTarget::Switch => Status::BreakSwitch,
                ast::BreakTarget::While => Status::BreakWhile,
                ast::BreakTarget::For => Status::BreakFor,
            },
        },
        ast::StmtKind::Continue { target } => UnitKind::Continue {
            status: match target {
                ast::BreakTarget::While => Status::ContinueWhile,
                ast::BreakTarget::For => Status::ContinueFor,
                _ => Status::ContinueUnspec,
            },
        },
        ast::StmtKind::Block { body } => UnitKind::Block {
            body: Block::compile(body, file),
        },
    };
    Unit { kind, location }
}

fn bind_unit(unit: &Unit, ctx: &Rc<Scope>, global: &GlobalContext) -> Unit {
    let kind = match &unit.kind {
        UnitKind::Expression { expr } => UnitKind::Expression {
            expr: expr.bind(ctx, global),
        },
        UnitKind::VarDecl {
            name,
            immutable,
            init,
        } => {
            // The variable exists before its initialiser runs.
            ctx.open_placeholder(name.clone());
            UnitKind::VarDecl {
                name: name.clone(),
                immutable: *immutable,
                init: init.as_ref().map(|e| e.bind(ctx, global)),
            }
        }
        UnitKind::FunctionDecl { name, params, body } => {
            ctx.open_placeholder(name.clone());
            UnitKind::FunctionDecl {
                name: name.clone(),
                params: params.clone(),
                body: body.clone(),
            }
        }
        UnitKind::If {
            cond,
            then_branch,
            else_branch,
        } => UnitKind::If {
            cond: cond.bind(ctx, global),
            then_branch: then_branch.bind(ctx, global),
            else_branch: else_branch.as_ref().map(|b| b.bind(ctx, global)),
        },
        UnitKind::Switch { subject, clauses } => {
            // One shared context mirrors the one scope the switch opens.
            let body_ctx = Scope::new_child(ctx);
            UnitKind::Switch {
                subject: subject.bind(ctx, global),
                clauses: clauses
                    .iter()
                    .map(|(label, body)| {
                        (
                            label.as_ref().map(|e| e.bind(&body_ctx, global)),
                            body.bind_in_place(&body_ctx, global),
                        )
                    })
                    .collect(),
            }
        }
        UnitKind::While {
            cond,
            body,
            is_do_while,
        } => UnitKind::While {
            cond: cond.bind(ctx, global),
            body: body.bind(ctx, global),
            is_do_while: *is_do_while,
        },
        UnitKind::For {
            init,
            cond,
            step,
            body,
        } => {
            let for_ctx = Scope::new_child(ctx);
            UnitKind::For {
                init: init.as_ref().map(|u| Box::new(bind_unit(u, &for_ctx, global))),
                cond: cond.as_ref().map(|e| e.bind(&for_ctx, global)),
                step: step.as_ref().map(|e| e.bind(&for_ctx, global)),
                body: body.bind(&for_ctx, global),
            }
        }
        UnitKind::ForEach {
            key_name,
            value_name,
            subject,
            body,
        } => {
            let iter_ctx = Scope::new_child(ctx);
            iter_ctx.open_placeholder(key_name.clone());
            iter_ctx.open_placeholder(value_name.clone());
            UnitKind::ForEach {
                key_name: key_name.clone(),
                value_name: value_name.clone(),
                subject: subject.bind(ctx, global),
                body: body.bind_in_place(&iter_ctx, global),
            }
        }
        UnitKind::Try {
            body,
            exception_name,
            catch_block,
        } => {
            let catch_ctx = Scope::new_child(ctx);
            catch_ctx.open_placeholder(exception_name.clone());
            UnitKind::Try {
                body: body.bind(ctx, global),
                exception_name: exception_name.clone(),
                catch_block: catch_block.bind_in_place(&catch_ctx, global),
            }
        }
        UnitKind::Throw { expr } => UnitKind::Throw {
            expr: expr.bind(ctx, global),
        },
        UnitKind::Return { expr } => UnitKind::Return {
            expr: expr.as_ref().map(|e| e.bind(ctx, global)),
        },
        UnitKind::Break { status } => UnitKind::Break { status: *status },
        UnitKind::Continue { status } => UnitKind::Continue { status: *status },
        UnitKind::Block { body } => UnitKind::Block {
            body: body.bind(ctx, global),
        },
    };
    Unit {
        kind,
        location: unit.location.clone(),
    }
}

impl Unit {
    fn execute(
        &self,
        ref_out: &mut Reference,
        scope: &Rc<Scope>,
        global: &GlobalContext,
    ) -> Result<Status> {
        match &self.kind {
            UnitKind::Expression { expr } => {
                *ref_out = expr.evaluate(scope, global)?;
                Ok(Status::Next)
            }
            UnitKind::VarDecl {
                name,
                immutable,
                init,
            } => {
                if scope.is_declared(name) {
                    return Err(redeclaration(name));
                }
                let var = global.create_variable(Value::Null, false);
                scope.set_named_reference(name.clone(), Reference::variable(var.clone()));
                if let Some(init) = init {
                    let value = init.evaluate(scope, global)?.read()?;
                    var.set(value)?;
                }
                if *immutable {
                    var.freeze();
                }
                Ok(Status::Next)
            }
            UnitKind::FunctionDecl { name, params, body } => {
                if scope.is_declared(name) {
                    return Err(redeclaration(name));
                }
                let var = global.create_variable(Value::Null, false);
                scope.set_named_reference(name.clone(), Reference::variable(var.clone()));
                let function = ScriptFunction::instantiate(
                    global,
                    scope,
                    self.location.clone(),
                    name.clone(),
                    params.clone(),
                    body,
                );
                var.set(Value::Function(function))?;
                Ok(Status::Next)
            }
            UnitKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if cond.evaluate(scope, global)?.read()?.is_truthy() {
                    then_branch.execute(ref_out, scope, global)
                } else if let Some(else_branch) = else_branch {
                    else_branch.execute(ref_out, scope, global)
                } else {
                    Ok(Status::Next)
                }
            }
            UnitKind::Switch { subject, clauses } => {
                self.execute_switch(subject, clauses, ref_out, scope, global)
            }
            UnitKind::While {
                cond,
                body,
                is_do_while,
            } => {
                if *is_do_while {
                    loop {
                        match self.run_loop_body(body, ref_out, scope, global, false)? {
                            LoopFlow::Normal => {}
                            LoopFlow::Exit => return Ok(Status::Next),
                            LoopFlow::Propagate(status) => return Ok(status),
                        }
                        if !cond.evaluate(scope, global)?.read()?.is_truthy() {
                            return Ok(Status::Next);
                        }
                    }
                } else {
                    loop {
                        if !cond.evaluate(scope, global)?.read()?.is_truthy() {
                            return Ok(Status::Next);
                        }
                        match self.run_loop_body(body, ref_out, scope, global, false)? {
                            LoopFlow::Normal => {}
                            LoopFlow::Exit => return Ok(Status::Next),
                            LoopFlow::Propagate(status) => return Ok(status),
                        }
                    }
                }
            }
            UnitKind::For {
                init,
                cond,
                step,
                body,
            } => {
                let for_scope = Scope::new_child(scope);
                if let Some(init) = init {
                    init.execute(ref_out, &for_scope, global)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !cond.evaluate(&for_scope, global)?.read()?.is_truthy() {
                            return Ok(Status::Next);
                        }
                    }
                    match self.run_loop_body(body, ref_out, &for_scope, global, true)? {
                        LoopFlow::Normal => {}
                        LoopFlow::Exit => return Ok(Status::Next),
                        LoopFlow::Propagate(status) => return Ok(status),
                    }
                    if let Some(step) = step {
                        step.evaluate(&for_scope, global)?;
                    }
                }
            }
            UnitKind::ForEach {
                key_name,
                value_name,
                subject,
                body,
            } => self.execute_for_each(key_name, value_name, subject, body, ref_out, scope, global),
            UnitKind::Try {
                body,
                exception_name,
                catch_block,
            } => match body.execute(ref_out, scope, global) {
                Ok(status) => Ok(status),
                Err(err) => {
                    let exception = exception_from_error(&err);
                    let catch_scope = Scope::new_child(scope);
                    let var = global.create_variable(exception, false);
                    catch_scope
                        .set_named_reference(exception_name.clone(), Reference::variable(var));
                    catch_block.execute_in_place(ref_out, &catch_scope, global)
                }
            },
            UnitKind::Throw { expr } => {
                let value = expr.evaluate(scope, global)?.read()?;
                let mut err = Error::new(
                    ErrorKind::User,
                    format!("script threw a value: {}", value.print(true)),
                )
                .with_payload(Box::new(value));
                err.push_frame("<throw>", self.location.clone(), 0);
                Err(err)
            }
            UnitKind::Return { expr } => {
                *ref_out = match expr {
                    Some(expr) => expr.evaluate(scope, global)?,
                    None => Reference::null_constant(),
                };
                Ok(Status::Return)
            }
            UnitKind::Break { status } | UnitKind::Continue { status } => Ok(*status),
            UnitKind::Block { body } => body.execute(ref_out, scope, global),
        }
    }

    fn execute_switch(
        &self,
        subject: &Expression,
        clauses: &[(Option<Expression>, Block)],
        ref_out: &mut Reference,
        scope: &Rc<Scope>,
        global: &GlobalContext,
    ) -> Result<Status> {
        let subject_value = subject.evaluate(scope, global)?.read()?;
        // One scope spans the whole body, so declarations survive
        // fallthrough into later clauses.
        let switch_scope = Scope::new_child(scope);

        let mut start = None;
        let mut default = None;
        for (index, (label, _)) in clauses.iter().enumerate() {
            match label {
                Some(label) => {
                    let label_value = label.evaluate(&switch_scope, global)?.read()?;
                    if label_value == subject_value {
                        start = Some(index);
                        break;
                    }
                }
                None => default = Some(index),
            }
        }
        let Some(start) = start.or(default) else {
            return Ok(Status::Next);
        };

        for (_, body) in &clauses[start..] {
            match body.execute_in_place(ref_out, &switch_scope, global)? {
                Status::Next => {}
                Status::BreakSwitch | Status::BreakUnspec => return Ok(Status::Next),
                status => return Ok(status),
            }
        }
        Ok(Status::Next)
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_for_each(
        &self,
        key_name: &str,
        value_name: &str,
        subject: &Expression,
        body: &Block,
        ref_out: &mut Reference,
        scope: &Rc<Scope>,
        global: &GlobalContext,
    ) -> Result<Status> {
        let subject_ref = subject.evaluate(scope, global)?;
        let subject_value = subject_ref.read()?;

        // Snapshot the key set; mutation during iteration is unspecified.
        let steps: Vec<(Value, Modifier)> = match &subject_value {
            Value::Array(arr) => (0..arr.len() as i64)
                .map(|i| (Value::Integer(i), Modifier::ArrayIndex(i)))
                .collect(),
            Value::Object(members) => members
                .keys()
                .map(|k| (Value::string(k.as_bytes()), Modifier::ObjectKey(k.clone())))
                .collect(),
            other => {
                return Err(Error::new(
                    ErrorKind::TypeMismatch,
                    format!(
                        "`for each` requires an `array` or `object`, got `{}`",
                        other.type_name()
                    ),
                ))
            }
        };

        for (key, modifier) in steps {
            let iter_scope = Scope::new_child(scope);
            iter_scope.set_named_reference(key_name.to_string(), Reference::constant(key));
            iter_scope.set_named_reference(
                value_name.to_string(),
                subject_ref.clone().zoom_in(modifier),
            );
            match body.execute_in_place(ref_out, &iter_scope, global)? {
                Status::Next | Status::ContinueUnspec | Status::ContinueFor => {}
                Status::BreakUnspec | Status::BreakFor => return Ok(Status::Next),
                status => return Ok(status),
            }
        }
        Ok(Status::Next)
    }

    /// Run one loop-body iteration and fold its status: `for_loop` selects
    /// which targeted break/continue this loop consumes.
    fn run_loop_body(
        &self,
        body: &Block,
        ref_out: &mut Reference,
        scope: &Rc<Scope>,
        global: &GlobalContext,
        for_loop: bool,
    ) -> Result<LoopFlow> {
        let status = body.execute(ref_out, scope, global)?;
        let (break_mine, continue_mine) = if for_loop {
            (Status::BreakFor, Status::ContinueFor)
        } else {
            (Status::BreakWhile, Status::ContinueWhile)
        };
        if status == Status::Next || status == Status::ContinueUnspec || status == continue_mine {
            Ok(LoopFlow::Normal)
        } else if status == Status::BreakUnspec || status == break_mine {
            Ok(LoopFlow::Exit)
        } else {
            Ok(LoopFlow::Propagate(status))
        }
    }

    fn enumerate_variables(&self, walker: &mut VarWalker<'_>) {
        match &self.kind {
            UnitKind::Expression { expr } | UnitKind::Throw { expr } => {
                expr.enumerate_variables(walker)
            }
            UnitKind::VarDecl { init, .. } => {
                if let Some(init) = init {
                    init.enumerate_variables(walker);
                }
            }
            // Unbound bodies hold no references.
            UnitKind::FunctionDecl { .. } => {}
            UnitKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.enumerate_variables(walker);
                then_branch.enumerate_variables(walker);
                if let Some(else_branch) = else_branch {
                    else_branch.enumerate_variables(walker);
                }
            }
            UnitKind::Switch { subject, clauses } => {
                subject.enumerate_variables(walker);
                for (label, body) in clauses {
                    if let Some(label) = label {
                        label.enumerate_variables(walker);
                    }
                    body.enumerate_variables(walker);
                }
            }
            UnitKind::While { cond, body, .. } => {
                cond.enumerate_variables(walker);
                body.enumerate_variables(walker);
            }
            UnitKind::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    init.enumerate_variables(walker);
                }
                if let Some(cond) = cond {
                    cond.enumerate_variables(walker);
                }
                if let Some(step) = step {
                    step.enumerate_variables(walker);
                }
                body.enumerate_variables(walker);
            }
            UnitKind::ForEach { subject, body, .. } => {
                subject.enumerate_variables(walker);
                body.enumerate_variables(walker);
            }
            UnitKind::Try {
                body, catch_block, ..
            } => {
                body.enumerate_variables(walker);
                catch_block.enumerate_variables(walker);
            }
            UnitKind::Return { expr } => {
                if let Some(expr) = expr {
                    expr.enumerate_variables(walker);
                }
            }
            UnitKind::Break { .. } | UnitKind::Continue { .. } => {}
            UnitKind::Block { body } => body.enumerate_variables(walker),
        }
    }
}

enum LoopFlow {
    Normal,
    Exit,
    Propagate(Status),
}

fn redeclaration(name: &str) -> Error {
    Error::new(
        ErrorKind::Redeclaration,
        format!("duplicate declaration of `{}` in the same scope", name),
    )
}

/// The object a `catch` binds: the thrown value (or the failure message for
/// non-`user` kinds) plus the ordered backtrace.
fn exception_from_error(err: &Error) -> Value {
    let value = err
        .payload()
        .and_then(|p| p.as_any().downcast_ref::<Value>())
        .cloned()
        .unwrap_or_else(|| Value::string(err.to_string()));

    let backtrace: Vec<Value> = err
        .frames()
        .iter()
        .map(|frame| {
            let mut members = Object::new();
            members.insert(
                "function".to_string(),
                Value::string(frame.function.as_bytes()),
            );
            members.insert("file".to_string(), Value::string(frame.location.file()));
            members.insert(
                "line".to_string(),
                Value::Integer(i64::from(frame.location.line())),
            );
            members.insert(
                "statement".to_string(),
                Value::Integer(frame.statement as i64),
            );
            Value::Object(members)
        })
        .collect();

    let mut exception = Object::new();
    exception.insert("value".to_string(), value);
    exception.insert("backtrace".to_string(), Value::Array(backtrace));
    Value::Object(exception)
}
