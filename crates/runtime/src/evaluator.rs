//! Expression evaluator: a stack machine over linearised postfix nodes
//!
//! Expression trees compile into a flat node sequence evaluated against a
//! reference stack. Operands stay references until an operator needs their
//! values, so lvalues flow through subscripts, branches and calls intact.
//! After evaluation the stack holds exactly one reference — the result.
//!
//! The bind pass rewrites named references that resolve in an enclosing
//! executive scope into bound reference copies; that is how closures
//! capture their environment.

use crate::collector::VarWalker;
use crate::function::ScriptFunction;
use crate::global::GlobalContext;
use crate::reference::{Modifier, Reference};
use crate::scope::Scope;
use crate::value::{Compare, Object, Value};
use asteria_compiler::ast;
use asteria_core::{Error, ErrorKind, Result, SourceLocation};
use std::rc::Rc;

/// Cap on the byte length produced by string repetition.
const STRING_LIMIT: usize = 0x1000_0000;

/// Operator opcodes, in RPN order on the node sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Xop {
    PostfixInc,
    PostfixDec,
    PrefixPos,
    PrefixNeg,
    PrefixNotLogical,
    PrefixNotBitwise,
    PrefixInc,
    PrefixDec,
    InfixAdd,
    InfixSub,
    InfixMul,
    InfixDiv,
    InfixRem,
    InfixAndBitwise,
    InfixOrBitwise,
    InfixXorBitwise,
    InfixEq,
    InfixNe,
    InfixLt,
    InfixGt,
    InfixLe,
    InfixGe,
    InfixAssign,
}

#[derive(Debug, Clone)]
pub enum XprNode {
    /// Push the value as a temporary.
    Literal { value: Value },
    /// Resolve in the current scope chain and push a copy.
    NamedReference { name: String },
    /// A reference frozen in by the bind pass; push a copy.
    BoundReference { reference: Reference },
    /// Instantiate an anonymous function over the current scope.
    Closure {
        params: Vec<String>,
        body: Rc<crate::executor::Block>,
        location: SourceLocation,
    },
    /// Pop `count` element references and push a fresh array temporary.
    UnnamedArray { count: usize },
    /// Pop one value per key and push a fresh object temporary.
    UnnamedObject { keys: Vec<String> },
    /// Pop the base and push it zoomed in by a constant key.
    SubscriptConst { key: String },
    /// Pop the key and the base; push the base zoomed in by the key.
    SubscriptExpr,
    Operator { op: Xop, assign: bool },
    Branch {
        true_nodes: Vec<XprNode>,
        false_nodes: Vec<XprNode>,
        assign: bool,
    },
    /// Pop `argc` arguments and the callee, then invoke. The tail flag is
    /// carried through but invoked as a regular call.
    FunctionCall { argc: usize, tail: bool },
    Coalesce { alt_nodes: Vec<XprNode>, assign: bool },
    LogicalAndOr {
        more_nodes: Vec<XprNode>,
        is_or: bool,
        assign: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Expression {
    nodes: Vec<XprNode>,
}

impl Expression {
    /// Linearise an expression tree into postfix nodes.
    pub fn compile(expr: &ast::Expr, file: &str) -> Expression {
        let mut nodes = Vec::new();
        compile_into(&mut nodes, expr, file);
        Expression { nodes }
    }

    /// Like [`Expression::compile`], marking a trailing call as a tail
    /// call. Purely an optimisation hint; not observable in results.
    pub fn compile_for_return(expr: &ast::Expr, file: &str) -> Expression {
        let mut compiled = Expression::compile(expr, file);
        if let Some(XprNode::FunctionCall { tail, .. }) = compiled.nodes.last_mut() {
            *tail = true;
        }
        compiled
    }

    /// Rewrite named references that resolve in an enclosing executive
    /// scope into bound copies. Placeholder hits are runtime-local names
    /// and stay named; misses stay named for the global fallback.
    pub fn bind(&self, ctx: &Rc<Scope>, global: &GlobalContext) -> Expression {
        Expression {
            nodes: bind_nodes(&self.nodes, ctx, global),
        }
    }

    /// Evaluate against a fresh reference stack; the single remaining
    /// reference is the result.
    pub fn evaluate(&self, scope: &Rc<Scope>, global: &GlobalContext) -> Result<Reference> {
        evaluate_subsequence(&self.nodes, scope, global)
    }

    pub(crate) fn enumerate_variables(&self, walker: &mut VarWalker<'_>) {
        enumerate_nodes(&self.nodes, walker);
    }
}

fn compile_into(nodes: &mut Vec<XprNode>, expr: &ast::Expr, file: &str) {
    match expr {
        ast::Expr::Null => nodes.push(XprNode::Literal { value: Value::Null }),
        ast::Expr::Bool(b) => nodes.push(XprNode::Literal {
            value: Value::Boolean(*b),
        }),
        ast::Expr::Integer(n) => nodes.push(XprNode::Literal {
            value: Value::Integer(*n),
        }),
        ast::Expr::Real(r) => nodes.push(XprNode::Literal {
            value: Value::Real(*r),
        }),
        ast::Expr::Str(bytes) => nodes.push(XprNode::Literal {
            value: Value::string(bytes),
        }),
        ast::Expr::Ident(name, _) => nodes.push(XprNode::NamedReference { name: name.clone() }),
        ast::Expr::Array(elements) => {
            for element in elements {
                compile_into(nodes, element, file);
            }
            nodes.push(XprNode::UnnamedArray {
                count: elements.len(),
            });
        }
        ast::Expr::Object(members) => {
            for (_, value) in members {
                compile_into(nodes, value, file);
            }
            nodes.push(XprNode::UnnamedObject {
                keys: members.iter().map(|(k, _)| k.clone()).collect(),
            });
        }
        ast::Expr::Func { params, body, span } => {
            let compiled = crate::executor::Block::compile(body, file);
            nodes.push(XprNode::Closure {
                params: params.clone(),
                body: Rc::new(compiled),
                location: SourceLocation::new(file, span.line),
            });
        }
        ast::Expr::Unary { op, operand } => {
            compile_into(nodes, operand, file);
            nodes.push(XprNode::Operator {
                op: unary_opcode(*op),
                assign: false,
            });
        }
        ast::Expr::Binary { op, lhs, rhs } => {
            compile_into(nodes, lhs, file);
            compile_into(nodes, rhs, file);
            nodes.push(XprNode::Operator {
                op: binary_opcode(*op),
                assign: false,
            });
        }
        ast::Expr::Assign { op, lhs, rhs } => {
            compile_into(nodes, lhs, file);
            compile_into(nodes, rhs, file);
            match op {
                None => nodes.push(XprNode::Operator {
                    op: Xop::InfixAssign,
                    assign: false,
                }),
                Some(binary) => nodes.push(XprNode::Operator {
                    op: binary_opcode(*binary),
                    assign: true,
                }),
            }
        }
        ast::Expr::Ternary {
            cond,
            then_branch,
            else_branch,
        } => {
            compile_into(nodes, cond, file);
            let mut true_nodes = Vec::new();
            compile_into(&mut true_nodes, then_branch, file);
            let mut false_nodes = Vec::new();
            compile_into(&mut false_nodes, else_branch, file);
            nodes.push(XprNode::Branch {
                true_nodes,
                false_nodes,
                assign: false,
            });
        }
        ast::Expr::Coalesce { lhs, rhs } => {
            compile_into(nodes, lhs, file);
            let mut alt_nodes = Vec::new();
            compile_into(&mut alt_nodes, rhs, file);
            nodes.push(XprNode::Coalesce {
                alt_nodes,
                assign: false,
            });
        }
        ast::Expr::LogicalAnd { lhs, rhs } => {
            compile_into(nodes, lhs, file);
            let mut more_nodes = Vec::new();
            compile_into(&mut more_nodes, rhs, file);
            nodes.push(XprNode::LogicalAndOr {
                more_nodes,
                is_or: false,
                assign: false,
            });
        }
        ast::Expr::LogicalOr { lhs, rhs } => {
            compile_into(nodes, lhs, file);
            let mut more_nodes = Vec::new();
            compile_into(&mut more_nodes, rhs, file);
            nodes.push(XprNode::LogicalAndOr {
                more_nodes,
                is_or: true,
                assign: false,
            });
        }
        ast::Expr::Subscript { base, index } => {
            compile_into(nodes, base, file);
            compile_into(nodes, index, file);
            nodes.push(XprNode::SubscriptExpr);
        }
        ast::Expr::Member { base, key } => {
            compile_into(nodes, base, file);
            nodes.push(XprNode::SubscriptConst { key: key.clone() });
        }
        ast::Expr::Call { callee, args, .. } => {
            compile_into(nodes, callee, file);
            for arg in args {
                compile_into(nodes, arg, file);
            }
            nodes.push(XprNode::FunctionCall {
                argc: args.len(),
                tail: false,
            });
        }
    }
}

fn unary_opcode(op: ast::UnaryOp) -> Xop {
    match op {
        ast::UnaryOp::Pos => Xop::PrefixPos,
        ast::UnaryOp::Neg => Xop::PrefixNeg,
        ast::UnaryOp::NotLogical => Xop::PrefixNotLogical,
        ast::UnaryOp::NotBitwise => Xop::PrefixNotBitwise,
        ast::UnaryOp::PrefixInc => Xop::PrefixInc,
        ast::UnaryOp::PrefixDec => Xop::PrefixDec,
        ast::UnaryOp::PostfixInc => Xop::PostfixInc,
        ast::UnaryOp::PostfixDec => Xop::PostfixDec,
    }
}

fn binary_opcode(op: ast::BinaryOp) -> Xop {
    match op {
        ast::BinaryOp::Add => Xop::InfixAdd,
        ast::BinaryOp::Sub => Xop::InfixSub,
        ast::BinaryOp::Mul => Xop::InfixMul,
        ast::BinaryOp::Div => Xop::InfixDiv,
        ast::BinaryOp::Rem => Xop::InfixRem,
        ast::BinaryOp::AndBitwise => Xop::InfixAndBitwise,
        ast::BinaryOp::OrBitwise => Xop::InfixOrBitwise,
        ast::BinaryOp::XorBitwise => Xop::InfixXorBitwise,
        ast::BinaryOp::Eq => Xop::InfixEq,
        ast::BinaryOp::Ne => Xop::InfixNe,
        ast::BinaryOp::Lt => Xop::InfixLt,
        ast::BinaryOp::Gt => Xop::InfixGt,
        ast::BinaryOp::Le => Xop::InfixLe,
        ast::BinaryOp::Ge => Xop::InfixGe,
    }
}

fn bind_nodes(nodes: &[XprNode], ctx: &Rc<Scope>, global: &GlobalContext) -> Vec<XprNode> {
    nodes
        .iter()
        .map(|node| match node {
            XprNode::NamedReference { name } => match ctx.get_named_reference(name) {
                Some(found) if !found.is_placeholder() => XprNode::BoundReference {
                    reference: found,
                },
                _ => node.clone(),
            },
            XprNode::Branch {
                true_nodes,
                false_nodes,
                assign,
            } => XprNode::Branch {
                true_nodes: bind_nodes(true_nodes, ctx, global),
                false_nodes: bind_nodes(false_nodes, ctx, global),
                assign: *assign,
            },
            XprNode::Coalesce { alt_nodes, assign } => XprNode::Coalesce {
                alt_nodes: bind_nodes(alt_nodes, ctx, global),
                assign: *assign,
            },
            XprNode::LogicalAndOr {
                more_nodes,
                is_or,
                assign,
            } => XprNode::LogicalAndOr {
                more_nodes: bind_nodes(more_nodes, ctx, global),
                is_or: *is_or,
                assign: *assign,
            },
            // Closure bodies bind at instantiation, against the scope the
            // closure expression evaluates in.
            other => other.clone(),
        })
        .collect()
}

fn enumerate_nodes(nodes: &[XprNode], walker: &mut VarWalker<'_>) {
    for node in nodes {
        match node {
            XprNode::Literal { value } => walker.walk_value(value),
            XprNode::BoundReference { reference } => reference.enumerate_variables(walker),
            XprNode::Branch {
                true_nodes,
                false_nodes,
                ..
            } => {
                enumerate_nodes(true_nodes, walker);
                enumerate_nodes(false_nodes, walker);
            }
            XprNode::Coalesce { alt_nodes, .. } => enumerate_nodes(alt_nodes, walker),
            XprNode::LogicalAndOr { more_nodes, .. } => enumerate_nodes(more_nodes, walker),
            _ => {}
        }
    }
}

/// Evaluate a node sub-sequence; it must produce exactly one reference.
fn evaluate_subsequence(
    nodes: &[XprNode],
    scope: &Rc<Scope>,
    global: &GlobalContext,
) -> Result<Reference> {
    let mut stack: Vec<Reference> = Vec::new();
    evaluate_nodes(nodes, &mut stack, scope, global)?;
    assert_eq!(stack.len(), 1, "expression stack imbalance");
    Ok(stack.pop().expect("expression stack imbalance"))
}

fn evaluate_nodes(
    nodes: &[XprNode],
    stack: &mut Vec<Reference>,
    scope: &Rc<Scope>,
    global: &GlobalContext,
) -> Result<()> {
    for node in nodes {
        match node {
            XprNode::Literal { value } => stack.push(Reference::temporary(value.clone())),
            XprNode::NamedReference { name } => stack.push(global.resolve_name(scope, name)?),
            XprNode::BoundReference { reference } => stack.push(reference.clone()),
            XprNode::Closure {
                params,
                body,
                location,
            } => {
                let function = ScriptFunction::instantiate(
                    global,
                    scope,
                    location.clone(),
                    "<closure>",
                    params.clone(),
                    body,
                );
                stack.push(Reference::temporary(Value::Function(function)));
            }
            XprNode::UnnamedArray { count } => {
                let mut elements = Vec::with_capacity(*count);
                let split = stack.len() - count;
                for reference in stack.split_off(split) {
                    elements.push(reference.read()?);
                }
                stack.push(Reference::temporary(Value::Array(elements)));
            }
            XprNode::UnnamedObject { keys } => {
                let split = stack.len() - keys.len();
                let references = stack.split_off(split);
                let mut members = Object::new();
                for (key, reference) in keys.iter().zip(references) {
                    members.insert(key.clone(), reference.read()?);
                }
                stack.push(Reference::temporary(Value::Object(members)));
            }
            XprNode::SubscriptConst { key } => {
                let base = pop(stack);
                stack.push(base.zoom_in(Modifier::ObjectKey(key.clone())));
            }
            XprNode::SubscriptExpr => {
                let key = pop(stack).read()?;
                let base = pop(stack);
                let modifier = match key {
                    Value::Integer(i) => Modifier::ArrayIndex(i),
                    Value::String(s) => {
                        Modifier::ObjectKey(String::from_utf8_lossy(&s).into_owned())
                    }
                    other => {
                        return Err(Error::new(
                            ErrorKind::TypeMismatch,
                            format!(
                                "subscripts must be `integer` or `string`, got `{}`",
                                other.type_name()
                            ),
                        ))
                    }
                };
                stack.push(base.zoom_in(modifier));
            }
            XprNode::Operator { op, assign } => apply_operator(stack, *op, *assign)?,
            XprNode::Branch {
                true_nodes,
                false_nodes,
                assign,
            } => {
                let cond = pop(stack);
                let selected = if cond.read()?.is_truthy() {
                    true_nodes
                } else {
                    false_nodes
                };
                let result = if selected.is_empty() {
                    cond.clone()
                } else {
                    evaluate_subsequence(selected, scope, global)?
                };
                push_or_assign(stack, cond, result, *assign)?;
            }
            XprNode::FunctionCall { argc, .. } => {
                let split = stack.len() - argc;
                let args: Vec<Reference> = stack.split_off(split);
                let callee_ref = pop(stack);
                let callee = callee_ref.read()?;
                let callable = match callee.as_function() {
                    Some(f) => f.clone(),
                    None => {
                        return Err(Error::new(
                            ErrorKind::TypeMismatch,
                            format!(
                                "attempt to call a value of type `{}`",
                                callee.type_name()
                            ),
                        ))
                    }
                };
                let this = if callee_ref.modifier_count() != 0 {
                    callee_ref.zoom_out()
                } else {
                    Reference::null_constant()
                };
                stack.push(callable.invoke(global, this, args)?);
            }
            XprNode::Coalesce { alt_nodes, assign } => {
                let lhs = pop(stack);
                if !lhs.read()?.is_null() {
                    stack.push(lhs);
                    continue;
                }
                let result = evaluate_subsequence(alt_nodes, scope, global)?;
                push_or_assign(stack, lhs, result, *assign)?;
            }
            XprNode::LogicalAndOr {
                more_nodes,
                is_or,
                assign,
            } => {
                let lhs = pop(stack);
                let truthy = lhs.read()?.is_truthy();
                let short_circuit = if *is_or { truthy } else { !truthy };
                if short_circuit {
                    stack.push(lhs);
                    continue;
                }
                let result = evaluate_subsequence(more_nodes, scope, global)?;
                push_or_assign(stack, lhs, result, *assign)?;
            }
        }
    }
    Ok(())
}

fn pop(stack: &mut Vec<Reference>) -> Reference {
    stack.pop().expect("expression stack underflow")
}

/// Shared tail of branch-like nodes: with the assign flag the result is
/// written back through the first operand and that operand is pushed as an
/// lvalue, otherwise the result reference is pushed as-is.
fn push_or_assign(
    stack: &mut Vec<Reference>,
    target: Reference,
    result: Reference,
    assign: bool,
) -> Result<()> {
    if assign {
        target.write(result.read()?)?;
        stack.push(target);
    } else {
        stack.push(result);
    }
    Ok(())
}

fn apply_operator(stack: &mut Vec<Reference>, op: Xop, assign: bool) -> Result<()> {
    match op {
        Xop::PostfixInc | Xop::PostfixDec => {
            let target = pop(stack);
            let old = target.read()?;
            let delta = if op == Xop::PostfixInc { 1 } else { -1 };
            target.write(step_value(&old, delta)?)?;
            stack.push(Reference::temporary(old));
        }
        Xop::PrefixInc | Xop::PrefixDec => {
            let target = pop(stack);
            let old = target.read()?;
            let delta = if op == Xop::PrefixInc { 1 } else { -1 };
            target.write(step_value(&old, delta)?)?;
            stack.push(target);
        }
        Xop::PrefixPos | Xop::PrefixNeg | Xop::PrefixNotLogical | Xop::PrefixNotBitwise => {
            let operand = pop(stack);
            let value = operand.read()?;
            let result = apply_unary(op, &value)?;
            if assign {
                operand.write(result.clone())?;
                stack.push(operand);
            } else {
                stack.push(Reference::temporary(result));
            }
        }
        Xop::InfixAssign => {
            let rhs = pop(stack);
            let lhs = pop(stack);
            lhs.write(rhs.read()?)?;
            stack.push(lhs);
        }
        _ => {
            let rhs_ref = pop(stack);
            let lhs_ref = pop(stack);
            let lhs = lhs_ref.read()?;
            let rhs = rhs_ref.read()?;
            let result = apply_binary(op, &lhs, &rhs)?;
            if assign {
                lhs_ref.write(result)?;
                stack.push(lhs_ref);
            } else {
                stack.push(Reference::temporary(result));
            }
        }
    }
    Ok(())
}

/// `++`/`--` steps: integers step with overflow checks, reals step by 1.
fn step_value(value: &Value, delta: i64) -> Result<Value> {
    match value {
        Value::Integer(n) => n
            .checked_add(delta)
            .map(Value::Integer)
            .ok_or_else(|| Error::new(ErrorKind::Arithmetic, "integer increment overflow")),
        Value::Real(r) => Ok(Value::Real(r + delta as f64)),
        other => Err(Error::new(
            ErrorKind::TypeMismatch,
            format!(
                "increment/decrement apply to `integer` or `real`, got `{}`",
                other.type_name()
            ),
        )),
    }
}

fn apply_unary(op: Xop, value: &Value) -> Result<Value> {
    match op {
        Xop::PrefixPos => match value {
            Value::Integer(_) | Value::Real(_) => Ok(value.clone()),
            other => Err(unary_mismatch("+", other)),
        },
        Xop::PrefixNeg => match value {
            Value::Integer(n) => n
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| Error::new(ErrorKind::Arithmetic, "integer negation overflow")),
            Value::Real(r) => Ok(Value::Real(-r)),
            other => Err(unary_mismatch("-", other)),
        },
        Xop::PrefixNotLogical => Ok(Value::Boolean(!value.is_truthy())),
        Xop::PrefixNotBitwise => match value {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            Value::Integer(n) => Ok(Value::Integer(!n)),
            other => Err(unary_mismatch("~", other)),
        },
        _ => unreachable!("not a unary opcode"),
    }
}

fn unary_mismatch(op: &str, value: &Value) -> Error {
    Error::new(
        ErrorKind::TypeMismatch,
        format!(
            "the `{}` operator cannot be applied to `{}`",
            op,
            value.type_name()
        ),
    )
}

fn binary_mismatch(op: &str, lhs: &Value, rhs: &Value) -> Error {
    Error::new(
        ErrorKind::TypeMismatch,
        format!(
            "the `{}` operator cannot be applied to `{}` and `{}`",
            op,
            lhs.type_name(),
            rhs.type_name()
        ),
    )
}

fn apply_binary(op: Xop, lhs: &Value, rhs: &Value) -> Result<Value> {
    match op {
        Xop::InfixAdd => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_add(*b)
                .map(Value::Integer)
                .ok_or_else(|| Error::new(ErrorKind::Arithmetic, "integer addition overflow")),
            (Value::Integer(a), Value::Real(b)) => Ok(Value::Real(*a as f64 + b)),
            (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a + *b as f64)),
            (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a + b)),
            (Value::String(a), Value::String(b)) => {
                let mut bytes = Vec::with_capacity(a.len() + b.len());
                bytes.extend_from_slice(a);
                bytes.extend_from_slice(b);
                Ok(Value::string(bytes))
            }
            _ => Err(binary_mismatch("+", lhs, rhs)),
        },
        Xop::InfixSub => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_sub(*b)
                .map(Value::Integer)
                .ok_or_else(|| Error::new(ErrorKind::Arithmetic, "integer subtraction overflow")),
            (Value::Integer(a), Value::Real(b)) => Ok(Value::Real(*a as f64 - b)),
            (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a - *b as f64)),
            (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a - b)),
            _ => Err(binary_mismatch("-", lhs, rhs)),
        },
        Xop::InfixMul => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_mul(*b)
                .map(Value::Integer)
                .ok_or_else(|| {
                    Error::new(ErrorKind::Arithmetic, "integer multiplication overflow")
                }),
            (Value::Integer(a), Value::Real(b)) => Ok(Value::Real(*a as f64 * b)),
            (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a * *b as f64)),
            (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a * b)),
            (Value::String(s), Value::Integer(n)) => repeat_string(s, *n),
            (Value::Integer(n), Value::String(s)) => repeat_string(s, *n),
            _ => Err(binary_mismatch("*", lhs, rhs)),
        },
        Xop::InfixDiv => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => a.checked_div(*b).map(Value::Integer).ok_or_else(|| {
                if *b == 0 {
                    Error::new(ErrorKind::Arithmetic, "integer division by zero")
                } else {
                    Error::new(ErrorKind::Arithmetic, "integer division overflow")
                }
            }),
            (Value::Integer(a), Value::Real(b)) => Ok(Value::Real(*a as f64 / b)),
            (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a / *b as f64)),
            (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a / b)),
            _ => Err(binary_mismatch("/", lhs, rhs)),
        },
        Xop::InfixRem => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => a.checked_rem(*b).map(Value::Integer).ok_or_else(|| {
                if *b == 0 {
                    Error::new(ErrorKind::Arithmetic, "integer modulo by zero")
                } else {
                    Error::new(ErrorKind::Arithmetic, "integer modulo overflow")
                }
            }),
            (Value::Integer(a), Value::Real(b)) => Ok(Value::Real((*a as f64) % b)),
            (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a % *b as f64)),
            (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a % b)),
            _ => Err(binary_mismatch("%", lhs, rhs)),
        },
        Xop::InfixAndBitwise => match (lhs, rhs) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a & b)),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a & b)),
            _ => Err(binary_mismatch("&", lhs, rhs)),
        },
        Xop::InfixOrBitwise => match (lhs, rhs) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a | b)),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a | b)),
            _ => Err(binary_mismatch("|", lhs, rhs)),
        },
        Xop::InfixXorBitwise => match (lhs, rhs) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a ^ b)),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a ^ b)),
            _ => Err(binary_mismatch("^", lhs, rhs)),
        },
        Xop::InfixEq => Ok(Value::Boolean(lhs == rhs)),
        Xop::InfixNe => Ok(Value::Boolean(lhs != rhs)),
        Xop::InfixLt | Xop::InfixGt | Xop::InfixLe | Xop::InfixGe => {
            let ordering = lhs.compare(rhs);
            if ordering == Compare::Unordered {
                return Err(Error::new(
                    ErrorKind::TypeMismatch,
                    format!(
                        "values of type `{}` and `{}` are unordered",
                        lhs.type_name(),
                        rhs.type_name()
                    ),
                ));
            }
            let holds = match op {
                Xop::InfixLt => ordering == Compare::Less,
                Xop::InfixGt => ordering == Compare::Greater,
                Xop::InfixLe => ordering != Compare::Greater,
                _ => ordering != Compare::Less,
            };
            Ok(Value::Boolean(holds))
        }
        _ => unreachable!("not a binary opcode"),
    }
}

fn repeat_string(bytes: &Rc<[u8]>, count: i64) -> Result<Value> {
    if count < 0 {
        return Err(Error::new(
            ErrorKind::Arithmetic,
            "negative string duplicate count",
        ));
    }
    let total = bytes
        .len()
        .checked_mul(count as usize)
        .filter(|n| *n <= STRING_LIMIT)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::Resource,
                "string repetition exceeds the length limit",
            )
        })?;
    let mut out = Vec::with_capacity(total);
    for _ in 0..count {
        out.extend_from_slice(bytes);
    }
    Ok(Value::string(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;

    fn eval_nodes(nodes: Vec<XprNode>, scope: &Rc<Scope>, global: &GlobalContext) -> Reference {
        let expr = Expression { nodes };
        expr.evaluate(scope, global).unwrap()
    }

    #[test]
    fn test_literal_pushes_temporary() {
        let global = GlobalContext::default();
        let scope = Scope::new_child(global.root_scope());
        let r = eval_nodes(
            vec![XprNode::Literal {
                value: Value::Integer(7),
            }],
            &scope,
            &global,
        );
        assert!(r.is_temporary());
        assert_eq!(r.read().unwrap(), Value::Integer(7));
    }

    #[test]
    fn test_arithmetic_promotion_and_overflow() {
        assert_eq!(
            apply_binary(Xop::InfixAdd, &Value::Integer(1), &Value::Real(0.5)).unwrap(),
            Value::Real(1.5)
        );
        let err =
            apply_binary(Xop::InfixAdd, &Value::Integer(i64::MAX), &Value::Integer(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn test_division_failures() {
        let err =
            apply_binary(Xop::InfixDiv, &Value::Integer(1), &Value::Integer(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
        let err = apply_binary(Xop::InfixDiv, &Value::Integer(i64::MIN), &Value::Integer(-1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
        // Real division by zero is fine.
        assert_eq!(
            apply_binary(Xop::InfixDiv, &Value::Real(1.0), &Value::Integer(0)).unwrap(),
            Value::Real(f64::INFINITY)
        );
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(
            apply_binary(Xop::InfixAdd, &Value::string("ab"), &Value::string("cd")).unwrap(),
            Value::string("abcd")
        );
        assert_eq!(
            apply_binary(Xop::InfixMul, &Value::string("ab"), &Value::Integer(3)).unwrap(),
            Value::string("ababab")
        );
        assert_eq!(
            apply_binary(Xop::InfixMul, &Value::Integer(2), &Value::string("x")).unwrap(),
            Value::string("xx")
        );
        let err =
            apply_binary(Xop::InfixMul, &Value::string("x"), &Value::Integer(-1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            apply_binary(Xop::InfixLt, &Value::Integer(1), &Value::Real(1.5)).unwrap(),
            Value::Boolean(true)
        );
        let err = apply_binary(
            Xop::InfixLt,
            &Value::Integer(1),
            &Value::string("1"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        // Equality across incompatible types is just `false`.
        assert_eq!(
            apply_binary(Xop::InfixEq, &Value::Integer(1), &Value::string("1")).unwrap(),
            Value::Boolean(false)
        );
        let err = apply_binary(
            Xop::InfixLt,
            &Value::Real(f64::NAN),
            &Value::Real(f64::NAN),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_increment_returns_pre_value_postfix() {
        let global = GlobalContext::default();
        let scope = Scope::new_child(global.root_scope());
        let var = global.create_variable(Value::Integer(5), false);
        scope.set_named_reference("n", Reference::variable(var.clone()));

        let r = eval_nodes(
            vec![
                XprNode::NamedReference { name: "n".into() },
                XprNode::Operator {
                    op: Xop::PostfixInc,
                    assign: false,
                },
            ],
            &scope,
            &global,
        );
        assert_eq!(r.read().unwrap(), Value::Integer(5));
        assert_eq!(*var.get(), Value::Integer(6));

        let r = eval_nodes(
            vec![
                XprNode::NamedReference { name: "n".into() },
                XprNode::Operator {
                    op: Xop::PrefixInc,
                    assign: false,
                },
            ],
            &scope,
            &global,
        );
        assert_eq!(r.read().unwrap(), Value::Integer(7));
    }

    #[test]
    fn test_increment_requires_lvalue() {
        let global = GlobalContext::default();
        let scope = Scope::new_child(global.root_scope());
        let expr = Expression {
            nodes: vec![
                XprNode::Literal {
                    value: Value::Integer(1),
                },
                XprNode::Operator {
                    op: Xop::PostfixInc,
                    assign: false,
                },
            ],
        };
        let err = expr.evaluate(&scope, &global).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAssignable);
    }

    // The RPN shape of the original regression test: with `cond` null,
    // `aval[1] = !cond ? (dval++ + 0.25) : (ival * "hello,")`.
    #[test]
    fn test_branch_with_assignment() {
        let global = GlobalContext::default();
        let scope = Scope::new_child(global.root_scope());
        let dval = global.create_variable(Value::Real(1.5), false);
        let ival = global.create_variable(Value::Integer(3), false);
        let aval = global.create_variable(Value::Array(Vec::new()), false);
        let cond = global.create_variable(Value::Null, false);
        scope.set_named_reference("dval", Reference::variable(dval.clone()));
        scope.set_named_reference("ival", Reference::variable(ival.clone()));
        scope.set_named_reference("aval", Reference::variable(aval.clone()));
        scope.set_named_reference("cond", Reference::variable(cond));

        let nodes = vec![
            XprNode::NamedReference { name: "aval".into() },
            XprNode::Literal {
                value: Value::Integer(1),
            },
            XprNode::SubscriptExpr,
            XprNode::NamedReference { name: "cond".into() },
            XprNode::Operator {
                op: Xop::PrefixNotLogical,
                assign: false,
            },
            XprNode::Branch {
                true_nodes: vec![
                    XprNode::NamedReference { name: "dval".into() },
                    XprNode::Operator {
                        op: Xop::PostfixInc,
                        assign: false,
                    },
                    XprNode::Literal {
                        value: Value::Real(0.25),
                    },
                    XprNode::Operator {
                        op: Xop::InfixAdd,
                        assign: false,
                    },
                ],
                false_nodes: vec![
                    XprNode::NamedReference { name: "ival".into() },
                    XprNode::Literal {
                        value: Value::string("hello,"),
                    },
                    XprNode::Operator {
                        op: Xop::InfixMul,
                        assign: false,
                    },
                ],
                assign: false,
            },
            XprNode::Operator {
                op: Xop::InfixAssign,
                assign: false,
            },
        ];

        let result = eval_nodes(nodes, &scope, &global);
        assert_eq!(result.read().unwrap(), Value::Real(1.75));
        assert_eq!(*dval.get(), Value::Real(2.5));
        assert_eq!(*ival.get(), Value::Integer(3));
        let stored = aval.get();
        let arr = stored.as_array().unwrap();
        assert_eq!(arr[0], Value::Null);
        assert_eq!(arr[1], Value::Real(1.75));
    }

    #[test]
    fn test_short_circuit_skips_side_effects() {
        let global = GlobalContext::default();
        let scope = Scope::new_child(global.root_scope());
        let var = global.create_variable(Value::Integer(0), false);
        scope.set_named_reference("n", Reference::variable(var.clone()));

        // false && (n = 1) leaves n alone.
        let nodes = vec![
            XprNode::Literal {
                value: Value::Boolean(false),
            },
            XprNode::LogicalAndOr {
                more_nodes: vec![
                    XprNode::NamedReference { name: "n".into() },
                    XprNode::Literal {
                        value: Value::Integer(1),
                    },
                    XprNode::Operator {
                        op: Xop::InfixAssign,
                        assign: false,
                    },
                ],
                is_or: false,
                assign: false,
            },
        ];
        let r = eval_nodes(nodes, &scope, &global);
        assert_eq!(r.read().unwrap(), Value::Boolean(false));
        assert_eq!(*var.get(), Value::Integer(0));
    }

    #[test]
    fn test_coalesce() {
        let global = GlobalContext::default();
        let scope = Scope::new_child(global.root_scope());
        let nodes = vec![
            XprNode::Literal { value: Value::Null },
            XprNode::Coalesce {
                alt_nodes: vec![XprNode::Literal {
                    value: Value::Integer(9),
                }],
                assign: false,
            },
        ];
        let r = eval_nodes(nodes, &scope, &global);
        assert_eq!(r.read().unwrap(), Value::Integer(9));
    }

    #[test]
    fn test_unnamed_containers() {
        let global = GlobalContext::default();
        let scope = Scope::new_child(global.root_scope());
        let nodes = vec![
            XprNode::Literal {
                value: Value::Integer(1),
            },
            XprNode::Literal {
                value: Value::Integer(2),
            },
            XprNode::UnnamedArray { count: 2 },
        ];
        let r = eval_nodes(nodes, &scope, &global);
        assert_eq!(
            r.read().unwrap(),
            Value::Array(vec![Value::Integer(1), Value::Integer(2)])
        );
    }
}
