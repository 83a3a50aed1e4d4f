use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::MAX_EVAL_DEPTH;
use crate::ast::{Lambda, Value};
use crate::builtinops::{OpKind, find_op};

/// A lexical scope: one frame of name->value bindings plus an optional
/// parent. `Environment` is a cheap-clone handle; clones share the frame,
/// which is what lets closures observe later `define`/`set!` mutations.
#[derive(Clone, Default)]
pub struct Environment {
    head: Rc<RefCell<Frame>>,
}

#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    /// A fresh frame whose lookups fall through to `parent`.
    pub(crate) fn child(parent: &Environment) -> Self {
        Environment {
            head: Rc::new(RefCell::new(Frame {
                bindings: HashMap::new(),
                parent: Some(parent.clone()),
            })),
        }
    }

    /// Bind unconditionally in this frame, shadowing any parent binding.
    pub(crate) fn define(&self, name: impl Into<String>, value: Value) {
        self.head.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Look a name up through the frame chain.
    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        let frame = self.head.borrow();
        match frame.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => frame.parent.as_ref().and_then(|parent| parent.get(name)),
        }
    }

    /// Rebind in the nearest frame that already binds `name`.
    pub(crate) fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let mut frame = self.head.borrow_mut();
        if let Some(slot) = frame.bindings.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        match &frame.parent {
            Some(parent) => parent.set(name, value),
            None => Err(Error::name(format!(
                "no binding for '{name}' in any enclosing scope"
            ))),
        }
    }

    /// All bindings visible from this frame, sorted by name; inner frames
    /// shadow outer ones.
    pub fn all_bindings(&self) -> Vec<(String, Value)> {
        let mut merged = HashMap::new();
        self.collect_bindings(&mut merged);
        let mut result: Vec<_> = merged.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    fn collect_bindings(&self, into: &mut HashMap<String, Value>) {
        let frame = self.head.borrow();
        if let Some(parent) = &frame.parent {
            parent.collect_bindings(into);
        }
        for (name, value) in &frame.bindings {
            into.insert(name.clone(), value.clone());
        }
    }
}

// Frames can be cyclic through captured lambdas, so Debug stays shallow.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.head.borrow();
        let mut names: Vec<&String> = frame.bindings.keys().collect();
        names.sort();
        write!(f, "Environment({names:?}")?;
        if frame.parent.is_some() {
            write!(f, ", ..")?;
        }
        write!(f, ")")
    }
}

/// Evaluate an expression (public API).
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    eval_with_depth(expr, env, 0)
}

/// Evaluate with depth tracking to turn runaway recursion into an error
/// instead of a stack overflow.
pub(crate) fn eval_with_depth(
    expr: &Value,
    env: &Environment,
    depth: usize,
) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::runtime(format!(
            "evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
        )));
    }

    match expr {
        // Self-evaluating forms
        Value::Number(_)
        | Value::Bool(_)
        | Value::Nil
        | Value::Builtin(_)
        | Value::Lambda(_) => Ok(expr.clone()),

        // The primitive table wins over the environment chain, so builtin
        // names cannot be shadowed.
        Value::Symbol(name) => match find_op(name) {
            Some(op) => Ok(Value::Builtin(op)),
            None => env
                .get(name)
                .ok_or_else(|| Error::name(format!("unbound symbol: {name}"))),
        },

        // Application: evaluate the head, then hand the callee the raw
        // operand list. The callee decides what to evaluate; that is the
        // whole difference between special forms and procedures.
        Value::Pair(cell) => {
            let (head, tail) = {
                let cons = cell.borrow();
                (cons.car.clone(), cons.cdr.clone())
            };
            let callee = eval_with_depth(&head, env, depth + 1)?;
            apply(&callee, &tail, env, depth)
        }
    }
}

/// Apply a callable to an unevaluated operand list.
fn apply(callee: &Value, operands: &Value, env: &Environment, depth: usize) -> Result<Value, Error> {
    let args = flatten_operands(operands)?;

    match callee {
        Value::Builtin(op) => {
            op.arity.validate(op.id, args.len())?;
            match op.kind {
                OpKind::Procedure(run) => {
                    let evaluated = eval_args(&args, env, depth)?;
                    run(&evaluated)
                }
                OpKind::SpecialForm(run) => run(&args, env, depth),
            }
        }
        Value::Lambda(lambda) => {
            if args.len() != lambda.params.len() {
                return Err(Error::runtime(format!(
                    "lambda expected {} arguments, got {}",
                    lambda.params.len(),
                    args.len()
                )));
            }

            // Arguments evaluate in the caller's environment; the body runs
            // in a fresh frame parented on the captured environment.
            let evaluated = eval_args(&args, env, depth)?;
            let frame = Environment::child(&lambda.env);
            for (param, arg) in lambda.params.iter().zip(evaluated) {
                frame.define(param.clone(), arg);
            }

            let mut result = Value::Nil;
            for expr in &lambda.body {
                result = eval_with_depth(expr, &frame, depth + 1)?;
            }
            Ok(result)
        }
        other => Err(Error::runtime(format!(
            "cannot apply non-callable value: {other}"
        ))),
    }
}

/// Collect an operand chain into a vector. The chain must be a proper list.
fn flatten_operands(operands: &Value) -> Result<Vec<Value>, Error> {
    let mut args = Vec::new();
    let mut current = operands.clone();
    loop {
        match current {
            Value::Nil => return Ok(args),
            Value::Pair(cell) => {
                let (car, cdr) = {
                    let cons = cell.borrow();
                    (cons.car.clone(), cons.cdr.clone())
                };
                args.push(car);
                current = cdr;
            }
            other => {
                return Err(Error::runtime(format!(
                    "improper argument list ending in {other}"
                )));
            }
        }
    }
}

fn eval_args(args: &[Value], env: &Environment, depth: usize) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_with_depth(arg, env, depth + 1))
        .collect()
}

//
// Special forms. These receive their operands unevaluated, plus the calling
// environment and the current evaluation depth. Registry arity checks run
// before dispatch; the matches below re-check shape as a backstop.
//

pub(crate) fn eval_quote(args: &[Value], _env: &Environment, _depth: usize) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::runtime("quote expects exactly 1 operand")),
    }
}

pub(crate) fn eval_if(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let (condition, then_expr, else_expr) = match args {
        [condition, then_expr] => (condition, then_expr, None),
        [condition, then_expr, else_expr] => (condition, then_expr, Some(else_expr)),
        _ => return Err(Error::runtime("if expects 2 or 3 operands")),
    };

    match eval_with_depth(condition, env, depth + 1)? {
        Value::Bool(true) => eval_with_depth(then_expr, env, depth + 1),
        Value::Bool(false) => match else_expr {
            Some(else_expr) => eval_with_depth(else_expr, env, depth + 1),
            None => Ok(Value::Nil),
        },
        other => Err(Error::runtime(format!(
            "if condition must evaluate to a boolean, got {other}"
        ))),
    }
}

/// `and` evaluates left to right and stops at the first falsy value. Empty
/// gives `#t`; otherwise the result is the last value evaluated.
pub(crate) fn eval_and(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let mut last = Value::Bool(true);
    for arg in args {
        let value = eval_with_depth(arg, env, depth + 1)?;
        if !value.is_truthy() {
            return Ok(value);
        }
        last = value;
    }
    Ok(last)
}

/// `or` stops at the first truthy value; empty gives `#f`.
pub(crate) fn eval_or(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let mut last = Value::Bool(false);
    for arg in args {
        let value = eval_with_depth(arg, env, depth + 1)?;
        if value.is_truthy() {
            return Ok(value);
        }
        last = value;
    }
    Ok(last)
}

pub(crate) fn eval_define(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth(expr, env, depth + 1)?;
            env.define(name.clone(), value);
            Ok(Value::Nil)
        }
        // (define (name params...) body...) desugars to a lambda binding.
        [Value::Pair(target), body @ ..] if !body.is_empty() => {
            let (name_value, params) = {
                let cons = target.borrow();
                (cons.car.clone(), cons.cdr.clone())
            };
            let Value::Symbol(name) = name_value else {
                return Err(Error::runtime(format!(
                    "define target must start with a symbol, got {name_value}"
                )));
            };
            let lambda = make_lambda(&params, body, env)?;
            env.define(name, lambda);
            Ok(Value::Nil)
        }
        [target, _] => Err(Error::runtime(format!(
            "define requires a symbol or a (name params...) target, got {target}"
        ))),
        _ => Err(Error::runtime("define expects 2 operands")),
    }
}

pub(crate) fn eval_set(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth(expr, env, depth + 1)?;
            env.set(name, value)?;
            Ok(Value::Nil)
        }
        [target, _] => Err(Error::runtime(format!(
            "set! requires a symbol, got {target}"
        ))),
        _ => Err(Error::runtime("set! expects 2 operands")),
    }
}

/// Shared body of `set-car!` and `set-cdr!`: the first operand evaluates to
/// the pair to mutate, the second to the replacement field value. Mutation
/// happens in place, so it is visible through every alias of the cell.
fn eval_pair_mutation(
    op_name: &str,
    args: &[Value],
    env: &Environment,
    depth: usize,
    write: fn(&mut crate::ast::Cons, Value),
) -> Result<Value, Error> {
    match args {
        [target, expr] => {
            let target_value = eval_with_depth(target, env, depth + 1)?;
            let Value::Pair(cell) = target_value else {
                return Err(Error::runtime(format!(
                    "{op_name} expects a pair, got {target_value}"
                )));
            };
            let value = eval_with_depth(expr, env, depth + 1)?;
            write(&mut cell.borrow_mut(), value);
            Ok(Value::Nil)
        }
        _ => Err(Error::runtime(format!("{op_name} expects 2 operands"))),
    }
}

pub(crate) fn eval_set_car(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    eval_pair_mutation("set-car!", args, env, depth, |cons, value| cons.car = value)
}

pub(crate) fn eval_set_cdr(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    eval_pair_mutation("set-cdr!", args, env, depth, |cons, value| cons.cdr = value)
}

pub(crate) fn eval_lambda(args: &[Value], env: &Environment, _depth: usize) -> Result<Value, Error> {
    match args {
        [params, body @ ..] if !body.is_empty() => make_lambda(params, body, env),
        _ => Err(Error::runtime(
            "lambda expects a parameter list and at least one body expression",
        )),
    }
}

/// Build a lambda value from a parameter-list expression and body
/// expressions, capturing `env` by reference.
fn make_lambda(params: &Value, body: &[Value], env: &Environment) -> Result<Value, Error> {
    let mut names: Vec<String> = Vec::new();
    let mut current = params.clone();
    loop {
        match current {
            Value::Nil => break,
            Value::Pair(cell) => {
                let (car, cdr) = {
                    let cons = cell.borrow();
                    (cons.car.clone(), cons.cdr.clone())
                };
                match car {
                    Value::Symbol(name) => {
                        if names.contains(&name) {
                            return Err(Error::runtime(format!(
                                "duplicate parameter name: {name}"
                            )));
                        }
                        names.push(name);
                    }
                    other => {
                        return Err(Error::runtime(format!(
                            "lambda parameters must be symbols, got {other}"
                        )));
                    }
                }
                current = cdr;
            }
            other => {
                return Err(Error::runtime(format!(
                    "lambda parameter list must be a proper list, got {other}"
                )));
            }
        }
    }

    Ok(Value::Lambda(Rc::new(Lambda {
        params: names,
        body: body.to_vec(),
        env: env.clone(),
    })))
}
