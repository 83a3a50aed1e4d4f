//! The process-wide registry of built-in operations.
//!
//! Every primitive the language exposes is one [`BuiltinOp`] in a single
//! static table, established lazily at first use and never mutated. Each
//! entry carries the operation's name, its arity contract, and its
//! argument-evaluation policy:
//!
//! - **Procedures** (`OpKind::Procedure`) receive their operands already
//!   evaluated: arithmetic, comparisons, list operations, predicates.
//! - **Special forms** (`OpKind::SpecialForm`) receive raw expressions plus
//!   the calling environment and decide themselves what to evaluate:
//!   `quote`, `if`, `and`, `or`, `define`, `set!`, `set-car!`, `set-cdr!`,
//!   `lambda`.
//!
//! Symbol evaluation consults this table before the environment chain, so
//! primitive names always resolve to their registry entry.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::Error;
use crate::ast::Value;
use crate::evaluator::{
    Environment, eval_and, eval_define, eval_if, eval_lambda, eval_or, eval_quote, eval_set,
    eval_set_car, eval_set_cdr,
};

/// Signature of a procedure: operands arrive evaluated.
pub type ProcedureFn = fn(&[Value]) -> Result<Value, Error>;

/// Signature of a special form: raw operand expressions, the calling
/// environment, and the current evaluation depth.
pub type SpecialFormFn = fn(&[Value], &Environment, usize) -> Result<Value, Error>;

/// Argument-evaluation policy of a built-in operation.
#[derive(Clone, Copy)]
pub enum OpKind {
    Procedure(ProcedureFn),
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Procedure(_) => write!(f, "Procedure(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Expected operand count for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
    Any,
}

impl Arity {
    pub(crate) fn validate(&self, id: &str, got: usize) -> Result<(), Error> {
        let ok = match *self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&got),
            Arity::Any => true,
        };
        if ok {
            return Ok(());
        }
        let expected = match *self {
            Arity::Exact(1) => "exactly 1 argument".to_owned(),
            Arity::Exact(n) => format!("exactly {n} arguments"),
            Arity::AtLeast(1) => "at least 1 argument".to_owned(),
            Arity::AtLeast(n) => format!("at least {n} arguments"),
            Arity::Range(lo, hi) => format!("between {lo} and {hi} arguments"),
            Arity::Any => unreachable!("Any accepts every count"),
        };
        Err(Error::runtime(format!("{id} expected {expected}, got {got}")))
    }
}

/// One entry in the builtin registry.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOp {
    /// Name the operation is invoked by
    pub id: &'static str,
    /// Implementation and argument-evaluation policy
    pub kind: OpKind,
    /// Operand count contract, validated before dispatch
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

//
// Procedure implementations. Operand counts are validated against the
// registry arity before dispatch, so the slice patterns here are backstops.
//

fn builtin_is_boolean(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => Ok(Value::Bool(matches!(value, Value::Bool(_)))),
        _ => Err(Error::runtime("boolean? expects 1 argument")),
    }
}

fn builtin_is_number(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => Ok(Value::Bool(matches!(value, Value::Number(_)))),
        _ => Err(Error::runtime("number? expects 1 argument")),
    }
}

fn builtin_is_symbol(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => Ok(Value::Bool(matches!(value, Value::Symbol(_)))),
        _ => Err(Error::runtime("symbol? expects 1 argument")),
    }
}

// Every cons cell is a pair, dotted or not.
fn builtin_is_pair(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => Ok(Value::Bool(matches!(value, Value::Pair(_)))),
        _ => Err(Error::runtime("pair? expects 1 argument")),
    }
}

fn builtin_is_null(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => Ok(Value::Bool(value.is_nil())),
        _ => Err(Error::runtime("null? expects 1 argument")),
    }
}

/// True for nil and for chains of pairs terminating in nil.
fn builtin_is_list(args: &[Value]) -> Result<Value, Error> {
    let [value] = args else {
        return Err(Error::runtime("list? expects 1 argument"));
    };
    let mut current = value.clone();
    loop {
        match current {
            Value::Nil => return Ok(Value::Bool(true)),
            Value::Pair(cell) => {
                let next = cell.borrow().cdr.clone();
                current = next;
            }
            _ => return Ok(Value::Bool(false)),
        }
    }
}

fn builtin_not(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => Ok(Value::Bool(!value.is_truthy())),
        _ => Err(Error::runtime("not expects 1 argument")),
    }
}

fn builtin_abs(args: &[Value]) -> Result<Value, Error> {
    let [value] = args else {
        return Err(Error::runtime("abs expects 1 argument"));
    };
    value
        .number()?
        .checked_abs()
        .map(Value::Number)
        .ok_or_else(|| Error::runtime("integer overflow in abs"))
}

/// Chained comparison: true iff the predicate holds for every adjacent
/// pair of operands. Zero or one operand is vacuously true.
fn compare_chain(args: &[Value], holds: fn(i64, i64) -> bool) -> Result<Value, Error> {
    let numbers: Vec<i64> = args
        .iter()
        .map(Value::number)
        .collect::<Result<_, _>>()?;
    Ok(Value::Bool(numbers.windows(2).all(|w| holds(w[0], w[1]))))
}

fn builtin_num_eq(args: &[Value]) -> Result<Value, Error> {
    compare_chain(args, |a, b| a == b)
}

fn builtin_lt(args: &[Value]) -> Result<Value, Error> {
    compare_chain(args, |a, b| a < b)
}

fn builtin_gt(args: &[Value]) -> Result<Value, Error> {
    compare_chain(args, |a, b| a > b)
}

fn builtin_le(args: &[Value]) -> Result<Value, Error> {
    compare_chain(args, |a, b| a <= b)
}

fn builtin_ge(args: &[Value]) -> Result<Value, Error> {
    compare_chain(args, |a, b| a >= b)
}

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    let mut sum: i64 = 0;
    for arg in args {
        sum = sum
            .checked_add(arg.number()?)
            .ok_or_else(|| Error::runtime("integer overflow in +"))?;
    }
    Ok(Value::Number(sum))
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    let mut product: i64 = 1;
    for arg in args {
        product = product
            .checked_mul(arg.number()?)
            .ok_or_else(|| Error::runtime("integer overflow in *"))?;
    }
    Ok(Value::Number(product))
}

/// Left fold over at least one operand; a single operand folds to itself.
fn fold_numbers(
    args: &[Value],
    id: &str,
    combine: fn(i64, i64) -> Result<i64, Error>,
) -> Result<Value, Error> {
    let [first, rest @ ..] = args else {
        return Err(Error::runtime(format!("{id} expects at least 1 argument")));
    };
    let mut accumulator = first.number()?;
    for arg in rest {
        accumulator = combine(accumulator, arg.number()?)?;
    }
    Ok(Value::Number(accumulator))
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    fold_numbers(args, "-", |a, b| {
        a.checked_sub(b)
            .ok_or_else(|| Error::runtime("integer overflow in -"))
    })
}

// Integer division truncates toward zero.
fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    fold_numbers(args, "/", |a, b| {
        if b == 0 {
            return Err(Error::runtime("division by zero"));
        }
        a.checked_div(b)
            .ok_or_else(|| Error::runtime("integer overflow in /"))
    })
}

fn builtin_min(args: &[Value]) -> Result<Value, Error> {
    fold_numbers(args, "min", |a, b| Ok(a.min(b)))
}

fn builtin_max(args: &[Value]) -> Result<Value, Error> {
    fold_numbers(args, "max", |a, b| Ok(a.max(b)))
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    match args {
        [car, cdr] => Ok(Value::cons(car.clone(), cdr.clone())),
        _ => Err(Error::runtime("cons expects 2 arguments")),
    }
}

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => {
            let cell = value.pair_cell()?;
            let car = cell.borrow().car.clone();
            Ok(car)
        }
        _ => Err(Error::runtime("car expects 1 argument")),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => {
            let cell = value.pair_cell()?;
            let cdr = cell.borrow().cdr.clone();
            Ok(cdr)
        }
        _ => Err(Error::runtime("cdr expects 1 argument")),
    }
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::proper_list(args.to_vec()))
}

/// Walk `index` cdr steps into `list`. Running out of pairs before the
/// index is exhausted is an error; landing exactly on the terminator is
/// allowed and yields it (nil for a proper list).
fn walk_list(id: &str, list: &Value, index: &Value) -> Result<Value, Error> {
    let steps = index.number()?;
    if steps < 0 {
        return Err(Error::runtime(format!("{id}: index out of range")));
    }
    let mut current = list.clone();
    for _ in 0..steps {
        current = match current {
            Value::Pair(cell) => {
                let next = cell.borrow().cdr.clone();
                next
            }
            Value::Nil => return Err(Error::runtime(format!("{id}: index out of range"))),
            other => {
                return Err(Error::runtime(format!(
                    "{id} expects a proper list, got {other}"
                )));
            }
        };
    }
    Ok(current)
}

fn builtin_list_ref(args: &[Value]) -> Result<Value, Error> {
    match args {
        [list, index] => match walk_list("list-ref", list, index)? {
            Value::Pair(cell) => {
                let car = cell.borrow().car.clone();
                Ok(car)
            }
            Value::Nil => Err(Error::runtime("list-ref: index out of range")),
            other => Err(Error::runtime(format!(
                "list-ref expects a proper list, got {other}"
            ))),
        },
        _ => Err(Error::runtime("list-ref expects 2 arguments")),
    }
}

fn builtin_list_tail(args: &[Value]) -> Result<Value, Error> {
    match args {
        [list, index] => walk_list("list-tail", list, index),
        _ => Err(Error::runtime("list-tail expects 2 arguments")),
    }
}

/// The registry. One contiguous table for ease of auditing; order matches
/// the language reference.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    use Arity::*;
    use OpKind::*;

    vec![
        // Quoting
        BuiltinOp { id: "quote", kind: SpecialForm(eval_quote), arity: Exact(1) },
        // Type predicates
        BuiltinOp { id: "boolean?", kind: Procedure(builtin_is_boolean), arity: Exact(1) },
        BuiltinOp { id: "number?", kind: Procedure(builtin_is_number), arity: Exact(1) },
        BuiltinOp { id: "symbol?", kind: Procedure(builtin_is_symbol), arity: Exact(1) },
        BuiltinOp { id: "pair?", kind: Procedure(builtin_is_pair), arity: Exact(1) },
        BuiltinOp { id: "null?", kind: Procedure(builtin_is_null), arity: Exact(1) },
        BuiltinOp { id: "list?", kind: Procedure(builtin_is_list), arity: Exact(1) },
        // Logic
        BuiltinOp { id: "not", kind: Procedure(builtin_not), arity: Exact(1) },
        BuiltinOp { id: "and", kind: SpecialForm(eval_and), arity: Any },
        BuiltinOp { id: "or", kind: SpecialForm(eval_or), arity: Any },
        // Arithmetic
        BuiltinOp { id: "abs", kind: Procedure(builtin_abs), arity: Exact(1) },
        BuiltinOp { id: "+", kind: Procedure(builtin_add), arity: Any },
        BuiltinOp { id: "*", kind: Procedure(builtin_mul), arity: Any },
        BuiltinOp { id: "-", kind: Procedure(builtin_sub), arity: AtLeast(1) },
        BuiltinOp { id: "/", kind: Procedure(builtin_div), arity: AtLeast(1) },
        BuiltinOp { id: "min", kind: Procedure(builtin_min), arity: AtLeast(1) },
        BuiltinOp { id: "max", kind: Procedure(builtin_max), arity: AtLeast(1) },
        // Comparison
        BuiltinOp { id: "=", kind: Procedure(builtin_num_eq), arity: Any },
        BuiltinOp { id: "<", kind: Procedure(builtin_lt), arity: Any },
        BuiltinOp { id: ">", kind: Procedure(builtin_gt), arity: Any },
        BuiltinOp { id: "<=", kind: Procedure(builtin_le), arity: Any },
        BuiltinOp { id: ">=", kind: Procedure(builtin_ge), arity: Any },
        // Lists
        BuiltinOp { id: "cons", kind: Procedure(builtin_cons), arity: Exact(2) },
        BuiltinOp { id: "car", kind: Procedure(builtin_car), arity: Exact(1) },
        BuiltinOp { id: "cdr", kind: Procedure(builtin_cdr), arity: Exact(1) },
        BuiltinOp { id: "list", kind: Procedure(builtin_list), arity: Any },
        BuiltinOp { id: "list-ref", kind: Procedure(builtin_list_ref), arity: Exact(2) },
        BuiltinOp { id: "list-tail", kind: Procedure(builtin_list_tail), arity: Exact(2) },
        // Control flow and binding forms
        BuiltinOp { id: "if", kind: SpecialForm(eval_if), arity: Range(2, 3) },
        BuiltinOp { id: "define", kind: SpecialForm(eval_define), arity: AtLeast(2) },
        BuiltinOp { id: "set!", kind: SpecialForm(eval_set), arity: AtLeast(2) },
        BuiltinOp { id: "set-car!", kind: SpecialForm(eval_set_car), arity: Exact(2) },
        BuiltinOp { id: "set-cdr!", kind: SpecialForm(eval_set_cdr), arity: Exact(2) },
        BuiltinOp { id: "lambda", kind: SpecialForm(eval_lambda), arity: AtLeast(2) },
    ]
});

/// Index from operation name to registry entry.
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Find a builtin operation by name.
pub(crate) fn find_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(id).copied()
}

/// The whole registry, for diagnostic listings.
pub fn all_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}
