//! schemer - an interpreter core for an R5RS-inspired Scheme subset.
//!
//! The crate is a linear pipeline: a [`tokenizer::Tokenizer`] turns source
//! text into a token stream, [`reader::read`] builds one expression tree
//! from it, and [`evaluator::eval`] walks that tree against a lexically
//! scoped, mutable environment chain. Expressions and values share a single
//! tagged sum, [`ast::Value`]; evaluation rewrites one value into another.
//!
//! ```scheme
//! (define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))
//! (fact 5)                ; => 120
//! (define p (cons 1 2))
//! (set-car! p 9)
//! p                       ; => (9 . 2)
//! ```
//!
//! The language covers 64-bit signed integers, booleans, symbols, proper and
//! dotted lists built from shared cons cells, first-class lambdas with
//! closure capture, and the mutating forms `define`, `set!`, `set-car!` and
//! `set-cdr!`. There is no numeric tower, no string type, no macros, no
//! continuations and no tail-call guarantee.
//!
//! [`Interpreter`] is the front door: it owns the global environment and
//! evaluates one expression per [`Interpreter::run`] call, so definitions
//! persist across calls.
//!
//! ## Modules
//!
//! - `tokenizer`: character stream -> token stream
//! - `reader`: token stream -> expression tree
//! - `ast`: the unified value model and printer
//! - `evaluator`: environments, eval and apply
//! - `builtinops`: the process-wide registry of primitives

use std::fmt;

/// Maximum reader recursion depth; deeper nesting is a syntax error rather
/// than a stack overflow.
pub const MAX_PARSE_DEPTH: usize = 64;

/// Maximum evaluation recursion depth. Higher than the parse limit so that
/// recursive user functions defined at the top level have working headroom.
pub const MAX_EVAL_DEPTH: usize = 512;

/// Error type for the interpreter.
///
/// The three kinds map to three audiences: `Syntax` is raised by the
/// tokenizer and reader before any evaluation happens, `Name` means a symbol
/// had no binding (including `set!` on an unbound variable), and `Runtime`
/// covers every other evaluation failure: type mismatches, arity mismatches,
/// index and division errors, applying a non-callable.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Syntax(String),
    Name(String),
    Runtime(String),
}

impl Error {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Error::Syntax(message.into())
    }

    pub(crate) fn name(message: impl Into<String>) -> Self {
        Error::Name(message.into())
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime(message.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Syntax(msg) => write!(f, "SyntaxError: {msg}"),
            Error::Name(msg) => write!(f, "NameError: {msg}"),
            Error::Runtime(msg) => write!(f, "RuntimeError: {msg}"),
        }
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod reader;
pub mod tokenizer;

use crate::evaluator::Environment;

/// A persistent interpreter instance.
///
/// Holds the global environment for its whole lifetime, so `define` and
/// `set!` performed by one [`Interpreter::run`] call are visible to the
/// next.
#[derive(Default)]
pub struct Interpreter {
    global: Environment,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            global: Environment::new(),
        }
    }

    /// Read, evaluate and render exactly one expression.
    ///
    /// Trailing tokens after the expression are a syntax error. A `Nil`
    /// result renders as `()`.
    pub fn run(&mut self, source: &str) -> Result<String, Error> {
        let mut tokenizer = tokenizer::Tokenizer::new(source)?;
        let expr = reader::read(&mut tokenizer)?;
        if !tokenizer.is_end() {
            return Err(Error::syntax(
                "trailing tokens after a complete expression",
            ));
        }
        let value = evaluator::eval(&expr, &self.global)?;
        Ok(value.to_string())
    }

    /// Snapshot of the global environment, sorted by name. Primitives live
    /// in the builtin registry, not here; see [`builtinops::all_ops`].
    pub fn global_bindings(&self) -> Vec<(String, ast::Value)> {
        self.global.all_bindings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test result variants for end-to-end `run` tests
    #[derive(Debug)]
    enum RunResult {
        Output(&'static str),
        SyntaxErr,
        NameErr,
        RuntimeErr,
    }
    use RunResult::*;

    /// Run a sequence of sources against one interpreter instance,
    /// checking each result in order.
    fn run_session(cases: Vec<(&str, RunResult)>) {
        let mut interp = Interpreter::new();
        for (i, (source, expected)) in cases.iter().enumerate() {
            let test_id = format!("step #{} `{}`", i + 1, source);
            match (interp.run(source), expected) {
                (Ok(actual), Output(want)) => {
                    assert_eq!(&actual, want, "{test_id}: output mismatch");
                }
                (Err(Error::Syntax(_)), SyntaxErr)
                | (Err(Error::Name(_)), NameErr)
                | (Err(Error::Runtime(_)), RuntimeErr) => {}
                (outcome, expected) => {
                    panic!("{test_id}: expected {expected:?}, got {outcome:?}");
                }
            }
        }
    }

    #[test]
    fn test_scenarios_end_to_end() {
        // Each inner vec is one interpreter session.
        let sessions = vec![
            vec![("(+ 1 2)", Output("3"))],
            vec![("((lambda (x) (+ 1 x)) 5)", Output("6"))],
            vec![
                ("(define x 10)", Output("()")),
                ("(set! x (+ x 1))", Output("()")),
                ("x", Output("11")),
            ],
            vec![
                (
                    "(define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))",
                    Output("()"),
                ),
                ("(fact 5)", Output("120")),
            ],
            vec![("'(1 2 . 3)", Output("(1 2 . 3)"))],
            vec![
                ("(define p (cons 1 2))", Output("()")),
                ("(set-car! p 9)", Output("()")),
                ("p", Output("(9 . 2)")),
            ],
            vec![("(list-tail (list 1 2 3 4) 2)", Output("(3 4)"))],
            vec![
                ("(and 1 2 #f 3)", Output("#f")),
                ("(and 1 2 3)", Output("3")),
                ("(or #f #f 7)", Output("7")),
                ("(or)", Output("#f")),
            ],
        ];

        for session in sessions {
            run_session(session);
        }
    }

    #[test]
    fn test_atoms_are_self_evaluating() {
        let mut interp = Interpreter::new();
        for literal in ["0", "1", "-1", "42", "-273", "9223372036854775807"] {
            assert_eq!(interp.run(literal).expect("atom"), literal);
        }
        assert_eq!(interp.run("#t").expect("true"), "#t");
        assert_eq!(interp.run("#f").expect("false"), "#f");
        assert_eq!(interp.run("()").expect("nil"), "()");
    }

    #[test]
    fn test_quote_strips_evaluation() {
        // run("'E") must equal the printer's rendering of the parsed E.
        let mut interp = Interpreter::new();
        let expressions = [
            ("'x", "x"),
            ("'(+ 1 2)", "(+ 1 2)"),
            ("'()", "()"),
            ("'(1 (2 3) . 4)", "(1 (2 3) . 4)"),
            ("''x", "(quote x)"),
            ("'#t", "#t"),
            ("'-7", "-7"),
        ];
        for (source, rendered) in expressions {
            assert_eq!(interp.run(source).expect("quote"), rendered, "{source}");
        }
    }

    #[test]
    fn test_list_round_trip() {
        let mut interp = Interpreter::new();
        let cases = [
            ("(list)", "()"),
            ("(list 1)", "(1)"),
            ("(list 1 2 3)", "(1 2 3)"),
            ("(list #t #f 0 -5)", "(#t #f 0 -5)"),
        ];
        for (source, rendered) in cases {
            assert_eq!(interp.run(source).expect("list"), rendered, "{source}");
        }
    }

    #[test]
    fn test_cons_car_cdr_laws() {
        let mut interp = Interpreter::new();
        for (a, b) in [("1", "2"), ("#t", "-7"), ("0", "#f")] {
            let car = format!("(car (cons {a} {b}))");
            let cdr = format!("(cdr (cons {a} {b}))");
            assert_eq!(interp.run(&car).expect("car"), a);
            assert_eq!(interp.run(&cdr).expect("cdr"), b);
        }
    }

    #[test]
    fn test_arithmetic_identities() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.run("(+)").expect("sum"), "0");
        assert_eq!(interp.run("(*)").expect("product"), "1");
        for n in ["0", "7", "-13"] {
            assert_eq!(interp.run(&format!("(+ {n})")).expect("sum"), n);
            assert_eq!(interp.run(&format!("(* {n})")).expect("product"), n);
        }
    }

    #[test]
    fn test_chained_comparison_matches_pairwise() {
        let mut interp = Interpreter::new();
        let triples = [(1, 2, 3), (1, 3, 2), (5, 5, 6), (-2, 0, 7), (3, 2, 1)];
        for (a, b, c) in triples {
            let chained = interp
                .run(&format!("(< {a} {b} {c})"))
                .expect("chained comparison");
            let pairwise = if a < b && b < c { "#t" } else { "#f" };
            assert_eq!(chained, pairwise, "(< {a} {b} {c})");
        }
    }

    #[test]
    fn test_lexical_scoping_sees_current_values() {
        // The closure reads the outer binding at call time, not at
        // definition time.
        run_session(vec![
            ("(define n 1)", Output("()")),
            ("(define get-n (lambda () n))", Output("()")),
            ("(set! n 2)", Output("()")),
            ("(get-n)", Output("2")),
        ]);
    }

    #[test]
    fn test_if_requires_boolean_condition() {
        run_session(vec![
            ("(if 0 1 2)", RuntimeErr),
            ("(if '() 1 2)", RuntimeErr),
            ("(if (cons 1 2) 1 2)", RuntimeErr),
            ("(if #t 1 2)", Output("1")),
            // and/or accept arbitrary values where if does not
            ("(and 0 '())", Output("()")),
            ("(or 0 #f)", Output("0")),
        ]);
    }

    #[test]
    fn test_error_kinds() {
        run_session(vec![
            ("(+ 1", SyntaxErr),
            ("(1 2) extra", SyntaxErr),
            ("1 2", SyntaxErr),
            ("no-such-binding", NameErr),
            ("(set! no-such-binding 1)", NameErr),
            ("(car 5)", RuntimeErr),
            ("(/ 1 0)", RuntimeErr),
            ("(1 2)", RuntimeErr),
        ]);
    }
}
