use crate::Error;
use crate::MAX_PARSE_DEPTH;
use crate::ast::Value;
use crate::tokenizer::{Token, Tokenizer};

/// Read one expression from the token stream, leaving the tokenizer
/// positioned after it. The caller decides whether trailing tokens are an
/// error.
pub fn read(tokenizer: &mut Tokenizer) -> Result<Value, Error> {
    read_expr(tokenizer, 0)
}

fn read_expr(tokenizer: &mut Tokenizer, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(Error::syntax(format!(
            "expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"
        )));
    }

    let Some(token) = tokenizer.peek().cloned() else {
        return Err(Error::syntax("expected an expression, found end of input"));
    };
    tokenizer.advance();

    match token {
        Token::Constant(n) => Ok(Value::Number(n)),
        Token::Boolean(b) => Ok(Value::Bool(b)),
        Token::Symbol(name) => Ok(Value::Symbol(name)),
        Token::OpenParen => read_list(tokenizer, depth + 1),
        // 'E reads the next expression, list or atom, and wraps it as
        // (quote E); '() becomes (quote ()).
        Token::Quote => {
            let quoted = read_expr(tokenizer, depth + 1)?;
            Ok(Value::proper_list(vec![
                Value::Symbol("quote".to_owned()),
                quoted,
            ]))
        }
        Token::CloseParen => Err(Error::syntax("unexpected ')'")),
        Token::Dot => Err(Error::syntax("'.' is only valid inside a list")),
    }
}

/// Read list elements after an already-consumed `(`.
fn read_list(tokenizer: &mut Tokenizer, depth: usize) -> Result<Value, Error> {
    let mut elements: Vec<Value> = Vec::new();
    let mut dot_position: Option<usize> = None;

    loop {
        match tokenizer.peek() {
            None => return Err(Error::syntax("unterminated list, expected ')'")),
            Some(Token::CloseParen) => {
                tokenizer.advance();
                break;
            }
            Some(Token::Dot) => {
                if dot_position.is_some() {
                    return Err(Error::syntax("a list may contain at most one '.'"));
                }
                dot_position = Some(elements.len());
                tokenizer.advance();
            }
            Some(_) => elements.push(read_expr(tokenizer, depth)?),
        }
    }

    match dot_position {
        None => {
            validate_form(&elements)?;
            Ok(Value::proper_list(elements))
        }
        Some(position) => {
            // Exactly one expression after the dot, at least one before it.
            if position == 0 {
                return Err(Error::syntax(
                    "'.' must be preceded by at least one expression",
                ));
            }
            if position + 1 != elements.len() {
                return Err(Error::syntax(
                    "'.' must be followed by exactly one expression",
                ));
            }
            let Some(tail) = elements.pop() else {
                return Err(Error::syntax("'.' must be followed by an expression"));
            };
            Ok(Value::improper_list(elements, tail))
        }
    }
}

/// Structural shape checks that are syntax errors, not runtime errors:
/// `if` takes 2 or 3 operands; `define` and `set!` take exactly 2, unless
/// the first operand is a list, which selects the
/// `(define (name params...) body...)` shorthand and requires at least one
/// body expression; `lambda` takes a parameter list plus at least one body
/// expression. Everything else is checked at evaluation time.
fn validate_form(elements: &[Value]) -> Result<(), Error> {
    let Some(Value::Symbol(head)) = elements.first() else {
        return Ok(());
    };
    let operands = elements.len() - 1;

    match head.as_str() {
        "if" if operands != 2 && operands != 3 => Err(Error::syntax(
            "if expects a condition and one or two branches",
        )),
        "define" | "set!" => {
            if matches!(elements.get(1), Some(Value::Pair(_))) {
                if operands < 2 {
                    Err(Error::syntax(format!(
                        "{head} with a (name params...) target expects at least one body expression"
                    )))
                } else {
                    Ok(())
                }
            } else if operands != 2 {
                Err(Error::syntax(format!("{head} expects exactly 2 operands")))
            } else {
                Ok(())
            }
        }
        "lambda" if operands < 2 => Err(Error::syntax(
            "lambda expects a parameter list and at least one body expression",
        )),
        _ => Ok(()),
    }
}
