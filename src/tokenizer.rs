use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    sequence::pair,
};

use crate::Error;

/// One lexeme of the input stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Signed integer literal
    Constant(i64),
    /// `#t` or `#f`
    Boolean(bool),
    /// Identifier or operator name
    Symbol(String),
    /// The `'` mark
    Quote,
    /// The `.` used for improper lists
    Dot,
    OpenParen,
    CloseParen,
}

/// Non-alphanumeric characters the language permits anywhere in the input
const PERMITTED_PUNCTUATION: &str = "<=>*#/?!-+().'";

fn is_permitted_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_ascii_whitespace() || PERMITTED_PUNCTUATION.contains(c)
}

/// Characters that can begin a symbol. `#` is excluded: a token starting
/// with `#` must be `#t` or `#f`, though `#` may appear inside a symbol.
fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || "<=>*/".contains(c)
}

fn is_symbol_continuation(c: char) -> bool {
    is_symbol_start(c) || c.is_ascii_digit() || "?!-#".contains(c)
}

fn lex_boolean(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Boolean(true), tag("#t")),
        value(Token::Boolean(false), tag("#f")),
    ))
    .parse(input)
}

/// Lex `[+-]?digit+`. The sign belongs to the number only when a digit
/// follows immediately; a lone sign falls through to the symbol rule.
fn lex_constant(input: &str) -> IResult<&str, Token> {
    let (remaining, literal) = recognize(pair(
        opt(one_of("+-")),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;

    match literal.parse::<i64>() {
        Ok(n) => Ok((remaining, Token::Constant(n))),
        // Out-of-range literal. A hard failure, so the alt above us does
        // not retry it as a symbol.
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn lex_symbol(input: &str) -> IResult<&str, Token> {
    alt((
        map(
            recognize(pair(
                satisfy(is_symbol_start),
                take_while(is_symbol_continuation),
            )),
            |name: &str| Token::Symbol(name.to_owned()),
        ),
        // Lone + or -; signed numbers were already claimed by lex_constant
        map(recognize(one_of("+-")), |name: &str| {
            Token::Symbol(name.to_owned())
        }),
    ))
    .parse(input)
}

/// Lexing rules, ordered: quote, dot, booleans, brackets, numbers,
/// symbols. First match wins.
fn lex_token(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Quote, char('\'')),
        value(Token::Dot, char('.')),
        lex_boolean,
        value(Token::OpenParen, char('(')),
        value(Token::CloseParen, char(')')),
        lex_constant,
        lex_symbol,
    ))
    .parse(input)
}

/// Convert a nom lexing error into a positioned syntax error.
fn lex_error(source: &str, error: nom::Err<nom::error::Error<&str>>) -> Error {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = source.len().saturating_sub(e.input.len());
            let snippet: String = source.chars().skip(position).take(10).collect();
            if snippet.is_empty() {
                Error::syntax("unexpected end of input")
            } else {
                Error::syntax(format!("invalid token near '{snippet}' (offset {position})"))
            }
        }
        nom::Err::Incomplete(_) => Error::syntax("incomplete input"),
    }
}

/// Token stream over one source string.
///
/// Construction pre-scans the whole input against the permitted character
/// set and then lexes eagerly, so every `SyntaxError` a malformed lexeme
/// can cause is reported before any token is handed out. `peek` is stable:
/// consecutive calls return the same token until `advance` consumes it.
#[derive(Debug)]
pub struct Tokenizer {
    tokens: Vec<Token>,
    position: usize,
}

impl Tokenizer {
    pub fn new(source: &str) -> Result<Self, Error> {
        if let Some(bad) = source.chars().find(|c| !is_permitted_char(*c)) {
            return Err(Error::syntax(format!(
                "character {bad:?} is not allowed in source text"
            )));
        }

        let mut tokens = Vec::new();
        let mut rest = source.trim_start();
        while !rest.is_empty() {
            match lex_token(rest) {
                Ok((remaining, token)) => {
                    tokens.push(token);
                    rest = remaining.trim_start();
                }
                Err(error) => return Err(lex_error(source, error)),
            }
        }

        Ok(Tokenizer {
            tokens,
            position: 0,
        })
    }

    pub fn is_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// The current token, without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// Consume the current token.
    pub fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }
}
