//! Parser: tokens to [`Program`]
//!
//! Accepts exactly the statement forms the printer emits, plus `1/0`-style
//! numeric divisions for non-finite floats.

use chumsky::{input::ValueInput, prelude::*};

use crate::error::RestoreError;
use crate::program::{Expr, Field, Key, Path, Program, Statement};
use crate::restore::lexer::{lexer, line_at, Span, Token};

type Extra<'src> = extra::Err<Rich<'src, Token<'src>, Span>>;

impl Program {
    /// Parse snapshot text.
    ///
    /// # Errors
    ///
    /// `RestoreError::Lex` or `RestoreError::Parse` with the offending line.
    pub fn parse(source: &str) -> Result<Program, RestoreError> {
        let tokens = lexer().parse(source).into_result().map_err(|errors| {
            let (line, message) = first_error(source, errors);
            RestoreError::Lex { line, message }
        })?;

        let eoi: Span = (source.len()..source.len()).into();
        let statements = program()
            .parse(tokens.as_slice().map(eoi, |(token, span)| (token, span)))
            .into_result()
            .map_err(|errors| {
                let (line, message) = first_error(source, errors);
                RestoreError::Parse { line, message }
            })?;
        Ok(Program { statements })
    }
}

fn first_error<T: std::fmt::Display>(
    source: &str,
    errors: Vec<Rich<'_, T, Span>>,
) -> (usize, String) {
    match errors.into_iter().next() {
        Some(error) => (line_at(source, error.span().start), error.to_string()),
        None => (line_at(source, source.len()), "invalid input".to_string()),
    }
}

/// Unsigned magnitude before the sign is applied.
#[derive(Debug, Clone, Copy)]
enum Magnitude {
    Int(u64),
    Float(f64),
}

/// Trailer after a path in expression position.
enum Suffix {
    Fields(Vec<Field>),
    Args(Vec<Expr>),
}

fn signed(negative: bool, magnitude: Magnitude) -> Result<Expr, String> {
    match magnitude {
        Magnitude::Float(n) => Ok(Expr::Number(if negative { -n } else { n })),
        Magnitude::Int(n) if negative && n == 1 << 63 => Ok(Expr::Integer(i64::MIN)),
        Magnitude::Int(n) => {
            let n = i64::try_from(n).map_err(|_| {
                format!("integer {}{} out of range", if negative { "-" } else { "" }, n)
            })?;
            Ok(Expr::Integer(if negative { -n } else { n }))
        }
    }
}

fn as_float(expr: &Expr) -> f64 {
    match expr {
        Expr::Integer(n) => *n as f64,
        Expr::Number(n) => *n,
        _ => f64::NAN,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Grammar
// ═══════════════════════════════════════════════════════════════════════

fn punct<'src, I>(c: char) -> impl Parser<'src, I, Token<'src>, Extra<'src>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    just(Token::Punct(c))
}

fn name<'src, I>() -> impl Parser<'src, I, String, Extra<'src>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    select! { Token::Name(name) => name.to_string() }
}

/// `root`, `root.field`, `root[expr]`, chained.
fn path<'src, I, P>(expr: P) -> impl Parser<'src, I, Path, Extra<'src>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
    P: Parser<'src, I, Expr, Extra<'src>> + Clone,
{
    let key = choice((
        punct('.').ignore_then(name()).map(Key::Name),
        expr.delimited_by(punct('['), punct(']')).map(Key::Index),
    ));
    name()
        .then(key.repeated().collect::<Vec<_>>())
        .map(|(root, segments)| Path { root, segments })
}

/// `(expr, ...)`
fn args<'src, I, P>(expr: P) -> impl Parser<'src, I, Vec<Expr>, Extra<'src>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
    P: Parser<'src, I, Expr, Extra<'src>> + Clone,
{
    expr.separated_by(punct(','))
        .collect::<Vec<_>>()
        .delimited_by(punct('('), punct(')'))
}

fn expression<'src, I>() -> impl Parser<'src, I, Expr, Extra<'src>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    recursive(|expr| {
        // `[-]n` or `[-]n/m`
        let signed_number = punct('-')
            .or_not()
            .then(select! {
                Token::Int(n) => Magnitude::Int(n),
                Token::Float(n) => Magnitude::Float(n),
            })
            .try_map(|(minus, magnitude), span| {
                signed(minus.is_some(), magnitude).map_err(|message| Rich::custom(span, message))
            });
        let number = signed_number
            .clone()
            .then(punct('/').ignore_then(signed_number).or_not())
            .map(|(value, divisor)| match divisor {
                None => value,
                Some(divisor) => Expr::Number(as_float(&value) / as_float(&divisor)),
            });

        let field = choice((
            expr.clone()
                .delimited_by(punct('['), punct(']'))
                .then_ignore(punct('='))
                .then(expr.clone())
                .map(|(key, value)| Field::Keyed(Key::Index(key), value)),
            name()
                .then_ignore(punct('='))
                .then(expr.clone())
                .map(|(key, value)| Field::Keyed(Key::Name(key), value)),
            expr.clone().map(Field::Positional),
        ));
        let fields = field
            .separated_by(punct(','))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(punct('{'), punct('}'));

        let prefixed = path(expr.clone())
            .then(
                choice((
                    fields.clone().map(Suffix::Fields),
                    args(expr.clone()).map(Suffix::Args),
                ))
                .or_not(),
            )
            .map(|(path, suffix)| match suffix {
                None => Expr::Path(path),
                Some(Suffix::Fields(fields)) => Expr::Table {
                    constructor: Some(path),
                    fields,
                },
                Some(Suffix::Args(args)) => Expr::Call {
                    function: path,
                    args,
                },
            });

        choice((
            just(Token::Nil).to(Expr::Nil),
            just(Token::True).to(Expr::Bool(true)),
            just(Token::False).to(Expr::Bool(false)),
            select! { Token::Str(bytes) => Expr::string(bytes) },
            number,
            fields.map(|fields| Expr::Table {
                constructor: None,
                fields,
            }),
            prefixed,
        ))
    })
}

fn program<'src, I>() -> impl Parser<'src, I, Vec<Statement>, Extra<'src>>
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    let expr = expression();
    let target = path(expr.clone());

    let local = just(Token::Local)
        .ignore_then(name())
        .then_ignore(punct('='))
        .then(expr.clone())
        .map(|(name, value)| Statement::Assign {
            local: true,
            target: Path::name(name),
            value,
        });

    let assign = target
        .clone()
        .then_ignore(punct('='))
        .then(expr.clone())
        .map(|(target, value)| Statement::Assign {
            local: false,
            target,
            value,
        });

    let method = target
        .clone()
        .then_ignore(punct(':'))
        .then(name())
        .then(args(expr.clone()))
        .map(|((target, method), args)| Statement::Method {
            target,
            method,
            args,
        });

    let call = target
        .then(args(expr))
        .map(|(function, args)| Statement::Call { function, args });

    choice((local, assign, method, call))
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}
