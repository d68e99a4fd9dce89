//! Tokenizer for snapshot programs

use std::borrow::Cow;
use std::fmt;

use chumsky::prelude::*;

use crate::literal;

pub type Span = SimpleSpan;
pub type Spanned<T> = (T, Span);

/// A token of the snapshot syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    /// Identifier
    Name(&'src str),
    /// Unsigned integer literal (sign is a separate token)
    Int(u64),
    /// Unsigned float literal
    Float(f64),
    /// Decoded string literal
    Str(Vec<u8>),
    /// `local`
    Local,
    /// `nil`
    Nil,
    /// `true`
    True,
    /// `false`
    False,
    /// Single-character punctuation: `= . , : ( ) { } [ ] - /`
    Punct(char),
}

impl<'src> Token<'src> {
    pub fn into_cow_str(self) -> Cow<'src, str> {
        match self {
            Self::Name(name) => name.into(),
            Self::Int(n) => n.to_string().into(),
            Self::Float(n) => literal::format_number(n).into(),
            Self::Str(bytes) => literal::escape(&bytes).into(),
            Self::Local => "local".into(),
            Self::Nil => "nil".into(),
            Self::True => "true".into(),
            Self::False => "false".into(),
            Self::Punct(c) => c.to_string().into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.clone().into_cow_str())
    }
}

/// Split source text into spanned tokens.
///
/// Whitespace, `;` and `--` line comments are skipped.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<Spanned<Token<'src>>>, extra::Err<Rich<'src, char, Span>>> {
    let number = text::digits(10)
        .then(just('.').then(text::digits(10).or_not()).or_not())
        .then(
            one_of("eE")
                .then(one_of("+-").or_not())
                .then(text::digits(10))
                .or_not(),
        )
        .to_slice()
        .try_map(|number: &str, span| {
            if number.contains(['.', 'e', 'E']) {
                number
                    .parse()
                    .map(Token::Float)
                    .map_err(|_| Rich::custom(span, format!("malformed number `{}`", number)))
            } else {
                number
                    .parse()
                    .map(Token::Int)
                    .map_err(|_| Rich::custom(span, format!("integer `{}` out of range", number)))
            }
        });

    let string = just('"')
        .ignore_then(
            choice((
                just('\\').then(any()).ignored(),
                none_of("\\\"\n").ignored(),
            ))
            .repeated()
            .to_slice(),
        )
        .then_ignore(just('"'))
        .try_map(|body: &str, span| {
            literal::unescape(body)
                .map(Token::Str)
                .map_err(|message| Rich::custom(span, message))
        });

    let word = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .map(|word: &str| match word {
            "local" => Token::Local,
            "nil" => Token::Nil,
            "true" => Token::True,
            "false" => Token::False,
            name => Token::Name(name),
        });

    let punct = one_of("=.,:(){}[]-/").map(Token::Punct);

    let token = choice((number, string, word, punct));

    let skip = choice((
        one_of(" \t\r\n;").ignored(),
        just("--").then(none_of('\n').repeated()).ignored(),
    ))
    .repeated();

    skip.clone()
        .ignore_then(
            token
                .map_with(|token, extra| (token, extra.span()))
                .then_ignore(skip)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then_ignore(end())
}

/// 1-based line of a byte offset.
pub fn line_at(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token<'_>> {
        lexer()
            .parse(source)
            .into_result()
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_statement_tokens() {
        assert_eq!(
            kinds("local __ref1 = {x = -1.5}"),
            vec![
                Token::Local,
                Token::Name("__ref1"),
                Token::Punct('='),
                Token::Punct('{'),
                Token::Name("x"),
                Token::Punct('='),
                Token::Punct('-'),
                Token::Float(1.5),
                Token::Punct('}'),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1e300 7 0.25 5e-324"),
            vec![
                Token::Float(1e300),
                Token::Int(7),
                Token::Float(0.25),
                Token::Float(5e-324),
            ]
        );
        assert_eq!(kinds("9223372036854775808"), vec![Token::Int(1 << 63)]);
    }

    #[test]
    fn test_strings_are_decoded() {
        assert_eq!(kinds(r#""a\"b\10""#), vec![Token::Str(b"a\"b\n".to_vec())]);
    }

    #[test]
    fn test_comments_and_lines() {
        let source = "-- header\nx = 1; -- trailing\n";
        let tokens = lexer().parse(source).into_result().unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(line_at(source, tokens[0].1.start), 2);
    }

    #[test]
    fn test_minus_is_not_a_comment() {
        assert_eq!(
            kinds("-1/0"),
            vec![
                Token::Punct('-'),
                Token::Int(1),
                Token::Punct('/'),
                Token::Int(0),
            ]
        );
    }

    #[test]
    fn test_errors_carry_offset() {
        let source = "x = 1\ny = \"open";
        let errors = lexer().parse(source).into_result().unwrap_err();
        assert_eq!(line_at(source, errors[0].span().start), 2);
        assert!(lexer().parse("x = #").into_result().is_err());
        assert!(lexer().parse("n = 99999999999999999999").into_result().is_err());
    }

    #[test]
    fn test_token_display() {
        assert_eq!(Token::Str(b"a\n".to_vec()).to_string(), "\"a\\n\"");
        assert_eq!(Token::Float(2.0).to_string(), "2.0");
        assert_eq!(Token::Punct('{').to_string(), "{");
    }
}
