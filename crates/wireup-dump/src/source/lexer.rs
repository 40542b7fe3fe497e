//! Tokenization of generated container source using `nom`.
//!
//! Covers the subset of Rust the source exporter emits. Whitespace and
//! `//` comments (including doc comments) are discarded between tokens.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, not_line_ending},
    combinator::{opt, recognize, value},
    multi::many0,
    sequence::{pair, preceded},
};
use wireup_common::error::{Result, WireupError};

/// A token of generated source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identifier or keyword.
    Ident(String),
    /// String literal with escapes decoded.
    Str(String),
    /// Unsigned numeric literal, kept as written.
    Number(String),
    /// Lifetime such as `'static`.
    Lifetime(String),
    /// `{`
    BraceOpen,
    /// `}`
    BraceClose,
    /// `(`
    ParenOpen,
    /// `)`
    ParenClose,
    /// `[`
    BracketOpen,
    /// `]`
    BracketClose,
    /// `,`
    Comma,
    /// `;`
    Semi,
    /// `::`
    PathSep,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `->`
    Arrow,
    /// `=>`
    FatArrow,
    /// `=`
    Equals,
    /// `&&`
    AndAnd,
    /// `&`
    Amp,
    /// `!`
    Bang,
    /// `?`
    Question,
    /// `-`
    Minus,
    /// `|`
    Pipe,
    /// `#`
    Pound,
    /// `<`
    Lt,
    /// `>`
    Gt,
}

impl Token {
    /// Returns whether this is the identifier `name`.
    #[must_use]
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Self::Ident(s) if s == name)
    }
}

fn skip_trivia(input: &str) -> IResult<&str, ()> {
    let comment = value((), preceded(tag("//"), not_line_ending));
    let ws = value((), multispace1);
    let (input, _) = many0(alt((ws, comment))).parse(input)?;
    Ok((input, ()))
}

fn failure(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Char))
}

/// Parses a double-quoted string literal with Rust escapes.
fn string_literal(input: &str) -> IResult<&str, Token> {
    let (input, _) = char('"')(input)?;
    let mut result = String::new();
    let mut chars = input.char_indices();
    loop {
        match chars.next() {
            Some((idx, '"')) => {
                let remaining = &input[idx + 1..];
                return Ok((remaining, Token::Str(result)));
            }
            Some((idx, '\\')) => match chars.next() {
                Some((_, 'n')) => result.push('\n'),
                Some((_, 't')) => result.push('\t'),
                Some((_, 'r')) => result.push('\r'),
                Some((_, '0')) => result.push('\0'),
                Some((_, '\\')) => result.push('\\'),
                Some((_, '"')) => result.push('"'),
                Some((_, '\'')) => result.push('\''),
                Some((_, 'u')) => {
                    let rest = &input[idx + 2..];
                    let Some(body) = rest.strip_prefix('{') else {
                        return Err(failure(rest));
                    };
                    let Some(end) = body.find('}') else {
                        return Err(failure(rest));
                    };
                    let decoded = u32::from_str_radix(&body[..end], 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| failure(rest))?;
                    result.push(decoded);
                    for _ in 0..=end + 1 {
                        let _ = chars.next();
                    }
                }
                _ => return Err(failure(input)),
            },
            Some((_, c)) => result.push(c),
            None => return Err(failure(input)),
        }
    }
}

/// Parses an unsigned integer or float literal: digits, an optional
/// fraction, and an optional exponent.
fn number_literal(input: &str) -> IResult<&str, Token> {
    let fraction = pair(char('.'), digit1);
    let exponent = (
        alt((char('e'), char('E'))),
        opt(alt((char('+'), char('-')))),
        digit1,
    );
    let (input, text) = recognize((digit1, opt(fraction), opt(exponent))).parse(input)?;
    Ok((input, Token::Number(text.to_owned())))
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, Token> {
    let (input, word) =
        recognize(pair(take_while1(is_ident_start), take_while(is_ident_continue))).parse(input)?;
    Ok((input, Token::Ident(word.to_owned())))
}

fn lifetime(input: &str) -> IResult<&str, Token> {
    let (input, _) = char('\'')(input)?;
    let (input, word) =
        recognize(pair(take_while1(is_ident_start), take_while(is_ident_continue))).parse(input)?;
    Ok((input, Token::Lifetime(word.to_owned())))
}

fn symbol(input: &str) -> IResult<&str, Token> {
    alt((
        alt((
            value(Token::PathSep, tag("::")),
            value(Token::Arrow, tag("->")),
            value(Token::FatArrow, tag("=>")),
            value(Token::AndAnd, tag("&&")),
        )),
        alt((
            value(Token::BraceOpen, char('{')),
            value(Token::BraceClose, char('}')),
            value(Token::ParenOpen, char('(')),
            value(Token::ParenClose, char(')')),
            value(Token::BracketOpen, char('[')),
            value(Token::BracketClose, char(']')),
            value(Token::Comma, char(',')),
            value(Token::Semi, char(';')),
            value(Token::Colon, char(':')),
            value(Token::Dot, char('.')),
        )),
        alt((
            value(Token::Equals, char('=')),
            value(Token::Amp, char('&')),
            value(Token::Bang, char('!')),
            value(Token::Question, char('?')),
            value(Token::Minus, char('-')),
            value(Token::Pipe, char('|')),
            value(Token::Pound, char('#')),
            value(Token::Lt, char('<')),
            value(Token::Gt, char('>')),
        )),
    ))
    .parse(input)
}

fn single_token(input: &str) -> IResult<&str, Token> {
    alt((string_literal, lifetime, symbol, number_literal, identifier)).parse(input)
}

/// Tokenizes generated source into a vector of tokens.
///
/// # Errors
///
/// Returns [`WireupError::Parse`] if the input contains characters that
/// cannot be tokenized.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, ()) = skip_trivia(remaining).map_err(|e| WireupError::Parse {
            format: "source",
            message: format!("lexer error skipping whitespace: {e}"),
        })?;
        remaining = rest;

        if remaining.is_empty() {
            break;
        }

        let (rest, token) = single_token(remaining).map_err(|e| WireupError::Parse {
            format: "source",
            message: format!(
                "unexpected character at: \"{}\" ({e})",
                remaining.chars().take(20).collect::<String>()
            ),
        })?;
        tokens.push(token);
        remaining = rest;
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_builder_chain() {
        let tokens = tokenize(r#"Instance::builder("Foo").argument(Value::Int(-3))?"#)
            .expect("should tokenize");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("Instance".into()),
                Token::PathSep,
                Token::Ident("builder".into()),
                Token::ParenOpen,
                Token::Str("Foo".into()),
                Token::ParenClose,
                Token::Dot,
                Token::Ident("argument".into()),
                Token::ParenOpen,
                Token::Ident("Value".into()),
                Token::PathSep,
                Token::Ident("Int".into()),
                Token::ParenOpen,
                Token::Minus,
                Token::Number("3".into()),
                Token::ParenClose,
                Token::ParenClose,
                Token::Question,
            ]
        );
    }

    #[test]
    fn tokenize_string_escapes_match_debug_output() {
        let original = "tab\tquote\"back\\slash\u{7f}nul\0é";
        let literal = format!("{original:?}");
        let tokens = tokenize(&literal).expect("should tokenize");
        assert_eq!(tokens, vec![Token::Str(original.into())]);
    }

    #[test]
    fn tokenize_floats_as_written() {
        let tokens = tokenize("1.5 2e-7 10").expect("should tokenize");
        assert_eq!(
            tokens,
            vec![
                Token::Number("1.5".into()),
                Token::Number("2e-7".into()),
                Token::Number("10".into()),
            ]
        );
    }

    #[test]
    fn tokenize_signatures_and_lifetimes() {
        let tokens = tokenize("&'static [ServiceInfo] -> Option<String> || a && b")
            .expect("should tokenize");
        assert_eq!(tokens[0], Token::Amp);
        assert_eq!(tokens[1], Token::Lifetime("static".into()));
        assert!(tokens.contains(&Token::Arrow));
        assert!(tokens.contains(&Token::Lt));
        assert!(tokens.contains(&Token::AndAnd));
        assert_eq!(tokens.iter().filter(|t| **t == Token::Pipe).count(), 2);
    }

    #[test]
    fn tokenize_skips_comments() {
        let tokens = tokenize("/// doc\n// plain\nfn new").expect("should tokenize");
        assert_eq!(
            tokens,
            vec![Token::Ident("fn".into()), Token::Ident("new".into())]
        );
    }

    #[test]
    fn tokenize_error_on_invalid_char() {
        assert!(tokenize("fn @bad").is_err());
    }
}
