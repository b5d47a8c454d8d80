//! Lexical analyzer for Ephemeris source text.
//!
//! The lexer converts source text into a stream of [`Token`]s for parsing.
//! It handles whitespace, comments, string literals, and all language
//! tokens defined in the [`tokens`](crate::tokens) module.
//!
//! The public entry point is [`tokenize`], which performs error-recovering
//! lexical analysis and collects all diagnostics in a single pass.

use winnow::{
    Parser as _,
    combinator::{alt, cut_err, opt, preceded, repeat, terminated},
    error::{ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location, Stream},
    token::{any, none_of, one_of, take_while},
};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    span::Span,
    tokens::{PositionedToken, Token},
};

/// Rich diagnostic information for lexer errors.
///
/// Attached to winnow errors via `.context()` to provide detailed error
/// messages with codes, help text, and precise span information.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LexerDiagnostic {
    code: ErrorCode,
    message: &'static str,
    help: Option<&'static str>,
    /// The error span covers from `start` to the error position.
    start: usize,
}

type Input<'a> = LocatingSlice<&'a str>;
type IResult<'a, O> = ModalResult<O, ContextError<LexerDiagnostic>>;

/// Parse an escape sequence in a string after the backslash.
///
/// Valid escapes are `\n`, `\r`, `\t`, `\\`, `\"`; anything else commits to
/// an invalid-escape diagnostic.
fn string_escape<'a>(input: &mut Input<'a>) -> IResult<'a, char> {
    let escape_start = input.current_token_start();

    '\\'.parse_next(input)?;

    let escaped = cut_err(one_of(['n', 'r', 't', '\\', '"']).context(LexerDiagnostic {
        code: ErrorCode::E003,
        message: "invalid escape sequence",
        help: Some("valid escapes: `\\n`, `\\r`, `\\t`, `\\\\`, `\\\"`"),
        start: escape_start,
    }))
    .parse_next(input)?;

    Ok(match escaped {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        other => other,
    })
}

/// Parse one character inside a string literal.
fn string_char<'a>(input: &mut Input<'a>) -> IResult<'a, char> {
    alt((none_of(['"', '\\', '\n']), string_escape)).parse_next(input)
}

/// Parse a double-quoted string literal.
///
/// Raw newlines terminate the literal with an unterminated-string
/// diagnostic; escaped content is decoded into the token.
fn string_literal<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    let literal_start = input.current_token_start();

    '"'.parse_next(input)?;

    let content: String = cut_err(terminated(
        repeat(0.., string_char),
        '"'.context(LexerDiagnostic {
            code: ErrorCode::E001,
            message: "unterminated string literal",
            help: Some("close the string with `\"` before the end of the line"),
            start: literal_start,
        }),
    ))
    .parse_next(input)?;

    Ok(Token::StringLiteral(content))
}

/// Parse a bare identifier: `[A-Za-z_][A-Za-z0-9_]*`.
fn identifier<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .map(Token::Identifier)
        .parse_next(input)
}

/// Parse a numeric literal with optional sign, fraction, and exponent.
fn number<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    (
        opt(one_of(['-'])),
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(1.., |c: char| c.is_ascii_digit()))),
        opt((
            one_of(['e', 'E']),
            opt(one_of(['+', '-'])),
            take_while(1.., |c: char| c.is_ascii_digit()),
        )),
    )
        .take()
        .try_map(str::parse::<f64>)
        .map(Token::Number)
        .parse_next(input)
}

/// Parse a `//` line comment, content excluding the delimiter.
fn line_comment<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    preceded("//", take_while(0.., |c: char| c != '\n'))
        .map(Token::LineComment)
        .parse_next(input)
}

/// Parse horizontal whitespace (newlines are a separate token).
fn whitespace<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    take_while(1.., |c: char| c == ' ' || c == '\t' || c == '\r')
        .value(Token::Whitespace)
        .parse_next(input)
}

/// Parse a single punctuation token.
fn punctuation<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    any.verify_map(|c: char| match c {
        '{' => Some(Token::LeftBrace),
        '}' => Some(Token::RightBrace),
        '[' => Some(Token::LeftBracket),
        ']' => Some(Token::RightBracket),
        '=' => Some(Token::Equals),
        ',' => Some(Token::Comma),
        '.' => Some(Token::Dot),
        '\n' => Some(Token::Newline),
        _ => None,
    })
    .parse_next(input)
}

/// Parse the next token with its span.
fn token<'a>(input: &mut Input<'a>) -> IResult<'a, PositionedToken<'a>> {
    alt((
        whitespace,
        line_comment,
        string_literal,
        identifier,
        number,
        punctuation,
    ))
    .with_span()
    .map(|(token, range)| PositionedToken::new(token, Span::new(range)))
    .parse_next(input)
}

/// Convert a failed token parse into a diagnostic.
fn diagnostic_from_error(
    err: ErrMode<ContextError<LexerDiagnostic>>,
    source: &str,
    error_pos: usize,
) -> Diagnostic {
    let context = match &err {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e.context().next().cloned(),
        ErrMode::Incomplete(_) => None,
    };

    match context {
        Some(ctx) => {
            let end = error_pos.max(ctx.start + 1).min(source.len());
            let mut diagnostic = Diagnostic::error(ctx.message)
                .with_code(ctx.code)
                .with_label(Span::new(ctx.start..end), ctx.code.description());
            if let Some(help) = ctx.help {
                diagnostic = diagnostic.with_help(help);
            }
            diagnostic
        }
        None => {
            let char_len = source[error_pos.min(source.len())..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            Diagnostic::error("unexpected character")
                .with_code(ErrorCode::E002)
                .with_label(
                    Span::new(error_pos..(error_pos + char_len).min(source.len())),
                    "not valid here",
                )
        }
    }
}

/// Tokenize `source`, collecting every lexical diagnostic in one pass.
///
/// Lexing recovers after an error by skipping one character, so a single
/// stray byte does not hide later problems.
///
/// # Errors
///
/// Returns [`ParseError`] wrapping all collected diagnostics when any of
/// them has error severity.
pub(crate) fn tokenize(source: &str) -> Result<Vec<PositionedToken<'_>>, ParseError> {
    let mut input = LocatingSlice::new(source);
    let mut tokens = Vec::new();
    let mut collector = DiagnosticCollector::new();

    while input.eof_offset() > 0 {
        match token.parse_next(&mut input) {
            Ok(positioned) => tokens.push(positioned),
            Err(err) => {
                let error_pos = input.current_token_start();
                collector.push(diagnostic_from_error(err, source, error_pos));
                // Skip one character to resynchronize.
                let _ = input.next_token();
            }
        }
    }

    if collector.has_errors() {
        Err(ParseError::new(collector.into_vec()))
    } else {
        Ok(tokens)
    }
}
