//! Parser for Ephemeris source tokens.
//!
//! This module transforms a token stream from the [`lexer`](crate::lexer)
//! into the block tree defined in [`blocks`](crate::blocks). The public
//! entry point is [`parse_blocks`], which recovers at block granularity so
//! that one malformed block does not hide the rest of the file.

use indexmap::IndexMap;
use winnow::{
    Parser as _,
    combinator::{peek, repeat, separated},
    error::{ContextError, ErrMode},
    stream::{Stream, TokenSlice},
    token::any,
};

use crate::{
    blocks::{Block, RawValue},
    error::{Diagnostic, DiagnosticCollector, ErrorCode},
    span::{Span, Spanned},
    tokens::{PositionedToken, Token},
};

/// Context type for parser errors
#[derive(Debug, Clone, PartialEq, Eq)]
enum Context {
    /// Description of what is currently being parsed
    Label(&'static str),
    /// Remaining token count (`eof_offset()`) at error start position
    ///
    /// Used to locate the offending token as `tokens.len() - offset`.
    StartOffset(usize),
}

type Input<'src> = TokenSlice<'src, PositionedToken<'src>>;
type IResult<O> = std::result::Result<O, ErrMode<ContextError<Context>>>;

/// Parse zero or more whitespace/newline/comment tokens.
fn trivia0(input: &mut Input<'_>) -> IResult<()> {
    repeat(
        0..,
        any.verify(|token: &PositionedToken<'_>| token.is_trivia())
            .void(),
    )
    .parse_next(input)
}

/// Parse a bare identifier with span preservation.
fn word(input: &mut Input<'_>) -> IResult<Spanned<String>> {
    any.verify_map(|token: &PositionedToken<'_>| match &token.token {
        Token::Identifier(name) => Some(Spanned::new((*name).to_owned(), token.span)),
        _ => None,
    })
    .context(Context::Label("identifier"))
    .parse_next(input)
}

fn left_brace(input: &mut Input<'_>) -> IResult<Span> {
    any.verify_map(|token: &PositionedToken<'_>| {
        matches!(token.token, Token::LeftBrace).then_some(token.span)
    })
    .context(Context::Label("`{`"))
    .parse_next(input)
}

fn right_brace(input: &mut Input<'_>) -> IResult<Span> {
    any.verify_map(|token: &PositionedToken<'_>| {
        matches!(token.token, Token::RightBrace).then_some(token.span)
    })
    .context(Context::Label("`}`"))
    .parse_next(input)
}

fn left_bracket(input: &mut Input<'_>) -> IResult<Span> {
    any.verify_map(|token: &PositionedToken<'_>| {
        matches!(token.token, Token::LeftBracket).then_some(token.span)
    })
    .context(Context::Label("`[`"))
    .parse_next(input)
}

fn right_bracket(input: &mut Input<'_>) -> IResult<Span> {
    any.verify_map(|token: &PositionedToken<'_>| {
        matches!(token.token, Token::RightBracket).then_some(token.span)
    })
    .context(Context::Label("`]`"))
    .parse_next(input)
}

fn equals(input: &mut Input<'_>) -> IResult<Span> {
    any.verify_map(|token: &PositionedToken<'_>| {
        matches!(token.token, Token::Equals).then_some(token.span)
    })
    .context(Context::Label("`=`"))
    .parse_next(input)
}

fn comma(input: &mut Input<'_>) -> IResult<Span> {
    any.verify_map(|token: &PositionedToken<'_>| {
        matches!(token.token, Token::Comma).then_some(token.span)
    })
    .context(Context::Label("`,`"))
    .parse_next(input)
}

fn dot(input: &mut Input<'_>) -> IResult<Span> {
    any.verify_map(|token: &PositionedToken<'_>| {
        matches!(token.token, Token::Dot).then_some(token.span)
    })
    .context(Context::Label("`.`"))
    .parse_next(input)
}

/// A dotted word plus how many segments it has.
///
/// Segment count distinguishes bare references (`vault.Employee.alice`)
/// from single keywords in value position.
fn dotted_word(input: &mut Input<'_>) -> IResult<Spanned<(String, usize)>> {
    let first = word(input)?;
    let mut text = first.inner().clone();
    let mut segments = 1usize;
    let mut span = first.span();

    loop {
        let checkpoint = input.checkpoint();
        if dot(input).is_err() {
            input.reset(&checkpoint);
            break;
        }
        // A dot not followed by an identifier is malformed; commit.
        let next = word(input).map_err(ErrMode::cut)?;
        text.push('.');
        text.push_str(next.inner());
        segments += 1;
        span = span.union(next.span());
    }

    Ok(Spanned::new((text, segments), span))
}

/// Parse an attribute value.
fn value(input: &mut Input<'_>) -> IResult<Spanned<RawValue>> {
    trivia0(input)?;

    // Scalar tokens first.
    let checkpoint = input.checkpoint();
    let scalar_result: IResult<Spanned<RawValue>> = any
        .verify_map(|token: &PositionedToken<'_>| match &token.token {
            Token::StringLiteral(s) => Some(Spanned::new(RawValue::String(s.clone()), token.span)),
            Token::Number(n) => Some(Spanned::new(RawValue::Number(*n), token.span)),
            _ => None,
        })
        .parse_next(input);
    if let Ok(spanned) = scalar_result {
        return Ok(spanned);
    }
    input.reset(&checkpoint);

    if peek(left_bracket).parse_next(input).is_ok() {
        return list_value(input);
    }
    if peek(left_brace).parse_next(input).is_ok() {
        return map_value(input);
    }

    word_value(input)
}

/// Parse a list value: `[v, v, v]` with an optional trailing comma.
fn list_value(input: &mut Input<'_>) -> IResult<Spanned<RawValue>> {
    let open = left_bracket(input)?;
    trivia0(input)?;

    let items: Vec<Spanned<RawValue>> =
        separated(0.., value, (trivia0, comma, trivia0)).parse_next(input)?;

    trivia0(input)?;
    let checkpoint = input.checkpoint();
    if comma(input).is_err() {
        input.reset(&checkpoint);
    } else {
        trivia0(input)?;
    }
    let close = right_bracket(input).map_err(ErrMode::cut)?;

    let values = items.into_iter().map(|item| item.into_parts().0).collect();
    Ok(Spanned::new(RawValue::List(values), open.union(close)))
}

/// Parse a map value: `{ k = v, k = v }`; commas between entries are
/// optional.
fn map_value(input: &mut Input<'_>) -> IResult<Spanned<RawValue>> {
    let open = left_brace(input)?;
    let mut entries = IndexMap::new();

    loop {
        trivia0(input)?;
        let checkpoint = input.checkpoint();
        if let Ok(close) = right_brace(input) {
            return Ok(Spanned::new(RawValue::Map(entries), open.union(close)));
        }
        input.reset(&checkpoint);

        let (key, entry) = attr_entry(input).map_err(ErrMode::cut)?;
        entries.insert(key, entry.into_parts().0);

        trivia0(input)?;
        let checkpoint = input.checkpoint();
        if comma(input).is_err() {
            input.reset(&checkpoint);
        }
    }
}

/// Parse a bare-word value: booleans and dotted references.
///
/// A single bare word that is not `true`/`false` is rejected; strings must
/// be quoted and references need at least two segments.
fn word_value(input: &mut Input<'_>) -> IResult<Spanned<RawValue>> {
    let start_offset = input.eof_offset();
    let spanned = dotted_word(input)?;
    let (text, segments) = spanned.inner();

    let raw = match (text.as_str(), *segments) {
        ("true", 1) => RawValue::Bool(true),
        ("false", 1) => RawValue::Bool(false),
        (_, 1) => {
            let mut error = ContextError::new();
            error.push(Context::Label("quoted string or dotted reference"));
            error.push(Context::StartOffset(start_offset));
            return Err(ErrMode::Cut(error));
        }
        _ => RawValue::Reference(text.clone()),
    };

    Ok(Spanned::new(raw, spanned.span()))
}

/// Parse one `key = value` attribute entry.
///
/// Backtracks until the `=` is seen, then commits: a missing or malformed
/// value is a hard error.
fn attr_entry(input: &mut Input<'_>) -> IResult<(String, Spanned<RawValue>)> {
    let key = word(input)?;
    trivia0(input)?;
    equals(input)?;
    trivia0(input)?;
    let entry = value(input).map_err(ErrMode::cut)?;
    Ok((key.into_parts().0, entry))
}

/// Parse one block: `kind label* { (attr | block)* }`.
fn block(input: &mut Input<'_>) -> IResult<Block> {
    let start_offset = input.eof_offset();
    let kind = dotted_word(input)?.map(|(text, _)| text);

    let mut labels = Vec::new();
    loop {
        let checkpoint = input.checkpoint();
        trivia0(input)?;
        match word(input) {
            Ok(label) => labels.push(label),
            Err(_) => {
                input.reset(&checkpoint);
                break;
            }
        }
    }

    trivia0(input)?;
    let _open = left_brace(input).map_err(|err| with_start_offset(err, start_offset))?;

    let mut attrs = IndexMap::new();
    let mut children = Vec::new();

    let close = loop {
        trivia0(input)?;

        let checkpoint = input.checkpoint();
        if let Ok(close) = right_brace(input) {
            break close;
        }
        input.reset(&checkpoint);

        if input.eof_offset() == 0 {
            let mut error = ContextError::new();
            error.push(Context::Label("`}`"));
            error.push(Context::StartOffset(0));
            return Err(ErrMode::Cut(error));
        }

        // Attribute entries and nested blocks both start with a word, so
        // try the attribute form first and fall back to a block.
        let checkpoint = input.checkpoint();
        match attr_entry(input) {
            Ok((key, entry)) => {
                attrs.insert(key, entry);
                continue;
            }
            Err(ErrMode::Cut(error)) => return Err(ErrMode::Cut(error)),
            Err(_) => input.reset(&checkpoint),
        }

        let child = block(input).map_err(ErrMode::cut)?;
        children.push(child);
    };

    let span = kind.span().union(close);
    Ok(Block {
        kind,
        labels,
        attrs,
        children,
        span,
    })
}

/// Attach a `StartOffset` context and promote the error to a cut.
fn with_start_offset(
    err: ErrMode<ContextError<Context>>,
    start_offset: usize,
) -> ErrMode<ContextError<Context>> {
    match err {
        ErrMode::Backtrack(mut error) | ErrMode::Cut(mut error) => {
            error.push(Context::StartOffset(start_offset));
            ErrMode::Cut(error)
        }
        other => other,
    }
}

/// Locate the offending token and expected-item labels in a failed parse.
fn diagnostic_from_error(
    err: &ErrMode<ContextError<Context>>,
    tokens: &[PositionedToken<'_>],
    current_offset: usize,
) -> Diagnostic {
    let (labels, start_offset) = match err {
        ErrMode::Backtrack(error) | ErrMode::Cut(error) => {
            let mut expected = Vec::new();
            let mut offset = None;
            for context in error.context() {
                match context {
                    Context::Label(label) => expected.push(*label),
                    Context::StartOffset(value) => offset = Some(*value),
                }
            }
            (expected, offset)
        }
        ErrMode::Incomplete(_) => (Vec::new(), None),
    };

    let offset = start_offset.unwrap_or(current_offset);
    let index = tokens.len().saturating_sub(offset);

    let (span, code) = match tokens.get(index) {
        Some(token) => (token.span, ErrorCode::E100),
        None => {
            let end = tokens.last().map_or(0, |token| token.span.end());
            (Span::new(end..end), ErrorCode::E101)
        }
    };

    let message = match code {
        ErrorCode::E101 => "incomplete input".to_owned(),
        _ => "unexpected token".to_owned(),
    };

    let mut diagnostic = Diagnostic::error(message).with_code(code);
    diagnostic = if labels.is_empty() {
        diagnostic.with_label(span, "not valid here")
    } else {
        diagnostic.with_label(span, format!("expected {}", labels.join(" or ")))
    };
    diagnostic
}

/// Skip tokens until the current (possibly half-open) block plausibly ends.
fn synchronize(input: &mut Input<'_>) {
    let mut depth = 0usize;
    while let Some(token) = input.next_token() {
        match token.token {
            Token::LeftBrace => depth += 1,
            Token::RightBrace => {
                if depth <= 1 {
                    return;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
}

/// Parse a token stream into top-level blocks, recovering per block.
pub(crate) fn parse_blocks<'src>(
    tokens: &'src [PositionedToken<'src>],
) -> (Vec<Block>, Vec<Diagnostic>) {
    let mut input = TokenSlice::new(tokens);
    let mut blocks = Vec::new();
    let mut collector = DiagnosticCollector::new();

    loop {
        let _ = trivia0(&mut input);
        if input.eof_offset() == 0 {
            break;
        }

        let block_start = input.checkpoint();
        match block(&mut input) {
            Ok(parsed) => blocks.push(parsed),
            Err(err) => {
                collector.push(diagnostic_from_error(&err, tokens, input.eof_offset()));
                // Resynchronize from the start of the failed block: skip
                // through its balanced closing brace (or to end of input).
                input.reset(&block_start);
                synchronize(&mut input);
            }
        }
    }

    (blocks, collector.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_source(source: &str) -> (Vec<Block>, Vec<Diagnostic>) {
        let tokens = lexer::tokenize(source).expect("lexing should succeed");
        let (blocks, diagnostics) = parse_blocks(&tokens);
        // Tokens borrow from `source`; blocks own their strings.
        (blocks, diagnostics)
    }

    #[test]
    fn test_empty_source() {
        let (blocks, diagnostics) = parse_source("  \n // just a comment\n");
        assert!(blocks.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_block_with_labels_attrs_and_children() {
        let (blocks, diagnostics) = parse_source(
            r#"
            model employee {
              api_name = "Employee__c"
              string name {
                _required = true
              }
            }
            "#,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(blocks.len(), 1);

        let model = &blocks[0];
        assert_eq!(model.kind.inner(), "model");
        assert_eq!(model.labels.len(), 1);
        assert_eq!(model.labels[0].inner(), "employee");
        assert_eq!(
            model.attrs["api_name"].inner(),
            &RawValue::String("Employee__c".to_owned())
        );
        assert_eq!(model.children.len(), 1);
        assert_eq!(model.children[0].kind.inner(), "string");
        assert_eq!(
            model.children[0].attrs["_required"].inner(),
            &RawValue::Bool(true)
        );
    }

    #[test]
    fn test_dotted_kind_and_reference_values() {
        let (blocks, diagnostics) = parse_source(
            r#"
            vault.Employee alice {
              manager = vault.Employee.bob
              tags = ["a", "b"]
              address = { city = "Oslo", zip = "0150" }
            }
            "#,
        );
        assert!(diagnostics.is_empty());

        let instance = &blocks[0];
        assert_eq!(instance.kind.inner(), "vault.Employee");
        assert_eq!(
            instance.attrs["manager"].inner(),
            &RawValue::Reference("vault.Employee.bob".to_owned())
        );
        assert_eq!(
            instance.attrs["tags"].inner(),
            &RawValue::List(vec![
                RawValue::String("a".to_owned()),
                RawValue::String("b".to_owned()),
            ])
        );
        let address = instance.attrs["address"].inner();
        let RawValue::Map(entries) = address else {
            panic!("expected map, got {address:?}");
        };
        assert_eq!(entries["city"], RawValue::String("Oslo".to_owned()));
    }

    #[test]
    fn test_bare_single_word_value_is_rejected() {
        let (_, diagnostics) = parse_source("employee alice { name = oslo }");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), Some(ErrorCode::E100));
    }

    #[test]
    fn test_missing_close_brace_is_incomplete() {
        let (_, diagnostics) = parse_source("model employee {\n  a = 1\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), Some(ErrorCode::E101));
    }

    #[test]
    fn test_recovery_parses_blocks_after_error() {
        let (blocks, diagnostics) = parse_source(
            r#"
            model broken { name = }
            model fine { a = 1 }
            "#,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].labels[0].inner(), "fine");
    }

    #[test]
    fn test_duplicate_attribute_keeps_last() {
        let (blocks, _) = parse_source("model m { a = 1\n a = 2 }");
        assert_eq!(blocks[0].attrs["a"].inner(), &RawValue::Number(2.0));
    }

    #[test]
    fn test_trailing_comma_in_list() {
        let (blocks, diagnostics) = parse_source("model m { xs = [1, 2,] }");
        assert!(diagnostics.is_empty());
        assert_eq!(
            blocks[0].attrs["xs"].inner(),
            &RawValue::List(vec![RawValue::Number(1.0), RawValue::Number(2.0)])
        );
    }
}
