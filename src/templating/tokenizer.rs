//! Tag tokenizer
//!
//! Parses `{% name(arg, ...) %}` blocks (and the space separated
//! `{% name arg, ... %}` form) into [`TagExpression`]s, splits template text
//! into literal, tag and `{{ variable }}` segments, and turns expressions back
//! into canonical tag text.

use winnow::ascii::{digit1, multispace0, multispace1};
use winnow::combinator::{alt, cut_err, delimited, empty, fail, opt, preceded, separated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, literal, one_of, take_while};
use winnow::ModalResult;

use crate::errors::{RestpulseError, Result};

pub const TAG_OPEN: &str = "{%";
pub const TAG_CLOSE: &str = "%}";
pub const VAR_OPEN: &str = "{{";
pub const VAR_CLOSE: &str = "}}";

/// Deepest tag nesting the parser accepts
pub const MAX_NESTING: usize = 64;

const NESTING_LABEL: &str = "tag nesting depth";

/// One argument of a tag expression
#[derive(Debug, Clone, PartialEq)]
pub enum TagArg {
    Str(String),
    Number(f64),
    Bool(bool),
    /// Bare identifier, looked up in the rendering context
    Variable(String),
    /// Nested tag, rendered before the outer tag runs
    Tag(Box<TagExpression>),
}

/// A parsed tag block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagExpression {
    /// Definition name; `None` for custom/raw expressions
    pub name: Option<String>,
    pub args: Vec<TagArg>,
    /// Original text, kept when the expression must round-trip verbatim
    pub raw_value: Option<String>,
}

impl TagExpression {
    pub fn new(name: impl Into<String>, args: Vec<TagArg>) -> Self {
        Self {
            name: Some(name.into()),
            args,
            raw_value: None,
        }
    }

    /// Custom expression carrying only its raw text
    pub fn custom(raw: impl Into<String>) -> Self {
        Self {
            name: None,
            args: Vec::new(),
            raw_value: Some(raw.into()),
        }
    }

    pub fn is_custom(&self) -> bool {
        self.name.is_none()
    }
}

/// A piece of template text
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    Text(&'a str),
    Tag {
        expr: TagExpression,
        source: &'a str,
    },
    Variable {
        path: String,
        source: &'a str,
    },
}

/// Check if a string contains any template delimiters
pub fn has_template_syntax(s: &str) -> bool {
    s.contains(TAG_OPEN) || s.contains(VAR_OPEN)
}

/// Parse a single tag block
///
/// Empty or whitespace-only input yields an empty custom expression. Text
/// without delimiters is parsed as a bare tag body (`uuid()`).
pub fn tokenize(text: &str) -> Result<TagExpression> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(TagExpression::custom(text));
    }

    let leading = text.len() - text.trim_start().len();
    let opens = trimmed.starts_with(TAG_OPEN);
    let closes = trimmed.ends_with(TAG_CLOSE);

    if opens != closes || (opens && trimmed.len() < TAG_OPEN.len() + TAG_CLOSE.len()) {
        let position = if opens { leading + trimmed.len() } else { leading };
        return Err(RestpulseError::parse(position, "unbalanced tag delimiters"));
    }

    let parsed = if opens {
        (|i: &mut &str| tag_block(i, 0)).parse(trimmed)
    } else {
        (|i: &mut &str| bare_body(i, 0)).parse(trimmed)
    };

    let mut expr = parsed.map_err(|e| {
        if too_deep(e.inner()) {
            nesting_error(leading + e.offset())
        } else {
            RestpulseError::parse(leading + e.offset(), describe(e.inner()))
        }
    })?;
    if expr.is_custom() {
        expr.raw_value = Some(text.to_string());
    }
    Ok(expr)
}

/// Turn an expression back into canonical tag text
///
/// Expressions carrying a raw value are returned verbatim.
pub fn untokenize(expr: &TagExpression) -> String {
    if let Some(raw) = &expr.raw_value {
        return raw.clone();
    }

    match &expr.name {
        Some(name) => {
            let args: Vec<String> = expr.args.iter().map(format_arg).collect();
            format!("{} {}({}) {}", TAG_OPEN, name, args.join(", "), TAG_CLOSE)
        }
        None => String::new(),
    }
}

/// Format one argument as tag source text
pub fn format_arg(arg: &TagArg) -> String {
    match arg {
        TagArg::Str(s) => quote_str(s),
        TagArg::Number(n) => format_number(*n),
        TagArg::Bool(b) => b.to_string(),
        TagArg::Variable(path) => path.clone(),
        TagArg::Tag(inner) => untokenize(inner),
    }
}

/// Quote a string literal with single quotes
pub fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Format a number, dropping the fraction for integral values
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Split template text into literal, tag and variable segments
pub fn segments(text: &str) -> Result<Vec<Segment<'_>>> {
    let mut out = Vec::new();
    let mut offset = 0;

    while offset < text.len() {
        let rest = &text[offset..];
        let next = match find_open(rest) {
            Some(i) => i,
            None => {
                out.push(Segment::Text(rest));
                break;
            }
        };

        if next > 0 {
            out.push(Segment::Text(&rest[..next]));
        }

        let start = offset + next;
        let mut input = &text[start..];

        if input.starts_with(TAG_OPEN) {
            let expr = tag_block(&mut input, 0).map_err(|e| match e {
                ErrMode::Backtrack(err) | ErrMode::Cut(err) if too_deep(&err) => nesting_error(start),
                _ => block_error(text, start, TAG_CLOSE),
            })?;
            let end = text.len() - input.len();
            out.push(Segment::Tag { expr, source: &text[start..end] });
            offset = end;
        } else {
            let path = variable_block
                .parse_next(&mut input)
                .map_err(|_| block_error(text, start, VAR_CLOSE))?;
            let end = text.len() - input.len();
            out.push(Segment::Variable { path, source: &text[start..end] });
            offset = end;
        }
    }

    Ok(out)
}

fn find_open(s: &str) -> Option<usize> {
    match (s.find(TAG_OPEN), s.find(VAR_OPEN)) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn block_error(text: &str, start: usize, close: &str) -> RestpulseError {
    if text[start..].contains(close) {
        RestpulseError::parse(start, "invalid tag syntax")
    } else {
        RestpulseError::parse(start, format!("unclosed block, expected '{}'", close))
    }
}

fn too_deep(err: &ContextError) -> bool {
    err.context().any(|c| matches!(c, StrContext::Label(label) if *label == NESTING_LABEL))
}

fn nesting_error(position: usize) -> RestpulseError {
    RestpulseError::parse(position, format!("tags nested deeper than {} levels", MAX_NESTING))
}

fn describe(err: &ContextError) -> String {
    let detail = err.to_string();
    if detail.is_empty() {
        "invalid tag syntax".to_string()
    } else {
        format!("invalid tag syntax: {}", detail)
    }
}

// =============================================================================
// Grammar
// =============================================================================

fn ws(input: &mut &str) -> ModalResult<()> {
    multispace0.void().parse_next(input)
}

/// `{% body %}` nested `depth` levels inside other tags
fn tag_block(input: &mut &str, depth: usize) -> ModalResult<TagExpression> {
    if depth > MAX_NESTING {
        return cut_err(fail.context(StrContext::Label(NESTING_LABEL))).parse_next(input);
    }
    literal(TAG_OPEN).parse_next(input)?;
    let expr = bare_body(input, depth)?;
    literal(TAG_CLOSE)
        .context(StrContext::Expected(StrContextValue::StringLiteral(TAG_CLOSE)))
        .parse_next(input)?;
    Ok(expr)
}

/// Tag body without delimiters; empty bodies give a custom expression
fn bare_body(input: &mut &str, depth: usize) -> ModalResult<TagExpression> {
    let call = delimited(ws, opt(|i: &mut &str| tag_call(i, depth)), ws).parse_next(input)?;
    Ok(call.unwrap_or_default())
}

/// `{{ path.to.var }}`
fn variable_block(input: &mut &str) -> ModalResult<String> {
    literal(VAR_OPEN).parse_next(input)?;
    let path = delimited(ws, identifier, ws).parse_next(input)?;
    literal(VAR_CLOSE).parse_next(input)?;
    Ok(path)
}

fn tag_call(input: &mut &str, depth: usize) -> ModalResult<TagExpression> {
    let name = identifier.parse_next(input)?;
    let args = alt((
        |i: &mut &str| paren_args(i, depth),
        |i: &mut &str| space_args(i, depth),
        empty.value(Vec::new()),
    ))
    .parse_next(input)?;
    Ok(TagExpression::new(name, args))
}

fn paren_args(input: &mut &str, depth: usize) -> ModalResult<Vec<TagArg>> {
    delimited(
        (ws, '(', ws),
        separated(0.., |i: &mut &str| arg(i, depth), arg_sep),
        (ws, opt(','), ws, ')'.context(StrContext::Expected(StrContextValue::CharLiteral(')')))),
    )
    .parse_next(input)
}

fn space_args(input: &mut &str, depth: usize) -> ModalResult<Vec<TagArg>> {
    preceded(multispace1, separated(1.., |i: &mut &str| arg(i, depth), arg_sep)).parse_next(input)
}

fn arg_sep(input: &mut &str) -> ModalResult<()> {
    (ws, ',', ws).void().parse_next(input)
}

fn arg(input: &mut &str, depth: usize) -> ModalResult<TagArg> {
    alt((
        quoted_string.map(TagArg::Str),
        (|i: &mut &str| tag_block(i, depth + 1)).map(|expr| TagArg::Tag(Box::new(expr))),
        number.map(TagArg::Number),
        identifier.map(|ident| match ident.as_str() {
            "true" => TagArg::Bool(true),
            "false" => TagArg::Bool(false),
            _ => TagArg::Variable(ident),
        }),
    ))
    .parse_next(input)
}

fn identifier(input: &mut &str) -> ModalResult<String> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'),
    )
        .take()
        .map(str::to_string)
        .parse_next(input)
}

fn number(input: &mut &str) -> ModalResult<f64> {
    (opt(one_of(['+', '-'])), digit1, opt(('.', digit1)))
        .take()
        .try_map(str::parse::<f64>)
        .parse_next(input)
}

fn quoted_string(input: &mut &str) -> ModalResult<String> {
    let quote = one_of(['\'', '"']).parse_next(input)?;
    let mut out = String::new();
    loop {
        match any.parse_next(input)? {
            '\\' => {
                let escaped = any.parse_next(input)?;
                out.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => other,
                });
            }
            c if c == quote => return Ok(out),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_paren_form() {
        let expr = tokenize("{% hash('sha256', 'hex', 'value') %}").unwrap();
        assert_eq!(expr.name.as_deref(), Some("hash"));
        assert_eq!(
            expr.args,
            vec![
                TagArg::Str("sha256".to_string()),
                TagArg::Str("hex".to_string()),
                TagArg::Str("value".to_string()),
            ]
        );
        assert!(expr.raw_value.is_none());
    }

    #[test]
    fn test_tokenize_space_form() {
        let expr = tokenize("{% env 'token' %}").unwrap();
        assert_eq!(expr.name.as_deref(), Some("env"));
        assert_eq!(expr.args, vec![TagArg::Str("token".to_string())]);
    }

    #[test]
    fn test_tokenize_no_args() {
        assert_eq!(tokenize("{% uuid %}").unwrap(), TagExpression::new("uuid", vec![]));
        assert_eq!(tokenize("{%uuid()%}").unwrap(), TagExpression::new("uuid", vec![]));
    }

    #[test]
    fn test_tokenize_literal_kinds() {
        let expr = tokenize(r#"{% f("a\"b", -3.5, 12, true, false, base.url) %}"#).unwrap();
        assert_eq!(
            expr.args,
            vec![
                TagArg::Str("a\"b".to_string()),
                TagArg::Number(-3.5),
                TagArg::Number(12.0),
                TagArg::Bool(true),
                TagArg::Bool(false),
                TagArg::Variable("base.url".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_nested_tag() {
        let expr = tokenize("{% base64('encode', {% uuid() %}) %}").unwrap();
        assert_eq!(expr.args.len(), 2);
        match &expr.args[1] {
            TagArg::Tag(inner) => assert_eq!(inner.name.as_deref(), Some("uuid")),
            other => panic!("expected nested tag, got {:?}", other),
        }
    }

    fn nested(levels: usize) -> String {
        let mut text = "'x'".to_string();
        for _ in 0..levels {
            text = format!("{{% base64('encode', {}) %}}", text);
        }
        text
    }

    #[test]
    fn test_tokenize_nesting_limit() {
        assert!(tokenize(&nested(MAX_NESTING + 1)).is_ok());
        for levels in [MAX_NESTING + 2, 200, 3000] {
            match tokenize(&nested(levels)) {
                Err(RestpulseError::Parse { message, .. }) => assert!(message.contains("nested deeper")),
                other => panic!("expected nesting error at {} levels, got {:?}", levels, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_segments_nesting_limit() {
        let text = format!("prefix {}", nested(500));
        match segments(&text) {
            Err(RestpulseError::Parse { position, message }) => {
                assert_eq!(position, 7);
                assert!(message.contains("nested deeper"));
            }
            other => panic!("expected nesting error, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_tokenize_string_containing_close_delimiter() {
        let expr = tokenize("{% f('50%} off') %}").unwrap();
        assert_eq!(expr.args, vec![TagArg::Str("50%} off".to_string())]);
    }

    #[test]
    fn test_tokenize_empty_input() {
        let expr = tokenize("   ").unwrap();
        assert!(expr.is_custom());
        assert_eq!(expr.raw_value.as_deref(), Some("   "));

        let expr = tokenize("").unwrap();
        assert!(expr.is_custom());
        assert_eq!(expr.raw_value.as_deref(), Some(""));
    }

    #[test]
    fn test_tokenize_empty_block_is_custom() {
        let expr = tokenize("{%  %}").unwrap();
        assert!(expr.is_custom());
        assert_eq!(expr.raw_value.as_deref(), Some("{%  %}"));
    }

    #[test]
    fn test_tokenize_bare_body() {
        let expr = tokenize("uuid('v4')").unwrap();
        assert_eq!(expr.name.as_deref(), Some("uuid"));
    }

    #[test]
    fn test_tokenize_unbalanced() {
        assert!(matches!(tokenize("{% uuid()"), Err(RestpulseError::Parse { .. })));
        assert!(matches!(tokenize("uuid() %}"), Err(RestpulseError::Parse { .. })));
        assert!(matches!(tokenize("{%}"), Err(RestpulseError::Parse { .. })));
    }

    #[test]
    fn test_tokenize_malformed_args() {
        assert!(matches!(tokenize("{% f('unterminated) %}"), Err(RestpulseError::Parse { .. })));
        assert!(matches!(tokenize("{% f(1 2) %}"), Err(RestpulseError::Parse { .. })));
        assert!(matches!(tokenize("{% 9lives %}"), Err(RestpulseError::Parse { .. })));
    }

    #[test]
    fn test_untokenize_canonical() {
        let expr = TagExpression::new(
            "hash",
            vec![
                TagArg::Str("md5".to_string()),
                TagArg::Number(3.0),
                TagArg::Number(0.25),
                TagArg::Bool(true),
            ],
        );
        assert_eq!(untokenize(&expr), "{% hash('md5', 3, 0.25, true) %}");
    }

    #[test]
    fn test_untokenize_escapes_quotes() {
        let expr = TagExpression::new("f", vec![TagArg::Str("it's a \\ test".to_string())]);
        let text = untokenize(&expr);
        assert_eq!(text, r"{% f('it\'s a \\ test') %}");
        assert_eq!(tokenize(&text).unwrap(), expr);
    }

    #[test]
    fn test_untokenize_raw_value_verbatim() {
        let mut expr = tokenize("{%   nope   'x' %}").unwrap();
        expr.raw_value = Some("{%   nope   'x' %}".to_string());
        assert_eq!(untokenize(&expr), "{%   nope   'x' %}");
    }

    #[test]
    fn test_round_trip_normalizes_whitespace() {
        let original = tokenize("{%   response  'body',  'req_1' ,'$.id'   %}").unwrap();
        let text = untokenize(&original);
        assert_eq!(text, "{% response('body', 'req_1', '$.id') %}");
        assert_eq!(tokenize(&text).unwrap(), original);
    }

    #[test]
    fn test_round_trip_nested() {
        let original = tokenize("{% base64 'encode', {% env 'user' %} %}").unwrap();
        let text = untokenize(&original);
        assert_eq!(text, "{% base64('encode', {% env('user') %}) %}");
        assert_eq!(tokenize(&text).unwrap(), original);
    }

    #[test]
    fn test_segments_mixed() {
        let segs = segments("https://{{ host }}/users/{% uuid() %}?a=1").unwrap();
        assert_eq!(segs.len(), 5);
        assert_eq!(segs[0], Segment::Text("https://"));
        assert!(matches!(&segs[1], Segment::Variable { path, source } if path == "host" && *source == "{{ host }}"));
        assert_eq!(segs[2], Segment::Text("/users/"));
        assert!(matches!(&segs[3], Segment::Tag { source, .. } if *source == "{% uuid() %}"));
        assert_eq!(segs[4], Segment::Text("?a=1"));
    }

    #[test]
    fn test_segments_plain_text() {
        assert_eq!(segments("no tags {here}").unwrap(), vec![Segment::Text("no tags {here}")]);
        assert!(segments("").unwrap().is_empty());
    }

    #[test]
    fn test_segments_unclosed_reports_position() {
        match segments("abc {% uuid() ") {
            Err(RestpulseError::Parse { position, message }) => {
                assert_eq!(position, 4);
                assert!(message.contains("%}"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(matches!(segments("{{ name "), Err(RestpulseError::Parse { .. })));
    }

    #[test]
    fn test_has_template_syntax() {
        assert!(has_template_syntax("{% uuid %}"));
        assert!(has_template_syntax("{{ a }}"));
        assert!(!has_template_syntax("{a} %}"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(8.0), "8");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(1.5), "1.5");
    }
}
