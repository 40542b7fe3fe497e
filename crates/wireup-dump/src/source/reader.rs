//! Recursive-descent reader for generated container source.
//!
//! The reader does not understand Rust in general. It locates the
//! `SERVICES` and `INLINED` tables, the registrations in `new()`, and the
//! builder chain inside every accessor, and ignores everything else.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

use wireup_common::error::{Result, WireupError};
use wireup_common::types::{ReferencePolicy, ServiceId};
use wireup_graph::{Alias, Definition, ParameterBag, ResolvedGraph, TagAttributes, Value};

use super::lexer::{Token, tokenize};

/// Deepest chain of inline builders followed before giving up.
const MAX_INLINE_DEPTH: usize = 128;

const fn parse_err(message: String) -> WireupError {
    WireupError::Parse {
        format: "source",
        message,
    }
}

/// Cursor over a token slice.
struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    const fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expect_token(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(parse_err(format!("expected {expected:?}, found {token:?}"))),
            None => Err(parse_err(format!("expected {expected:?}, found end of input"))),
        }
    }

    fn expect_identifier(&mut self) -> Result<&'a str> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            Some(token) => Err(parse_err(format!("expected identifier, found {token:?}"))),
            None => Err(parse_err("expected identifier, found end of input".into())),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        let found = self.expect_identifier()?;
        if found == keyword {
            Ok(())
        } else {
            Err(parse_err(format!("expected `{keyword}`, found `{found}`")))
        }
    }

    fn expect_string(&mut self) -> Result<&'a str> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(s),
            Some(token) => Err(parse_err(format!("expected string literal, found {token:?}"))),
            None => Err(parse_err("expected string literal, found end of input".into())),
        }
    }

    fn expect_bool(&mut self) -> Result<bool> {
        match self.expect_identifier()? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(parse_err(format!("expected boolean, found `{other}`"))),
        }
    }

    /// Consumes a `,` if present.
    fn skip_optional_comma(&mut self) {
        if self.peek() == Some(&Token::Comma) {
            self.pos += 1;
        }
    }

    /// Returns whether the upcoming tokens are the identifiers and symbols
    /// of `pattern`, without consuming them.
    fn looking_at(&self, pattern: &[Token]) -> bool {
        pattern
            .iter()
            .enumerate()
            .all(|(offset, expected)| self.peek_at(offset) == Some(expected))
    }
}

/// Returns the index of the token closing the group opened at `open`.
fn matching_close(tokens: &[Token], open: usize) -> Result<usize> {
    let mut depth = 0_usize;
    for (index, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::BraceOpen | Token::ParenOpen | Token::BracketOpen => depth += 1,
            Token::BraceClose | Token::ParenClose | Token::BracketClose => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(index);
                }
            }
            _ => {}
        }
    }
    Err(parse_err("unbalanced delimiters".into()))
}

fn ident(name: &str) -> Token {
    Token::Ident(name.to_owned())
}

/// One row of a metadata table.
#[derive(Debug, Default)]
struct ServiceMeta {
    id: String,
    method: String,
    class: Option<String>,
    public: bool,
    shared: bool,
    synthetic: bool,
    scope: String,
    tags: Vec<(String, TagAttributes)>,
}

impl ServiceMeta {
    fn definition(&self) -> Definition {
        let mut definition = Definition::default();
        definition.set_class(self.class.clone());
        definition.set_public(self.public);
        definition.set_shared(self.shared);
        definition.set_synthetic(self.synthetic);
        definition.set_scope(self.scope.clone());
        for (name, attributes) in &self.tags {
            definition.add_tag(name.clone(), attributes.clone());
        }
        definition
    }
}

fn parse_table(cursor: &mut TokenCursor<'_>) -> Result<Vec<ServiceMeta>> {
    while cursor.peek().is_some_and(|token| *token != Token::Equals) {
        let _ = cursor.advance();
    }
    cursor.expect_token(&Token::Equals)?;
    cursor.expect_token(&Token::Amp)?;
    cursor.expect_token(&Token::BracketOpen)?;
    let mut rows = Vec::new();
    while cursor.peek() != Some(&Token::BracketClose) {
        if cursor.at_end() {
            return Err(parse_err("unterminated service table".into()));
        }
        rows.push(parse_row(cursor)?);
        cursor.skip_optional_comma();
    }
    cursor.expect_token(&Token::BracketClose)?;
    Ok(rows)
}

fn parse_row(cursor: &mut TokenCursor<'_>) -> Result<ServiceMeta> {
    cursor.expect_keyword("ServiceInfo")?;
    cursor.expect_token(&Token::BraceOpen)?;
    let mut meta = ServiceMeta::default();
    while cursor.peek() != Some(&Token::BraceClose) {
        let field = cursor.expect_identifier()?;
        cursor.expect_token(&Token::Colon)?;
        match field {
            "id" => cursor.expect_string()?.clone_into(&mut meta.id),
            "method" => cursor.expect_string()?.clone_into(&mut meta.method),
            "class" => meta.class = parse_optional_string(cursor)?,
            "public" => meta.public = cursor.expect_bool()?,
            "shared" => meta.shared = cursor.expect_bool()?,
            "synthetic" => meta.synthetic = cursor.expect_bool()?,
            "scope" => cursor.expect_string()?.clone_into(&mut meta.scope),
            "tags" => meta.tags = parse_tags(cursor)?,
            other => return Err(parse_err(format!("unknown service table field `{other}`"))),
        }
        cursor.skip_optional_comma();
    }
    cursor.expect_token(&Token::BraceClose)?;
    if meta.id.is_empty() || meta.method.is_empty() {
        return Err(parse_err("service table row without id or method".into()));
    }
    Ok(meta)
}

fn parse_optional_string(cursor: &mut TokenCursor<'_>) -> Result<Option<String>> {
    match cursor.expect_identifier()? {
        "None" => Ok(None),
        "Some" => {
            cursor.expect_token(&Token::ParenOpen)?;
            let value = cursor.expect_string()?.to_owned();
            cursor.expect_token(&Token::ParenClose)?;
            Ok(Some(value))
        }
        other => Err(parse_err(format!("expected Some or None, found `{other}`"))),
    }
}

fn parse_tags(cursor: &mut TokenCursor<'_>) -> Result<Vec<(String, TagAttributes)>> {
    cursor.expect_token(&Token::Amp)?;
    cursor.expect_token(&Token::BracketOpen)?;
    let mut tags = Vec::new();
    while cursor.peek() != Some(&Token::BracketClose) {
        cursor.expect_keyword("TagInfo")?;
        cursor.expect_token(&Token::BraceOpen)?;
        let mut name = None;
        let mut attributes = TagAttributes::new();
        while cursor.peek() != Some(&Token::BraceClose) {
            match cursor.expect_identifier()? {
                "name" => {
                    cursor.expect_token(&Token::Colon)?;
                    name = Some(cursor.expect_string()?.to_owned());
                }
                "attributes" => {
                    cursor.expect_token(&Token::Colon)?;
                    cursor.expect_token(&Token::Amp)?;
                    cursor.expect_token(&Token::BracketOpen)?;
                    while cursor.peek() != Some(&Token::BracketClose) {
                        cursor.expect_token(&Token::ParenOpen)?;
                        let key = cursor.expect_string()?.to_owned();
                        cursor.expect_token(&Token::Comma)?;
                        let value = cursor.expect_string()?.to_owned();
                        cursor.expect_token(&Token::ParenClose)?;
                        let _ = attributes.insert(key, value);
                        cursor.skip_optional_comma();
                    }
                    cursor.expect_token(&Token::BracketClose)?;
                }
                other => return Err(parse_err(format!("unknown tag field `{other}`"))),
            }
            cursor.skip_optional_comma();
        }
        cursor.expect_token(&Token::BraceClose)?;
        let name = name.ok_or_else(|| parse_err("tag without a name".into()))?;
        tags.push((name, attributes));
        cursor.skip_optional_comma();
    }
    cursor.expect_token(&Token::BracketClose)?;
    Ok(tags)
}

/// Tables and function bodies located in the token stream.
struct SourceReader<'a> {
    tokens: &'a [Token],
    services: Vec<ServiceMeta>,
    inlined: HashMap<String, ServiceMeta>,
    bodies: HashMap<&'a str, Range<usize>>,
}

impl<'a> SourceReader<'a> {
    fn scan(tokens: &'a [Token]) -> Result<Self> {
        let mut reader = Self {
            tokens,
            services: Vec::new(),
            inlined: HashMap::new(),
            bodies: HashMap::new(),
        };
        let mut index = 0;
        while index + 1 < tokens.len() {
            match (&tokens[index], &tokens[index + 1]) {
                (Token::Ident(keyword), Token::Ident(name)) if keyword == "const" => {
                    let mut cursor = TokenCursor {
                        tokens,
                        pos: index + 2,
                    };
                    match name.as_str() {
                        "SERVICES" => reader.services = parse_table(&mut cursor)?,
                        "INLINED" => {
                            reader.inlined = parse_table(&mut cursor)?
                                .into_iter()
                                .map(|meta| (meta.method.clone(), meta))
                                .collect();
                        }
                        _ => {}
                    }
                    index = cursor.pos;
                }
                (Token::Ident(keyword), Token::Ident(name)) if keyword == "fn" => {
                    let open = tokens[index..]
                        .iter()
                        .position(|token| *token == Token::BraceOpen)
                        .map(|offset| index + offset)
                        .ok_or_else(|| parse_err(format!("function `{name}` has no body")))?;
                    let close = matching_close(tokens, open)?;
                    let _ = reader.bodies.insert(name.as_str(), open + 1..close);
                    index = close + 1;
                }
                _ => index += 1,
            }
        }
        Ok(reader)
    }

    fn body(&self, name: &str) -> Result<TokenCursor<'a>> {
        let range = self
            .bodies
            .get(name)
            .ok_or_else(|| parse_err(format!("missing function `{name}`")))?;
        Ok(TokenCursor::new(&self.tokens[range.clone()]))
    }

    fn into_graph(self) -> Result<ResolvedGraph> {
        let mut definitions = BTreeMap::new();
        for meta in &self.services {
            let definition = self.definition(meta, 0)?;
            let _ = definitions.insert(ServiceId::new(&meta.id), definition);
        }
        let (parameters, aliases) = self.registrations()?;
        tracing::debug!(services = definitions.len(), "read container source");
        ResolvedGraph::from_parts(definitions, aliases, parameters)
    }

    /// Reads the parameter and alias registrations of `new()`.
    fn registrations(&self) -> Result<(ParameterBag, BTreeMap<ServiceId, Alias>)> {
        let mut values = BTreeMap::new();
        let mut dynamic = BTreeSet::new();
        let mut aliases = BTreeMap::new();
        let mut cursor = self.body("new")?;
        while !cursor.at_end() {
            if !cursor.looking_at(&[ident("base"), Token::Dot]) {
                let _ = cursor.advance();
                continue;
            }
            cursor.pos += 2;
            let setter = cursor.expect_identifier()?;
            cursor.expect_token(&Token::ParenOpen)?;
            match setter {
                "set_parameter" | "set_dynamic_parameter" => {
                    let name = cursor.expect_string()?.to_owned();
                    cursor.expect_token(&Token::Comma)?;
                    let value = self.value(&mut cursor, 0)?;
                    if setter == "set_dynamic_parameter" {
                        let _ = dynamic.insert(name.clone());
                    }
                    let _ = values.insert(name, value);
                }
                "set_alias" => {
                    let name = cursor.expect_string()?;
                    cursor.expect_token(&Token::Comma)?;
                    let target = cursor.expect_string()?;
                    cursor.expect_token(&Token::Comma)?;
                    let public = cursor.expect_bool()?;
                    let _ = aliases.insert(ServiceId::new(name), Alias::new(target).with_public(public));
                }
                other => return Err(parse_err(format!("unknown registration `{other}`"))),
            }
            cursor.expect_token(&Token::ParenClose)?;
        }
        Ok((ParameterBag::frozen(values, dynamic), aliases))
    }

    /// Rebuilds a definition from its table row and the builder chain in
    /// its accessor.
    fn definition(&self, meta: &ServiceMeta, depth: usize) -> Result<Definition> {
        if depth > MAX_INLINE_DEPTH {
            return Err(parse_err(format!("inline builders nested too deeply at `{}`", meta.method)));
        }
        let mut definition = meta.definition();
        let mut cursor = self.body(&meta.method)?;
        let start = [ident("Instance"), Token::PathSep, ident("builder")];
        while !cursor.at_end() && !cursor.looking_at(&start) {
            let _ = cursor.advance();
        }
        if cursor.at_end() {
            return Ok(definition);
        }
        cursor.pos += start.len();
        cursor.expect_token(&Token::ParenOpen)?;
        let _ = cursor.expect_string()?;
        cursor.expect_token(&Token::ParenClose)?;

        while cursor.peek() == Some(&Token::Dot) {
            let _ = cursor.advance();
            let step = cursor.expect_identifier()?;
            cursor.expect_token(&Token::ParenOpen)?;
            match step {
                "argument" => definition.add_argument(self.value(&mut cursor, depth)?),
                "property" => {
                    let name = cursor.expect_string()?.to_owned();
                    cursor.expect_token(&Token::Comma)?;
                    definition.set_property(name, self.value(&mut cursor, depth)?);
                }
                "call" | "call_when" => {
                    if step == "call_when" {
                        skip_condition(&mut cursor)?;
                    }
                    let method = cursor.expect_string()?.to_owned();
                    cursor.expect_token(&Token::Comma)?;
                    let arguments = self.vec_literal(&mut cursor, depth)?;
                    definition.add_call(method, arguments);
                }
                "build" => {
                    cursor.expect_token(&Token::ParenClose)?;
                    return Ok(definition);
                }
                other => return Err(parse_err(format!("unknown builder step `{other}`"))),
            }
            cursor.expect_token(&Token::ParenClose)?;
        }
        Err(parse_err(format!("builder in `{}` is not finished with build()", meta.method)))
    }

    /// Parses `vec![a, b, ...]`.
    fn vec_literal(&self, cursor: &mut TokenCursor<'_>, depth: usize) -> Result<Vec<Value>> {
        cursor.expect_keyword("vec")?;
        cursor.expect_token(&Token::Bang)?;
        cursor.expect_token(&Token::BracketOpen)?;
        let mut items = Vec::new();
        while cursor.peek() != Some(&Token::BracketClose) {
            items.push(self.value(cursor, depth)?);
            cursor.skip_optional_comma();
        }
        cursor.expect_token(&Token::BracketClose)?;
        Ok(items)
    }

    fn value(&self, cursor: &mut TokenCursor<'_>, depth: usize) -> Result<Value> {
        match cursor.expect_identifier()? {
            "Value" => {
                cursor.expect_token(&Token::PathSep)?;
                self.value_constructor(cursor, depth)
            }
            "self" => {
                cursor.expect_token(&Token::Dot)?;
                match cursor.expect_identifier()? {
                    "reference" => {
                        cursor.expect_token(&Token::ParenOpen)?;
                        let id = cursor.expect_string()?;
                        cursor.expect_token(&Token::Comma)?;
                        cursor.expect_keyword("ReferencePolicy")?;
                        cursor.expect_token(&Token::PathSep)?;
                        let policy = match cursor.expect_identifier()? {
                            "Exception" => ReferencePolicy::Exception,
                            "Null" => ReferencePolicy::Null,
                            "Ignore" => ReferencePolicy::Ignore,
                            other => return Err(parse_err(format!("unknown policy `{other}`"))),
                        };
                        cursor.expect_token(&Token::ParenClose)?;
                        cursor.expect_token(&Token::Question)?;
                        Ok(Value::service_with_policy(id, policy))
                    }
                    "base" => {
                        cursor.expect_token(&Token::Dot)?;
                        cursor.expect_keyword("expand")?;
                        cursor.expect_token(&Token::ParenOpen)?;
                        let template = cursor.expect_string()?;
                        cursor.expect_token(&Token::ParenClose)?;
                        cursor.expect_token(&Token::Question)?;
                        Ok(Value::from(template))
                    }
                    other => Err(parse_err(format!("unexpected `self.{other}` in value position"))),
                }
            }
            other => Err(parse_err(format!("unexpected `{other}` in value position"))),
        }
    }

    fn value_constructor(&self, cursor: &mut TokenCursor<'_>, depth: usize) -> Result<Value> {
        let variant = cursor.expect_identifier()?;
        if variant == "Null" {
            return Ok(Value::Null);
        }
        cursor.expect_token(&Token::ParenOpen)?;
        let value = match variant {
            "Bool" => Value::Bool(cursor.expect_bool()?),
            "Int" => {
                let text = signed_number(cursor)?;
                Value::Int(text.parse().map_err(|e| parse_err(format!("bad integer `{text}`: {e}")))?)
            }
            "Float" => {
                let text = signed_number(cursor)?;
                Value::Float(text.parse().map_err(|e| parse_err(format!("bad float `{text}`: {e}")))?)
            }
            "from" => match cursor.peek() {
                Some(Token::Str(s)) => {
                    let _ = cursor.advance();
                    Value::from(s.as_str())
                }
                _ => {
                    cursor.expect_keyword("self")?;
                    cursor.expect_token(&Token::Dot)?;
                    let method = cursor.expect_identifier()?;
                    cursor.expect_token(&Token::ParenOpen)?;
                    cursor.expect_token(&Token::ParenClose)?;
                    cursor.expect_token(&Token::Question)?;
                    let meta = self
                        .inlined
                        .get(method)
                        .ok_or_else(|| parse_err(format!("`{method}` is not an inline builder")))?;
                    Value::from(self.definition(meta, depth + 1)?)
                }
            },
            "List" => Value::List(self.vec_literal(cursor, depth)?),
            "map" => {
                cursor.expect_token(&Token::BracketOpen)?;
                let mut entries = BTreeMap::new();
                while cursor.peek() != Some(&Token::BracketClose) {
                    cursor.expect_token(&Token::ParenOpen)?;
                    let key = cursor.expect_string()?.to_owned();
                    cursor.expect_token(&Token::Comma)?;
                    let _ = entries.insert(key, self.value(cursor, depth)?);
                    cursor.expect_token(&Token::ParenClose)?;
                    cursor.skip_optional_comma();
                }
                cursor.expect_token(&Token::BracketClose)?;
                Value::Map(entries)
            }
            other => return Err(parse_err(format!("unknown value constructor `{other}`"))),
        };
        cursor.expect_token(&Token::ParenClose)?;
        Ok(value)
    }
}

fn signed_number(cursor: &mut TokenCursor<'_>) -> Result<String> {
    let negative = cursor.peek() == Some(&Token::Minus);
    if negative {
        let _ = cursor.advance();
    }
    match cursor.advance() {
        Some(Token::Number(digits)) if negative => Ok(format!("-{digits}")),
        Some(Token::Number(digits)) => Ok(digits.clone()),
        Some(token) => Err(parse_err(format!("expected number, found {token:?}"))),
        None => Err(parse_err("expected number, found end of input".into())),
    }
}

/// Skips the guard of a `call_when` up to and including the comma that
/// ends it.
fn skip_condition(cursor: &mut TokenCursor<'_>) -> Result<()> {
    let mut depth = 0_usize;
    loop {
        match cursor.advance() {
            Some(Token::ParenOpen | Token::BracketOpen | Token::BraceOpen) => depth += 1,
            Some(Token::ParenClose | Token::BracketClose | Token::BraceClose) => {
                depth = depth.saturating_sub(1);
            }
            Some(Token::Comma) if depth == 0 => return Ok(()),
            Some(_) => {}
            None => return Err(parse_err("unterminated call_when guard".into())),
        }
    }
}

/// Reads generated container source back into a resolved graph.
///
/// # Errors
///
/// Returns [`WireupError::Parse`] if the source does not have the layout
/// the source exporter produces, or a graph invariant error.
pub fn read_source(input: &str) -> Result<ResolvedGraph> {
    let tokens = tokenize(input)?;
    SourceReader::scan(&tokens)?.into_graph()
}
