//! Structural parser for PHP class files.
//!
//! Builds a [`SourceUnit`] whose nodes carry stable ids, plus the span table
//! the printer uses to splice untouched nodes back verbatim. Only the shape
//! of the file is understood (namespace, imports, one class-like container and
//! its constants, properties and methods); expressions and statements stay
//! opaque text.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::*;
use crate::error::{ForgeError, Result};
use crate::lexer::{tokenize, Token, TokenKind};

/// The pristine parse of a file. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct OriginalTree {
    pub(crate) source: String,
    pub(crate) unit: SourceUnit,
    pub(crate) spans: HashMap<NodeId, OriginalSpan>,
    /// Region between the open tag and the close tag (or end of file).
    pub(crate) body: Option<Span>,
    pub(crate) container: Option<ContainerLayout>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ContainerLayout {
    pub id: NodeId,
    /// Offset just past the body's `{`.
    pub open_end: usize,
    /// Offset of the body's `}`.
    pub close_start: usize,
}

/// A class-body declaration as read from the token stream. `end` is the
/// index of its last token.
struct ParsedDecl {
    name: String,
    grouped: Vec<String>,
    payload: Payload,
    end: usize,
}

impl ParsedDecl {
    fn single(name: String, payload: Payload, end: usize) -> Self {
        Self {
            name,
            grouped: Vec::new(),
            payload,
            end,
        }
    }
}

impl OriginalTree {
    /// The tree of a file that does not exist yet.
    pub fn empty() -> Self {
        Self {
            source: String::new(),
            unit: SourceUnit::new(),
            spans: HashMap::new(),
            body: None,
            container: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }

    pub fn span_of(&self, id: NodeId) -> Option<OriginalSpan> {
        self.spans.get(&id).copied()
    }

    /// Original text of an untouched node.
    pub fn text_of(&self, id: NodeId) -> Option<&str> {
        self.span_of(id)
            .map(|span| &self.source[span.start..span.end])
    }

    /// Identity-preserving clone of the pristine tree, ready for mutation.
    pub fn working_copy(&self) -> SourceUnit {
        self.unit.clone()
    }
}

pub fn parse(source: &str) -> Result<OriginalTree> {
    if source.trim().is_empty() {
        let mut tree = OriginalTree::empty();
        tree.source = source.to_string();
        return Ok(tree);
    }

    let tokens = tokenize(source)?;
    let open = tokens
        .iter()
        .position(|t| t.kind == TokenKind::OpenTag)
        .ok_or_else(|| ForgeError::Structural("file has no `<?php` open tag".to_string()))?;

    let mut parser = Parser {
        source,
        tokens: &tokens,
        pos: open + 1,
        unit: SourceUnit::new(),
        spans: HashMap::new(),
        container: None,
    };
    let body_start = tokens[open].span.end;
    let body_end = parser.parse_items()?;

    debug!(
        "Parsed {} top-level items (container: {})",
        parser.unit.items.len(),
        parser.container.is_some()
    );

    Ok(OriginalTree {
        source: source.to_string(),
        unit: parser.unit,
        spans: parser.spans,
        body: Some(Span::new(body_start, body_end)),
        container: parser.container,
    })
}

const MEMBER_MODIFIERS: &[&str] = &[
    "public", "protected", "private", "static", "abstract", "final", "var", "readonly",
];
const CONTAINER_MODIFIERS: &[&str] = &["abstract", "final", "readonly"];
const BLOCK_KEYWORDS: &[&str] = &[
    "if", "elseif", "else", "for", "foreach", "while", "switch", "try", "function", "declare",
    "use", "class", "interface", "trait", "enum",
];
const CONTINUATION_KEYWORDS: &[&str] = &["else", "elseif", "catch", "finally"];

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    unit: SourceUnit,
    spans: HashMap<NodeId, OriginalSpan>,
    container: Option<ContainerLayout>,
}

impl<'a> Parser<'a> {
    // ----- token helpers -------------------------------------------------

    fn next_sig(&self, from: usize) -> Option<usize> {
        (from..self.tokens.len()).find(|&i| !self.tokens[i].is_trivia())
    }

    fn text(&self, idx: usize) -> &'a str {
        self.tokens[idx].text(self.source)
    }

    fn word(&self, idx: usize) -> Option<String> {
        let token = self.tokens.get(idx)?;
        (token.kind == TokenKind::Name).then(|| token.text(self.source).to_ascii_lowercase())
    }

    fn is_word(&self, idx: usize, words: &[&str]) -> bool {
        self.word(idx).is_some_and(|w| words.contains(&w.as_str()))
    }

    fn is_punct(&self, idx: usize, c: u8) -> bool {
        self.tokens.get(idx).is_some_and(|t| t.is_punct(c))
    }

    fn eof_error(&self) -> ForgeError {
        ForgeError::parse_at(self.source, self.source.len(), "unexpected end of file")
    }

    fn unexpected(&self, idx: usize, expected: &str) -> ForgeError {
        let token = &self.tokens[idx];
        ForgeError::parse_at(
            self.source,
            token.span.start,
            format!("expected {}, found `{}`", expected, token.text(self.source)),
        )
    }

    /// Next significant token, consumed.
    fn bump(&mut self) -> Result<usize> {
        let idx = self.next_sig(self.pos).ok_or_else(|| self.eof_error())?;
        self.pos = idx + 1;
        Ok(idx)
    }

    fn expect_punct(&mut self, c: u8) -> Result<usize> {
        let idx = self.bump()?;
        if self.is_punct(idx, c) {
            Ok(idx)
        } else {
            Err(self.unexpected(idx, &format!("`{}`", c as char)))
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<usize> {
        let idx = self.bump()?;
        if self.tokens[idx].kind == TokenKind::Name {
            Ok(idx)
        } else {
            Err(self.unexpected(idx, what))
        }
    }

    /// A doc comment separated from `idx` only by whitespace.
    fn leading_doc(&self, idx: usize) -> Option<usize> {
        let mut i = idx;
        while i > 0 {
            i -= 1;
            match self.tokens[i].kind {
                TokenKind::Whitespace => continue,
                TokenKind::DocComment => return Some(i),
                _ => return None,
            }
        }
        None
    }

    /// Skips a balanced `( ... )`, `[ ... ]` or `{ ... }` group starting at
    /// `open`. Returns the index of the closing token.
    fn skip_group(&self, open: usize) -> Result<usize> {
        let mut depth = 0usize;
        for i in open..self.tokens.len() {
            match self.tokens[i].kind {
                TokenKind::Punct(b'(' | b'[' | b'{') => depth += 1,
                TokenKind::Punct(b')' | b']' | b'}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
        }
        Err(self.eof_error())
    }

    /// Finds the last token of the statement starting at `start`.
    ///
    /// Statements end at a `;` on depth zero, or at the `}` closing a block
    /// statement (`if`, `function`, trait `use` adaptations, ...). An unmatched
    /// `}` or a close tag ends the statement before that token.
    fn statement_end(&self, start: usize) -> usize {
        let is_block = self.is_word(start, BLOCK_KEYWORDS);
        let mut depth = 0usize;
        let mut last = start;
        let mut i = start;
        while i < self.tokens.len() {
            let token = self.tokens[i];
            if token.is_trivia() {
                i += 1;
                continue;
            }
            match token.kind {
                TokenKind::CloseTag => return last,
                TokenKind::Punct(b'(' | b'[' | b'{') => depth += 1,
                TokenKind::Punct(b')' | b']' | b'}') => {
                    if depth == 0 {
                        return last;
                    }
                    depth -= 1;
                    if depth == 0 && is_block && token.is_punct(b'}') {
                        match self.next_sig(i + 1) {
                            // `use A\{B, C};`
                            Some(n) if self.is_punct(n, b';') => return n,
                            Some(n) if self.is_word(n, CONTINUATION_KEYWORDS) => {}
                            _ => return i,
                        }
                    }
                }
                TokenKind::Punct(b';') if depth == 0 => return i,
                _ => {}
            }
            last = i;
            i += 1;
        }
        last
    }

    /// Text of tokens `[from, to]`, both inclusive, skipping edge trivia.
    fn slice(&self, from: usize, to: usize) -> &'a str {
        self.source[self.tokens[from].span.start..self.tokens[to].span.end].trim()
    }

    // ----- top level -----------------------------------------------------

    /// Parses top-level items; returns the offset where the PHP body ends.
    fn parse_items(&mut self) -> Result<usize> {
        loop {
            let Some(idx) = self.next_sig(self.pos) else {
                return Ok(self.source.len());
            };
            if self.tokens[idx].kind == TokenKind::CloseTag {
                return Ok(self.tokens[idx].span.start);
            }
            if self.tokens[idx].kind == TokenKind::InlineHtml {
                return Ok(self.tokens[idx].span.start);
            }
            self.parse_item(idx)?;
        }
    }

    fn parse_item(&mut self, idx: usize) -> Result<()> {
        let start = self
            .leading_doc(idx)
            .map(|d| self.tokens[d].span.start)
            .unwrap_or(self.tokens[idx].span.start);

        let word = self.word(idx);
        let (kind, end) = match word.as_deref() {
            Some("namespace") => {
                self.pos = idx + 1;
                let name = self.expect_name("namespace name")?;
                let next = self.bump()?;
                if self.is_punct(next, b'{') {
                    return Err(ForgeError::Structural(
                        "braced namespace blocks are not supported".to_string(),
                    ));
                }
                if !self.is_punct(next, b';') {
                    return Err(self.unexpected(next, "`;`"));
                }
                (ItemKind::Namespace(self.text(name).to_string()), next)
            }
            Some("use") => {
                let end = self.statement_end(idx);
                if end <= idx + 1 || !self.is_punct(end, b';') {
                    return Err(self.unexpected(end, "import path followed by `;`"));
                }
                let path = self.slice(idx + 1, end - 1);
                (ItemKind::Import(Import::new(path)), end)
            }
            _ if self.starts_container(idx) => {
                if self.container.is_some() {
                    return Err(ForgeError::Structural(
                        "file contains more than one class-like declaration".to_string(),
                    ));
                }
                let doc = self.leading_doc(idx).map(|d| doc_lines(self.text(d)));
                let (container, layout, end) = self.parse_container(idx, doc)?;
                self.container = Some(layout);
                (ItemKind::Container(container), end)
            }
            _ => {
                let end = self.statement_end(idx);
                (ItemKind::Verbatim(self.slice(idx, end).to_string()), end)
            }
        };

        let item = self.unit.new_item(kind);
        let id = item.id;
        self.spans
            .insert(id, Span::new(start, self.tokens[end].span.end));
        let slot = self.unit.items.len();
        self.unit.items.push(Item {
            slot: Some(slot),
            ..item
        });
        if let ItemKind::Container(_) = self.unit.items[slot].kind {
            if let Some(layout) = self.container.as_mut() {
                layout.id = id;
            }
        }
        self.pos = end + 1;
        Ok(())
    }

    /// `[#[attr]] [abstract|final|readonly]* (class|interface|trait|enum) Name`
    fn starts_container(&self, idx: usize) -> bool {
        let mut i = Some(idx);
        while let Some(cur) = i {
            if self.is_punct(cur, b'#') && self.is_punct(cur + 1, b'[') {
                i = self.skip_group(cur + 1).ok().and_then(|c| self.next_sig(c + 1));
                continue;
            }
            if self.is_word(cur, CONTAINER_MODIFIERS) {
                i = self.next_sig(cur + 1);
                continue;
            }
            let keyword = self.word(cur);
            let is_keyword = keyword
                .as_deref()
                .and_then(ContainerKind::from_keyword)
                .is_some();
            return is_keyword
                && self
                    .next_sig(cur + 1)
                    .is_some_and(|n| self.tokens[n].kind == TokenKind::Name);
        }
        false
    }

    // ----- container -----------------------------------------------------

    fn parse_container(
        &mut self,
        idx: usize,
        doc_comment: Option<Vec<String>>,
    ) -> Result<(Container, ContainerLayout, usize)> {
        self.pos = idx;
        let mut modifiers = Vec::new();
        let kind = loop {
            let cur = self.bump()?;
            if self.is_punct(cur, b'#') {
                self.pos = self.skip_group(cur + 1)? + 1;
                continue;
            }
            if self.is_word(cur, CONTAINER_MODIFIERS) {
                modifiers.push(self.text(cur).to_ascii_lowercase());
                continue;
            }
            match self.word(cur).as_deref().and_then(ContainerKind::from_keyword) {
                Some(kind) => break kind,
                None => return Err(self.unexpected(cur, "class declaration")),
            }
        };
        let name = self.expect_name("class name")?;
        let name = self.text(name).to_string();

        let mut parent = None;
        let mut implements = Vec::new();
        let open = loop {
            let cur = self.bump()?;
            if self.is_punct(cur, b'{') {
                break cur;
            }
            match self.word(cur).as_deref() {
                Some("extends") => parent = Some(self.name_list()?.join(", ")),
                Some("implements") => implements = self.name_list()?,
                // enum backing type: `enum Suit: string`
                _ if self.is_punct(cur, b':') => {
                    self.expect_name("enum backing type")?;
                }
                _ => return Err(self.unexpected(cur, "`{`")),
            }
        };

        let mut members = Vec::new();
        let close = loop {
            let cur = self.next_sig(self.pos).ok_or_else(|| self.eof_error())?;
            if self.is_punct(cur, b'}') {
                self.pos = cur + 1;
                break cur;
            }
            if self.tokens[cur].kind == TokenKind::CloseTag {
                return Err(self.unexpected(cur, "`}`"));
            }
            let mut member = self.parse_member(cur)?;
            member.slot = Some(members.len());
            members.push(member);
        };

        debug!("Parsed class {} with {} members", name, members.len());

        let container = Container {
            kind,
            name,
            modifiers,
            parent,
            implements,
            doc_comment,
            members,
        };
        let layout = ContainerLayout {
            // Patched by the caller once the item id is known.
            id: NodeId(u32::MAX),
            open_end: self.tokens[open].span.end,
            close_start: self.tokens[close].span.start,
        };
        Ok((container, layout, close))
    }

    /// Comma separated names up to (not including) `{` or `implements`.
    fn name_list(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        loop {
            let name = self.expect_name("type name")?;
            names.push(self.text(name).to_string());
            let next = self.next_sig(self.pos).ok_or_else(|| self.eof_error())?;
            if self.is_punct(next, b',') {
                self.pos = next + 1;
            } else {
                return Ok(names);
            }
        }
    }

    // ----- members -------------------------------------------------------

    fn parse_member(&mut self, idx: usize) -> Result<Member> {
        let doc_idx = self.leading_doc(idx);
        let start = doc_idx
            .map(|d| self.tokens[d].span.start)
            .unwrap_or(self.tokens[idx].span.start);
        let doc_comment = doc_idx.map(|d| doc_lines(self.text(d)));

        self.pos = idx;
        let mut visibility = None;
        let mut is_static = false;
        let mut cur = self.bump()?;
        loop {
            if self.is_punct(cur, b'#') && self.is_punct(cur + 1, b'[') {
                self.pos = self.skip_group(cur + 1)? + 1;
            } else if self.is_word(cur, MEMBER_MODIFIERS) {
                let word = self.text(cur);
                if let Some(v) = Visibility::from_keyword(word) {
                    visibility.get_or_insert(v);
                }
                if word.eq_ignore_ascii_case("static") {
                    is_static = true;
                }
            } else {
                break;
            }
            cur = self.bump()?;
        }

        let parsed = match self.word(cur).as_deref() {
            Some("const") => Some(self.parse_const(cur)?),
            Some("function") => Some(self.parse_method(cur)?),
            Some("use") | Some("case") => None,
            _ if self.is_field_start(cur) => Some(self.parse_field(cur)?),
            _ => None,
        };

        let (kind, end) = match parsed {
            Some(ParsedDecl {
                name,
                grouped,
                payload,
                end,
            }) => (
                MemberKind::Declaration(Declaration {
                    name,
                    visibility,
                    is_static,
                    doc_comment,
                    payload,
                    grouped,
                }),
                end,
            ),
            None => {
                let end = self.statement_end(idx);
                let text = &self.source[start..self.tokens[end].span.end];
                (MemberKind::Verbatim(text.to_string()), end)
            }
        };

        let member = self.unit.new_member(kind);
        self.spans
            .insert(member.id, Span::new(start, self.tokens[end].span.end));
        self.pos = end + 1;
        Ok(member)
    }

    /// A property: optional type tokens followed by a `$variable`.
    fn is_field_start(&self, idx: usize) -> bool {
        let mut i = Some(idx);
        while let Some(cur) = i {
            let token = self.tokens[cur];
            match token.kind {
                TokenKind::Variable => return true,
                TokenKind::Name => {}
                TokenKind::Punct(b'?' | b'|' | b'&' | b'(' | b')') => {}
                _ => return false,
            }
            i = self.next_sig(cur + 1);
        }
        false
    }

    /// `const [type] NAME = value[, NAME = value ...];`
    fn parse_const(&mut self, keyword: usize) -> Result<ParsedDecl> {
        self.pos = keyword + 1;
        let mut name = None;
        let eq = loop {
            let cur = self.bump()?;
            if self.is_punct(cur, b'=') {
                break cur;
            }
            if self.tokens[cur].kind != TokenKind::Name {
                return Err(self.unexpected(cur, "constant name"));
            }
            name = Some(self.text(cur).to_string());
        };
        let name = name.ok_or_else(|| self.unexpected(eq, "constant name"))?;
        let end = self.statement_end(keyword);
        let value_end = self.list_item_end(eq + 1, end);
        let value = Literal::raw(self.slice(eq + 1, value_end));

        let mut grouped = Vec::new();
        let mut cursor = value_end;
        while let Some(comma) = self.list_comma(cursor, end) {
            let next = self.next_sig(comma + 1).filter(|&i| i < end);
            let Some(next) = next.filter(|&i| self.tokens[i].kind == TokenKind::Name) else {
                return Err(self.unexpected(next.unwrap_or(end), "constant name"));
            };
            grouped.push(self.text(next).to_string());
            let eq = self
                .next_sig(next + 1)
                .filter(|&i| self.is_punct(i, b'='))
                .ok_or_else(|| self.unexpected(next, "`=` after constant name"))?;
            cursor = self.list_item_end(eq + 1, end);
        }

        Ok(ParsedDecl {
            name,
            grouped,
            payload: Payload::Constant { value },
            end,
        })
    }

    /// `[type] $name [= default][, $name [= default] ...];`
    fn parse_field(&mut self, first: usize) -> Result<ParsedDecl> {
        let var = (first..self.tokens.len())
            .find(|&i| self.tokens[i].kind == TokenKind::Variable)
            .ok_or_else(|| self.eof_error())?;
        let name = self.text(var).trim_start_matches('$').to_string();
        let end = self.statement_end(first);
        let (default, value_end) = match self.next_sig(var + 1) {
            Some(eq) if self.is_punct(eq, b'=') => {
                let value_end = self.list_item_end(eq + 1, end);
                (Some(Literal::raw(self.slice(eq + 1, value_end))), value_end)
            }
            _ => (None, var),
        };

        let mut grouped = Vec::new();
        let mut cursor = value_end;
        while let Some(comma) = self.list_comma(cursor, end) {
            let next = self.next_sig(comma + 1).filter(|&i| i < end);
            let Some(next) = next.filter(|&i| self.tokens[i].kind == TokenKind::Variable) else {
                return Err(self.unexpected(next.unwrap_or(end), "property name"));
            };
            grouped.push(self.text(next).trim_start_matches('$').to_string());
            cursor = match self.next_sig(next + 1) {
                Some(eq) if self.is_punct(eq, b'=') => self.list_item_end(eq + 1, end),
                _ => next,
            };
        }

        Ok(ParsedDecl {
            name,
            grouped,
            payload: Payload::Field { default },
            end,
        })
    }

    /// The `,` that follows the list entry ending at `last`, if any.
    fn list_comma(&self, last: usize, end: usize) -> Option<usize> {
        self.next_sig(last + 1)
            .filter(|&i| i < end && self.is_punct(i, b','))
    }

    /// Last token of a comma-separated list entry starting at `from`, bounded
    /// by the statement terminator at `end`.
    fn list_item_end(&self, from: usize, end: usize) -> usize {
        let mut depth = 0usize;
        let mut last = from;
        for i in from..end {
            let token = self.tokens[i];
            match token.kind {
                TokenKind::Punct(b'(' | b'[' | b'{') => depth += 1,
                TokenKind::Punct(b')' | b']' | b'}') => depth = depth.saturating_sub(1),
                TokenKind::Punct(b',') if depth == 0 => return last,
                _ => {}
            }
            if !token.is_trivia() {
                last = i;
            }
        }
        last
    }

    /// `function [&]name(params)[: type] { body }` or `...;`
    fn parse_method(&mut self, keyword: usize) -> Result<ParsedDecl> {
        self.pos = keyword + 1;
        let mut name = self.bump()?;
        if self.is_punct(name, b'&') {
            name = self.bump()?;
        }
        if self.tokens[name].kind != TokenKind::Name {
            return Err(self.unexpected(name, "method name"));
        }
        let name = self.text(name).to_string();

        let open = self.expect_punct(b'(')?;
        let close = self.skip_group(open)?;
        let params = self.param_names(open, close);
        self.pos = close + 1;

        // Return type, then either `;` or the body.
        let body_start = loop {
            let cur = self.bump()?;
            if self.is_punct(cur, b';') {
                let payload = Payload::Method {
                    params,
                    body: Vec::new(),
                    has_body: false,
                };
                return Ok(ParsedDecl::single(name, payload, cur));
            }
            if self.is_punct(cur, b'{') {
                break cur;
            }
        };
        let body_end = self.skip_group(body_start)?;
        let body = self.body_statements(body_start + 1, body_end);
        let payload = Payload::Method {
            params,
            body,
            has_body: true,
        };
        Ok(ParsedDecl::single(name, payload, body_end))
    }

    fn param_names(&self, open: usize, close: usize) -> Vec<String> {
        let mut names = Vec::new();
        let mut depth = 0usize;
        let mut seen_in_segment = false;
        for i in open + 1..close {
            match self.tokens[i].kind {
                TokenKind::Punct(b'(' | b'[' | b'{') => depth += 1,
                TokenKind::Punct(b')' | b']' | b'}') => depth = depth.saturating_sub(1),
                TokenKind::Punct(b',') if depth == 0 => seen_in_segment = false,
                TokenKind::Variable if depth == 0 && !seen_in_segment => {
                    names.push(self.text(i).trim_start_matches('$').to_string());
                    seen_in_segment = true;
                }
                _ => {}
            }
        }
        names
    }

    fn body_statements(&self, from: usize, to: usize) -> Vec<Statement> {
        let mut statements = Vec::new();
        let mut cursor = from;
        while let Some(start) = self.next_sig(cursor) {
            if start >= to {
                break;
            }
            let end = self.statement_end(start).min(to - 1).max(start);
            statements.push(Statement(self.slice(start, end).to_string()));
            cursor = end + 1;
        }
        statements
    }
}

/// Lines of a `/** ... */` block without the comment markers.
pub fn doc_lines(comment: &str) -> Vec<String> {
    let inner = comment
        .trim()
        .trim_start_matches("/**")
        .trim_end_matches("*/");
    let mut lines: Vec<String> = inner
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line.strip_prefix('*').unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line).trim_end().to_string()
        })
        .collect();
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}
