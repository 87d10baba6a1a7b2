//! Lossless tokenizer for PHP class files.
//!
//! Every byte of the input belongs to exactly one token, so concatenating the
//! token texts reproduces the file. The parser relies on this to compute the
//! original spans the printer splices back verbatim.

use crate::ast::Span;
use crate::error::{ForgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Text outside `<?php ... ?>`.
    InlineHtml,
    OpenTag,
    CloseTag,
    Whitespace,
    LineComment,
    BlockComment,
    DocComment,
    /// `$name`
    Variable,
    /// Identifiers, keywords and backslash-qualified names.
    Name,
    String,
    Heredoc,
    Number,
    Punct(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }

    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace
                | TokenKind::LineComment
                | TokenKind::BlockComment
                | TokenKind::DocComment
        )
    }

    pub fn is_punct(&self, c: u8) -> bool {
        self.kind == TokenKind::Punct(c)
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'\\' || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit()
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while self.pos < self.bytes.len() {
            self.lex_inline_html();
            while self.pos < self.bytes.len() {
                if self.starts_with("?>") {
                    self.push(TokenKind::CloseTag, self.pos + 2);
                    break;
                }
                self.lex_php_token()?;
            }
        }
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(self.pos, end),
        });
        self.pos = end;
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.bytes[self.pos..].starts_with(pat.as_bytes())
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    /// Consumes text up to and including the next open tag.
    fn lex_inline_html(&mut self) {
        let rest = &self.source[self.pos..];
        let lower = rest.to_ascii_lowercase();
        let found = match (lower.find("<?php"), lower.find("<?=")) {
            (Some(a), Some(b)) if b < a => Some((b, 3)),
            (Some(a), _) => Some((a, 5)),
            (None, Some(b)) => Some((b, 3)),
            (None, None) => None,
        };
        match found {
            Some((offset, len)) => {
                if offset > 0 {
                    self.push(TokenKind::InlineHtml, self.pos + offset);
                }
                self.push(TokenKind::OpenTag, self.pos + len);
            }
            None => self.push(TokenKind::InlineHtml, self.bytes.len()),
        }
    }

    fn lex_php_token(&mut self) -> Result<()> {
        let b = self.bytes[self.pos];
        match b {
            b' ' | b'\t' | b'\n' | b'\r' => {
                let end = self.scan_while(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'));
                self.push(TokenKind::Whitespace, end);
            }
            b'#' if self.peek(1) == Some(b'[') => self.push(TokenKind::Punct(b'#'), self.pos + 1),
            b'#' => self.lex_line_comment(),
            b'/' if self.peek(1) == Some(b'/') => self.lex_line_comment(),
            b'/' if self.peek(1) == Some(b'*') => self.lex_block_comment()?,
            b'$' if self.peek(1).is_some_and(is_name_start) && self.peek(1) != Some(b'\\') => {
                let end = self.scan_from(self.pos + 1, is_name_char);
                self.push(TokenKind::Variable, end);
            }
            b'\'' | b'"' | b'`' => self.lex_quoted(b)?,
            b'<' if self.starts_with("<<<") => self.lex_heredoc()?,
            b if b.is_ascii_digit() => {
                let end = self.scan_while(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.');
                self.push(TokenKind::Number, end);
            }
            b if is_name_start(b) => {
                let end = self.scan_while(is_name_char);
                self.push(TokenKind::Name, end);
            }
            b => self.push(TokenKind::Punct(b), self.pos + 1),
        }
        Ok(())
    }

    fn scan_while(&self, pred: impl Fn(u8) -> bool) -> usize {
        self.scan_from(self.pos, pred)
    }

    fn scan_from(&self, start: usize, pred: impl Fn(u8) -> bool) -> usize {
        let mut end = start;
        while end < self.bytes.len() && pred(self.bytes[end]) {
            end += 1;
        }
        end
    }

    fn lex_line_comment(&mut self) {
        let mut end = self.pos;
        while end < self.bytes.len() {
            if self.bytes[end] == b'\n' || self.bytes[end..].starts_with(b"?>") {
                break;
            }
            end += 1;
        }
        // A trailing \r belongs to the line break, not to the comment.
        if end > self.pos && self.bytes[end - 1] == b'\r' {
            end -= 1;
        }
        self.push(TokenKind::LineComment, end);
    }

    fn lex_block_comment(&mut self) -> Result<()> {
        let is_doc = self.starts_with("/**")
            && self
                .peek(3)
                .is_some_and(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'));
        let close = self.source[self.pos + 2..]
            .find("*/")
            .ok_or_else(|| ForgeError::parse_at(self.source, self.pos, "unterminated comment"))?;
        let end = self.pos + 2 + close + 2;
        let kind = if is_doc {
            TokenKind::DocComment
        } else {
            TokenKind::BlockComment
        };
        self.push(kind, end);
        Ok(())
    }

    fn lex_quoted(&mut self, quote: u8) -> Result<()> {
        let mut end = self.pos + 1;
        while end < self.bytes.len() {
            match self.bytes[end] {
                b'\\' => end += 2,
                b if b == quote => {
                    self.push(TokenKind::String, end + 1);
                    return Ok(());
                }
                _ => end += 1,
            }
        }
        Err(ForgeError::parse_at(
            self.source,
            self.pos,
            "unterminated string literal",
        ))
    }

    fn lex_heredoc(&mut self) -> Result<()> {
        let source = self.source;
        let start = self.pos;
        let mut cursor = self.scan_from(start + 3, |b| b == b' ' || b == b'\t');
        let quote = match self.bytes.get(cursor) {
            Some(&q) if q == b'\'' || q == b'"' => {
                cursor += 1;
                Some(q)
            }
            _ => None,
        };
        let label_end = self.scan_from(cursor, is_name_char);
        if label_end == cursor {
            // `<<<` without a label is just punctuation (e.g. a shift operator typo).
            self.push(TokenKind::Punct(b'<'), start + 1);
            return Ok(());
        }
        let unterminated = || ForgeError::parse_at(source, start, "unterminated heredoc");
        let label = &source[cursor..label_end];
        cursor = label_end;
        if let Some(q) = quote {
            if self.bytes.get(cursor) != Some(&q) {
                return Err(unterminated());
            }
            cursor += 1;
        }

        let mut line_start = source[cursor..]
            .find('\n')
            .map(|i| cursor + i + 1)
            .ok_or_else(unterminated)?;
        loop {
            let line = &source[line_start..];
            let trimmed = line.trim_start_matches([' ', '\t']);
            let indent = line.len() - trimmed.len();
            if trimmed.starts_with(label) {
                let after = line_start + indent + label.len();
                if !self.bytes.get(after).copied().is_some_and(is_name_char) {
                    self.push(TokenKind::Heredoc, after);
                    return Ok(());
                }
            }
            line_start = match line.find('\n') {
                Some(i) => line_start + i + 1,
                None => return Err(unterminated()),
            };
        }
    }
}
