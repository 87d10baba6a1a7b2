//! Format-preserving printer.
//!
//! Walks the working tree and, for every node, either splices the original
//! bytes (the node's id still maps to an original span) or pretty-prints it
//! with the default PSR-2 layout. Separators between two entries that were
//! neighbours in the original file are copied from the original text, so
//! comments and odd spacing between untouched nodes survive. Inside the
//! container body, whitespace-only gaps between declarations are normalized
//! to exactly one blank line.

use std::borrow::Cow;

use crate::ast::*;
use crate::parser::{ContainerLayout, OriginalTree};

pub const DEFAULT_INDENT: &str = "    ";

/// Renders `working` against the pristine tree it was cloned from.
pub fn render(original: &OriginalTree, working: &SourceUnit) -> String {
    let Some(body) = original.body else {
        return render_new(working);
    };
    let source = original.source();
    let mut out = String::with_capacity(source.len() + 256);
    out.push_str(&source[..body.start]);
    render_items(original, body, working, &mut out);
    out.push_str(&source[body.end..]);
    out
}

/// Rendering of a unit that has no file behind it yet.
pub fn render_new(working: &SourceUnit) -> String {
    let mut out = String::from("<?php\n");
    for (j, item) in working.items.iter().enumerate() {
        out.push_str(if j == 0 {
            "\n"
        } else {
            default_item_separator(&working.items[j - 1], item)
        });
        out.push_str(&render_item(item, DEFAULT_INDENT));
    }
    if !working.items.is_empty() {
        out.push('\n');
    }
    out
}

/// Indentation of the first original member, or four spaces.
pub fn detect_indent(original: &OriginalTree) -> String {
    let (Some(layout), Some(container)) = (original.container, original.unit().container())
    else {
        return DEFAULT_INDENT.to_string();
    };
    let first = container
        .members
        .first()
        .and_then(|m| original.span_of(m.id()));
    match first {
        Some(span) => {
            let gap = &original.source()[layout.open_end..span.start];
            match gap.rfind('\n') {
                Some(i) if is_indentation(&gap[i + 1..]) => gap[i + 1..].to_string(),
                _ => DEFAULT_INDENT.to_string(),
            }
        }
        None => DEFAULT_INDENT.to_string(),
    }
}

// ----- separators --------------------------------------------------------

fn is_indentation(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b == b' ' || b == b'\t')
}

fn has_content(gap: &str) -> bool {
    !gap.trim().is_empty()
}

/// Splits a gap into the comment that trails the previous entry on its own
/// line and everything after it.
fn split_gap(gap: &str) -> (&str, &str) {
    match gap.find('\n') {
        Some(i) if has_content(&gap[..i]) => gap.split_at(i),
        None if has_content(gap) => (gap, ""),
        _ => ("", gap),
    }
}

/// Text after the last line break of a gap, if it is pure indentation.
fn trailing_indent(gap: &str) -> Option<&str> {
    gap.rfind('\n')
        .map(|i| &gap[i + 1..])
        .filter(|s| s.is_empty() || is_indentation(s))
}

/// A whitespace-only gap between two declarations becomes one blank line.
fn normalize_blank(gap: &str, indent: &str) -> String {
    let tail = trailing_indent(gap).unwrap_or(indent);
    format!("\n\n{}", tail)
}

fn default_item_separator(prev: &Item, cur: &Item) -> &'static str {
    match (&prev.kind, &cur.kind) {
        (ItemKind::Import(_), ItemKind::Import(_)) => "\n",
        _ => "\n\n",
    }
}

/// Original gaps of a list: `gaps[0]` before the first entry, `gaps[k]`
/// between entries `k - 1` and `k`, `gaps[n]` after the last one.
fn original_gaps<'a>(
    source: &'a str,
    spans: &[OriginalSpan],
    start: usize,
    end: usize,
) -> Vec<&'a str> {
    let mut gaps = Vec::with_capacity(spans.len() + 1);
    let mut cursor = start;
    for span in spans {
        gaps.push(&source[cursor..span.start]);
        cursor = span.end;
    }
    gaps.push(&source[cursor..end]);
    gaps
}

// ----- top level -----------------------------------------------------------

fn render_items(original: &OriginalTree, body: Span, working: &SourceUnit, out: &mut String) {
    let source = original.source();
    let pristine = &original.unit().items;
    if pristine.is_empty() {
        if working.items.is_empty() {
            out.push_str(&source[body.start..body.end]);
            return;
        }
        let header = &source[body.start..body.end];
        if has_content(header) {
            out.push_str(header.trim_end());
        }
        for (j, item) in working.items.iter().enumerate() {
            out.push_str(if j == 0 {
                "\n\n"
            } else {
                default_item_separator(&working.items[j - 1], item)
            });
            out.push_str(&item_text(original, item));
        }
        out.push('\n');
        return;
    }

    let spans: Vec<OriginalSpan> = pristine
        .iter()
        .filter_map(|item| original.span_of(item.id))
        .collect();
    let gaps = original_gaps(source, &spans, body.start, body.end);
    let last_slot = pristine.len() - 1;

    for (j, item) in working.items.iter().enumerate() {
        if j == 0 {
            out.push_str(gaps[0]);
        } else {
            let prev = &working.items[j - 1];
            match (prev.slot, item.slot) {
                (Some(p), Some(c)) if p + 1 == c => out.push_str(gaps[c]),
                _ => {
                    if let Some(p) = prev.slot {
                        out.push_str(split_gap(gaps[p + 1]).0);
                    }
                    let rest = match item.slot {
                        Some(c) if c > 0 => split_gap(gaps[c]).1,
                        _ => "",
                    };
                    if has_content(rest) {
                        out.push_str("\n\n");
                        out.push_str(rest.trim_start());
                    } else {
                        out.push_str(default_item_separator(prev, item));
                    }
                }
            }
        }
        out.push_str(&item_text(original, item));
    }

    match working.items.last().and_then(|item| item.slot) {
        Some(p) if p == last_slot => out.push_str(gaps[p + 1]),
        prev_slot => {
            if let Some(p) = prev_slot {
                out.push_str(split_gap(gaps[p + 1]).0);
            }
            let rest = split_gap(gaps[last_slot + 1]).1;
            if has_content(rest) {
                out.push_str("\n\n");
                out.push_str(rest.trim_start());
            } else {
                out.push('\n');
            }
        }
    }
}

fn item_text<'a>(original: &'a OriginalTree, item: &'a Item) -> Cow<'a, str> {
    if let ItemKind::Container(container) = &item.kind {
        if let Some(layout) = original.container.filter(|l| l.id == item.id) {
            return Cow::Owned(splice_container(original, layout, container));
        }
    }
    match original.text_of(item.id) {
        Some(text) => Cow::Borrowed(text),
        None => Cow::Owned(render_item(item, &detect_indent(original))),
    }
}

fn render_item(item: &Item, indent: &str) -> String {
    match &item.kind {
        ItemKind::Namespace(name) => format!("namespace {};", name),
        ItemKind::Import(import) => format!("use {};", import.path),
        ItemKind::Container(container) => render_container(container, indent),
        ItemKind::Verbatim(text) => text.clone(),
    }
}

// ----- container -----------------------------------------------------------

fn same_header(a: &Container, b: &Container) -> bool {
    a.kind == b.kind
        && a.name == b.name
        && a.modifiers == b.modifiers
        && a.parent == b.parent
        && a.implements == b.implements
        && a.doc_comment == b.doc_comment
}

fn render_header(container: &Container) -> String {
    let mut lines = doc_block(container.doc_comment.as_deref());
    let mut header = String::new();
    for modifier in &container.modifiers {
        header.push_str(modifier);
        header.push(' ');
    }
    header.push_str(container.kind.keyword());
    header.push(' ');
    header.push_str(&container.name);
    if let Some(parent) = &container.parent {
        header.push_str(" extends ");
        header.push_str(parent);
    }
    if !container.implements.is_empty() {
        header.push_str(" implements ");
        header.push_str(&container.implements.join(", "));
    }
    lines.push(header);
    lines.join("\n")
}

/// Default rendering of a whole container at column zero.
pub fn render_container(container: &Container, indent: &str) -> String {
    let mut out = render_header(container);
    out.push_str("\n{");
    for (j, member) in container.members.iter().enumerate() {
        out.push_str(if j == 0 { "\n" } else { "\n\n" });
        out.push_str(indent);
        out.push_str(&render_member(member, indent));
    }
    out.push_str("\n}");
    out
}

fn splice_container(original: &OriginalTree, layout: ContainerLayout, working: &Container) -> String {
    let source = original.source();
    let Some((span, pristine)) = original.span_of(layout.id).zip(original.unit().container())
    else {
        return render_container(working, &detect_indent(original));
    };
    let indent = detect_indent(original);

    let mut out = String::with_capacity(span.end - span.start + 256);
    if same_header(pristine, working) {
        out.push_str(&source[span.start..layout.open_end]);
    } else {
        out.push_str(&render_header(working));
        out.push_str("\n{");
    }

    let body = &source[layout.open_end..layout.close_start];
    if pristine.members.is_empty() {
        if working.members.is_empty() {
            out.push_str(body);
        } else {
            for (j, member) in working.members.iter().enumerate() {
                out.push_str(if j == 0 { "\n" } else { "\n\n" });
                out.push_str(&indent);
                out.push_str(&member_text(original, member, &indent));
            }
            out.push('\n');
            out.push_str(trailing_indent(body).unwrap_or(""));
        }
    } else {
        let spans: Vec<OriginalSpan> = pristine
            .members
            .iter()
            .filter_map(|m| original.span_of(m.id))
            .collect();
        let gaps = original_gaps(source, &spans, layout.open_end, layout.close_start);
        splice_members(original, &working.members, &gaps, &indent, &mut out);
    }

    out.push_str(&source[layout.close_start..span.end]);
    out
}

fn splice_members(
    original: &OriginalTree,
    members: &[Member],
    gaps: &[&str],
    indent: &str,
    out: &mut String,
) {
    let last_slot = gaps.len() - 2;
    let is_decl = |m: &Member| matches!(m.kind, MemberKind::Declaration(_));

    for (j, member) in members.iter().enumerate() {
        if j == 0 {
            if member.slot == Some(0) {
                out.push_str(gaps[0]);
            } else {
                out.push_str(split_gap(gaps[0]).0);
                out.push('\n');
                out.push_str(indent);
            }
        } else {
            let prev = &members[j - 1];
            match (prev.slot, member.slot) {
                (Some(p), Some(c)) if p + 1 == c => {
                    let gap = gaps[c];
                    let (head, rest) = split_gap(gap);
                    if is_decl(prev) && is_decl(member) && !has_content(rest) {
                        out.push_str(head);
                        out.push_str(&normalize_blank(rest, indent));
                    } else {
                        out.push_str(gap);
                    }
                }
                _ => {
                    if let Some(p) = prev.slot {
                        out.push_str(split_gap(gaps[p + 1]).0);
                    }
                    let rest = match member.slot {
                        Some(c) => split_gap(gaps[c]).1,
                        None => "",
                    };
                    out.push_str("\n\n");
                    out.push_str(indent);
                    if has_content(rest) {
                        out.push_str(rest.trim_start());
                    }
                }
            }
        }
        out.push_str(&member_text(original, member, indent));
    }

    let closing = gaps[last_slot + 1];
    match members.last().map(|m| m.slot) {
        Some(Some(p)) if p == last_slot => out.push_str(closing),
        Some(prev_slot) => {
            if let Some(p) = prev_slot {
                out.push_str(split_gap(gaps[p + 1]).0);
            }
            let rest = split_gap(closing).1;
            if has_content(rest) {
                out.push_str("\n\n");
                out.push_str(indent);
                out.push_str(rest.trim_start());
            } else {
                out.push('\n');
                out.push_str(trailing_indent(closing).unwrap_or(""));
            }
        }
        None => {
            out.push_str(split_gap(gaps[0]).0);
            out.push('\n');
            out.push_str(trailing_indent(closing).unwrap_or(""));
        }
    }
}

/// Text of a member as it will appear in the output: original bytes when
/// untouched, default rendering otherwise.
pub(crate) fn member_text<'a>(
    original: &'a OriginalTree,
    member: &'a Member,
    indent: &str,
) -> Cow<'a, str> {
    match original.text_of(member.id) {
        Some(text) => Cow::Borrowed(text),
        None => Cow::Owned(render_member(member, indent)),
    }
}

fn render_member(member: &Member, indent: &str) -> String {
    match &member.kind {
        MemberKind::Declaration(decl) => render_declaration(decl, indent),
        MemberKind::Verbatim(text) => text.clone(),
    }
}

// ----- declarations --------------------------------------------------------

fn doc_block(doc: Option<&[String]>) -> Vec<String> {
    let Some(doc) = doc else {
        return Vec::new();
    };
    let mut lines = Vec::with_capacity(doc.len() + 2);
    lines.push("/**".to_string());
    for line in doc {
        if line.is_empty() {
            lines.push(" *".to_string());
        } else {
            lines.push(format!(" * {}", line));
        }
    }
    lines.push(" */".to_string());
    lines
}

fn modifiers(decl: &Declaration) -> String {
    let mut out = String::new();
    if let Some(visibility) = decl.visibility {
        out.push_str(visibility.keyword());
        out.push(' ');
    }
    if decl.is_static {
        out.push_str("static ");
    }
    out
}

/// Re-bases a statement on `unit`: the first line gets `unit`, continuation
/// lines keep their indentation relative to the statement.
fn statement_lines(statement: &Statement, unit: &str) -> Vec<String> {
    let mut lines = statement.0.lines();
    let Some(first) = lines.next() else {
        return Vec::new();
    };
    let rest: Vec<&str> = lines.collect();
    let common = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out = vec![format!("{}{}", unit, first.trim())];
    for line in rest {
        if line.trim().is_empty() {
            out.push(String::new());
        } else {
            let stripped = line.get(common..).unwrap_or(line.trim_start());
            out.push(format!("{}{}", unit, stripped.trim_end()));
        }
    }
    out
}

/// Default rendering of one declaration. The first line carries no
/// indentation (the separator in front of it does); following lines are
/// indented with `indent`, method bodies one level further.
pub fn render_declaration(decl: &Declaration, indent: &str) -> String {
    let mut lines = doc_block(decl.doc_comment.as_deref());
    let mods = modifiers(decl);
    match &decl.payload {
        Payload::Constant { value } => {
            lines.push(format!("{}const {} = {};", mods, decl.name, value.to_php()));
        }
        Payload::Field { default } => {
            let mods = if mods.is_empty() { "var " } else { mods.as_str() };
            let name = decl.name.trim_start_matches('$');
            lines.push(match default {
                Some(value) => format!("{}${} = {};", mods, name, value.to_php()),
                None => format!("{}${};", mods, name),
            });
        }
        Payload::Method {
            params,
            body,
            has_body,
        } => {
            let params: Vec<String> = params
                .iter()
                .map(|p| {
                    if p.starts_with('$') {
                        p.clone()
                    } else {
                        format!("${}", p)
                    }
                })
                .collect();
            let signature = format!("{}function {}({})", mods, decl.name, params.join(", "));
            if *has_body {
                lines.push(signature);
                lines.push("{".to_string());
                for statement in body {
                    lines.extend(statement_lines(statement, indent));
                }
                lines.push("}".to_string());
            } else {
                lines.push(format!("{};", signature));
            }
        }
    }

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}
