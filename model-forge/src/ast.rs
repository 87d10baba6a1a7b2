//! Declaration model: the structural tree the engine edits.
//!
//! Nodes are identified by [`NodeId`]. Cloning a tree keeps every id, so a
//! working copy can be compared against the pristine parse by id alone: a node
//! whose id still resolves to an original span is untouched and is printed
//! verbatim. Replacing or creating a node always allocates a fresh id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Byte range into the original file text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// The span of a node as it appeared in the original file. Never mutated.
pub type OriginalSpan = Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn keyword(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "public" | "var" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Declaration kinds in the order they are grouped inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Constant,
    Field,
    Method,
}

impl DeclKind {
    /// Kinds that sort before this one, nearest first.
    pub fn preceding(self) -> &'static [DeclKind] {
        match self {
            DeclKind::Constant => &[],
            DeclKind::Field => &[DeclKind::Constant],
            DeclKind::Method => &[DeclKind::Field, DeclKind::Constant],
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeclKind::Constant => "constant",
            DeclKind::Field => "field",
            DeclKind::Method => "method",
        };
        f.write_str(name)
    }
}

/// A literal payload for constants and field defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Explicit PHP expression, e.g. `{"raw": "['a', 'b']"}`. Parsed payloads
    /// are always raw.
    Raw { raw: String },
    Null,
}

impl Literal {
    pub fn raw(text: impl Into<String>) -> Self {
        Literal::Raw { raw: text.into() }
    }

    pub fn to_php(&self) -> String {
        match self {
            Literal::Bool(b) => b.to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => {
                let s = f.to_string();
                if s.contains(['.', 'e', 'E']) || !f.is_finite() {
                    s
                } else {
                    format!("{}.0", s)
                }
            }
            Literal::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Literal::Raw { raw } => raw.clone(),
            Literal::Null => "null".to_string(),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

/// One opaque method-body statement, e.g. `return $this->name;`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statement(pub String);

impl From<&str> for Statement {
    fn from(s: &str) -> Self {
        Statement(s.to_string())
    }
}

impl From<String> for Statement {
    fn from(s: String) -> Self {
        Statement(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Constant { value: Literal },
    Field { default: Option<Literal> },
    Method {
        params: Vec<String>,
        body: Vec<Statement>,
        /// `false` for abstract and interface methods (`;` instead of a body).
        has_body: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    /// `None` when the declaration carries no visibility keyword.
    pub visibility: Option<Visibility>,
    pub is_static: bool,
    pub doc_comment: Option<Vec<String>>,
    pub payload: Payload,
    /// Further names declared by the same statement, as in
    /// `const A = 1, B = 2;` or `public $a, $b;`. Only the parser sets this.
    pub grouped: Vec<String>,
}

impl Declaration {
    pub fn constant(name: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self {
            name: name.into(),
            visibility: None,
            is_static: false,
            doc_comment: None,
            payload: Payload::Constant {
                value: value.into(),
            },
            grouped: Vec::new(),
        }
    }

    pub fn field(name: impl Into<String>, default: Option<Literal>) -> Self {
        Self {
            name: name.into(),
            visibility: Some(Visibility::Private),
            is_static: false,
            doc_comment: None,
            payload: Payload::Field { default },
            grouped: Vec::new(),
        }
    }

    pub fn method<P, S>(name: impl Into<String>, params: P, body: S) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<Statement>,
    {
        Self {
            name: name.into(),
            visibility: Some(Visibility::Public),
            is_static: false,
            doc_comment: None,
            payload: Payload::Method {
                params: params.into_iter().map(Into::into).collect(),
                body: body.into_iter().map(Into::into).collect(),
                has_body: true,
            },
            grouped: Vec::new(),
        }
    }

    pub fn with_visibility(mut self, visibility: Option<Visibility>) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_doc<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        self.doc_comment = if lines.is_empty() { None } else { Some(lines) };
        self
    }

    pub fn kind(&self) -> DeclKind {
        match self.payload {
            Payload::Constant { .. } => DeclKind::Constant,
            Payload::Field { .. } => DeclKind::Field,
            Payload::Method { .. } => DeclKind::Method,
        }
    }

    /// Identity for upserts: constants are case-sensitive, methods are not
    /// (PHP resolves method names case-insensitively), fields compare without
    /// a leading `$`. Every name of a grouped statement matches.
    pub fn same_name(&self, name: &str) -> bool {
        let theirs = name.trim_start_matches('$');
        self.names().any(|ours| {
            let ours = ours.trim_start_matches('$');
            match self.kind() {
                DeclKind::Method => ours.eq_ignore_ascii_case(theirs),
                _ => ours == theirs,
            }
        })
    }

    /// The declared name followed by the grouped ones.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.grouped.iter().map(String::as_str))
    }

    pub fn is_grouped(&self) -> bool {
        !self.grouped.is_empty()
    }
}

/// A direct child of a container body.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    Declaration(Declaration),
    /// Class-body statements the engine does not model (trait `use`, enum
    /// `case`, ...). Preserved as-is and skipped by kind queries.
    Verbatim(String),
}

#[derive(Debug, Clone)]
pub struct Member {
    pub(crate) id: NodeId,
    /// Position in the pristine member list; survives replacement.
    pub(crate) slot: Option<usize>,
    pub kind: MemberKind,
}

impl Member {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn declaration(&self) -> Option<&Declaration> {
        match &self.kind {
            MemberKind::Declaration(d) => Some(d),
            MemberKind::Verbatim(_) => None,
        }
    }
}

/// Members compare by content; ids and slots are bookkeeping.
impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Class,
    Interface,
    Trait,
    Enum,
}

impl ContainerKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ContainerKind::Class => "class",
            ContainerKind::Interface => "interface",
            ContainerKind::Trait => "trait",
            ContainerKind::Enum => "enum",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "class" => Some(ContainerKind::Class),
            "interface" => Some(ContainerKind::Interface),
            "trait" => Some(ContainerKind::Trait),
            "enum" => Some(ContainerKind::Enum),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub kind: ContainerKind,
    pub name: String,
    /// `abstract`, `final`, `readonly`.
    pub modifiers: Vec<String>,
    pub parent: Option<String>,
    pub implements: Vec<String>,
    pub doc_comment: Option<Vec<String>>,
    pub members: Vec<Member>,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            kind: ContainerKind::Class,
            name: name.into(),
            modifiers: Vec::new(),
            parent: None,
            implements: Vec::new(),
            doc_comment: None,
            members: Vec::new(),
        }
    }

    /// Declarations in order, with their member index.
    pub fn declarations(&self) -> impl Iterator<Item = (usize, &Declaration)> {
        self.members
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.declaration().map(|d| (i, d)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Everything between `use` and `;`, e.g. `App\Models\User as Account`.
    pub path: String,
}

impl Import {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into().trim().trim_start_matches('\\').to_string(),
        }
    }

    /// Whitespace-insensitive comparison key.
    pub fn key(&self) -> String {
        self.path
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_start_matches('\\')
            .to_ascii_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Namespace(String),
    Import(Import),
    Container(Container),
    /// Top-level statements the engine does not model (`declare(...)`, ...).
    Verbatim(String),
}

#[derive(Debug, Clone)]
pub struct Item {
    pub(crate) id: NodeId,
    pub(crate) slot: Option<usize>,
    pub kind: ItemKind,
}

impl Item {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// One file: top-level items in source order, holding at most one container.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub items: Vec<Item>,
    next_id: u32,
}

impl Default for SourceUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceUnit {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_id: 0,
        }
    }

    pub(crate) fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn new_item(&mut self, kind: ItemKind) -> Item {
        Item {
            id: self.alloc_id(),
            slot: None,
            kind,
        }
    }

    pub(crate) fn new_member(&mut self, kind: MemberKind) -> Member {
        Member {
            id: self.alloc_id(),
            slot: None,
            kind,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.items.iter().find_map(|item| match &item.kind {
            ItemKind::Namespace(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.items.iter().filter_map(|item| match &item.kind {
            ItemKind::Import(import) => Some(import),
            _ => None,
        })
    }

    pub fn container_index(&self) -> Option<usize> {
        self.items
            .iter()
            .position(|item| matches!(item.kind, ItemKind::Container(_)))
    }

    pub fn container(&self) -> Option<&Container> {
        self.items.iter().find_map(|item| match &item.kind {
            ItemKind::Container(c) => Some(c),
            _ => None,
        })
    }

    pub fn container_mut(&mut self) -> Option<&mut Container> {
        self.items.iter_mut().find_map(|item| match &mut item.kind {
            ItemKind::Container(c) => Some(c),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_to_php() {
        assert_eq!(Literal::from("it's").to_php(), "'it\\'s'");
        assert_eq!(Literal::from("a\\b").to_php(), "'a\\\\b'");
        assert_eq!(Literal::Integer(42).to_php(), "42");
        assert_eq!(Literal::Float(1.0).to_php(), "1.0");
        assert_eq!(Literal::Float(2.5).to_php(), "2.5");
        assert_eq!(Literal::Bool(false).to_php(), "false");
        assert_eq!(Literal::Null.to_php(), "null");
        assert_eq!(Literal::raw("['a']").to_php(), "['a']");
    }

    #[test]
    fn test_literal_deserializes_untagged() {
        let values: Vec<Literal> =
            serde_json::from_str(r#"["name", 3, 1.5, true, null, {"raw": "[]"}]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Literal::from("name"),
                Literal::Integer(3),
                Literal::Float(1.5),
                Literal::Bool(true),
                Literal::Null,
                Literal::raw("[]"),
            ]
        );
    }

    #[test]
    fn test_kind_order() {
        assert!(DeclKind::Constant < DeclKind::Field);
        assert!(DeclKind::Field < DeclKind::Method);
        assert_eq!(DeclKind::Method.preceding(), &[DeclKind::Field, DeclKind::Constant]);
        assert!(DeclKind::Constant.preceding().is_empty());
    }

    #[test]
    fn test_same_name_rules() {
        let method = Declaration::method("getName", Vec::<String>::new(), Vec::<String>::new());
        assert!(method.same_name("getname"));
        let field = Declaration::field("name", None);
        assert!(field.same_name("$name"));
        assert!(!field.same_name("Name"));
        let constant = Declaration::constant("FIELD_NAME", "name");
        assert!(!constant.same_name("field_name"));
    }

    #[test]
    fn test_member_equality_ignores_ids() {
        let mut unit = SourceUnit::new();
        let a = unit.new_member(MemberKind::Verbatim("use Foo;".to_string()));
        let b = unit.new_member(MemberKind::Verbatim("use Foo;".to_string()));
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn test_import_key() {
        assert_eq!(Import::new("\\App\\Models\\User").key(), "app\\models\\user");
        assert_eq!(
            Import::new("App\\X  as   Y").key(),
            Import::new("app\\x as y").key()
        );
    }
}
