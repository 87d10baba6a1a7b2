use serde::{Deserialize, Deserializer, Serialize};

use crate::ast::{Declaration, DeclKind, Literal, Statement, Visibility};

/// One declaration request. Batch files carry a list of these, tagged by
/// `type` (`{"type": "AddConstant", "name": "FIELD_NAME", "value": "name"}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    AddConstant(AddConstantOp),
    AddField(AddFieldOp),
    AddMethod(AddMethodOp),
    AddGetter(AddAccessorOp),
    AddSetter(AddAccessorOp),
    AddImport(AddImportOp),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddConstantOp {
    pub name: String,
    pub value: Literal,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub doc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddFieldOp {
    pub name: String,
    /// `None` when the key is absent. An explicit `null` is `Some(Literal::Null)`.
    #[serde(
        default,
        deserialize_with = "present_literal",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Literal>,
    #[serde(default = "private")]
    pub visibility: Visibility,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub doc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddMethodOp {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default = "public")]
    pub visibility: Visibility,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub doc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddAccessorOp {
    /// Backing field name, e.g. `user_name` for `getUserName`.
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddImportOp {
    pub path: String,
}

fn private() -> Visibility {
    Visibility::Private
}

fn public() -> Visibility {
    Visibility::Public
}

fn present_literal<'de, D>(deserializer: D) -> Result<Option<Literal>, D::Error>
where
    D: Deserializer<'de>,
{
    Literal::deserialize(deserializer).map(Some)
}

impl AddConstantOp {
    pub fn declaration(&self) -> Declaration {
        Declaration::constant(self.name.clone(), self.value.clone())
            .with_visibility(self.visibility)
            .with_doc(self.doc.iter().cloned())
    }
}

impl AddFieldOp {
    pub fn declaration(&self) -> Declaration {
        Declaration::field(self.name.clone(), self.default.clone())
            .with_visibility(Some(self.visibility))
            .with_static(self.is_static)
            .with_doc(self.doc.iter().cloned())
    }
}

impl AddMethodOp {
    pub fn declaration(&self) -> Declaration {
        Declaration::method(self.name.clone(), self.params.clone(), self.body.clone())
            .with_visibility(Some(self.visibility))
            .with_static(self.is_static)
            .with_doc(self.doc.iter().cloned())
    }
}

impl Operation {
    /// Short label used in summaries, e.g. `method getName`.
    pub fn describe(&self) -> String {
        match self {
            Operation::AddConstant(op) => format!("{} {}", DeclKind::Constant, op.name),
            Operation::AddField(op) => format!("{} {}", DeclKind::Field, op.name),
            Operation::AddMethod(op) => format!("{} {}", DeclKind::Method, op.name),
            Operation::AddGetter(op) => format!("getter for {}", op.field),
            Operation::AddSetter(op) => format!("setter for {}", op.field),
            Operation::AddImport(op) => format!("import {}", op.path),
        }
    }
}

/// A batch file: operations applied in order to one class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSpec {
    /// Fully-qualified class name; `--class` on the command line wins.
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    pub operations: Vec<Operation>,
}

/// Position of a declaration in a file, as reported by `inspect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberLocation {
    pub kind: DeclKind,
    pub name: String,
    pub line: usize,
    pub column: usize,
}

/// Result of inspecting one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectResult {
    pub file_path: String,
    pub namespace: Option<String>,
    pub class: Option<String>,
    pub parent: Option<String>,
    pub members: Vec<MemberLocation>,
}
