//! ORM model fields expressed as declaration requests.
//!
//! This is the collaborator that decides how a model field is stored: plain
//! mode relies on the generic accessor templates, constant mode names the
//! column with a `FIELD_*` constant and goes through the model's attribute
//! bag.

use serde::{Deserialize, Serialize};

use crate::ast::{Literal, Visibility};
use crate::builder::ContainerSpec;
use crate::naming::{class_basename, field_constant, getter_name, setter_name};
use crate::operations::{AddAccessorOp, AddConstantOp, AddMethodOp, Operation};

/// Base class of generated models.
pub const MODEL_PARENT: &str = "Illuminate\\Database\\Eloquent\\Model";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessorStyle {
    /// `$this->field`
    #[default]
    Property,
    /// `$this->getAttribute(self::FIELD_X)`
    Constant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelField {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub field_type: String,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_type() -> String {
    "string".to_string()
}

impl ModelField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: default_type(),
            length: None,
            nullable: false,
            default: None,
            comment: None,
        }
    }

    /// Doc comment of the field constant: the free-form comment, then
    /// `@Column (type='varchar', length=255, default='x', not null)`.
    pub fn column_doc(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            lines.push(comment.to_string());
        }
        let mut attrs = format!("type='{}'", self.field_type);
        if let Some(length) = self.length.filter(|l| *l > 0) {
            attrs.push_str(&format!(", length={}", length));
        }
        if let Some(default) = self.default.as_deref().filter(|d| !d.is_empty()) {
            attrs.push_str(&format!(", default='{}'", default));
        }
        attrs.push_str(if self.nullable { ", null" } else { ", not null" });
        lines.push(format!("@Column ({})", attrs));
        lines
    }

    /// Requests that add this field to a model class.
    pub fn operations(&self, style: AccessorStyle, accessors: bool) -> Vec<Operation> {
        match style {
            AccessorStyle::Property if !accessors => Vec::new(),
            AccessorStyle::Property => vec![
                Operation::AddGetter(AddAccessorOp {
                    field: self.name.clone(),
                }),
                Operation::AddSetter(AddAccessorOp {
                    field: self.name.clone(),
                }),
            ],
            AccessorStyle::Constant => {
                let constant = field_constant(&self.name);
                let mut ops = vec![Operation::AddConstant(AddConstantOp {
                    name: constant.clone(),
                    value: Literal::String(self.name.clone()),
                    visibility: None,
                    doc: self.column_doc(),
                })];
                if accessors {
                    ops.push(Operation::AddMethod(AddMethodOp {
                        name: getter_name(&self.name),
                        params: Vec::new(),
                        body: vec![format!("return $this->getAttribute(self::{});", constant).into()],
                        visibility: Visibility::Public,
                        is_static: false,
                        doc: Vec::new(),
                    }));
                    ops.push(Operation::AddMethod(AddMethodOp {
                        name: setter_name(&self.name),
                        params: vec![self.name.clone()],
                        body: vec![
                            format!("$this->setAttribute(self::{}, ${});", constant, self.name).into(),
                            "return $this;".into(),
                        ],
                        visibility: Visibility::Public,
                        is_static: false,
                        doc: Vec::new(),
                    }));
                }
                ops
            }
        }
    }
}

/// Container of a model class: extends the ORM base model and imports it.
pub fn model_spec(fqcn: &str) -> ContainerSpec {
    ContainerSpec::for_class(fqcn)
        .with_parent(class_basename(MODEL_PARENT))
        .with_import(MODEL_PARENT)
}
