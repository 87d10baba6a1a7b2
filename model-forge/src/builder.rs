//! Bootstraps the namespace and class wrapper of a file that lacks them.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::{Container, ItemKind};
use crate::editor::ClassEditor;
use crate::error::{ForgeError, Result};
use crate::naming::{class_basename, class_namespace};

/// The class a file is expected to hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
}

impl ContainerSpec {
    /// Splits a fully-qualified name: `App\Models\User` gives class `User`
    /// in namespace `App\Models`.
    pub fn for_class(fqcn: &str) -> Self {
        Self {
            name: class_basename(fqcn).to_string(),
            namespace: class_namespace(fqcn).map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_implements<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implements.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_import(mut self, path: impl Into<String>) -> Self {
        self.imports.push(path.into());
        self
    }
}

fn is_declare(kind: &ItemKind) -> bool {
    matches!(kind, ItemKind::Verbatim(text) if text.trim_start().to_ascii_lowercase().starts_with("declare"))
}

impl ClassEditor {
    /// Makes sure the unit holds the container described by `spec`, creating
    /// the namespace header and the class when they are missing, then adds
    /// the requested imports. Returns whether anything changed.
    pub fn ensure_container(&mut self, spec: &ContainerSpec) -> Result<bool> {
        let mut changed = false;
        let unit = self.unit_mut();

        match unit.container() {
            Some(existing) if existing.name != spec.name => {
                return Err(ForgeError::Structural(format!(
                    "file declares '{}' but '{}' was requested",
                    existing.name, spec.name
                )));
            }
            Some(_) => {
                if let (Some(found), Some(wanted)) = (unit.namespace(), spec.namespace.as_deref()) {
                    if found != wanted {
                        warn!(
                            "Class {} lives in namespace {}, not {}",
                            spec.name, found, wanted
                        );
                    }
                }
            }
            None => {
                let mut container = Container::new(spec.name.clone());
                container.parent = spec.parent.clone();
                container.implements = spec.implements.clone();
                let item = unit.new_item(ItemKind::Container(container));
                unit.items.push(item);
                debug!("Created class {}", spec.name);

                if let (None, Some(namespace)) = (unit.namespace(), spec.namespace.as_deref()) {
                    let index = unit
                        .items
                        .iter()
                        .position(|item| !is_declare(&item.kind))
                        .unwrap_or(unit.items.len());
                    let item = unit.new_item(ItemKind::Namespace(namespace.to_string()));
                    unit.items.insert(index, item);
                    debug!("Created namespace {}", namespace);
                }
                changed = true;
            }
        }

        for import in &spec.imports {
            changed |= self.add_import(import)?;
        }
        Ok(changed)
    }
}
