use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::ast::*;
use crate::error::{line_column, ForgeError, Result};
use crate::locator::{by_kind_and_name, find_cross_kind, find_first, insertion_index};
use crate::naming::{getter_name, setter_name};
use crate::operations::{InspectResult, MemberLocation, Operation};
use crate::parser::{parse, OriginalTree};
use crate::printer::{self, render_declaration};

/// What an upsert did to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted { index: usize },
    Replaced { index: usize },
    /// A declaration with the same name already renders to the requested text.
    Unchanged { index: usize },
}

impl UpsertOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged { .. })
    }

    pub fn index(&self) -> usize {
        match *self {
            UpsertOutcome::Inserted { index }
            | UpsertOutcome::Replaced { index }
            | UpsertOutcome::Unchanged { index } => index,
        }
    }
}

/// Edits one PHP class file in memory.
///
/// Holds the pristine parse and an identity-preserving working copy. All
/// mutations go to the working copy; [`ClassEditor::render`] splices the two
/// back into text, so nothing the editor did not touch changes.
pub struct ClassEditor {
    path: Option<PathBuf>,
    original: OriginalTree,
    working: SourceUnit,
    indent: String,
}

impl ClassEditor {
    pub fn new(content: &str) -> Result<Self> {
        Ok(Self::from_tree(parse(content)?, None))
    }

    /// Editor for a file that does not exist yet.
    pub fn empty() -> Self {
        Self::from_tree(OriginalTree::empty(), None)
    }

    /// Loads `path`, or starts from an empty unit when the file is missing.
    pub fn from_path(path: &Path) -> Result<Self> {
        let tree = match fs::read_to_string(path) {
            Ok(content) => {
                debug!("Loaded {} ({} bytes)", path.display(), content.len());
                parse(&content)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet, starting empty", path.display());
                OriginalTree::empty()
            }
            Err(err) => return Err(ForgeError::io(path, err)),
        };
        Ok(Self::from_tree(tree, Some(path.to_path_buf())))
    }

    fn from_tree(original: OriginalTree, path: Option<PathBuf>) -> Self {
        let working = original.working_copy();
        let indent = printer::detect_indent(&original);
        Self {
            path,
            original,
            working,
            indent,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn original_source(&self) -> &str {
        self.original.source()
    }

    pub fn original(&self) -> &OriginalTree {
        &self.original
    }

    pub fn unit(&self) -> &SourceUnit {
        &self.working
    }

    pub(crate) fn unit_mut(&mut self) -> &mut SourceUnit {
        &mut self.working
    }

    pub fn container(&self) -> Option<&Container> {
        self.working.container()
    }

    /// Inserts `decl`, or replaces the declaration of the same kind and name.
    ///
    /// New declarations go after the last sibling of their kind, else after
    /// the last declaration of a kind that sorts before theirs, else at the
    /// top of the body. A replacement keeps the position of the node it
    /// replaces.
    pub fn upsert(&mut self, decl: Declaration) -> Result<UpsertOutcome> {
        let id = self.working.alloc_id();
        let container = self.working.container_mut().ok_or_else(|| {
            ForgeError::Structural("no class-like declaration to add members to".to_string())
        })?;
        let kind = decl.kind();

        if let Some((_, existing)) = find_cross_kind(container, kind, &decl.name) {
            return Err(ForgeError::NameConflict {
                name: decl.name.clone(),
                existing: existing.kind(),
                requested: kind,
            });
        }

        if let Some((index, found)) = find_first(container, by_kind_and_name(kind, &decl.name)) {
            if found.is_grouped() {
                return Err(ForgeError::Structural(format!(
                    "{} '{}' shares one statement with other declarations ({}); split it before editing",
                    kind,
                    decl.name,
                    found.names().collect::<Vec<_>>().join(", ")
                )));
            }
            let existing = &container.members[index];
            let same = match self.original.text_of(existing.id) {
                Some(text) => text == render_declaration(&decl, &self.indent),
                None => existing.declaration() == Some(&decl),
            };
            if same {
                debug!("{} '{}' is already up to date at index {}", kind, decl.name, index);
                return Ok(UpsertOutcome::Unchanged { index });
            }
            debug!("Replacing {} '{}' at index {}", kind, decl.name, index);
            let slot = existing.slot;
            container.members[index] = Member {
                id,
                slot,
                kind: MemberKind::Declaration(decl),
            };
            return Ok(UpsertOutcome::Replaced { index });
        }

        let index = insertion_index(container, kind);
        debug!("Inserting {} '{}' at index {}", kind, decl.name, index);
        container.members.insert(
            index,
            Member {
                id,
                slot: None,
                kind: MemberKind::Declaration(decl),
            },
        );
        Ok(UpsertOutcome::Inserted { index })
    }

    /// `getField()` returning the backing field.
    pub fn add_getter(&mut self, field: &str) -> Result<UpsertOutcome> {
        let field = field.trim_start_matches('$');
        let decl = Declaration::method(
            getter_name(field),
            Vec::<String>::new(),
            [format!("return $this->{};", field)],
        );
        self.upsert(decl)
    }

    /// `setField($field)` assigning the backing field and returning `$this`.
    pub fn add_setter(&mut self, field: &str) -> Result<UpsertOutcome> {
        let field = field.trim_start_matches('$');
        let decl = Declaration::method(
            setter_name(field),
            [field],
            [
                format!("$this->{} = ${};", field, field),
                "return $this;".to_string(),
            ],
        );
        self.upsert(decl)
    }

    /// Adds `use <path>;` unless an equivalent import exists. Returns whether
    /// the unit changed.
    pub fn add_import(&mut self, path: &str) -> Result<bool> {
        let import = Import::new(path);
        if import.path.is_empty() {
            return Err(ForgeError::Structural("empty import path".to_string()));
        }
        let key = import.key();
        if self.working.imports().any(|existing| existing.key() == key) {
            return Ok(false);
        }

        let items = &self.working.items;
        let index = items
            .iter()
            .rposition(|item| matches!(item.kind, ItemKind::Import(_)))
            .or_else(|| {
                items
                    .iter()
                    .position(|item| matches!(item.kind, ItemKind::Namespace(_)))
            })
            .map(|i| i + 1)
            .or_else(|| self.working.container_index())
            .unwrap_or(items.len());

        debug!("Adding import '{}' at item {}", import.path, index);
        let item = self.working.new_item(ItemKind::Import(import));
        self.working.items.insert(index, item);
        Ok(true)
    }

    /// Applies one request. Returns whether the unit changed.
    pub fn apply_operation(&mut self, op: &Operation) -> Result<bool> {
        match op {
            Operation::AddConstant(op) => Ok(self.upsert(op.declaration())?.changed()),
            Operation::AddField(op) => Ok(self.upsert(op.declaration())?.changed()),
            Operation::AddMethod(op) => Ok(self.upsert(op.declaration())?.changed()),
            Operation::AddGetter(op) => Ok(self.add_getter(&op.field)?.changed()),
            Operation::AddSetter(op) => Ok(self.add_setter(&op.field)?.changed()),
            Operation::AddImport(op) => self.add_import(&op.path),
        }
    }

    /// Declarations of the parsed file with the line and column of their
    /// first keyword (after any doc comment). Every name of a grouped
    /// statement is listed at the statement's position.
    pub fn inspect(&self, file_path: &str) -> InspectResult {
        let source = self.original.source();
        let unit = self.original.unit();
        let container = unit.container();
        let members = container
            .map(|c| c.members.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|member| {
                let decl = member.declaration()?;
                let span = self.original.span_of(member.id)?;
                let text = &source[span.start..span.end];
                let skip = match decl.doc_comment {
                    Some(_) => text.find("*/").map(|i| i + 2).unwrap_or(0),
                    None => 0,
                };
                let keyword = skip + (text[skip..].len() - text[skip..].trim_start().len());
                let (line, column) = line_column(source, span.start + keyword);
                Some(decl.names().map(move |name| MemberLocation {
                    kind: decl.kind(),
                    name: name.to_string(),
                    line,
                    column,
                }))
            })
            .flatten()
            .collect();

        InspectResult {
            file_path: file_path.to_string(),
            namespace: unit.namespace().map(str::to_string),
            class: container.map(|c| c.name.clone()),
            parent: container.and_then(|c| c.parent.clone()),
            members,
        }
    }

    pub fn render(&self) -> String {
        printer::render(&self.original, &self.working)
    }

    /// Whether rendering would produce different text than the file had.
    pub fn is_modified(&self) -> bool {
        self.render() != self.original.source()
    }

    /// Renders and writes to the path the editor was loaded from.
    pub fn save(&self) -> Result<()> {
        let path = self.path.as_deref().ok_or_else(|| {
            ForgeError::Structural("editor has no file path to save to".to_string())
        })?;
        write_atomic(path, &self.render())
    }
}

impl fmt::Display for ClassEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Writes `content` to a sibling temp file, syncs it and renames it over
/// `path`. Missing parent directories are created.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ForgeError::io(parent, e))?;
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!("{}.tmp", file_name));

    let mut file = fs::File::create(&temp_path).map_err(|e| ForgeError::io(&temp_path, e))?;
    file.write_all(content.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| ForgeError::io(&temp_path, e))?;
    drop(file);
    fs::rename(&temp_path, path).map_err(|e| ForgeError::io(path, e))?;

    info!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const POST: &str = "<?php\n\nnamespace App\\Models;\n\nclass Post\n{\n    const FIELD_TITLE = 'title';\n\n    public function getTitle()\n    {\n        return $this->title;\n    }\n}\n";

    #[test]
    fn test_upsert_outcomes() {
        let mut editor = ClassEditor::new(POST).unwrap();

        let outcome = editor
            .upsert(Declaration::constant("FIELD_TITLE", "title"))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged { index: 0 });

        let outcome = editor
            .upsert(Declaration::constant("FIELD_BODY", "body"))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted { index: 1 });

        let outcome = editor.upsert(Declaration::field("title", None)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted { index: 2 });

        let outcome = editor
            .upsert(Declaration::constant("FIELD_BODY", "content"))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Replaced { index: 1 });
    }

    #[test]
    fn test_unchanged_getter_keeps_file_identical() {
        let mut editor = ClassEditor::new(POST).unwrap();
        let outcome = editor.add_getter("title").unwrap();
        assert!(!outcome.changed());
        assert!(!editor.is_modified());
        assert_eq!(editor.render(), POST);
    }

    #[test]
    fn test_cross_kind_conflict() {
        let mut editor = ClassEditor::new(POST).unwrap();
        let err = editor
            .upsert(Declaration::method(
                "FIELD_TITLE",
                Vec::<String>::new(),
                Vec::<String>::new(),
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            ForgeError::NameConflict {
                existing: DeclKind::Constant,
                requested: DeclKind::Method,
                ..
            }
        ));
    }

    #[test]
    fn test_upsert_without_container_fails() {
        let mut editor = ClassEditor::new("<?php\n\nfunction helper() {}\n").unwrap();
        let err = editor
            .upsert(Declaration::constant("X", "x"))
            .unwrap_err();
        assert!(matches!(err, ForgeError::Structural(_)));
    }

    #[test]
    fn test_add_import_positions() {
        let mut editor = ClassEditor::new(POST).unwrap();
        assert!(editor.add_import("Illuminate\\Database\\Eloquent\\Model").unwrap());
        assert!(!editor.add_import("\\Illuminate\\Database\\Eloquent\\Model").unwrap());
        assert!(editor.add_import("App\\Contracts\\HasTitle").unwrap());
        assert_eq!(
            editor.render(),
            "<?php\n\nnamespace App\\Models;\n\nuse Illuminate\\Database\\Eloquent\\Model;\nuse App\\Contracts\\HasTitle;\n\nclass Post\n{\n    const FIELD_TITLE = 'title';\n\n    public function getTitle()\n    {\n        return $this->title;\n    }\n}\n"
        );
    }

    #[test]
    fn test_apply_operation() {
        let mut editor = ClassEditor::new(POST).unwrap();
        let op: Operation =
            serde_json::from_str(r#"{"type": "AddSetter", "field": "title"}"#).unwrap();
        assert!(editor.apply_operation(&op).unwrap());
        assert!(!editor.apply_operation(&op).unwrap());
        let rendered = editor.to_string();
        assert!(rendered.contains(
            "    public function setTitle($title)\n    {\n        $this->title = $title;\n        return $this;\n    }\n}\n"
        ));
    }

    #[test]
    fn test_inspect_reports_keyword_positions() {
        let source = "<?php\nclass Post extends Model\n{\n    /**\n     * Title.\n     */\n    const FIELD_TITLE = 'title';\n\n    private $title;\n}\n";
        let result = ClassEditor::new(source).unwrap().inspect("Post.php");
        assert_eq!(result.class.as_deref(), Some("Post"));
        assert_eq!(result.parent.as_deref(), Some("Model"));
        let positions: Vec<_> = result
            .members
            .iter()
            .map(|m| (m.kind, m.name.as_str(), m.line, m.column))
            .collect();
        assert_eq!(
            positions,
            vec![
                (DeclKind::Constant, "FIELD_TITLE", 7, 5),
                (DeclKind::Field, "title", 9, 5),
            ]
        );
    }

    #[test]
    fn test_write_atomic_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app/Models/Post.php");
        write_atomic(&path, POST).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), POST);
        assert!(!dir.path().join("app/Models/Post.php.tmp").exists());
    }

    #[test]
    fn test_from_missing_path_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let editor = ClassEditor::from_path(&dir.path().join("Nope.php")).unwrap();
        assert!(editor.unit().items.is_empty());
        assert_eq!(editor.original_source(), "");
    }
}
