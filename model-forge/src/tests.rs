#[cfg(test)]
mod scenario_tests {
    use crate::ast::*;
    use crate::builder::ContainerSpec;
    use crate::editor::{ClassEditor, UpsertOutcome};
    use crate::error::ForgeError;
    use crate::model::{model_spec, AccessorStyle, ModelField};
    use pretty_assertions::assert_eq;

    fn name_constant() -> Declaration {
        Declaration::constant("FIELD_NAME", "name")
    }

    fn name_getter() -> Declaration {
        Declaration::method("getName", Vec::<String>::new(), ["return $this->name;"])
    }

    #[test]
    fn test_empty_file_constant_then_method() {
        let mut editor = ClassEditor::empty();
        editor
            .ensure_container(&ContainerSpec::for_class("App\\Models\\User"))
            .unwrap();
        editor.upsert(name_constant()).unwrap();
        editor.upsert(name_getter()).unwrap();

        let expected = r#"<?php

namespace App\Models;

class User
{
    const FIELD_NAME = 'name';

    public function getName()
    {
        return $this->name;
    }
}
"#;
        assert_eq!(editor.render(), expected);

        // Same requests again, same editor.
        assert!(!editor.upsert(name_constant()).unwrap().changed());
        assert!(!editor.upsert(name_getter()).unwrap().changed());
        assert_eq!(editor.render(), expected);

        // Same requests again, on the written file.
        let mut editor = ClassEditor::new(expected).unwrap();
        assert_eq!(
            editor.upsert(name_constant()).unwrap(),
            UpsertOutcome::Unchanged { index: 0 }
        );
        assert_eq!(
            editor.upsert(name_getter()).unwrap(),
            UpsertOutcome::Unchanged { index: 1 }
        );
        assert!(!editor.is_modified());
    }

    const CONTACT: &str = r#"<?php

namespace App\Models;

class Contact
{
    public function getName()  { return $this->name; }

    public function getEmail()
    {
        return $this->email;
    }

    // phone accessor
    public function getPhone()
    {
        return   $this->phone;
    }
}
"#;

    #[test]
    fn test_replace_keeps_position_and_neighbours() {
        let mut editor = ClassEditor::new(CONTACT).unwrap();
        let outcome = editor
            .upsert(Declaration::method(
                "getEmail",
                Vec::<String>::new(),
                ["return strtolower($this->email);"],
            ))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Replaced { index: 1 });

        let expected = CONTACT.replace(
            "return $this->email;",
            "return strtolower($this->email);",
        );
        assert_eq!(editor.render(), expected);

        let container = editor.container().unwrap();
        let emails = container
            .declarations()
            .filter(|(_, d)| d.same_name("getemail"))
            .count();
        assert_eq!(emails, 1);
    }

    const LEGACY: &str = "<?php\nclass Legacy {\n\tconst  A='a' ;\n\tfunction   doThing ( $x ,$y ){\n\t\tif ($x) { return $y ; }\n\t}\n}\n";

    #[test]
    fn test_unrelated_method_survives_byte_for_byte() {
        let untouched = "function   doThing ( $x ,$y ){\n\t\tif ($x) { return $y ; }\n\t}";
        assert!(LEGACY.contains(untouched));

        let mut editor = ClassEditor::new(LEGACY).unwrap();
        editor
            .upsert(Declaration::field("count", Some(Literal::Integer(0))))
            .unwrap();
        let output = editor.render();

        assert!(output.contains(untouched));
        assert_eq!(
            output,
            "<?php\nclass Legacy {\n\tconst  A='a' ;\n\n\tprivate $count = 0;\n\n\tfunction   doThing ( $x ,$y ){\n\t\tif ($x) { return $y ; }\n\t}\n}\n"
        );
    }

    #[test]
    fn test_doc_comment_moves_with_its_declaration() {
        let source = "<?php\nclass Post\n{\n    /**\n     * Legacy title.\n     */\n    const FIELD_TITLE = 'title';\n}\n";
        let mut editor = ClassEditor::new(source).unwrap();
        editor
            .upsert(
                Declaration::constant("FIELD_TITLE", "title")
                    .with_doc(["@Column (type='string', not null)"]),
            )
            .unwrap();
        assert_eq!(
            editor.render(),
            "<?php\nclass Post\n{\n    /**\n     * @Column (type='string', not null)\n     */\n    const FIELD_TITLE = 'title';\n}\n"
        );
    }

    #[test]
    fn test_comments_between_members_stay_put() {
        let source = "<?php\nclass Post\n{\n    const FIELD_ID = 'id'; // primary key\n\n    // accessors\n    public function getId()\n    {\n        return $this->id;\n    }\n}\n";
        let mut editor = ClassEditor::new(source).unwrap();
        editor.upsert(Declaration::field("id", None)).unwrap();
        assert_eq!(
            editor.render(),
            "<?php\nclass Post\n{\n    const FIELD_ID = 'id'; // primary key\n\n    private $id;\n\n    // accessors\n    public function getId()\n    {\n        return $this->id;\n    }\n}\n"
        );
    }

    #[test]
    fn test_failed_request_leaves_editor_usable() {
        let mut editor = ClassEditor::new(CONTACT).unwrap();
        let err = editor
            .upsert(Declaration::constant("getName", "x"))
            .unwrap_err();
        assert!(matches!(
            err,
            ForgeError::NameConflict {
                existing: DeclKind::Method,
                requested: DeclKind::Constant,
                ..
            }
        ));
        assert!(!editor.is_modified());
    }

    const GROUPED: &str = "<?php\nclass Post\n{\n    const FIELD_NAME = 'name', OTHER = 2;\n\n    public $a, $b;\n}\n";

    #[test]
    fn test_grouped_statement_is_not_rewritten() {
        let mut editor = ClassEditor::new(GROUPED).unwrap();
        for decl in [
            Declaration::constant("FIELD_NAME", "title"),
            Declaration::constant("OTHER", Literal::Integer(3)),
            Declaration::field("b", Some(Literal::Integer(1))),
            Declaration::field("a", None),
        ] {
            let err = editor.upsert(decl).unwrap_err();
            assert!(matches!(err, ForgeError::Structural(_)), "{err}");
        }
        assert!(!editor.is_modified());
        assert_eq!(editor.container().unwrap().declarations().count(), 2);

        let err = editor
            .upsert(Declaration::method("b", Vec::<String>::new(), ["return 1;"]))
            .unwrap_err();
        assert!(matches!(
            err,
            ForgeError::NameConflict {
                existing: DeclKind::Field,
                requested: DeclKind::Method,
                ..
            }
        ));
        assert!(!editor.is_modified());
    }

    #[test]
    fn test_new_field_goes_after_grouped_statement() {
        let mut editor = ClassEditor::new(GROUPED).unwrap();
        let outcome = editor.upsert(Declaration::field("c", None)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted { index: 2 });
        editor
            .upsert(Declaration::constant("FIELD_BODY", "body"))
            .unwrap();
        assert_eq!(
            editor.render(),
            "<?php\nclass Post\n{\n    const FIELD_NAME = 'name', OTHER = 2;\n\n    const FIELD_BODY = 'body';\n\n    public $a, $b;\n\n    private $c;\n}\n"
        );

        let inspected = ClassEditor::new(GROUPED).unwrap().inspect("Post.php");
        let names: Vec<_> = inspected
            .members
            .iter()
            .map(|m| (m.name.as_str(), m.line))
            .collect();
        assert_eq!(names, vec![("FIELD_NAME", 4), ("OTHER", 4), ("a", 6), ("b", 6)]);
    }

    #[test]
    fn test_comment_only_file_keeps_header() {
        let mut editor = ClassEditor::new("<?php\n// Copyright ACME\n").unwrap();
        editor
            .ensure_container(&ContainerSpec::for_class("App\\User"))
            .unwrap();
        assert_eq!(
            editor.render(),
            "<?php\n// Copyright ACME\n\nnamespace App;\n\nclass User\n{\n}\n"
        );
    }

    #[test]
    fn test_model_field_twice_is_stable() {
        let mut field = ModelField::new("title");
        field.field_type = "varchar".to_string();
        field.length = Some(255);

        let mut editor = ClassEditor::empty();
        editor.ensure_container(&model_spec("App\\Models\\Post")).unwrap();
        for op in field.operations(AccessorStyle::Constant, true) {
            editor.apply_operation(&op).unwrap();
        }
        let first = editor.render();

        let mut editor = ClassEditor::new(&first).unwrap();
        assert!(!editor.ensure_container(&model_spec("App\\Models\\Post")).unwrap());
        for op in field.operations(AccessorStyle::Constant, true) {
            assert!(!editor.apply_operation(&op).unwrap(), "{}", op.describe());
        }
        assert_eq!(editor.render(), first);
    }

    #[test]
    fn test_second_field_extends_each_group() {
        let mut editor = ClassEditor::empty();
        editor.ensure_container(&model_spec("App\\Models\\Post")).unwrap();
        for name in ["title", "body"] {
            for op in ModelField::new(name).operations(AccessorStyle::Constant, true) {
                editor.apply_operation(&op).unwrap();
            }
        }
        let names: Vec<_> = editor
            .container()
            .unwrap()
            .declarations()
            .map(|(_, d)| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["FIELD_TITLE", "FIELD_BODY", "getTitle", "setTitle", "getBody", "setBody"]
        );
    }
}

#[cfg(test)]
mod property_tests {
    use std::collections::BTreeMap;

    use crate::ast::*;
    use crate::editor::ClassEditor;
    use proptest::prelude::*;

    const BASE: &str = r#"<?php

namespace App\Models;

class Account
{
    const FIELD_ID = 'id';

    const FIELD_X = 'x', FIELD_Y = 'y';

    protected $id;

    protected $p, $q = 2;

    public function getId()
    {
        return $this->id;
    }
}
"#;

    const LETTERS: [&str; 4] = ["a", "b", "c", "d"];

    /// (kind, name, variant) triples; the variant changes the payload so a
    /// later request for the same name is a replacement.
    fn requests() -> impl Strategy<Value = Vec<(u8, usize, i64)>> {
        prop::collection::vec((0u8..3, 0usize..LETTERS.len(), 0i64..3), 0..12)
    }

    fn declaration(kind: u8, name: usize, variant: i64) -> Declaration {
        let letter = LETTERS[name];
        match kind {
            0 => Declaration::constant(
                format!("FIELD_{}", letter.to_uppercase()),
                Literal::String(format!("{}{}", letter, variant)),
            ),
            1 => Declaration::field(letter, Some(Literal::Integer(variant))),
            _ => Declaration::method(
                format!("get{}", letter.to_uppercase()),
                Vec::<String>::new(),
                [format!("return $this->{} + {};", letter, variant)],
            ),
        }
    }

    fn start(from_empty: bool) -> ClassEditor {
        if from_empty {
            let mut editor = ClassEditor::empty();
            editor
                .ensure_container(&crate::builder::ContainerSpec::for_class("App\\Models\\Account"))
                .unwrap();
            editor
        } else {
            ClassEditor::new(BASE).unwrap()
        }
    }

    fn kinds(editor: &ClassEditor) -> Vec<DeclKind> {
        editor
            .container()
            .unwrap()
            .declarations()
            .map(|(_, d)| d.kind())
            .collect()
    }

    proptest! {
        #[test]
        fn prop_kinds_stay_grouped(from_empty in any::<bool>(), reqs in requests()) {
            let mut editor = start(from_empty);
            for (kind, name, variant) in reqs {
                editor.upsert(declaration(kind, name, variant)).unwrap();
                let kinds = kinds(&editor);
                let mut sorted = kinds.clone();
                sorted.sort();
                prop_assert_eq!(kinds, sorted);
            }
        }

        #[test]
        fn prop_repeated_upsert_is_a_no_op(from_empty in any::<bool>(), reqs in requests()) {
            let mut editor = start(from_empty);
            for (kind, name, variant) in reqs {
                editor.upsert(declaration(kind, name, variant)).unwrap();
                let rendered = editor.render();
                let count = kinds(&editor).len();

                let again = editor.upsert(declaration(kind, name, variant)).unwrap();
                prop_assert!(!again.changed());
                prop_assert_eq!(kinds(&editor).len(), count);
                prop_assert_eq!(editor.render(), rendered);
            }
        }

        #[test]
        fn prop_written_file_is_a_fixed_point(from_empty in any::<bool>(), reqs in requests()) {
            let mut editor = start(from_empty);
            let mut last = BTreeMap::new();
            for (kind, name, variant) in reqs {
                editor.upsert(declaration(kind, name, variant)).unwrap();
                last.insert((kind, name), variant);
            }
            let rendered = editor.render();

            let mut reparsed = ClassEditor::new(&rendered).unwrap();
            prop_assert_eq!(reparsed.render(), rendered.clone());
            for ((kind, name), variant) in last {
                let outcome = reparsed.upsert(declaration(kind, name, variant)).unwrap();
                prop_assert!(!outcome.changed());
            }
            prop_assert_eq!(reparsed.render(), rendered);
        }
    }
}
