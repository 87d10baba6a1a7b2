//! Kind- and name-based lookups over a container's direct children.
//!
//! Both queries are linear scans in current member order and skip members the
//! engine does not model. Indices are member indices, usable for splicing.

use crate::ast::{Container, DeclKind, Declaration};

pub fn find_first<F>(container: &Container, pred: F) -> Option<(usize, &Declaration)>
where
    F: Fn(&Declaration) -> bool,
{
    container.declarations().find(|(_, d)| pred(d))
}

pub fn find_last<F>(container: &Container, pred: F) -> Option<(usize, &Declaration)>
where
    F: Fn(&Declaration) -> bool,
{
    container.declarations().filter(|(_, d)| pred(d)).last()
}

pub fn by_kind(kind: DeclKind) -> impl Fn(&Declaration) -> bool {
    move |d| d.kind() == kind
}

pub fn by_kind_and_name(kind: DeclKind, name: &str) -> impl Fn(&Declaration) -> bool + '_ {
    move |d| d.kind() == kind && d.same_name(name)
}

/// A declaration of a different kind that uses `name`.
pub fn find_cross_kind<'a>(
    container: &'a Container,
    kind: DeclKind,
    name: &str,
) -> Option<(usize, &'a Declaration)> {
    let name = name.trim_start_matches('$');
    find_first(container, |d| {
        d.kind() != kind && d.names().any(|n| n.trim_start_matches('$') == name)
    })
}

/// Where a new declaration of `kind` goes when nothing with its name exists:
/// after the last sibling of the same kind, else after the last declaration
/// of a preceding kind (nearest kind first), else at the start of the body.
pub fn insertion_index(container: &Container, kind: DeclKind) -> usize {
    std::iter::once(kind)
        .chain(kind.preceding().iter().copied())
        .find_map(|k| find_last(container, by_kind(k)))
        .map(|(index, _)| index + 1)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{MemberKind, SourceUnit};

    fn container(decls: Vec<Declaration>) -> Container {
        let mut unit = SourceUnit::new();
        let mut container = Container::new("User");
        for decl in decls {
            let member = unit.new_member(MemberKind::Declaration(decl));
            container.members.push(member);
        }
        container
    }

    fn getter(name: &str) -> Declaration {
        Declaration::method(name, Vec::<String>::new(), vec!["return 1;"])
    }

    #[test]
    fn test_empty_container() {
        let c = container(vec![]);
        assert!(find_first(&c, by_kind(DeclKind::Method)).is_none());
        assert!(find_last(&c, by_kind(DeclKind::Method)).is_none());
        assert_eq!(insertion_index(&c, DeclKind::Method), 0);
    }

    #[test]
    fn test_first_and_last() {
        let c = container(vec![
            Declaration::constant("A", "a"),
            getter("getA"),
            getter("getB"),
        ]);
        let (first, decl) = find_first(&c, by_kind(DeclKind::Method)).unwrap();
        assert_eq!((first, decl.name.as_str()), (1, "getA"));
        let (last, decl) = find_last(&c, by_kind(DeclKind::Method)).unwrap();
        assert_eq!((last, decl.name.as_str()), (2, "getB"));
        assert!(find_first(&c, by_kind_and_name(DeclKind::Method, "GETB")).is_some());
        assert!(find_first(&c, by_kind_and_name(DeclKind::Constant, "getB")).is_none());
    }

    #[test]
    fn test_insertion_index_fallbacks() {
        let c = container(vec![
            Declaration::constant("A", "a"),
            Declaration::constant("B", "b"),
            getter("getA"),
        ]);
        // No field yet: after the last constant.
        assert_eq!(insertion_index(&c, DeclKind::Field), 2);
        assert_eq!(insertion_index(&c, DeclKind::Constant), 2);
        assert_eq!(insertion_index(&c, DeclKind::Method), 3);

        let methods_only = container(vec![getter("getA")]);
        assert_eq!(insertion_index(&methods_only, DeclKind::Constant), 0);
        assert_eq!(insertion_index(&methods_only, DeclKind::Field), 0);
    }

    #[test]
    fn test_method_falls_back_to_field_before_constant() {
        let c = container(vec![
            Declaration::constant("A", "a"),
            Declaration::field("a", None),
        ]);
        assert_eq!(insertion_index(&c, DeclKind::Method), 2);
    }

    #[test]
    fn test_verbatim_members_are_skipped() {
        let mut unit = SourceUnit::new();
        let mut c = Container::new("User");
        c.members
            .push(unit.new_member(MemberKind::Verbatim("use HasFactory;".to_string())));
        assert_eq!(insertion_index(&c, DeclKind::Constant), 0);
        c.members.push(
            unit.new_member(MemberKind::Declaration(Declaration::field("a", None))),
        );
        assert_eq!(insertion_index(&c, DeclKind::Method), 2);
    }

    #[test]
    fn test_cross_kind() {
        let c = container(vec![Declaration::field("email", None)]);
        assert!(find_cross_kind(&c, DeclKind::Method, "email").is_some());
        assert!(find_cross_kind(&c, DeclKind::Field, "email").is_none());
    }

    #[test]
    fn test_grouped_names_are_found() {
        let mut grouped = Declaration::field("a", None);
        grouped.grouped = vec!["b".to_string()];
        let c = container(vec![getter("getA"), grouped]);
        let (index, decl) = find_first(&c, by_kind_and_name(DeclKind::Field, "$b")).unwrap();
        assert_eq!((index, decl.name.as_str()), (1, "a"));
        assert!(find_cross_kind(&c, DeclKind::Constant, "b").is_some());
        assert_eq!(insertion_index(&c, DeclKind::Field), 2);
    }
}
