//! Name transforms shared by the accessor templates and the model builder.

/// `user_name` → `UserName`. Segments split on `_`, `-` and whitespace.
pub fn studly(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

pub fn getter_name(field: &str) -> String {
    format!("get{}", studly(field.trim_start_matches('$')))
}

pub fn setter_name(field: &str) -> String {
    format!("set{}", studly(field.trim_start_matches('$')))
}

/// `user_name` → `FIELD_USER_NAME`.
pub fn field_constant(field: &str) -> String {
    format!("FIELD_{}", field.trim_start_matches('$').to_uppercase())
}

/// Last segment of a backslash-qualified name.
pub fn class_basename(fqcn: &str) -> &str {
    let fqcn = fqcn.trim_matches('\\');
    fqcn.rsplit('\\').next().unwrap_or(fqcn)
}

/// Everything before the last segment, if any.
pub fn class_namespace(fqcn: &str) -> Option<&str> {
    let fqcn = fqcn.trim_matches('\\');
    fqcn.rfind('\\').map(|i| &fqcn[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_studly() {
        assert_eq!(studly("user_name"), "UserName");
        assert_eq!(studly("email"), "Email");
        assert_eq!(studly("created-at"), "CreatedAt");
        assert_eq!(studly("alreadyCamel"), "AlreadyCamel");
        assert_eq!(studly("__x__y"), "XY");
        assert_eq!(studly(""), "");
    }

    #[test]
    fn test_accessor_names() {
        assert_eq!(getter_name("user_name"), "getUserName");
        assert_eq!(setter_name("$email"), "setEmail");
        assert_eq!(field_constant("user_name"), "FIELD_USER_NAME");
    }

    #[test]
    fn test_class_name_parts() {
        assert_eq!(class_basename("App\\Models\\User"), "User");
        assert_eq!(class_basename("\\User"), "User");
        assert_eq!(class_namespace("App\\Models\\User"), Some("App\\Models"));
        assert_eq!(class_namespace("User"), None);
    }
}
