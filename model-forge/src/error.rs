use std::path::PathBuf;

use thiserror::Error;

use crate::ast::DeclKind;

/// Every failure the engine can report. All of them are fatal to the current
/// invocation; nothing is written once one of these has been returned.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// The file does not have the shape the engine needs (no container, two
    /// containers, a container with an unexpected name, ...).
    #[error("{0}")]
    Structural(String),

    #[error("cannot add {requested} '{name}': a {existing} with the same name already exists")]
    NameConflict {
        name: String,
        existing: DeclKind,
        requested: DeclKind,
    },

    #[error("cannot resolve the file of class '{0}'")]
    UnresolvedClass(String),

    #[error("invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ForgeError {
    pub(crate) fn parse_at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_column(source, offset);
        ForgeError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ForgeError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;

/// 1-indexed line, 1-indexed column (in chars) of a byte offset.
pub fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column() {
        let source = "<?php\nclass A\n{\n}";
        assert_eq!(line_column(source, 0), (1, 1));
        assert_eq!(line_column(source, 6), (2, 1));
        assert_eq!(line_column(source, 12), (2, 7));
        assert_eq!(line_column(source, 999), (4, 2));
    }

    #[test]
    fn test_name_conflict_message() {
        let err = ForgeError::NameConflict {
            name: "email".to_string(),
            existing: DeclKind::Field,
            requested: DeclKind::Method,
        };
        assert_eq!(
            err.to_string(),
            "cannot add method 'email': a field with the same name already exists"
        );
    }
}
