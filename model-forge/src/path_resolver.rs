//! Maps fully-qualified PHP class names to file paths.
//!
//! Resolution uses the PSR-4 prefixes a project declares in its
//! `composer.json` (`autoload.psr-4` and `autoload-dev.psr-4`), resolved once
//! per invocation and passed around as a plain value.
//!
//! Example: with `"App\\": "app/"` registered,
//! - `App\Models\User` resolves to `<root>/app/Models/User.php`
//! - `User` (no namespace) resolves to `<root>/User.php`
//! - `Vendor\Thing` fails with [`ForgeError::UnresolvedClass`]

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ForgeError, Result};

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    /// Namespace prefix (with trailing `\`, or empty) and its directory,
    /// relative to `root`.
    prefixes: Vec<(String, PathBuf)>,
}

#[derive(Debug, Default, Deserialize)]
struct ComposerManifest {
    #[serde(default)]
    autoload: Autoload,
    #[serde(default, rename = "autoload-dev")]
    autoload_dev: Autoload,
}

#[derive(Debug, Default, Deserialize)]
struct Autoload {
    #[serde(default, rename = "psr-4")]
    psr4: serde_json::Map<String, Value>,
}

impl PathResolver {
    /// A resolver without any prefixes; only namespace-less names resolve.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefixes: Vec::new(),
        }
    }

    /// Reads `<root>/composer.json`. A missing manifest yields a resolver
    /// without prefixes.
    pub fn from_composer(root: impl Into<PathBuf>) -> Result<Self> {
        let mut resolver = Self::new(root);
        let manifest_path = resolver.root.join("composer.json");
        let content = match fs::read_to_string(&manifest_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No composer.json under {}", resolver.root.display());
                return Ok(resolver);
            }
            Err(err) => return Err(ForgeError::io(manifest_path, err)),
        };

        let manifest: ComposerManifest =
            serde_json::from_str(&content).map_err(|e| ForgeError::Config {
                path: manifest_path.clone(),
                message: e.to_string(),
            })?;

        for (prefix, dirs) in manifest.autoload.psr4.iter().chain(&manifest.autoload_dev.psr4) {
            let dir = match dirs {
                Value::String(dir) => Some(dir.as_str()),
                Value::Array(list) => list.first().and_then(Value::as_str),
                _ => None,
            };
            let dir = dir.ok_or_else(|| ForgeError::Config {
                path: manifest_path.clone(),
                message: format!("psr-4 entry '{}' must be a path or a list of paths", prefix),
            })?;
            resolver = resolver.with_prefix(prefix, dir);
        }
        debug!(
            "Loaded {} psr-4 prefixes from {}",
            resolver.prefixes.len(),
            manifest_path.display()
        );
        Ok(resolver)
    }

    /// Registers a namespace prefix. The first registration of a prefix wins.
    pub fn with_prefix(mut self, prefix: &str, dir: impl Into<PathBuf>) -> Self {
        let prefix = normalize_prefix(prefix);
        if !self.prefixes.iter().any(|(p, _)| *p == prefix) {
            self.prefixes.push((prefix, dir.into()));
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.prefixes.iter().map(|(p, d)| (p.as_str(), d.as_path()))
    }

    /// File path of `fqcn`. The longest registered prefix wins.
    pub fn resolve(&self, fqcn: &str) -> Result<PathBuf> {
        let name = fqcn.trim().trim_start_matches('\\');
        if name.is_empty() {
            return Err(ForgeError::UnresolvedClass(fqcn.to_string()));
        }
        if !name.contains('\\') {
            return Ok(self.root.join(format!("{}.php", name)));
        }

        let (prefix, dir) = self
            .prefixes
            .iter()
            .filter(|(prefix, _)| name.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .ok_or_else(|| ForgeError::UnresolvedClass(fqcn.to_string()))?;

        let mut path = self.root.join(dir);
        for segment in name[prefix.len()..].split('\\') {
            path.push(segment);
        }
        path.set_extension("php");
        debug!("Resolved {} to {}", name, path.display());
        Ok(path)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim().trim_matches('\\');
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{}\\", prefix)
    }
}
