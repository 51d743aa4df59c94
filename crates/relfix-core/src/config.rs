//! `relfix.toml` project configuration.
//!
//! Every key is optional:
//!
//! ```toml
//! schema = "prisma/schema.prisma"
//! exclude = ["node_modules", ".next", "generated"]
//! record-names = ["booking", "court", "reservation"]
//! backup-dir = ".relfix-backups"
//!
//! [diagnostics]
//! command = ["npx", "tsc", "--noEmit", "--pretty", "false"]
//! timeout-secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::batch::{
    BackupPolicy, BatchOptions, DEFAULT_BACKUP_SUFFIX, DEFAULT_EXCLUDES, DEFAULT_EXTENSIONS,
};
use crate::classify::{
    ContextRules, DEFAULT_CLIENT_HANDLES, DEFAULT_QUERY_KEYWORDS, DEFAULT_RECORD_NAMES,
};

pub const CONFIG_FILE_NAME: &str = "relfix.toml";

pub const DEFAULT_SCHEMA_PATH: &str = "prisma/schema.prisma";

pub const DEFAULT_CORRECTIONS_PATH: &str = "relation_fixes.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config file {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// Schema file, relative to the project root.
    pub schema: PathBuf,
    pub extensions: Vec<String>,
    /// Directory names skipped while walking sources.
    pub exclude: Vec<String>,
    pub record_names: Vec<String>,
    pub client_handles: Vec<String>,
    pub query_keywords: Vec<String>,
    pub backup_suffix: String,
    /// Keep backups in this directory instead of next to each file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    /// Correction report written by `reconcile` and read by `fix`.
    pub corrections: PathBuf,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: PathBuf::from(DEFAULT_SCHEMA_PATH),
            extensions: strings(DEFAULT_EXTENSIONS),
            exclude: strings(DEFAULT_EXCLUDES),
            record_names: strings(DEFAULT_RECORD_NAMES),
            client_handles: strings(DEFAULT_CLIENT_HANDLES),
            query_keywords: strings(DEFAULT_QUERY_KEYWORDS),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            backup_dir: None,
            corrections: PathBuf::from(DEFAULT_CORRECTIONS_PATH),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

/// How compiler diagnostics are gathered for `reconcile --run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DiagnosticsConfig {
    /// Program and arguments, run from the project root.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Diagnostic codes that carry "did you mean" suggestions.
    pub codes: Vec<String>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            command: strings(&["npx", "tsc", "--noEmit", "--pretty", "false"]),
            timeout_secs: 120,
            codes: strings(&["TS2551", "TS2561"]),
        }
    }
}

impl Config {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Backups must never land on a source file.
    fn validate(&self) -> Result<(), String> {
        if self.backup_suffix.is_empty() {
            return Err("backup-suffix must not be empty".to_string());
        }
        if let Some(dir) = &self.backup_dir {
            if dir.is_relative() && resolves_to_root_or_parent(dir) {
                return Err(format!(
                    "backup-dir {} is the project root or one of its parents",
                    dir.display()
                ));
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load `explicit` if given, else `<root>/relfix.toml` if present, else defaults.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            log::debug!("Using config {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn schema_path(&self, root: &Path) -> PathBuf {
        root.join(&self.schema)
    }

    pub fn corrections_path(&self, root: &Path) -> PathBuf {
        root.join(&self.corrections)
    }

    pub fn context_rules(&self) -> ContextRules {
        ContextRules {
            record_names: self.record_names.iter().cloned().collect(),
            client_handles: self.client_handles.iter().cloned().collect(),
            query_keywords: self.query_keywords.iter().cloned().collect(),
        }
    }

    pub fn backup_policy(&self, root: &Path) -> BackupPolicy {
        match &self.backup_dir {
            Some(dir) => BackupPolicy::Directory {
                dir: root.join(dir),
            },
            None => BackupPolicy::Sibling {
                suffix: self.backup_suffix.clone(),
            },
        }
    }

    /// Batch options for `root` with everything but the run mode taken from the config.
    pub fn batch_options(&self, root: &Path) -> BatchOptions {
        BatchOptions {
            extensions: self.extensions.clone(),
            exclude: self.exclude.clone(),
            backup: self.backup_policy(root),
            ..BatchOptions::new(root)
        }
    }
}

/// True when the relative path `dir` names the directory it is resolved
/// against or an ancestor of it (`.`, `..`, `a/../..`).
fn resolves_to_root_or_parent(dir: &Path) -> bool {
    let mut depth = 0usize;
    for component in dir.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("", Path::new("relfix.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.schema, PathBuf::from("prisma/schema.prisma"));
        assert_eq!(config.diagnostics.timeout_secs, 120);
        assert!(config.context_rules().client_handles.contains("tx"));
    }

    #[test]
    fn overrides_individual_keys() {
        let config = Config::parse(
            r#"
schema = "db/schema.prisma"
record-names = ["reservation"]
backup-dir = ".backups"

[diagnostics]
timeout-secs = 5
"#,
            Path::new("relfix.toml"),
        )
        .unwrap();

        assert_eq!(config.schema, PathBuf::from("db/schema.prisma"));
        assert_eq!(config.record_names, vec!["reservation".to_string()]);
        assert_eq!(config.diagnostics.timeout_secs, 5);
        assert_eq!(config.diagnostics.codes, vec!["TS2551", "TS2561"]);
        assert_eq!(config.exclude, Config::default().exclude);

        let root = Path::new("/project");
        assert_eq!(
            config.backup_policy(root),
            BackupPolicy::Directory {
                dir: PathBuf::from("/project/.backups")
            }
        );
        assert_eq!(config.batch_options(root).root, root);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse("shcema = \"x\"\n", Path::new("relfix.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("relfix.toml"));
    }

    #[test]
    fn backup_settings_that_overlap_sources_are_rejected() {
        for content in [
            "backup-suffix = \"\"\n",
            "backup-dir = \".\"\n",
            "backup-dir = \"\"\n",
            "backup-dir = \"..\"\n",
            "backup-dir = \"backups/../..\"\n",
        ] {
            let err = Config::parse(content, Path::new("relfix.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{content}");
        }

        for content in ["backup-dir = \"../backups\"\n", "backup-suffix = \"~\"\n"] {
            assert!(Config::parse(content, Path::new("relfix.toml")).is_ok(), "{content}");
        }
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::discover(dir.path(), None).unwrap(), Config::default());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "backup-suffix = \".orig\"\n").unwrap();
        let config = Config::discover(dir.path(), None).unwrap();
        assert_eq!(
            config.backup_policy(dir.path()),
            BackupPolicy::Sibling {
                suffix: ".orig".to_string()
            }
        );

        let missing = dir.path().join("other.toml");
        assert!(matches!(
            Config::discover(dir.path(), Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }
}
