//! # Configuration
//!
//! Layered launcher configuration:
//! built-in defaults < `launch.toml` < `launch.local.toml` (machine-local, untracked).
//!
//! The `[log]` sections compose instead of replacing each other, so a local
//! file can raise a single component to `trace` without restating the project
//! directives.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::directives::{LogDirectives, Severity, DEFAULT_LOG_ENV};
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;

/// Project-level config file name
pub const PROJECT_CONFIG_FILE: &str = "launch.toml";

/// Machine-local override file name, read after the project file
pub const LOCAL_CONFIG_FILE: &str = "launch.local.toml";

// ============================================================================
// File Schema
// ============================================================================

/// One parsed config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub log: LogSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Pipeline>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsSection {
    /// Build tool program
    pub cargo: Option<String>,
    /// Pass `--release` for run and watch
    pub release: Option<bool>,
}

/// Log directives contributed by one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    /// Name of the exported variable
    pub env: Option<String>,
    pub level: Option<Severity>,
    #[serde(default)]
    pub trace: Vec<String>,
    #[serde(default)]
    pub debug: Vec<String>,
    #[serde(default)]
    pub info: Vec<String>,
    #[serde(default)]
    pub warn: Vec<String>,
    #[serde(default)]
    pub error: Vec<String>,
    #[serde(default)]
    pub off: Vec<String>,
}

impl LogSection {
    /// Apply in fixed order: level, then trace through off
    pub fn apply(&self, directives: &mut LogDirectives) {
        if let Some(level) = self.level {
            directives.level(level);
        }
        directives
            .trace(&self.trace)
            .debug(&self.debug)
            .info(&self.info)
            .warn(&self.warn)
            .error(&self.error)
            .off(&self.off);
    }
}

impl ConfigFile {
    /// Parse from TOML text; `path` is only used for error messages
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read a file; `Ok(None)` when it does not exist
    pub fn read_optional(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, path).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::Config {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

// ============================================================================
// Resolved Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Tools {
    pub cargo: String,
    pub release: bool,
}

impl Default for Tools {
    fn default() -> Self {
        let cargo = std::env::var("CARGO")
            .ok()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "cargo".to_string());
        Self {
            cargo,
            release: false,
        }
    }
}

/// Configuration after all layers are merged
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub tools: Tools,
    pub log_env: String,
    /// Log sections in application order (project first, then local)
    pub log_layers: Vec<LogSection>,
    pub pipeline: Pipeline,
    /// Files that were actually read
    pub sources: Vec<PathBuf>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            tools: Tools::default(),
            log_env: DEFAULT_LOG_ENV.to_string(),
            log_layers: Vec::new(),
            pipeline: Pipeline::default(),
            sources: Vec::new(),
        }
    }
}

impl LaunchConfig {
    /// Load `launch.toml` and `launch.local.toml` from `dir`, both optional
    pub fn load(dir: &Path) -> Result<Self> {
        let project = ConfigFile::read_optional(&dir.join(PROJECT_CONFIG_FILE))?;
        let local = ConfigFile::read_optional(&dir.join(LOCAL_CONFIG_FILE))?;

        let mut cfg = Self::default();
        if let Some(file) = project {
            cfg.sources.push(dir.join(PROJECT_CONFIG_FILE));
            cfg.merge(file);
        }
        if let Some(file) = local {
            cfg.sources.push(dir.join(LOCAL_CONFIG_FILE));
            cfg.merge(file);
        }
        tracing::debug!(sources = ?cfg.sources, "Resolved launcher config");
        Ok(cfg)
    }

    /// Load an explicitly named project file (hard error if unreadable),
    /// plus the local override next to it
    pub fn load_explicit(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        let project = ConfigFile::parse(&text, path)?;

        let mut cfg = Self::default();
        cfg.sources.push(path.to_path_buf());
        cfg.merge(project);

        let local_path = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(LOCAL_CONFIG_FILE);
        if let Some(local) = ConfigFile::read_optional(&local_path)? {
            cfg.sources.push(local_path);
            cfg.merge(local);
        }
        tracing::debug!(sources = ?cfg.sources, "Resolved launcher config");
        Ok(cfg)
    }

    /// Layer one file on top of the current state
    pub fn merge(&mut self, file: ConfigFile) {
        if let Some(cargo) = file.tools.cargo.filter(|c| !c.trim().is_empty()) {
            self.tools.cargo = cargo;
        }
        if let Some(release) = file.tools.release {
            self.tools.release = release;
        }
        if let Some(env) = file.log.env.clone().filter(|e| !e.trim().is_empty()) {
            self.log_env = env;
        }
        if let Some(pipeline) = file.pipeline {
            self.pipeline = pipeline;
        }
        self.log_layers.push(file.log);
    }

    /// Pre-existing value of the log variable plus every configured layer
    pub fn directives(&self) -> LogDirectives {
        self.directives_from(std::env::var(&self.log_env).ok())
    }

    /// Same as [`directives`](Self::directives) with an explicit base value
    pub fn directives_from(&self, base: Option<String>) -> LogDirectives {
        let mut directives = LogDirectives::new(base);
        for layer in &self.log_layers {
            layer.apply(&mut directives);
        }
        directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_yield_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = LaunchConfig::load(dir.path()).unwrap();
        assert!(cfg.sources.is_empty());
        assert_eq!(cfg.log_env, "RUST_LOG");
        assert_eq!(cfg.directives_from(None).render(), "");
        assert_eq!(cfg.pipeline, Pipeline::default());
    }

    #[test]
    fn test_section_order_is_fixed() {
        let section = LogSection {
            level: Some(Severity::Info),
            off: vec!["mio".into()],
            debug: vec!["prellblock".into()],
            trace: vec!["balise".into()],
            ..Default::default()
        };
        let mut d = LogDirectives::new(None);
        section.apply(&mut d);
        assert_eq!(d.render(), "info,balise=trace,prellblock=debug,mio=off");
    }

    #[test]
    fn test_local_layer_applies_after_project() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            r#"
[tools]
release = true

[log]
level = "info"
debug = ["prellblock", "balise"]
"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join(LOCAL_CONFIG_FILE),
            r#"
[tools]
cargo = "/opt/cargo"

[log]
trace = ["prellblock"]
"#,
        )
        .unwrap();

        let cfg = LaunchConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.sources.len(), 2);
        assert!(cfg.tools.release);
        assert_eq!(cfg.tools.cargo, "/opt/cargo");
        assert_eq!(
            cfg.directives_from(Some("hyper=warn".into())).render(),
            "hyper=warn,info,balise=debug,prellblock=trace"
        );
    }

    #[test]
    fn test_custom_log_env_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[log]\nenv = \"APP_LOG\"\n",
        )
        .unwrap();
        let cfg = LaunchConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.log_env, "APP_LOG");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE);
        std::fs::write(&path, "[log]\nverbose = true\n").unwrap();
        let err = LaunchConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { path: p, .. } if p == path));
    }

    #[test]
    fn test_bad_severity_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LOCAL_CONFIG_FILE), "[log]\nlevel = \"loud\"\n").unwrap();
        assert!(matches!(
            LaunchConfig::load(dir.path()),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            LaunchConfig::load_explicit(&missing),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_explicit_config_picks_up_sibling_local() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dev.toml");
        std::fs::write(&path, "[log]\nlevel = \"warn\"\n").unwrap();
        std::fs::write(dir.path().join(LOCAL_CONFIG_FILE), "[log]\ndebug = [\"net\"]\n").unwrap();
        let cfg = LaunchConfig::load_explicit(&path).unwrap();
        assert_eq!(cfg.directives_from(None).render(), "warn,net=debug");
    }

    #[test]
    fn test_pipeline_table_replaces_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            r#"
[pipeline]
stages = ["check"]

[[pipeline.jobs]]
name = "check"
stage = "check"
script = ["cargo check"]
"#,
        )
        .unwrap();
        let cfg = LaunchConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.pipeline.stages, vec!["check".to_string()]);
        assert_eq!(cfg.pipeline.jobs.len(), 1);
        assert!(cfg.pipeline.validate().is_ok());
    }
}
