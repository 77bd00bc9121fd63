//! # Log Directives
//!
//! Builds the logging-configuration variable handed to the launched binary.
//!
//! The value is an optional pre-existing string followed by `target=severity`
//! pairs contributed through the named helpers (`level`, `trace`, `debug`,
//! `info`, `warn`, `error`, `off`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Default variable the directives are exported under
pub const DEFAULT_LOG_ENV: &str = "RUST_LOG";

/// Severity of a directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Off,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Off => "off",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str() == lowered)
            .ok_or_else(|| Error::UnknownSeverity(s.to_string()))
    }
}

/// A single `target=severity` entry, or a bare global severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub target: Option<String>,
    pub severity: Severity,
}

impl Directive {
    pub fn global(severity: Severity) -> Self {
        Self {
            target: None,
            severity,
        }
    }

    pub fn targeted(target: impl Into<String>, severity: Severity) -> Self {
        Self {
            target: Some(target.into()),
            severity,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{}={}", target, self.severity),
            None => write!(f, "{}", self.severity),
        }
    }
}

/// Ordered directive list on top of an optional pre-existing value
///
/// At most one directive is kept per target; pushing a directive for a target
/// that is already present drops the earlier one and appends the new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogDirectives {
    base: Option<String>,
    directives: Vec<Directive>,
}

impl LogDirectives {
    /// Start from an existing value (blank counts as absent)
    pub fn new(base: Option<String>) -> Self {
        let base = base
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());
        Self {
            base,
            directives: Vec::new(),
        }
    }

    /// Start from the current value of `var`
    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).ok())
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_none() && self.directives.is_empty()
    }

    pub fn push(&mut self, directive: Directive) -> &mut Self {
        if let Some(target) = &directive.target {
            if target.trim().is_empty() {
                return self;
            }
        }
        self.directives.retain(|d| d.target != directive.target);
        self.directives.push(directive);
        self
    }

    /// Set the bare global severity
    pub fn level(&mut self, severity: Severity) -> &mut Self {
        self.push(Directive::global(severity))
    }

    /// Add one `target=severity` pair per target
    pub fn with<I, S>(&mut self, severity: Severity, targets: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for target in targets {
            self.push(Directive::targeted(target.as_ref().trim(), severity));
        }
        self
    }

    pub fn trace<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, targets: I) -> &mut Self {
        self.with(Severity::Trace, targets)
    }

    pub fn debug<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, targets: I) -> &mut Self {
        self.with(Severity::Debug, targets)
    }

    pub fn info<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, targets: I) -> &mut Self {
        self.with(Severity::Info, targets)
    }

    pub fn warn<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, targets: I) -> &mut Self {
        self.with(Severity::Warn, targets)
    }

    pub fn error<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, targets: I) -> &mut Self {
        self.with(Severity::Error, targets)
    }

    pub fn off<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, targets: I) -> &mut Self {
        self.with(Severity::Off, targets)
    }

    /// Render as a comma-separated filter string
    pub fn render(&self) -> String {
        self.base
            .iter()
            .cloned()
            .chain(self.directives.iter().map(Directive::to_string))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Check the added directives are something `EnvFilter` accepts
    ///
    /// The base belongs to the launched binary and may use another logger's
    /// syntax (`target=level/regex`), so it is only reported, never rejected.
    pub fn validate(&self) -> Result<()> {
        if let Some(base) = &self.base {
            if let Err(e) = EnvFilter::try_new(base) {
                tracing::warn!(base = %base, "Existing log filter is not tracing syntax: {}", e);
            }
        }

        let added = self
            .directives
            .iter()
            .map(Directive::to_string)
            .collect::<Vec<_>>()
            .join(",");
        if added.is_empty() {
            return Ok(());
        }
        EnvFilter::try_new(&added)
            .map(|_| ())
            .map_err(|e| Error::InvalidFilter {
                filter: added.clone(),
                message: e.to_string(),
            })
    }
}

impl fmt::Display for LogDirectives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
