//! # Pipeline Model
//!
//! Declarative CI pipeline: ordered stages, each grouping independent jobs.
//! A job is either a fixed shell command sequence or a builtin check.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};

/// Checks that run in-process instead of through the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Builtin {
    /// Dependency tables in every manifest are sorted
    DependencyOrder,
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Builtin::DependencyOrder => f.write_str("dependency-order"),
        }
    }
}

/// A named CI job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    pub name: String,
    pub stage: String,
    /// Shell commands, run in order, stopping at the first failure
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub script: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin: Option<Builtin>,
    /// Paths the job produces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
}

impl Job {
    pub fn script(name: &str, stage: &str, script: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            stage: stage.to_string(),
            script: script.iter().map(|s| s.to_string()).collect(),
            builtin: None,
            artifacts: Vec::new(),
        }
    }

    pub fn builtin(name: &str, stage: &str, builtin: Builtin) -> Self {
        Self {
            name: name.to_string(),
            stage: stage.to_string(),
            script: Vec::new(),
            builtin: Some(builtin),
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: &[&str]) -> Self {
        self.artifacts = artifacts.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pipeline {
    pub stages: Vec<String>,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Mirrors `.gitlab-ci.yml` job for job; the docs job is `pages` there
/// because the hosted CI only publishes a job with that name.
impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stages: vec!["test".into(), "build".into()],
            jobs: vec![
                Job::script("test", "test", &["cargo test --workspace --all-targets"]),
                Job::script(
                    "clippy",
                    "test",
                    &["cargo clippy --workspace --all-targets -- -D warnings"],
                ),
                Job::script("fmt", "test", &["cargo fmt --all -- --check"]),
                Job::builtin("dependency-order", "test", Builtin::DependencyOrder),
                Job::script("pages", "build", &["cargo doc --workspace --no-deps"])
                    .with_artifacts(&["target/doc"]),
                Job::script("release", "build", &["cargo build --workspace --release"])
                    .with_artifacts(&["target/release"]),
            ],
        }
    }
}

impl Pipeline {
    /// Check structural invariants
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::Pipeline("at least one stage is required".into()));
        }

        let mut stages = HashSet::new();
        for stage in &self.stages {
            if stage.trim().is_empty() {
                return Err(Error::Pipeline("stage names must not be empty".into()));
            }
            if !stages.insert(stage.as_str()) {
                return Err(Error::Pipeline(format!("duplicate stage '{}'", stage)));
            }
        }

        let mut names = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(Error::Pipeline("job names must not be empty".into()));
            }
            if !names.insert(job.name.as_str()) {
                return Err(Error::Pipeline(format!("duplicate job '{}'", job.name)));
            }
            if !stages.contains(job.stage.as_str()) {
                return Err(Error::Pipeline(format!(
                    "job '{}' uses undeclared stage '{}'",
                    job.name, job.stage
                )));
            }
            match (job.script.is_empty(), job.builtin) {
                (true, None) => {
                    return Err(Error::Pipeline(format!(
                        "job '{}' needs a script or a builtin",
                        job.name
                    )))
                }
                (false, Some(_)) => {
                    return Err(Error::Pipeline(format!(
                        "job '{}' cannot have both a script and a builtin",
                        job.name
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Jobs matching any filter by job name or stage name; all jobs when empty
    ///
    /// A declared stage without jobs is a valid filter that selects nothing.
    pub fn select<S: AsRef<str>>(&self, filters: &[S]) -> Result<Vec<&Job>> {
        if filters.is_empty() {
            return Ok(self.jobs.iter().collect());
        }

        for filter in filters {
            let filter = filter.as_ref();
            let known = self.stages.iter().any(|s| s == filter)
                || self.jobs.iter().any(|j| j.name == filter);
            if !known {
                return Err(Error::UnknownSelection(filter.to_string()));
            }
        }

        Ok(self
            .jobs
            .iter()
            .filter(|j| {
                filters
                    .iter()
                    .any(|f| j.name == f.as_ref() || j.stage == f.as_ref())
            })
            .collect())
    }

    /// Group jobs by stage in declared order, dropping empty stages
    pub fn by_stage<'a>(&'a self, jobs: &[&'a Job]) -> Vec<(&'a str, Vec<&'a Job>)> {
        self.stages
            .iter()
            .map(|stage| {
                let members: Vec<&Job> = jobs
                    .iter()
                    .copied()
                    .filter(|j| &j.stage == stage)
                    .collect();
                (stage.as_str(), members)
            })
            .filter(|(_, members)| !members.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_is_valid() {
        let pipeline = Pipeline::default();
        assert!(pipeline.validate().is_ok());
        assert_eq!(pipeline.stages, vec!["test", "build"]);
        let names: Vec<&str> = pipeline.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["test", "clippy", "fmt", "dependency-order", "pages", "release"]
        );
    }

    #[test]
    fn test_validate_rejects_undeclared_stage() {
        let mut pipeline = Pipeline::default();
        pipeline.jobs.push(Job::script("deploy", "ship", &["true"]));
        let err = pipeline.validate().unwrap_err();
        assert!(err.to_string().contains("undeclared stage 'ship'"));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut pipeline = Pipeline::default();
        pipeline.jobs.push(Job::script("fmt", "test", &["true"]));
        assert!(pipeline.validate().is_err());

        let mut pipeline = Pipeline::default();
        pipeline.stages.push("test".into());
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_validate_requires_exactly_one_body() {
        let mut pipeline = Pipeline::default();
        pipeline.jobs.push(Job::script("empty", "test", &[]));
        assert!(pipeline.validate().is_err());

        let mut pipeline = Pipeline::default();
        let mut both = Job::builtin("both", "test", Builtin::DependencyOrder);
        both.script.push("true".into());
        pipeline.jobs.push(both);
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_select_by_stage_and_name() {
        let pipeline = Pipeline::default();

        let all = pipeline.select::<&str>(&[]).unwrap();
        assert_eq!(all.len(), 6);

        let build = pipeline.select(&["build"]).unwrap();
        let names: Vec<&str> = build.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["pages", "release"]);

        let mixed = pipeline.select(&["fmt", "build"]).unwrap();
        assert_eq!(mixed.len(), 3);

        assert!(matches!(
            pipeline.select(&["deploy"]),
            Err(Error::UnknownSelection(s)) if s == "deploy"
        ));
    }

    #[test]
    fn test_select_declared_stage_without_jobs() {
        let mut pipeline = Pipeline::default();
        pipeline.stages.push("deploy".into());
        assert!(pipeline.select(&["deploy"]).unwrap().is_empty());

        let mixed = pipeline.select(&["deploy", "fmt"]).unwrap();
        assert_eq!(mixed.len(), 1);
        assert_eq!(mixed[0].name, "fmt");
    }

    #[test]
    fn test_by_stage_keeps_declared_order() {
        let pipeline = Pipeline::default();
        let selected = pipeline.select(&["release", "fmt"]).unwrap();
        let grouped = pipeline.by_stage(&selected);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "test");
        assert_eq!(grouped[0].1[0].name, "fmt");
        assert_eq!(grouped[1].0, "build");
        assert_eq!(grouped[1].1[0].name, "release");
    }

    #[test]
    fn test_builtin_serialization() {
        let json = serde_json::to_string(&Builtin::DependencyOrder).unwrap();
        assert_eq!(json, "\"dependency-order\"");
    }
}
