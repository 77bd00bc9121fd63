//! # Pipeline Runner
//!
//! Executes pipeline jobs locally.
//!
//! Stages run in declared order and act as barriers: the jobs of one stage run
//! concurrently, and a stage only starts once every job of the previous stage
//! passed. Within a job, script lines run one after another and the first
//! non-zero exit fails the job.

use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tokio::task::JoinSet;

use crate::deps;
use crate::error::{Error, Result};
use crate::pipeline::{Builtin, Job, Pipeline};

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Passed,
    Failed { step: String, code: Option<i32> },
    Skipped,
}

impl JobStatus {
    fn label(&self) -> &'static str {
        match self {
            JobStatus::Passed => "passed",
            JobStatus::Failed { .. } => "FAILED",
            JobStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub name: String,
    pub stage: String,
    #[serde(flatten)]
    pub status: JobStatus,
    pub duration_ms: u64,
    /// Captured stdout/stderr of every step
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

impl JobReport {
    fn skipped(job: &Job) -> Self {
        Self {
            name: job.name.clone(),
            stage: job.stage.clone(),
            status: JobStatus::Skipped,
            duration_ms: 0,
            output: String::new(),
        }
    }

    pub fn failed(&self) -> bool {
        matches!(self.status, JobStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub jobs: Vec<JobReport>,
}

impl PipelineReport {
    pub fn success(&self) -> bool {
        !self.jobs.iter().any(JobReport::failed)
    }

    pub fn get(&self, name: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.name == name)
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for job in &self.jobs {
            write!(
                f,
                "{:<8} {:<8} {:<20} {:>6} ms",
                job.status.label(),
                job.stage,
                job.name,
                job.duration_ms
            )?;
            if let JobStatus::Failed { step, code } = &job.status {
                match code {
                    Some(code) => write!(f, "  (`{}` exited with {})", step, code)?,
                    None => write!(f, "  (`{}` failed)", step)?,
                }
            }
            writeln!(f)?;
        }
        let verdict = if self.success() { "passed" } else { "failed" };
        write!(f, "pipeline {}", verdict)
    }
}

// ============================================================================
// Runner
// ============================================================================

#[derive(Debug, Clone)]
pub struct Runner {
    workdir: PathBuf,
    echo_output: bool,
}

impl Runner {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            echo_output: true,
        }
    }

    /// Print each job's captured output to stdout as the job finishes
    pub fn echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }

    /// Run the jobs matching `filters` (all jobs when empty)
    pub async fn run<S: AsRef<str>>(
        &self,
        pipeline: &Pipeline,
        filters: &[S],
    ) -> Result<PipelineReport> {
        pipeline.validate()?;
        let selected = pipeline.select(filters)?;

        let mut report = PipelineReport::default();
        let mut blocked = false;

        for (stage, jobs) in pipeline.by_stage(&selected) {
            if blocked {
                tracing::warn!(stage = %stage, jobs = jobs.len(), "Skipping stage after failure");
                report.jobs.extend(jobs.iter().map(|j| JobReport::skipped(j)));
                continue;
            }

            tracing::info!(stage = %stage, jobs = jobs.len(), "Starting stage");
            let mut set = JoinSet::new();
            for (index, job) in jobs.iter().enumerate() {
                let job = (*job).clone();
                let workdir = self.workdir.clone();
                let echo = self.echo_output;
                set.spawn(async move {
                    let report = run_job(&job, &workdir).await;
                    if echo {
                        emit(&report);
                    }
                    (index, report)
                });
            }

            let mut finished = Vec::with_capacity(jobs.len());
            while let Some(joined) = set.join_next().await {
                let (index, job_report) =
                    joined.map_err(|e| Error::Pipeline(format!("job task failed: {}", e)))?;
                finished.push((index, job_report));
            }
            finished.sort_by_key(|(index, _)| *index);

            blocked = finished.iter().any(|(_, r)| r.failed());
            report.jobs.extend(finished.into_iter().map(|(_, r)| r));
        }

        Ok(report)
    }
}

async fn run_job(job: &Job, workdir: &Path) -> JobReport {
    let started = Instant::now();
    tracing::info!(job = %job.name, stage = %job.stage, "Running job");

    let (status, output) = match job.builtin {
        Some(builtin) => run_builtin(builtin, workdir).await,
        None => run_script(&job.script, workdir).await,
    };

    if let JobStatus::Failed { step, code } = &status {
        tracing::warn!(job = %job.name, step = %step, code = ?code, "Job failed");
    }

    JobReport {
        name: job.name.clone(),
        stage: job.stage.clone(),
        status,
        duration_ms: started.elapsed().as_millis() as u64,
        output,
    }
}

async fn run_script(script: &[String], workdir: &Path) -> (JobStatus, String) {
    let mut output = String::new();

    for step in script {
        output.push_str(&format!("$ {}\n", step));
        match shell(step).current_dir(workdir).output().await {
            Ok(out) => {
                output.push_str(&String::from_utf8_lossy(&out.stdout));
                output.push_str(&String::from_utf8_lossy(&out.stderr));
                if !out.status.success() {
                    let status = JobStatus::Failed {
                        step: step.clone(),
                        code: out.status.code(),
                    };
                    return (status, output);
                }
            }
            Err(e) => {
                output.push_str(&format!("failed to spawn shell: {}\n", e));
                let status = JobStatus::Failed {
                    step: step.clone(),
                    code: None,
                };
                return (status, output);
            }
        }
    }

    (JobStatus::Passed, output)
}

async fn run_builtin(builtin: Builtin, workdir: &Path) -> (JobStatus, String) {
    let root = workdir.to_path_buf();
    let result = match builtin {
        Builtin::DependencyOrder => {
            tokio::task::spawn_blocking(move || deps::check_workspace(&root)).await
        }
    };

    let failed = |output: String| {
        (
            JobStatus::Failed {
                step: builtin.to_string(),
                code: None,
            },
            output,
        )
    };

    match result {
        Ok(Ok(violations)) if violations.is_empty() => (
            JobStatus::Passed,
            "all dependency tables are sorted\n".to_string(),
        ),
        Ok(Ok(violations)) => failed(
            violations
                .iter()
                .map(|v| format!("{}\n", v))
                .collect::<String>(),
        ),
        Ok(Err(e)) => failed(format!("{}\n", e)),
        Err(e) => failed(format!("check panicked: {}\n", e)),
    }
}

#[cfg(unix)]
fn shell(step: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(step);
    cmd
}

#[cfg(not(unix))]
fn shell(step: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(step);
    cmd
}

fn emit(report: &JobReport) {
    let stdout = std::io::stdout();
    if let Err(e) = write_job_output(&mut stdout.lock(), report) {
        tracing::debug!(job = %report.name, "Dropped job output: {}", e);
    }
}

fn write_job_output<W: Write>(out: &mut W, report: &JobReport) -> std::io::Result<()> {
    writeln!(out, "==> {} [{}] {}", report.name, report.stage, report.status.label())?;
    out.write_all(report.output.as_bytes())?;
    if !report.output.is_empty() && !report.output.ends_with('\n') {
        writeln!(out)?;
    }
    out.flush()
}
