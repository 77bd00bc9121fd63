//! # Launch Plan
//!
//! Turns an [`Invocation`] into the exact process to exec: plain run,
//! watch-and-rerun through `cargo watch`, or profiled through `cargo flamegraph`.

use serde::Serialize;
use std::ffi::OsString;
use std::fmt;

use crate::config::Tools;
use crate::directives::LogDirectives;
use crate::invocation::{Invocation, Mode};

/// The process the launcher hands off to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchPlan {
    pub mode: Mode,
    pub program: String,
    #[serde(serialize_with = "serialize_lossy")]
    pub args: Vec<OsString>,
    pub env: Vec<(String, String)>,
}

impl LaunchPlan {
    pub fn new(
        invocation: &Invocation,
        tools: &Tools,
        log_env: &str,
        directives: &LogDirectives,
    ) -> Self {
        let bin = invocation.bin.as_str();
        let args: Vec<OsString> = match invocation.mode {
            Mode::Run => {
                let mut args = run_args(bin, tools.release);
                args.push("--".into());
                args.extend(invocation.args.iter().cloned());
                args
            }
            Mode::Watch => {
                let mut run = run_args(bin, tools.release)
                    .iter()
                    .map(|a| a.to_string_lossy().into_owned())
                    .collect::<Vec<_>>();
                run.push("--".into());
                run.extend(
                    invocation
                        .args
                        .iter()
                        .map(|a| shell_quote(&a.to_string_lossy())),
                );
                vec!["watch".into(), "-x".into(), run.join(" ").into()]
            }
            Mode::Flame => {
                let mut args: Vec<OsString> =
                    vec!["flamegraph".into(), "--bin".into(), bin.into(), "--".into()];
                args.extend(invocation.args.iter().cloned());
                args
            }
        };

        let rendered = directives.render();
        let env = if rendered.is_empty() {
            Vec::new()
        } else {
            vec![(log_env.to_string(), rendered)]
        };

        Self {
            mode: invocation.mode,
            program: tools.cargo.clone(),
            args,
            env,
        }
    }

    /// Build a `std::process::Command` with args and env applied
    pub fn command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for LaunchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect();
        parts.push(shell_quote(&self.program));
        parts.extend(self.args.iter().map(|a| shell_quote(&a.to_string_lossy())));
        f.write_str(&parts.join(" "))
    }
}

fn run_args(bin: &str, release: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["run".into()];
    if release {
        args.push("--release".into());
    }
    args.push("--bin".into());
    args.push(bin.into());
    args
}

/// Quote for a POSIX shell; plain words pass through unchanged
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r#"'\''"#))
    }
}

fn serialize_lossy<S: serde::Serializer>(args: &[OsString], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(args.iter().map(|a| a.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::Severity;

    fn tools(release: bool) -> Tools {
        Tools {
            cargo: "cargo".into(),
            release,
        }
    }

    fn args(plan: &LaunchPlan) -> Vec<String> {
        plan.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_run_plan() {
        let inv = Invocation::parse(["prellblock", "--id", "rpu-0"]).unwrap();
        let plan = LaunchPlan::new(&inv, &tools(false), "RUST_LOG", &LogDirectives::new(None));
        assert_eq!(plan.program, "cargo");
        assert_eq!(
            args(&plan),
            vec!["run", "--bin", "prellblock", "--", "--id", "rpu-0"]
        );
        assert!(plan.env.is_empty());
    }

    #[test]
    fn test_run_plan_release() {
        let inv = Invocation::parse(["prellblock"]).unwrap();
        let plan = LaunchPlan::new(&inv, &tools(true), "RUST_LOG", &LogDirectives::new(None));
        assert_eq!(args(&plan), vec!["run", "--release", "--bin", "prellblock", "--"]);
    }

    #[test]
    fn test_watch_plan_quotes_forwarded_args() {
        let inv = Invocation::parse(["w", "client", "hello world", "it's"]).unwrap();
        let plan = LaunchPlan::new(&inv, &tools(false), "RUST_LOG", &LogDirectives::new(None));
        assert_eq!(
            args(&plan),
            vec![
                "watch",
                "-x",
                r#"run --bin client -- 'hello world' 'it'\''s'"#
            ]
        );
    }

    #[test]
    fn test_flame_plan_ignores_release() {
        let inv = Invocation::parse(["flame", "prellblock", "-v"]).unwrap();
        let plan = LaunchPlan::new(&inv, &tools(true), "RUST_LOG", &LogDirectives::new(None));
        assert_eq!(
            args(&plan),
            vec!["flamegraph", "--bin", "prellblock", "--", "-v"]
        );
    }

    #[test]
    fn test_directives_land_in_env() {
        let mut d = LogDirectives::new(None);
        d.level(Severity::Info).debug(["prellblock"]);
        let inv = Invocation::parse(["prellblock"]).unwrap();
        let plan = LaunchPlan::new(&inv, &tools(false), "APP_LOG", &d);
        assert_eq!(
            plan.env,
            vec![("APP_LOG".to_string(), "info,prellblock=debug".to_string())]
        );
        assert_eq!(
            plan.to_string(),
            "APP_LOG=info,prellblock=debug cargo run --bin prellblock --"
        );
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain-word_1.rs"), "plain-word_1.rs");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }
}
