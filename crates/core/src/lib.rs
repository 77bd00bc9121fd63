//! # Launch Core
//!
//! Everything behind the `launch` developer tool: building the log
//! directives for a binary, planning how it is run, handing off to it, and
//! running the CI pipeline locally.
//!
//! ## Architecture
//!
//! - `directives` - `RUST_LOG`-style directive builder (`level`, `trace`, `debug`, ...)
//! - `invocation` - `[w|watch|f|flame] <bin> [args...]` parsing
//! - `plan` - run / watch / flamegraph command construction
//! - `exec` - process image handoff
//! - `config` - `launch.toml` + `launch.local.toml` layering
//! - `pipeline` - CI stages and jobs
//! - `runner` - local pipeline execution
//! - `deps` - dependency table order check
//!
//! ## Usage
//!
//! ```rust,ignore
//! use launch_core::{config::LaunchConfig, invocation::Invocation, plan::LaunchPlan};
//!
//! let config = LaunchConfig::load(Path::new("."))?;
//! let invocation = Invocation::parse(["watch", "prellblock"])?;
//! let plan = LaunchPlan::new(&invocation, &config.tools, &config.log_env, &config.directives());
//! let err = launch_core::exec::handoff(&plan);
//! ```

pub mod config;
pub mod deps;
pub mod directives;
pub mod error;
pub mod exec;
pub mod invocation;
pub mod pipeline;
pub mod plan;
pub mod runner;

pub use error::{Error, Result};
