//! # Invocation
//!
//! Parses `[w|watch|f|flame] <bin> [args…]` into a mode, a binary target and
//! the arguments forwarded to it.

use serde::Serialize;
use std::ffi::OsString;
use std::fmt;

use crate::error::{Error, Result};

/// How the binary is launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Build and run once
    #[default]
    Run,
    /// Rebuild and rerun on source changes
    Watch,
    /// Run under the sampling profiler
    Flame,
}

impl Mode {
    /// Match a leading mode token
    pub fn from_token(token: &str) -> Option<Mode> {
        match token {
            "w" | "watch" => Some(Mode::Watch),
            "f" | "flame" => Some(Mode::Flame),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Run => "run",
            Mode::Watch => "watch",
            Mode::Flame => "flame",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub mode: Mode,
    pub bin: String,
    pub args: Vec<OsString>,
}

impl Invocation {
    /// Parse the launcher tokens
    ///
    /// Only the first token is checked for a mode; everything after the binary
    /// name is forwarded untouched.
    pub fn parse<I, T>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut tokens = tokens.into_iter().map(Into::into).peekable();

        let mode = match tokens.peek().and_then(|t| t.to_str()).and_then(Mode::from_token) {
            Some(mode) => {
                tokens.next();
                mode
            }
            None => Mode::Run,
        };

        let bin = tokens
            .next()
            .map(|t| t.to_string_lossy().into_owned())
            .filter(|b| !b.trim().is_empty())
            .ok_or(Error::MissingBinary)?;

        Ok(Self {
            mode,
            bin,
            args: tokens.collect(),
        })
    }
}
