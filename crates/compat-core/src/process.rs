//! Child process invocation for compat binaries.
//!
//! Invocations are blocking: [`run_to_completion`] returns only after the
//! child has exited, which is what lets the scenario runner guarantee that
//! `next` never overlaps `base`.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Which side of a scenario an invocation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The historical binary, run first. It creates the shared state.
    Base,
    /// The baseline binary, run second on the state `base` left behind.
    Next,
}

impl Role {
    /// The command-line flag selecting this role.
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::Base => "--base",
            Self::Next => "--next",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Next => write!(f, "next"),
        }
    }
}

/// Description of one child process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<OsString>,
    /// Extra environment variables, applied over the inherited environment.
    pub env: Vec<(String, String)>,
    /// Working directory, if different from the parent's.
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    /// Starts building a spec for `program`.
    #[must_use]
    pub fn builder(program: impl Into<PathBuf>) -> ProcessSpecBuilder {
        ProcessSpecBuilder {
            spec: Self {
                program: program.into(),
                args: Vec::new(),
                env: Vec::new(),
                cwd: None,
            },
        }
    }

    /// Program followed by its arguments, lossily converted for display.
    #[must_use]
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }
}

/// Builder for [`ProcessSpec`].
#[derive(Debug, Clone)]
pub struct ProcessSpecBuilder {
    spec: ProcessSpec,
}

impl ProcessSpecBuilder {
    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.spec.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.spec.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets one environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.push((key.into(), value.into()));
        self
    }

    /// Sets several environment variables.
    #[must_use]
    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        self.spec
            .env
            .extend(vars.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.spec.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Finishes the spec.
    #[must_use]
    pub fn build(self) -> ProcessSpec {
        self.spec
    }
}

/// Runs `spec` and blocks until it exits.
///
/// Stdin is closed; stdout and stderr are inherited so the binary's own
/// output lands in the run log.
///
/// # Errors
///
/// Returns the I/O error if the process cannot be spawned or waited on.
pub fn run_to_completion(spec: &ProcessSpec) -> std::io::Result<ExitStatus> {
    let mut cmd = Command::new(&spec.program);

    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    for (k, v) in &spec.env {
        cmd.env(k, v);
    }

    cmd.status()
}

/// Describes a non-successful exit for error messages.
#[must_use]
pub fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {code}"),
        None => format!("terminated without exit code ({status})"),
    }
}
