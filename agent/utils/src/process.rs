use crate::error::{self, Result};
use log::trace;
use snafu::{ensure, ResultExt};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::{Command, Output};

/// A local command to run: the program, its arguments, extra environment variables and an
/// optional working directory.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub envs: BTreeMap<String, String>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, envs: &BTreeMap<String, String>) -> Self {
        self.envs
            .extend(envs.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn current_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

/// Renders the command line without its environment, which may hold credentials.
impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// What a finished command produced. `code` is `None` when the process was killed by a signal.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success<S: Into<String>>(stdout: S) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure<S: Into<String>>(code: i32, stderr: S) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Runs local commands. Tests substitute an implementation that records invocations.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        (**self).run(invocation)
    }
}

/// Runs commands as child processes and waits for them to exit.
#[derive(Copy, Clone, Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        trace!("Running '{}'", invocation);
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).envs(&invocation.envs);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }
        command.output().map(CommandOutput::from)
    }
}

/// If the command exited with one of `allowed_codes`, returns the command's `stdout`. Otherwise
/// returns a [`CommandFailed`](crate::Error::CommandFailed) error.
/// - `output`: what the command produced
/// - `hint`: the command that was executed, e.g. `echo hello world`
/// - `allowed_codes`: exit codes that count as success, usually `&[0]`
pub fn check_output(output: CommandOutput, hint: &str, allowed_codes: &[i32]) -> Result<String> {
    let code = output.code.unwrap_or(-1);
    ensure!(
        allowed_codes.contains(&code),
        error::CommandFailedSnafu {
            hint,
            code,
            stderr: output.stderr,
            stdout: output.stdout,
        }
    );
    Ok(output.stdout)
}

/// Run `invocation` once and require one of `allowed_codes`.
pub fn run_checked<R>(runner: &R, invocation: &Invocation, allowed_codes: &[i32]) -> Result<String>
where
    R: CommandRunner + ?Sized,
{
    let hint = invocation.to_string();
    let output = runner
        .run(invocation)
        .context(error::CommandStartSnafu { hint: &hint })?;
    check_output(output, &hint, allowed_codes)
}
