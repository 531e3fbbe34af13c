//! External tool invocation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{BuildError, Result};

/// One invocation of an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub expected_exit: i32,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            expected_exit: 0,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Flag string as found in project files, split into words like a
    /// shell would (see [`split_flags`]).
    pub fn flags(self, flags: &str) -> Self {
        self.args(split_flags(flags))
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .to_string()
    }

    /// The command as a shell-like line, for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.to_string_lossy().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Split `flags` into words with POSIX shell quoting rules.
///
/// Whitespace separates words. Single quotes keep everything literally,
/// double quotes group and only unescape `\"` and `\\`, and a bare
/// backslash escapes the next character. No expansion of any kind.
pub fn split_flags(flags: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = flags.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    word.push(q);
                }
            }
            '"' => {
                in_word = true;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => break,
                        '\\' => match chars.next() {
                            Some(e @ ('"' | '\\')) => word.push(e),
                            Some(e) => {
                                word.push('\\');
                                word.push(e);
                            }
                            None => word.push('\\'),
                        },
                        _ => word.push(q),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(e) = chars.next() {
                    word.push(e);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            _ => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    words
}

/// Exit status and captured streams of a finished tool.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Runs tool commands to completion, one at a time.
pub trait ToolRunner {
    /// Run `command` and wait for it to exit. An error means the tool
    /// could not be started at all; a bad exit code is returned in the
    /// output.
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

impl<T: ToolRunner + ?Sized> ToolRunner for &T {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        (**self).run(command)
    }
}

/// Runs tools as child processes with captured output.
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .output()
            .map_err(|source| BuildError::ToolSpawn {
                program: command.program.to_string_lossy().to_string(),
                source,
            })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Run `command` and turn an unexpected exit status into [`BuildError::Tool`].
///
/// A tool that cannot be started becomes [`BuildError::ToolUnavailable`],
/// so the error still names the step and the file it was working on.
pub fn run_checked(
    runner: &dyn ToolRunner,
    command: &ToolCommand,
    tool: &str,
    subject: &str,
) -> Result<ToolOutput> {
    let output = runner.run(command).map_err(|e| match e {
        BuildError::ToolSpawn { program, source } => BuildError::ToolUnavailable {
            tool: tool.to_string(),
            subject: subject.to_string(),
            program,
            source,
        },
        other => other,
    })?;
    if output.code != Some(command.expected_exit) {
        return Err(BuildError::Tool {
            tool: tool.to_string(),
            subject: subject.to_string(),
            code: output.code,
            output: output.combined(),
        });
    }
    Ok(output)
}
