//! External command execution.
//!
//! git and the line counter are black boxes. Everything that spawns a process
//! goes through [`CommandRunner`] so the sync and stats stages can be driven
//! by a scripted runner in tests.

use std::fmt;
use std::io;
use std::process::{Command, Stdio};

/// A program invocation: program name, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Capability to run an external program to completion.
///
/// Implementations block until the process exits; there is no timeout.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;
}

/// Runs commands as real child processes.
///
/// The locale is forced to `C` so textual output is stable, and stdin is
/// closed so nothing can prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd.env("LANG", "C");
        cmd.env("LC_ALL", "C");
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());

        let output = cmd.output()?;
        let result = CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        log::debug!(
            "executed {} -> {:?}\nstdout: {}\nstderr: {}",
            spec,
            result.code,
            result.stdout.trim_end(),
            result.stderr.trim_end()
        );

        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted runner for exercising the pipeline without git or cloc.

    use std::cell::RefCell;

    use super::*;

    enum Response {
        Output(CommandOutput),
        SpawnError,
    }

    /// Answers invocations by matching a contiguous run of words in
    /// `program args...`. Longer patterns win; unmatched commands succeed
    /// with empty output.
    #[derive(Default)]
    pub struct ScriptedRunner {
        rules: Vec<(Vec<String>, Response)>,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, pattern: &str, output: CommandOutput) -> Self {
            self.push(pattern, Response::Output(output));
            self
        }

        pub fn fail_to_spawn(mut self, pattern: &str) -> Self {
            self.push(pattern, Response::SpawnError);
            self
        }

        fn push(&mut self, pattern: &str, response: Response) {
            let words = pattern.split_whitespace().map(str::to_string).collect();
            self.rules.push((words, response));
            self.rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        }

        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.borrow().clone()
        }

        /// Invocations rendered as `program args...`.
        pub fn call_lines(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|c| c.to_string()).collect()
        }

        pub fn was_called(&self, pattern: &str) -> bool {
            let words: Vec<&str> = pattern.split_whitespace().collect();
            self.calls
                .borrow()
                .iter()
                .any(|spec| contains_run(&haystack(spec), &words))
        }
    }

    fn haystack(spec: &CommandSpec) -> Vec<&str> {
        std::iter::once(spec.program.as_str())
            .chain(spec.args.iter().map(String::as_str))
            .collect()
    }

    fn contains_run<S: AsRef<str>>(hay: &[&str], needle: &[S]) -> bool {
        !needle.is_empty()
            && hay.windows(needle.len()).any(|window| {
                window
                    .iter()
                    .zip(needle)
                    .all(|(h, n)| *h == n.as_ref())
            })
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
            self.calls.borrow_mut().push(spec.clone());
            let hay = haystack(spec);
            match self
                .rules
                .iter()
                .find(|(pattern, _)| contains_run(&hay, pattern))
            {
                Some((_, Response::Output(output))) => Ok(output.clone()),
                Some((_, Response::SpawnError)) => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} not found", spec.program),
                )),
                None => Ok(CommandOutput::ok("")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedRunner;
    use super::*;

    #[test]
    fn spec_display_joins_arguments() {
        let spec = CommandSpec::new("git").args(["fetch", "-p"]);
        assert_eq!(spec.to_string(), "git fetch -p");
    }

    #[test]
    fn system_runner_reports_missing_program() {
        let spec = CommandSpec::new("gitloc-definitely-not-a-real-program");
        let err = SystemRunner.run(&spec).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_output_and_status() {
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let output = SystemRunner.run(&spec).unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_forces_c_locale() {
        let spec = CommandSpec::new("sh").args(["-c", "echo $LANG"]);
        let output = SystemRunner.run(&spec).unwrap();
        assert_eq!(output.stdout.trim(), "C");
    }

    #[test]
    fn scripted_runner_prefers_longest_pattern() {
        let runner = ScriptedRunner::new()
            .respond("fetch", CommandOutput::failed(1, "plain"))
            .respond("fetch -p", CommandOutput::ok("prune"));

        let prune = runner
            .run(&CommandSpec::new("git").args(["fetch", "-p"]))
            .unwrap();
        let plain = runner.run(&CommandSpec::new("git").arg("fetch")).unwrap();

        assert_eq!(prune.stdout, "prune");
        assert_eq!(plain.stderr, "plain");
        assert_eq!(runner.call_lines(), vec!["git fetch -p", "git fetch"]);
    }

    #[test]
    fn scripted_runner_defaults_to_success() {
        let runner = ScriptedRunner::new();
        let output = runner.run(&CommandSpec::new("anything")).unwrap();
        assert!(output.success);
        assert!(runner.was_called("anything"));
    }
}
