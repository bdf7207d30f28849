//! External image encoder invocation.
//!
//! Encoders (`avifenc`, `cwebp`) run as child processes. Output streams are
//! captured and surfaced in [`Error::EncodeFailure`] when the process does
//! not exit with status 0.

use crate::{Error, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// One encoder call: executable, full argument vector, and the files it reads/writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl EncoderInvocation {
    /// Program and arguments joined for display
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs encoder invocations. Must leave `invocation.output` on success.
pub trait ImageEncoder {
    fn run(&self, invocation: &EncoderInvocation) -> Result<()>;
}

/// Spawns the invocation as a child process and waits for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEncoder;

impl ImageEncoder for ProcessEncoder {
    fn run(&self, invocation: &EncoderInvocation) -> Result<()> {
        tracing::debug!(command = %invocation.command_line(), "running encoder");

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Error::EncodeFailure {
                command: invocation.command_line(),
                status: "failed to start".into(),
                stdout: String::new(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::EncodeFailure {
                command: invocation.command_line(),
                status: output.status.to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// Stream shown in failure messages: stderr, or stdout when stderr is empty.
pub(crate) fn failure_detail<'a>(stdout: &'a str, stderr: &'a str) -> &'a str {
    if stderr.is_empty() {
        stdout
    } else {
        stderr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(program: &str, args: &[&str]) -> EncoderInvocation {
        EncoderInvocation {
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            input: PathBuf::from("in.png"),
            output: PathBuf::from("out.avif"),
        }
    }

    #[test]
    fn command_line_joins_arguments() {
        let inv = invocation("avifenc", &["-q", "80", "in.png", "out.avif"]);
        assert_eq!(inv.command_line(), "avifenc -q 80 in.png out.avif");
    }

    #[test]
    fn missing_program_is_encode_failure() {
        let inv = invocation("gltex-no-such-encoder", &["x"]);
        match ProcessEncoder.run(&inv) {
            Err(Error::EncodeFailure { command, status, .. }) => {
                assert_eq!(command, "gltex-no-such-encoder x");
                assert_eq!(status, "failed to start");
            }
            other => panic!("expected EncodeFailure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_captures_streams() {
        let inv = invocation("sh", &["-c", "echo partial; echo broken >&2; exit 3"]);
        let err = ProcessEncoder.run(&inv).unwrap_err();
        match &err {
            Error::EncodeFailure { stdout, stderr, .. } => {
                assert_eq!(stdout.trim(), "partial");
                assert_eq!(stderr.trim(), "broken");
            }
            other => panic!("expected EncodeFailure, got {:?}", other),
        }
        let message = err.to_string();
        assert!(message.starts_with("sh -c"));
        assert!(message.contains("broken"));
    }

    #[cfg(unix)]
    #[test]
    fn zero_exit_succeeds() {
        assert!(ProcessEncoder.run(&invocation("true", &[])).is_ok());
    }

    #[test]
    fn failure_detail_prefers_stderr() {
        assert_eq!(failure_detail("out", "err"), "err");
        assert_eq!(failure_detail("out", ""), "out");
    }
}
