//! Extension methods for running external tools to completion.

use std::process::{Command, Output, Stdio};

/// Render a command as a shell-quoted line for log and error messages.
pub fn describe(cmd: &Command) -> String {
    let argv: Vec<String> = std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect();
    shlex::try_join(argv.iter().map(|s| s.as_str())).unwrap_or_else(|_| argv.join(" "))
}

fn failure(cmd: &Command, out: &Output) -> std::io::Error {
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stderr = stderr.trim();
    let msg = if stderr.is_empty() {
        format!("`{}` exited with status {}", describe(cmd), out.status)
    } else {
        format!(
            "`{}` exited with status {}: {stderr}",
            describe(cmd),
            out.status
        )
    };
    std::io::Error::new(std::io::ErrorKind::Other, msg)
}

/// Run a [`Command`] and turn a non-zero exit into an error.
pub trait CommandRunExt {
    /// Run with inherited stdio; fail on non-zero exit.
    fn run(&mut self) -> std::io::Result<()>;
    /// Run capturing stdout as UTF-8; stderr is kept for the error message.
    fn run_get_string(&mut self) -> std::io::Result<String>;
    /// Run capturing all output, without judging the exit status.
    fn run_capture(&mut self) -> std::io::Result<Output>;
}

impl CommandRunExt for Command {
    fn run(&mut self) -> std::io::Result<()> {
        tracing::debug!("exec: {}", describe(self));
        let status = self.status()?;
        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("`{}` exited with status {status}", describe(self)),
            ))
        }
    }

    fn run_get_string(&mut self) -> std::io::Result<String> {
        let out = self.run_capture()?;
        if !out.status.success() {
            return Err(failure(self, &out));
        }
        String::from_utf8(out.stdout)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn run_capture(&mut self) -> std::io::Result<Output> {
        tracing::debug!("exec: {}", describe(self));
        self.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
    }
}
