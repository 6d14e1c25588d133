//! One-shot shell command execution

use crate::error::PrefetchError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Builds a [`Command`] from a shell command line, so pipes work,
/// e.g. `git ls-files | uniq`.
pub fn shell_command(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Runs `command` in `dir` to completion and returns its stdout lines.
///
/// A trailing empty line is dropped. Fails if the command exits non-zero.
pub async fn collect_lines(command: &str, dir: &Path) -> Result<Vec<String>, PrefetchError> {
    if !dir.is_dir() {
        return Err(PrefetchError::MissingDir {
            dir: dir.to_path_buf(),
        });
    }

    let output = shell_command(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| PrefetchError::CommandFailed {
            dir: dir.to_path_buf(),
            message: err.to_string(),
        })?;

    if !output.status.success() {
        return Err(PrefetchError::CommandFailed {
            dir: dir.to_path_buf(),
            message: format!(
                "`{}` exited with {:?}: {}",
                command,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let mut lines: Vec<String> = output
        .stdout
        .split(|b| *b == b'\n')
        .map(|line| String::from_utf8_lossy(line.strip_suffix(b"\r").unwrap_or(line)).into_owned())
        .collect();

    if lines.last().map(|s| s.is_empty()).unwrap_or(false) {
        lines.pop();
    }

    Ok(lines)
}
